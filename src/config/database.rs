//! Database configuration module for the receipt ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so foreign keys and their `ON DELETE` actions follow the `belongs_to` relations.
//! Unique indexes that span several columns or expressions cannot be declared on
//! the entities and are created afterwards with plain SQL.

use crate::entities::{Product, Receipt, ReceiptItem, Sizing, Store, sizing};
use crate::errors::Result;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    Schema, Set,
};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Indexes not expressible through the entity derive.
///
/// `IFNULL` makes products without a sizing collide with each other; a plain
/// composite index would treat the NULLs as distinct.
const INDEX_STATEMENTS: [&str; 6] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_products_identity \
     ON products (user_id, name, units_pack, IFNULL(sizing_id, -1), IFNULL(sizing_value, -1))",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_stores_user_name \
     ON stores (user_id, name_lower)",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_receipts_user_source \
     ON receipts (user_id, source_id) WHERE source_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS ix_receipts_user_date \
     ON receipts (user_id, transaction_date_utc)",
    "CREATE INDEX IF NOT EXISTS ix_receipt_items_receipt ON receipt_items (receipt_id)",
    "CREATE INDEX IF NOT EXISTS ix_receipt_items_product ON receipt_items (product_id)",
];

/// Reference units: (id, name, parent id, units per parent).
const SIZING_SEED: [(i32, &str, Option<i32>, Option<i64>); 6] = [
    (1, "L", None, None),
    (2, "ml", Some(1), Some(1000)),
    (3, "cl", Some(1), Some(100)),
    (4, "Kg", None, None),
    (5, "g", Some(4), Some(1000)),
    (6, "u", None, None),
];

/// Establishes a connection to the database at `database_url`.
///
/// The parent directory of a file-backed database is created when missing.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(dir) = database_dir(database_url) {
        std::fs::create_dir_all(dir)?;
    }
    debug!("Connecting to database: {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Directory holding the database file of a `sqlite://` URL, if any.
fn database_dir(database_url: &str) -> Option<&Path> {
    let file = database_url.strip_prefix("sqlite://")?;
    let file = file.split('?').next()?;
    Path::new(file)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Creates all tables using `SeaORM`'s schema generation from entity definitions.
///
/// Referenced tables are created first; every statement is `IF NOT EXISTS` so
/// the function can run against an existing database.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(Sizing),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Store),
        schema.create_table_from_entity(Receipt),
        schema.create_table_from_entity(ReceiptItem),
    ];

    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    for statement in INDEX_STATEMENTS {
        db.execute_unprepared(statement).await?;
    }

    Ok(())
}

/// Inserts any missing reference sizing. Returns how many rows were added.
#[instrument(skip(db))]
pub async fn seed_sizings<C>(db: &C) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut inserted = 0;

    // Roots come first in the seed so parent rows exist before their children.
    for (id, name, parent_id, proportion) in SIZING_SEED {
        if Sizing::find_by_id(id).one(db).await?.is_some() {
            continue;
        }

        sizing::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            parent_id: Set(parent_id),
            proportion: Set(proportion.map(Decimal::from)),
        }
        .insert(db)
        .await?;
        inserted += 1;
    }

    if inserted > 0 {
        info!("Seeded {inserted} sizing rows");
    }
    Ok(inserted)
}

/// Number of rows in every table, in creation order.
pub async fn row_counts<C>(db: &C) -> Result<Vec<(&'static str, u64)>>
where
    C: ConnectionTrait,
{
    Ok(vec![
        ("sizings", Sizing::find().count(db).await?),
        ("products", Product::find().count(db).await?),
        ("stores", Store::find().count(db).await?),
        ("receipts", Receipt::find().count(db).await?),
        ("receipt_items", ReceiptItem::find().count(db).await?),
    ])
}

/// Connects, creates the schema and seeds reference data.
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection> {
    let db = create_connection(database_url).await?;
    create_tables(&db).await?;
    seed_sizings(&db).await?;
    Ok(db)
}
