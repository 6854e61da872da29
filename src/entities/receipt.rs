//! Receipt entity - One purchase event.
//!
//! `source_id` identifies the scanned document the receipt was created from and
//! prevents importing the same document twice. `discount` is stored as a
//! non-positive adjustment to the sum of the item amounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Receipt database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    /// Unique identifier for the receipt
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    pub user_id: String,
    /// Identifier of the ingested source document
    #[sea_orm(nullable)]
    pub source_id: Option<String>,
    /// When the purchase happened
    #[sea_orm(nullable)]
    pub transaction_date_utc: Option<DateTimeUtc>,
    /// Store the receipt was issued by
    #[sea_orm(nullable)]
    pub store_id: Option<Uuid>,
    /// Receipt-level adjustment, zero or negative
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount: Decimal,
}

/// Defines relationships between Receipt and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each receipt belongs to at most one store
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id",
        on_delete = "Restrict"
    )]
    Store,
    /// One receipt has many lines
    #[sea_orm(has_many = "super::receipt_item::Entity")]
    Items,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::receipt_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
