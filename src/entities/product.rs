//! Product entity - A normalized thing a user buys.
//!
//! A product is identified per user by its name, pack size and optional sizing
//! (`"Milk"`, 6 units, 1 L). Receipt lines point at products so spending can be
//! grouped across stores and over time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    pub user_id: String,
    /// Display name (e.g. "Café Molido")
    pub name: String,
    /// Folded copy of `name` used for accent-insensitive search
    #[serde(skip_serializing)]
    pub normalized_name: String,
    /// Lowercased copy of `name` for case-insensitive equality
    #[serde(skip_serializing)]
    pub name_lower: String,
    /// Optional picture of the product
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
    /// Number of units sold together, at least 1
    pub units_pack: i32,
    /// Unit the `sizing_value` is expressed in
    #[sea_orm(nullable)]
    pub sizing_id: Option<i32>,
    /// Amount of `sizing_id` units per item (e.g. 500 for 500 g)
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub sizing_value: Option<Decimal>,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product is measured in at most one sizing
    #[sea_orm(
        belongs_to = "super::sizing::Entity",
        from = "Column::SizingId",
        to = "super::sizing::Column::Id",
        on_delete = "Restrict"
    )]
    Sizing,
    /// One product appears on many receipt lines
    #[sea_orm(has_many = "super::receipt_item::Entity")]
    ReceiptItems,
}

impl Related<super::sizing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sizing.def()
    }
}

impl Related<super::receipt_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
