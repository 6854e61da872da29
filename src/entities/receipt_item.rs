//! Receipt item entity - One line of a receipt.
//!
//! Quantity and amount are signed: a negative quantity is a return or credit
//! line. Items live and die with their receipt.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Receipt item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipt_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Receipt this line belongs to
    pub receipt_id: Uuid,
    /// Product bought on this line
    #[sea_orm(nullable)]
    pub product_id: Option<Uuid>,
    /// Raw line text from the ingested document
    #[sea_orm(nullable)]
    pub source_description: Option<String>,
    /// Lowercased copy of `source_description` for lookups
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub source_description_lower: Option<String>,
    /// Signed quantity, negative for returns
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    /// Signed monetary value of the line
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
}

/// Defines relationships between ReceiptItem and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to exactly one receipt
    #[sea_orm(
        belongs_to = "super::receipt::Entity",
        from = "Column::ReceiptId",
        to = "super::receipt::Column::Id",
        on_delete = "Cascade"
    )]
    Receipt,
    /// Each line references at most one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
