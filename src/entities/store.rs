//! Store entity - Where a receipt was issued.
//!
//! `source_name` is the merchant name as printed on scanned documents and is
//! used to attach ingested receipts to the right store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    /// Unique identifier for the store
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    pub user_id: String,
    /// Display name, unique per user ignoring case
    pub name: String,
    /// Folded copy of `name` used for accent-insensitive search
    #[serde(skip_serializing)]
    pub normalized_name: String,
    /// Lowercased copy of `name`, unique per user
    #[serde(skip_serializing)]
    pub name_lower: String,
    /// Merchant alias found on ingested documents
    #[sea_orm(nullable)]
    pub source_name: Option<String>,
    /// Lowercased copy of `source_name`
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub source_name_lower: Option<String>,
}

/// Defines relationships between Store and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One store has many receipts
    #[sea_orm(has_many = "super::receipt::Entity")]
    Receipts,
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
