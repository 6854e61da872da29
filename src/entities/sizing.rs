//! Sizing entity - Units of measure shared by every user.
//!
//! Sizings form a two-level conversion hierarchy: a unit may name a coarser
//! `parent_id` in the same dimension together with the `proportion` of this
//! unit that makes one parent unit (1000 ml = 1 L). Roots have neither.
//! The table is seed data; it is never written through the repository layer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sizing database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sizings")]
pub struct Model {
    /// Stable seeded identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Unit symbol (e.g. `"ml"`, `"Kg"`)
    #[sea_orm(unique)]
    pub name: String,
    /// Coarser unit of the same dimension, `None` for root units
    pub parent_id: Option<i32>,
    /// How many of this unit make one parent unit
    #[sea_orm(column_type = "Decimal(Some((16, 6)))", nullable)]
    pub proportion: Option<Decimal>,
}

/// Defines relationships between Sizing and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each non-root sizing points at its parent unit
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Restrict"
    )]
    Parent,
    /// One sizing is used by many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
