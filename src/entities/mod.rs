//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod product;
pub mod receipt;
pub mod receipt_item;
pub mod sizing;
pub mod store;

// Re-export specific types to avoid conflicts
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use receipt::{Column as ReceiptColumn, Entity as Receipt, Model as ReceiptModel};
pub use receipt_item::{
    Column as ReceiptItemColumn, Entity as ReceiptItem, Model as ReceiptItemModel,
};
pub use sizing::{Column as SizingColumn, Entity as Sizing, Model as SizingModel};
pub use store::{Column as StoreColumn, Entity as Store, Model as StoreModel};
