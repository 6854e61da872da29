//! Shared test utilities for the receipt ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used, clippy::panic)]

use crate::{
    core::{
        outcome::WriteOutcome,
        product::{self, ProductInput},
        receipt::{self, ReceiptInput, ReceiptItemInput},
        store::{self, StoreInput},
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

/// Owner of most test data
pub const USER: &str = "user-1";

/// A second account, used to check that rows never leak across users
pub const OTHER_USER: &str = "user-2";

/// Creates an in-memory `SQLite` database with all tables, indexes and sizings.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    crate::config::database::seed_sizings(&db).await?;
    Ok(db)
}

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("receipt_ledger=debug")
        .with_test_writer()
        .try_init();
}

/// Midnight UTC on the given day.
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// A new line with whole-number quantity and amount.
pub fn item_input(product_id: Uuid, quantity: i64, amount: i64) -> ReceiptItemInput {
    ReceiptItemInput {
        id: None,
        product_id: Some(product_id),
        source_description: None,
        quantity: Decimal::from(quantity),
        amount: Decimal::from(amount),
    }
}

/// A new receipt without source document or discount.
pub fn receipt_input(
    store_id: Uuid,
    transaction_date_utc: DateTime<Utc>,
    items: Vec<ReceiptItemInput>,
) -> ReceiptInput {
    ReceiptInput {
        id: Uuid::new_v4(),
        source_id: None,
        transaction_date_utc: Some(transaction_date_utc),
        store_id: Some(store_id),
        discount: Decimal::ZERO,
        items,
    }
}

/// Creates a single-unit product without sizing.
///
/// # Panics
/// When the insert does not succeed.
pub async fn create_test_product(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
) -> Result<entities::product::Model> {
    let input = ProductInput::new(Uuid::new_v4(), name);
    let id = input.id;
    assert_eq!(
        product::create_product(db, user_id, input).await,
        WriteOutcome::Success,
        "creating product {name:?}"
    );
    Ok(product::get_product(db, user_id, id).await?.unwrap())
}

/// Creates a store without source alias.
///
/// # Panics
/// When the insert does not succeed.
pub async fn create_test_store(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
) -> Result<entities::store::Model> {
    let input = StoreInput::new(Uuid::new_v4(), name);
    let id = input.id;
    assert_eq!(
        store::create_store(db, user_id, input).await,
        WriteOutcome::Success,
        "creating store {name:?}"
    );
    Ok(store::get_store(db, user_id, id).await?.unwrap())
}

/// Creates a receipt with the given lines.
///
/// # Panics
/// When the insert does not succeed.
pub async fn create_test_receipt(
    db: &DatabaseConnection,
    user_id: &str,
    store_id: Uuid,
    transaction_date_utc: DateTime<Utc>,
    items: Vec<ReceiptItemInput>,
) -> Result<entities::receipt::Model> {
    let input = receipt_input(store_id, transaction_date_utc, items);
    let id = input.id;
    assert_eq!(
        receipt::create_receipt(db, user_id, input).await,
        WriteOutcome::Success,
        "creating receipt"
    );
    Ok(receipt::get_receipt(db, user_id, id).await?.unwrap().receipt)
}
