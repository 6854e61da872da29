//! Validation Rules - Structural checks followed by uniqueness checks.
//!
//! Structural rules need no I/O: they are declared on the input types with
//! `validator` and completed here with the cross-field rules the derive cannot
//! express. Uniqueness rules ask the repositories whether a conflicting row
//! exists and only run when the structural pass found nothing. Violations are
//! returned as a list of `(field, message)` pairs; they are expected and never
//! logged as failures.

use crate::{
    core::{
        product::{self, ProductInput},
        receipt::{self, ReceiptInput, ReceiptItemInput},
        store::{self, StoreInput},
    },
    errors::Result,
};
use rust_decimal::{Decimal, prelude::Signed};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::{borrow::Cow, collections::HashSet};
use tracing::{debug, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// A violated rule and the field it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path, e.g. `name` or `items[2].amount`
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Every violated rule of one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// True when the input passed validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Records a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether any violation is attached to `field`.
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Iterates the violations in field order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    fn sorted(mut self) -> Self {
        self.0.sort_by(|a, b| a.field.cmp(&b.field));
        self
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = Self::default();
        flatten("", &errors, &mut out);
        out.sorted()
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    out.push(path.clone(), message);
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(entries) => {
                for (index, inner) in entries {
                    flatten(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

fn structural<T: Validate>(input: &T) -> FieldErrors {
    input.validate().map_or_else(FieldErrors::from, |()| FieldErrors::default())
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Rejects the all-zero UUID.
pub fn not_nil(id: &Uuid) -> std::result::Result<(), ValidationError> {
    if id.is_nil() {
        return Err(rule("not_nil", "Id is required"));
    }
    Ok(())
}

/// Rejects empty and whitespace-only text.
pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule("not_blank", "Name is required"));
    }
    Ok(())
}

/// Rejects zero quantities and amounts.
pub fn not_zero(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.is_zero() {
        return Err(rule("not_zero", "Must not be zero"));
    }
    Ok(())
}

/// Rejects positive discounts.
pub fn not_positive(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        return Err(rule("not_positive", "Discount must be zero or negative"));
    }
    Ok(())
}

/// Whether two lines share a product and the signs of both quantity and amount.
///
/// A return line (negative quantity) for a product already bought on the same
/// receipt is not a duplicate.
#[must_use]
pub fn has_duplicate_products(items: &[ReceiptItemInput]) -> bool {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            item.product_id
                .map(|id| (id, item.quantity.signum(), item.amount.signum()))
        })
        .any(|key| !seen.insert(key))
}

/// Structural rules of a product.
#[must_use]
pub fn check_product(input: &ProductInput) -> FieldErrors {
    structural(input)
}

/// Structural rules of a store.
#[must_use]
pub fn check_store(input: &StoreInput) -> FieldErrors {
    structural(input)
}

/// Structural rules of a single receipt line.
#[must_use]
pub fn check_receipt_item(input: &ReceiptItemInput) -> FieldErrors {
    let mut errors = structural(input);
    if input.product_id.is_some_and(|id| id.is_nil()) {
        errors.push("product_id", "Product is required");
    }
    errors.sorted()
}

/// Structural rules of a receipt and each of its lines.
#[must_use]
pub fn check_receipt(input: &ReceiptInput) -> FieldErrors {
    let mut errors = structural(input);

    if input.store_id.is_some_and(|id| id.is_nil()) {
        errors.push("store_id", "Store is required");
    }

    if input.items.is_empty() {
        errors.push("items", "At least one item is required");
    }

    for (index, item) in input.items.iter().enumerate() {
        for error in check_receipt_item(item).iter() {
            errors.push(format!("items[{index}].{}", error.field), error.message.clone());
        }
    }

    if has_duplicate_products(&input.items) {
        errors.push(
            "items",
            "A product can appear only once per receipt, except as a return",
        );
    }

    errors.sorted()
}

/// Full validation of a product about to be created or updated.
#[instrument(skip(db, input), fields(product_id = %input.id))]
pub async fn validate_product<C>(db: &C, user_id: &str, input: &ProductInput) -> Result<FieldErrors>
where
    C: ConnectionTrait,
{
    let mut errors = check_product(input);
    if !errors.is_empty() {
        debug!(violations = errors.len(), "product failed structural validation");
        return Ok(errors);
    }

    let taken = product::exists_by_name_and_units_pack(
        db,
        user_id,
        &input.name,
        input.units_pack,
        Some(input.id),
    )
    .await?;
    if taken {
        errors.push("name", "A product with this name and pack size already exists");
    }

    if !errors.is_empty() {
        debug!("product conflicts with an existing one");
    }
    Ok(errors)
}

/// Full validation of a store about to be created or updated.
#[instrument(skip(db, input), fields(store_id = %input.id))]
pub async fn validate_store<C>(db: &C, user_id: &str, input: &StoreInput) -> Result<FieldErrors>
where
    C: ConnectionTrait,
{
    let mut errors = check_store(input);
    if !errors.is_empty() {
        debug!(violations = errors.len(), "store failed structural validation");
        return Ok(errors);
    }

    if store::exists_by_name(db, user_id, &input.name, Some(input.id)).await? {
        debug!("store name already taken");
        errors.push("name", "A store with this name already exists");
    }
    Ok(errors)
}

/// Full validation of a line edited on its own: structure, then product ownership.
#[instrument(skip(db, input))]
pub async fn validate_receipt_item<C>(
    db: &C,
    user_id: &str,
    input: &ReceiptItemInput,
) -> Result<FieldErrors>
where
    C: ConnectionTrait,
{
    let mut errors = check_receipt_item(input);
    if !errors.is_empty() {
        debug!(violations = errors.len(), "receipt item failed structural validation");
        return Ok(errors);
    }

    if let Some(product_id) = input.product_id {
        if product::get_product(db, user_id, product_id).await?.is_none() {
            errors.push("product_id", "Product not found");
        }
    }
    Ok(errors)
}

/// Full validation of a receipt about to be created or updated.
///
/// After the structural pass, the store and every product must be the
/// user's, then the receipt must not duplicate an existing one.
#[instrument(skip(db, input), fields(receipt_id = %input.id))]
pub async fn validate_receipt<C>(db: &C, user_id: &str, input: &ReceiptInput) -> Result<FieldErrors>
where
    C: ConnectionTrait,
{
    let mut errors = check_receipt(input);
    if !errors.is_empty() {
        debug!(violations = errors.len(), "receipt failed structural validation");
        return Ok(errors);
    }

    if let Some(store_id) = input.store_id {
        if store::get_store(db, user_id, store_id).await?.is_none() {
            errors.push("store_id", "Store not found");
        }
    }

    let product_ids: Vec<Uuid> = input.items.iter().filter_map(|item| item.product_id).collect();
    let owned = product::owned_ids(db, user_id, &product_ids).await?;
    for (index, item) in input.items.iter().enumerate() {
        if item.product_id.is_some_and(|id| !owned.contains(&id)) {
            errors.push(format!("items[{index}].product_id"), "Product not found");
        }
    }

    if let Some(source_id) = input.source_id.as_deref().filter(|s| !s.trim().is_empty()) {
        if receipt::exists_by_source_id(db, user_id, source_id, Some(input.id)).await? {
            errors.push("source_id", "This document has already been imported");
        }
    }

    if receipt::exists_by_store_id_and_date(
        db,
        user_id,
        input.store_id,
        input.transaction_date_utc,
        Some(input.id),
    )
    .await?
    {
        errors.push(
            "transaction_date_utc",
            "A receipt from this store at this time already exists",
        );
    }

    if !errors.is_empty() {
        debug!(violations = errors.len(), "receipt conflicts with an existing one");
    }
    Ok(errors.sorted())
}
