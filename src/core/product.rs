//! Product repository - Handles all product-related operations.
//!
//! Every query is scoped to the owning user; a product that belongs to someone
//! else behaves exactly like one that does not exist. Writes return a
//! [`WriteOutcome`] instead of an error so callers can map them to responses
//! without inspecting storage failures.

use crate::{
    core::{
        outcome::{self, WriteOutcome},
        pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest, fetch_page},
        text,
    },
    entities::{Product, product},
    errors::Result,
};
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, instrument};
use validator::Validate;

/// Maximum length of a product name
pub const NAME_MAX_LEN: u64 = 100;

/// Maximum length of a product image URL
pub const IMAGE_URL_MAX_LEN: u64 = 2048;

/// Product fields accepted from callers.
///
/// The owning user is never part of the input; it is supplied separately by
/// the caller's authenticated identity.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    /// Client-generated identifier
    #[validate(custom(function = "crate::core::validation::not_nil"))]
    pub id: Uuid,
    /// Display name
    #[validate(
        custom(function = "crate::core::validation::not_blank"),
        length(max = 100, message = "Name must be at most 100 characters")
    )]
    pub name: String,
    /// Optional picture of the product
    #[serde(default)]
    #[validate(length(max = 2048, message = "Image URL must be at most 2048 characters"))]
    pub image_url: Option<String>,
    /// Units sold together
    #[serde(default = "default_units_pack")]
    #[validate(range(min = 1, message = "Units per pack must be greater than zero"))]
    pub units_pack: i32,
    /// Unit of `sizing_value`
    #[serde(default)]
    pub sizing_id: Option<i32>,
    /// Amount of `sizing_id` units per item
    #[serde(default)]
    pub sizing_value: Option<Decimal>,
}

const fn default_units_pack() -> i32 {
    1
}

impl ProductInput {
    /// A single-unit product with no sizing.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image_url: None,
            units_pack: default_units_pack(),
            sizing_id: None,
            sizing_value: None,
        }
    }
}

/// Query parameters for [`list_products`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// 1-based page number
    pub page: i64,
    /// Items per page
    pub page_size: i64,
    /// Accent- and case-insensitive substring of the name
    pub name: Option<String>,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            name: None,
        }
    }
}

/// Lists the user's products ordered by name.
#[instrument(skip(db))]
pub async fn list_products<C>(
    db: &C,
    user_id: &str,
    filter: &ProductFilter,
) -> Result<Page<product::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Product::find().filter(product::Column::UserId.eq(user_id));

    if let Some(term) = text::search_term(filter.name.as_deref()) {
        query = query.filter(product::Column::NormalizedName.like(text::contains_pattern(&term)));
    }

    let query = query
        .order_by_asc(product::Column::Name)
        .order_by_asc(product::Column::Id);

    fetch_page(db, query, PageRequest::new(filter.page, filter.page_size)).await
}

/// Fetches one of the user's products, `None` when absent or owned by someone else.
pub async fn get_product<C>(db: &C, user_id: &str, id: Uuid) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(id)
        .filter(product::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Which of `ids` are products owned by `user_id`.
pub async fn owned_ids<C>(db: &C, user_id: &str, ids: &[Uuid]) -> Result<HashSet<Uuid>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let owned: Vec<Uuid> = Product::find()
        .select_only()
        .column(product::Column::Id)
        .filter(product::Column::UserId.eq(user_id))
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(owned.into_iter().collect())
}

/// Inserts a product owned by `user_id`.
#[instrument(skip(db, input), fields(product_id = %input.id))]
pub async fn create_product<C>(db: &C, user_id: &str, input: ProductInput) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let name = input.name.trim().to_string();
    let model = product::ActiveModel {
        id: Set(input.id),
        user_id: Set(user_id.to_string()),
        normalized_name: Set(text::fold(&name)),
        name_lower: Set(text::lower(&name)),
        name: Set(name),
        image_url: Set(input.image_url),
        units_pack: Set(input.units_pack),
        sizing_id: Set(input.sizing_id),
        sizing_value: Set(input.sizing_value),
    };

    match Product::insert(model).exec_without_returning(db).await {
        Ok(rows) => WriteOutcome::from_rows_affected(rows),
        Err(e) => outcome::write_failed("create_product", &e),
    }
}

/// Overwrites the fields of one of the user's products.
#[instrument(skip(db, input), fields(product_id = %input.id))]
pub async fn update_product<C>(db: &C, user_id: &str, input: ProductInput) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let existing = match get_product(db, user_id, input.id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before update failed: {e}");
            return WriteOutcome::Error;
        }
    };

    let name = input.name.trim().to_string();
    let mut model: product::ActiveModel = existing.into();
    model.normalized_name = Set(text::fold(&name));
    model.name_lower = Set(text::lower(&name));
    model.name = Set(name);
    model.image_url = Set(input.image_url);
    model.units_pack = Set(input.units_pack);
    model.sizing_id = Set(input.sizing_id);
    model.sizing_value = Set(input.sizing_value);

    let result = Product::update_many()
        .set(model)
        .filter(product::Column::Id.eq(input.id))
        .filter(product::Column::UserId.eq(user_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("update_product", &e),
    }
}

/// Deletes one of the user's products.
///
/// Products still referenced by receipt lines are kept and the outcome is
/// `Restricted`.
#[instrument(skip(db))]
pub async fn delete_product<C>(db: &C, user_id: &str, id: Uuid) -> WriteOutcome
where
    C: ConnectionTrait,
{
    match get_product(db, user_id, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before delete failed: {e}");
            return WriteOutcome::Error;
        }
    }

    let result = Product::delete_many()
        .filter(product::Column::Id.eq(id))
        .filter(product::Column::UserId.eq(user_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("delete_product", &e),
    }
}

/// Whether another of the user's products already has this name and pack size.
///
/// Names are compared trimmed and ignoring case; `exclude_id` skips the product
/// being edited.
pub async fn exists_by_name_and_units_pack<C>(
    db: &C,
    user_id: &str,
    name: &str,
    units_pack: i32,
    exclude_id: Option<Uuid>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .filter(product::Column::UnitsPack.eq(units_pack))
        .filter(product::Column::NameLower.eq(text::lower(name)));

    if let Some(id) = exclude_id {
        query = query.filter(product::Column::Id.ne(id));
    }

    Ok(query.count(db).await? > 0)
}
