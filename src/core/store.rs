//! Store repository - Handles all store-related operations.

use crate::{
    core::{
        outcome::{self, WriteOutcome},
        pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest, fetch_page},
        text,
    },
    entities::{Store, store},
    errors::Result,
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::{debug, instrument};
use validator::Validate;

/// Store fields accepted from callers.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StoreInput {
    /// Client-generated identifier
    #[validate(custom(function = "crate::core::validation::not_nil"))]
    pub id: Uuid,
    /// Display name, unique per user ignoring case
    #[validate(
        custom(function = "crate::core::validation::not_blank"),
        length(max = 100, message = "Name must be at most 100 characters")
    )]
    pub name: String,
    /// Merchant name as printed on ingested documents
    #[serde(default)]
    pub source_name: Option<String>,
}

impl StoreInput {
    /// A store without a source alias.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source_name: None,
        }
    }
}

/// Query parameters for [`list_stores`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreFilter {
    /// 1-based page number
    pub page: i64,
    /// Items per page
    pub page_size: i64,
    /// Accent- and case-insensitive substring of the name
    pub name: Option<String>,
}

impl Default for StoreFilter {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            name: None,
        }
    }
}

/// Lists the user's stores ordered by name.
#[instrument(skip(db))]
pub async fn list_stores<C>(
    db: &C,
    user_id: &str,
    filter: &StoreFilter,
) -> Result<Page<store::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Store::find().filter(store::Column::UserId.eq(user_id));

    if let Some(term) = text::search_term(filter.name.as_deref()) {
        query = query.filter(store::Column::NormalizedName.like(text::contains_pattern(&term)));
    }

    let query = query
        .order_by_asc(store::Column::Name)
        .order_by_asc(store::Column::Id);

    fetch_page(db, query, PageRequest::new(filter.page, filter.page_size)).await
}

/// Fetches one of the user's stores.
pub async fn get_store<C>(db: &C, user_id: &str, id: Uuid) -> Result<Option<store::Model>>
where
    C: ConnectionTrait,
{
    Store::find_by_id(id)
        .filter(store::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the user's store whose `source_name` matches, ignoring case.
///
/// Used to attach ingested receipts to a known store. When several stores share
/// an alias the one with the smallest id wins.
pub async fn find_by_source_name<C>(
    db: &C,
    user_id: &str,
    source_name: &str,
) -> Result<Option<store::Model>>
where
    C: ConnectionTrait,
{
    let source_name = source_name.trim();
    if source_name.is_empty() {
        return Ok(None);
    }

    Store::find()
        .filter(store::Column::UserId.eq(user_id))
        .filter(store::Column::SourceNameLower.eq(text::lower(source_name)))
        .order_by_asc(store::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Inserts a store owned by `user_id`.
#[instrument(skip(db, input), fields(store_id = %input.id))]
pub async fn create_store<C>(db: &C, user_id: &str, input: StoreInput) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let name = input.name.trim().to_string();
    let source_name = clean_source_name(input.source_name);
    let model = store::ActiveModel {
        id: Set(input.id),
        user_id: Set(user_id.to_string()),
        normalized_name: Set(text::fold(&name)),
        name_lower: Set(text::lower(&name)),
        name: Set(name),
        source_name_lower: Set(source_name.as_deref().map(text::lower)),
        source_name: Set(source_name),
    };

    match Store::insert(model).exec_without_returning(db).await {
        Ok(rows) => WriteOutcome::from_rows_affected(rows),
        Err(e) => outcome::write_failed("create_store", &e),
    }
}

/// Renames one of the user's stores or changes its alias.
#[instrument(skip(db, input), fields(store_id = %input.id))]
pub async fn update_store<C>(db: &C, user_id: &str, input: StoreInput) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let existing = match get_store(db, user_id, input.id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before update failed: {e}");
            return WriteOutcome::Error;
        }
    };

    let name = input.name.trim().to_string();
    let mut model: store::ActiveModel = existing.into();
    let source_name = clean_source_name(input.source_name);
    model.normalized_name = Set(text::fold(&name));
    model.name_lower = Set(text::lower(&name));
    model.name = Set(name);
    model.source_name_lower = Set(source_name.as_deref().map(text::lower));
    model.source_name = Set(source_name);

    let result = Store::update_many()
        .set(model)
        .filter(store::Column::Id.eq(input.id))
        .filter(store::Column::UserId.eq(user_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("update_store", &e),
    }
}

/// Deletes one of the user's stores; stores with receipts are `Restricted`.
#[instrument(skip(db))]
pub async fn delete_store<C>(db: &C, user_id: &str, id: Uuid) -> WriteOutcome
where
    C: ConnectionTrait,
{
    match get_store(db, user_id, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before delete failed: {e}");
            return WriteOutcome::Error;
        }
    }

    let result = Store::delete_many()
        .filter(store::Column::Id.eq(id))
        .filter(store::Column::UserId.eq(user_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("delete_store", &e),
    }
}

/// Whether another of the user's stores already uses `name`, trimmed and ignoring case.
pub async fn exists_by_name<C>(
    db: &C,
    user_id: &str,
    name: &str,
    exclude_id: Option<Uuid>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Store::find()
        .filter(store::Column::UserId.eq(user_id))
        .filter(store::Column::NameLower.eq(text::lower(name)));

    if let Some(id) = exclude_id {
        query = query.filter(store::Column::Id.ne(id));
    }

    Ok(query.count(db).await? > 0)
}

fn clean_source_name(source_name: Option<String>) -> Option<String> {
    source_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_update_and_get_store() -> Result<()> {
        let db = setup_test_db().await?;
        let mut input = StoreInput::new(Uuid::new_v4(), " Mercado Central ");
        input.source_name = Some("  MERCADO CENTRAL SA ".to_string());

        assert_eq!(create_store(&db, USER, input.clone()).await, WriteOutcome::Success);

        let stored = get_store(&db, USER, input.id).await?.unwrap();
        assert_eq!(stored.name, "Mercado Central");
        assert_eq!(stored.source_name.as_deref(), Some("MERCADO CENTRAL SA"));

        input.name = "Mercado Sur".to_string();
        input.source_name = Some("   ".to_string());
        assert_eq!(update_store(&db, USER, input.clone()).await, WriteOutcome::Success);

        let stored = get_store(&db, USER, input.id).await?.unwrap();
        assert_eq!(stored.name, "Mercado Sur");
        assert_eq!(stored.normalized_name, "mercado sur");
        assert_eq!(stored.source_name, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_store_names_are_unique_ignoring_case() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_store(&db, USER, "Lidl").await?;

        let clash = StoreInput::new(Uuid::new_v4(), "LIDL");
        assert_eq!(create_store(&db, USER, clash).await, WriteOutcome::Restricted);

        let other_user = StoreInput::new(Uuid::new_v4(), "Lidl");
        assert_eq!(create_store(&db, OTHER_USER, other_user).await, WriteOutcome::Success);

        Ok(())
    }

    #[tokio::test]
    async fn test_exists_by_name() -> Result<()> {
        let db = setup_test_db().await?;
        let store = create_test_store(&db, USER, "Carrefour").await?;

        assert!(exists_by_name(&db, USER, "  carrefour ", None).await?);
        assert!(!exists_by_name(&db, USER, "Carrefour", Some(store.id)).await?);
        assert!(!exists_by_name(&db, OTHER_USER, "Carrefour", None).await?);
        assert!(!exists_by_name(&db, USER, "Carre", None).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_stores_filters_and_sorts() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_store(&db, USER, "Panadería Zoe").await?;
        create_test_store(&db, USER, "Alcampo").await?;
        create_test_store(&db, USER, "Panaderia Ana").await?;
        create_test_store(&db, OTHER_USER, "Panaderia Otra").await?;

        let all = list_stores(&db, USER, &StoreFilter::default()).await?;
        let names: Vec<_> = all.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Alcampo", "Panaderia Ana", "Panadería Zoe"]);

        let filter = StoreFilter {
            name: Some("PANADERÍA".to_string()),
            ..StoreFilter::default()
        };
        let found = list_stores(&db, USER, &filter).await?;
        assert_eq!(found.total_items, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_source_name() -> Result<()> {
        let db = setup_test_db().await?;
        let mut input = StoreInput::new(Uuid::new_v4(), "Dia");
        input.source_name = Some("DIA RETAIL ESPANA".to_string());
        assert_eq!(create_store(&db, USER, input.clone()).await, WriteOutcome::Success);

        let found = find_by_source_name(&db, USER, "dia retail espana").await?;
        assert_eq!(found.map(|s| s.id), Some(input.id));
        assert!(find_by_source_name(&db, OTHER_USER, "DIA RETAIL ESPANA").await?.is_none());
        assert!(find_by_source_name(&db, USER, " ").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_non_ascii_names_compare_ignoring_case() -> Result<()> {
        let db = setup_test_db().await?;
        let mut input = StoreInput::new(Uuid::new_v4(), "Óptica");
        input.source_name = Some("ÓPTICA ÑANDÚ S.A.".to_string());
        assert_eq!(create_store(&db, USER, input.clone()).await, WriteOutcome::Success);

        assert!(exists_by_name(&db, USER, "óptica", None).await?);
        assert!(!exists_by_name(&db, USER, "Optica", None).await?);

        let clash = StoreInput::new(Uuid::new_v4(), "óptica");
        assert_eq!(create_store(&db, USER, clash).await, WriteOutcome::Restricted);

        let found = find_by_source_name(&db, USER, "óptica ñandú s.a.").await?;
        assert_eq!(found.map(|s| s.id), Some(input.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_store() -> Result<()> {
        let db = setup_test_db().await?;
        let empty = create_test_store(&db, USER, "Empty").await?;
        let used = create_test_store(&db, USER, "Used").await?;
        let product = create_test_product(&db, USER, "Water").await?;
        create_test_receipt(
            &db,
            USER,
            used.id,
            utc(2024, 5, 5),
            vec![item_input(product.id, 1, 100)],
        )
        .await?;

        assert_eq!(delete_store(&db, OTHER_USER, empty.id).await, WriteOutcome::NotFound);
        assert_eq!(delete_store(&db, USER, empty.id).await, WriteOutcome::Success);
        assert_eq!(delete_store(&db, USER, used.id).await, WriteOutcome::Restricted);
        assert!(get_store(&db, USER, used.id).await?.is_some());

        Ok(())
    }
}
