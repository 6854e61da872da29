//! Receipt repository - Handles receipts together with their lines.
//!
//! A receipt and its items are written as one unit: creation inserts both in a
//! single transaction, and an update reconciles the stored lines against the
//! incoming ones (delete missing, overwrite matching, insert new) inside the
//! same transaction as the receipt's own fields.

use crate::{
    core::{
        outcome::{self, WriteOutcome},
        pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest, fetch_page},
        product::get_product,
        text,
    },
    entities::{Product, Receipt, ReceiptItem, Store, product, receipt, receipt_item, store},
    errors::Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::NotSet,
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    sea_query::{Expr, Query, SelectStatement},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};
use uuid::Uuid;
use validator::Validate;

/// One receipt line accepted from callers.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiptItemInput {
    /// Existing line id; `None` for a new line
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Product bought on this line
    #[validate(required(message = "Product is required"))]
    pub product_id: Option<Uuid>,
    /// Raw line text from the ingested document
    #[serde(default)]
    pub source_description: Option<String>,
    /// Signed quantity, negative for returns
    #[validate(custom(function = "crate::core::validation::not_zero"))]
    pub quantity: Decimal,
    /// Signed line amount
    #[validate(custom(function = "crate::core::validation::not_zero"))]
    pub amount: Decimal,
}

/// Receipt fields accepted from callers.
///
/// The store is referenced by id only; a nested store object is not part of
/// the input and can never be created through a receipt.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiptInput {
    /// Client-generated identifier
    #[validate(custom(function = "crate::core::validation::not_nil"))]
    pub id: Uuid,
    /// Identifier of the ingested source document
    #[serde(default)]
    pub source_id: Option<String>,
    /// When the purchase happened
    #[validate(required(message = "Transaction date is required"))]
    pub transaction_date_utc: Option<DateTime<Utc>>,
    /// Issuing store
    #[validate(required(message = "Store is required"))]
    pub store_id: Option<Uuid>,
    /// Receipt-level adjustment, zero or negative
    #[serde(default)]
    #[validate(custom(function = "crate::core::validation::not_positive"))]
    pub discount: Decimal,
    /// Receipt lines
    #[serde(default)]
    pub items: Vec<ReceiptItemInput>,
}

/// Query parameters for [`list_receipts`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiptFilter {
    /// 1-based page number
    pub page: i64,
    /// Items per page
    pub page_size: i64,
    /// Only receipts with a line for this product; only those lines are loaded
    pub product_id: Option<Uuid>,
    /// Only receipts with a line whose product name contains this text
    pub product_name: Option<String>,
    /// Inclusive lower bound on the transaction date
    pub from_date_utc: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the transaction date
    pub to_date_utc: Option<DateTime<Utc>>,
}

impl Default for ReceiptFilter {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            product_id: None,
            product_name: None,
            from_date_utc: None,
            to_date_utc: None,
        }
    }
}

/// A receipt line with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptItemDetails {
    /// The stored line
    #[serde(flatten)]
    pub item: receipt_item::Model,
    /// Product referenced by the line, if any
    pub product: Option<product::Model>,
}

/// A receipt with its store and lines resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptDetails {
    /// The stored receipt
    #[serde(flatten)]
    pub receipt: receipt::Model,
    /// Issuing store, if any
    pub store: Option<store::Model>,
    /// Loaded lines, ordered by id
    pub items: Vec<ReceiptItemDetails>,
}

impl ReceiptDetails {
    /// Sum of the loaded line amounts plus the discount.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|line| line.item.amount).sum::<Decimal>() + self.receipt.discount
    }
}

/// Lists the user's receipts, newest first.
///
/// Receipts without a transaction date come last.
#[instrument(skip(db))]
pub async fn list_receipts<C>(
    db: &C,
    user_id: &str,
    filter: &ReceiptFilter,
) -> Result<Page<ReceiptDetails>>
where
    C: ConnectionTrait,
{
    let mut query = Receipt::find().filter(receipt::Column::UserId.eq(user_id));

    if let Some(product_id) = filter.product_id {
        let with_product = Query::select()
            .column(receipt_item::Column::ReceiptId)
            .from(ReceiptItem)
            .and_where(receipt_item::Column::ProductId.eq(product_id))
            .to_owned();
        query = query.filter(receipt::Column::Id.in_subquery(with_product));
    }

    if let Some(term) = text::search_term(filter.product_name.as_deref()) {
        query = query.filter(receipt::Column::Id.in_subquery(receipts_with_product_named(&term)));
    }

    if let Some(from) = filter.from_date_utc {
        query = query.filter(receipt::Column::TransactionDateUtc.gte(from));
    }
    if let Some(to) = filter.to_date_utc {
        query = query.filter(receipt::Column::TransactionDateUtc.lte(to));
    }

    let query = query
        .order_by_desc(receipt::Column::TransactionDateUtc)
        .order_by_desc(receipt::Column::Id)
        .find_also_related(Store);

    let mut page = fetch_page(db, query, PageRequest::new(filter.page, filter.page_size)).await?;
    let rows = std::mem::take(&mut page.items);

    let receipt_ids: Vec<Uuid> = rows.iter().map(|(r, _)| r.id).collect();
    let mut items = load_items(db, user_id, &receipt_ids, filter.product_id).await?;

    let details = rows
        .into_iter()
        .map(|(receipt, store)| ReceiptDetails {
            items: items.remove(&receipt.id).unwrap_or_default(),
            store: store.filter(|s| s.user_id == user_id),
            receipt,
        })
        .collect();

    Ok(page.with_items(details))
}

/// Ids of receipts with at least one line whose product's folded name contains `term`.
fn receipts_with_product_named(term: &str) -> SelectStatement {
    Query::select()
        .column((ReceiptItem, receipt_item::Column::ReceiptId))
        .from(ReceiptItem)
        .inner_join(
            Product,
            Expr::col((Product, product::Column::Id))
                .equals((ReceiptItem, receipt_item::Column::ProductId)),
        )
        .and_where(product::Column::NormalizedName.like(text::contains_pattern(term)))
        .to_owned()
}

/// Loads the lines of `receipt_ids` grouped by receipt, optionally only those of one product.
///
/// Products owned by anyone but `user_id` are left unresolved.
async fn load_items<C>(
    db: &C,
    user_id: &str,
    receipt_ids: &[Uuid],
    product_id: Option<Uuid>,
) -> Result<HashMap<Uuid, Vec<ReceiptItemDetails>>>
where
    C: ConnectionTrait,
{
    let mut grouped: HashMap<Uuid, Vec<ReceiptItemDetails>> = HashMap::new();
    if receipt_ids.is_empty() {
        return Ok(grouped);
    }

    let mut query =
        ReceiptItem::find().filter(receipt_item::Column::ReceiptId.is_in(receipt_ids.to_vec()));
    if let Some(product_id) = product_id {
        query = query.filter(receipt_item::Column::ProductId.eq(product_id));
    }

    let rows = query
        .order_by_asc(receipt_item::Column::Id)
        .find_also_related(Product)
        .all(db)
        .await?;

    for (item, product) in rows {
        grouped
            .entry(item.receipt_id)
            .or_default()
            .push(ReceiptItemDetails {
                item,
                product: product.filter(|p| p.user_id == user_id),
            });
    }

    Ok(grouped)
}

/// Fetches one of the user's receipts with its store and every line.
pub async fn get_receipt<C>(db: &C, user_id: &str, id: Uuid) -> Result<Option<ReceiptDetails>>
where
    C: ConnectionTrait,
{
    let Some((receipt, store)) = Receipt::find_by_id(id)
        .filter(receipt::Column::UserId.eq(user_id))
        .find_also_related(Store)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let mut items = load_items(db, user_id, &[receipt.id], None).await?;
    Ok(Some(ReceiptDetails {
        items: items.remove(&receipt.id).unwrap_or_default(),
        store: store.filter(|s| s.user_id == user_id),
        receipt,
    }))
}

/// Inserts a receipt and its lines in one transaction.
///
/// Lines with a zero quantity are dropped before the insert. A store or product
/// that is not the user's makes the whole write `Restricted`.
#[instrument(skip(db, input), fields(receipt_id = %input.id))]
pub async fn create_receipt<C>(db: &C, user_id: &str, input: ReceiptInput) -> WriteOutcome
where
    C: ConnectionTrait + TransactionTrait,
{
    match insert_receipt(db, user_id, input).await {
        Ok(outcome) => outcome,
        Err(e) => outcome::write_failed("create_receipt", &e),
    }
}

async fn insert_receipt<C>(
    db: &C,
    user_id: &str,
    input: ReceiptInput,
) -> std::result::Result<WriteOutcome, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let receipt_id = input.id;
    let items: Vec<receipt_item::Model> = input
        .items
        .into_iter()
        .filter(|item| !item.quantity.is_zero())
        .map(|item| new_item(receipt_id, item))
        .collect();
    let product_ids: Vec<Uuid> = items.iter().filter_map(|item| item.product_id).collect();

    let model = receipt::ActiveModel {
        id: Set(receipt_id),
        user_id: Set(user_id.to_string()),
        source_id: Set(input.source_id),
        transaction_date_utc: Set(input.transaction_date_utc),
        store_id: Set(input.store_id),
        discount: Set(input.discount),
    };

    let txn = db.begin().await?;
    if !references_are_owned(&txn, user_id, input.store_id, &product_ids).await? {
        return Ok(WriteOutcome::Restricted);
    }

    let rows = Receipt::insert(model).exec_without_returning(&txn).await?;
    if !items.is_empty() {
        ReceiptItem::insert_many(items.into_iter().map(insertable))
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    Ok(WriteOutcome::from_rows_affected(rows))
}

/// The three sets produced by reconciling stored lines with incoming ones.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ItemChanges {
    /// Stored line ids absent from the incoming set
    pub removed: Vec<Uuid>,
    /// Incoming lines whose id is already stored
    pub updated: Vec<receipt_item::Model>,
    /// Incoming lines with no stored counterpart
    pub added: Vec<receipt_item::Model>,
}

/// Splits `incoming` against the ids already stored for `receipt_id`.
///
/// Lines without an id get a fresh one and are always added. `removed` is
/// sorted so the resulting statements are deterministic.
#[must_use]
pub fn plan_item_changes(
    receipt_id: Uuid,
    stored_ids: &HashSet<Uuid>,
    incoming: Vec<ReceiptItemInput>,
) -> ItemChanges {
    let mut changes = ItemChanges::default();
    let mut kept = HashSet::new();

    for input in incoming {
        let item = new_item(receipt_id, input);
        if stored_ids.contains(&item.id) {
            kept.insert(item.id);
            changes.updated.push(item);
        } else {
            changes.added.push(item);
        }
    }

    changes.removed = stored_ids.difference(&kept).copied().collect();
    changes.removed.sort_unstable();
    changes
}

/// Overwrites a receipt and reconciles its lines in one transaction.
///
/// Like [`create_receipt`], referencing another user's store or product is `Restricted`.
#[instrument(skip(db, input), fields(receipt_id = %input.id))]
pub async fn update_receipt<C>(db: &C, user_id: &str, input: ReceiptInput) -> WriteOutcome
where
    C: ConnectionTrait + TransactionTrait,
{
    match reconcile_receipt(db, user_id, input).await {
        Ok(outcome) => outcome,
        Err(e) => outcome::write_failed("update_receipt", &e),
    }
}

async fn reconcile_receipt<C>(
    db: &C,
    user_id: &str,
    input: ReceiptInput,
) -> std::result::Result<WriteOutcome, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let Some(existing) = Receipt::find_by_id(input.id)
        .filter(receipt::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
    else {
        return Ok(WriteOutcome::NotFound);
    };

    let product_ids: Vec<Uuid> = input.items.iter().filter_map(|item| item.product_id).collect();
    if !references_are_owned(&txn, user_id, input.store_id, &product_ids).await? {
        return Ok(WriteOutcome::Restricted);
    }

    let stored_ids: HashSet<Uuid> = ReceiptItem::find()
        .select_only()
        .column(receipt_item::Column::Id)
        .filter(receipt_item::Column::ReceiptId.eq(existing.id))
        .into_tuple::<Uuid>()
        .all(&txn)
        .await?
        .into_iter()
        .collect();

    let changes = plan_item_changes(existing.id, &stored_ids, input.items);
    debug!(
        removed = changes.removed.len(),
        updated = changes.updated.len(),
        added = changes.added.len(),
        "reconciling receipt items"
    );

    if !changes.removed.is_empty() {
        ReceiptItem::delete_many()
            .filter(receipt_item::Column::Id.is_in(changes.removed))
            .exec(&txn)
            .await?;
    }

    for item in changes.updated {
        let id = item.id;
        ReceiptItem::update_many()
            .set(overwrite(item))
            .filter(receipt_item::Column::Id.eq(id))
            .filter(receipt_item::Column::ReceiptId.eq(existing.id))
            .exec(&txn)
            .await?;
    }

    if !changes.added.is_empty() {
        let added = changes.added.into_iter().map(insertable);
        ReceiptItem::insert_many(added)
            .exec_without_returning(&txn)
            .await?;
    }

    let mut model: receipt::ActiveModel = existing.into();
    model.source_id = Set(input.source_id);
    model.transaction_date_utc = Set(input.transaction_date_utc);
    model.store_id = Set(input.store_id);
    model.discount = Set(input.discount);

    let result = Receipt::update_many()
        .set(model)
        .filter(receipt::Column::Id.eq(input.id))
        .filter(receipt::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(WriteOutcome::from_rows_affected(result.rows_affected))
}

/// Overwrites a single line of one of the user's receipts.
///
/// `NotFound` when the line has no id, or the line or its receipt is not the user's.
/// `Restricted` when the new product is not the user's.
#[instrument(skip(db, input))]
pub async fn update_receipt_item<C>(
    db: &C,
    user_id: &str,
    receipt_id: Uuid,
    input: ReceiptItemInput,
) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let Some(item_id) = input.id else {
        return WriteOutcome::NotFound;
    };

    let existing = ReceiptItem::find_by_id(item_id)
        .filter(receipt_item::Column::ReceiptId.eq(receipt_id))
        .join(JoinType::InnerJoin, receipt_item::Relation::Receipt.def())
        .filter(receipt::Column::UserId.eq(user_id))
        .one(db)
        .await;

    match existing {
        Ok(Some(_)) => {}
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before update failed: {e}");
            return WriteOutcome::Error;
        }
    }

    let product_ids: Vec<Uuid> = input.product_id.into_iter().collect();
    match references_are_owned(db, user_id, None, &product_ids).await {
        Ok(true) => {}
        Ok(false) => return WriteOutcome::Restricted,
        Err(e) => return outcome::write_failed("update_receipt_item", &e),
    }

    let result = ReceiptItem::update_many()
        .set(overwrite(new_item(receipt_id, input)))
        .filter(receipt_item::Column::Id.eq(item_id))
        .filter(receipt_item::Column::ReceiptId.eq(receipt_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("update_receipt_item", &e),
    }
}

/// Deletes one of the user's receipts; its lines go with it.
#[instrument(skip(db))]
pub async fn delete_receipt<C>(db: &C, user_id: &str, id: Uuid) -> WriteOutcome
where
    C: ConnectionTrait,
{
    let existing = Receipt::find_by_id(id)
        .filter(receipt::Column::UserId.eq(user_id))
        .one(db)
        .await;

    match existing {
        Ok(Some(_)) => {}
        Ok(None) => return WriteOutcome::NotFound,
        Err(e) => {
            debug!("lookup before delete failed: {e}");
            return WriteOutcome::Error;
        }
    }

    let result = Receipt::delete_many()
        .filter(receipt::Column::Id.eq(id))
        .filter(receipt::Column::UserId.eq(user_id))
        .exec(db)
        .await;

    match result {
        Ok(res) => WriteOutcome::from_rows_affected(res.rows_affected),
        Err(e) => outcome::write_failed("delete_receipt", &e),
    }
}

/// Whether another of the user's receipts was created from `source_id`.
pub async fn exists_by_source_id<C>(
    db: &C,
    user_id: &str,
    source_id: &str,
    exclude_id: Option<Uuid>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Receipt::find()
        .filter(receipt::Column::UserId.eq(user_id))
        .filter(receipt::Column::SourceId.eq(source_id));

    if let Some(id) = exclude_id {
        query = query.filter(receipt::Column::Id.ne(id));
    }

    Ok(query.count(db).await? > 0)
}

/// Whether another of the user's receipts has the same store and exact timestamp.
///
/// Always `false`, without a query, when either value is missing.
pub async fn exists_by_store_id_and_date<C>(
    db: &C,
    user_id: &str,
    store_id: Option<Uuid>,
    transaction_date_utc: Option<DateTime<Utc>>,
    exclude_id: Option<Uuid>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let (Some(store_id), Some(date)) = (store_id, transaction_date_utc) else {
        return Ok(false);
    };

    let mut query = Receipt::find()
        .filter(receipt::Column::UserId.eq(user_id))
        .filter(receipt::Column::StoreId.eq(store_id))
        .filter(receipt::Column::TransactionDateUtc.eq(date));

    if let Some(id) = exclude_id {
        query = query.filter(receipt::Column::Id.ne(id));
    }

    Ok(query.count(db).await? > 0)
}

/// Whether the user already has a receipt at `transaction_date_utc` from a
/// store whose source name matches, ignoring case.
pub async fn exists_by_store_source_name_and_date<C>(
    db: &C,
    user_id: &str,
    store_source_name: &str,
    transaction_date_utc: DateTime<Utc>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Receipt::find()
        .join(JoinType::InnerJoin, receipt::Relation::Store.def())
        .filter(receipt::Column::UserId.eq(user_id))
        .filter(receipt::Column::TransactionDateUtc.eq(transaction_date_utc))
        .filter(store::Column::SourceNameLower.eq(text::lower(store_source_name)))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Product of the user's most recent line whose source description matches
/// `description`, ignoring case.
///
/// "Most recent" is decided by the receipt's transaction date; undated
/// receipts lose to dated ones.
#[instrument(skip(db))]
pub async fn get_product_by_source_description<C>(
    db: &C,
    user_id: &str,
    description: &str,
) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    let description = description.trim();
    if description.is_empty() {
        return Ok(None);
    }

    let product_id = ReceiptItem::find()
        .select_only()
        .column(receipt_item::Column::ProductId)
        .join(JoinType::InnerJoin, receipt_item::Relation::Receipt.def())
        .filter(receipt::Column::UserId.eq(user_id))
        .filter(receipt_item::Column::ProductId.is_not_null())
        .filter(receipt_item::Column::SourceDescriptionLower.eq(text::lower(description)))
        .order_by_desc(receipt::Column::TransactionDateUtc)
        .order_by_desc(receipt_item::Column::Id)
        .into_tuple::<Uuid>()
        .one(db)
        .await?;

    match product_id {
        Some(id) => get_product(db, user_id, id).await,
        None => Ok(None),
    }
}

/// Whether the store and every product a write points at belong to `user_id`.
///
/// Foreign keys only prove the rows exist; ownership is checked here.
async fn references_are_owned<C>(
    db: &C,
    user_id: &str,
    store_id: Option<Uuid>,
    product_ids: &[Uuid],
) -> std::result::Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(store_id) = store_id {
        let owned = Store::find_by_id(store_id)
            .filter(store::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        if owned == 0 {
            debug!(%store_id, "store is not the user's");
            return Ok(false);
        }
    }

    let wanted: HashSet<Uuid> = product_ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(true);
    }

    let owned = Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .filter(product::Column::Id.is_in(wanted.iter().copied()))
        .count(db)
        .await?;
    if owned != u64::try_from(wanted.len()).unwrap_or(u64::MAX) {
        debug!(wanted = wanted.len(), owned, "some products are not the user's");
        return Ok(false);
    }
    Ok(true)
}

fn new_item(receipt_id: Uuid, input: ReceiptItemInput) -> receipt_item::Model {
    receipt_item::Model {
        id: input.id.unwrap_or_else(Uuid::new_v4),
        receipt_id,
        product_id: input.product_id,
        source_description_lower: input.source_description.as_deref().map(text::lower),
        source_description: input.source_description,
        quantity: input.quantity,
        amount: input.amount,
    }
}

fn insertable(item: receipt_item::Model) -> receipt_item::ActiveModel {
    receipt_item::ActiveModel {
        id: Set(item.id),
        receipt_id: Set(item.receipt_id),
        product_id: Set(item.product_id),
        source_description: Set(item.source_description),
        source_description_lower: Set(item.source_description_lower),
        quantity: Set(item.quantity),
        amount: Set(item.amount),
    }
}

/// Every column but the key, for `UPDATE ... SET`.
fn overwrite(item: receipt_item::Model) -> receipt_item::ActiveModel {
    receipt_item::ActiveModel {
        id: NotSet,
        ..insertable(item)
    }
}
