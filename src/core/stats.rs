//! Spending statistics - sums of line amounts bucketed by day, ISO week or month.
//!
//! Rows are fetched as `(transaction_date, amount)` pairs and bucketed in Rust:
//! `SQLite` has no ISO week function, and chrono's [`Datelike::iso_week`] handles
//! the weeks that straddle two calendar years. Receipt discounts are not part of
//! these sums. Empty buckets are omitted.

use crate::{
    entities::{ReceiptItem, receipt, receipt_item},
    errors::Result,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    /// One bucket per calendar day
    #[default]
    Daily,
    /// One bucket per ISO-8601 week, anchored on its Monday
    Weekly,
    /// One bucket per calendar month, anchored on its first day
    Monthly,
}

/// Query parameters for [`get_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatFilter {
    /// Bucket width
    #[serde(default)]
    pub period: Period,
    /// Inclusive start of the window
    pub date_start_utc: DateTime<Utc>,
    /// Inclusive end of the window
    pub date_end_utc: DateTime<Utc>,
}

/// Total spent in one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stat {
    /// Start of the bucket, midnight UTC
    pub date: DateTime<Utc>,
    /// Sum of line amounts in the bucket
    pub amount: Decimal,
}

/// First day of the bucket that contains `at`.
#[must_use]
pub fn bucket_anchor(period: Period, at: DateTime<Utc>) -> NaiveDate {
    let day = at.date_naive();
    match period {
        Period::Daily => day,
        // The ISO week starts on Monday, even when that Monday is in the previous year.
        Period::Weekly => day - chrono::Days::new(u64::from(day.weekday().num_days_from_monday())),
        Period::Monthly => day.with_day(1).unwrap_or(day),
    }
}

/// Sums `rows` into ascending, sparse buckets.
#[must_use]
pub fn aggregate<I>(period: Period, rows: I) -> Vec<Stat>
where
    I: IntoIterator<Item = (DateTime<Utc>, Decimal)>,
{
    let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (at, amount) in rows {
        *buckets.entry(bucket_anchor(period, at)).or_default() += amount;
    }

    buckets
        .into_iter()
        .map(|(day, amount)| Stat {
            date: day.and_time(chrono::NaiveTime::MIN).and_utc(),
            amount,
        })
        .collect()
}

/// Spending of `user_id` inside the filter window, bucketed by `filter.period`.
///
/// An inverted window yields an empty series without touching the database.
#[instrument(skip(db))]
pub async fn get_stats<C>(db: &C, user_id: &str, filter: &StatFilter) -> Result<Vec<Stat>>
where
    C: ConnectionTrait,
{
    if filter.date_start_utc > filter.date_end_utc {
        debug!("empty stats window");
        return Ok(Vec::new());
    }

    let rows: Vec<(DateTime<Utc>, Decimal)> = ReceiptItem::find()
        .select_only()
        .column(receipt::Column::TransactionDateUtc)
        .column(receipt_item::Column::Amount)
        .join(JoinType::InnerJoin, receipt_item::Relation::Receipt.def())
        .filter(receipt::Column::UserId.eq(user_id))
        .filter(receipt::Column::TransactionDateUtc.is_not_null())
        .filter(receipt::Column::TransactionDateUtc.gte(filter.date_start_utc))
        .filter(receipt::Column::TransactionDateUtc.lte(filter.date_end_utc))
        .into_tuple()
        .all(db)
        .await?;

    debug!(rows = rows.len(), "bucketing receipt lines");
    Ok(aggregate(filter.period, rows))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{IsoWeek, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_anchor_truncates_time() {
        assert_eq!(bucket_anchor(Period::Daily, at(2024, 2, 29, 23)), day(2024, 2, 29));
    }

    #[test]
    fn test_monthly_anchor() {
        assert_eq!(bucket_anchor(Period::Monthly, at(2024, 2, 29, 10)), day(2024, 2, 1));
        assert_eq!(bucket_anchor(Period::Monthly, at(2024, 12, 1, 0)), day(2024, 12, 1));
    }

    #[test]
    fn test_weekly_anchor_across_year_boundary() {
        // 2024-12-30 is the Monday of ISO week 1 of 2025.
        let monday = at(2024, 12, 30, 9);
        let thursday = at(2025, 1, 2, 18);
        let week: IsoWeek = thursday.iso_week();
        assert_eq!((week.year(), week.week()), (2025, 1));
        assert_eq!(monday.iso_week(), week);

        assert_eq!(bucket_anchor(Period::Weekly, monday), day(2024, 12, 30));
        assert_eq!(bucket_anchor(Period::Weekly, thursday), day(2024, 12, 30));

        // 2021-01-03 is a Sunday in ISO week 53 of 2020.
        assert_eq!(bucket_anchor(Period::Weekly, at(2021, 1, 3, 12)), day(2020, 12, 28));
    }

    #[test]
    fn test_aggregate_is_sparse_and_ascending() {
        let rows = vec![
            (at(2024, 3, 10, 8), Decimal::from(5)),
            (at(2024, 1, 5, 8), Decimal::from(2)),
            (at(2024, 3, 1, 8), Decimal::from(-1)),
        ];

        let stats = aggregate(Period::Monthly, rows);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].date, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(stats[0].amount, Decimal::from(2));
        assert_eq!(stats[1].date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(stats[1].amount, Decimal::from(4));
    }

    #[tokio::test]
    async fn test_inverted_window_skips_query() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let filter = StatFilter {
            period: Period::Daily,
            date_start_utc: at(2024, 5, 2, 0),
            date_end_utc: at(2024, 5, 1, 0),
        };

        assert!(get_stats(&db, USER, &filter).await?.is_empty());
        assert!(db.into_transaction_log().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_weekly_stats_from_database() -> Result<()> {
        let db = setup_test_db().await?;
        let store = create_test_store(&db, USER, "Market").await?;
        let milk = create_test_product(&db, USER, "Milk").await?;
        let bread = create_test_product(&db, USER, "Bread").await?;

        let mut first = receipt_input(
            store.id,
            at(2024, 12, 30, 10),
            vec![item_input(milk.id, 1, 100), item_input(bread.id, 1, 50)],
        );
        first.discount = Decimal::from(-20);
        let created = crate::core::receipt::create_receipt(&db, USER, first).await;
        assert!(created.is_success());
        create_test_receipt(
            &db,
            USER,
            store.id,
            at(2025, 1, 2, 19),
            vec![item_input(milk.id, 1, 75)],
        )
        .await?;
        create_test_receipt(
            &db,
            USER,
            store.id,
            at(2025, 1, 20, 8),
            vec![item_input(milk.id, 1, 10)],
        )
        .await?;

        let filter = StatFilter {
            period: Period::Weekly,
            date_start_utc: at(2024, 12, 1, 0),
            date_end_utc: at(2025, 1, 31, 0),
        };
        let stats = get_stats(&db, USER, &filter).await?;

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].date, Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap());
        assert_eq!(stats[0].amount, Decimal::from(225));
        assert_eq!(stats[1].date, Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap());
        assert_eq!(stats[1].amount, Decimal::from(10));

        Ok(())
    }

    #[tokio::test]
    async fn test_window_is_inclusive_and_scoped() -> Result<()> {
        let db = setup_test_db().await?;
        let store = create_test_store(&db, USER, "Market").await?;
        let milk = create_test_product(&db, USER, "Milk").await?;
        let theirs = create_test_store(&db, OTHER_USER, "Market").await?;
        let their_milk = create_test_product(&db, OTHER_USER, "Milk").await?;

        let edge = at(2024, 6, 1, 0);
        create_test_receipt(&db, USER, store.id, edge, vec![item_input(milk.id, 1, 40)]).await?;
        create_test_receipt(
            &db,
            USER,
            store.id,
            at(2024, 6, 3, 0),
            vec![item_input(milk.id, 1, 1)],
        )
        .await?;
        create_test_receipt(
            &db,
            OTHER_USER,
            theirs.id,
            edge,
            vec![item_input(their_milk.id, 1, 99)],
        )
        .await?;

        let filter = StatFilter {
            period: Period::Daily,
            date_start_utc: edge,
            date_end_utc: edge,
        };
        let stats = get_stats(&db, USER, &filter).await?;
        let midnight = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(stats, vec![Stat { date: midnight, amount: Decimal::from(40) }]);

        Ok(())
    }
}
