//! Sizing repository - Read-only access to units of measure.
//!
//! Conversion follows the two-level hierarchy: every unit is expressed in its
//! root unit (a root converts to itself with factor 1, a child with
//! `1 / proportion`), and two units convert only when they share a root.

use crate::{
    entities::{Sizing, sizing},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder};

/// Lists every sizing ordered by id.
pub async fn list_sizings<C>(db: &C) -> Result<Vec<sizing::Model>>
where
    C: ConnectionTrait,
{
    Sizing::find()
        .order_by_asc(sizing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fetches a sizing by id.
pub async fn get_sizing<C>(db: &C, id: i32) -> Result<Option<sizing::Model>>
where
    C: ConnectionTrait,
{
    Sizing::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Root unit id and how many root units one `unit` is worth.
fn to_root(unit: &sizing::Model) -> Option<(i32, Decimal)> {
    match (unit.parent_id, unit.proportion) {
        (None, _) => Some((unit.id, Decimal::ONE)),
        (Some(parent), Some(proportion)) => Some((parent, Decimal::ONE.checked_div(proportion)?)),
        (Some(_), None) => None,
    }
}

/// Factor that turns a quantity in `from` into a quantity in `to`.
///
/// `None` when the units measure different dimensions or a proportion is zero.
#[must_use]
pub fn conversion_factor(from: &sizing::Model, to: &sizing::Model) -> Option<Decimal> {
    if from.id == to.id {
        return Some(Decimal::ONE);
    }

    let (from_root, from_factor) = to_root(from)?;
    let (to_root_id, to_factor) = to_root(to)?;
    if from_root != to_root_id {
        return None;
    }

    from_factor.checked_div(to_factor)
}

/// Converts `value` between two sizings, `None` if either is unknown or they are incompatible.
pub async fn convert<C>(db: &C, value: Decimal, from_id: i32, to_id: i32) -> Result<Option<Decimal>>
where
    C: ConnectionTrait,
{
    let Some(from) = get_sizing(db, from_id).await? else {
        return Ok(None);
    };
    let Some(to) = get_sizing(db, to_id).await? else {
        return Ok(None);
    };

    Ok(conversion_factor(&from, &to).and_then(|factor| value.checked_mul(factor)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    fn unit(id: i32, parent_id: Option<i32>, proportion: Option<i64>) -> sizing::Model {
        sizing::Model {
            id,
            name: format!("unit-{id}"),
            parent_id,
            proportion: proportion.map(Decimal::from),
        }
    }

    #[test]
    fn test_conversion_factor_within_dimension() {
        let litre = unit(1, None, None);
        let ml = unit(2, Some(1), Some(1000));
        let cl = unit(3, Some(1), Some(100));

        assert_eq!(conversion_factor(&litre, &ml), Some(Decimal::from(1000)));
        assert_eq!(conversion_factor(&ml, &litre), Some(Decimal::new(1, 3)));
        assert_eq!(conversion_factor(&cl, &ml), Some(Decimal::from(10)));
        assert_eq!(conversion_factor(&ml, &ml), Some(Decimal::ONE));
    }

    #[test]
    fn test_conversion_factor_across_dimensions() {
        let litre = unit(1, None, None);
        let gram = unit(5, Some(4), Some(1000));
        let each = unit(6, None, None);

        assert_eq!(conversion_factor(&litre, &gram), None);
        assert_eq!(conversion_factor(&each, &litre), None);
    }

    #[test]
    fn test_zero_proportion_is_not_convertible() {
        let root = unit(1, None, None);
        let broken = unit(9, Some(1), Some(0));
        assert_eq!(conversion_factor(&root, &broken), None);
    }

    #[tokio::test]
    async fn test_seeded_sizings() -> Result<()> {
        let db = setup_test_db().await?;

        let names: Vec<_> = list_sizings(&db).await?.into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["L", "ml", "cl", "Kg", "g", "u"]);
        assert_eq!(get_sizing(&db, 5).await?.unwrap().parent_id, Some(4));
        assert!(get_sizing(&db, 42).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_convert() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(
            convert(&db, Decimal::new(15, 1), 4, 5).await?,
            Some(Decimal::from(1500))
        );
        assert_eq!(convert(&db, Decimal::from(250), 2, 3).await?, Some(Decimal::from(25)));
        assert_eq!(convert(&db, Decimal::ONE, 1, 4).await?, None);
        assert_eq!(convert(&db, Decimal::ONE, 1, 99).await?, None);

        Ok(())
    }
}
