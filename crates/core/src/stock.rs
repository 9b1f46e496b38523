//! Stock aggregation and availability analytics.
//!
//! Everything here is pure: repositories load rows, these functions
//! decide what the numbers mean.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PartId, StockStatus};

/// Errors from stock mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("stock quantity overflow")]
    Overflow,
}

/// Whether an entry with this status counts as on hand.
///
/// Entries without a status are on hand.
#[must_use]
pub fn is_on_hand(status: Option<StockStatus>) -> bool {
    status.is_none_or(StockStatus::is_on_hand)
}

/// Sum of on-hand quantities.
pub fn on_hand_total<I>(entries: I) -> i64
where
    I: IntoIterator<Item = (i32, Option<StockStatus>)>,
{
    entries
        .into_iter()
        .filter(|(_, status)| is_on_hand(*status))
        .map(|(qty, _)| i64::from(qty))
        .sum()
}

/// Stock level of a part relative to its low-stock threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockLevel {
    /// No threshold configured and some stock on hand.
    Untracked,
    Ok,
    Low,
    Out,
}

/// Classify an on-hand total against an optional threshold.
#[must_use]
pub fn stock_level(total: i64, threshold: Option<i32>) -> StockLevel {
    if total <= 0 {
        return StockLevel::Out;
    }
    match threshold {
        None => StockLevel::Untracked,
        Some(t) if total <= i64::from(t) => StockLevel::Low,
        Some(_) => StockLevel::Ok,
    }
}

/// Largest attrition percentage a part may carry.
pub const MAX_ATTRITION_PERCENT: f64 = 1000.0;

/// Quantity needed for `builds` builds, including attrition.
///
/// `ceil(per_build * builds * (1 + percent / 100)) + attrition_quantity`,
/// never negative.
pub fn required_quantity(
    per_build: i32,
    builds: u32,
    attrition_percent: f64,
    attrition_quantity: i32,
) -> Result<i64, StockError> {
    let base = i64::from(per_build)
        .checked_mul(i64::from(builds))
        .ok_or(StockError::Overflow)?;
    if base <= 0 {
        return Ok(0);
    }

    let factor = Decimal::try_from(attrition_percent.max(0.0))
        .map_err(|_| StockError::Overflow)?
        / Decimal::ONE_HUNDRED
        + Decimal::ONE;
    let scaled = (Decimal::from(base) * factor)
        .ceil()
        .to_i64()
        .ok_or(StockError::Overflow)?;

    scaled
        .checked_add(i64::from(attrition_quantity.max(0)))
        .ok_or(StockError::Overflow)
}

/// One BOM line.
#[derive(Debug, Clone, PartialEq)]
pub struct BomLine {
    pub part_id: PartId,
    /// Parts that may stand in for `part_id`, tried in order.
    pub substitute_ids: Vec<PartId>,
    pub per_build: i32,
    pub attrition_percent: f64,
    pub attrition_quantity: i32,
}

/// Availability of a single BOM line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAvailability {
    pub part_id: PartId,
    pub required: i64,
    /// On-hand stock of the part itself.
    pub on_hand: i64,
    /// On-hand stock across the line's substitutes.
    pub substitute_on_hand: i64,
    /// Units left unallocated once every line has drawn on the shared stock.
    pub shortfall: i64,
}

/// Whether a BOM can be built, and how many times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub builds: u32,
    pub can_build: bool,
    /// `None` when no line consumes stock.
    pub max_buildable: Option<i64>,
    pub lines: Vec<LineAvailability>,
}

/// Check BOM lines against on-hand stock keyed by part.
///
/// Each unit of stock is allocated to one line only, so a part used on
/// several lines, or as both a primary and a substitute, is not counted
/// twice. Lines draw on their own part first; what remains is then filled
/// from substitutes in line order.
pub fn build_report(
    lines: &[BomLine],
    on_hand: &BTreeMap<PartId, i64>,
    builds: u32,
) -> Result<BuildReport, StockError> {
    let required = demands(lines, builds)?;
    let unmet = allocate(lines, &required, on_hand);
    let pool = |id: &PartId| on_hand.get(id).copied().unwrap_or(0).max(0);

    let out: Vec<LineAvailability> = lines
        .iter()
        .zip(required)
        .zip(unmet)
        .map(|((line, required), shortfall)| LineAvailability {
            part_id: line.part_id,
            required,
            on_hand: pool(&line.part_id),
            substitute_on_hand: line
                .substitute_ids
                .iter()
                .filter(|id| **id != line.part_id)
                .map(pool)
                .sum(),
            shortfall,
        })
        .collect();

    Ok(BuildReport {
        builds,
        can_build: out.iter().all(|l| l.shortfall == 0),
        max_buildable: max_buildable(lines, on_hand),
        lines: out,
    })
}

fn demands(lines: &[BomLine], builds: u32) -> Result<Vec<i64>, StockError> {
    lines
        .iter()
        .map(|line| {
            required_quantity(
                line.per_build,
                builds,
                line.attrition_percent,
                line.attrition_quantity,
            )
        })
        .collect()
}

/// Allocate stock to `demands`; returns what each line is still missing.
fn allocate(lines: &[BomLine], demands: &[i64], on_hand: &BTreeMap<PartId, i64>) -> Vec<i64> {
    let mut pools: BTreeMap<PartId, i64> = on_hand.iter().map(|(id, q)| (*id, (*q).max(0))).collect();
    let mut unmet = demands.to_vec();

    for (line, need) in lines.iter().zip(unmet.iter_mut()) {
        take(&mut pools, line.part_id, need);
    }
    for (line, need) in lines.iter().zip(unmet.iter_mut()) {
        for id in &line.substitute_ids {
            if *need == 0 {
                break;
            }
            take(&mut pools, *id, need);
        }
    }
    unmet
}

fn take(pools: &mut BTreeMap<PartId, i64>, part_id: PartId, need: &mut i64) {
    if let Some(pool) = pools.get_mut(&part_id) {
        let used = (*pool).min(*need);
        *pool -= used;
        *need -= used;
    }
}

/// Largest build count the shared stock covers.
fn max_buildable(lines: &[BomLine], on_hand: &BTreeMap<PartId, i64>) -> Option<i64> {
    if !lines.iter().any(|l| l.per_build > 0) {
        return None;
    }
    // A requirement that overflows i64 cannot fit.
    let fits = |n: u32| {
        demands(lines, n)
            .map(|d| allocate(lines, &d, on_hand).iter().all(|u| *u == 0))
            .unwrap_or(false)
    };

    // Every consuming line needs at least one unit per build, and the
    // allocation is monotonic in the build count, so binary search.
    let stock: i64 = on_hand.values().map(|q| (*q).max(0)).sum();
    let mut lo = 0_u32;
    let mut hi = u32::try_from(stock).unwrap_or(u32::MAX);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Some(i64::from(lo))
}

/// A stock entry as far as valuation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedStock {
    pub quantity: i32,
    pub status: Option<StockStatus>,
    pub price_unit: Option<Decimal>,
    pub currency: String,
}

/// Total value of on-hand priced stock per currency.
///
/// Entries without a currency are counted under `default_currency`.
#[must_use]
pub fn inventory_value(entries: &[ValuedStock], default_currency: &str) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for entry in entries {
        if !is_on_hand(entry.status) || entry.quantity <= 0 {
            continue;
        }
        let Some(price) = entry.price_unit else {
            continue;
        };
        let currency = if entry.currency.is_empty() {
            default_currency
        } else {
            entry.currency.as_str()
        };
        *totals
            .entry(currency.to_string())
            .or_insert(Decimal::ZERO) += price * Decimal::from(entry.quantity);
    }
    totals
}

/// How a move request applies to a stock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// The whole entry changes location.
    Whole,
    /// `remaining` stays behind, the rest moves into a new or merged entry.
    Split { remaining: i32 },
}

/// Decide how to move `requested` units out of an entry holding `available`.
pub fn plan_move(available: i32, requested: i32) -> Result<MovePlan, StockError> {
    if requested <= 0 {
        return Err(StockError::InvalidQuantity(requested));
    }
    match available.cmp(&requested) {
        std::cmp::Ordering::Less => Err(StockError::Insufficient {
            available,
            requested,
        }),
        std::cmp::Ordering::Equal => Ok(MovePlan::Whole),
        std::cmp::Ordering::Greater => Ok(MovePlan::Split {
            remaining: available - requested,
        }),
    }
}

/// Apply a signed delta, refusing to go below zero.
pub fn apply_adjustment(current: i32, delta: i32) -> Result<i32, StockError> {
    let next = current.checked_add(delta).ok_or(StockError::Overflow)?;
    if next < 0 {
        return Err(StockError::Insufficient {
            available: current,
            requested: delta.saturating_neg(),
        });
    }
    Ok(next)
}

/// What a storage location holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Occupancy {
    Empty,
    Single,
    Mixed,
}

impl Occupancy {
    /// Classify from the number of distinct parts stored.
    #[must_use]
    pub const fn from_part_count(count: i64) -> Self {
        match count {
            i64::MIN..=0 => Self::Empty,
            1 => Self::Single,
            _ => Self::Mixed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_hand_includes_unset_and_available() {
        assert!(is_on_hand(None));
        assert!(is_on_hand(Some(StockStatus::Available)));
        assert!(!is_on_hand(Some(StockStatus::Ordered)));

        let total = on_hand_total([
            (5, None),
            (3, Some(StockStatus::Available)),
            (100, Some(StockStatus::Reserved)),
        ]);
        assert_eq!(total, 8);
    }

    #[test]
    fn test_stock_level() {
        assert_eq!(stock_level(0, None), StockLevel::Out);
        assert_eq!(stock_level(4, None), StockLevel::Untracked);
        assert_eq!(stock_level(10, Some(10)), StockLevel::Low);
        assert_eq!(stock_level(11, Some(10)), StockLevel::Ok);
        assert_eq!(stock_level(-2, Some(10)), StockLevel::Out);
    }

    #[test]
    fn test_required_quantity_with_attrition() {
        assert_eq!(required_quantity(2, 10, 0.0, 0), Ok(20));
        // 20 * 1.05 = 21
        assert_eq!(required_quantity(2, 10, 5.0, 0), Ok(21));
        // 3 * 1.1 = 3.3, rounds up
        assert_eq!(required_quantity(3, 1, 10.0, 2), Ok(6));
        assert_eq!(required_quantity(0, 10, 10.0, 5), Ok(0));
    }

    fn line(part_id: PartId, per_build: i32, substitute_ids: Vec<PartId>) -> BomLine {
        BomLine {
            part_id,
            substitute_ids,
            per_build,
            attrition_percent: 0.0,
            attrition_quantity: 0,
        }
    }

    #[test]
    fn test_build_report_counts_substitutes() {
        let (a, s, b) = (PartId::new_v4(), PartId::new_v4(), PartId::new_v4());
        let lines = [line(a, 4, vec![s]), line(b, 1, vec![])];
        let stock = BTreeMap::from([(a, 10), (s, 2), (b, 100)]);

        let report = build_report(&lines, &stock, 3).expect("report");
        assert!(report.can_build);
        assert_eq!(report.max_buildable, Some(3));
        assert_eq!(report.lines[0].required, 12);
        assert_eq!(report.lines[0].on_hand, 10);
        assert_eq!(report.lines[0].substitute_on_hand, 2);
        assert_eq!(report.lines[0].shortfall, 0);
    }

    #[test]
    fn test_build_report_shortfall() {
        let a = PartId::new_v4();
        let stock = BTreeMap::from([(a, 3)]);
        let report = build_report(&[line(a, 4, vec![])], &stock, 2).expect("report");
        assert!(!report.can_build);
        assert_eq!(report.max_buildable, Some(0));
        assert_eq!(report.lines[0].shortfall, 5);
    }

    #[test]
    fn test_build_report_shares_stock_between_lines_of_one_part() {
        let a = PartId::new_v4();
        let lines = [line(a, 5, vec![]), line(a, 5, vec![])];
        let stock = BTreeMap::from([(a, 6)]);

        let report = build_report(&lines, &stock, 1).expect("report");
        assert!(!report.can_build);
        assert_eq!(report.max_buildable, Some(0));
        assert_eq!(report.lines[0].shortfall, 0);
        assert_eq!(report.lines[1].shortfall, 4);

        let stock = BTreeMap::from([(a, 20)]);
        let report = build_report(&lines, &stock, 2).expect("report");
        assert!(report.can_build);
        assert_eq!(report.max_buildable, Some(2));
    }

    #[test]
    fn test_build_report_part_used_as_primary_and_substitute() {
        let (a, b) = (PartId::new_v4(), PartId::new_v4());
        // b backs up line one and is the primary of line two.
        let lines = [line(a, 4, vec![b]), line(b, 3, vec![])];
        let stock = BTreeMap::from([(a, 2), (b, 4)]);

        let report = build_report(&lines, &stock, 1).expect("report");
        assert!(!report.can_build);
        assert_eq!(report.max_buildable, Some(0));
        assert_eq!(report.lines[0].substitute_on_hand, 4);
        assert_eq!(report.lines[0].shortfall, 1);
        assert_eq!(report.lines[1].shortfall, 0);

        let stock = BTreeMap::from([(a, 2), (b, 5)]);
        let report = build_report(&lines, &stock, 1).expect("report");
        assert!(report.can_build);
        assert_eq!(report.max_buildable, Some(1));
    }

    #[test]
    fn test_build_report_empty_bom() {
        let report = build_report(&[], &BTreeMap::new(), 5).expect("report");
        assert!(report.can_build);
        assert_eq!(report.max_buildable, None);
    }

    #[test]
    fn test_build_report_missing_stock_is_zero() {
        let a = PartId::new_v4();
        let report = build_report(&[line(a, 1, vec![])], &BTreeMap::new(), 1).expect("report");
        assert!(!report.can_build);
        assert_eq!(report.lines[0].on_hand, 0);
        assert_eq!(report.lines[0].shortfall, 1);
        assert_eq!(report.max_buildable, Some(0));
    }

    #[test]
    fn test_max_buildable_respects_attrition_quantity() {
        let a = PartId::new_v4();
        let mut l = line(a, 2, vec![]);
        l.attrition_quantity = 3;
        // n builds need 2n + 3; 2*4 + 3 = 11.
        let stock = BTreeMap::from([(a, 11)]);
        let report = build_report(&[l], &stock, 1).expect("report");
        assert_eq!(report.max_buildable, Some(4));
    }

    #[test]
    fn test_inventory_value_per_currency() {
        let entries = vec![
            ValuedStock {
                quantity: 10,
                status: None,
                price_unit: Some(Decimal::new(25, 2)),
                currency: String::new(),
            },
            ValuedStock {
                quantity: 4,
                status: Some(StockStatus::Available),
                price_unit: Some(Decimal::ONE),
                currency: "EUR".to_string(),
            },
            ValuedStock {
                quantity: 1000,
                status: Some(StockStatus::Ordered),
                price_unit: Some(Decimal::ONE),
                currency: "USD".to_string(),
            },
            ValuedStock {
                quantity: 7,
                status: None,
                price_unit: None,
                currency: "USD".to_string(),
            },
        ];
        let totals = inventory_value(&entries, "USD");
        assert_eq!(totals.get("USD"), Some(&Decimal::new(250, 2)));
        assert_eq!(totals.get("EUR"), Some(&Decimal::new(4, 0)));
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_plan_move() {
        assert_eq!(plan_move(10, 10), Ok(MovePlan::Whole));
        assert_eq!(plan_move(10, 4), Ok(MovePlan::Split { remaining: 6 }));
        assert_eq!(
            plan_move(3, 4),
            Err(StockError::Insufficient {
                available: 3,
                requested: 4
            })
        );
        assert_eq!(plan_move(3, 0), Err(StockError::InvalidQuantity(0)));
    }

    #[test]
    fn test_apply_adjustment() {
        assert_eq!(apply_adjustment(5, 3), Ok(8));
        assert_eq!(apply_adjustment(5, -5), Ok(0));
        assert!(apply_adjustment(5, -6).is_err());
        assert_eq!(apply_adjustment(i32::MAX, 1), Err(StockError::Overflow));
    }

    #[test]
    fn test_occupancy() {
        assert_eq!(Occupancy::from_part_count(0), Occupancy::Empty);
        assert_eq!(Occupancy::from_part_count(1), Occupancy::Single);
        assert_eq!(Occupancy::from_part_count(7), Occupancy::Mixed);
    }
}
