//! Daily holding-cost reports.
//!
//! Every day in the range is charged `quantity * price` for each product held
//! at the location that day. Prices come from the location's price timeline;
//! quantities from its snapshot index. Both are resolved per day, so a price
//! change and a stock change inside the same range are joined correctly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use palletflow_core::{DomainError, DomainResult, ProductId, ValueObject};

use crate::calendar::{end_of_day_utc, DateRange};
use crate::location::Location;
use crate::price::PriceTimeline;
use crate::snapshot::LocationSnapshots;

/// Holding of one product on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReportEntry {
    pub date: NaiveDate,
    /// Price per pallet for the day; zero when `price_resolved` is false.
    pub unit_price: Decimal,
    /// False when no price version was in effect on `date`.
    pub price_resolved: bool,
    pub products: Vec<ProductLine>,
    pub total_daily_pallets: i64,
    pub total_daily_cost: Decimal,
}

impl ValueObject for DailyReportEntry {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReport {
    pub location: Location,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DailyReportEntry>,
    pub total_cost: Decimal,
}

impl ValueObject for LocationReport {}

impl LocationReport {
    /// Days charged at zero because no price was in effect.
    pub fn price_gaps(&self) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|d| !d.price_resolved)
            .map(|d| d.date)
            .collect()
    }
}

/// Build the report for `location` over `range`.
///
/// `prices` must hold at least the version effective at `range.start()` and
/// every change inside the range (see [`PriceTimeline::changes_within`]);
/// `stock` must hold, per product, the last snapshot before the first day and
/// every snapshot recorded up to the end of the last day (see
/// [`LocationSnapshots::window`]). Data belonging to another location is
/// rejected, and so are totals too large for their numeric type.
pub fn build_location_report(
    location: Location,
    range: DateRange,
    prices: &PriceTimeline,
    stock: &LocationSnapshots,
) -> DomainResult<LocationReport> {
    if let Some(foreign) = prices.versions().iter().find(|v| v.location_id != location.id) {
        return Err(DomainError::invariant(format!(
            "price version of location {} passed to report of location {}",
            foreign.location_id, location.id
        )));
    }
    if let Some(stock_location) = stock.location_id() {
        if stock_location != location.id {
            return Err(DomainError::invariant(format!(
                "snapshots of location {} passed to report of location {}",
                stock_location, location.id
            )));
        }
    }

    let days = range
        .days()
        .map(|date| daily_entry(date, prices, stock))
        .collect::<DomainResult<Vec<_>>>()?;
    let total_cost = days
        .iter()
        .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d.total_daily_cost))
        .ok_or_else(|| DomainError::validation("report total cost exceeds the supported range"))?;

    Ok(LocationReport {
        location,
        start_date: range.start(),
        end_date: range.end(),
        days,
        total_cost,
    })
}

fn daily_entry(
    date: NaiveDate,
    prices: &PriceTimeline,
    stock: &LocationSnapshots,
) -> DomainResult<DailyReportEntry> {
    let (unit_price, price_resolved) = match prices.effective_at(date) {
        Some(v) => (v.price, true),
        None => (Decimal::ZERO, false),
    };

    let products = stock
        .latest_per_product_before(end_of_day_utc(date))
        .into_iter()
        .map(|s| -> DomainResult<ProductLine> {
            let cost = Decimal::from(s.quantity).checked_mul(unit_price).ok_or_else(|| {
                DomainError::validation(format!(
                    "holding cost of product {} on {date} exceeds the supported range",
                    s.product_id
                ))
            })?;
            Ok(ProductLine {
                product_id: s.product_id,
                quantity: s.quantity,
                cost,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    let total_daily_pallets = products
        .iter()
        .try_fold(0i64, |acc, p| acc.checked_add(p.quantity))
        .ok_or_else(|| {
            DomainError::validation(format!("pallet total on {date} exceeds the supported range"))
        })?;
    let total_daily_cost = products
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.cost))
        .ok_or_else(|| {
            DomainError::validation(format!("holding cost on {date} exceeds the supported range"))
        })?;

    Ok(DailyReportEntry {
        date,
        unit_price,
        price_resolved,
        products,
        total_daily_pallets,
        total_daily_cost,
    })
}
