//! Versioned storage prices.
//!
//! A location's price is piecewise-constant over calendar days: each version
//! applies from its `valid_from` day until the next version takes over.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use palletflow_core::{DomainError, DomainResult, LocationId, ValueObject};

use crate::calendar::DateRange;

/// Price charged per pallet per day by a location starting at `valid_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceVersion {
    pub location_id: LocationId,
    pub price: Decimal,
    pub valid_from: NaiveDate,
    /// Store-assigned insertion number; the later of two same-day versions wins.
    pub sequence: u64,
}

impl ValueObject for PriceVersion {}

impl PriceVersion {
    pub fn order_key(&self) -> (NaiveDate, u64) {
        (self.valid_from, self.sequence)
    }
}

/// A validated price version that has not been assigned a sequence yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPriceVersion {
    pub location_id: LocationId,
    pub price: Decimal,
    pub valid_from: NaiveDate,
}

/// Decimal places a price may carry.
const PRICE_MAX_SCALE: u32 = 4;

/// Integer digits a price may carry; prices stay below `10^14`.
const PRICE_MAX_INTEGER_DIGITS: u32 = 14;

impl NewPriceVersion {
    /// Validate a price. Accepted values are exactly those the persistent
    /// store holds without rounding, stored with trailing zeros stripped.
    pub fn new(location_id: LocationId, price: Decimal, valid_from: NaiveDate) -> DomainResult<Self> {
        if price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "price cannot be negative (got {price})"
            )));
        }
        let price = price.normalize();
        if price.scale() > PRICE_MAX_SCALE {
            return Err(DomainError::validation(format!(
                "price may have at most {PRICE_MAX_SCALE} decimal places (got {price})"
            )));
        }
        if price >= Decimal::from(10i64.pow(PRICE_MAX_INTEGER_DIGITS)) {
            return Err(DomainError::validation(format!(
                "price must stay below 10^{PRICE_MAX_INTEGER_DIGITS} (got {price})"
            )));
        }
        Ok(Self {
            location_id,
            price,
            valid_from,
        })
    }

    pub fn with_sequence(self, sequence: u64) -> PriceVersion {
        PriceVersion {
            location_id: self.location_id,
            price: self.price,
            valid_from: self.valid_from,
            sequence,
        }
    }
}

/// Ordered price versions of a single location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTimeline {
    versions: Vec<PriceVersion>,
}

impl PriceTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_versions(versions: impl IntoIterator<Item = PriceVersion>) -> Self {
        let mut timeline = Self::new();
        for v in versions {
            timeline.insert(v);
        }
        timeline
    }

    pub fn insert(&mut self, version: PriceVersion) {
        let key = version.order_key();
        let pos = self.versions.partition_point(|v| v.order_key() <= key);
        self.versions.insert(pos, version);
    }

    /// Version in effect on `date`: greatest `valid_from <= date`.
    pub fn effective_at(&self, date: NaiveDate) -> Option<&PriceVersion> {
        let end = self.versions.partition_point(|v| v.valid_from <= date);
        end.checked_sub(1).and_then(|i| self.versions.get(i))
    }

    /// The version effective at `start` plus every version starting inside
    /// `[start, end]`, oldest first.
    ///
    /// A plain range scan would miss a price set before the window that is
    /// still active at its start.
    pub fn changes_within(&self, start: NaiveDate, end: NaiveDate) -> DomainResult<Vec<PriceVersion>> {
        DateRange::new(start, end).map(|range| self.changes_in(range))
    }

    /// [`Self::changes_within`] for an already validated range.
    pub fn changes_in(&self, range: DateRange) -> Vec<PriceVersion> {
        let first_in_range = self.versions.partition_point(|v| v.valid_from < range.start());
        let past_range = self.versions.partition_point(|v| v.valid_from <= range.end());
        let starts_on_change = self
            .versions
            .get(first_in_range)
            .is_some_and(|v| v.valid_from == range.start());

        let mut out = Vec::with_capacity(past_range - first_in_range + 1);
        if !starts_on_change {
            if let Some(before) = first_in_range.checked_sub(1).and_then(|i| self.versions.get(i)) {
                out.push(before.clone());
            }
        }
        out.extend_from_slice(&self.versions[first_in_range..past_range]);
        out
    }

    pub fn versions(&self) -> &[PriceVersion] {
        &self.versions
    }
}
