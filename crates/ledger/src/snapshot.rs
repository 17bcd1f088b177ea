//! Stock snapshots and the as-of index over them.
//!
//! Storage is never a single mutable number: every change appends a snapshot
//! carrying the absolute resulting quantity. The current quantity at time `T`
//! is read from the greatest snapshot recorded at or before `T`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palletflow_core::{DomainError, DomainResult, LocationId, ProductId, ValueObject};

/// Known quantity of one product at one location at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub recorded_at: DateTime<Utc>,
    /// Store-assigned insertion number; breaks ties on `recorded_at`.
    pub sequence: u64,
}

impl ValueObject for StockSnapshot {}

impl StockSnapshot {
    /// Total order used by every "latest" lookup.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.recorded_at, self.sequence)
    }
}

/// A snapshot that passed validation but has not been assigned a sequence yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockSnapshot {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub recorded_at: DateTime<Utc>,
}

impl NewStockSnapshot {
    pub fn new(
        location_id: LocationId,
        product_id: ProductId,
        quantity: i64,
        recorded_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative (got {quantity})"
            )));
        }
        Ok(Self {
            location_id,
            product_id,
            quantity,
            recorded_at,
        })
    }

    pub fn with_sequence(self, sequence: u64) -> StockSnapshot {
        StockSnapshot {
            location_id: self.location_id,
            product_id: self.product_id,
            quantity: self.quantity,
            recorded_at: self.recorded_at,
            sequence,
        }
    }
}

/// Snapshots of one (location, product) key, kept sorted by `(recorded_at, sequence)`.
///
/// Writes may arrive with back-dated timestamps, so `insert` places each
/// snapshot at its ordered position instead of assuming append order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSeries {
    entries: Vec<StockSnapshot>,
}

impl SnapshotSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: StockSnapshot) {
        let key = snapshot.order_key();
        let pos = self.entries.partition_point(|s| s.order_key() <= key);
        self.entries.insert(pos, snapshot);
    }

    /// Greatest snapshot with `recorded_at <= at`.
    pub fn latest_as_of(&self, at: DateTime<Utc>) -> Option<&StockSnapshot> {
        let end = self.entries.partition_point(|s| s.recorded_at <= at);
        end.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Greatest snapshot with `recorded_at < before`.
    pub fn latest_before(&self, before: DateTime<Utc>) -> Option<&StockSnapshot> {
        let end = self.entries.partition_point(|s| s.recorded_at < before);
        end.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The latest snapshot recorded before `from`, then every snapshot with
    /// `from <= recorded_at < until`, oldest first.
    pub fn window(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> &[StockSnapshot] {
        let first_inside = self.entries.partition_point(|s| s.recorded_at < from);
        let end = self
            .entries
            .partition_point(|s| s.recorded_at < until)
            .max(first_inside);
        &self.entries[first_inside.saturating_sub(1)..end]
    }
}

/// As-of index over all snapshots of one location, grouped per product.
#[derive(Debug, Clone, Default)]
pub struct LocationSnapshots {
    location_id: Option<LocationId>,
    by_product: BTreeMap<ProductId, SnapshotSeries>,
}

impl LocationSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from snapshots in any order.
    ///
    /// Snapshots of other locations are rejected so a caller cannot silently mix
    /// two ledgers.
    pub fn from_snapshots(
        snapshots: impl IntoIterator<Item = StockSnapshot>,
    ) -> DomainResult<Self> {
        let mut index = Self::new();
        for s in snapshots {
            index.insert(s)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, snapshot: StockSnapshot) -> DomainResult<()> {
        if let Some(loc) = self.location_id {
            if loc != snapshot.location_id {
                return Err(DomainError::invariant(format!(
                    "snapshot for location {} added to index of location {}",
                    snapshot.location_id, loc
                )));
            }
        }
        self.location_id = Some(snapshot.location_id);
        self.by_product
            .entry(snapshot.product_id)
            .or_default()
            .insert(snapshot);
        Ok(())
    }

    /// Location of the indexed snapshots; `None` while empty.
    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn latest_as_of(&self, product_id: &ProductId, at: DateTime<Utc>) -> Option<&StockSnapshot> {
        self.by_product.get(product_id)?.latest_as_of(at)
    }

    /// Exactly one latest snapshot per product recorded at or before `at`,
    /// ordered by product id.
    pub fn latest_per_product(&self, at: DateTime<Utc>) -> Vec<StockSnapshot> {
        self.by_product
            .values()
            .filter_map(|series| series.latest_as_of(at).cloned())
            .collect()
    }

    /// Like [`Self::latest_per_product`] but strictly before `before`.
    pub fn latest_per_product_before(&self, before: DateTime<Utc>) -> Vec<&StockSnapshot> {
        self.by_product
            .values()
            .filter_map(|series| series.latest_before(before))
            .collect()
    }

    /// Everything a report over `[from, until)` reads: per product the last
    /// snapshot before `from` plus the ones recorded inside the window,
    /// ordered by `(recorded_at, sequence)`.
    pub fn window(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Vec<StockSnapshot> {
        let mut out: Vec<StockSnapshot> = self
            .by_product
            .values()
            .flat_map(|series| series.window(from, until).iter().cloned())
            .collect();
        out.sort_by_key(|s| s.order_key());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn snap(loc: LocationId, product: ProductId, qty: i64, at: DateTime<Utc>, seq: u64) -> StockSnapshot {
        NewStockSnapshot::new(loc, product, qty, at)
            .unwrap()
            .with_sequence(seq)
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = NewStockSnapshot::new(LocationId::new(), ProductId::new(), -1, ts(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn latest_as_of_picks_greatest_not_later_than_query() {
        let loc = LocationId::new();
        let p = ProductId::new();
        let mut series = SnapshotSeries::new();
        series.insert(snap(loc, p, 20, ts(2023, 12, 28), 1));
        series.insert(snap(loc, p, 60, ts(2024, 1, 1), 2));
        series.insert(snap(loc, p, 70, ts(2024, 1, 24), 3));

        assert!(series.latest_as_of(ts(2023, 12, 1)).is_none());
        assert_eq!(series.latest_as_of(ts(2023, 12, 31)).unwrap().quantity, 20);
        assert_eq!(series.latest_as_of(ts(2024, 1, 1)).unwrap().quantity, 60);
        assert_eq!(series.latest_as_of(ts(2024, 1, 23)).unwrap().quantity, 60);
        assert_eq!(series.latest_as_of(ts(2024, 2, 1)).unwrap().quantity, 70);
    }

    #[test]
    fn back_dated_insert_keeps_order() {
        let loc = LocationId::new();
        let p = ProductId::new();
        let mut series = SnapshotSeries::new();
        series.insert(snap(loc, p, 70, ts(2024, 1, 24), 1));
        series.insert(snap(loc, p, 60, ts(2024, 1, 1), 2));

        assert_eq!(series.latest_as_of(ts(2024, 1, 10)).unwrap().quantity, 60);
        assert_eq!(series.latest_as_of(ts(2024, 1, 30)).unwrap().quantity, 70);
    }

    #[test]
    fn same_timestamp_tie_breaks_on_sequence() {
        let loc = LocationId::new();
        let p = ProductId::new();
        let at = ts(2024, 3, 1);
        let mut index = LocationSnapshots::new();
        index.insert(snap(loc, p, 5, at, 7)).unwrap();
        index.insert(snap(loc, p, 9, at, 8)).unwrap();
        index.insert(snap(loc, p, 1, at, 3)).unwrap();

        let latest = index.latest_per_product(at);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].quantity, 9);
        assert_eq!(latest[0].sequence, 8);
    }

    #[test]
    fn latest_before_excludes_the_boundary() {
        let loc = LocationId::new();
        let p = ProductId::new();
        let at = ts(2024, 1, 24);
        let mut series = SnapshotSeries::new();
        series.insert(snap(loc, p, 60, ts(2024, 1, 1), 1));
        series.insert(snap(loc, p, 70, at, 2));

        assert_eq!(series.latest_before(at).unwrap().quantity, 60);
        assert_eq!(series.latest_as_of(at).unwrap().quantity, 70);
    }

    #[test]
    fn window_keeps_last_snapshot_before_start_and_drops_older_ones() {
        let loc = LocationId::new();
        let p = ProductId::new();
        let q = ProductId::new();
        let index = LocationSnapshots::from_snapshots([
            snap(loc, p, 10, ts(2023, 6, 1), 1),
            snap(loc, p, 20, ts(2023, 12, 28), 2),
            snap(loc, p, 60, ts(2024, 1, 1), 3),
            snap(loc, p, 70, ts(2024, 2, 1), 4),
            snap(loc, q, 5, ts(2024, 1, 15), 5),
        ])
        .unwrap();

        let window = index.window(ts(2024, 1, 1), ts(2024, 1, 31));
        let seen: Vec<(i64, u64)> = window.iter().map(|s| (s.quantity, s.sequence)).collect();
        assert_eq!(seen, vec![(20, 2), (60, 3), (5, 5)]);

        assert!(index.window(ts(2023, 1, 1), ts(2023, 2, 1)).is_empty());
    }

    #[test]
    fn index_rejects_foreign_location() {
        let p = ProductId::new();
        let mut index = LocationSnapshots::new();
        index.insert(snap(LocationId::new(), p, 1, ts(2024, 1, 1), 1)).unwrap();
        let err = index.insert(snap(LocationId::new(), p, 1, ts(2024, 1, 1), 2)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the as-of lookup matches a brute-force scan for the
        /// maximum `(recorded_at, sequence)` not later than the query.
        #[test]
        fn latest_as_of_matches_linear_scan(
            writes in prop::collection::vec((0i64..60, 0i64..1_000), 1..40),
            query in -5i64..65,
        ) {
            let loc = LocationId::new();
            let p = ProductId::new();
            let base = ts(2024, 1, 1);
            let snapshots: Vec<StockSnapshot> = writes
                .iter()
                .enumerate()
                .map(|(i, (offset, qty))| snap(loc, p, *qty, base + chrono::Duration::hours(*offset), i as u64 + 1))
                .collect();

            let index = LocationSnapshots::from_snapshots(snapshots.clone()).unwrap();
            let at = base + chrono::Duration::hours(query);

            let expected = snapshots
                .iter()
                .filter(|s| s.recorded_at <= at)
                .max_by_key(|s| s.order_key());

            let latest = index.latest_per_product(at);
            match expected {
                None => prop_assert!(latest.is_empty()),
                Some(e) => {
                    prop_assert_eq!(latest.len(), 1);
                    prop_assert_eq!(&latest[0], e);
                }
            }
        }
    }
}
