use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{
    DateRange, LocationSnapshots, NewPriceVersion, NewStockSnapshot, PriceTimeline, PriceVersion,
    StockSnapshot,
};

use super::{PriceStore, SnapshotStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct SnapshotLog {
    last_sequence: u64,
    by_location: HashMap<LocationId, LocationSnapshots>,
}

/// In-memory append-only snapshot store.
///
/// Intended for tests/dev. The sequence counter lives under the same write lock
/// as the index, so every append observes a strictly larger sequence than any
/// earlier one.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    log: RwLock<SnapshotLog>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn append(&self, snapshot: NewStockSnapshot) -> Result<StockSnapshot, StoreError> {
        let mut log = self
            .log
            .write()
            .map_err(|_| StoreError::Poisoned("snapshot log"))?;

        log.last_sequence += 1;
        let stored = snapshot.with_sequence(log.last_sequence);

        log.by_location
            .entry(stored.location_id)
            .or_default()
            .insert(stored.clone())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(stored)
    }

    async fn latest_as_of(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| StoreError::Poisoned("snapshot log"))?;

        Ok(log
            .by_location
            .get(&location_id)
            .and_then(|idx| idx.latest_as_of(&product_id, at))
            .cloned())
    }

    async fn latest_per_product(
        &self,
        location_id: LocationId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| StoreError::Poisoned("snapshot log"))?;

        Ok(log
            .by_location
            .get(&location_id)
            .map(|idx| idx.latest_per_product(at))
            .unwrap_or_default())
    }

    async fn report_window(
        &self,
        location_id: LocationId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| StoreError::Poisoned("snapshot log"))?;

        Ok(log
            .by_location
            .get(&location_id)
            .map(|idx| idx.window(from, until))
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct PriceLog {
    last_sequence: u64,
    by_location: HashMap<LocationId, PriceTimeline>,
}

/// In-memory append-only price store.
#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    log: RwLock<PriceLog>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn append(&self, version: NewPriceVersion) -> Result<PriceVersion, StoreError> {
        let mut log = self
            .log
            .write()
            .map_err(|_| StoreError::Poisoned("price log"))?;

        log.last_sequence += 1;
        let stored = version.with_sequence(log.last_sequence);
        log.by_location
            .entry(stored.location_id)
            .or_default()
            .insert(stored.clone());

        Ok(stored)
    }

    async fn effective_at(
        &self,
        location_id: LocationId,
        date: NaiveDate,
    ) -> Result<Option<PriceVersion>, StoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| StoreError::Poisoned("price log"))?;

        Ok(log
            .by_location
            .get(&location_id)
            .and_then(|t| t.effective_at(date))
            .cloned())
    }

    async fn changes_within(
        &self,
        location_id: LocationId,
        range: DateRange,
    ) -> Result<Vec<PriceVersion>, StoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| StoreError::Poisoned("price log"))?;

        Ok(log
            .by_location
            .get(&location_id)
            .map(|t| t.changes_in(range))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn sequences_are_strictly_increasing_across_keys() {
        let store = InMemorySnapshotStore::new();
        let loc = LocationId::new();
        let mut last = 0;
        for i in 0..5 {
            let s = store
                .append(NewStockSnapshot::new(loc, ProductId::new(), i, at(1, 8)).unwrap())
                .await
                .unwrap();
            assert!(s.sequence > last);
            last = s.sequence;
        }
    }

    #[tokio::test]
    async fn latest_per_product_returns_one_row_per_product_on_ties() {
        let store = InMemorySnapshotStore::new();
        let loc = LocationId::new();
        let p = ProductId::new();
        let q = ProductId::new();

        for qty in [3, 4, 5] {
            store
                .append(NewStockSnapshot::new(loc, p, qty, at(2, 9)).unwrap())
                .await
                .unwrap();
        }
        store
            .append(NewStockSnapshot::new(loc, q, 11, at(2, 10)).unwrap())
            .await
            .unwrap();

        let latest = store.latest_per_product(loc, at(2, 9)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].quantity, 5);

        let latest = store.latest_per_product(loc, at(3, 0)).await.unwrap();
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn report_window_keeps_opening_stock_and_in_window_rows() {
        let store = InMemorySnapshotStore::new();
        let loc = LocationId::new();
        let p = ProductId::new();
        let q = ProductId::new();

        store.append(NewStockSnapshot::new(loc, p, 9, at(1, 0)).unwrap()).await.unwrap();
        store.append(NewStockSnapshot::new(loc, p, 0, at(2, 0)).unwrap()).await.unwrap();
        store.append(NewStockSnapshot::new(loc, p, 1, at(5, 0)).unwrap()).await.unwrap();
        store.append(NewStockSnapshot::new(loc, q, 2, at(3, 0)).unwrap()).await.unwrap();
        store.append(NewStockSnapshot::new(loc, p, 3, at(9, 0)).unwrap()).await.unwrap();

        let window = store.report_window(loc, at(4, 0), at(9, 0)).await.unwrap();
        let quantities: Vec<i64> = window.iter().map(|s| s.quantity).collect();
        assert_eq!(quantities, vec![0, 2, 1]);

        assert!(store
            .report_window(LocationId::new(), at(1, 0), at(31, 0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn price_store_resolves_and_scans_ranges() {
        let store = InMemoryPriceStore::new();
        let loc = LocationId::new();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

        store.append(NewPriceVersion::new(loc, dec!(50.0), day(1)).unwrap()).await.unwrap();
        store.append(NewPriceVersion::new(loc, dec!(67.4), day(15)).unwrap()).await.unwrap();

        let p = store.effective_at(loc, day(10)).await.unwrap().unwrap();
        assert_eq!(p.price, dec!(50.0));

        let changes = store
            .changes_within(loc, DateRange::new(day(5), day(20)).unwrap())
            .await
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert!(store.effective_at(LocationId::new(), day(10)).await.unwrap().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: the report window is the last snapshot per product before
        /// `from` plus everything in `[from, until)`, ordered by
        /// `(recorded_at, sequence)`, whatever the write order.
        #[test]
        fn report_window_matches_brute_force(
            writes in prop::collection::vec((0usize..3, 0i64..48, 0i64..500), 0..30),
            from in 0i64..48,
            len in 0i64..48,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemorySnapshotStore::new();
            let loc = LocationId::new();
            let products = [ProductId::new(), ProductId::new(), ProductId::new()];
            let base = at(1, 0);

            let mut written = Vec::new();
            for (p, offset, qty) in &writes {
                let s = rt
                    .block_on(store.append(
                        NewStockSnapshot::new(loc, products[*p], *qty, base + chrono::Duration::hours(*offset)).unwrap(),
                    ))
                    .unwrap();
                written.push(s);
            }

            let from = base + chrono::Duration::hours(from);
            let until = from + chrono::Duration::hours(len);
            let mut expected: Vec<StockSnapshot> = products
                .iter()
                .filter_map(|p| {
                    written
                        .iter()
                        .filter(|s| s.product_id == *p && s.recorded_at < from)
                        .max_by_key(|s| s.order_key())
                        .cloned()
                })
                .chain(
                    written
                        .iter()
                        .filter(|s| from <= s.recorded_at && s.recorded_at < until)
                        .cloned(),
                )
                .collect();
            expected.sort_by_key(|s| s.order_key());

            let window = rt.block_on(store.report_window(loc, from, until)).unwrap();
            prop_assert_eq!(window, expected);
        }
    }
}
