//! `LedgerEngine`: the async facade over stores and directories.
//!
//! The engine owns validation and referent checks, reads whatever the pure
//! ledger functions need from the stores, and hands back value objects. It
//! holds no state of its own besides the store handles and configuration, so
//! cloning it is cheap and every request can work on its own copy.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{
    available_stock, build_location_report, end_of_day_utc, reservations_by_product, start_of_day_utc,
    AvailableStock, DateRange, Location, LocationReport, LocationSnapshots, NewPriceVersion,
    NewStockSnapshot, Order, PriceTimeline, PriceVersion, Product, StockSnapshot,
};

use crate::config::EngineConfig;
use crate::directory::{InMemoryDirectory, LocationDirectory, OrderDirectory, ProductCatalog};
use crate::error::{EngineError, EngineResult};
use crate::store::{InMemoryPriceStore, InMemorySnapshotStore, PriceStore, SnapshotStore};

/// Store and directory handles the engine is built from.
#[derive(Clone)]
pub struct LedgerStores {
    pub snapshots: Arc<dyn SnapshotStore>,
    pub prices: Arc<dyn PriceStore>,
    pub locations: Arc<dyn LocationDirectory>,
    pub products: Arc<dyn ProductCatalog>,
    pub orders: Arc<dyn OrderDirectory>,
}

impl LedgerStores {
    /// Fresh in-memory stores sharing one directory (dev/test).
    pub fn in_memory() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        Self {
            snapshots: Arc::new(InMemorySnapshotStore::new()),
            prices: Arc::new(InMemoryPriceStore::new()),
            locations: directory.clone(),
            products: directory.clone(),
            orders: directory,
        }
    }

    /// Postgres-backed stores over one pool. The schema must already exist
    /// (see [`crate::store::apply_schema`]).
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use crate::directory::PostgresDirectory;
        use crate::store::{PostgresPriceStore, PostgresSnapshotStore};

        let directory = Arc::new(PostgresDirectory::new(pool.clone()));
        Self {
            snapshots: Arc::new(PostgresSnapshotStore::new(pool.clone())),
            prices: Arc::new(PostgresPriceStore::new(pool)),
            locations: directory.clone(),
            products: directory.clone(),
            orders: directory,
        }
    }
}

#[derive(Clone)]
pub struct LedgerEngine {
    stores: LedgerStores,
    config: EngineConfig,
}

impl LedgerEngine {
    pub fn new(stores: LedgerStores, config: EngineConfig) -> Self {
        Self { stores, config }
    }

    /// Engine over fresh in-memory stores with default configuration.
    pub fn in_memory() -> Self {
        Self::new(LedgerStores::in_memory(), EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- directory ---

    #[instrument(skip(self), fields(location_id = %location.id), err)]
    pub async fn register_location(&self, location: Location) -> EngineResult<Location> {
        if location.name.trim().is_empty() {
            return Err(EngineError::validation("location name cannot be empty"));
        }
        self.stores.locations.register_location(location.clone()).await?;
        Ok(location)
    }

    #[instrument(skip(self), fields(product_id = %product.id), err)]
    pub async fn register_product(&self, product: Product) -> EngineResult<Product> {
        if product.name.trim().is_empty() {
            return Err(EngineError::validation("product name cannot be empty"));
        }
        self.stores.products.register_product(product.clone()).await?;
        Ok(product)
    }

    /// Insert or replace an order. Its facility must be a known processing
    /// facility and every line must name a known product.
    #[instrument(skip(self), fields(order_id = %order.id, status = ?order.status), err)]
    pub async fn upsert_order(&self, order: Order) -> EngineResult<Order> {
        if let Some(line) = order.lines.iter().find(|l| l.pallet_amount < 0) {
            return Err(EngineError::validation(format!(
                "pallet_amount cannot be negative (product {}, got {})",
                line.product_id, line.pallet_amount
            )));
        }
        let facility = self.require_location(order.facility_id).await?;
        if !facility.is_facility() {
            return Err(EngineError::validation(format!(
                "location {} is not a processing facility",
                facility.id
            )));
        }
        for line in &order.lines {
            self.require_product(line.product_id).await?;
        }
        self.stores.orders.upsert_order(order.clone()).await?;
        Ok(order)
    }

    // --- stock ---

    #[instrument(skip(self), err)]
    pub async fn record_stock(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        quantity: i64,
        recorded_at: DateTime<Utc>,
    ) -> EngineResult<StockSnapshot> {
        let snapshot = NewStockSnapshot::new(location_id, product_id, quantity, recorded_at)?;
        self.require_location(location_id).await?;
        self.require_product(product_id).await?;

        let stored = self.stores.snapshots.append(snapshot).await?;
        debug!(sequence = stored.sequence, "snapshot recorded");
        Ok(stored)
    }

    /// Record `latest_as_of(recorded_at) + amount` as a new snapshot.
    ///
    /// Read and write are two store calls; concurrent adds to the same key may
    /// both read the same base quantity.
    #[instrument(skip(self), err)]
    pub async fn add_pallets(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        amount: i64,
        recorded_at: DateTime<Utc>,
    ) -> EngineResult<StockSnapshot> {
        if amount <= 0 {
            return Err(EngineError::validation(format!(
                "amount must be positive (got {amount})"
            )));
        }
        self.require_location(location_id).await?;
        self.require_product(product_id).await?;

        let current = self
            .stores
            .snapshots
            .latest_as_of(location_id, product_id, recorded_at)
            .await?
            .map_or(0, |s| s.quantity);
        let quantity = current
            .checked_add(amount)
            .ok_or_else(|| EngineError::validation("resulting quantity overflows"))?;

        let snapshot = NewStockSnapshot::new(location_id, product_id, quantity, recorded_at)?;
        Ok(self.stores.snapshots.append(snapshot).await?)
    }

    /// Record the quantity left after a collection.
    #[instrument(skip(self), err)]
    pub async fn collect_pallets(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        resulting_quantity: i64,
        recorded_at: DateTime<Utc>,
    ) -> EngineResult<StockSnapshot> {
        self.record_stock(location_id, product_id, resulting_quantity, recorded_at)
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn stock_as_of(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        as_of: DateTime<Utc>,
    ) -> EngineResult<Option<StockSnapshot>> {
        self.require_location(location_id).await?;
        Ok(self
            .stores
            .snapshots
            .latest_as_of(location_id, product_id, as_of)
            .await?)
    }

    #[instrument(skip(self), err)]
    pub async fn latest_stock_per_product(
        &self,
        location_id: LocationId,
        as_of: DateTime<Utc>,
    ) -> EngineResult<Vec<StockSnapshot>> {
        self.require_location(location_id).await?;
        Ok(self
            .stores
            .snapshots
            .latest_per_product(location_id, as_of)
            .await?)
    }

    // --- prices ---

    #[instrument(skip(self), err)]
    pub async fn record_price(
        &self,
        location_id: LocationId,
        price: Decimal,
        valid_from: NaiveDate,
    ) -> EngineResult<PriceVersion> {
        let version = NewPriceVersion::new(location_id, price, valid_from)?;
        self.require_location(location_id).await?;
        Ok(self.stores.prices.append(version).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn price_at(
        &self,
        location_id: LocationId,
        date: NaiveDate,
    ) -> EngineResult<Option<PriceVersion>> {
        self.require_location(location_id).await?;
        Ok(self.stores.prices.effective_at(location_id, date).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn price_changes(
        &self,
        location_id: LocationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<PriceVersion>> {
        let range = DateRange::new(start, end)?;
        self.require_location(location_id).await?;
        Ok(self.stores.prices.changes_within(location_id, range).await?)
    }

    // --- availability ---

    /// Sellable stock across `facility_ids` right now.
    pub async fn available_stock(
        &self,
        facility_ids: &[LocationId],
    ) -> EngineResult<Vec<AvailableStock>> {
        self.available_stock_as_of(facility_ids, Utc::now()).await
    }

    /// Sellable stock across `facility_ids` as of `at`, against the orders
    /// open now.
    #[instrument(skip(self), err)]
    pub async fn available_stock_as_of(
        &self,
        facility_ids: &[LocationId],
        at: DateTime<Utc>,
    ) -> EngineResult<Vec<AvailableStock>> {
        if facility_ids.is_empty() {
            return Err(EngineError::validation("at least one facility is required"));
        }
        let facility_ids: BTreeSet<LocationId> = facility_ids.iter().copied().collect();

        for id in &facility_ids {
            let location = self.require_location(*id).await?;
            if !location.is_facility() {
                return Err(EngineError::validation(format!(
                    "location {id} is not a processing facility"
                )));
            }
        }

        let per_facility = try_join_all(
            facility_ids
                .iter()
                .map(|id| self.stores.snapshots.latest_per_product(*id, at)),
        )
        .await?;
        let orders = self.stores.orders.open_orders().await?;
        let reservations = reservations_by_product(&orders)?;

        Ok(available_stock(
            per_facility.into_iter().flatten(),
            &reservations,
        ))
    }

    // --- reports ---

    #[instrument(skip(self), err)]
    pub async fn build_report(
        &self,
        location_id: LocationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<LocationReport> {
        let range = self.report_range(start, end)?;
        let location = self.require_location(location_id).await?;

        let versions = self.stores.prices.changes_within(location_id, range).await?;
        let window = self
            .stores
            .snapshots
            .report_window(
                location_id,
                start_of_day_utc(range.start()),
                end_of_day_utc(range.end()),
            )
            .await?;
        debug!(location_id = %location_id, snapshots = window.len(), "loaded report window");

        let prices = PriceTimeline::from_versions(versions);
        let stock = LocationSnapshots::from_snapshots(window)?;
        let report = build_location_report(location, range, &prices, &stock)?;

        let gaps = report.price_gaps();
        if !gaps.is_empty() {
            warn!(
                location_id = %location_id,
                gap_days = gaps.len(),
                days = ?gaps,
                "no price in effect; days charged at zero"
            );
        }
        Ok(report)
    }

    /// One report per location, in input order. Any failure fails the whole
    /// call.
    #[instrument(skip(self), err)]
    pub async fn build_reports(
        &self,
        location_ids: &[LocationId],
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<LocationReport>> {
        if location_ids.is_empty() {
            return Err(EngineError::validation("at least one location is required"));
        }
        self.report_range(start, end)?;

        try_join_all(
            location_ids
                .iter()
                .map(|id| self.build_report(*id, start, end)),
        )
        .await
    }

    fn report_range(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<DateRange> {
        let range = DateRange::new(start, end)?;
        if range.day_count() > self.config.max_report_days {
            return Err(EngineError::validation(format!(
                "report range of {} days exceeds the maximum of {}",
                range.day_count(),
                self.config.max_report_days
            )));
        }
        Ok(range)
    }

    async fn require_location(&self, id: LocationId) -> EngineResult<Location> {
        self.stores
            .locations
            .location(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("location {id}")))
    }

    async fn require_product(&self, id: ProductId) -> EngineResult<Product> {
        self.stores
            .products
            .product(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("product {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use palletflow_core::{DomainError, OrderId};
    use palletflow_ledger::{LocationKind, OrderLine, OrderStatus};
    use rust_decimal_macros::dec;

    use crate::error::StoreError;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    struct Fixture {
        engine: LedgerEngine,
        facility: LocationId,
        carrier: LocationId,
        p1: ProductId,
        p2: ProductId,
    }

    async fn fixture() -> Fixture {
        let engine = LedgerEngine::in_memory();
        let facility = LocationId::new();
        let carrier = LocationId::new();
        let p1 = ProductId::new();
        let p2 = ProductId::new();

        engine
            .register_location(Location::new(facility, "Depot", LocationKind::ProcessingFacility))
            .await
            .unwrap();
        engine
            .register_location(Location::new(carrier, "Trucking", LocationKind::Carrier))
            .await
            .unwrap();
        engine.register_product(Product::new(p1, "EUR pallet")).await.unwrap();
        engine.register_product(Product::new(p2, "Half pallet")).await.unwrap();

        Fixture {
            engine,
            facility,
            carrier,
            p1,
            p2,
        }
    }

    fn assert_validation(err: EngineError) {
        assert!(
            matches!(err, EngineError::Domain(DomainError::Validation(_))),
            "expected validation error, got {err:?}"
        );
    }

    fn assert_not_found(err: EngineError) {
        assert!(
            matches!(err, EngineError::Domain(DomainError::NotFound(_))),
            "expected not found, got {err:?}"
        );
    }

    #[tokio::test]
    async fn latest_stock_tracks_the_most_recent_snapshot() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 20, at(2023, 12, 28)).await.unwrap();
        e.record_stock(f.facility, f.p1, 60, at(2024, 1, 1)).await.unwrap();

        let before = e.latest_stock_per_product(f.facility, at(2023, 12, 1)).await.unwrap();
        assert!(before.is_empty());

        let latest = e.latest_stock_per_product(f.facility, at(2024, 1, 5)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].quantity, 60);
    }

    #[tokio::test]
    async fn same_timestamp_returns_last_inserted() {
        let f = fixture().await;
        let ts = at(2024, 2, 2);
        f.engine.record_stock(f.facility, f.p1, 4, ts).await.unwrap();
        f.engine.record_stock(f.facility, f.p1, 8, ts).await.unwrap();

        let latest = f.engine.latest_stock_per_product(f.facility, ts).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].quantity, 8);
    }

    #[tokio::test]
    async fn writes_are_validated_before_lookups() {
        let f = fixture().await;
        let e = &f.engine;

        assert_validation(e.record_stock(f.facility, f.p1, -1, at(2024, 1, 1)).await.unwrap_err());
        assert_validation(e.record_price(f.facility, dec!(-0.01), day(1, 1)).await.unwrap_err());
        assert_validation(e.add_pallets(f.facility, f.p1, 0, at(2024, 1, 1)).await.unwrap_err());
        assert_not_found(
            e.record_stock(LocationId::new(), f.p1, 1, at(2024, 1, 1)).await.unwrap_err(),
        );
        assert_not_found(
            e.record_stock(f.facility, ProductId::new(), 1, at(2024, 1, 1)).await.unwrap_err(),
        );
        assert_not_found(e.record_price(LocationId::new(), dec!(1), day(1, 1)).await.unwrap_err());

        assert!(e.latest_stock_per_product(f.facility, at(2030, 1, 1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_and_collect_append_absolute_quantities() {
        let f = fixture().await;
        let e = &f.engine;

        let s = e.add_pallets(f.facility, f.p1, 5, at(2024, 1, 1)).await.unwrap();
        assert_eq!(s.quantity, 5);
        let s = e.add_pallets(f.facility, f.p1, 7, at(2024, 1, 2)).await.unwrap();
        assert_eq!(s.quantity, 12);
        let s = e.collect_pallets(f.facility, f.p1, 3, at(2024, 1, 3)).await.unwrap();
        assert_eq!(s.quantity, 3);

        // Back-dated add builds on the stock in effect at its own timestamp.
        let s = e
            .add_pallets(f.facility, f.p1, 1, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(s.quantity, 6);

        let at_end = e.stock_as_of(f.facility, f.p1, at(2024, 1, 10)).await.unwrap().unwrap();
        assert_eq!(at_end.quantity, 3);
    }

    #[tokio::test]
    async fn price_lookup_is_piecewise_constant() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_price(f.facility, dec!(50.0), day(1, 1)).await.unwrap();
        e.record_price(f.facility, dec!(67.4), day(1, 15)).await.unwrap();

        assert_eq!(e.price_at(f.facility, day(1, 10)).await.unwrap().unwrap().price, dec!(50.0));
        assert_eq!(e.price_at(f.facility, day(1, 20)).await.unwrap().unwrap().price, dec!(67.4));
        assert!(e.price_at(f.facility, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()).await.unwrap().is_none());

        let changes = e.price_changes(f.facility, day(1, 10), day(1, 31)).await.unwrap();
        let prices: Vec<Decimal> = changes.iter().map(|v| v.price).collect();
        assert_eq!(prices, vec![dec!(50.0), dec!(67.4)]);

        assert_validation(e.price_changes(f.facility, day(2, 1), day(1, 1)).await.unwrap_err());
    }

    #[tokio::test]
    async fn availability_subtracts_open_reservations() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 20, at(2024, 1, 1)).await.unwrap();

        let mut order = Order {
            id: OrderId::new(),
            facility_id: f.facility,
            status: OrderStatus::Open,
            lines: vec![OrderLine {
                product_id: f.p1,
                pallet_amount: 8,
            }],
        };
        e.upsert_order(order.clone()).await.unwrap();

        let rows = e.available_stock(&[f.facility]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].available, 12);

        order.lines[0].pallet_amount = 25;
        e.upsert_order(order.clone()).await.unwrap();
        let rows = e.available_stock(&[f.facility]).await.unwrap();
        assert_eq!(rows[0].available, -5);
        assert!(rows[0].is_overcommitted());

        order.status = OrderStatus::Collected;
        e.upsert_order(order).await.unwrap();
        let rows = e.available_stock(&[f.facility]).await.unwrap();
        assert_eq!(rows[0].available, 20);
    }

    #[tokio::test]
    async fn availability_reports_reserved_but_unstocked_products() {
        let f = fixture().await;
        let e = &f.engine;
        e.upsert_order(Order {
            id: OrderId::new(),
            facility_id: f.facility,
            status: OrderStatus::Open,
            lines: vec![OrderLine {
                product_id: f.p2,
                pallet_amount: 3,
            }],
        })
        .await
        .unwrap();

        let rows = e.available_stock(&[f.facility]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].on_hand, 0);
        assert_eq!(rows[0].available, -3);
    }

    #[tokio::test]
    async fn availability_rejects_bad_facility_sets() {
        let f = fixture().await;
        let e = &f.engine;
        assert_validation(e.available_stock(&[]).await.unwrap_err());
        assert_validation(e.available_stock(&[f.facility, f.carrier]).await.unwrap_err());
        assert_not_found(e.available_stock(&[LocationId::new()]).await.unwrap_err());
    }

    #[tokio::test]
    async fn orders_must_target_a_known_facility() {
        let f = fixture().await;
        let order = |facility_id| Order {
            id: OrderId::new(),
            facility_id,
            status: OrderStatus::Open,
            lines: vec![],
        };
        assert_validation(f.engine.upsert_order(order(f.carrier)).await.unwrap_err());
        assert_not_found(f.engine.upsert_order(order(LocationId::new())).await.unwrap_err());
    }

    #[tokio::test]
    async fn january_report_joins_stock_and_price_changes() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 20, at(2023, 12, 28)).await.unwrap();
        e.record_stock(f.facility, f.p1, 60, at(2024, 1, 1)).await.unwrap();
        e.record_stock(f.facility, f.p1, 70, at(2024, 1, 24)).await.unwrap();
        e.record_price(f.facility, dec!(50.0), day(1, 1)).await.unwrap();
        e.record_price(f.facility, dec!(67.4), day(1, 15)).await.unwrap();

        let report = e.build_report(f.facility, day(1, 1), day(1, 31)).await.unwrap();
        assert_eq!(report.days.len(), 31);
        for entry in &report.days {
            let expected_qty = if entry.date < day(1, 24) { 60 } else { 70 };
            let expected_price = if entry.date < day(1, 15) { dec!(50.0) } else { dec!(67.4) };
            assert_eq!(entry.total_daily_pallets, expected_qty, "{}", entry.date);
            assert_eq!(entry.unit_price, expected_price, "{}", entry.date);
            assert_eq!(entry.total_daily_cost, Decimal::from(expected_qty) * expected_price);
        }

        let sum: Decimal = report.days.iter().map(|d| d.total_daily_cost).sum();
        assert_eq!(sum, report.total_cost);
        // 14 * 60 * 50 + 9 * 60 * 67.4 + 8 * 70 * 67.4
        assert_eq!(report.total_cost, dec!(42000) + dec!(36396.0) + dec!(37744.0));
    }

    #[tokio::test]
    async fn single_day_report_and_determinism() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 3, at(2024, 3, 1)).await.unwrap();
        e.record_stock(f.facility, f.p2, 2, at(2024, 3, 1)).await.unwrap();
        e.record_price(f.facility, dec!(1.25), day(3, 1)).await.unwrap();

        let report = e.build_report(f.facility, day(3, 1), day(3, 1)).await.unwrap();
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.days[0].total_daily_pallets, 5);
        assert_eq!(report.total_cost, dec!(6.25));

        let again = e.build_report(f.facility, day(3, 1), day(3, 1)).await.unwrap();
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }

    #[tokio::test]
    async fn report_marks_days_without_price() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 10, at(2024, 1, 1)).await.unwrap();
        e.record_price(f.facility, dec!(2), day(1, 3)).await.unwrap();

        let report = e.build_report(f.facility, day(1, 1), day(1, 4)).await.unwrap();
        assert_eq!(report.price_gaps(), vec![day(1, 1), day(1, 2)]);
        assert_eq!(report.total_cost, dec!(40));
    }

    #[tokio::test]
    async fn report_carries_opening_stock_from_before_the_range() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, 4, at(2019, 6, 1)).await.unwrap();
        e.record_stock(f.facility, f.p1, 40, at(2020, 6, 1)).await.unwrap();
        e.record_stock(f.facility, f.p2, 9, at(2024, 1, 2)).await.unwrap();
        e.record_stock(f.facility, f.p1, 400, at(2024, 1, 4)).await.unwrap();
        e.record_price(f.facility, dec!(1), day(1, 1)).await.unwrap();

        let report = e.build_report(f.facility, day(1, 1), day(1, 3)).await.unwrap();
        let pallets: Vec<i64> = report.days.iter().map(|d| d.total_daily_pallets).collect();
        assert_eq!(pallets, vec![40, 49, 49]);
        assert_eq!(report.total_cost, dec!(138));
    }

    #[tokio::test]
    async fn oversized_holdings_fail_the_report_instead_of_panicking() {
        let f = fixture().await;
        let e = &f.engine;
        e.record_stock(f.facility, f.p1, i64::MAX, at(2024, 1, 1)).await.unwrap();
        e.record_price(f.facility, dec!(99999999999999), day(1, 1)).await.unwrap();

        assert_validation(e.build_report(f.facility, day(1, 1), day(1, 1)).await.unwrap_err());
    }

    #[tokio::test]
    async fn prices_the_store_cannot_hold_exactly_are_rejected() {
        let f = fixture().await;
        let e = &f.engine;
        assert_validation(
            e.record_price(f.facility, dec!(100000000000000000000), day(1, 1))
                .await
                .unwrap_err(),
        );
        assert_validation(e.record_price(f.facility, dec!(1.23456), day(1, 1)).await.unwrap_err());
        assert!(e.price_at(f.facility, day(1, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overflowing_reservations_fail_availability() {
        let f = fixture().await;
        let e = &f.engine;
        for _ in 0..2 {
            e.upsert_order(Order {
                id: OrderId::new(),
                facility_id: f.facility,
                status: OrderStatus::Open,
                lines: vec![OrderLine {
                    product_id: f.p1,
                    pallet_amount: i64::MAX,
                }],
            })
            .await
            .unwrap();
        }

        assert_validation(e.available_stock(&[f.facility]).await.unwrap_err());
    }

    #[tokio::test]
    async fn report_ranges_are_validated() {
        let f = fixture().await;
        let e = &f.engine;
        assert_validation(e.build_report(f.facility, day(2, 1), day(1, 1)).await.unwrap_err());
        assert_not_found(e.build_report(LocationId::new(), day(1, 1), day(1, 2)).await.unwrap_err());

        let short = LedgerEngine::new(
            e.stores.clone(),
            EngineConfig {
                max_report_days: 7,
            },
        );
        assert!(short.build_report(f.facility, day(1, 1), day(1, 7)).await.is_ok());
        assert_validation(short.build_report(f.facility, day(1, 1), day(1, 8)).await.unwrap_err());
    }

    #[tokio::test]
    async fn build_reports_preserves_input_order_and_fails_whole() {
        let f = fixture().await;
        let e = &f.engine;

        let reports = e
            .build_reports(&[f.carrier, f.facility], day(1, 1), day(1, 2))
            .await
            .unwrap();
        let ids: Vec<LocationId> = reports.iter().map(|r| r.location.id).collect();
        assert_eq!(ids, vec![f.carrier, f.facility]);

        assert_validation(e.build_reports(&[], day(1, 1), day(1, 2)).await.unwrap_err());
        assert_not_found(
            e.build_reports(&[f.facility, LocationId::new()], day(1, 1), day(1, 2))
                .await
                .unwrap_err(),
        );
    }

    struct BrokenSnapshots;

    #[async_trait]
    impl SnapshotStore for BrokenSnapshots {
        async fn append(&self, _: NewStockSnapshot) -> Result<StockSnapshot, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn latest_as_of(
            &self,
            _: LocationId,
            _: ProductId,
            _: DateTime<Utc>,
        ) -> Result<Option<StockSnapshot>, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn latest_per_product(
            &self,
            _: LocationId,
            _: DateTime<Utc>,
        ) -> Result<Vec<StockSnapshot>, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn report_window(
            &self,
            _: LocationId,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<StockSnapshot>, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_store_errors() {
        let f = fixture().await;
        let mut stores = f.engine.stores.clone();
        stores.snapshots = Arc::new(BrokenSnapshots);
        let engine = LedgerEngine::new(stores, EngineConfig::default());

        let err = engine.record_stock(f.facility, f.p1, 1, at(2024, 1, 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
        let err = engine.build_report(f.facility, day(1, 1), day(1, 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }
}
