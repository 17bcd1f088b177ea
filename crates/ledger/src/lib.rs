//! Storage-ledger domain: stock snapshots, price versions, availability and
//! daily holding-cost reports.
//!
//! Everything here is deterministic domain logic (no IO, no HTTP, no storage).
//! Stores hand in plain snapshots and price versions; this crate answers the
//! as-of questions and builds the derived value objects.

pub mod availability;
pub mod calendar;
pub mod location;
pub mod order;
pub mod price;
pub mod report;
pub mod snapshot;

pub use availability::{available_stock, AvailableStock};
pub use calendar::{end_of_day_utc, start_of_day_utc, DateRange, DaySequence};
pub use location::{Location, LocationKind, Product};
pub use order::{reservations_by_product, Order, OrderLine, OrderStatus};
pub use price::{NewPriceVersion, PriceTimeline, PriceVersion};
pub use report::{build_location_report, DailyReportEntry, LocationReport, ProductLine};
pub use snapshot::{LocationSnapshots, NewStockSnapshot, StockSnapshot};
