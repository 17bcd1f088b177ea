//! Value object trait: equality by value, not identity.
//!
//! Snapshots, price versions and report rows are value objects: they are built
//! once, never mutated, and two of them with the same attributes are the same
//! value.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one. Everything the ledger derives for a request (availability
/// rows, daily entries, location reports) is a value object and holds no
/// reference back into a store.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PalletCount {
///     product: ProductId,
///     quantity: i64,
/// }
///
/// impl ValueObject for PalletCount {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
