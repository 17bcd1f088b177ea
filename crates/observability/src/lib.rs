//! Process-wide logging setup shared by the palletflow binaries and tests.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with the format chosen by `PALLETFLOW_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Human-readable logs captured by the test harness.
pub fn init_for_tests() {
    tracing::init_test_writer();
}
