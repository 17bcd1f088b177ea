//! Engine configuration read from the environment.

use tracing::warn;

pub const DEFAULT_MAX_REPORT_DAYS: u64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest report range accepted, in days (both endpoints inclusive).
    pub max_report_days: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_report_days: DEFAULT_MAX_REPORT_DAYS,
        }
    }
}

impl EngineConfig {
    /// Reads `PALLETFLOW_MAX_REPORT_DAYS`; unset or invalid values fall back to
    /// the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_report_days = match lookup("PALLETFLOW_MAX_REPORT_DAYS") {
            None => DEFAULT_MAX_REPORT_DAYS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        value = %raw,
                        default = DEFAULT_MAX_REPORT_DAYS,
                        "invalid PALLETFLOW_MAX_REPORT_DAYS, using default"
                    );
                    DEFAULT_MAX_REPORT_DAYS
                }
            },
        };
        Self { max_report_days }
    }
}
