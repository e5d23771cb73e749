// Earnings Dashboard - Core Library
// Exposes the pipeline for the CLI, the API server, and tests

pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod normalize;
pub mod period;
pub mod record;
pub mod service;
pub mod source;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use classify::{classify, FeeRule, FeeSchedule};
pub use config::{Config, ServerConfig, SourceConfig};
pub use dashboard::{
    compute, money, DashboardSettings, DashboardStatus, DashboardView, DisplayTable, Metric,
    MonthOption,
};
pub use error::{ConfigError, SourceError};
pub use normalize::{normalize, parse_day_first, Normalization, NormalizedRecord};
pub use period::{
    aggregate, attach_fees, available_months, select_month, FeeRecord, MonthlyEarnings,
    PayPeriod, PayPeriodSummary, YearMonth,
};
pub use record::{ColumnMap, RawRecord, RecordSnapshot, DATE_SEEN, TIMESTAMP};
pub use service::DashboardService;
pub use source::{
    read_snapshot, Connector, CsvFileConnector, LazyConnection, RecordSource, SheetConnector,
    StaticSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
