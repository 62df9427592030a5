// Energy Insights - Core Library
// Normalizes irregular energy/economic statistic exports into tidy
// (entity, metric, year) → value records and runs the repeated analytical
// transforms every report reuses.

pub mod analytics;
pub mod cache;
pub mod normalizer;
pub mod query;
pub mod registry;
pub mod reports;
pub mod source;
pub mod store;
pub mod window;

// Re-export commonly used types
pub use analytics::{
    herfindahl_index, pearson_correlation, percentage_change, shannon_diversity, AnalyticsError,
    EntityChange, Outcome,
};
pub use cache::{LoadedSource, StoreCache};
pub use normalizer::{
    normalize, ContextTracker, NormalizeError, NormalizeReport, NormalizerConfig, RowKind,
};
pub use query::{Projection, Selection};
pub use registry::{CanonicalMetric, EntityClass, MetricRegistry};
pub use reports::{
    change_correlation, fossil_reduction, production_concentration, renewable_diversity,
    ConcentrationReport, CorrelationReport, DiversityReport, FossilReductionReport, ReportConfig,
    ReportError,
};
pub use source::{
    fingerprint_bytes, parse_csv_grid, CsvFileSource, GridSource, RawGrid, SourceDescriptor,
};
pub use store::{NormalizedStore, Record};
pub use window::{select_window, WindowConfig, WindowError, WindowSelection};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
