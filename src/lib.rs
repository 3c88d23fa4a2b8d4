// Capital Riesgo Dashboard - Core Library
// Filter / aggregate / statistics pipeline over the venture-capital registry,
// shared by the CLI, the API server and tests

pub mod record;
pub mod loader;
pub mod filter;
pub mod aggregation;
pub mod statistics;
pub mod search;
pub mod export;
pub mod dashboard;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use record::{Cell, Column, EntityRecord, EntityType, ParseError};
pub use loader::{
    load_dataset, read_records, Dataset, DatasetCache, LoadReport,
    EXCLUDED_ENTITY_TYPES,
};
pub use filter::{apply_filter, filter_options, DateBounds, FilterOptions, FilterSpec};
pub use aggregation::{aggregate, AggregationSpec, RowCount, TableView};
pub use statistics::{compute_metrics, MetricBundle, StatsConfig};
pub use search::{search, sort_records, SortDirection, SortSpec};
pub use export::{export_csv_string, export_filename, export_to_path, write_csv};
pub use dashboard::{explore, metrics, table_view, TableQuery};
pub use config::DashboardConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries (`RUST_LOG` overrides)
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capital_riesgo=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
