// 🧭 Dashboard Queries - one interaction = one pure pipeline run
//
// filter → search → sort → aggregate, recomputed from the immutable
// dataset each time; nothing is maintained incrementally.

use crate::aggregation::{aggregate, AggregationSpec, TableView};
use crate::filter::{apply_filter, FilterSpec};
use crate::record::{Column, EntityRecord};
use crate::search::{search, sort_records, SortDirection, SortSpec};
use crate::statistics::{compute_metrics, MetricBundle, StatsConfig};

/// TableQuery - everything the data explorer sends for one refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub filter: FilterSpec,
    pub search: Option<String>,
    pub columns: Vec<Column>,
    pub sort_by: Option<Column>,
    pub direction: SortDirection,
    /// `None` picks the default: group unless class identifiers are shown
    pub group_by_entity: Option<bool>,
}

impl Default for TableQuery {
    fn default() -> Self {
        TableQuery {
            filter: FilterSpec::default(),
            search: None,
            columns: Column::DEFAULT_DISPLAY.to_vec(),
            sort_by: None,
            direction: SortDirection::Ascending,
            group_by_entity: None,
        }
    }
}

impl TableQuery {
    pub fn sort_spec(&self) -> SortSpec {
        SortSpec::resolve(self.sort_by, &self.columns, self.direction)
    }

    pub fn aggregation_spec(&self) -> AggregationSpec {
        let group = self
            .group_by_entity
            .unwrap_or_else(|| AggregationSpec::default_grouping(&self.columns));
        AggregationSpec::new(self.columns.clone(), group)
    }
}

/// Filtered, searched and sorted records, before projection
pub fn explore<'a>(records: &[&'a EntityRecord], query: &TableQuery) -> Vec<&'a EntityRecord> {
    let filtered = apply_filter(records, &query.filter);
    let found = search(&filtered, query.search.as_deref());
    sort_records(&found, &query.sort_spec())
}

/// Table shown in the data explorer
pub fn table_view(records: &[&EntityRecord], query: &TableQuery) -> TableView {
    let rows = explore(records, query);
    aggregate(&rows, &query.aggregation_spec())
}

/// Metrics for the current filter selection (search does not apply)
pub fn metrics(records: &[&EntityRecord], filter: &FilterSpec, config: &StatsConfig) -> MetricBundle {
    let filtered = apply_filter(records, filter);
    compute_metrics(&filtered, config)
}
