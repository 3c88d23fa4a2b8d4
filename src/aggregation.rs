// 🧮 Aggregation Engine - collapse share classes into one row per entity
//
// Grouping columns = selected columns that are not class-specific.
// Class-specific columns are reduced per group:
//   denominacion / numero → "N clases" (single `clases` output column)
//   isin                  → first 3 distinct values, "..." if more
//   anything else         → first non-null value

use crate::record::{Cell, Column, EntityRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Output name shared by the `denominacion` and `numero` reductions
pub const CLASSES_COLUMN: &str = "clases";

/// How many distinct ISINs are listed before truncating
pub const ISIN_PREVIEW_LIMIT: usize = 3;

// ============================================================================
// SPEC & OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub columns: Vec<Column>,
    pub group_by_entity: bool,
}

impl AggregationSpec {
    pub fn new(columns: Vec<Column>, group_by_entity: bool) -> Self {
        AggregationSpec {
            columns,
            group_by_entity,
        }
    }

    /// Grouping is on by default unless class identifiers are displayed
    pub fn with_default_grouping(columns: Vec<Column>) -> Self {
        let group_by_entity = Self::default_grouping(&columns);
        AggregationSpec::new(columns, group_by_entity)
    }

    pub fn default_grouping(columns: &[Column]) -> bool {
        !shows_class_identifiers(columns)
    }

    /// Selected columns that identify an entity (the group key)
    pub fn grouping_columns(&self) -> Vec<Column> {
        self.columns
            .iter()
            .copied()
            .filter(|c| !c.is_class_specific())
            .collect()
    }
}

impl Default for AggregationSpec {
    fn default() -> Self {
        AggregationSpec::with_default_grouping(Column::DEFAULT_DISPLAY.to_vec())
    }
}

fn shows_class_identifiers(columns: &[Column]) -> bool {
    columns.contains(&Column::Denominacion) || columns.contains(&Column::Numero)
}

/// RowCount - how many rows a view shows, as reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowCount {
    /// Grouped view: one row per entity, backed by more records
    Entities {
        unique_entities: usize,
        total_records: usize,
    },
    Records { records: usize },
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCount::Entities {
                unique_entities,
                total_records,
            } => write!(
                f,
                "{} unique entities ({} total records)",
                unique_entities, total_records
            ),
            RowCount::Records { records } => write!(f, "{} records", records),
        }
    }
}

/// TableView - column headers plus projected (possibly reduced) rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub row_count: RowCount,
    pub row_count_label: String,
}

impl TableView {
    fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>, row_count: RowCount) -> Self {
        TableView {
            columns,
            rows,
            row_count_label: row_count.to_string(),
            row_count,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a header, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows rendered for display (dates as DD/MM/YYYY)
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::display).collect())
            .collect()
    }
}

// ============================================================================
// REDUCERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reducer {
    ClassCount,
    IsinPreview,
    First,
}

impl Reducer {
    fn for_column(column: Column) -> Self {
        match column {
            Column::Denominacion | Column::Numero => Reducer::ClassCount,
            Column::Isin => Reducer::IsinPreview,
            _ => Reducer::First,
        }
    }

    fn reduce(&self, column: Column, members: &[&EntityRecord]) -> Cell {
        match self {
            Reducer::ClassCount => Cell::Text(format!("{} clases", members.len())),
            Reducer::IsinPreview => isin_preview(members.iter().map(|r| r.cell(column))),
            Reducer::First => members
                .iter()
                .map(|r| r.cell(column))
                .find(|c| !c.is_null())
                .unwrap_or(Cell::Null),
        }
    }
}

/// Distinct non-null values in first-seen order, capped with "..."
fn isin_preview(values: impl Iterator<Item = Cell>) -> Cell {
    let mut seen = HashSet::new();
    let distinct: Vec<String> = values
        .filter_map(|c| match c {
            Cell::Text(s) => Some(s),
            Cell::Null => None,
            other => Some(other.display()),
        })
        .filter(|s| seen.insert(s.clone()))
        .collect();

    if distinct.is_empty() {
        return Cell::Null;
    }

    let mut preview = distinct
        .iter()
        .take(ISIN_PREVIEW_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if distinct.len() > ISIN_PREVIEW_LIMIT {
        preview.push_str("...");
    }
    Cell::Text(preview)
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Project records onto the selected columns, one row per record
pub fn project(records: &[&EntityRecord], columns: &[Column]) -> Vec<Vec<Cell>> {
    records.iter().map(|r| r.project(columns)).collect()
}

/// Drop repeated rows, keeping the first occurrence
fn dedup_rows(rows: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

fn headers(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Build the table view for a record subset.
///
/// Input order is preserved: groups appear in the order their first record
/// does, so a sort applied beforehand carries through.
pub fn aggregate(records: &[&EntityRecord], spec: &AggregationSpec) -> TableView {
    let columns = &spec.columns;
    let grouped_label = spec.group_by_entity && !shows_class_identifiers(columns);

    let (header, rows) = if !spec.group_by_entity || columns.is_empty() {
        (headers(columns), project(records, columns))
    } else {
        let grouping = spec.grouping_columns();
        let reduced: Vec<Column> = columns
            .iter()
            .copied()
            .filter(|c| c.is_class_specific())
            .collect();

        if grouping.is_empty() || reduced.is_empty() {
            // Nothing to group by, or nothing to reduce: plain row dedup
            (headers(columns), dedup_rows(project(records, columns)))
        } else {
            group_records(records, &grouping, &reduced)
        }
    };

    let row_count = if grouped_label {
        RowCount::Entities {
            unique_entities: rows.len(),
            total_records: records.len(),
        }
    } else {
        RowCount::Records { records: rows.len() }
    };

    tracing::debug!(
        input = records.len(),
        output = rows.len(),
        grouped = spec.group_by_entity,
        "aggregation built"
    );

    TableView::new(header, rows, row_count)
}

/// Group on `grouping` columns and reduce the `reduced` ones.
/// Output columns: grouping columns, then reductions (denominacion and
/// numero share one `clases` column).
fn group_records(
    records: &[&EntityRecord],
    grouping: &[Column],
    reduced: &[Column],
) -> (Vec<String>, Vec<Vec<Cell>>) {
    let mut index: HashMap<Vec<Cell>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Cell>, Vec<&EntityRecord>)> = Vec::new();

    for &record in records {
        let key = record.project(grouping);
        match index.get(&key) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![record]));
            }
        }
    }

    let mut output: Vec<(String, Column)> = Vec::new();
    for column in reduced {
        let name = match Reducer::for_column(*column) {
            Reducer::ClassCount => CLASSES_COLUMN.to_string(),
            _ => column.name().to_string(),
        };
        if !output.iter().any(|(n, _)| *n == name) {
            output.push((name, *column));
        }
    }

    let mut header = headers(grouping);
    header.extend(output.iter().map(|(name, _)| name.clone()));

    let rows = groups
        .into_iter()
        .map(|(mut key, members)| {
            for (_, column) in &output {
                key.push(Reducer::for_column(*column).reduce(*column, &members));
            }
            key
        })
        .collect();

    (header, rows)
}
