// 🔍 Search & Sort - name search plus user-selected ordering

use crate::record::{Cell, Column, EntityRecord, ParseError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" | "ascendente" => Ok(SortDirection::Ascending),
            "desc" | "descending" | "descendente" => Ok(SortDirection::Descending),
            other => Err(ParseError::UnknownSortDirection(other.to_string())),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("asc"),
            SortDirection::Descending => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Column,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: Column, direction: SortDirection) -> Self {
        SortSpec { column, direction }
    }

    /// Sort key restricted to the displayed columns.
    /// A key that is not displayed (or no key at all) falls back to `entity_name`.
    pub fn resolve(requested: Option<Column>, displayed: &[Column], direction: SortDirection) -> Self {
        let column = requested
            .filter(|c| displayed.contains(c))
            .unwrap_or(Column::EntityName);
        SortSpec::new(column, direction)
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec::new(Column::EntityName, SortDirection::Ascending)
    }
}

/// Case-insensitive substring match on the entity name.
/// `None` or an empty query keeps every record.
pub fn search<'a>(records: &[&'a EntityRecord], query: Option<&str>) -> Vec<&'a EntityRecord> {
    let needle = match query {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return records.to_vec(),
    };

    records
        .iter()
        .copied()
        .filter(|r| r.entity_name.to_lowercase().contains(&needle))
        .collect()
}

/// Compare two cells of the same column.
///
/// Missing values always sort last, in both directions; only the order of
/// known values is reversed for a descending sort.
pub fn compare_cells(a: &Cell, b: &Cell, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            SortDirection::Ascending => a.cmp(b),
            SortDirection::Descending => b.cmp(a),
        },
    }
}

/// Stable sort of a subset; ties keep their input order
pub fn sort_records<'a>(records: &[&'a EntityRecord], spec: &SortSpec) -> Vec<&'a EntityRecord> {
    let mut keyed: Vec<(Cell, &'a EntityRecord)> = records
        .iter()
        .map(|r| (r.cell(spec.column), *r))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_cells(a, b, spec.direction));
    keyed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityType;
    use chrono::NaiveDate;

    fn names<'a>(records: &[&'a EntityRecord]) -> Vec<&'a str> {
        records.iter().map(|r| r.entity_name.as_str()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let records = vec![
            EntityRecord::new("Capital Riesgo XYZ", EntityType::FondoCapitalRiesgo),
            EntityRecord::new("xyz capital fund", EntityType::FondoCapitalRiesgo),
            EntityRecord::new("Inversiones ABC", EntityType::SociedadCapitalRiesgo),
        ];
        let all: Vec<&EntityRecord> = records.iter().collect();

        let found = search(&all, Some("capital"));
        assert_eq!(names(&found), vec!["Capital Riesgo XYZ", "xyz capital fund"]);

        assert_eq!(search(&all, Some("CAPITAL")).len(), 2);
        assert_eq!(search(&all, Some("")).len(), 3);
        assert_eq!(search(&all, None).len(), 3);
        assert!(search(&all, Some("inexistente")).is_empty());
    }

    #[test]
    fn test_search_handles_accents() {
        let records = vec![EntityRecord::new("INVERSIÓN ÁGIL SCR", EntityType::SociedadCapitalRiesgo)];
        let all: Vec<&EntityRecord> = records.iter().collect();

        assert_eq!(search(&all, Some("inversión")).len(), 1);
    }

    #[test]
    fn test_sort_nulls_last_both_directions() {
        let d = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        let records = vec![
            EntityRecord::new("Sin Fecha", EntityType::FondoCapitalRiesgo),
            EntityRecord::new("Nuevo", EntityType::FondoCapitalRiesgo).with_fecha_registro(d(2022)),
            EntityRecord::new("Viejo", EntityType::FondoCapitalRiesgo).with_fecha_registro(d(2015)),
        ];
        let all: Vec<&EntityRecord> = records.iter().collect();

        let asc = sort_records(&all, &SortSpec::new(Column::FechaRegistro, SortDirection::Ascending));
        assert_eq!(names(&asc), vec!["Viejo", "Nuevo", "Sin Fecha"]);

        let desc = sort_records(&all, &SortSpec::new(Column::FechaRegistro, SortDirection::Descending));
        assert_eq!(names(&desc), vec!["Nuevo", "Viejo", "Sin Fecha"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let records = vec![
            EntityRecord::new("Fondo B", EntityType::FondoCapitalRiesgo).with_gestora("Misma"),
            EntityRecord::new("Fondo A", EntityType::FondoCapitalRiesgo).with_gestora("Misma"),
            EntityRecord::new("Fondo C", EntityType::FondoCapitalRiesgo).with_gestora("Antes"),
        ];
        let all: Vec<&EntityRecord> = records.iter().collect();

        let sorted = sort_records(&all, &SortSpec::new(Column::GestoraNombre, SortDirection::Descending));
        assert_eq!(names(&sorted), vec!["Fondo B", "Fondo A", "Fondo C"]);
    }

    #[test]
    fn test_sort_key_falls_back_to_entity_name() {
        let displayed = [Column::EntityName, Column::Isin];

        let spec = SortSpec::resolve(Some(Column::Isin), &displayed, SortDirection::Descending);
        assert_eq!(spec.column, Column::Isin);

        let spec = SortSpec::resolve(Some(Column::GestoraNombre), &displayed, SortDirection::Ascending);
        assert_eq!(spec.column, Column::EntityName);

        assert_eq!(SortSpec::resolve(None, &[], SortDirection::Ascending), SortSpec::default());
    }

    #[test]
    fn test_parse_sort_direction() {
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Descending);
        assert_eq!("Ascendente".parse::<SortDirection>().unwrap(), SortDirection::Ascending);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
