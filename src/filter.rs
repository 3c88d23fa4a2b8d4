// 🔎 Filter Engine - conjunction of equality and date-range predicates
//
// Filtering only ever narrows: the output is a subset of the input,
// borrowed from the same immutable dataset.

use crate::record::{EntityRecord, EntityType, ParseError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// FILTER SPEC
// ============================================================================

/// FilterSpec - user selection; `None` means "match all" for that field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub entity_type: Option<EntityType>,
    pub gestora: Option<String>,
    pub depositaria: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_gestora(mut self, gestora: impl Into<String>) -> Self {
        self.gestora = Some(gestora.into());
        self
    }

    pub fn with_depositaria(mut self, depositaria: impl Into<String>) -> Self {
        self.depositaria = Some(depositaria.into());
        self
    }

    /// Inclusive registration-date interval; either bound may be open
    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entity_type.is_none()
            && self.gestora.is_none()
            && self.depositaria.is_none()
            && !self.has_date_range()
    }

    pub fn has_date_range(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    pub fn matches(&self, record: &EntityRecord) -> bool {
        if let Some(entity_type) = self.entity_type {
            if record.entity_type != entity_type {
                return false;
            }
        }

        if let Some(gestora) = &self.gestora {
            if record.gestora_nombre.as_ref() != Some(gestora) {
                return false;
            }
        }

        if let Some(depositaria) = &self.depositaria {
            if record.depositaria_nombre.as_ref() != Some(depositaria) {
                return false;
            }
        }

        if self.has_date_range() {
            // Unknown registration date never satisfies a date filter
            let Some(date) = record.fecha_registro else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }
}

/// Apply a filter to a record subset
pub fn apply_filter<'a>(records: &[&'a EntityRecord], spec: &FilterSpec) -> Vec<&'a EntityRecord> {
    let filtered: Vec<&'a EntityRecord> = records
        .iter()
        .copied()
        .filter(|r| spec.matches(r))
        .collect();

    tracing::debug!(input = records.len(), output = filtered.len(), "filter applied");
    filtered
}

/// Parse a date supplied as a filter bound: ISO `YYYY-MM-DD` or `DD/MM/YYYY`
pub fn parse_filter_date(value: &str) -> Result<NaiveDate, ParseError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| ParseError::InvalidDate(value.to_string()))
}

// ============================================================================
// CONTEXTUAL FILTER OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// FilterOptions - the choices offered to the user for the current selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub entity_types: Vec<EntityType>,
    pub selected_entity_type: Option<EntityType>,
    pub entity_type_description: Option<&'static str>,
    /// Managers present among records of the selected type
    pub gestoras: Vec<String>,
    /// Depositaries present among records of the selected type
    pub depositarias: Vec<String>,
    pub date_bounds: Option<DateBounds>,
}

/// Sorted distinct non-null managers of a subset
pub fn distinct_gestoras(records: &[&EntityRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.gestora_nombre.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct non-null depositaries of a subset
pub fn distinct_depositarias(records: &[&EntityRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.depositaria_nombre.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Derive filter options from the full dataset and the selected entity type.
///
/// Manager and depositary lists only contain values present once the
/// entity-type selection has been applied, so they change whenever the
/// type selection does.
pub fn filter_options(records: &[&EntityRecord], entity_type: Option<EntityType>) -> FilterOptions {
    let entity_types: Vec<EntityType> = records
        .iter()
        .map(|r| r.entity_type)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let narrowed = match entity_type {
        Some(t) => apply_filter(records, &FilterSpec::new().with_entity_type(t)),
        None => records.to_vec(),
    };

    let mut dates = records.iter().filter_map(|r| r.fecha_registro);
    let date_bounds = dates.next().map(|first| {
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        DateBounds { min, max }
    });

    FilterOptions {
        entity_types,
        selected_entity_type: entity_type,
        entity_type_description: entity_type.map(|t| t.description()),
        gestoras: distinct_gestoras(&narrowed),
        depositarias: distinct_depositarias(&narrowed),
        date_bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_records() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new("Fondo Alfa", EntityType::FondoCapitalRiesgo)
                .with_gestora("Gestora Uno")
                .with_depositaria("Banco Norte")
                .with_fecha_registro(date(2020, 6, 15)),
            EntityRecord::new("Fondo Beta", EntityType::FondoCapitalRiesgo)
                .with_gestora("Gestora Dos")
                .with_fecha_registro(date(2021, 1, 1)),
            EntityRecord::new("SCR Gamma", EntityType::SociedadCapitalRiesgo)
                .with_gestora("Gestora Tres")
                .with_depositaria("Banco Sur"),
            EntityRecord::new("SCR Delta", EntityType::SociedadCapitalRiesgo)
                .with_fecha_registro(date(2019, 3, 10)),
        ]
    }

    #[test]
    fn test_empty_spec_matches_all() {
        let records = create_test_records();
        let all: Vec<&EntityRecord> = records.iter().collect();

        let filtered = apply_filter(&all, &FilterSpec::new());
        assert_eq!(filtered.len(), 4);
        assert!(FilterSpec::new().is_empty());
    }

    #[test]
    fn test_equality_predicates() {
        let records = create_test_records();
        let all: Vec<&EntityRecord> = records.iter().collect();

        let by_type = apply_filter(
            &all,
            &FilterSpec::new().with_entity_type(EntityType::SociedadCapitalRiesgo),
        );
        assert_eq!(by_type.len(), 2);

        let by_gestora = apply_filter(&all, &FilterSpec::new().with_gestora("Gestora Uno"));
        assert_eq!(by_gestora.len(), 1);
        assert_eq!(by_gestora[0].entity_name, "Fondo Alfa");

        // Records with no depositary never match a depositary filter
        let by_dep = apply_filter(&all, &FilterSpec::new().with_depositaria("Banco Sur"));
        assert_eq!(by_dep.len(), 1);
        assert_eq!(by_dep[0].entity_name, "SCR Gamma");
    }

    #[test]
    fn test_date_range_is_inclusive_and_skips_unknown_dates() {
        let records = vec![
            EntityRecord::new("Dentro", EntityType::FondoCapitalRiesgo)
                .with_fecha_registro(date(2020, 6, 15)),
            EntityRecord::new("Fuera", EntityType::FondoCapitalRiesgo)
                .with_fecha_registro(date(2021, 1, 1)),
            EntityRecord::new("Limite", EntityType::FondoCapitalRiesgo)
                .with_fecha_registro(date(2020, 12, 31)),
            EntityRecord::new("Sin Fecha", EntityType::FondoCapitalRiesgo),
        ];
        let all: Vec<&EntityRecord> = records.iter().collect();

        let spec = FilterSpec::new().with_date_range(Some(date(2020, 1, 1)), Some(date(2020, 12, 31)));
        let names: Vec<&str> = apply_filter(&all, &spec)
            .iter()
            .map(|r| r.entity_name.as_str())
            .collect();

        assert_eq!(names, vec!["Dentro", "Limite"]);

        // Open-ended bound still excludes unknown dates
        let from_only = FilterSpec::new().with_date_range(Some(date(2000, 1, 1)), None);
        assert_eq!(apply_filter(&all, &from_only).len(), 3);
    }

    #[test]
    fn test_filter_is_narrowing_and_idempotent() {
        let records = create_test_records();
        let all: Vec<&EntityRecord> = records.iter().collect();
        let spec = FilterSpec::new()
            .with_entity_type(EntityType::FondoCapitalRiesgo)
            .with_date_range(Some(date(2020, 1, 1)), None);

        let once = apply_filter(&all, &spec);
        let twice = apply_filter(&once, &spec);

        assert_eq!(once, twice);
        assert!(once
            .iter()
            .all(|r| all.iter().any(|a| std::ptr::eq(*a, *r))));
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let records = create_test_records();
        let all: Vec<&EntityRecord> = records.iter().collect();

        let filtered = apply_filter(&all, &FilterSpec::new().with_gestora("Nadie"));
        assert!(filtered.is_empty());
        assert!(apply_filter(&[], &FilterSpec::new()).is_empty());
    }

    #[test]
    fn test_options_follow_entity_type_selection() {
        let records = create_test_records();
        let all: Vec<&EntityRecord> = records.iter().collect();

        let unfiltered = filter_options(&all, None);
        assert_eq!(
            unfiltered.gestoras,
            vec!["Gestora Dos", "Gestora Tres", "Gestora Uno"]
        );
        assert_eq!(unfiltered.depositarias, vec!["Banco Norte", "Banco Sur"]);
        assert_eq!(
            unfiltered.entity_types,
            vec![EntityType::FondoCapitalRiesgo, EntityType::SociedadCapitalRiesgo]
        );
        assert_eq!(unfiltered.entity_type_description, None);

        let sociedades = filter_options(&all, Some(EntityType::SociedadCapitalRiesgo));
        assert_eq!(sociedades.gestoras, vec!["Gestora Tres"]);
        assert_eq!(sociedades.depositarias, vec!["Banco Sur"]);
        // Type list and date bounds stay dataset-wide
        assert_eq!(sociedades.entity_types.len(), 2);
        assert_eq!(
            sociedades.date_bounds,
            Some(DateBounds {
                min: date(2019, 3, 10),
                max: date(2021, 1, 1)
            })
        );
        assert!(sociedades.entity_type_description.is_some());
    }

    #[test]
    fn test_parse_filter_date_formats() {
        assert_eq!(parse_filter_date("2020-06-15").unwrap(), date(2020, 6, 15));
        assert_eq!(parse_filter_date("15/06/2020").unwrap(), date(2020, 6, 15));
        assert!(matches!(
            parse_filter_date("junio 2020"),
            Err(ParseError::InvalidDate(_))
        ));
    }
}
