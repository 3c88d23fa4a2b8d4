// 📊 Statistics Engine - descriptive metrics over a record subset
//
// Every metric degrades to zero / empty / "N/A" on an empty subset.

use crate::record::{EntityRecord, EntityType};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

// ============================================================================
// CONFIG
// ============================================================================

/// Ranking sizes used by the dashboard views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Managers in the ranking chart
    pub top_gestoras: usize,
    /// Managers counted in the top-N cumulative market share
    pub market_share_top: usize,
    /// Managers in the "most connected" ranking
    pub connectivity_top: usize,
    /// Rows of the manager summary table
    pub gestora_summary_top: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            top_gestoras: 15,
            market_share_top: 10,
            connectivity_top: 5,
            gestora_summary_top: 10,
        }
    }
}

// ============================================================================
// METRIC TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub entity_count: usize,
    pub record_count: usize,
    pub entity_type_count: usize,
    pub gestora_count: usize,
    pub depositaria_count: usize,
    pub latest_registration: Option<NaiveDate>,
    /// "%b %Y" of the latest registration, or "N/A"
    pub latest_registration_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub present: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Coverage {
    pub fn new(present: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            present as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Coverage {
            present,
            total,
            percentage,
        }
    }

    pub fn missing(&self) -> usize {
        self.total - self.present
    }

    pub fn missing_percentage(&self) -> f64 {
        if self.total > 0 {
            self.missing() as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageReport {
    pub isin: Coverage,
    pub folleto: Coverage,
    pub gestora: Coverage,
    pub depositaria: Coverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub entity_type: EntityType,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    /// First day of the month
    pub month: NaiveDate,
    pub count: usize,
}

/// Registrations per (entity type, year), zero-filled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearTypeMatrix {
    pub years: Vec<i32>,
    pub entity_types: Vec<EntityType>,
    /// `counts[type_index][year_index]`
    pub counts: Vec<Vec<usize>>,
}

impl YearTypeMatrix {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn get(&self, entity_type: EntityType, year: i32) -> usize {
        let row = self.entity_types.iter().position(|t| *t == entity_type);
        let col = self.years.iter().position(|y| *y == year);
        match (row, col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Concentration {
    /// Sum of squared manager shares, in (0, 1]; 0 when no manager is known
    pub herfindahl: f64,
    /// Cumulative share of the top-N managers, in percent
    pub top_share_percentage: f64,
    pub top_n: usize,
    /// Records with a manager assigned (the share denominator)
    pub assigned_records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipSummary {
    /// Records with entity, manager and depositary all known
    pub connections: usize,
    pub gestoras: usize,
    pub depositarias: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub name: String,
    pub entities: usize,
    /// Most frequent entity type among this company's records
    pub principal_type: Option<EntityType>,
}

/// MetricBundle - everything the dashboard shows for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBundle {
    pub overview: Overview,
    pub coverage: CoverageReport,
    pub entity_types: Vec<TypeCount>,
    pub top_gestoras: Vec<RankedCount>,
    pub timeline: Vec<MonthlyCount>,
    pub year_type_matrix: YearTypeMatrix,
    pub connectivity: Vec<RankedCount>,
    pub concentration: Concentration,
    pub relationships: RelationshipSummary,
    pub gestora_summary: Vec<CompanySummary>,
    pub depositaria_summary: Vec<CompanySummary>,
}

// ============================================================================
// HELPERS
// ============================================================================

/// Occurrence counts sorted by count (desc), then name (asc)
fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<RankedCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut result: Vec<RankedCount> = counts
        .into_iter()
        .map(|(name, count)| RankedCount {
            name: name.to_string(),
            count,
        })
        .collect();

    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    result
}

fn distinct<T: std::hash::Hash + Eq>(values: impl Iterator<Item = T>) -> usize {
    values.collect::<HashSet<_>>().len()
}

fn gestoras<'a>(records: &'a [&'a EntityRecord]) -> impl Iterator<Item = &'a str> {
    records.iter().filter_map(|r| r.gestora_nombre.as_deref())
}

// ============================================================================
// METRICS
// ============================================================================

pub fn overview(records: &[&EntityRecord]) -> Overview {
    let latest = latest_registration(records);

    Overview {
        entity_count: distinct(records.iter().map(|r| r.entity_name.as_str())),
        record_count: records.len(),
        entity_type_count: distinct(records.iter().map(|r| r.entity_type)),
        gestora_count: distinct(gestoras(records)),
        depositaria_count: distinct(records.iter().filter_map(|r| r.depositaria_nombre.as_deref())),
        latest_registration: latest,
        latest_registration_label: latest
            .map(|d| d.format("%b %Y").to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    }
}

pub fn latest_registration(records: &[&EntityRecord]) -> Option<NaiveDate> {
    records.iter().filter_map(|r| r.fecha_registro).max()
}

pub fn coverage(records: &[&EntityRecord]) -> CoverageReport {
    let total = records.len();
    let count = |present: fn(&EntityRecord) -> bool| {
        Coverage::new(records.iter().filter(|r| present(r)).count(), total)
    };

    CoverageReport {
        isin: count(|r: &EntityRecord| r.isin.is_some()),
        folleto: count(|r: &EntityRecord| r.folleto_url.is_some()),
        gestora: count(|r: &EntityRecord| r.gestora_nombre.is_some()),
        depositaria: count(|r: &EntityRecord| r.depositaria_nombre.is_some()),
    }
}

/// Records per entity type, most frequent first
pub fn entity_type_distribution(records: &[&EntityRecord]) -> Vec<TypeCount> {
    let mut counts: HashMap<EntityType, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.entity_type).or_insert(0) += 1;
    }

    let mut result: Vec<TypeCount> = counts
        .into_iter()
        .map(|(entity_type, count)| TypeCount { entity_type, count })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.entity_type.cmp(&b.entity_type)));
    result
}

/// Managers by number of records, top `n`
pub fn top_gestoras(records: &[&EntityRecord], n: usize) -> Vec<RankedCount> {
    let mut result = ranked(gestoras(records));
    result.truncate(n);
    result
}

/// Registrations per calendar month (known dates only), oldest first
pub fn monthly_timeline(records: &[&EntityRecord]) -> Vec<MonthlyCount> {
    let mut buckets: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in records.iter().filter_map(|r| r.fecha_registro) {
        if let Some(month) = date.with_day(1) {
            *buckets.entry(month).or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect()
}

/// Registrations per entity type and year (known dates only)
pub fn year_type_matrix(records: &[&EntityRecord]) -> YearTypeMatrix {
    let dated: Vec<(EntityType, i32)> = records
        .iter()
        .filter_map(|r| r.fecha_registro.map(|d| (r.entity_type, d.year())))
        .collect();

    let years: Vec<i32> = dated.iter().map(|(_, y)| *y).collect::<BTreeSet<_>>().into_iter().collect();
    let entity_types: Vec<EntityType> = dated
        .iter()
        .map(|(t, _)| *t)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut counts = vec![vec![0; years.len()]; entity_types.len()];
    for (entity_type, year) in &dated {
        // Both lookups succeed: the axes were built from `dated`
        if let (Ok(r), Ok(c)) = (entity_types.binary_search(entity_type), years.binary_search(year)) {
            counts[r][c] += 1;
        }
    }

    YearTypeMatrix {
        years,
        entity_types,
        counts,
    }
}

/// For each manager, the number of distinct depositaries it works with.
/// Managers whose records have no depositary count 0.
pub fn gestora_connectivity(records: &[&EntityRecord], n: usize) -> Vec<RankedCount> {
    let mut links: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in records {
        if let Some(gestora) = record.gestora_nombre.as_deref() {
            let deps = links.entry(gestora).or_default();
            if let Some(dep) = record.depositaria_nombre.as_deref() {
                deps.insert(dep);
            }
        }
    }

    let mut result: Vec<RankedCount> = links
        .into_iter()
        .map(|(name, deps)| RankedCount {
            name: name.to_string(),
            count: deps.len(),
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    result.truncate(n);
    result
}

/// Herfindahl index over manager shares plus top-N cumulative share.
///
/// Shares are taken over records that have a manager; records without one
/// are left out of both numerator and denominator.
pub fn market_concentration(records: &[&EntityRecord], top_n: usize) -> Concentration {
    let ranking = ranked(gestoras(records));
    let assigned: usize = ranking.iter().map(|r| r.count).sum();

    if assigned == 0 {
        return Concentration {
            herfindahl: 0.0,
            top_share_percentage: 0.0,
            top_n,
            assigned_records: 0,
        };
    }

    let total = assigned as f64;
    let herfindahl = ranking
        .iter()
        .map(|r| {
            let share = r.count as f64 / total;
            share * share
        })
        .sum();
    let top: usize = ranking.iter().take(top_n).map(|r| r.count).sum();

    Concentration {
        herfindahl,
        top_share_percentage: top as f64 / total * 100.0,
        top_n,
        assigned_records: assigned,
    }
}

pub fn relationship_summary(records: &[&EntityRecord]) -> RelationshipSummary {
    let linked: Vec<(&str, &str)> = records
        .iter()
        .filter_map(|r| Some((r.gestora_nombre.as_deref()?, r.depositaria_nombre.as_deref()?)))
        .collect();

    RelationshipSummary {
        connections: linked.len(),
        gestoras: distinct(linked.iter().map(|(g, _)| *g)),
        depositarias: distinct(linked.iter().map(|(_, d)| *d)),
    }
}

/// Per-company table: distinct entities and principal entity type,
/// sorted by entity count (desc) then name.
fn company_summary<'a>(
    records: &[&'a EntityRecord],
    company: impl Fn(&'a EntityRecord) -> Option<&'a str>,
    limit: Option<usize>,
) -> Vec<CompanySummary> {
    let mut by_company: HashMap<&str, Vec<&EntityRecord>> = HashMap::new();
    for &record in records {
        if let Some(name) = company(record) {
            by_company.entry(name).or_default().push(record);
        }
    }

    let mut result: Vec<CompanySummary> = by_company
        .into_iter()
        .map(|(name, members)| {
            let principal_type = entity_type_distribution(&members)
                .first()
                .map(|t| t.entity_type);
            CompanySummary {
                name: name.to_string(),
                entities: distinct(members.iter().map(|r| r.entity_name.as_str())),
                principal_type,
            }
        })
        .collect();

    result.sort_by(|a, b| b.entities.cmp(&a.entities).then_with(|| a.name.cmp(&b.name)));
    if let Some(limit) = limit {
        result.truncate(limit);
    }
    result
}

pub fn gestora_summary(records: &[&EntityRecord], limit: usize) -> Vec<CompanySummary> {
    company_summary(records, |r| r.gestora_nombre.as_deref(), Some(limit))
}

pub fn depositaria_summary(records: &[&EntityRecord]) -> Vec<CompanySummary> {
    company_summary(records, |r| r.depositaria_nombre.as_deref(), None)
}

/// Compute the full metric bundle for a subset
pub fn compute_metrics(records: &[&EntityRecord], config: &StatsConfig) -> MetricBundle {
    let bundle = MetricBundle {
        overview: overview(records),
        coverage: coverage(records),
        entity_types: entity_type_distribution(records),
        top_gestoras: top_gestoras(records, config.top_gestoras),
        timeline: monthly_timeline(records),
        year_type_matrix: year_type_matrix(records),
        connectivity: gestora_connectivity(records, config.connectivity_top),
        concentration: market_concentration(records, config.market_share_top),
        relationships: relationship_summary(records),
        gestora_summary: gestora_summary(records, config.gestora_summary_top),
        depositaria_summary: depositaria_summary(records),
    };

    tracing::debug!(
        records = records.len(),
        entities = bundle.overview.entity_count,
        "metrics computed"
    );
    bundle
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
                .with_isin("ES0000000001")
                .with_folleto_url("https://example.org/alfa.pdf")
                .with_fecha_registro(date(2020, 6, 15)),
            EntityRecord::new("Fondo Alfa", EntityType::FondoCapitalRiesgo)
                .with_gestora("Gestora Uno")
                .with_depositaria("Banco Norte")
                .with_isin("ES0000000002")
                .with_fecha_registro(date(2020, 6, 15)),
            EntityRecord::new("Fondo Beta", EntityType::FondoCapitalRiesgoPyme)
                .with_gestora("Gestora Uno")
                .with_depositaria("Banco Sur")
                .with_fecha_registro(date(2020, 6, 20)),
            EntityRecord::new("SCR Gamma", EntityType::SociedadCapitalRiesgo)
                .with_gestora("Gestora Dos")
                .with_fecha_registro(date(2021, 3, 1)),
            EntityRecord::new("SCR Delta", EntityType::SociedadCapitalRiesgo),
        ]
    }

    #[test]
    fn test_overview_counts() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let o = overview(&subset);

        assert_eq!(o.entity_count, 4);
        assert_eq!(o.record_count, 5);
        assert_eq!(o.entity_type_count, 3);
        assert_eq!(o.gestora_count, 2);
        assert_eq!(o.depositaria_count, 2);
        assert_eq!(o.latest_registration, Some(date(2021, 3, 1)));
        assert_eq!(o.latest_registration_label, "Mar 2021");
    }

    #[test]
    fn test_empty_subset_degrades_gracefully() {
        let bundle = compute_metrics(&[], &StatsConfig::default());

        assert_eq!(bundle.overview.entity_count, 0);
        assert_eq!(bundle.overview.latest_registration_label, "N/A");
        assert_eq!(bundle.coverage.isin.percentage, 0.0);
        assert!(bundle.top_gestoras.is_empty());
        assert!(bundle.timeline.is_empty());
        assert!(bundle.year_type_matrix.is_empty());
        assert_eq!(bundle.concentration.herfindahl, 0.0);
        assert_eq!(bundle.concentration.top_share_percentage, 0.0);
        assert_eq!(bundle.relationships.connections, 0);
    }

    #[test]
    fn test_coverage_and_complement_sum_to_100() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let c = coverage(&subset);

        assert_eq!(c.isin.present, 2);
        assert_eq!(c.folleto.present, 1);
        assert_eq!(c.gestora.present, 4);
        assert_eq!(c.depositaria.present, 3);
        assert!((c.gestora.percentage - 80.0).abs() < 1e-9);

        for cov in [c.isin, c.folleto, c.gestora, c.depositaria] {
            assert!((cov.percentage + cov.missing_percentage() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_top_gestoras_ranking() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let top = top_gestoras(&subset, 15);
        assert_eq!(
            top,
            vec![
                RankedCount { name: "Gestora Uno".to_string(), count: 3 },
                RankedCount { name: "Gestora Dos".to_string(), count: 1 },
            ]
        );

        assert_eq!(top_gestoras(&subset, 1).len(), 1);
    }

    #[test]
    fn test_monthly_timeline_skips_unknown_dates() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let timeline = monthly_timeline(&subset);

        assert_eq!(
            timeline,
            vec![
                MonthlyCount { month: date(2020, 6, 1), count: 3 },
                MonthlyCount { month: date(2021, 3, 1), count: 1 },
            ]
        );
    }

    #[test]
    fn test_year_type_matrix() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let matrix = year_type_matrix(&subset);

        assert_eq!(matrix.years, vec![2020, 2021]);
        assert_eq!(matrix.entity_types.len(), 3);
        assert_eq!(matrix.get(EntityType::FondoCapitalRiesgo, 2020), 2);
        assert_eq!(matrix.get(EntityType::FondoCapitalRiesgo, 2021), 0);
        assert_eq!(matrix.get(EntityType::SociedadCapitalRiesgo, 2021), 1);
        // SCR Delta has no date and is not counted anywhere
        let total: usize = matrix.counts.iter().flatten().sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_connectivity() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let connected = gestora_connectivity(&subset, 5);

        assert_eq!(connected[0], RankedCount { name: "Gestora Uno".to_string(), count: 2 });
        assert_eq!(connected[1], RankedCount { name: "Gestora Dos".to_string(), count: 0 });
    }

    #[test]
    fn test_herfindahl_equal_shares() {
        let records: Vec<EntityRecord> = (0..4)
            .flat_map(|i| {
                (0..3).map(move |j| {
                    EntityRecord::new(format!("Fondo {}-{}", i, j), EntityType::FondoCapitalRiesgo)
                        .with_gestora(format!("Gestora {}", i))
                })
            })
            .collect();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let c = market_concentration(&subset, 10);

        assert!((c.herfindahl - 0.25).abs() < 1e-9);
        assert!((c.top_share_percentage - 100.0).abs() < 1e-9);
        assert_eq!(c.assigned_records, 12);
    }

    #[test]
    fn test_herfindahl_in_unit_interval() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let c = market_concentration(&subset, 1);

        // Shares 3/4 and 1/4 over records with a manager
        assert!((c.herfindahl - 0.625).abs() < 1e-9);
        assert!(c.herfindahl > 0.0 && c.herfindahl <= 1.0);
        assert!((c.top_share_percentage - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_relationship_summary() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let r = relationship_summary(&subset);

        assert_eq!(r.connections, 3);
        assert_eq!(r.gestoras, 1);
        assert_eq!(r.depositarias, 2);
    }

    #[test]
    fn test_company_summaries() {
        let records = create_test_records();
        let subset: Vec<&EntityRecord> = records.iter().collect();

        let gestoras = gestora_summary(&subset, 10);
        assert_eq!(gestoras[0].name, "Gestora Uno");
        assert_eq!(gestoras[0].entities, 2);
        assert_eq!(gestoras[0].principal_type, Some(EntityType::FondoCapitalRiesgo));

        let deps = depositaria_summary(&subset);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "Banco Norte");
        assert_eq!(deps[1].principal_type, Some(EntityType::FondoCapitalRiesgoPyme));
    }
}
