// 📂 Dataset Loader - read the registry file once, normalize, cache
//
// Dates that do not parse become unknown (None), never an error.
// A broken file (unreadable, malformed CSV) is fatal.

use crate::record::{EntityRecord, EntityType};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Source date format (day/month/year)
pub const SOURCE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Entity types dropped at load time: mostly empty rows for our purposes
pub const EXCLUDED_ENTITY_TYPES: [&str; 2] = [
    "Gestora de entidades de inversión de tipo cerrado",
    "Fondo de inversión a largo plazo europeo",
];

// ============================================================================
// RAW ROW (as it sits in the CSV)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    entity_name: Option<String>,
    entity_type: Option<String>,
    gestora_nombre: Option<String>,
    depositaria_nombre: Option<String>,
    fecha_registro: Option<String>,
    fecha_ultimo_folleto: Option<String>,
    isin: Option<String>,
    folleto_url: Option<String>,
    denominacion: Option<String>,
    numero: Option<String>,
    fecha_alta: Option<String>,
    dfi: Option<String>,
}

/// Empty cells are missing values
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse a DD/MM/YYYY date. Anything else is unknown.
pub fn parse_source_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), SOURCE_DATE_FORMAT).ok()
}

// ============================================================================
// LOAD REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub excluded_by_type: usize,
    pub unknown_type: usize,
    pub missing_name: usize,
    /// Non-empty `fecha_registro` values that failed to parse
    pub unparsed_fecha_registro: usize,
    /// Non-empty `fecha_ultimo_folleto` values that failed to parse
    pub unparsed_fecha_ultimo_folleto: usize,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rows read, {} kept ({} excluded by type, {} unknown type, {} without name)",
            self.rows_read, self.rows_kept, self.excluded_by_type, self.unknown_type, self.missing_name
        )
    }
}

/// Parse a date cell, counting values that are present but unparseable
fn normalize_date(value: Option<String>, unparsed: &mut usize) -> Option<NaiveDate> {
    let raw = non_empty(value)?;
    let parsed = parse_source_date(&raw);
    if parsed.is_none() {
        *unparsed += 1;
    }
    parsed
}

// ============================================================================
// READING
// ============================================================================

/// Read and normalize registry rows from any CSV reader
pub fn read_records<R: Read>(reader: R) -> Result<(Vec<EntityRecord>, LoadReport)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut report = LoadReport::default();

    for (line_num, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row = result.with_context(|| {
            format!("Failed to parse CSV line {}", line_num + 2) // +2: 1-indexed + header row
        })?;
        report.rows_read += 1;

        let type_label = non_empty(row.entity_type).unwrap_or_default();
        if EXCLUDED_ENTITY_TYPES.contains(&type_label.as_str()) {
            report.excluded_by_type += 1;
            continue;
        }

        let entity_type = match type_label.parse::<EntityType>() {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(line = line_num + 2, entity_type = %type_label, "skipping row with unknown entity type");
                report.unknown_type += 1;
                continue;
            }
        };

        let Some(entity_name) = non_empty(row.entity_name) else {
            tracing::warn!(line = line_num + 2, "skipping row without entity name");
            report.missing_name += 1;
            continue;
        };

        records.push(EntityRecord {
            entity_name,
            entity_type,
            gestora_nombre: non_empty(row.gestora_nombre),
            depositaria_nombre: non_empty(row.depositaria_nombre),
            fecha_registro: normalize_date(row.fecha_registro, &mut report.unparsed_fecha_registro),
            fecha_ultimo_folleto: normalize_date(
                row.fecha_ultimo_folleto,
                &mut report.unparsed_fecha_ultimo_folleto,
            ),
            isin: non_empty(row.isin),
            folleto_url: non_empty(row.folleto_url),
            denominacion: non_empty(row.denominacion),
            numero: non_empty(row.numero),
            fecha_alta: non_empty(row.fecha_alta),
            dfi: non_empty(row.dfi),
        });
    }

    report.rows_kept = records.len();
    Ok((records, report))
}

/// Load the registry file. Failure here is fatal for the session.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    tracing::info!(path = %path.display(), "loading dataset");

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let (records, report) = read_records(file)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    tracing::info!(
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        excluded_by_type = report.excluded_by_type,
        unknown_type = report.unknown_type,
        unparsed_fecha_registro = report.unparsed_fecha_registro,
        unparsed_fecha_ultimo_folleto = report.unparsed_fecha_ultimo_folleto,
        "dataset loaded"
    );

    Ok(Dataset {
        records,
        report,
        source: Some(path.to_path_buf()),
    })
}

// ============================================================================
// DATASET (immutable once loaded)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<EntityRecord>,
    report: LoadReport,
    source: Option<PathBuf>,
}

impl Dataset {
    /// Build an in-memory dataset; exclusion rules are assumed already applied
    pub fn from_records(records: Vec<EntityRecord>) -> Self {
        let report = LoadReport {
            rows_read: records.len(),
            rows_kept: records.len(),
            ..LoadReport::default()
        };
        Dataset {
            records,
            report,
            source: None,
        }
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Borrowed view over every record, the starting point of each pipeline run
    pub fn all(&self) -> Vec<&EntityRecord> {
        self.records.iter().collect()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest known registration dates (date picker limits)
    pub fn registration_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.fecha_registro);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// "Data last updated" label: month and year of the latest registration
    pub fn freshness_label(&self) -> String {
        self.registration_bounds()
            .map(|(_, latest)| latest.format("%B %Y").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

// ============================================================================
// SESSION CACHE
// ============================================================================

/// DatasetCache - loads the registry on first use and hands out shared,
/// read-only snapshots until explicitly invalidated
pub struct DatasetCache {
    path: PathBuf,
    slot: RwLock<Option<Arc<Dataset>>>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DatasetCache {
            path: path.into(),
            slot: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached dataset, loading it if the cache is empty
    pub fn get(&self) -> Result<Arc<Dataset>> {
        {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            if let Some(dataset) = slot.as_ref() {
                tracing::trace!("dataset cache hit");
                return Ok(Arc::clone(dataset));
            }
        }

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have loaded it while we waited for the lock
        if let Some(dataset) = slot.as_ref() {
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(load_dataset(&self.path)?);
        *slot = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Drop the cached dataset; the next `get` reloads from disk
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            tracing::info!(path = %self.path.display(), "dataset cache invalidated");
        }
    }

    /// Load a fresh snapshot and swap it in; on failure the current one stays
    pub fn reload(&self) -> Result<Arc<Dataset>> {
        let dataset = Arc::new(load_dataset(&self.path)?);

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::clone(&dataset));
        tracing::info!(path = %self.path.display(), records = dataset.len(), "dataset reloaded");
        Ok(dataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "entity_name,entity_type,gestora_nombre,depositaria_nombre,fecha_registro,fecha_ultimo_folleto,isin,folleto_url,denominacion,numero";

    fn sample_csv() -> String {
        [
            HEADER,
            "Fondo Alfa,Fondos de capital-riesgo,Gestora Uno,Banco Custodio,15/06/2020,01/02/2021,ES0000000001,https://example.org/a.pdf,Clase A,1",
            "Fondo Alfa,Fondos de capital-riesgo,Gestora Uno,Banco Custodio,15/06/2020,01/02/2021,ES0000000002,https://example.org/a.pdf,Clase B,2",
            "Gestora Cerrada,Gestora de entidades de inversión de tipo cerrado,,,01/01/2019,,,,,",
            "ELTIF Uno,Fondo de inversión a largo plazo europeo,,,01/01/2022,,,,,",
            "SCR Beta,Sociedades de capital-riesgo,,,not-a-date,,,,,",
            "Misterio,Tipo desconocido,,,01/01/2020,,,,,",
        ]
        .join("\n")
    }

    #[test]
    fn test_excluded_types_are_dropped() {
        let (records, report) = read_records(sample_csv().as_bytes()).unwrap();

        assert!(records
            .iter()
            .all(|r| !EXCLUDED_ENTITY_TYPES.contains(&r.entity_type.label())));
        assert_eq!(report.rows_read, 6);
        assert_eq!(report.excluded_by_type, 2);
        assert_eq!(report.unknown_type, 1);
        assert_eq!(report.rows_kept, 3);
    }

    #[test]
    fn test_dates_parse_day_month_year() {
        let (records, _) = read_records(sample_csv().as_bytes()).unwrap();

        assert_eq!(
            records[0].fecha_registro,
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
        assert_eq!(
            records[0].fecha_ultimo_folleto,
            NaiveDate::from_ymd_opt(2021, 2, 1)
        );
    }

    #[test]
    fn test_unparseable_dates_become_unknown() {
        let (records, report) = read_records(sample_csv().as_bytes()).unwrap();

        let beta = records.iter().find(|r| r.entity_name == "SCR Beta").unwrap();
        assert_eq!(beta.fecha_registro, None);
        assert_eq!(beta.fecha_ultimo_folleto, None);
        // Empty cells are missing, not unparseable
        assert_eq!(report.unparsed_fecha_registro, 1);
        assert_eq!(report.unparsed_fecha_ultimo_folleto, 0);
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let (records, _) = read_records(sample_csv().as_bytes()).unwrap();

        let beta = records.iter().find(|r| r.entity_name == "SCR Beta").unwrap();
        assert_eq!(beta.gestora_nombre, None);
        assert_eq!(beta.isin, None);
    }

    #[test]
    fn test_missing_optional_columns() {
        let csv = "entity_name,entity_type\nFondo Solo,Fondos de capital-riesgo pyme\n";
        let (records, report) = read_records(csv.as_bytes()).unwrap();

        assert_eq!(report.rows_kept, 1);
        assert_eq!(records[0].entity_type, EntityType::FondoCapitalRiesgoPyme);
        assert_eq!(records[0].fecha_registro, None);
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let result = load_dataset(Path::new("/nonexistent/all_entities_detailed.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_registration_bounds_and_freshness() {
        let (records, _) = read_records(sample_csv().as_bytes()).unwrap();
        let dataset = Dataset::from_records(records);

        let (min, max) = dataset.registration_bounds().unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(2020, 6, 15).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2020, 6, 15).unwrap());
        assert_eq!(dataset.freshness_label(), "June 2020");

        assert_eq!(Dataset::default().freshness_label(), "N/A");
    }

    #[test]
    fn test_cache_loads_once_until_invalidated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", sample_csv()).unwrap();
        file.flush().unwrap();

        let cache = DatasetCache::new(file.path());
        assert!(!cache.is_loaded());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);

        // Append a row; the cached snapshot does not change until invalidated
        writeln!(file).unwrap();
        write!(file, "Fondo Nuevo,Fondos de capital-riesgo,,,01/01/2023,,,,,").unwrap();
        file.flush().unwrap();
        assert_eq!(cache.get().unwrap().len(), 3);

        cache.invalidate();
        assert!(!cache.is_loaded());
        let reloaded = cache.get().unwrap();
        assert_eq!(reloaded.len(), 4);
        // Earlier snapshot is untouched
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_failed_reload_keeps_current_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", sample_csv()).unwrap();
        file.flush().unwrap();

        let cache = DatasetCache::new(file.path());
        let first = cache.get().unwrap();
        assert_eq!(first.len(), 3);

        // Row with the wrong number of fields
        std::fs::write(file.path(), format!("{}\nFondo Roto,Fondos de capital-riesgo,extra\n", HEADER)).unwrap();

        assert!(cache.reload().is_err());
        assert!(cache.is_loaded());
        let current = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &current));

        std::fs::write(file.path(), sample_csv()).unwrap();
        let reloaded = cache.reload().unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(reloaded.len(), 3);
        assert!(Arc::ptr_eq(&reloaded, &cache.get().unwrap()));
    }

    #[test]
    fn test_is_loaded_survives_poisoned_lock() {
        let cache = Arc::new(DatasetCache::new("/nonexistent/all_entities_detailed.csv"));
        *cache.slot.write().unwrap() = Some(Arc::new(Dataset::default()));

        let holder = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = holder.slot.write().unwrap();
            panic!("writer panicked while holding the lock");
        })
        .join();

        assert!(cache.slot.is_poisoned());
        assert!(cache.is_loaded());
        assert!(cache.get().is_ok());
    }
}
