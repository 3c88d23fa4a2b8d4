// 📇 Entity Records - Data model for the venture-capital registry
// One row per (entity, share class) pair

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display format for date cells (matches the source file format)
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

// ============================================================================
// PARSE ERRORS (user-supplied parameters)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unknown sort direction: {0} (expected asc or desc)")]
    UnknownSortDirection(String),

    #[error("invalid date: {0} (expected YYYY-MM-DD or DD/MM/YYYY)")]
    InvalidDate(String),
}

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// EntityType - the eight registry categories kept after loading
///
/// Two further categories exist in the source file but are dropped at load
/// time (see `loader::EXCLUDED_ENTITY_TYPES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityType {
    FondoCapitalRiesgo,
    FondoCapitalRiesgoPyme,
    FondoCapitalRiesgoEuropeo,
    FondoEmprendimientoSocialEuropeo,
    FondoInversionColectivaCerrado,
    SociedadCapitalRiesgo,
    SociedadCapitalRiesgoPyme,
    SociedadInversionColectivaCerrado,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::FondoCapitalRiesgo,
        EntityType::FondoCapitalRiesgoPyme,
        EntityType::FondoCapitalRiesgoEuropeo,
        EntityType::FondoEmprendimientoSocialEuropeo,
        EntityType::FondoInversionColectivaCerrado,
        EntityType::SociedadCapitalRiesgo,
        EntityType::SociedadCapitalRiesgoPyme,
        EntityType::SociedadInversionColectivaCerrado,
    ];

    /// Label exactly as it appears in the registry file
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::FondoCapitalRiesgo => "Fondos de capital-riesgo",
            EntityType::FondoCapitalRiesgoPyme => "Fondos de capital-riesgo pyme",
            EntityType::FondoCapitalRiesgoEuropeo => "Fondos de capital-riesgo europeo",
            EntityType::FondoEmprendimientoSocialEuropeo => {
                "Fondos de emprendimiento social europeo"
            }
            EntityType::FondoInversionColectivaCerrado => {
                "Fondos de inversión colectiva de tipo cerrado"
            }
            EntityType::SociedadCapitalRiesgo => "Sociedades de capital-riesgo",
            EntityType::SociedadCapitalRiesgoPyme => "Sociedad de capital-riesgo pyme",
            EntityType::SociedadInversionColectivaCerrado => {
                "Sociedades de inversión colectiva de tipo cerrado"
            }
        }
    }

    /// Short description shown next to the type selector
    pub fn description(&self) -> &'static str {
        match self {
            EntityType::FondoCapitalRiesgo => "Vehículos de inversión colectiva que invierten principalmente en empresas no cotizadas con alto potencial de crecimiento.",
            EntityType::FondoCapitalRiesgoPyme => "Fondos especializados en inversión en pequeñas y medianas empresas (PYMEs) españolas.",
            EntityType::FondoCapitalRiesgoEuropeo => "Fondos regulados a nivel europeo (EuVECA) para facilitar la inversión transfronteriza en capital riesgo.",
            EntityType::FondoEmprendimientoSocialEuropeo => "Fondos enfocados en empresas sociales que buscan impacto social positivo además de rentabilidad (EuSEF).",
            EntityType::FondoInversionColectivaCerrado => "Fondos con un número fijo de participaciones que no permiten reembolsos hasta su vencimiento.",
            EntityType::SociedadCapitalRiesgo => "Sociedades anónimas que realizan inversiones temporales en el capital de empresas no financieras.",
            EntityType::SociedadCapitalRiesgoPyme => "Sociedades especializadas en inversión en PYMEs con condiciones regulatorias específicas.",
            EntityType::SociedadInversionColectivaCerrado => "Sociedades de inversión con capital fijo y sin derecho de reembolso hasta el vencimiento.",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .find(|t| t.label() == s)
            .copied()
            .ok_or_else(|| ParseError::UnknownEntityType(s.to_string()))
    }
}

impl TryFrom<String> for EntityType {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.label().to_string()
    }
}

// Option lists are sorted alphabetically by label, not by declaration order
impl Ord for EntityType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label().cmp(other.label())
    }
}

impl PartialOrd for EntityType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Column - every column a user can project, sort or export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    EntityName,
    EntityType,
    GestoraNombre,
    DepositariaNombre,
    FechaRegistro,
    FechaUltimoFolleto,
    Isin,
    FolletoUrl,
    Denominacion,
    Numero,
    FechaAlta,
    Dfi,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::EntityName,
        Column::EntityType,
        Column::GestoraNombre,
        Column::DepositariaNombre,
        Column::FechaRegistro,
        Column::FechaUltimoFolleto,
        Column::Isin,
        Column::FolletoUrl,
        Column::Denominacion,
        Column::Numero,
        Column::FechaAlta,
        Column::Dfi,
    ];

    /// Columns shown when the user has not picked any.
    /// `denominacion` is left out so the table groups by entity by default.
    pub const DEFAULT_DISPLAY: [Column; 5] = [
        Column::EntityName,
        Column::EntityType,
        Column::GestoraNombre,
        Column::FechaRegistro,
        Column::Isin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::EntityName => "entity_name",
            Column::EntityType => "entity_type",
            Column::GestoraNombre => "gestora_nombre",
            Column::DepositariaNombre => "depositaria_nombre",
            Column::FechaRegistro => "fecha_registro",
            Column::FechaUltimoFolleto => "fecha_ultimo_folleto",
            Column::Isin => "isin",
            Column::FolletoUrl => "folleto_url",
            Column::Denominacion => "denominacion",
            Column::Numero => "numero",
            Column::FechaAlta => "fecha_alta",
            Column::Dfi => "dfi",
        }
    }

    /// Class-specific columns vary between the share classes of one entity;
    /// all other columns are constant across an entity's rows.
    pub fn is_class_specific(&self) -> bool {
        matches!(
            self,
            Column::Denominacion | Column::Numero | Column::Isin | Column::FechaAlta | Column::Dfi
        )
    }

    /// Parse a comma-separated column list ("entity_name,isin")
    pub fn parse_list(list: &str) -> Result<Vec<Column>, ParseError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| ParseError::UnknownColumn(s.to_string()))
    }
}

// ============================================================================
// CELL VALUES
// ============================================================================

/// Cell - a single projected value
///
/// Within one column every non-null cell has the same variant, so the
/// derived ordering is only ever used between values of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cell {
    Null,
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Rendering used in table views: dates as DD/MM/YYYY, null as empty
    pub fn display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format(DISPLAY_DATE_FORMAT).to_string(),
        }
    }
}

impl From<Option<&String>> for Cell {
    fn from(value: Option<&String>) -> Self {
        value.map(|s| Cell::Text(s.clone())).unwrap_or(Cell::Null)
    }
}

impl From<Option<NaiveDate>> for Cell {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(Cell::Date).unwrap_or(Cell::Null)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Date(_) => serializer.serialize_str(&self.display()),
        }
    }
}

// ============================================================================
// ENTITY RECORD
// ============================================================================

/// EntityRecord - one (entity, share class) row of the registry
///
/// `entity_name` is not unique: an entity with several share classes
/// appears once per class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub gestora_nombre: Option<String>,
    pub depositaria_nombre: Option<String>,
    pub fecha_registro: Option<NaiveDate>,
    pub fecha_ultimo_folleto: Option<NaiveDate>,
    pub isin: Option<String>,
    pub folleto_url: Option<String>,

    // Share-class identifiers
    pub denominacion: Option<String>,
    pub numero: Option<String>,
    pub fecha_alta: Option<String>,
    pub dfi: Option<String>,
}

impl EntityRecord {
    pub fn new(entity_name: impl Into<String>, entity_type: EntityType) -> Self {
        EntityRecord {
            entity_name: entity_name.into(),
            entity_type,
            gestora_nombre: None,
            depositaria_nombre: None,
            fecha_registro: None,
            fecha_ultimo_folleto: None,
            isin: None,
            folleto_url: None,
            denominacion: None,
            numero: None,
            fecha_alta: None,
            dfi: None,
        }
    }

    /// Builder pattern: managing company
    pub fn with_gestora(mut self, gestora: impl Into<String>) -> Self {
        self.gestora_nombre = Some(gestora.into());
        self
    }

    /// Builder pattern: depositary
    pub fn with_depositaria(mut self, depositaria: impl Into<String>) -> Self {
        self.depositaria_nombre = Some(depositaria.into());
        self
    }

    pub fn with_fecha_registro(mut self, date: NaiveDate) -> Self {
        self.fecha_registro = Some(date);
        self
    }

    pub fn with_fecha_ultimo_folleto(mut self, date: NaiveDate) -> Self {
        self.fecha_ultimo_folleto = Some(date);
        self
    }

    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into());
        self
    }

    pub fn with_folleto_url(mut self, url: impl Into<String>) -> Self {
        self.folleto_url = Some(url.into());
        self
    }

    /// Builder pattern: share-class denomination and number
    pub fn with_class(mut self, denominacion: impl Into<String>, numero: impl Into<String>) -> Self {
        self.denominacion = Some(denominacion.into());
        self.numero = Some(numero.into());
        self
    }

    /// Value of a column for this record
    pub fn cell(&self, column: Column) -> Cell {
        match column {
            Column::EntityName => Cell::Text(self.entity_name.clone()),
            Column::EntityType => Cell::Text(self.entity_type.label().to_string()),
            Column::GestoraNombre => self.gestora_nombre.as_ref().into(),
            Column::DepositariaNombre => self.depositaria_nombre.as_ref().into(),
            Column::FechaRegistro => self.fecha_registro.into(),
            Column::FechaUltimoFolleto => self.fecha_ultimo_folleto.into(),
            Column::Isin => self.isin.as_ref().into(),
            Column::FolletoUrl => self.folleto_url.as_ref().into(),
            Column::Denominacion => self.denominacion.as_ref().into(),
            Column::Numero => self.numero.as_ref().into(),
            Column::FechaAlta => self.fecha_alta.as_ref().into(),
            Column::Dfi => self.dfi.as_ref().into(),
        }
    }

    /// Project this record onto a list of columns
    pub fn project(&self, columns: &[Column]) -> Vec<Cell> {
        columns.iter().map(|c| self.cell(*c)).collect()
    }
}
