// 🌐 HTTP API - JSON boundary for the presentation layer
//
// The front end sends filter / search / sort / grouping parameters and
// receives metric bundles, table views, option lists and CSV downloads.

use crate::dashboard::{explore, metrics, table_view, TableQuery};
use crate::export::{export_csv_string, export_filename};
use crate::filter::{filter_options, parse_filter_date, FilterOptions, FilterSpec};
use crate::loader::{Dataset, DatasetCache, LoadReport};
use crate::record::{Column, EntityType, ParseError};
use crate::statistics::StatsConfig;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DatasetCache>,
    pub stats: StatsConfig,
}

impl AppState {
    pub fn new(cache: DatasetCache, stats: StatsConfig) -> Self {
        AppState {
            cache: Arc::new(cache),
            stats,
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(ParseError),
    Internal(anyhow::Error),
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::BadRequest(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
            }
        };
        (status, Json(ApiResponse::err(message))).into_response()
    }
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Query string shared by the metrics, table and export endpoints.
/// Empty values mean "no selection".
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub entity_type: Option<String>,
    pub gestora: Option<String>,
    pub depositaria: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub q: Option<String>,
    pub columns: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub group: Option<bool>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl DashboardParams {
    pub fn filter_spec(&self) -> Result<FilterSpec, ParseError> {
        Ok(FilterSpec {
            entity_type: present(&self.entity_type).map(str::parse).transpose()?,
            gestora: present(&self.gestora).map(str::to_string),
            depositaria: present(&self.depositaria).map(str::to_string),
            date_from: present(&self.date_from).map(parse_filter_date).transpose()?,
            date_to: present(&self.date_to).map(parse_filter_date).transpose()?,
        })
    }

    pub fn table_query(&self) -> Result<TableQuery, ParseError> {
        let defaults = TableQuery::default();

        Ok(TableQuery {
            filter: self.filter_spec()?,
            // Search text is matched as typed, surrounding spaces included
            search: self.q.clone().filter(|q| !q.is_empty()),
            columns: match present(&self.columns) {
                Some(list) => Column::parse_list(list)?,
                None => defaults.columns,
            },
            sort_by: present(&self.sort).map(str::parse).transpose()?,
            direction: match present(&self.order) {
                Some(order) => order.parse()?,
                None => defaults.direction,
            },
            group_by_entity: self.group,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionsParams {
    pub entity_type: Option<String>,
}

#[derive(Serialize)]
struct OptionsResponse {
    filters: FilterOptions,
    columns: Vec<&'static str>,
    default_columns: Vec<&'static str>,
    dataset_updated: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// Cached dataset; a reload after invalidation reads the file off the runtime
async fn dataset(state: &AppState) -> Result<Arc<Dataset>, ApiError> {
    let cache = Arc::clone(&state.cache);
    let loaded = tokio::task::spawn_blocking(move || cache.get())
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(loaded?)
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/options - Filter choices for the current entity-type selection
async fn get_options(
    State(state): State<AppState>,
    Query(params): Query<OptionsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_type: Option<EntityType> = present(&params.entity_type)
        .map(str::parse)
        .transpose()?;
    let dataset = dataset(&state).await?;

    let response = OptionsResponse {
        filters: filter_options(&dataset.all(), entity_type),
        columns: Column::ALL.iter().map(|c| c.name()).collect(),
        default_columns: Column::DEFAULT_DISPLAY.iter().map(|c| c.name()).collect(),
        dataset_updated: dataset.freshness_label(),
    };
    Ok(Json(ApiResponse::ok(response)))
}

/// GET /api/metrics - Metric bundle for the filter selection
async fn get_metrics(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = params.filter_spec()?;
    let dataset = dataset(&state).await?;

    let bundle = metrics(&dataset.all(), &filter, &state.stats);
    Ok(Json(ApiResponse::ok(bundle)))
}

/// GET /api/table - Data explorer table
async fn get_table(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.table_query()?;
    let dataset = dataset(&state).await?;

    let view = table_view(&dataset.all(), &query);
    Ok(Json(ApiResponse::ok(view)))
}

/// GET /api/export - CSV download of the searched and sorted records
async fn get_export(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, ApiError> {
    let query = params.table_query()?;
    let dataset = dataset(&state).await?;

    let all = dataset.all();
    let rows = explore(&all, &query);
    let body = export_csv_string(&rows, &query.columns)?;

    let filename = export_filename(chrono::Local::now().naive_local());
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        filename,
        urlencoding::encode(&filename)
    );
    tracing::info!(rows = rows.len(), filename = %filename, "CSV export served");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// POST /api/reload - Load the dataset again; a failed load keeps serving the old one
async fn reload_dataset(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cache = Arc::clone(&state.cache);
    let dataset = tokio::task::spawn_blocking(move || cache.reload())
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    let report: LoadReport = dataset.report().clone();
    Ok(Json(ApiResponse::ok(report)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/options", get(get_options))
        .route("/metrics", get(get_metrics))
        .route("/table", get(get_table))
        .route("/export", get(get_export))
        .route("/reload", post(reload_dataset))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
