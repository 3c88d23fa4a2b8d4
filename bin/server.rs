// Capital Riesgo Dashboard - Web Server
// JSON API consumed by the dashboard front end

use anyhow::{Context, Result};
use capital_riesgo::api::{router, AppState};
use capital_riesgo::{DashboardConfig, DatasetCache};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    capital_riesgo::init_tracing();

    let config = DashboardConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, dataset = %config.dataset_path.display(), "loaded configuration");

    // A failed initial load is fatal: no view is served without data
    let cache = DatasetCache::new(&config.dataset_path);
    let dataset = cache.get()?;
    tracing::info!(records = dataset.len(), updated = %dataset.freshness_label(), "dataset ready");

    let app = router(AppState::new(cache, config.stats));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("server running on http://{}", addr);
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
