use std::sync::Arc;

use crate::config::Config;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use tradelog_core::imports::{
    AdapterRegistry, ImportConfig, TradeImportService, TradeImportServiceTrait,
};
use tradelog_storage_sqlite::{db, trades::TradeRepository};

pub struct AppState {
    pub trade_service: Arc<dyn TradeImportServiceTrait>,
}

/// Installs the global subscriber. `log` records from the library crates are
/// forwarded through the subscriber's log bridge.
pub fn init_tracing() {
    let log_format = std::env::var("TL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());

    let repository = Arc::new(TradeRepository::new(pool, writer));
    let import_config = ImportConfig {
        commit_batch_size: config.import_batch_size,
        ..Default::default()
    };
    let trade_service = Arc::new(TradeImportService::new(
        repository,
        AdapterRegistry::default(),
        import_config,
    ));

    tracing::info!(
        "Trade journal ready at {} (commit batch size {})",
        db_path,
        import_config.batch_size()
    );

    Ok(Arc::new(AppState { trade_service }))
}
