//! resmatch application binary - composition root.
//!
//! Ties the resmatch crates together into a single executable:
//! 1. Resolve configuration (CLI > env > TOML file > defaults)
//! 2. Open the catalog from its snapshots in the data directory
//! 3. Build the matching pipeline (embedder + explainer)
//! 4. Either serve the REST API until Ctrl-C, or import a CSV batch
//! 5. Flush the catalog before exiting

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use resmatch_api::routes;
use resmatch_api::state::AppState;
use resmatch_core::config::MatchConfig;
use resmatch_storage::MetadataStore;
use resmatch_vector::{Catalog, CatalogPaths};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{CliArgs, Command};

/// Expand a leading `~` in a configured directory.
fn expand_home(dir: &str) -> PathBuf {
    if let Some(rest) = dir
        .strip_prefix("~/")
        .or_else(|| dir.strip_prefix("~\\"))
    {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(dir)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Load a labelled CSV and index it as a single batch.
async fn import_csv(
    state: &AppState,
    csv: &Path,
    label: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = MetadataStore::load(csv)?;
    let records = table
        .iter()
        .cloned()
        .map(|mut r| {
            if let Some(ref label) = label {
                r.predicted_label = label.clone();
            }
            r
        })
        .collect::<Vec<_>>();

    tracing::info!(path = %csv.display(), rows = records.len(), "Importing resumes");
    let added = state.pipeline.ingest_records(records).await?;
    tracing::info!(added, total = state.catalog.size(), "Import complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();

    // Tracing starts from RUST_LOG or the CLI level; the config file's level
    // is swapped in once the file has been read.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let initial_filter = env_filter.unwrap_or_else(|| {
        tracing_subscriber::EnvFilter::new(cli.log_level.as_deref().unwrap_or("info"))
    });
    let (filter, filter_handle) = reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting resmatch v{}", env!("CARGO_PKG_VERSION"));

    let config_file = cli.resolve_config_path();
    let mut config = MatchConfig::load_or_default(&config_file);
    cli.apply_overrides(&mut config);
    if !filter_from_env {
        let level = tracing_subscriber::EnvFilter::new(&config.general.log_level);
        if let Err(e) = filter_handle.reload(level) {
            tracing::warn!(error = %e, "Failed to apply configured log level");
        }
    }
    config.validate()?;

    // Catalog.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let paths = CatalogPaths::new(
        config.vector_snapshot_path(&data_dir),
        config.metadata_snapshot_path(&data_dir),
    );
    let catalog = match Catalog::open(paths, config.index.dimension) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(path = %data_dir.display(), error = %e, "Failed to open catalog");
            return Err(e.into());
        }
    };

    if let Some(dir) = config.embedding.model_dir.take() {
        config.embedding.model_dir = Some(expand_home(&dir).to_string_lossy().to_string());
    }
    let state = match AppState::build(config.clone(), Arc::clone(&catalog)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build matching pipeline");
            return Err(e.into());
        }
    };
    tracing::info!(
        documents = catalog.size(),
        dimension = catalog.dimension(),
        explanations = state.pipeline.explanations_enabled(),
        "Matching pipeline ready"
    );

    let outcome: Result<(), Box<dyn std::error::Error>> = match cli.command() {
        Command::Serve => {
            tracing::info!("Match endpoint at http://127.0.0.1:{}/match-text", config.general.port);
            routes::start_server(&config, state, shutdown_signal())
                .await
                .map_err(Into::into)
        }
        Command::Import { csv, label } => import_csv(&state, &csv, label).await,
    };

    // Persist the final state on exit.
    if let Err(e) = catalog.flush() {
        tracing::error!(error = %e, "Failed to flush catalog on shutdown");
        outcome?;
        return Err(e.into());
    }
    tracing::info!("Catalog flushed, exiting");

    outcome
}
