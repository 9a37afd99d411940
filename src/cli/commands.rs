//! CLI command implementations
//!
//! Each command opens the database, does its work and closes the database
//! again before returning, so collection files are flushed on every exit
//! path that is not a crash.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::AppConfig;
use crate::model::TourModel;
use crate::observability::init_logging;
use crate::rest_api::TourServer;
use crate::store::Database;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments, set up logging and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.config.as_deref())?;

    if let Err(e) = init_logging(&config) {
        eprintln!("warning: {e}");
    }

    let rt = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    rt.block_on(run_command(config, cli.command))
}

/// Run the appropriate command based on CLI args
pub async fn run_command(mut config: AppConfig, cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, shutdown_signal()).await
        }
        Command::Import { file } => {
            let count = import(&config, &file).await?;
            println!("Data successfully loaded! ({count} tours)");
            Ok(())
        }
        Command::Delete => {
            let count = delete(&config).await?;
            println!("Data successfully deleted! ({count} tours)");
            Ok(())
        }
    }
}

/// Open the database configured in `config`
async fn open_database(config: &AppConfig) -> CliResult<Database> {
    let db = Database::open(&config.store_config()).await?;
    match db.data_dir() {
        Some(dir) => tracing::info!(data_dir = %dir.display(), "database connection successful"),
        None => tracing::warn!("no data_dir configured, tours are kept in memory only"),
    }
    Ok(db)
}

/// Serve the API until `shutdown` resolves, then close the database
pub async fn serve(
    config: AppConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> CliResult<()> {
    let db = open_database(&config).await?;
    let tours = TourModel::init(&db).await?;

    let served = TourServer::new(config, tours).start(shutdown).await;

    tracing::info!("shutting down, flushing collections");
    db.close().await?;
    served.map_err(CliError::Server)
}

/// Create every tour in a JSON file through the model.
///
/// The file holds an array of tours (a single object is accepted too).
/// Creation stops at the first tour that fails validation.
pub async fn import(config: &AppConfig, file: &Path) -> CliResult<usize> {
    let tours = read_seed_file(file)?;

    let db = open_database(config).await?;
    let created = match TourModel::init(&db).await {
        Ok(model) => model.create_many(&tours).await,
        Err(e) => Err(e),
    };
    db.close().await?;

    Ok(created?.len())
}

/// Delete every tour
pub async fn delete(config: &AppConfig) -> CliResult<u64> {
    let db = open_database(config).await?;
    let deleted = match TourModel::init(&db).await {
        Ok(model) => model.delete_many().await,
        Err(e) => Err(e),
    };
    db.close().await?;

    Ok(deleted?)
}

fn read_seed_file(file: &Path) -> CliResult<Vec<Value>> {
    let content = fs::read_to_string(file).map_err(|source| CliError::Read {
        path: file.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| CliError::InvalidData {
        path: file.to_path_buf(),
        reason,
    };

    match serde_json::from_str::<Value>(&content).map_err(|e| invalid(e.to_string()))? {
        Value::Array(tours) => Ok(tours),
        tour @ Value::Object(_) => Ok(vec![tour]),
        _ => Err(invalid("expected an array of tours".to_string())),
    }
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
