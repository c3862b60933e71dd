//! Database service binary for the Butler assistant.
//!
//! Owns the only `PostgreSQL` session and serves query requests from
//! dialog processes over NATS until Ctrl-C or SIGTERM.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `butler-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Open the database session; failure here is fatal
//! 4. Connect to NATS
//! 5. Serve until a shutdown signal arrives
//! 6. Log the final counters

use std::path::PathBuf;

use butler_db::PgConnector;
use butler_proxy::{DbService, ProxyConfig, ProxyError, logging, shutdown_signal};
use tracing::{Instrument as _, info, info_span};

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "butler-config.yaml";

/// Application entry point for the database service.
///
/// # Errors
///
/// Returns an error if configuration, logging, the initial database
/// session or the NATS connection cannot be set up.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_PATH), PathBuf::from);
    let config = ProxyConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    logging::init(&config.logging)?;
    let span = info_span!("dbsvc", env = logging::env_tag(&config.logging));

    run(&config).instrument(span).await?;
    Ok(())
}

async fn run(config: &ProxyConfig) -> Result<(), ProxyError> {
    info!(
        subject = config.transport.subject,
        nats_url = config.transport.nats_url,
        max_retries = config.service.max_retries,
        "butler-dbsvc starting"
    );

    // 3. Open the database session.
    let connector = PgConnector::new(&config.database.postgres())?;
    let service = DbService::start(connector, &config.service).await?;

    // 4. Connect to NATS.
    let client = async_nats::connect(config.transport.nats_url.as_str())
        .await
        .map_err(|e| {
            ProxyError::Nats(format!(
                "failed to connect to {}: {e}",
                config.transport.nats_url
            ))
        })?;
    info!("NATS connected");

    // 5. Serve until shutdown.
    let stats = service
        .run(
            &client,
            &config.transport.subject,
            &config.service.queue_group,
            shutdown_signal(),
        )
        .await?;

    // 6. Log the result.
    info!(
        served = stats.served,
        failed = stats.failed,
        reconnects = stats.reconnects,
        "butler-dbsvc exited"
    );
    Ok(())
}
