//! Console front end for the Butler assistant.
//!
//! Stands in for a chat network: every line read from stdin is one message
//! from the configured user, and the assistant's replies are printed with
//! their keyboards rendered as bracketed choices.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `butler-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Launch `butler-dbsvc` as a child process when `service.launch` is set
//! 4. Open the query channel: NATS, or an in-process service when
//!    `transport.in_process` is set
//! 5. Bootstrap the schema, waiting for the service to come up
//! 6. Read messages until EOF or a shutdown signal
//! 7. Stop the child service

use std::path::{Path, PathBuf};

use backon::BackoffBuilder as _;
use butler_assistant::{Assistant, AssistantConfig, Dispatcher, Outgoing, Sender, Update};
use butler_db::PgConnector;
use butler_proxy::{
    ClientError, DbClient, DbService, Loopback, ProxyConfig, QueryChannel, bootstrap, logging,
    shutdown_signal,
};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{Instrument as _, error, info, info_span, warn};

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "butler-config.yaml";

/// Application entry point for the console front end.
///
/// # Errors
///
/// Returns an error if configuration, logging, the query channel or the
/// schema bootstrap cannot be set up.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_PATH), PathBuf::from);
    let config = ProxyConfig::load(&config_path)?;
    let assistant = AssistantConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    logging::init(&config.logging)?;
    let span = info_span!("console", env = logging::env_tag(&config.logging));

    run(&config, &config_path, assistant).instrument(span).await
}

async fn run(
    config: &ProxyConfig,
    config_path: &Path,
    assistant: AssistantConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        in_process = config.transport.in_process,
        launch = config.service.launch,
        users = assistant.users.len(),
        "butler-console starting"
    );

    // 3. Launch the database service.
    let mut child = if config.service.launch && !config.transport.in_process {
        Some(launch_service(config, config_path)?)
    } else {
        None
    };

    // 4-6. Open the channel, bootstrap and converse.
    let result = if config.transport.in_process {
        let connector = PgConnector::new(&config.database.postgres())?;
        let service = DbService::start(connector, &config.service).await?;
        converse(Loopback::new(service), config, assistant).await
    } else {
        let client = DbClient::connect(&config.transport).await?;
        converse(client, config, assistant).await
    };

    // 7. Stop the child service.
    if let Some(child) = child.as_mut() {
        stop_service(child).await;
    }
    result
}

/// Start `butler-dbsvc` with the same configuration file.
fn launch_service(config: &ProxyConfig, config_path: &Path) -> Result<Child, std::io::Error> {
    let child = Command::new(&config.service.binary)
        .arg(config_path)
        .kill_on_drop(true)
        .spawn()?;
    info!(
        binary = config.service.binary,
        pid = ?child.id(),
        "Database service launched"
    );
    Ok(child)
}

async fn stop_service(child: &mut Child) {
    match child.kill().await {
        Ok(()) => info!("Database service stopped"),
        Err(e) => warn!(error = %e, "Failed to stop database service"),
    }
}

/// Bootstrap the schema, then relay stdin lines to the assistant.
async fn converse<Q: QueryChannel + 'static>(
    mut channel: Q,
    config: &ProxyConfig,
    assistant: AssistantConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // 5. Bootstrap, retrying while no service answers yet.
    let mut backoff = config.service.retry_policy().build();
    loop {
        match bootstrap(&mut channel, &assistant.users, &assistant.budgets).await {
            Ok(()) => break,
            Err(ClientError::Unavailable) => {
                let Some(delay) = backoff.next() else {
                    return Err(ClientError::Unavailable.into());
                };
                warn!(delay = ?delay, "Database service not up yet, retrying bootstrap");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let sender = assistant.users.first().map_or_else(
        || Sender {
            id: 0,
            first_name: "Guest".to_owned(),
            username: None,
        },
        |user| Sender {
            id: user.id,
            first_name: user.name.clone(),
            username: None,
        },
    );
    info!(user_id = sender.id, name = sender.first_name, "Chatting as");

    let (dispatcher, replies) = Dispatcher::new(Assistant::new(assistant), channel);
    let printer = tokio::spawn(print_replies(replies));

    // 6. Read messages until EOF or shutdown.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        let line = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(text) = line else {
            info!("End of input");
            break;
        };
        if text.trim().is_empty() {
            continue;
        }

        let update = Update {
            chat_id: sender.id,
            sender: sender.clone(),
            text,
        };
        if let Err(e) = dispatcher.dispatch(update).await {
            error!(error = %e, "Update task failed");
        }
    }

    drop(dispatcher);
    if let Err(e) = printer.await {
        error!(error = %e, "Reply printer failed");
    }
    Ok(())
}

async fn print_replies(mut replies: mpsc::Receiver<Outgoing>) {
    while let Some(outgoing) = replies.recv().await {
        println!("{}", outgoing.reply.text);
        for row in outgoing.reply.keyboard.iter().flatten() {
            let buttons = row
                .iter()
                .map(|label| format!("[{label}]"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {buttons}");
        }
        println!();
    }
}
