//! The database service: one connection, many clients, one request at a
//! time.
//!
//! # Lifecycle
//!
//! ```text
//! STARTING --> LISTENING --> PROCESSING --> LISTENING --> ... --> STOPPING --> STOPPED
//! ```
//!
//! - `STARTING`: open the database session. Failure is fatal.
//! - `LISTENING`: wait for the next request or the shutdown signal.
//! - `PROCESSING`: run the request, retrying connectivity failures on a
//!   capped exponential backoff, then reply exactly once.
//! - `STOPPING`: unsubscribe, flush pending replies, close the session.
//!
//! Requests are handled strictly in sequence by a single task, so the
//! physical session needs no locking. The shutdown signal is only observed
//! while listening; a request in flight always gets its reply.

use std::fmt;
use std::future::Future;

use backon::{BackoffBuilder, ExponentialBuilder};
use butler_db::{Connector, QueryExecutor, ResilientConnection};
use butler_types::{FailureKind, QueryReply, QueryRequest};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::ServiceConfig;
use crate::error::ProxyError;

/// Where the service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Opening the database session.
    Starting,
    /// Waiting for a request.
    Listening,
    /// Running a request.
    Processing,
    /// Releasing the subscription and the session.
    Stopping,
    /// Done.
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "STARTING",
            Self::Listening => "LISTENING",
            Self::Processing => "PROCESSING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        })
    }
}

/// Processing counters, logged when the service stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Requests answered with an `ok` reply.
    pub served: u64,
    /// Requests answered with a `failed` reply.
    pub failed: u64,
    /// Database reconnects performed.
    pub reconnects: u64,
}

/// Serves [`QueryRequest`]s over a single logical database connection.
pub struct DbService<C: Connector> {
    executor: QueryExecutor<C>,
    retry: ExponentialBuilder,
    state: ServiceState,
    served: u64,
    failed: u64,
}

impl<C: Connector> DbService<C> {
    /// Open the database session and prepare to serve.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Database`] if the initial session cannot be
    /// opened.
    pub async fn start(connector: C, config: &ServiceConfig) -> Result<Self, ProxyError> {
        info!(
            state = %ServiceState::Starting,
            target_db = %connector.target(),
            max_retries = config.max_retries,
            "Database service starting"
        );
        let connection = ResilientConnection::connect(connector).await?;
        Ok(Self {
            executor: QueryExecutor::new(connection),
            retry: config.retry_policy(),
            state: ServiceState::Starting,
            served: 0,
            failed: 0,
        })
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Counters so far.
    pub const fn stats(&self) -> ServiceStats {
        ServiceStats {
            served: self.served,
            failed: self.failed,
            reconnects: self.executor.reconnects(),
        }
    }

    fn transition(&mut self, next: ServiceState) {
        debug!(from = %self.state, to = %next, "Service state change");
        self.state = next;
    }

    /// Decode a raw request payload and produce its reply.
    ///
    /// Undecodable payloads get a `bad_request` failure; they never take
    /// the service down.
    pub async fn handle_payload(&mut self, payload: &[u8]) -> QueryReply {
        match codec::decode_request(payload) {
            Ok(request) => self.process(&request).await,
            Err(e) => {
                let request_id = codec::salvage_request_id(payload);
                warn!(request_id = ?request_id, error = %e, "Undecodable request");
                self.failed = self.failed.saturating_add(1);
                QueryReply::Failed {
                    request_id,
                    kind: FailureKind::BadRequest,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Run one request to a final outcome.
    ///
    /// Connectivity failures are retried after each backoff delay until the
    /// schedule runs out; the next attempt's health check reconnects.
    /// Statement failures are replied immediately.
    pub async fn process(&mut self, request: &QueryRequest) -> QueryReply {
        debug!(
            request_id = %request.request_id,
            query = %request.query,
            params = ?request.query_data,
            fetch = request.fetch,
            commit = request.commit,
            "Processing request"
        );

        let mut backoff = self.retry.build();
        let mut attempt: usize = 0;
        let outcome = loop {
            match self.executor.execute(request).await {
                Err(e) if e.is_connectivity() => {
                    attempt = attempt.saturating_add(1);
                    if let Some(delay) = backoff.next() {
                        warn!(
                            request_id = %request.request_id,
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "Database unreachable, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        error!(
                            request_id = %request.request_id,
                            attempts = attempt,
                            error = %e,
                            "Retry budget exhausted, failing request"
                        );
                        break Err(e);
                    }
                }
                outcome => break outcome,
            }
        };

        match outcome {
            Ok(rows) => {
                self.served = self.served.saturating_add(1);
                debug!(
                    request_id = %request.request_id,
                    rows = ?rows.as_ref().map(Vec::len),
                    "Request served"
                );
                QueryReply::Ok {
                    request_id: request.request_id,
                    rows,
                }
            }
            Err(e) => {
                self.failed = self.failed.saturating_add(1);
                warn!(request_id = %request.request_id, error = %e, "Request failed");
                QueryReply::Failed {
                    request_id: Some(request.request_id),
                    kind: e.failure_kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Serve requests from `subject` until `shutdown` resolves or the
    /// subscription ends, then release everything.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Nats`] if the subscription cannot be created.
    pub async fn run(
        mut self,
        client: &async_nats::Client,
        subject: &str,
        queue_group: &str,
        shutdown: impl Future<Output = ()>,
    ) -> Result<ServiceStats, ProxyError> {
        let mut subscriber = client
            .queue_subscribe(subject.to_owned(), queue_group.to_owned())
            .await
            .map_err(|e| ProxyError::Nats(format!("failed to subscribe to {subject}: {e}")))?;

        self.transition(ServiceState::Listening);
        info!(
            state = %self.state,
            subject = subject,
            queue_group = queue_group,
            "Database service listening"
        );

        tokio::pin!(shutdown);
        loop {
            let message = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                message = subscriber.next() => message,
            };
            let Some(message) = message else {
                warn!(subject = subject, "Subscription closed by the server");
                break;
            };

            self.transition(ServiceState::Processing);
            self.serve(client, &message).await;
            self.transition(ServiceState::Listening);
        }

        self.transition(ServiceState::Stopping);
        info!(state = %self.state, "Database service stopping");
        if let Err(e) = subscriber.unsubscribe().await {
            warn!(error = %e, "Failed to unsubscribe");
        }
        if let Err(e) = client.flush().await {
            warn!(error = %e, "Failed to flush pending replies");
        }

        let stats = self.stats();
        self.executor.close().await;
        info!(
            state = %ServiceState::Stopped,
            served = stats.served,
            failed = stats.failed,
            reconnects = stats.reconnects,
            "Database service stopped"
        );
        Ok(stats)
    }

    /// Answer one transport message.
    async fn serve(&mut self, client: &async_nats::Client, message: &async_nats::Message) {
        let Some(reply_to) = message.reply.clone() else {
            warn!(subject = %message.subject, "Request without reply inbox, dropping");
            return;
        };

        let reply = self.handle_payload(&message.payload).await;
        let payload = match codec::encode_reply(&reply) {
            Ok(p) => p,
            Err(e) => {
                error!(request_id = ?reply.request_id(), error = %e, "Failed to encode reply");
                return;
            }
        };

        if let Err(e) = client.publish(reply_to, payload.into()).await {
            warn!(request_id = ?reply.request_id(), error = %e, "Failed to send reply");
        }
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
