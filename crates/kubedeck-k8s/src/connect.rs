//! Session establishment with bounded sequential retries

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::ClusterConfig;

/// Default maximum number of attempts for a single connect call
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Default fixed delay between attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Terminal failure of a connect call
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Every attempt failed; carries the last underlying error message
    #[error("failed to connect to context '{context}' after {attempts} attempt(s): {message}")]
    Exhausted {
        context: String,
        attempts: u32,
        message: String,
    },

    /// The caller cancelled the connect call
    #[error("connect to context '{context}' cancelled after {attempts} attempt(s)")]
    Cancelled { context: String, attempts: u32 },
}

impl ConnectError {
    /// Number of attempts made before the failure was reported
    pub fn attempts_made(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Creates, probes, and releases client sessions for named contexts
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Send;

    /// Create a session against the named context
    async fn create(&self, context: &str) -> anyhow::Result<Self::Session>;

    /// Report the server version for an established session
    async fn server_version(&self, session: &Self::Session) -> anyhow::Result<String>;

    /// Release a session; consuming it makes double-release unrepresentable
    async fn close(&self, session: Self::Session);
}

/// Session factory backed by the local kubeconfig
pub struct KubeSessionFactory {
    config: Arc<ClusterConfig>,
}

impl KubeSessionFactory {
    pub fn new(config: Arc<ClusterConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for KubeSessionFactory {
    type Session = kube::Client;

    async fn create(&self, context: &str) -> anyhow::Result<kube::Client> {
        self.config.client_for_context(context).await
    }

    async fn server_version(&self, session: &kube::Client) -> anyhow::Result<String> {
        let info = session.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn close(&self, session: kube::Client) {
        // kube clients release their connections when dropped
        drop(session);
    }
}

/// An established session plus the server version it reported
#[derive(Debug)]
pub struct Connection<S> {
    pub session: S,
    pub server_version: String,
}

/// Tunables for connect calls
#[derive(Clone, Copy, Debug)]
pub struct ConnectOptions {
    /// Maximum sequential attempts per call (clamped to at least one)
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_retries: MAX_CONNECT_RETRIES,
            retry_delay: CONNECT_RETRY_DELAY,
        }
    }
}

/// Establishes sessions against named contexts, retrying transient failures.
///
/// Holds no session state of its own: callers release a superseded session
/// through [`ConnectionManager::release`] when they switch contexts.
pub struct ConnectionManager<F: SessionFactory> {
    factory: Arc<F>,
    options: ConnectOptions,
}

impl<F: SessionFactory> ConnectionManager<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            options: ConnectOptions::default(),
        }
    }

    pub fn with_options(factory: Arc<F>, options: ConnectOptions) -> Self {
        Self { factory, options }
    }

    /// Establish a session and report the server version.
    ///
    /// Attempts run sequentially, never concurrently. The fixed retry delay
    /// is raced against `cancel` between attempts; once cancellation is
    /// requested no further attempt starts.
    pub async fn connect(
        &self,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<Connection<F::Session>, ConnectError> {
        let max_attempts = self.options.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ConnectError::Cancelled {
                    context: context.to_string(),
                    attempts: attempt - 1,
                });
            }

            match self.establish(context).await {
                Ok(connection) => {
                    debug!(
                        context,
                        attempt,
                        version = %connection.server_version,
                        "connected"
                    );
                    return Ok(connection);
                }
                Err(err) => {
                    warn!(context, attempt, error = %err, "connection attempt failed");
                    last_error = format!("{err:#}");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ConnectError::Cancelled {
                            context: context.to_string(),
                            attempts: attempt,
                        });
                    }
                    _ = tokio::time::sleep(self.options.retry_delay) => {}
                }
            }
        }

        Err(ConnectError::Exhausted {
            context: context.to_string(),
            attempts: max_attempts,
            message: last_error,
        })
    }

    /// One attempt: create the session and probe the server version.
    /// A failed probe releases the session before the error propagates.
    async fn establish(&self, context: &str) -> anyhow::Result<Connection<F::Session>> {
        let session = self.factory.create(context).await?;
        match self.factory.server_version(&session).await {
            Ok(server_version) => Ok(Connection {
                session,
                server_version,
            }),
            Err(err) => {
                self.factory.close(session).await;
                Err(err)
            }
        }
    }

    /// Release a session created by an earlier connect call
    pub async fn release(&self, session: F::Session) {
        self.factory.close(session).await;
    }
}
