//! Log fetch collaborator

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::LogParams;
use thiserror::Error;

use kubedeck_types::LogTarget;

/// Failure of a single log fetch
#[derive(Debug, Error)]
pub enum LogFetchError {
    /// The logs request was rejected or failed in flight
    #[error("log fetch for {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: kube::Error,
    },

    /// The log endpoint could not be reached
    #[error("log endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Fetches log text for one pod container.
///
/// An empty string means no new lines exist; it is not an error.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(
        &self,
        target: &LogTarget,
        since_seconds: Option<i64>,
        tail_lines: i64,
    ) -> Result<String, LogFetchError>;
}

/// Log fetcher backed by the pod logs subresource
pub struct KubeLogFetcher {
    client: kube::Client,
}

impl KubeLogFetcher {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogFetcher for KubeLogFetcher {
    async fn fetch(
        &self,
        target: &LogTarget,
        since_seconds: Option<i64>,
        tail_lines: i64,
    ) -> Result<String, LogFetchError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = LogParams {
            container: Some(target.container.clone()),
            since_seconds,
            tail_lines: Some(tail_lines),
            ..Default::default()
        };

        pods.logs(&target.pod, &params)
            .await
            .map_err(|source| LogFetchError::Request {
                target: target.to_string(),
                source,
            })
    }
}
