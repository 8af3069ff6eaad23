//! Kubeconfig discovery and per-context client construction

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use thiserror::Error;

use kubedeck_types::ContextInfo;

/// Failure to find or use local cluster configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no usable kubeconfig found ({0}); is kubectl configured?")]
    NoKubeconfig(#[source] kube::config::KubeconfigError),

    #[error("context '{0}' not present in kubeconfig")]
    UnknownContext(String),
}

/// Loaded cluster configuration
///
/// Wraps the merged kubeconfig and answers context queries; clients for
/// individual contexts are built on demand.
pub struct ClusterConfig {
    kubeconfig: Kubeconfig,
    current_context: Option<String>,
}

impl ClusterConfig {
    /// Load the default kubeconfig from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let kubeconfig = Kubeconfig::read().map_err(ConfigError::NoKubeconfig)?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    /// Wrap an already-parsed kubeconfig
    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        let current_context = kubeconfig.current_context.clone();
        Self {
            kubeconfig,
            current_context,
        }
    }

    /// All available contexts, sorted by name and deduplicated
    pub fn contexts(&self) -> Vec<ContextInfo> {
        let mut contexts: Vec<ContextInfo> = self
            .kubeconfig
            .contexts
            .iter()
            .map(|ctx| {
                let context = ctx.context.as_ref();
                ContextInfo::new(
                    ctx.name.clone(),
                    context.map(|c| c.cluster.clone()).unwrap_or_default(),
                    context.and_then(|c| c.user.clone()).unwrap_or_default(),
                    context.and_then(|c| c.namespace.clone()),
                    Some(&ctx.name) == self.current_context.as_ref(),
                )
            })
            .collect();

        contexts.sort_by(|a, b| a.name.cmp(&b.name));
        contexts.dedup_by(|a, b| a.name == b.name);
        contexts
    }

    /// Name of the kubeconfig's current context
    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    /// Whether the named context exists in the kubeconfig
    pub fn has_context(&self, name: &str) -> bool {
        self.kubeconfig.contexts.iter().any(|c| c.name == name)
    }

    /// Create a kube::Client for a specific context
    pub async fn client_for_context(&self, context_name: &str) -> Result<kube::Client> {
        if !self.has_context(context_name) {
            return Err(ConfigError::UnknownContext(context_name.to_string()).into());
        }

        let config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(context_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .context(format!(
            "Failed to create config for context: {}",
            context_name
        ))?;

        let client = kube::Client::try_from(config).context(format!(
            "Failed to create client for context: {}",
            context_name
        ))?;

        Ok(client)
    }
}
