//! Kubernetes plumbing for kubedeck
//!
//! This crate provides kubeconfig discovery, session establishment with
//! bounded retries, and resource listing for the browser views.

mod client;
mod connect;
mod filter;
mod resources;

pub use client::{ClusterConfig, ConfigError};
pub use connect::{
    CONNECT_RETRY_DELAY, ConnectError, ConnectOptions, Connection, ConnectionManager,
    KubeSessionFactory, MAX_CONNECT_RETRIES, SessionFactory,
};
pub use filter::NameFilter;
pub use resources::{get_detail, list_many, list_namespaces, list_pods, list_summaries};

// Re-export types that are used in our public API
pub use kubedeck_types::{
    ContainerInfo, ContextInfo, NamespaceInfo, PodInfo, PodStatus, ResourceKind, ResourceSummary,
};

// Re-exported so hosts can name client and token types without extra deps
pub use kube;
pub use tokio_util::sync::CancellationToken;
