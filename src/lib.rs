//! Headless core for the kubedeck Kubernetes cluster browser
//!
//! Three concerns, one crate each: `kubedeck-types` carries the plain data
//! model, `kubedeck-k8s` discovers contexts, establishes sessions, and lists
//! resources, and `kubedeck-logs` tails container logs. This crate re-exports
//! that surface and adds host configuration and tracing setup.

pub mod config;
pub mod logging;

pub use config::{ConnectConfig, CoreConfig, LogsConfig};

// Cluster access
pub use kubedeck_k8s::{
    CONNECT_RETRY_DELAY, CancellationToken, ClusterConfig, ConfigError, ConnectError,
    ConnectOptions, Connection, ConnectionManager, KubeSessionFactory, MAX_CONNECT_RETRIES,
    NameFilter, SessionFactory, get_detail, list_many, list_namespaces, list_pods, list_summaries,
};

// Log tailing
pub use kubedeck_logs::{
    KubeLogFetcher, LogFetchError, LogFetcher, LogTailController, MAX_INITIAL_LINES,
    MAX_POLL_LINES, POLL_INTERVAL, TAIL_HEADER, TailBuffer, TailHandle, TailOptions, TailState,
};

// Data model
pub use kubedeck_types::{
    ContainerInfo, ContextInfo, LogTarget, NamespaceInfo, PodInfo, PodStatus, ResourceKind,
    ResourceSummary,
};

// Re-exported so hosts can name client types without a direct kube dep
pub use kubedeck_k8s::kube;
