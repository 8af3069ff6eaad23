//! Resource listing and detail fetch dispatch
//!
//! Every browsable kind maps to a typed API call through a match over
//! [`ResourceKind`]; results are flattened into uniform summaries so the
//! browser views stay kind-agnostic.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, Node, Pod, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::ListParams;
use kube::{Api, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;

use kubedeck_types::{
    ContainerInfo, NamespaceInfo, PodInfo, PodStatus, ResourceKind, ResourceSummary,
};

/// List summaries for one resource kind.
///
/// Namespaced kinds list within `namespace` when given, across all
/// namespaces otherwise; cluster-scoped kinds ignore it.
pub async fn list_summaries(
    client: &kube::Client,
    kind: ResourceKind,
    namespace: Option<&str>,
) -> Result<Vec<ResourceSummary>> {
    match kind {
        ResourceKind::Pod => list_namespaced::<Pod>(client, kind, namespace).await,
        ResourceKind::Deployment => list_namespaced::<Deployment>(client, kind, namespace).await,
        ResourceKind::StatefulSet => list_namespaced::<StatefulSet>(client, kind, namespace).await,
        ResourceKind::DaemonSet => list_namespaced::<DaemonSet>(client, kind, namespace).await,
        ResourceKind::ReplicaSet => list_namespaced::<ReplicaSet>(client, kind, namespace).await,
        ResourceKind::Service => list_namespaced::<Service>(client, kind, namespace).await,
        ResourceKind::ConfigMap => list_namespaced::<ConfigMap>(client, kind, namespace).await,
        ResourceKind::Secret => list_namespaced::<Secret>(client, kind, namespace).await,
        ResourceKind::Ingress => list_namespaced::<Ingress>(client, kind, namespace).await,
        ResourceKind::ServiceAccount => {
            list_namespaced::<ServiceAccount>(client, kind, namespace).await
        }
        ResourceKind::Role => list_namespaced::<Role>(client, kind, namespace).await,
        ResourceKind::RoleBinding => list_namespaced::<RoleBinding>(client, kind, namespace).await,
        ResourceKind::ClusterRole => list_cluster::<ClusterRole>(client, kind).await,
        ResourceKind::ClusterRoleBinding => {
            list_cluster::<ClusterRoleBinding>(client, kind).await
        }
        ResourceKind::Node => list_cluster::<Node>(client, kind).await,
    }
}

/// List summaries for several kinds concurrently, flattened in kind order
pub async fn list_many(
    client: &kube::Client,
    kinds: &[ResourceKind],
    namespace: Option<&str>,
) -> Result<Vec<ResourceSummary>> {
    let fetches = kinds
        .iter()
        .map(|kind| list_summaries(client, *kind, namespace));
    let lists = try_join_all(fetches).await?;
    Ok(lists.into_iter().flatten().collect())
}

/// Fetch one object as a JSON value for the detail view
pub async fn get_detail(
    client: &kube::Client,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
) -> Result<serde_json::Value> {
    match kind {
        ResourceKind::Pod => detail_namespaced::<Pod>(client, kind, namespace, name).await,
        ResourceKind::Deployment => {
            detail_namespaced::<Deployment>(client, kind, namespace, name).await
        }
        ResourceKind::StatefulSet => {
            detail_namespaced::<StatefulSet>(client, kind, namespace, name).await
        }
        ResourceKind::DaemonSet => {
            detail_namespaced::<DaemonSet>(client, kind, namespace, name).await
        }
        ResourceKind::ReplicaSet => {
            detail_namespaced::<ReplicaSet>(client, kind, namespace, name).await
        }
        ResourceKind::Service => detail_namespaced::<Service>(client, kind, namespace, name).await,
        ResourceKind::ConfigMap => {
            detail_namespaced::<ConfigMap>(client, kind, namespace, name).await
        }
        ResourceKind::Secret => detail_namespaced::<Secret>(client, kind, namespace, name).await,
        ResourceKind::Ingress => detail_namespaced::<Ingress>(client, kind, namespace, name).await,
        ResourceKind::ServiceAccount => {
            detail_namespaced::<ServiceAccount>(client, kind, namespace, name).await
        }
        ResourceKind::Role => detail_namespaced::<Role>(client, kind, namespace, name).await,
        ResourceKind::RoleBinding => {
            detail_namespaced::<RoleBinding>(client, kind, namespace, name).await
        }
        ResourceKind::ClusterRole => detail_cluster::<ClusterRole>(client, kind, name).await,
        ResourceKind::ClusterRoleBinding => {
            detail_cluster::<ClusterRoleBinding>(client, kind, name).await
        }
        ResourceKind::Node => detail_cluster::<Node>(client, kind, name).await,
    }
}

/// Fetch all namespaces from the cluster
pub async fn list_namespaces(client: &kube::Client) -> Result<Vec<NamespaceInfo>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let list = namespaces
        .list(&ListParams::default())
        .await
        .context("Failed to list namespaces")?;

    Ok(list
        .items
        .into_iter()
        .map(|ns| {
            let name = ns.metadata.name.unwrap_or_default();
            let status = ns
                .status
                .and_then(|s| s.phase)
                .unwrap_or_else(|| "Unknown".to_string());
            NamespaceInfo::new(name, status)
        })
        .collect())
}

/// Fetch pods in a namespace, including per-container readiness
pub async fn list_pods(client: &kube::Client, namespace: &str) -> Result<Vec<PodInfo>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods
        .list(&ListParams::default())
        .await
        .context(format!("Failed to list pods in {}", namespace))?;

    Ok(list
        .items
        .into_iter()
        .map(|pod| pod_to_info(pod, namespace))
        .collect())
}

async fn list_namespaced<K>(
    client: &kube::Client,
    kind: ResourceKind,
    namespace: Option<&str>,
) -> Result<Vec<ResourceSummary>>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
{
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let list = api
        .list(&ListParams::default())
        .await
        .context(format!("Failed to list {}", kind.as_str()))?;

    Ok(list
        .items
        .iter()
        .map(|obj| summarize(kind, obj))
        .collect())
}

async fn list_cluster<K>(client: &kube::Client, kind: ResourceKind) -> Result<Vec<ResourceSummary>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let api: Api<K> = Api::all(client.clone());
    let list = api
        .list(&ListParams::default())
        .await
        .context(format!("Failed to list {}", kind.as_str()))?;

    Ok(list
        .items
        .iter()
        .map(|obj| summarize(kind, obj))
        .collect())
}

async fn detail_namespaced<K>(
    client: &kube::Client,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
) -> Result<serde_json::Value>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + std::fmt::Debug,
{
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::default_namespaced(client.clone()),
    };
    let obj = api
        .get(name)
        .await
        .context(format!("Failed to get {} '{}'", kind.as_str(), name))?;
    Ok(serde_json::to_value(&obj)?)
}

async fn detail_cluster<K>(
    client: &kube::Client,
    kind: ResourceKind,
    name: &str,
) -> Result<serde_json::Value>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + std::fmt::Debug,
{
    let api: Api<K> = Api::all(client.clone());
    let obj = api
        .get(name)
        .await
        .context(format!("Failed to get {} '{}'", kind.as_str(), name))?;
    Ok(serde_json::to_value(&obj)?)
}

/// Build a uniform summary from an object's metadata
fn summarize<K: Resource>(kind: ResourceKind, obj: &K) -> ResourceSummary {
    let meta = obj.meta();
    ResourceSummary {
        kind,
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone(),
        created_at: meta.creation_timestamp.as_ref().map(|t| t.0),
        labels: meta.labels.clone().unwrap_or_default(),
    }
}

/// Convert a k8s Pod to PodInfo
///
/// Container names come from the spec so pods without statuses still list
/// their containers; readiness and restart counts overlay from status.
fn pod_to_info(pod: Pod, namespace: &str) -> PodInfo {
    let name = pod.metadata.name.unwrap_or_default();
    let mut info = PodInfo::new(name, namespace.to_string());

    if let Some(spec) = &pod.spec {
        info.node_name = spec.node_name.clone();
        info.containers = spec
            .containers
            .iter()
            .map(|c| ContainerInfo::new(c.name.clone()))
            .collect();
    }

    if let Some(status) = pod.status {
        info.pod_ip = status.pod_ip;
        info.status = status
            .phase
            .as_deref()
            .map(PodStatus::from)
            .unwrap_or(PodStatus::Unknown);

        if let Some(statuses) = status.container_statuses {
            for cs in statuses {
                if let Some(container) = info.containers.iter_mut().find(|c| c.name == cs.name) {
                    container.ready = cs.ready;
                    container.restart_count = cs.restart_count;
                }
            }
        }
    }

    info
}
