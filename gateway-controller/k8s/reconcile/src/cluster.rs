use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, ListParams, PostParams},
    Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// A namespaced resource type the controller reads and writes.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<T> Object for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The write was rejected because the object changed since it was read.
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Stale {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("the {0} resource kind is not installed")]
    KindNotInstalled(String),

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Reads and conditionally writes cluster objects.
///
/// Every write carries the object's `resourceVersion`, so a concurrent update
/// fails with [`ClusterError::Stale`] instead of being overwritten.
#[async_trait::async_trait]
pub trait Cluster: Send + Sync + 'static {
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError>;

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>, ClusterError>;

    /// Replaces the object's metadata and spec.
    async fn replace<K: Object>(&self, obj: &K) -> Result<K, ClusterError>;

    /// Replaces the object's status subresource.
    async fn replace_status<K: Object>(&self, obj: &K) -> Result<K, ClusterError>;
}

#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

// === impl ClusterError ===

impl ClusterError {
    fn from_kube<K: Object>(error: kube::Error, obj: Option<&K>) -> Self {
        match error {
            kube::Error::Api(ref rsp) if rsp.code == 409 => Self::Stale {
                kind: K::kind(&()).to_string(),
                namespace: obj.and_then(|o| o.namespace()).unwrap_or_default(),
                name: obj.map(|o| o.name_any()).unwrap_or_default(),
            },
            // Listing an unknown resource type is the only way to get a 404
            // without naming an object.
            kube::Error::Api(ref rsp) if rsp.code == 404 && obj.is_none() => {
                Self::KindNotInstalled(K::kind(&()).to_string())
            }
            error => Self::Kube(error),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

// === impl KubeCluster ===

impl KubeCluster {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api<K: Object>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Cluster for KubeCluster {
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(ClusterError::Kube)
    }

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>, ClusterError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::from_kube::<K>(e, None))?;
        Ok(list.items)
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K, ClusterError> {
        let namespace = obj.namespace().unwrap_or_default();
        self.api::<K>(&namespace)
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(|e| ClusterError::from_kube(e, Some(obj)))
    }

    async fn replace_status<K: Object>(&self, obj: &K) -> Result<K, ClusterError> {
        let namespace = obj.namespace().unwrap_or_default();
        let body = serde_json::to_vec(obj).map_err(|source| ClusterError::Encode {
            kind: K::kind(&()).to_string(),
            source,
        })?;
        self.api::<K>(&namespace)
            .replace_status(&obj.name_any(), &PostParams::default(), body)
            .await
            .map_err(|e| ClusterError::from_kube(e, Some(obj)))
    }
}
