//! Finalizers hold an object in the cluster until its remote resources have
//! been torn down.

use crate::cluster::{Cluster, ClusterError, Object};
use kube::Resource;

pub fn has<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .iter()
        .flatten()
        .any(|f| f == finalizer)
}

/// Adds `finalizer`, returning whether the object changed.
pub fn add<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if has(obj, finalizer) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Removes `finalizer`, returning whether the object changed.
pub fn remove<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}

/// Ensures the object carries `finalizer`, writing it only when missing.
pub async fn ensure<C: Cluster, K: Object>(
    cluster: &C,
    mut obj: K,
    finalizer: &str,
) -> Result<K, ClusterError> {
    if !add(&mut obj, finalizer) {
        return Ok(obj);
    }
    tracing::debug!(%finalizer, "Adding finalizer");
    cluster.replace(&obj).await
}

/// Removes `finalizer` from the object, writing it only when present.
pub async fn release<C: Cluster, K: Object>(
    cluster: &C,
    mut obj: K,
    finalizer: &str,
) -> Result<K, ClusterError> {
    if !remove(&mut obj, finalizer) {
        return Ok(obj);
    }
    tracing::debug!(%finalizer, "Removing finalizer");
    cluster.replace(&obj).await
}
