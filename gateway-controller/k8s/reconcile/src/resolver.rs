//! Resolves policy target references against the cluster.

use crate::{
    cluster::{Cluster, ClusterError, Object},
    conditions::{self, Reason},
};
use appnet_gateway_controller_k8s_api::{
    condition, Gateway, GroupKind, GrpcRoute, HttpRoute, Policy, PolicyResource, ResourceExt,
    Service, TargetKind, TargetObject, TargetRef,
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0} has no target reference")]
    Missing(String),

    #[error("unsupported target kind {0}")]
    UnsupportedKind(GroupKind),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Identifies the resource a policy is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetId {
    pub group_kind: GroupKind,
    pub namespace: String,
    pub name: String,
}

pub fn target_kind(target: &TargetRef) -> Result<TargetKind, ResolveError> {
    let gk = target.group_kind();
    TargetKind::from_group_kind(&gk).ok_or(ResolveError::UnsupportedKind(gk))
}

/// Fetches the target of `policy` as a `T`.
///
/// Returns `None` when the policy does not reference a `T`, references one in
/// another namespace, or the referenced object does not exist.
pub async fn resolve_target<T, C>(cluster: &C, policy: &Policy) -> Result<Option<T>, ResolveError>
where
    T: TargetObject + Object,
    C: Cluster,
{
    let target = policy
        .target_ref()
        .ok_or_else(|| ResolveError::Missing(format!("{} {}", policy.kind(), policy.name())))?;

    if target.group_kind() != GroupKind::of::<T>() {
        return Ok(None);
    }
    if target.effective_namespace(policy.namespace()) != policy.namespace() {
        tracing::debug!(
            target.namespace = ?target.namespace,
            "Ignoring target in a foreign namespace"
        );
        return Ok(None);
    }

    let resolved = cluster.get::<T>(policy.namespace(), &target.name).await?;
    if resolved.is_none() {
        tracing::debug!(target.kind = %T::TARGET_KIND, target.name = %target.name, "Target not found");
    }
    Ok(resolved)
}

/// Checks whether the target of `policy` exists as a `kind`.
pub async fn target_exists<C: Cluster>(
    cluster: &C,
    policy: &Policy,
    kind: TargetKind,
) -> Result<bool, ResolveError> {
    let exists = match kind {
        TargetKind::Gateway => resolve_target::<Gateway, C>(cluster, policy)
            .await?
            .is_some(),
        TargetKind::HttpRoute => resolve_target::<HttpRoute, C>(cluster, policy)
            .await?
            .is_some(),
        TargetKind::GrpcRoute => resolve_target::<GrpcRoute, C>(cluster, policy)
            .await?
            .is_some(),
        TargetKind::Service => resolve_target::<Service, C>(cluster, policy)
            .await?
            .is_some(),
    };
    Ok(exists)
}

/// Lists the `P` policies in the target's namespace that reference `target`.
///
/// When `reasons` is set, only policies whose `Accepted` condition carries
/// one of the reasons are returned. A policy kind that is not installed in
/// the cluster has no attached policies.
pub async fn find_attached_policies<P, C>(
    cluster: &C,
    target: &TargetId,
    reasons: Option<&[Reason]>,
) -> Result<Vec<P>, ResolveError>
where
    P: PolicyResource,
    C: Cluster,
{
    let policies = match cluster.list::<P>(&target.namespace).await {
        Ok(policies) => policies,
        Err(ClusterError::KindNotInstalled(kind)) => {
            tracing::debug!(%kind, "Policy kind is not installed");
            return Ok(Vec::new());
        }
        Err(error) => return Err(error.into()),
    };

    Ok(policies
        .into_iter()
        .filter(|p| {
            let Some(target_ref) = p.target_ref() else {
                return false;
            };
            let namespace = p.namespace().unwrap_or_default();
            target_ref.group_kind() == target.group_kind
                && target_ref.name == target.name
                && target_ref.effective_namespace(&namespace) == target.namespace
        })
        .filter(|p| match reasons {
            None => true,
            Some(reasons) => condition::find(p.conditions(), conditions::ACCEPTED)
                .map_or(false, |c| reasons.iter().any(|r| c.reason == *r)),
        })
        .collect())
}

// === impl TargetId ===

impl TargetId {
    pub fn of(policy: &Policy) -> Result<Self, ResolveError> {
        let target = policy
            .target_ref()
            .ok_or_else(|| ResolveError::Missing(format!("{} {}", policy.kind(), policy.name())))?;
        Ok(Self {
            group_kind: target.group_kind(),
            namespace: target.effective_namespace(policy.namespace()).to_string(),
            name: target.name.clone(),
        })
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.group_kind, self.namespace, self.name)
    }
}
