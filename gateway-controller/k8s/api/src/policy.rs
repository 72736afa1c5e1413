mod access_log_policy;
mod iam_auth_policy;
mod target_group_policy;
mod target_ref;
mod vpc_association_policy;

pub use self::{
    access_log_policy::{AccessLogPolicy, AccessLogPolicySpec},
    iam_auth_policy::{IamAuthPolicy, IamAuthPolicySpec},
    target_group_policy::{HealthCheckConfig, TargetGroupPolicy, TargetGroupPolicySpec},
    target_ref::TargetRef,
    vpc_association_policy::{VpcAssociationPolicy, VpcAssociationPolicySpec},
};
use crate::{Condition, TargetKind};
use kube::{core::NamespaceResourceScope, Resource};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    TargetGroupPolicy,
    VpcAssociationPolicy,
    AccessLogPolicy,
    IamAuthPolicy,
}

/// A policy spec failed kind-specific validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidPolicy(String);

/// A policy kind that can be handled generically.
pub trait PolicyResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    const KIND: PolicyKind;

    /// The target kinds this policy may attach to.
    const TARGETS: &'static [TargetKind];

    fn target_ref(&self) -> Option<&TargetRef>;

    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn validate_spec(&self) -> Result<(), InvalidPolicy>;

    fn into_policy(self) -> Policy;
}

/// A policy of any supported kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Policy {
    TargetGroup(TargetGroupPolicy),
    VpcAssociation(VpcAssociationPolicy),
    AccessLog(AccessLogPolicy),
    IamAuth(IamAuthPolicy),
}

// === impl PolicyKind ===

impl PolicyKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TargetGroupPolicy => "TargetGroupPolicy",
            Self::VpcAssociationPolicy => "VpcAssociationPolicy",
            Self::AccessLogPolicy => "AccessLogPolicy",
            Self::IamAuthPolicy => "IAMAuthPolicy",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl InvalidPolicy ===

impl InvalidPolicy {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

// === impl Policy ===

macro_rules! each_policy {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Policy::TargetGroup($p) => $body,
            Policy::VpcAssociation($p) => $body,
            Policy::AccessLog($p) => $body,
            Policy::IamAuth($p) => $body,
        }
    };
}

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::TargetGroup(_) => PolicyKind::TargetGroupPolicy,
            Self::VpcAssociation(_) => PolicyKind::VpcAssociationPolicy,
            Self::AccessLog(_) => PolicyKind::AccessLogPolicy,
            Self::IamAuth(_) => PolicyKind::IamAuthPolicy,
        }
    }

    pub fn target_ref(&self) -> Option<&TargetRef> {
        each_policy!(self, p => p.target_ref())
    }

    pub fn conditions(&self) -> &[Condition] {
        each_policy!(self, p => p.conditions())
    }

    pub fn name(&self) -> &str {
        each_policy!(self, p => p.meta().name.as_deref().unwrap_or_default())
    }

    pub fn namespace(&self) -> &str {
        each_policy!(self, p => p.meta().namespace.as_deref().unwrap_or_default())
    }

    pub fn validate_spec(&self) -> Result<(), InvalidPolicy> {
        each_policy!(self, p => p.validate_spec())
    }
}

// === impl PolicyResource ===

macro_rules! impl_policy_resource {
    ($ty:ty, $kind:expr, $variant:ident, [$($target:expr),+]) => {
        impl PolicyResource for $ty {
            const KIND: PolicyKind = $kind;
            const TARGETS: &'static [TargetKind] = &[$($target),+];

            fn target_ref(&self) -> Option<&TargetRef> {
                self.spec.target_ref.as_ref()
            }

            fn conditions(&self) -> &[Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or_default()
            }

            fn conditions_mut(&mut self) -> &mut Vec<Condition> {
                &mut self.status.get_or_insert_with(Default::default).conditions
            }

            fn validate_spec(&self) -> Result<(), InvalidPolicy> {
                self.spec.validate()
            }

            fn into_policy(self) -> Policy {
                Policy::$variant(self)
            }
        }

        impl From<$ty> for Policy {
            fn from(policy: $ty) -> Self {
                Policy::$variant(policy)
            }
        }
    };
}

impl_policy_resource!(
    TargetGroupPolicy,
    PolicyKind::TargetGroupPolicy,
    TargetGroup,
    [TargetKind::Service]
);
impl_policy_resource!(
    VpcAssociationPolicy,
    PolicyKind::VpcAssociationPolicy,
    VpcAssociation,
    [TargetKind::Gateway]
);
impl_policy_resource!(
    AccessLogPolicy,
    PolicyKind::AccessLogPolicy,
    AccessLog,
    [TargetKind::Gateway, TargetKind::HttpRoute, TargetKind::GrpcRoute]
);
impl_policy_resource!(
    IamAuthPolicy,
    PolicyKind::IamAuthPolicy,
    IamAuth,
    [TargetKind::Gateway, TargetKind::HttpRoute, TargetKind::GrpcRoute]
);
