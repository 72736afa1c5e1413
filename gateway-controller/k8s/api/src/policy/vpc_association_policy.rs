use super::{InvalidPolicy, PolicyStatus, TargetRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Controls how a Gateway's service network is associated with the VPC.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "application-networking.k8s.aws",
    version = "v1alpha1",
    kind = "VpcAssociationPolicy",
    status = "PolicyStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VpcAssociationPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_with_vpc: Option<bool>,
}

const MAX_SECURITY_GROUPS: usize = 5;

impl VpcAssociationPolicySpec {
    pub(super) fn validate(&self) -> Result<(), InvalidPolicy> {
        let sgs = self.security_group_ids.as_deref().unwrap_or_default();
        if !sgs.is_empty() && self.associate_with_vpc == Some(false) {
            return Err(InvalidPolicy::new(
                "securityGroupIds cannot be set when associateWithVpc is false",
            ));
        }
        if sgs.len() > MAX_SECURITY_GROUPS {
            return Err(InvalidPolicy::new(format!(
                "at most {MAX_SECURITY_GROUPS} securityGroupIds may be set"
            )));
        }
        for (i, sg) in sgs.iter().enumerate() {
            if !sg.starts_with("sg-") || sg.len() <= 3 {
                return Err(InvalidPolicy::new(format!(
                    "securityGroupIds[{i}] {sg:?} is not a security group id"
                )));
            }
            if sgs[..i].contains(sg) {
                return Err(InvalidPolicy::new(format!(
                    "securityGroupIds[{i}] {sg:?} is duplicated"
                )));
            }
        }
        Ok(())
    }
}
