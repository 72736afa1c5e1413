use super::{InvalidPolicy, PolicyStatus, TargetRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Attaches an IAM auth policy document to the target.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "application-networking.k8s.aws",
    version = "v1alpha1",
    kind = "IAMAuthPolicy",
    root = "IamAuthPolicy",
    status = "PolicyStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IamAuthPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    /// A JSON policy document.
    #[serde(default)]
    pub policy: String,
}

impl IamAuthPolicySpec {
    pub(super) fn validate(&self) -> Result<(), InvalidPolicy> {
        if self.policy.trim().is_empty() {
            return Err(InvalidPolicy::new("policy is required"));
        }
        match serde_json::from_str::<serde_json::Value>(&self.policy) {
            Ok(serde_json::Value::Object(_)) => Ok(()),
            Ok(_) => Err(InvalidPolicy::new("policy must be a JSON object")),
            Err(error) => Err(InvalidPolicy::new(format!(
                "policy is not valid JSON: {error}"
            ))),
        }
    }
}
