use super::{InvalidPolicy, PolicyStatus, TargetRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sends access logs for the target to a remote destination.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "application-networking.k8s.aws",
    version = "v1alpha1",
    kind = "AccessLogPolicy",
    status = "PolicyStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_arn: Option<String>,
}

/// Services that can receive access logs.
const DESTINATION_SERVICES: &[&str] = &["s3", "logs", "firehose"];

impl AccessLogPolicySpec {
    pub(super) fn validate(&self) -> Result<(), InvalidPolicy> {
        let arn = match self.destination_arn.as_deref() {
            Some(arn) if !arn.is_empty() => arn,
            _ => return Err(InvalidPolicy::new("destinationArn is required")),
        };

        // arn:partition:service:region:account:resource
        let mut parts = arn.splitn(6, ':');
        let (prefix, _partition, service) = (parts.next(), parts.next(), parts.next());
        if prefix != Some("arn") || parts.count() != 3 {
            return Err(InvalidPolicy::new(format!(
                "destinationArn {arn:?} is not an ARN"
            )));
        }
        match service {
            Some(s) if DESTINATION_SERVICES.contains(&s) => Ok(()),
            _ => Err(InvalidPolicy::new(format!(
                "destinationArn {arn:?} must name one of {}",
                DESTINATION_SERVICES.join(", ")
            ))),
        }
    }
}
