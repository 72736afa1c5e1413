use super::{InvalidPolicy, PolicyStatus, TargetRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configures the target groups created for a Service.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "application-networking.k8s.aws",
    version = "v1alpha1",
    kind = "TargetGroupPolicy",
    status = "PolicyStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_threshold_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
}

const PROTOCOLS: &[&str] = &["HTTP", "HTTPS", "TCP"];
const PROTOCOL_VERSIONS: &[&str] = &["HTTP1", "HTTP2", "GRPC"];
const HEALTH_CHECK_PROTOCOLS: &[&str] = &["HTTP", "HTTPS"];
const HEALTH_CHECK_VERSIONS: &[&str] = &["HTTP1", "HTTP2"];

impl TargetGroupPolicySpec {
    pub(super) fn validate(&self) -> Result<(), InvalidPolicy> {
        one_of("protocol", self.protocol.as_deref(), PROTOCOLS)?;
        one_of(
            "protocolVersion",
            self.protocol_version.as_deref(),
            PROTOCOL_VERSIONS,
        )?;
        if self.protocol.as_deref() == Some("TCP") && self.protocol_version.is_some() {
            return Err(InvalidPolicy::new(
                "protocolVersion cannot be set for TCP target groups",
            ));
        }

        if let Some(hc) = &self.health_check {
            one_of("healthCheck.protocol", hc.protocol.as_deref(), HEALTH_CHECK_PROTOCOLS)?;
            one_of(
                "healthCheck.protocolVersion",
                hc.protocol_version.as_deref(),
                HEALTH_CHECK_VERSIONS,
            )?;
            in_range("healthCheck.intervalSeconds", hc.interval_seconds, 5, 300)?;
            in_range("healthCheck.timeoutSeconds", hc.timeout_seconds, 1, 120)?;
            in_range("healthCheck.healthyThresholdCount", hc.healthy_threshold_count, 2, 10)?;
            in_range(
                "healthCheck.unhealthyThresholdCount",
                hc.unhealthy_threshold_count,
                2,
                10,
            )?;
            in_range("healthCheck.port", hc.port, 1, 65535)?;
            if let (Some(interval), Some(timeout)) = (hc.interval_seconds, hc.timeout_seconds) {
                if timeout >= interval {
                    return Err(InvalidPolicy::new(format!(
                        "healthCheck.timeoutSeconds ({timeout}) must be less than intervalSeconds ({interval})"
                    )));
                }
            }
            if let Some(path) = &hc.path {
                if !path.starts_with('/') {
                    return Err(InvalidPolicy::new(format!(
                        "healthCheck.path {path:?} must start with '/'"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn one_of(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<(), InvalidPolicy> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(InvalidPolicy::new(format!(
            "{field} {v:?} must be one of {}",
            allowed.join(", ")
        ))),
        _ => Ok(()),
    }
}

fn in_range(field: &str, value: Option<i64>, min: i64, max: i64) -> Result<(), InvalidPolicy> {
    match value {
        Some(v) if v < min || v > max => Err(InvalidPolicy::new(format!(
            "{field} {v} must be between {min} and {max}"
        ))),
        _ => Ok(()),
    }
}
