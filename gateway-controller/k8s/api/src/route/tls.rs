use super::{BackendRef, ParentReference, RouteStatus};
use appnet_gateway_controller_core::routes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TLSRoute passes TLS connections through to backends, selected by SNI.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha2",
    kind = "TLSRoute",
    root = "TlsRoute",
    status = "RouteStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TlsRouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    #[serde(default)]
    pub rules: Vec<TlsRouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsRouteRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_refs: Option<Vec<BackendRef>>,
}

// === impl TlsRouteSpec ===

impl TlsRouteSpec {
    pub(super) fn normalize(&self) -> routes::RouteSpec {
        routes::RouteSpec {
            parent_refs: super::normalize_parents(self.parent_refs.as_deref()),
            hostnames: self.hostnames.clone().unwrap_or_default(),
            rules: self
                .rules
                .iter()
                .map(|rule| routes::RouteRule {
                    backend_refs: super::normalize_backends(rule.backend_refs.as_deref()),
                    matches: Vec::new(),
                })
                .collect(),
        }
    }
}
