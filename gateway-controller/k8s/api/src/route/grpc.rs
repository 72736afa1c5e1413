use super::{BackendRef, HeaderMatch, ParentReference, RouteStatus};
use appnet_gateway_controller_core::routes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// GRPCRoute routes gRPC requests from a Gateway listener to backends.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "GRPCRoute",
    root = "GrpcRoute",
    status = "RouteStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<GrpcRouteRule>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<GrpcRouteMatch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_refs: Option<Vec<BackendRef>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<GrpcMethodMatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderMatch>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct GrpcMethodMatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

// === impl GrpcRouteSpec ===

impl GrpcRouteSpec {
    pub(super) fn normalize(&self) -> routes::RouteSpec {
        routes::RouteSpec {
            parent_refs: super::normalize_parents(self.parent_refs.as_deref()),
            hostnames: self.hostnames.clone().unwrap_or_default(),
            rules: self
                .rules
                .iter()
                .flatten()
                .map(|rule| routes::RouteRule {
                    backend_refs: super::normalize_backends(rule.backend_refs.as_deref()),
                    matches: rule
                        .matches
                        .iter()
                        .flatten()
                        .map(|m| routes::RouteMatch {
                            path: None,
                            method: m.method.as_ref().map(|mm| routes::MethodMatch::Grpc {
                                match_type: mm.type_.clone(),
                                service: mm.service.clone(),
                                method: mm.method.clone(),
                            }),
                            headers: super::normalize_headers(m.headers.as_deref()),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
