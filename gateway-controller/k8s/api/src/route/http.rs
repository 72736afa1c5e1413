use super::{BackendRef, HeaderMatch, ParentReference, RouteStatus};
use appnet_gateway_controller_core::routes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTPRoute routes HTTP requests from a Gateway listener to backends.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "HTTPRoute",
    root = "HttpRoute",
    status = "RouteStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<HttpRouteRule>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<HttpRouteMatch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_refs: Option<Vec<BackendRef>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<HttpPathMatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderMatch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct HttpPathMatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// === impl HttpRouteSpec ===

impl HttpRouteSpec {
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
                    matches: rule.matches.iter().flatten().map(normalize_match).collect(),
                })
                .collect(),
        }
    }
}

fn normalize_match(m: &HttpRouteMatch) -> routes::RouteMatch {
    routes::RouteMatch {
        path: m.path.as_ref().map(|p| routes::PathMatch {
            match_type: p.type_.clone(),
            value: p.value.clone(),
        }),
        method: m.method.clone().map(routes::MethodMatch::Http),
        headers: super::normalize_headers(m.headers.as_deref()),
    }
}
