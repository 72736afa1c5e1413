//! Normalized views over HTTP, gRPC and TLS route specs.
//!
//! Every route kind projects into these shapes so that callers can compare and
//! walk routes without knowing which kind they came from. Comparisons are
//! structural and order-sensitive at every nesting level.

use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RouteKind {
    Http,
    Grpc,
    Tls,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    pub parent_refs: Vec<ParentRef>,
    pub hostnames: Vec<String>,
    pub rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ParentRef {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub section_name: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouteRule {
    pub backend_refs: Vec<BackendRef>,
    pub matches: Vec<RouteMatch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackendRef {
    /// An absent weight is distinct from any explicit weight.
    pub weight: Option<i32>,
    pub group: Option<String>,
    pub kind: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub path: Option<PathMatch>,
    pub method: Option<MethodMatch>,
    pub headers: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HeaderMatch {
    pub match_type: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathMatch {
    pub match_type: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MethodMatch {
    Http(String),
    Grpc {
        match_type: Option<String>,
        service: Option<String>,
        method: Option<String>,
    },
}

pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
pub const GATEWAY_KIND: &str = "Gateway";

// === impl RouteKind ===

impl RouteKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTPRoute",
            Self::Grpc => "GRPCRoute",
            Self::Tls => "TLSRoute",
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl RouteSpec ===

impl RouteSpec {
    /// Iterates over every backend reference across all rules.
    pub fn backend_refs(&self) -> impl Iterator<Item = &BackendRef> + '_ {
        self.rules.iter().flat_map(|rule| rule.backend_refs.iter())
    }

    /// Parent references that name a Gateway.
    pub fn gateway_parents(&self) -> impl Iterator<Item = &ParentRef> + '_ {
        self.parent_refs.iter().filter(|p| p.targets_gateway())
    }
}

// === impl ParentRef ===

impl ParentRef {
    /// Parent references default to a Gateway in the gateway API group.
    pub fn targets_gateway(&self) -> bool {
        let group = self.group.as_deref().unwrap_or(GATEWAY_GROUP);
        let kind = self.kind.as_deref().unwrap_or(GATEWAY_KIND);
        group == GATEWAY_GROUP && kind == GATEWAY_KIND
    }

    pub fn effective_namespace<'a>(&'a self, route_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(route_namespace)
    }
}

// === impl BackendRef ===

impl BackendRef {
    /// Backend references default to a core Service.
    pub fn targets_service(&self) -> bool {
        let group = self.group.as_deref().unwrap_or("");
        let kind = self.kind.as_deref().unwrap_or("Service");
        (group.is_empty() || group == "core") && kind == "Service"
    }

    pub fn effective_namespace<'a>(&'a self, route_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(route_namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(name: &str, weight: Option<i32>) -> BackendRef {
        BackendRef {
            weight,
            name: name.to_string(),
            port: Some(80),
            ..Default::default()
        }
    }

    #[test]
    fn weight_presence_is_significant() {
        assert_ne!(backend("a", None), backend("a", Some(1)));
        assert_eq!(backend("a", Some(1)), backend("a", Some(1)));
    }

    #[test]
    fn rule_order_is_significant() {
        let a = RouteRule {
            backend_refs: vec![backend("a", None), backend("b", None)],
            matches: vec![],
        };
        let b = RouteRule {
            backend_refs: vec![backend("b", None), backend("a", None)],
            matches: vec![],
        };
        assert_ne!(a, b);

        let shorter = RouteRule {
            backend_refs: vec![backend("a", None)],
            matches: vec![],
        };
        assert_ne!(a, shorter);
    }

    #[test]
    fn header_matches_compare_type_name_and_value() {
        let header = |t: Option<&str>, v: &str| HeaderMatch {
            match_type: t.map(Into::into),
            name: "x-env".to_string(),
            value: v.to_string(),
        };
        let m = |h| RouteMatch {
            headers: vec![h],
            ..Default::default()
        };
        assert_eq!(m(header(Some("Exact"), "prod")), m(header(Some("Exact"), "prod")));
        assert_ne!(m(header(Some("Exact"), "prod")), m(header(Some("Exact"), "dev")));
        assert_ne!(m(header(Some("Exact"), "prod")), m(header(None, "prod")));
    }

    #[test]
    fn parent_defaults_to_gateway() {
        let parent = ParentRef {
            name: "gw".to_string(),
            ..Default::default()
        };
        assert!(parent.targets_gateway());
        assert_eq!(parent.effective_namespace("apps"), "apps");

        let svc = ParentRef {
            group: Some("".to_string()),
            kind: Some("Service".to_string()),
            name: "svc".to_string(),
            ..Default::default()
        };
        assert!(!svc.targets_gateway());
    }

    #[test]
    fn backend_defaults_to_service() {
        assert!(backend("a", None).targets_service());
        let other = BackendRef {
            group: Some("example.com".to_string()),
            kind: Some("Bucket".to_string()),
            ..backend("a", None)
        };
        assert!(!other.targets_service());
    }
}
