//! Route kinds and the polymorphic [`Route`] view over them.

mod grpc;
mod http;
mod tls;

pub use self::{
    grpc::{GrpcMethodMatch, GrpcRoute, GrpcRouteMatch, GrpcRouteRule, GrpcRouteSpec},
    http::{HttpPathMatch, HttpRoute, HttpRouteMatch, HttpRouteRule, HttpRouteSpec},
    tls::{TlsRoute, TlsRouteRule, TlsRouteSpec},
};
use crate::{condition, Condition, GroupKind, ObjectMeta};
use appnet_gateway_controller_core::routes::{self, RouteKind};
use kube::Resource;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct HeaderMatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    pub name: String,
    pub value: String,
}

/// Status shared by every route kind.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    #[serde(default)]
    pub parents: Vec<RouteParentStatus>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteParentStatus {
    pub parent_ref: ParentReference,
    pub controller_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A route kind that can be handled generically.
pub trait RouteObject:
    Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    const ROUTE_KIND: RouteKind;

    fn route_spec(&self) -> routes::RouteSpec;

    fn route_status(&self) -> Option<&RouteStatus>;

    fn route_status_mut(&mut self) -> &mut RouteStatus;

    fn into_route(self) -> Route;
}

/// A route of any supported kind.
///
/// Equality never holds across kinds. Within a kind, two routes are equal
/// when they share a name and namespace and their normalized specs and
/// statuses are structurally equal.
#[derive(Clone, Debug)]
pub enum Route {
    Http(HttpRoute),
    Grpc(GrpcRoute),
    Tls(TlsRoute),
}

// === impl RouteStatus ===

impl RouteStatus {
    pub fn parents(&self) -> &[RouteParentStatus] {
        &self.parents
    }

    pub fn set_parents(&mut self, parents: Vec<RouteParentStatus>) {
        self.parents = parents;
    }

    /// Upserts a status entry for each parent reference, keyed by parent name.
    ///
    /// Existing entries keep their conditions; new entries start without any.
    pub fn update_parent_refs<'p>(
        &mut self,
        parent_refs: impl IntoIterator<Item = &'p ParentReference>,
        controller_name: &str,
    ) {
        for parent_ref in parent_refs {
            match self
                .parents
                .iter_mut()
                .find(|p| p.parent_ref.name == parent_ref.name)
            {
                Some(status) => {
                    status.parent_ref = parent_ref.clone();
                    status.controller_name = controller_name.to_string();
                }
                None => self.parents.push(RouteParentStatus {
                    parent_ref: parent_ref.clone(),
                    controller_name: controller_name.to_string(),
                    conditions: Vec::new(),
                }),
            }
        }
    }

    /// Merges `condition` into every parent entry written by
    /// `controller_name`. Returns whether any entry changed.
    pub fn update_route_condition(&mut self, controller_name: &str, condition: Condition) -> bool {
        let mut changed = false;
        for parent in &mut self.parents {
            if parent.controller_name == controller_name {
                changed |= condition::merge(&mut parent.conditions, condition.clone());
            }
        }
        changed
    }

    /// Drops entries written by `controller_name` for parents that are no
    /// longer referenced.
    pub fn retain_parents(&mut self, controller_name: &str, referenced: &[ParentReference]) {
        self.parents.retain(|p| {
            p.controller_name != controller_name
                || referenced.iter().any(|r| r.name == p.parent_ref.name)
        });
    }
}

// === impl Route ===

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Self::Http(_) => RouteKind::Http,
            Self::Grpc(_) => RouteKind::Grpc,
            Self::Tls(_) => RouteKind::Tls,
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        match self {
            Self::Http(_) => GroupKind::of::<HttpRoute>(),
            Self::Grpc(_) => GroupKind::of::<GrpcRoute>(),
            Self::Tls(_) => GroupKind::of::<TlsRoute>(),
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Http(r) => r.meta(),
            Self::Grpc(r) => r.meta(),
            Self::Tls(r) => r.meta(),
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn spec(&self) -> routes::RouteSpec {
        match self {
            Self::Http(r) => r.route_spec(),
            Self::Grpc(r) => r.route_spec(),
            Self::Tls(r) => r.route_spec(),
        }
    }

    pub fn status(&self) -> Option<&RouteStatus> {
        match self {
            Self::Http(r) => r.route_status(),
            Self::Grpc(r) => r.route_status(),
            Self::Tls(r) => r.route_status(),
        }
    }

    pub fn status_mut(&mut self) -> &mut RouteStatus {
        match self {
            Self::Http(r) => r.route_status_mut(),
            Self::Grpc(r) => r.route_status_mut(),
            Self::Tls(r) => r.route_status_mut(),
        }
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        self.name() == other.name()
            && self.namespace() == other.namespace()
            && self.spec() == other.spec()
            && self.status() == other.status()
    }
}

impl From<HttpRoute> for Route {
    fn from(route: HttpRoute) -> Self {
        Self::Http(route)
    }
}

impl From<GrpcRoute> for Route {
    fn from(route: GrpcRoute) -> Self {
        Self::Grpc(route)
    }
}

impl From<TlsRoute> for Route {
    fn from(route: TlsRoute) -> Self {
        Self::Tls(route)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind(), self.namespace(), self.name())
    }
}

// === impl RouteObject ===

macro_rules! impl_route_object {
    ($ty:ty, $kind:expr, $variant:ident) => {
        impl RouteObject for $ty {
            const ROUTE_KIND: RouteKind = $kind;

            fn route_spec(&self) -> routes::RouteSpec {
                self.spec.normalize()
            }

            fn route_status(&self) -> Option<&RouteStatus> {
                self.status.as_ref()
            }

            fn route_status_mut(&mut self) -> &mut RouteStatus {
                self.status.get_or_insert_with(Default::default)
            }

            fn into_route(self) -> Route {
                Route::$variant(self)
            }
        }
    };
}

impl_route_object!(HttpRoute, RouteKind::Http, Http);
impl_route_object!(GrpcRoute, RouteKind::Grpc, Grpc);
impl_route_object!(TlsRoute, RouteKind::Tls, Tls);

// === normalization ===

fn normalize_parents(parents: Option<&[ParentReference]>) -> Vec<routes::ParentRef> {
    parents
        .unwrap_or_default()
        .iter()
        .map(|p| routes::ParentRef {
            group: p.group.clone(),
            kind: p.kind.clone(),
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            section_name: p.section_name.clone(),
            port: p.port,
        })
        .collect()
}

fn normalize_backends(backends: Option<&[BackendRef]>) -> Vec<routes::BackendRef> {
    backends
        .unwrap_or_default()
        .iter()
        .map(|b| routes::BackendRef {
            weight: b.weight,
            group: b.group.clone(),
            kind: b.kind.clone(),
            name: b.name.clone(),
            namespace: b.namespace.clone(),
            port: b.port,
        })
        .collect()
}

fn normalize_headers(headers: Option<&[HeaderMatch]>) -> Vec<routes::HeaderMatch> {
    headers
        .unwrap_or_default()
        .iter()
        .map(|h| routes::HeaderMatch {
            match_type: h.type_.clone(),
            name: h.name.clone(),
            value: h.value.clone(),
        })
        .collect()
}

/// Projects a normalized parent back into the CRD shape written to status.
pub fn parent_reference(parent: &routes::ParentRef) -> ParentReference {
    ParentReference {
        group: parent.group.clone(),
        kind: parent.kind.clone(),
        namespace: parent.namespace.clone(),
        name: parent.name.clone(),
        section_name: parent.section_name.clone(),
        port: parent.port,
    }
}
