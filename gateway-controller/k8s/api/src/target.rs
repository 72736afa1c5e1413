use crate::{Gateway, GroupKind, GrpcRoute, HttpRoute, Service, GATEWAY_API_GROUP};

/// Kinds of resources a policy may attach to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Gateway,
    HttpRoute,
    GrpcRoute,
    Service,
}

/// A resource type that policies can target.
pub trait TargetObject: kube::Resource<DynamicType = ()> {
    const TARGET_KIND: TargetKind;
}

// === impl TargetKind ===

impl TargetKind {
    pub const ALL: [TargetKind; 4] = [
        TargetKind::Gateway,
        TargetKind::HttpRoute,
        TargetKind::GrpcRoute,
        TargetKind::Service,
    ];

    pub fn group_kind(&self) -> GroupKind {
        match self {
            Self::Gateway => GroupKind::new(GATEWAY_API_GROUP, "Gateway"),
            Self::HttpRoute => GroupKind::new(GATEWAY_API_GROUP, "HTTPRoute"),
            Self::GrpcRoute => GroupKind::new(GATEWAY_API_GROUP, "GRPCRoute"),
            Self::Service => GroupKind::new("", "Service"),
        }
    }

    pub fn from_group_kind(gk: &GroupKind) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.group_kind() == *gk)
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group_kind())
    }
}

impl TargetObject for Gateway {
    const TARGET_KIND: TargetKind = TargetKind::Gateway;
}

impl TargetObject for HttpRoute {
    const TARGET_KIND: TargetKind = TargetKind::HttpRoute;
}

impl TargetObject for GrpcRoute {
    const TARGET_KIND: TargetKind = TargetKind::GrpcRoute;
}

impl TargetObject for Service {
    const TARGET_KIND: TargetKind = TargetKind::Service;
}
