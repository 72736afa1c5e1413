#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod gateway;
mod group_kind;
pub mod policy;
pub mod route;
mod target;

pub use self::{
    gateway::{Gateway, GatewaySpec, GatewayStatus},
    group_kind::GroupKind,
    policy::{Policy, PolicyKind, PolicyResource, TargetRef},
    route::{GrpcRoute, HttpRoute, Route, RouteObject, RouteStatus, TlsRoute},
    target::{TargetKind, TargetObject},
};
pub use k8s_openapi::{
    api::core::v1::{Service, ServiceSpec},
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Resource,
};

/// API group shared by the gateway kinds.
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// API group of the policy kinds served by this controller.
pub const POLICY_API_GROUP: &str = "application-networking.k8s.aws";
