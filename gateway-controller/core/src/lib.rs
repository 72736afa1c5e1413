#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod deploy;
pub mod identity;
pub mod routes;
pub mod stack;

pub use self::{
    deploy::{DeployError, Intent, ModelBuilder, StackDeployer},
    identity::id_from_hash,
    stack::{Kind, Resource, ResourceUid, Stack, StackError, StackId, StackResource},
};

/// Identifies this controller on status entries it writes.
pub const CONTROLLER_NAME: &str = "application-networking.k8s.aws/gateway-api-controller";
