#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use appnet_gateway_controller_core as core;
pub use appnet_gateway_controller_k8s_api as k8s;
pub use appnet_gateway_controller_k8s_reconcile as reconcile;

mod args;
mod deploy;
mod model;

pub use self::{args::Args, deploy::DryRunDeployer, model::LatticeModel};
