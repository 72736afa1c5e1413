#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod backoff;
pub mod cluster;
pub mod conditions;
mod events;
pub mod finalizer;
pub mod handler;
pub mod identity;
mod metrics;
pub mod reconcile;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use self::{
    backoff::{Backoff, ObjectKey},
    cluster::{Cluster, ClusterError, KubeCluster, Object},
    events::{EventKind, EventSink, KubeEvents, NoEvents, ObjectEvent},
    handler::{GatewayHandler, PolicyHandler, RouteHandler},
    metrics::ReconcileMetrics,
    reconcile::{error_policy, reconcile, Error, Handler, Outcome, Reconciler, Settings, Validation},
};
