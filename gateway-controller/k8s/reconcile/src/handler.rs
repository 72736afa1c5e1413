mod gateway;
mod policy;
mod route;

pub use self::{gateway::GatewayHandler, policy::PolicyHandler, route::{RouteAttachments, RouteHandler}};

pub const GATEWAY_FINALIZER: &str = "application-networking.k8s.aws/gateway-finalizer";
pub const ROUTE_FINALIZER: &str = "application-networking.k8s.aws/route-finalizer";
pub const POLICY_FINALIZER: &str = "application-networking.k8s.aws/policy-finalizer";
