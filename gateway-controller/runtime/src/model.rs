//! Maps cluster objects onto the remote resources they require.
//!
//! The model only reads the object it is given. References to other objects
//! are expressed by logical name, which the deployer resolves remotely.

mod resources;


pub use self::resources::*;
use crate::{
    core::{
        routes::{BackendRef, RouteKind},
        Intent, ModelBuilder, ResourceUid, Stack, StackId,
    },
    k8s::{
        policy::{AccessLogPolicy, IamAuthPolicy, TargetGroupPolicy, VpcAssociationPolicy},
        Gateway, GrpcRoute, HttpRoute, PolicyResource, ResourceExt, RouteObject, TargetRef,
        TlsRoute,
    },
};
use anyhow::Result;

const DEFAULT_PROTOCOL: &str = "HTTP";
const DEFAULT_PROTOCOL_VERSION: &str = "HTTP1";

/// Builds stacks of VPC Lattice resources.
#[derive(Clone, Debug, Default)]
pub struct LatticeModel(());

// === impl LatticeModel ===

impl LatticeModel {
    pub fn new() -> Self {
        Self(())
    }

    fn gateway(&self, gw: &Gateway) -> Result<Stack> {
        let mut stack = Stack::new(stack_id(gw));
        stack.add_resource(
            ServiceNetwork {
                id: String::new(),
                name: qualified(gw),
            }
            .hashed()?,
        )?;
        Ok(stack)
    }

    fn route<K: RouteObject>(&self, route: &K) -> Result<Stack> {
        let namespace = route.namespace().unwrap_or_default();
        let name = qualified(route);
        let spec = route.route_spec();
        let kind = K::ROUTE_KIND;
        let mut stack = Stack::new(stack_id(route));

        let service = stack.add_resource(
            Service {
                id: String::new(),
                name: name.clone(),
                route_kind: kind.as_str(),
                hostnames: spec.hostnames.clone(),
            }
            .hashed()?,
        )?;

        // Several parent refs may name sections of the same gateway; the
        // service is associated with each service network once.
        let mut networks = Vec::<String>::new();
        for parent in spec.gateway_parents() {
            let network = format!("{}/{}", parent.effective_namespace(&namespace), parent.name);
            if networks.contains(&network) {
                continue;
            }
            networks.push(network.clone());
            let association = stack.add_resource(
                ServiceNetworkServiceAssociation {
                    id: String::new(),
                    name: format!("{name}->{network}"),
                    service: name.clone(),
                    service_network: network,
                }
                .hashed()?,
            )?;
            stack.add_dependency(&service, &association)?;
        }

        let (protocol, port) = listener_protocol(kind);
        let listener_name = format!("{name}:{port}");
        let listener = stack.add_resource(
            Listener {
                id: String::new(),
                name: listener_name.clone(),
                service: name.clone(),
                protocol,
                port,
            }
            .hashed()?,
        )?;
        stack.add_dependency(&service, &listener)?;

        let owner = format!("{kind}/{name}");
        let mut target_groups = Vec::<(String, ResourceUid)>::new();
        for backend in spec.backend_refs() {
            let tg_name = target_group_name(&owner, &namespace, backend);
            if target_groups.iter().any(|(n, _)| *n == tg_name) {
                continue;
            }
            let tg = stack.add_resource(
                TargetGroup {
                    id: String::new(),
                    name: tg_name.clone(),
                    owner: owner.clone(),
                    service: format!("{namespace}/{}", backend.name),
                    port: backend.port,
                    protocol: DEFAULT_PROTOCOL.to_string(),
                    protocol_version: match kind {
                        RouteKind::Grpc => "GRPC".to_string(),
                        _ => DEFAULT_PROTOCOL_VERSION.to_string(),
                    },
                    health_check: None,
                }
                .hashed()?,
            )?;
            let targets = stack.add_resource(
                Targets {
                    id: String::new(),
                    name: tg_name.clone(),
                    owner: owner.clone(),
                    target_group: tg_name.clone(),
                    service: format!("{namespace}/{}", backend.name),
                    port: backend.port,
                }
                .hashed()?,
            )?;
            stack.add_dependency(&tg, &targets)?;
            target_groups.push((tg_name, tg));
        }

        for (priority, rule) in spec.rules.iter().enumerate() {
            let forward = rule
                .backend_refs
                .iter()
                .map(|b| WeightedTargetGroup {
                    target_group: target_group_name(&owner, &namespace, b),
                    weight: b.weight.unwrap_or(1),
                })
                .collect::<Vec<_>>();
            let uid = stack.add_resource(
                Rule {
                    id: String::new(),
                    name: format!("{listener_name}/rule-{priority}"),
                    listener: listener_name.clone(),
                    priority: priority + 1,
                    matches: rule.matches.clone(),
                    forward: forward.clone(),
                }
                .hashed()?,
            )?;
            stack.add_dependency(&listener, &uid)?;
            for (tg_name, tg) in &target_groups {
                if forward.iter().any(|f| f.target_group == *tg_name) {
                    stack.add_dependency(tg, &uid)?;
                }
            }
        }

        Ok(stack)
    }

    fn target_group_policy(&self, policy: &TargetGroupPolicy) -> Result<Stack> {
        let mut stack = Stack::new(stack_id(policy));
        let Some(target) = policy.spec.target_ref.as_ref() else {
            return Ok(stack);
        };
        let namespace = policy.namespace().unwrap_or_default();
        let service = format!("{}/{}", target.effective_namespace(&namespace), target.name);
        stack.add_resource(
            TargetGroup {
                id: String::new(),
                name: service.clone(),
                owner: format!("TargetGroupPolicy/{}", qualified(policy)),
                service,
                port: None,
                protocol: policy
                    .spec
                    .protocol
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
                protocol_version: policy
                    .spec
                    .protocol_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                health_check: policy.spec.health_check.clone(),
            }
            .hashed()?,
        )?;
        Ok(stack)
    }

    fn vpc_association_policy(&self, policy: &VpcAssociationPolicy) -> Result<Stack> {
        let mut stack = Stack::new(stack_id(policy));
        let Some(target) = policy.spec.target_ref.as_ref() else {
            return Ok(stack);
        };
        if policy.spec.associate_with_vpc == Some(false) {
            return Ok(stack);
        }
        let network = target_name(policy, target);
        stack.add_resource(
            ServiceNetworkVpcAssociation {
                id: String::new(),
                name: network.clone(),
                service_network: network,
                security_group_ids: policy.spec.security_group_ids.clone().unwrap_or_default(),
            }
            .hashed()?,
        )?;
        Ok(stack)
    }

    fn access_log_policy(&self, policy: &AccessLogPolicy) -> Result<Stack> {
        let mut stack = Stack::new(stack_id(policy));
        let (Some(target), Some(arn)) = (
            policy.spec.target_ref.as_ref(),
            policy.spec.destination_arn.as_ref(),
        ) else {
            return Ok(stack);
        };
        stack.add_resource(
            AccessLogSubscription {
                id: String::new(),
                name: qualified(policy),
                target: format!("{}/{}", target.kind, target_name(policy, target)),
                destination_arn: arn.clone(),
            }
            .hashed()?,
        )?;
        Ok(stack)
    }

    fn iam_auth_policy(&self, policy: &IamAuthPolicy) -> Result<Stack> {
        let mut stack = Stack::new(stack_id(policy));
        let Some(target) = policy.spec.target_ref.as_ref() else {
            return Ok(stack);
        };
        stack.add_resource(
            AuthPolicy {
                id: String::new(),
                name: qualified(policy),
                target: format!("{}/{}", target.kind, target_name(policy, target)),
                policy: policy.spec.policy.clone(),
            }
            .hashed()?,
        )?;
        Ok(stack)
    }
}

macro_rules! impl_model_builder {
    ($ty:ty, $build:ident) => {
        #[async_trait::async_trait]
        impl ModelBuilder<$ty> for LatticeModel {
            async fn build(&self, source: &$ty, intent: Intent) -> Result<Stack> {
                match intent {
                    // Teardown deletes recorded resources; nothing is applied.
                    Intent::Delete => Ok(Stack::new(stack_id(source))),
                    Intent::Upsert => self.$build(source),
                }
            }
        }
    };
}

impl_model_builder!(Gateway, gateway);
impl_model_builder!(HttpRoute, route);
impl_model_builder!(GrpcRoute, route);
impl_model_builder!(TlsRoute, route);
impl_model_builder!(TargetGroupPolicy, target_group_policy);
impl_model_builder!(VpcAssociationPolicy, vpc_association_policy);
impl_model_builder!(AccessLogPolicy, access_log_policy);
impl_model_builder!(IamAuthPolicy, iam_auth_policy);

fn stack_id<T: ResourceExt>(obj: &T) -> StackId {
    StackId::new(obj.namespace().unwrap_or_default(), obj.name_any())
}

fn qualified<T: ResourceExt>(obj: &T) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

fn target_name<P: PolicyResource>(policy: &P, target: &TargetRef) -> String {
    let namespace = policy.namespace().unwrap_or_default();
    format!("{}/{}", target.effective_namespace(&namespace), target.name)
}

fn target_group_name(owner: &str, namespace: &str, backend: &BackendRef) -> String {
    let namespace = backend.effective_namespace(namespace);
    match backend.port {
        Some(port) => format!("{owner}->{namespace}/{}:{port}", backend.name),
        None => format!("{owner}->{namespace}/{}", backend.name),
    }
}

fn listener_protocol(kind: RouteKind) -> (&'static str, u16) {
    match kind {
        RouteKind::Http => ("HTTP", 80),
        RouteKind::Grpc => ("HTTPS", 443),
        RouteKind::Tls => ("TLS_PASSTHROUGH", 443),
    }
}
