use super::ROUTE_FINALIZER;
use crate::{
    cluster::Cluster,
    conditions::{self, Reason},
    reconcile::{Error, Handler, Outcome, Validation},
};
use appnet_gateway_controller_core::CONTROLLER_NAME;
use appnet_gateway_controller_k8s_api::{
    condition,
    route::{parent_reference, ParentReference},
    Condition, Gateway, ResourceExt, RouteObject, Service,
};
use chrono::{DateTime, Utc};
use std::marker::PhantomData;

/// Reconciles routes attached to Gateways of the configured class.
#[derive(Debug)]
pub struct RouteHandler<K> {
    gateway_class: String,
    _route: PhantomData<fn() -> K>,
}

/// What route validation discovered about a route's references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteAttachments {
    /// Parents that are Gateways managed by this controller.
    pub parents: Vec<ParentReference>,

    /// Backend services that do not exist.
    pub missing_backends: Vec<String>,
}

// === impl RouteHandler ===

impl<K> RouteHandler<K> {
    pub fn new(gateway_class: impl Into<String>) -> Self {
        Self {
            gateway_class: gateway_class.into(),
            _route: PhantomData,
        }
    }
}

impl<K> Clone for RouteHandler<K> {
    fn clone(&self) -> Self {
        Self::new(self.gateway_class.clone())
    }
}

#[async_trait::async_trait]
impl<K: RouteObject> Handler for RouteHandler<K> {
    type Object = K;
    type Attachments = RouteAttachments;

    const KIND: &'static str = K::ROUTE_KIND.as_str();
    const FINALIZER: &'static str = ROUTE_FINALIZER;

    async fn validate<C: Cluster>(
        &self,
        cluster: &C,
        route: &K,
    ) -> Result<Validation<RouteAttachments>, Error> {
        let namespace = route.namespace().unwrap_or_default();
        let spec = route.route_spec();

        let mut attachments = RouteAttachments::default();
        for parent in spec.gateway_parents() {
            let gateway_ns = parent.effective_namespace(&namespace);
            match cluster.get::<Gateway>(gateway_ns, &parent.name).await? {
                Some(gateway) if gateway.spec.gateway_class_name == self.gateway_class => {
                    attachments.parents.push(parent_reference(parent));
                }
                Some(gateway) => tracing::debug!(
                    gateway.name = %parent.name,
                    gateway.class = %gateway.spec.gateway_class_name,
                    "Parent gateway is not managed"
                ),
                None => tracing::debug!(gateway.name = %parent.name, "Parent gateway not found"),
            }
        }
        if attachments.parents.is_empty() {
            return Ok(Validation::Skip(
                "no parent gateway is managed by this controller".to_string(),
            ));
        }

        for backend in spec.backend_refs() {
            if !backend.targets_service() {
                return rejected(
                    &attachments,
                    Reason::Invalid,
                    format!("backend {} is not a Service", backend.name),
                );
            }
            if backend.effective_namespace(&namespace) != namespace {
                return rejected(
                    &attachments,
                    Reason::RefNotPermitted,
                    format!("backend {} is in another namespace", backend.name),
                );
            }
            match cluster.get::<Service>(&namespace, &backend.name).await? {
                None => {
                    if !attachments.missing_backends.contains(&backend.name) {
                        attachments.missing_backends.push(backend.name.clone());
                    }
                }
                Some(svc) => {
                    let families = svc
                        .spec
                        .as_ref()
                        .and_then(|s| s.ip_families.as_ref())
                        .map_or(0, Vec::len);
                    if families > 1 {
                        return rejected(
                            &attachments,
                            Reason::Invalid,
                            format!("backend {} is a dual-stack Service", backend.name),
                        );
                    }
                }
            }
        }

        Ok(Validation::Valid(attachments))
    }

    fn apply_status(
        &self,
        route: &mut K,
        attachments: &RouteAttachments,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> bool {
        let generation = route.meta().generation;
        let cond = |type_: &str, ok: bool, reason: Reason, message: &str| -> Condition {
            condition::new_condition(type_, ok, reason, message, generation, now)
        };

        let resolved_refs = if attachments.missing_backends.is_empty() {
            cond(conditions::RESOLVED_REFS, true, Reason::ResolvedRefs, "")
        } else {
            let message = format!(
                "backend services not found: {}",
                attachments.missing_backends.join(", ")
            );
            cond(conditions::RESOLVED_REFS, false, Reason::BackendNotFound, &message)
        };
        let (accepted, resolved_refs) = match outcome {
            Outcome::Accepted => (
                cond(conditions::ACCEPTED, true, Reason::Accepted, ""),
                resolved_refs,
            ),
            Outcome::Rejected { reason, message } => (
                cond(conditions::ACCEPTED, false, *reason, message.as_str()),
                cond(conditions::RESOLVED_REFS, false, *reason, message.as_str()),
            ),
            Outcome::Conflicted(message) => (
                cond(conditions::ACCEPTED, false, Reason::Conflicted, message.as_str()),
                resolved_refs,
            ),
        };

        let status = route.route_status_mut();
        let before = status.clone();
        status.retain_parents(CONTROLLER_NAME, &attachments.parents);
        status.update_parent_refs(&attachments.parents, CONTROLLER_NAME);
        status.update_route_condition(CONTROLLER_NAME, accepted);
        status.update_route_condition(CONTROLLER_NAME, resolved_refs);
        *status != before
    }
}

fn rejected(
    attachments: &RouteAttachments,
    reason: Reason,
    message: String,
) -> Result<Validation<RouteAttachments>, Error> {
    Ok(Validation::Rejected {
        attachments: attachments.clone(),
        reason,
        message,
    })
}
