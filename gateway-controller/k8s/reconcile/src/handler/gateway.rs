use super::GATEWAY_FINALIZER;
use crate::{
    cluster::Cluster,
    conditions::{self, Reason},
    reconcile::{Error, Handler, Outcome, Validation},
};
use ahash::AHashSet as HashSet;
use appnet_gateway_controller_k8s_api::{condition, Gateway};
use chrono::{DateTime, Utc};

const SUPPORTED_PROTOCOLS: [&str; 3] = ["HTTP", "HTTPS", "TLS"];

/// Reconciles Gateways of the configured class.
#[derive(Clone, Debug)]
pub struct GatewayHandler {
    gateway_class: String,
}

impl GatewayHandler {
    pub fn new(gateway_class: impl Into<String>) -> Self {
        Self {
            gateway_class: gateway_class.into(),
        }
    }

    fn check_listeners(gateway: &Gateway) -> Result<(), String> {
        if gateway.spec.listeners.is_empty() {
            return Err("gateway has no listeners".to_string());
        }
        let mut names = HashSet::default();
        for listener in &gateway.spec.listeners {
            if !SUPPORTED_PROTOCOLS.contains(&listener.protocol.as_str()) {
                return Err(format!(
                    "listener {} has unsupported protocol {}",
                    listener.name, listener.protocol
                ));
            }
            if !names.insert(listener.name.as_str()) {
                return Err(format!("duplicate listener name {}", listener.name));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Handler for GatewayHandler {
    type Object = Gateway;
    type Attachments = ();

    const KIND: &'static str = "Gateway";
    const FINALIZER: &'static str = GATEWAY_FINALIZER;

    async fn validate<C: Cluster>(&self, _: &C, gateway: &Gateway) -> Result<Validation<()>, Error> {
        if gateway.spec.gateway_class_name != self.gateway_class {
            return Ok(Validation::Skip(format!(
                "gateway class {} is not managed",
                gateway.spec.gateway_class_name
            )));
        }
        Ok(match Self::check_listeners(gateway) {
            Ok(()) => Validation::Valid(()),
            Err(message) => Validation::Rejected {
                attachments: (),
                reason: Reason::Invalid,
                message,
            },
        })
    }

    fn apply_status(
        &self,
        gateway: &mut Gateway,
        _: &(),
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> bool {
        let generation = gateway.metadata.generation;
        let (accepted, programmed) = match outcome {
            Outcome::Accepted => (
                condition::new_condition(conditions::ACCEPTED, true, Reason::Accepted, "", generation, now),
                condition::new_condition(conditions::PROGRAMMED, true, Reason::Programmed, "", generation, now),
            ),
            Outcome::Rejected { reason, message } => (
                condition::new_condition(conditions::ACCEPTED, false, *reason, message, generation, now),
                condition::new_condition(conditions::PROGRAMMED, false, *reason, message, generation, now),
            ),
            Outcome::Conflicted(message) => (
                condition::new_condition(conditions::ACCEPTED, false, Reason::Conflicted, message, generation, now),
                condition::new_condition(conditions::PROGRAMMED, false, Reason::Conflicted, message, generation, now),
            ),
        };
        let conditions = gateway.conditions_mut();
        let accepted = condition::merge(conditions, accepted);
        let programmed = condition::merge(conditions, programmed);
        accepted || programmed
    }
}
