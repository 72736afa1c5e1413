use super::POLICY_FINALIZER;
use crate::{
    cluster::Cluster,
    conditions::{self, Reason},
    reconcile::{Error, Handler, Outcome, Validation},
    resolver::{self, ResolveError, TargetId},
};
use appnet_gateway_controller_k8s_api::{condition, PolicyResource, ResourceExt};
use chrono::{DateTime, Utc};
use std::marker::PhantomData;

/// Reconciles policies of kind `P`.
///
/// A policy is accepted when it references a supported target that exists
/// and no other policy of the same kind is already accepted for that target.
#[derive(Debug)]
pub struct PolicyHandler<P> {
    _policy: PhantomData<fn() -> P>,
}

impl<P> PolicyHandler<P> {
    pub fn new() -> Self {
        Self {
            _policy: PhantomData,
        }
    }
}

impl<P> Default for PolicyHandler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for PolicyHandler<P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<P: PolicyResource> Handler for PolicyHandler<P> {
    type Object = P;
    type Attachments = ();

    const KIND: &'static str = P::KIND.as_str();
    const FINALIZER: &'static str = POLICY_FINALIZER;

    async fn validate<C: Cluster>(&self, cluster: &C, policy: &P) -> Result<Validation<()>, Error> {
        let invalid = |reason, message| {
            Ok(Validation::Rejected {
                attachments: (),
                reason,
                message,
            })
        };

        let Some(target) = policy.target_ref() else {
            return invalid(Reason::Invalid, "targetRef is required".to_string());
        };
        let kind = match resolver::target_kind(target) {
            Ok(kind) if P::TARGETS.contains(&kind) => kind,
            Ok(kind) => {
                return invalid(
                    Reason::Invalid,
                    format!("{} cannot target {kind}", P::KIND),
                )
            }
            Err(ResolveError::UnsupportedKind(gk)) => {
                return invalid(Reason::Invalid, format!("unsupported target kind {gk}"))
            }
            Err(error) => return Err(error.into()),
        };
        if let Err(error) = policy.validate_spec() {
            return invalid(Reason::Invalid, error.to_string());
        }

        let generic = policy.clone().into_policy();
        if !resolver::target_exists(cluster, &generic, kind).await? {
            return invalid(
                Reason::TargetNotFound,
                format!("target {} {} not found", kind, target.name),
            );
        }

        let target = TargetId::of(&generic)?;
        let accepted =
            resolver::find_attached_policies::<P, C>(cluster, &target, Some(&[Reason::Accepted]))
                .await?;
        let is_self = |p: &P| p.name_any() == policy.name_any() && p.namespace() == policy.namespace();
        if let Some(other) = accepted.iter().find(|p| !is_self(p)) {
            return invalid(
                Reason::Conflicted,
                format!(
                    "{} {} is already accepted for {target}",
                    P::KIND,
                    other.name_any()
                ),
            );
        }

        Ok(Validation::Valid(()))
    }

    fn apply_status(&self, policy: &mut P, _: &(), outcome: &Outcome, now: DateTime<Utc>) -> bool {
        let generation = policy.meta().generation;
        let accepted = match outcome {
            Outcome::Accepted => {
                condition::new_condition(conditions::ACCEPTED, true, Reason::Accepted, "", generation, now)
            }
            Outcome::Rejected { reason, message } => {
                condition::new_condition(conditions::ACCEPTED, false, *reason, message, generation, now)
            }
            Outcome::Conflicted(message) => condition::new_condition(
                conditions::ACCEPTED,
                false,
                Reason::Conflicted,
                message,
                generation,
                now,
            ),
        };
        condition::merge(policy.conditions_mut(), accepted)
    }
}
