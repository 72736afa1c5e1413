//! The per-object reconciliation state machine.
//!
//! A [`Reconciler`] drives one source kind through fetch, validation, model
//! building, deployment, drift cleanup and status reporting. Kind-specific
//! behavior is supplied by a [`Handler`].

use crate::{
    backoff::{Backoff, ObjectKey},
    cluster::{Cluster, ClusterError, Object},
    conditions::Reason,
    events::{EventSink, ObjectEvent},
    finalizer, identity,
    metrics::{ReconcileMetrics, ReconcileResult},
    resolver::ResolveError,
};
use appnet_gateway_controller_core::{DeployError, Intent, ModelBuilder, Stack, StackDeployer, StackError};
use chrono::{DateTime, Utc};
use kube::{runtime::controller::Action, Resource, ResourceExt};
use std::{ops::ControlFlow, sync::Arc, time::Duration};

/// The outcome of validating an object before it is built.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation<A> {
    Valid(A),

    /// The object is invalid. Its status reports `reason`; nothing is built.
    Rejected {
        attachments: A,
        reason: Reason,
        message: String,
    },

    /// The object is not managed by this controller and is left untouched.
    Skip(String),
}

/// The result reported on an object's status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected { reason: Reason, message: String },
    Conflicted(String),
}

/// Kind-specific reconcile behavior.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    type Object: Object;

    /// State discovered during validation that status reporting needs.
    type Attachments: Send + Sync;

    const KIND: &'static str;
    const FINALIZER: &'static str;

    async fn validate<C: Cluster>(
        &self,
        cluster: &C,
        obj: &Self::Object,
    ) -> Result<Validation<Self::Attachments>, Error>;

    /// Applies `outcome` to the object's status, returning whether it changed.
    fn apply_status(
        &self,
        obj: &mut Self::Object,
        attachments: &Self::Attachments,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("failed to build model: {0}")]
    Build(#[source] anyhow::Error),

    /// The builder produced an inconsistent stack.
    #[error("invalid stack: {0}")]
    Stack(#[from] StackError),

    #[error("failed to deploy: {0}")]
    Deploy(#[source] DeployError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// Delay before retrying a transient deployment failure.
    pub retry_delay: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

pub struct Reconciler<C, H: Handler> {
    cluster: C,
    handler: H,
    builder: Arc<dyn ModelBuilder<H::Object>>,
    deployer: Arc<dyn StackDeployer>,
    events: Arc<dyn EventSink>,
    metrics: ReconcileMetrics,
    backoff: Backoff,
    retry_delay: Duration,
}

type Reconciled = (Action, ReconcileResult);

// === impl Error ===

impl Error {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Cluster(e) if e.is_stale())
    }
}

// === impl Settings ===

impl Settings {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            min_backoff: Backoff::DEFAULT_MIN,
            max_backoff: Backoff::DEFAULT_MAX,
        }
    }
}

// === impl Reconciler ===

impl<C: Cluster, H: Handler> Reconciler<C, H> {
    pub fn new(
        cluster: C,
        handler: H,
        builder: Arc<dyn ModelBuilder<H::Object>>,
        deployer: Arc<dyn StackDeployer>,
        events: Arc<dyn EventSink>,
        metrics: ReconcileMetrics,
        settings: Settings,
    ) -> Self {
        Self {
            cluster,
            handler,
            builder,
            deployer,
            events,
            metrics,
            backoff: Backoff::new(settings.min_backoff, settings.max_backoff),
            retry_delay: settings.retry_delay,
        }
    }

    /// Reconciles the named object, returning when it should next be
    /// reconciled.
    #[tracing::instrument(skip(self), fields(kind = H::KIND))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, Error> {
        let observer = self.metrics.observe(H::KIND);
        match self.reconcile_object(namespace, name).await {
            Ok((action, result)) => {
                self.backoff.reset(&ObjectKey::new(namespace, name));
                observer.end(result);
                Ok(action)
            }
            Err(error) => {
                observer.end(ReconcileResult::Error);
                Err(error)
            }
        }
    }

    /// Computes the retry delay after a failed reconcile.
    pub fn error_action(&self, namespace: &str, name: &str, error: &Error) -> Action {
        if error.is_stale() {
            tracing::debug!(%namespace, %name, "Object changed during reconcile; retrying");
            return Action::requeue(Duration::ZERO);
        }
        let delay = self.backoff.next(&ObjectKey::new(namespace, name));
        tracing::warn!(%namespace, %name, %error, ?delay, "Reconcile failed");
        Action::requeue(delay)
    }

    async fn reconcile_object(&self, namespace: &str, name: &str) -> Result<Reconciled, Error> {
        let Some(obj) = self.cluster.get::<H::Object>(namespace, name).await? else {
            tracing::debug!("Object no longer exists");
            return Ok(done(ReconcileResult::Ok));
        };

        if obj.meta().deletion_timestamp.is_some() {
            return self.finalize(obj).await;
        }

        // Validation runs before the finalizer is ensured: unmanaged objects
        // must never be written, and rejected objects own nothing remotely
        // until they first pass validation.
        let attachments = match self.handler.validate(&self.cluster, &obj).await? {
            Validation::Valid(attachments) => attachments,
            Validation::Skip(reason) => {
                tracing::debug!(%reason, "Skipping");
                return Ok(done(ReconcileResult::Ok));
            }
            Validation::Rejected {
                attachments,
                reason,
                message,
            } => {
                tracing::info!(%reason, %message, "Rejected");
                let outcome = Outcome::Rejected {
                    reason,
                    message: message.clone(),
                };
                let (obj, _) = self.write_status(obj, &attachments, &outcome).await?;
                self.publish(&obj, ObjectEvent::warning("Validate", reason, message))
                    .await;
                return Ok(done(ReconcileResult::Rejected));
            }
        };

        let obj = finalizer::ensure(&self.cluster, obj, H::FINALIZER).await?;
        let stack = self.build(&obj, Intent::Upsert).await?;

        if let Err(error) = self.deployer.deploy(&stack).await {
            match error {
                DeployError::Conflict(message) => {
                    tracing::info!(%message, "Remote resource is owned elsewhere");
                    let outcome = Outcome::Conflicted(message.clone());
                    let (obj, _) = self.write_status(obj, &attachments, &outcome).await?;
                    self.publish(&obj, ObjectEvent::warning("Deploy", Reason::Conflicted, message))
                        .await;
                    return Ok(done(ReconcileResult::Conflicted));
                }
                error => return self.retry_or_fail(error),
            }
        }

        let obj = match self.replace_drifted(obj, &stack).await? {
            ControlFlow::Continue(obj) => obj,
            ControlFlow::Break(reconciled) => return Ok(reconciled),
        };

        let (obj, changed) = self
            .write_status(obj, &attachments, &Outcome::Accepted)
            .await?;
        if changed {
            self.publish(
                &obj,
                ObjectEvent::normal("Deploy", Reason::Accepted, "Remote resources are up to date"),
            )
            .await;
        }
        tracing::debug!(resources = stack.len(), "Reconciled");
        Ok(done(ReconcileResult::Ok))
    }

    /// Tears down remote resources before releasing the finalizer.
    ///
    /// Any failure leaves the finalizer in place so that deletion is retried.
    async fn finalize(&self, obj: H::Object) -> Result<Reconciled, Error> {
        if !finalizer::has(&obj, H::FINALIZER) {
            return Ok(done(ReconcileResult::Ok));
        }

        let stack = self.build(&obj, Intent::Delete).await?;
        if let Err(error) = self.deployer.deploy(&stack).await {
            if !error.is_not_found() {
                return self.retry_or_fail(error);
            }
        }

        for uid in identity::all(&identity::recorded(obj.meta())) {
            if let Err(error) = self.deployer.delete(&uid).await {
                if !error.is_not_found() {
                    tracing::info!(%uid, %error, "Failed to delete remote resource");
                    return self.retry_or_fail(error);
                }
            }
        }

        let obj = finalizer::release(&self.cluster, obj, H::FINALIZER).await?;
        self.publish(
            &obj,
            ObjectEvent::normal("Delete", "Deleted", "Remote resources were deleted"),
        )
        .await;
        Ok(done(ReconcileResult::Ok))
    }

    /// Deletes remote resources recorded by earlier reconciles that the stack
    /// no longer describes, then records the stack's identities.
    ///
    /// The record is only updated once every stale resource is gone, so a
    /// failed delete is retried on the next reconcile.
    async fn replace_drifted(
        &self,
        mut obj: H::Object,
        stack: &Stack,
    ) -> Result<ControlFlow<Reconciled, H::Object>, Error> {
        let recorded = identity::recorded(obj.meta());
        for uid in identity::stale(&recorded, stack) {
            match self.deployer.delete(&uid).await {
                Ok(()) => {
                    tracing::info!(%uid, "Deleted stale remote resource");
                    self.metrics.stale_deleted(H::KIND);
                }
                Err(error) if error.is_not_found() => {
                    tracing::debug!(%uid, "Stale remote resource is already gone");
                }
                Err(error) => return self.retry_or_fail(error).map(ControlFlow::Break),
            }
        }

        if identity::record(obj.meta_mut(), &stack.identities()) {
            obj = self.cluster.replace(&obj).await?;
        }
        Ok(ControlFlow::Continue(obj))
    }

    async fn build(&self, obj: &H::Object, intent: Intent) -> Result<Stack, Error> {
        self.builder
            .build(obj, intent)
            .await
            .map_err(|error| match error.downcast::<StackError>() {
                Ok(error) => Error::Stack(error),
                Err(error) => Error::Build(error),
            })
    }

    fn retry_or_fail(&self, error: DeployError) -> Result<Reconciled, Error> {
        match error {
            DeployError::Retryable(_) | DeployError::Conflict(_) | DeployError::NotFound(_) => {
                tracing::info!(%error, delay = ?self.retry_delay, "Retrying");
                Ok((
                    Action::requeue(self.retry_delay),
                    ReconcileResult::Requeue,
                ))
            }
            DeployError::Stack(error) => Err(Error::Stack(error)),
            error => Err(Error::Deploy(error)),
        }
    }

    async fn write_status(
        &self,
        mut obj: H::Object,
        attachments: &H::Attachments,
        outcome: &Outcome,
    ) -> Result<(H::Object, bool), Error> {
        if !self
            .handler
            .apply_status(&mut obj, attachments, outcome, Utc::now())
        {
            return Ok((obj, false));
        }
        let obj = self.cluster.replace_status(&obj).await?;
        Ok((obj, true))
    }

    async fn publish(&self, obj: &H::Object, event: ObjectEvent) {
        self.events.publish(obj.object_ref(&()), event).await;
    }
}

impl<C, H: Handler> std::fmt::Debug for Reconciler<C, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &H::KIND)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

fn done(result: ReconcileResult) -> Reconciled {
    (Action::await_change(), result)
}

/// Reconciles an object on behalf of a [`kube::runtime::Controller`].
pub async fn reconcile<C: Cluster, H: Handler>(
    obj: Arc<H::Object>,
    ctx: Arc<Reconciler<C, H>>,
) -> Result<Action, Error> {
    let namespace = obj.namespace().unwrap_or_default();
    ctx.reconcile(&namespace, &obj.name_any()).await
}

/// Schedules a retry with exponential backoff after a failed reconcile.
pub fn error_policy<C: Cluster, H: Handler>(
    obj: Arc<H::Object>,
    error: &Error,
    ctx: Arc<Reconciler<C, H>>,
) -> Action {
    let namespace = obj.namespace().unwrap_or_default();
    ctx.error_action(&namespace, &obj.name_any(), error)
}
