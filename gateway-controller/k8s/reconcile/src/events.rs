use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// An event about a reconciled object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEvent {
    pub kind: EventKind,
    pub reason: String,
    pub note: String,
    pub action: &'static str,
}

/// Publishes events about reconciled objects.
///
/// Publishing is best-effort: failures are logged and never fail a reconcile.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, reference: ObjectReference, event: ObjectEvent);
}

/// Publishes events to the Kubernetes API.
#[derive(Clone)]
pub struct KubeEvents {
    client: kube::Client,
    reporter: Reporter,
}

/// Discards all events.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoEvents;

// === impl ObjectEvent ===

impl ObjectEvent {
    pub fn normal(action: &'static str, reason: impl ToString, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Normal,
            reason: reason.to_string(),
            note: note.into(),
            action,
        }
    }

    pub fn warning(action: &'static str, reason: impl ToString, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Warning,
            reason: reason.to_string(),
            note: note.into(),
            action,
        }
    }
}

// === impl KubeEvents ===

impl KubeEvents {
    pub fn new(client: kube::Client, controller: impl Into<String>) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller.into(),
                instance: std::env::var("HOSTNAME").ok(),
            },
        }
    }
}

impl std::fmt::Debug for KubeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEvents")
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEvents {
    async fn publish(&self, reference: ObjectReference, event: ObjectEvent) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), reference);
        let type_ = match event.kind {
            EventKind::Normal => EventType::Normal,
            EventKind::Warning => EventType::Warning,
        };
        let reason = event.reason.clone();
        if let Err(error) = recorder
            .publish(Event {
                type_,
                reason: event.reason,
                note: Some(event.note),
                action: event.action.to_string(),
                secondary: None,
            })
            .await
        {
            tracing::warn!(%error, %reason, "Failed to publish event");
        }
    }
}

#[async_trait::async_trait]
impl EventSink for NoEvents {
    async fn publish(&self, _: ObjectReference, _: ObjectEvent) {}
}
