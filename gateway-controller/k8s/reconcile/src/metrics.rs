use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    reconciles: Family<ResultLabels, Counter>,
    duration: Family<KindLabels, Histogram>,
    stale_deletes: Family<KindLabels, Counter>,
}

/// Observes a single reconcile.
pub(crate) struct ReconcileObserver {
    start: time::Instant,
    kind: &'static str,
    metrics: ReconcileMetrics,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReconcileResult {
    Ok,
    Requeue,
    Rejected,
    Conflicted,
    Error,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct KindLabels {
    kind: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ResultLabels {
    kind: &'static str,
    result: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<ResultLabels, Counter>::default();
        reg.register(
            "reconciles",
            "Total number of reconciles by resource kind and result",
            reconciles.clone(),
        );

        let duration = Family::<KindLabels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.01, 0.1, 1.0, 10.0, 60.0].into_iter())
        });
        reg.register_with_unit(
            "reconcile_duration",
            "Histogram of reconcile durations",
            Unit::Seconds,
            duration.clone(),
        );

        let stale_deletes = Family::<KindLabels, Counter>::default();
        reg.register(
            "stale_remote_deletes",
            "Total number of remote resources deleted because their identity changed",
            stale_deletes.clone(),
        );

        Self {
            reconciles,
            duration,
            stale_deletes,
        }
    }

    pub(crate) fn observe(&self, kind: &'static str) -> ReconcileObserver {
        ReconcileObserver {
            start: time::Instant::now(),
            kind,
            metrics: self.clone(),
        }
    }

    pub(crate) fn stale_deleted(&self, kind: &'static str) {
        self.stale_deletes.get_or_create(&KindLabels { kind }).inc();
    }

    #[cfg(test)]
    pub(crate) fn reconciles(&self, kind: &'static str, result: ReconcileResult) -> u64 {
        self.reconciles
            .get_or_create(&ResultLabels {
                kind,
                result: result.as_str(),
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn stale_deletes(&self, kind: &'static str) -> u64 {
        self.stale_deletes.get_or_create(&KindLabels { kind }).get()
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::register(&mut Registry::default())
    }
}

// === impl ReconcileObserver ===

impl ReconcileObserver {
    pub(crate) fn end(self, result: ReconcileResult) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.metrics
            .duration
            .get_or_create(&KindLabels { kind: self.kind })
            .observe(elapsed);
        self.metrics
            .reconciles
            .get_or_create(&ResultLabels {
                kind: self.kind,
                result: result.as_str(),
            })
            .inc();
    }
}

// === impl ReconcileResult ===

impl ReconcileResult {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Requeue => "requeue",
            Self::Rejected => "rejected",
            Self::Conflicted => "conflicted",
            Self::Error => "error",
        }
    }
}
