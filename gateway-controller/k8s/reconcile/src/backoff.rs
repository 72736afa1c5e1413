use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use std::time::Duration;

/// Tracks consecutive failures per object to compute exponential retry
/// delays.
#[derive(Debug)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

// === impl Backoff ===

impl Backoff {
    pub const DEFAULT_MIN: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(5 * 60);

    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            failures: Default::default(),
        }
    }

    /// Records a failure and returns the delay before the next attempt.
    pub fn next(&self, key: &ObjectKey) -> Duration {
        let failures = {
            let mut failures = self.failures.lock();
            let n = failures.entry(key.clone()).or_default();
            *n = n.saturating_add(1);
            *n
        };
        let factor = 2u32.saturating_pow(failures - 1);
        self.min.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&self, key: &ObjectKey) {
        self.failures.lock().remove(key);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }
}

// === impl ObjectKey ===

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_until_capped() {
        let backoff = Backoff::default();
        let key = ObjectKey::new("apps", "echo");
        let delays = (0..8).map(|_| backoff.next(&key).as_secs()).collect::<Vec<_>>();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);
    }

    #[test]
    fn reset_starts_over() {
        let backoff = Backoff::default();
        let key = ObjectKey::new("apps", "echo");
        backoff.next(&key);
        backoff.next(&key);
        backoff.reset(&key);
        assert_eq!(backoff.next(&key), Backoff::DEFAULT_MIN);
    }

    #[test]
    fn objects_are_tracked_independently() {
        let backoff = Backoff::default();
        let a = ObjectKey::new("apps", "a");
        let b = ObjectKey::new("apps", "b");
        backoff.next(&a);
        backoff.next(&a);
        assert_eq!(backoff.next(&b), Backoff::DEFAULT_MIN);
    }

    #[test]
    fn survives_many_failures() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let key = ObjectKey::new("apps", "echo");
        for _ in 0..100 {
            assert!(backoff.next(&key) <= Duration::from_secs(60));
        }
    }
}
