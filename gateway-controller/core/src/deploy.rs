use crate::stack::{ResourceUid, Stack, StackError};
use thiserror::Error;

/// Whether a stack describes resources to create or to tear down.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    Upsert,
    Delete,
}

/// Maps a source object onto the remote resources it requires.
///
/// Builders must be pure with respect to the cluster: any lookups they need
/// are performed by the caller before `build` is invoked.
#[async_trait::async_trait]
pub trait ModelBuilder<S: Send + Sync>: Send + Sync {
    async fn build(&self, source: &S, intent: Intent) -> anyhow::Result<Stack>;
}

/// Applies a stack against the remote control plane.
#[async_trait::async_trait]
pub trait StackDeployer: Send + Sync {
    /// Applies every resource in dependency order.
    async fn deploy(&self, stack: &Stack) -> Result<(), DeployError>;

    /// Deletes a single remote resource that is no longer desired.
    async fn delete(&self, uid: &ResourceUid) -> Result<(), DeployError>;
}

#[derive(Debug, Error)]
pub enum DeployError {
    /// Another owner holds the remote resource. Retrying cannot help.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A transient remote failure, such as throttling or a dependency that
    /// has not converged yet.
    #[error("retryable: {0}")]
    Retryable(String),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// === impl DeployError ===

impl DeployError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors that resolve on their own and warrant a fixed-delay retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Retryable(_) | Self::NotFound(_))
    }
}
