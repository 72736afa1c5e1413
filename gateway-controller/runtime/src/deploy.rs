use crate::core::{DeployError, ResourceUid, Stack, StackDeployer};

/// Walks each stack in dependency order and logs the remote calls it would
/// make, without contacting the remote control plane.
#[derive(Clone, Debug, Default)]
pub struct DryRunDeployer(());

impl DryRunDeployer {
    pub fn new() -> Self {
        Self(())
    }
}

#[async_trait::async_trait]
impl StackDeployer for DryRunDeployer {
    async fn deploy(&self, stack: &Stack) -> Result<(), DeployError> {
        let id = stack.id();
        stack.traverse(|res| {
            tracing::info!(
                stack.namespace = %id.namespace,
                stack.name = %id.name,
                kind = %res.resource_kind(),
                name = %res.resource_name(),
                id = %res.resource_id(),
                "Apply",
            );
            Ok::<_, DeployError>(())
        })
    }

    async fn delete(&self, uid: &ResourceUid) -> Result<(), DeployError> {
        tracing::info!(kind = %uid.kind, id = %uid.id, "Delete");
        Ok(())
    }
}
