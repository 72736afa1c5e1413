use crate::{GroupKind, TargetKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifies the resource a policy attaches to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    /// The empty string names the core API group.
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TargetRef {
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.as_str(), self.kind.as_str())
    }

    /// Checks whether the reference names the given kind of target.
    pub fn targets_kind(&self, kind: TargetKind) -> bool {
        self.group_kind() == kind.group_kind()
    }

    /// The namespace of the target, defaulting to the policy's own.
    pub fn effective_namespace<'a>(&'a self, policy_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(policy_namespace)
    }

    /// Checks whether `resource` is the referenced target.
    pub fn targets<T>(&self, resource: &T, policy_namespace: &str) -> bool
    where
        T: kube::Resource<DynamicType = ()>,
    {
        if self.group_kind() != GroupKind::of::<T>() {
            return false;
        }
        let meta = resource.meta();
        meta.namespace.as_deref() == Some(self.effective_namespace(policy_namespace))
            && meta.name.as_deref() == Some(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Gateway, GatewaySpec, HttpRoute, ObjectMeta, Service};

    fn gateway(ns: &str, name: &str) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                gateway_class_name: "amazon-vpc-lattice".to_string(),
                listeners: vec![],
            },
            status: None,
        }
    }

    fn gateway_ref(namespace: Option<&str>) -> TargetRef {
        TargetRef {
            group: crate::GATEWAY_API_GROUP.to_string(),
            kind: "Gateway".to_string(),
            name: "gw".to_string(),
            namespace: namespace.map(Into::into),
        }
    }

    #[test]
    fn targets_gateway_in_policy_namespace() {
        let t = gateway_ref(None);
        assert!(t.targets_kind(TargetKind::Gateway));
        assert!(!t.targets_kind(TargetKind::HttpRoute));
        assert!(t.targets(&gateway("apps", "gw"), "apps"));
        assert!(!t.targets(&gateway("other", "gw"), "apps"));
        assert!(!t.targets(&gateway("apps", "gw2"), "apps"));
    }

    #[test]
    fn explicit_namespace_wins() {
        let t = gateway_ref(Some("infra"));
        assert_eq!(t.effective_namespace("apps"), "infra");
        assert!(t.targets(&gateway("infra", "gw"), "apps"));
        assert!(!t.targets(&gateway("apps", "gw"), "apps"));
    }

    #[test]
    fn kind_mismatch_never_targets() {
        let t = gateway_ref(None);
        let route = HttpRoute::new("gw", Default::default());
        assert!(!t.targets(&route, "apps"));
    }

    #[test]
    fn core_group_aliases() {
        for group in ["", "core"] {
            let t = TargetRef {
                group: group.to_string(),
                kind: "Service".to_string(),
                name: "echo".to_string(),
                namespace: None,
            };
            assert!(t.targets_kind(TargetKind::Service), "group {group:?}");
            assert_eq!(t.group_kind(), GroupKind::of::<Service>());
        }
    }
}
