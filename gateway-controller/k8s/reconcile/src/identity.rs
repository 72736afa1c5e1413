//! Remote identities recorded on source objects.
//!
//! After a successful deploy, the id of every remote resource is recorded in
//! an annotation keyed by `<Kind>/<logical name>`. Comparing the recorded map
//! against a newly built stack reveals remote resources whose identity
//! changed or which are no longer desired.

use appnet_gateway_controller_core::{
    stack::{parse_identity_key, ResourceUid},
    Stack,
};
use appnet_gateway_controller_k8s_api::ObjectMeta;
use std::collections::BTreeMap;

pub const ANNOTATION: &str = "application-networking.k8s.aws/remote-identities";

pub type Identities = BTreeMap<String, String>;

/// Reads the identities recorded on an object.
///
/// A malformed annotation is treated as empty, so nothing is cleaned up on
/// its behalf.
pub fn recorded(meta: &ObjectMeta) -> Identities {
    let Some(value) = annotation(meta) else {
        return Identities::new();
    };
    match serde_json::from_str(value) {
        Ok(ids) => ids,
        Err(error) => {
            tracing::warn!(%error, "Ignoring malformed remote identity annotation");
            Identities::new()
        }
    }
}

/// Records `ids` on the object, returning whether the annotation changed.
///
/// A malformed annotation is always rewritten, or removed when `ids` is
/// empty.
pub fn record(meta: &mut ObjectMeta, ids: &Identities) -> bool {
    let unchanged = match annotation(meta) {
        Some(value) => serde_json::from_str::<Identities>(value)
            .map_or(false, |current| current == *ids),
        None => ids.is_empty(),
    };
    if unchanged {
        return false;
    }
    if ids.is_empty() {
        if let Some(annotations) = meta.annotations.as_mut() {
            annotations.remove(ANNOTATION);
        }
        return true;
    }
    let value = match serde_json::to_string(ids) {
        Ok(value) => value,
        Err(error) => {
            tracing::error!(%error, "Failed to encode remote identities");
            return false;
        }
    };
    meta.annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION.to_string(), value);
    true
}

fn annotation(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION))
        .map(String::as_str)
}

/// Lists recorded remote resources that `stack` no longer describes with the
/// same id, in teardown order.
pub fn stale(recorded: &Identities, stack: &Stack) -> Vec<ResourceUid> {
    let desired = stack.identities();
    let uids = recorded
        .iter()
        .filter(|(key, id)| desired.get(*key) != Some(*id))
        .filter_map(|(key, id)| to_uid(key, id))
        .collect();
    teardown_order(uids)
}

/// Lists every recorded remote resource in teardown order.
pub fn all(recorded: &Identities) -> Vec<ResourceUid> {
    let uids = recorded
        .iter()
        .filter_map(|(key, id)| to_uid(key, id))
        .collect();
    teardown_order(uids)
}

/// Dependers are deleted before the resources they depend on.
fn teardown_order(mut uids: Vec<ResourceUid>) -> Vec<ResourceUid> {
    uids.sort_by_key(|uid| uid.kind.teardown_rank());
    uids
}

fn to_uid(key: &str, id: &str) -> Option<ResourceUid> {
    match parse_identity_key(key) {
        Ok((kind, _)) => Some(ResourceUid::new(kind, id)),
        Err(error) => {
            tracing::warn!(%key, %error, "Ignoring unknown recorded identity");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appnet_gateway_controller_core::{Kind, Resource, StackId};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct TargetGroup {
        id: String,
        name: String,
    }

    impl Resource for TargetGroup {
        const KIND: Kind = Kind::TargetGroup;

        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn stack(groups: &[(&str, &str)]) -> Stack {
        let mut stack = Stack::new(StackId::new("apps", "echo"));
        for (name, id) in groups {
            stack
                .add_resource(TargetGroup {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .unwrap();
        }
        stack
    }

    #[test]
    fn round_trips_through_metadata() {
        let mut meta = ObjectMeta::default();
        assert!(recorded(&meta).is_empty());

        let ids = btreemap! {
            "TargetGroup/apps/echo:80".to_string() => "id-1".to_string(),
        };
        assert!(record(&mut meta, &ids));
        assert!(!record(&mut meta, &ids));
        assert_eq!(recorded(&meta), ids);

        assert!(record(&mut meta, &Identities::new()));
        assert!(annotation(&meta).is_none());
        assert!(!record(&mut meta, &Identities::new()));
    }

    #[test]
    fn malformed_annotation_is_empty() {
        let meta = ObjectMeta {
            annotations: Some(btreemap! { ANNOTATION.to_string() => "{not json".to_string() }),
            ..Default::default()
        };
        assert!(recorded(&meta).is_empty());
    }

    #[test]
    fn malformed_annotation_is_replaced() {
        let malformed = || ObjectMeta {
            annotations: Some(btreemap! { ANNOTATION.to_string() => "{not json".to_string() }),
            ..Default::default()
        };

        let mut meta = malformed();
        assert!(record(&mut meta, &Identities::new()));
        assert!(annotation(&meta).is_none());

        let mut meta = malformed();
        let ids = btreemap! { "Service/apps/echo".to_string() => "id-1".to_string() };
        assert!(record(&mut meta, &ids));
        assert_eq!(recorded(&meta), ids);
    }

    #[test]
    fn dependers_are_torn_down_first() {
        let recorded = btreemap! {
            "Listener/apps/echo:80".to_string() => "id-listener".to_string(),
            "Rule/apps/echo:80/rule-0".to_string() => "id-rule".to_string(),
            "Service/apps/echo".to_string() => "id-svc".to_string(),
            "ServiceNetworkServiceAssociation/apps/echo->apps/gw".to_string() => "id-assoc".to_string(),
            "TargetGroup/apps/echo".to_string() => "id-tg".to_string(),
            "Targets/apps/echo".to_string() => "id-targets".to_string(),
        };
        let kinds = all(&recorded).into_iter().map(|uid| uid.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                Kind::Rule,
                Kind::Targets,
                Kind::ServiceNetworkServiceAssociation,
                Kind::Listener,
                Kind::TargetGroup,
                Kind::Service,
            ]
        );
    }

    #[test]
    fn changed_and_vanished_ids_are_stale() {
        let recorded = btreemap! {
            "TargetGroup/a".to_string() => "id-a1".to_string(),
            "TargetGroup/b".to_string() => "id-b".to_string(),
            "TargetGroup/c".to_string() => "id-c".to_string(),
            "Bogus/d".to_string() => "id-d".to_string(),
        };
        let desired = stack(&[("a", "id-a2"), ("b", "id-b"), ("e", "id-e")]);

        assert_eq!(
            stale(&recorded, &desired),
            vec![
                ResourceUid::new(Kind::TargetGroup, "id-a1"),
                ResourceUid::new(Kind::TargetGroup, "id-c"),
            ]
        );
        assert_eq!(all(&recorded).len(), 3);
    }
}
