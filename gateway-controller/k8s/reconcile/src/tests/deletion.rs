use super::*;
use crate::{finalizer, handler::ROUTE_FINALIZER, identity, reconcile::Error};
use kube::runtime::controller::Action;
use pretty_assertions::assert_eq;

async fn deployed_route() -> Harness<RouteHandler<HttpRoute>> {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    h.reconciler.reconcile("apps", "echo").await.unwrap();
    h.cluster.mark_deleted::<HttpRoute>("apps", "echo");
    h
}

#[tokio::test]
async fn finalizer_is_kept_until_teardown_succeeds() {
    let h = deployed_route().await;

    h.deployer
        .fail_delete(DeployError::Other(anyhow::anyhow!("access denied")));
    let error = h.reconciler.reconcile("apps", "echo").await.unwrap_err();
    assert!(matches!(error, Error::Deploy(_)), "{error}");

    let route = h
        .cluster
        .object::<HttpRoute>("apps", "echo")
        .expect("route must not be released");
    assert!(finalizer::has(&route, ROUTE_FINALIZER));
    assert!(h.deployer.deleted().is_empty());

    let action = h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(
        h.deployer.deleted(),
        vec![ResourceUid::new(Kind::TargetGroup, "id-tg-1")]
    );
    assert!(
        h.cluster.object::<HttpRoute>("apps", "echo").is_none(),
        "releasing the finalizer completes deletion"
    );
    assert_eq!(h.builder.intents().last(), Some(&Intent::Delete));
    assert_eq!(h.events.reasons().last().map(String::as_str), Some("Deleted"));
}

#[tokio::test]
async fn transient_teardown_failures_are_requeued() {
    let h = deployed_route().await;

    h.deployer
        .fail_deploy(DeployError::Retryable("throttled".to_string()));
    let action = h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(action, Action::requeue(Settings::DEFAULT_RETRY_DELAY));

    let route = h.cluster.object::<HttpRoute>("apps", "echo").unwrap();
    assert!(finalizer::has(&route, ROUTE_FINALIZER));
    assert_eq!(
        identity::recorded(&route.metadata).len(),
        1,
        "identities survive a failed teardown"
    );
}

#[tokio::test]
async fn remote_resources_already_gone_are_ignored() {
    let h = deployed_route().await;

    h.deployer
        .fail_deploy(DeployError::NotFound("service network".to_string()));
    h.deployer
        .fail_delete(DeployError::NotFound("target group".to_string()));
    h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert!(h.cluster.object::<HttpRoute>("apps", "echo").is_none());
}

#[tokio::test]
async fn objects_without_our_finalizer_are_ignored() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    h.cluster.mark_deleted::<HttpRoute>("apps", "echo");

    h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert!(h.builder.intents().is_empty());
    assert!(h.cluster.writes().is_empty());
}

#[tokio::test]
async fn recorded_resources_are_deleted_dependers_first() {
    let h = route_harness();
    let mut route = http_route("apps", "echo", &["gw"], vec![backend("echo")]);
    route.metadata.finalizers = Some(vec![ROUTE_FINALIZER.to_string()]);
    identity::record(
        &mut route.metadata,
        &maplit::btreemap! {
            "Listener/apps/echo:80".to_string() => "id-listener".to_string(),
            "Rule/apps/echo:80/rule-0".to_string() => "id-rule".to_string(),
            "Service/apps/echo".to_string() => "id-svc".to_string(),
            "ServiceNetworkServiceAssociation/apps/echo->apps/gw".to_string() => "id-assoc".to_string(),
            "TargetGroup/apps/echo".to_string() => "id-tg".to_string(),
            "Targets/apps/echo".to_string() => "id-targets".to_string(),
        },
    );
    h.cluster.insert(route);
    h.cluster.mark_deleted::<HttpRoute>("apps", "echo");

    h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert_eq!(
        h.deployer.deleted(),
        vec![
            ResourceUid::new(Kind::Rule, "id-rule"),
            ResourceUid::new(Kind::Targets, "id-targets"),
            ResourceUid::new(Kind::ServiceNetworkServiceAssociation, "id-assoc"),
            ResourceUid::new(Kind::Listener, "id-listener"),
            ResourceUid::new(Kind::TargetGroup, "id-tg"),
            ResourceUid::new(Kind::Service, "id-svc"),
        ]
    );
    assert!(h.cluster.object::<HttpRoute>("apps", "echo").is_none());
}
