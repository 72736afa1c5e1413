use super::*;
use crate::{identity, metrics::ReconcileResult, reconcile::Error};
use appnet_gateway_controller_core::StackError;
use kube::runtime::controller::Action;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn recorded(cluster: &FakeCluster) -> identity::Identities {
    let route = cluster.object::<HttpRoute>("apps", "echo").unwrap();
    identity::recorded(&route.metadata)
}

async fn accepted_route() -> Harness<RouteHandler<HttpRoute>> {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    h.reconciler.reconcile("apps", "echo").await.unwrap();
    h
}

#[tokio::test]
async fn changed_identity_replaces_remote_resource() {
    let h = accepted_route().await;
    assert_eq!(
        recorded(&h.cluster),
        btreemap! { "TargetGroup/apps/echo:8080".to_string() => "id-tg-1".to_string() }
    );

    h.builder.set_groups(&[("apps/echo:8080", "id-tg-2")]);
    h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert_eq!(
        h.deployer.deleted(),
        vec![ResourceUid::new(Kind::TargetGroup, "id-tg-1")]
    );
    assert_eq!(
        recorded(&h.cluster),
        btreemap! { "TargetGroup/apps/echo:8080".to_string() => "id-tg-2".to_string() }
    );
    assert_eq!(h.metrics.stale_deletes("HTTPRoute"), 1);
}

#[tokio::test]
async fn vanished_resources_are_deleted() {
    let h = accepted_route().await;

    h.builder.set_groups(&[]);
    h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert_eq!(
        h.deployer.deleted(),
        vec![ResourceUid::new(Kind::TargetGroup, "id-tg-1")]
    );
    assert!(recorded(&h.cluster).is_empty());
}

#[tokio::test]
async fn failed_stale_delete_keeps_the_old_record() {
    let h = accepted_route().await;

    h.builder.set_groups(&[("apps/echo:8080", "id-tg-2")]);
    h.deployer
        .fail_delete(DeployError::Retryable("throttled".to_string()));
    let action = h.reconciler.reconcile("apps", "echo").await.unwrap();

    assert_eq!(action, Action::requeue(Settings::DEFAULT_RETRY_DELAY));
    assert_eq!(
        recorded(&h.cluster).get("TargetGroup/apps/echo:8080"),
        Some(&"id-tg-1".to_string())
    );
    assert_eq!(h.metrics.reconciles("HTTPRoute", ReconcileResult::Requeue), 1);

    h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(
        recorded(&h.cluster).get("TargetGroup/apps/echo:8080"),
        Some(&"id-tg-2".to_string())
    );
}

#[tokio::test]
async fn remote_conflicts_are_reported_without_retry() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    h.deployer.fail_deploy(DeployError::Conflict(
        "service is owned by another account".to_string(),
    ));

    let action = h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(action, Action::await_change());

    let route = h.cluster.object::<HttpRoute>("apps", "echo").unwrap();
    let accepted = find_condition(
        &route.status.as_ref().unwrap().parents()[0].conditions,
        crate::conditions::ACCEPTED,
    );
    assert_eq!(accepted.status, "False");
    assert_eq!(accepted.reason, "Conflicted");
    assert_eq!(h.events.reasons(), vec!["Conflicted".to_string()]);
    assert_eq!(
        h.metrics.reconciles("HTTPRoute", ReconcileResult::Conflicted),
        1
    );
    assert!(recorded(&h.cluster).is_empty(), "nothing was deployed");
}

#[tokio::test]
async fn transient_deploy_failures_are_requeued() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    h.deployer
        .fail_deploy(DeployError::Retryable("throttled".to_string()));

    let action = h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(action, Action::requeue(Settings::DEFAULT_RETRY_DELAY));
    assert_eq!(h.cluster.status_writes(), 0);
}

#[tokio::test]
async fn builder_failures_are_errors() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));

    h.builder.fail_with(StackError::SelfDependency(ResourceUid::new(
        Kind::Listener,
        "id-l",
    )));
    let error = h.reconciler.reconcile("apps", "echo").await.unwrap_err();
    assert!(matches!(error, Error::Stack(StackError::SelfDependency(_))), "{error}");

    h.builder.fail_with(anyhow::anyhow!("no service network"));
    let error = h.reconciler.reconcile("apps", "echo").await.unwrap_err();
    assert!(matches!(error, Error::Build(_)), "{error}");
    assert_eq!(h.metrics.reconciles("HTTPRoute", ReconcileResult::Error), 2);
}

#[tokio::test]
async fn stale_writes_are_retried_immediately() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));

    h.cluster.conflict_next_write();
    let error = h.reconciler.reconcile("apps", "echo").await.unwrap_err();
    assert!(error.is_stale(), "{error}");
    assert_eq!(
        h.reconciler.error_action("apps", "echo", &error),
        Action::requeue(Duration::ZERO)
    );

    h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(h.cluster.status_writes(), 1);
}

#[tokio::test]
async fn writes_require_the_current_version() {
    let h = accepted_route().await;
    let route = h.cluster.object::<HttpRoute>("apps", "echo").unwrap();

    h.cluster.touch::<HttpRoute>("apps", "echo");
    let error = h.cluster.replace_status(&route).await.unwrap_err();
    assert!(error.is_stale(), "{error}");
}

#[tokio::test]
async fn failures_back_off_until_success() {
    let h = route_harness();
    h.cluster
        .insert(http_route("apps", "echo", &["gw"], vec![backend("echo")]));
    let error = Error::Deploy(DeployError::Other(anyhow::anyhow!("boom")));

    let delays = (0..3)
        .map(|_| h.reconciler.error_action("apps", "echo", &error))
        .collect::<Vec<_>>();
    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(10)),
            Action::requeue(Duration::from_secs(20)),
        ]
    );

    h.reconciler.reconcile("apps", "echo").await.unwrap();
    assert_eq!(
        h.reconciler.error_action("apps", "echo", &error),
        Action::requeue(Duration::from_secs(5)),
        "a successful reconcile resets the backoff"
    );
}
