//! In-memory fakes for driving reconcilers without a cluster or a remote
//! control plane.

mod deletion;
mod drift;

use crate::{
    cluster::{Cluster, ClusterError, Object},
    events::{EventSink, ObjectEvent},
    handler::{GatewayHandler, RouteHandler},
    metrics::ReconcileMetrics,
    reconcile::{Handler, Reconciler, Settings},
};
use ahash::AHashSet as HashSet;
use appnet_gateway_controller_core::{
    DeployError, Intent, Kind, ModelBuilder, Resource as StackResourceKind, ResourceUid, Stack,
    StackDeployer, StackId,
};
use appnet_gateway_controller_k8s_api::{
    gateway::Listener,
    route::{BackendRef, HttpRouteRule, HttpRouteSpec, ParentReference},
    Condition, Gateway, GatewaySpec, HttpRoute, ObjectMeta, Resource, ResourceExt, Service,
    ServiceSpec,
};
use k8s_openapi::api::core::v1::ObjectReference;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

const GATEWAY_CLASS: &str = "amazon-vpc-lattice";

type Key = (String, String, String);

/// Stores objects as JSON, enforcing `resourceVersion` preconditions on
/// writes like the API server does.
#[derive(Clone, Default)]
struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

#[derive(Default)]
struct ClusterState {
    objects: BTreeMap<Key, serde_json::Value>,
    uninstalled: HashSet<String>,
    writes: Vec<Write>,
    version: u64,
    conflict_next_write: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Write {
    kind: String,
    name: String,
    status: bool,
}

#[derive(Debug)]
struct TargetGroup {
    id: String,
    name: String,
}

/// Builds a stack of target groups from a script.
#[derive(Default)]
struct ScriptedBuilder {
    groups: Mutex<Vec<(String, String)>>,
    fail: Mutex<Option<anyhow::Error>>,
    intents: Mutex<Vec<Intent>>,
}

/// Records deployments and deletions, failing them as scripted.
#[derive(Default)]
struct RecordingDeployer {
    deploy_errors: Mutex<VecDeque<DeployError>>,
    delete_errors: Mutex<VecDeque<DeployError>>,
    deployed: Mutex<Vec<Vec<ResourceUid>>>,
    deleted: Mutex<Vec<ResourceUid>>,
}

#[derive(Default)]
struct RecordingEvents {
    events: Mutex<Vec<(String, ObjectEvent)>>,
}

struct Harness<H: Handler> {
    cluster: FakeCluster,
    builder: Arc<ScriptedBuilder>,
    deployer: Arc<RecordingDeployer>,
    events: Arc<RecordingEvents>,
    metrics: ReconcileMetrics,
    reconciler: Reconciler<FakeCluster, H>,
}

// === impl FakeCluster ===

impl FakeCluster {
    fn key<K: Object>(namespace: &str, name: &str) -> Key {
        (K::kind(&()).to_string(), namespace.to_string(), name.to_string())
    }

    /// Stores an object without recording a write.
    fn insert<K: Object>(&self, obj: K) {
        let mut state = self.state.lock();
        state.version += 1;
        let mut value = serde_json::to_value(&obj).expect("object must serialize");
        value["metadata"]["resourceVersion"] = state.version.to_string().into();
        let key = Self::key::<K>(&obj.namespace().unwrap_or_default(), &obj.name_any());
        state.objects.insert(key, value);
    }

    fn object<K: Object>(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.state.lock();
        state
            .objects
            .get(&Self::key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).expect("object must deserialize"))
    }

    /// Simulates a concurrent update by bumping an object's version.
    fn touch<K: Object>(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock();
        state.version += 1;
        let version = state.version.to_string();
        if let Some(value) = state.objects.get_mut(&Self::key::<K>(namespace, name)) {
            value["metadata"]["resourceVersion"] = version.into();
        }
    }

    /// Marks an object as deleted. It is removed once its finalizers are.
    fn mark_deleted<K: Object>(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock();
        if let Some(value) = state.objects.get_mut(&Self::key::<K>(namespace, name)) {
            value["metadata"]["deletionTimestamp"] = "2026-01-01T00:00:00Z".into();
        }
    }

    /// Fails the next write as if the object changed concurrently.
    fn conflict_next_write(&self) {
        self.state.lock().conflict_next_write = true;
    }

    fn uninstall<K: Object>(&self) {
        self.state.lock().uninstalled.insert(K::kind(&()).to_string());
    }

    fn writes(&self) -> Vec<Write> {
        self.state.lock().writes.clone()
    }

    fn status_writes(&self) -> usize {
        self.writes().iter().filter(|w| w.status).count()
    }

    fn write<K: Object>(
        &self,
        obj: &K,
        status: bool,
        update: impl FnOnce(&mut serde_json::Value, serde_json::Value),
    ) -> Result<K, ClusterError> {
        let mut state = self.state.lock();
        let namespace = obj.namespace().unwrap_or_default();
        let key = Self::key::<K>(&namespace, &obj.name_any());
        let Some(stored) = state.objects.get(&key).cloned() else {
            return Err(ClusterError::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} not found", obj.name_any()),
                reason: "NotFound".to_string(),
                code: 404,
            })));
        };
        let conflict = std::mem::take(&mut state.conflict_next_write);
        if conflict
            || stored["metadata"]["resourceVersion"].as_str() != obj.resource_version().as_deref()
        {
            return Err(ClusterError::Stale {
                kind: key.0,
                namespace,
                name: key.2,
            });
        }

        let mut value = stored;
        update(&mut value, serde_json::to_value(obj).expect("object must serialize"));
        state.version += 1;
        value["metadata"]["resourceVersion"] = state.version.to_string().into();
        state.writes.push(Write {
            kind: key.0.clone(),
            name: key.2.clone(),
            status,
        });

        let finalized = value["metadata"].get("deletionTimestamp").is_some()
            && value["metadata"]["finalizers"]
                .as_array()
                .map_or(true, |f| f.is_empty());
        if finalized {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, value.clone());
        }
        Ok(serde_json::from_value(value).expect("object must deserialize"))
    }
}

#[async_trait::async_trait]
impl Cluster for FakeCluster {
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError> {
        if self.state.lock().uninstalled.contains(&*K::kind(&())) {
            return Ok(None);
        }
        Ok(self.object(namespace, name))
    }

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>, ClusterError> {
        let kind = K::kind(&()).to_string();
        let state = self.state.lock();
        if state.uninstalled.contains(&kind) {
            return Err(ClusterError::KindNotInstalled(kind));
        }
        Ok(state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).expect("object must deserialize"))
            .collect())
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K, ClusterError> {
        self.write(obj, false, |stored, mut new| {
            match stored.get("status").cloned() {
                Some(status) => new["status"] = status,
                None => {
                    if let Some(new) = new.as_object_mut() {
                        new.remove("status");
                    }
                }
            }
            *stored = new;
        })
    }

    async fn replace_status<K: Object>(&self, obj: &K) -> Result<K, ClusterError> {
        self.write(obj, true, |stored, new| {
            stored["status"] = new.get("status").cloned().unwrap_or_default();
        })
    }
}

// === impl TargetGroup ===

impl StackResourceKind for TargetGroup {
    const KIND: Kind = Kind::TargetGroup;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// === impl ScriptedBuilder ===

impl ScriptedBuilder {
    fn with_groups(groups: &[(&str, &str)]) -> Self {
        let builder = Self::default();
        builder.set_groups(groups);
        builder
    }

    fn set_groups(&self, groups: &[(&str, &str)]) {
        *self.groups.lock() = groups
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect();
    }

    fn fail_with(&self, error: impl Into<anyhow::Error>) {
        *self.fail.lock() = Some(error.into());
    }

    fn intents(&self) -> Vec<Intent> {
        self.intents.lock().clone()
    }
}

#[async_trait::async_trait]
impl<S> ModelBuilder<S> for ScriptedBuilder
where
    S: Resource<DynamicType = ()> + Send + Sync,
{
    async fn build(&self, source: &S, intent: Intent) -> anyhow::Result<Stack> {
        self.intents.lock().push(intent);
        if let Some(error) = self.fail.lock().take() {
            return Err(error);
        }

        let meta = source.meta();
        let mut stack = Stack::new(StackId::new(
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        ));
        if intent == Intent::Upsert {
            for (name, id) in self.groups.lock().iter() {
                stack.add_resource(TargetGroup {
                    id: id.clone(),
                    name: name.clone(),
                })?;
            }
        }
        Ok(stack)
    }
}

// === impl RecordingDeployer ===

impl RecordingDeployer {
    fn fail_deploy(&self, error: DeployError) {
        self.deploy_errors.lock().push_back(error);
    }

    fn fail_delete(&self, error: DeployError) {
        self.delete_errors.lock().push_back(error);
    }

    fn deployed(&self) -> Vec<Vec<ResourceUid>> {
        self.deployed.lock().clone()
    }

    fn deleted(&self) -> Vec<ResourceUid> {
        self.deleted.lock().clone()
    }
}

#[async_trait::async_trait]
impl StackDeployer for RecordingDeployer {
    async fn deploy(&self, stack: &Stack) -> Result<(), DeployError> {
        if let Some(error) = self.deploy_errors.lock().pop_front() {
            return Err(error);
        }
        let order = stack.topological_order()?;
        self.deployed
            .lock()
            .push(order.into_iter().map(|r| r.uid()).collect());
        Ok(())
    }

    async fn delete(&self, uid: &ResourceUid) -> Result<(), DeployError> {
        if let Some(error) = self.delete_errors.lock().pop_front() {
            return Err(error);
        }
        self.deleted.lock().push(uid.clone());
        Ok(())
    }
}

// === impl RecordingEvents ===

impl RecordingEvents {
    fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|(_, e)| e.reason.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingEvents {
    async fn publish(&self, reference: ObjectReference, event: ObjectEvent) {
        self.events
            .lock()
            .push((reference.name.unwrap_or_default(), event));
    }
}

// === impl Harness ===

impl<H: Handler> Harness<H> {
    fn new(handler: H, builder: ScriptedBuilder) -> Self {
        let cluster = FakeCluster::default();
        let builder = Arc::new(builder);
        let deployer = Arc::new(RecordingDeployer::default());
        let events = Arc::new(RecordingEvents::default());
        let metrics = ReconcileMetrics::default();
        let reconciler = Reconciler::new(
            cluster.clone(),
            handler,
            builder.clone(),
            deployer.clone(),
            events.clone(),
            metrics.clone(),
            Settings::default(),
        );
        Self {
            cluster,
            builder,
            deployer,
            events,
            metrics,
            reconciler,
        }
    }
}

fn route_harness() -> Harness<RouteHandler<HttpRoute>> {
    let harness = Harness::new(
        RouteHandler::new(GATEWAY_CLASS),
        ScriptedBuilder::with_groups(&[("apps/echo:8080", "id-tg-1")]),
    );
    harness.cluster.insert(gateway("apps", "gw", GATEWAY_CLASS));
    harness.cluster.insert(service("apps", "echo"));
    harness
}

fn gateway_harness() -> Harness<GatewayHandler> {
    Harness::new(
        GatewayHandler::new(GATEWAY_CLASS),
        ScriptedBuilder::with_groups(&[("apps/gw", "id-sn-1")]),
    )
}

// === fixtures ===

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        generation: Some(1),
        ..Default::default()
    }
}

fn gateway(namespace: &str, name: &str, class: &str) -> Gateway {
    Gateway {
        metadata: meta(namespace, name),
        spec: GatewaySpec {
            gateway_class_name: class.to_string(),
            listeners: vec![Listener {
                name: "http".to_string(),
                hostname: None,
                port: 80,
                protocol: "HTTP".to_string(),
            }],
        },
        status: None,
    }
}

fn service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: meta(namespace, name),
        spec: Some(ServiceSpec {
            ip_families: Some(vec!["IPv4".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn parent(name: &str) -> ParentReference {
    ParentReference {
        name: name.to_string(),
        ..Default::default()
    }
}

fn backend(name: &str) -> BackendRef {
    BackendRef {
        name: name.to_string(),
        port: Some(8080),
        ..Default::default()
    }
}

fn http_route(namespace: &str, name: &str, parents: &[&str], backends: Vec<BackendRef>) -> HttpRoute {
    HttpRoute {
        metadata: meta(namespace, name),
        spec: HttpRouteSpec {
            parent_refs: Some(parents.iter().map(|p| parent(p)).collect()),
            hostnames: None,
            rules: Some(vec![HttpRouteRule {
                matches: None,
                backend_refs: Some(backends),
            }]),
        },
        status: None,
    }
}

fn find_condition<'c>(conditions: &'c [Condition], type_: &str) -> &'c Condition {
    conditions
        .iter()
        .find(|c| c.type_ == type_)
        .unwrap_or_else(|| panic!("missing {type_} condition in {conditions:?}"))
}
