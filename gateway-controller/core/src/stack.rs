//! The per-reconcile graph of desired remote resources.
//!
//! A [`Stack`] is built fresh by a model builder for one source object, handed
//! to a deployer, and dropped. Resources are keyed by `(kind, id)`; the
//! dependency graph orders them so that every dependee is applied before the
//! resources that depend on it.

use ahash::AHashMap as HashMap;
use indexmap::IndexMap;
use std::{
    any::Any,
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Remote resource kinds a stack may contain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    ServiceNetwork,
    ServiceNetworkVpcAssociation,
    Service,
    ServiceNetworkServiceAssociation,
    Listener,
    Rule,
    TargetGroup,
    Targets,
    AccessLogSubscription,
    AuthPolicy,
}

/// A typed unit of desired remote state.
pub trait Resource: Any + fmt::Debug + Send + Sync {
    const KIND: Kind;

    /// Identifies the resource within its kind, frequently content-derived.
    fn id(&self) -> &str;

    /// A logical name that survives content changes, used to correlate the
    /// resource with identities recorded by earlier reconciles.
    fn name(&self) -> &str;
}

/// Object-safe view of a [`Resource`] stored in a stack.
pub trait StackResource: fmt::Debug + Send + Sync {
    fn resource_kind(&self) -> Kind;
    fn resource_id(&self) -> &str;
    fn resource_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceUid {
    pub kind: Kind,
    pub id: String,
}

/// Names the source object a stack was built for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StackId {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug)]
pub struct Stack {
    id: StackId,
    resources: IndexMap<ResourceUid, Box<dyn StackResource>>,
    /// Dependee -> dependers.
    dependers: HashMap<ResourceUid, Vec<ResourceUid>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Dependee,
    Depender,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("resource {0} already exists in the stack")]
    DuplicateResource(ResourceUid),

    #[error("resource {0} not found in the stack")]
    NotFound(ResourceUid),

    #[error("resource {id:?} was requested as {requested} but is stored as {found}")]
    KindMismatch {
        id: String,
        requested: Kind,
        found: Kind,
    },

    #[error("{role} {uid} must be added to the stack before it can be linked")]
    MissingDependencyEndpoint { role: Endpoint, uid: ResourceUid },

    #[error("resource {0} cannot depend on itself")]
    SelfDependency(ResourceUid),

    #[error("dependency cycle detected among {} resources", remaining.len())]
    CycleDetected { remaining: Vec<ResourceUid> },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown resource kind {0:?}")]
pub struct UnknownKind(pub String);

// === impl Kind ===

impl Kind {
    pub const ALL: [Kind; 10] = [
        Kind::ServiceNetwork,
        Kind::ServiceNetworkVpcAssociation,
        Kind::Service,
        Kind::ServiceNetworkServiceAssociation,
        Kind::Listener,
        Kind::Rule,
        Kind::TargetGroup,
        Kind::Targets,
        Kind::AccessLogSubscription,
        Kind::AuthPolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceNetwork => "ServiceNetwork",
            Self::ServiceNetworkVpcAssociation => "ServiceNetworkVpcAssociation",
            Self::Service => "Service",
            Self::ServiceNetworkServiceAssociation => "ServiceNetworkServiceAssociation",
            Self::Listener => "Listener",
            Self::Rule => "Rule",
            Self::TargetGroup => "TargetGroup",
            Self::Targets => "Targets",
            Self::AccessLogSubscription => "AccessLogSubscription",
            Self::AuthPolicy => "AuthPolicy",
        }
    }

    /// Orders kinds for deletion: a kind is deleted before every kind it may
    /// depend on, so dependers never outlive their dependees.
    pub fn teardown_rank(&self) -> u8 {
        match self {
            Self::Rule => 0,
            Self::Targets => 1,
            Self::AccessLogSubscription => 2,
            Self::AuthPolicy => 3,
            Self::ServiceNetworkServiceAssociation => 4,
            Self::ServiceNetworkVpcAssociation => 5,
            Self::Listener => 6,
            Self::TargetGroup => 7,
            Self::Service => 8,
            Self::ServiceNetwork => 9,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

// === impl StackResource ===

impl<T: Resource> StackResource for T {
    fn resource_kind(&self) -> Kind {
        T::KIND
    }

    fn resource_id(&self) -> &str {
        self.id()
    }

    fn resource_name(&self) -> &str {
        self.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> dyn StackResource + 'a {
    pub fn uid(&self) -> ResourceUid {
        ResourceUid::new(self.resource_kind(), self.resource_id())
    }

    pub fn downcast_ref<T: Resource>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

// === impl ResourceUid ===

impl ResourceUid {
    pub fn new(kind: Kind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn of<T: Resource>(res: &T) -> Self {
        Self::new(T::KIND, res.id())
    }
}

impl fmt::Display for ResourceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

// === impl StackId ===

impl StackId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Endpoint ===

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependee => f.write_str("dependee"),
            Self::Depender => f.write_str("depender"),
        }
    }
}

// === impl Stack ===

impl Stack {
    pub fn new(id: StackId) -> Self {
        Self {
            id,
            resources: IndexMap::new(),
            dependers: HashMap::new(),
        }
    }

    pub fn id(&self) -> &StackId {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn add_resource<T: Resource>(&mut self, res: T) -> Result<ResourceUid, StackError> {
        let uid = ResourceUid::of(&res);
        if self.resources.contains_key(&uid) {
            return Err(StackError::DuplicateResource(uid));
        }
        self.resources.insert(uid.clone(), Box::new(res));
        Ok(uid)
    }

    /// Returns the resource of type `T` stored under `id`.
    ///
    /// Distinguishes a resource that is absent from one that exists under a
    /// different kind than the caller asked for.
    pub fn get_resource<T: Resource>(&self, id: &str) -> Result<&T, StackError> {
        let uid = ResourceUid::new(T::KIND, id);
        match self.resources.get(&uid) {
            Some(res) => res.downcast_ref::<T>().ok_or(StackError::KindMismatch {
                id: id.to_string(),
                requested: T::KIND,
                found: res.resource_kind(),
            }),
            None => match self.resources.keys().find(|uid| uid.id == id) {
                Some(other) => Err(StackError::KindMismatch {
                    id: id.to_string(),
                    requested: T::KIND,
                    found: other.kind,
                }),
                None => Err(StackError::NotFound(uid)),
            },
        }
    }

    pub fn get(&self, uid: &ResourceUid) -> Option<&dyn StackResource> {
        self.resources.get(uid).map(|res| res.as_ref())
    }

    /// Records that `depender` must be applied after `dependee`.
    ///
    /// Both endpoints must already be in the stack. Repeating an existing
    /// edge is a no-op.
    pub fn add_dependency(
        &mut self,
        dependee: &ResourceUid,
        depender: &ResourceUid,
    ) -> Result<(), StackError> {
        if !self.resources.contains_key(dependee) {
            return Err(StackError::MissingDependencyEndpoint {
                role: Endpoint::Dependee,
                uid: dependee.clone(),
            });
        }
        if !self.resources.contains_key(depender) {
            return Err(StackError::MissingDependencyEndpoint {
                role: Endpoint::Depender,
                uid: depender.clone(),
            });
        }
        if dependee == depender {
            return Err(StackError::SelfDependency(dependee.clone()));
        }

        let dependers = self.dependers.entry(dependee.clone()).or_default();
        if !dependers.contains(depender) {
            dependers.push(depender.clone());
        }
        Ok(())
    }

    /// Lists every resource of type `T` in insertion order.
    pub fn list_resources<T: Resource>(&self) -> Vec<&T> {
        self.resources
            .iter()
            .filter(|(uid, _)| uid.kind == T::KIND)
            .filter_map(|(_, res)| res.downcast_ref::<T>())
            .collect()
    }

    /// Iterates over all resources in insertion order.
    pub fn resources(&self) -> impl Iterator<Item = &dyn StackResource> + '_ {
        self.resources.values().map(|res| res.as_ref())
    }

    /// Orders all resources so that every dependee precedes its dependers.
    ///
    /// Resources without an ordering constraint between them keep their
    /// insertion order, so the result is deterministic for a given stack.
    pub fn topological_order(&self) -> Result<Vec<&dyn StackResource>, StackError> {
        let mut in_degree = vec![0usize; self.resources.len()];
        for dependers in self.dependers.values() {
            for depender in dependers {
                if let Some(idx) = self.resources.get_index_of(depender) {
                    in_degree[idx] += 1;
                }
            }
        }

        let mut ready = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(idx, _)| idx)
            .collect::<BTreeSet<_>>();

        let mut order = Vec::with_capacity(self.resources.len());
        while let Some(idx) = ready.pop_first() {
            let Some((uid, res)) = self.resources.get_index(idx) else {
                continue;
            };
            order.push(res.as_ref());

            for depender in self.dependers.get(uid).into_iter().flatten() {
                if let Some(didx) = self.resources.get_index_of(depender) {
                    in_degree[didx] -= 1;
                    if in_degree[didx] == 0 {
                        ready.insert(didx);
                    }
                }
            }
        }

        if order.len() != self.resources.len() {
            let remaining = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .filter_map(|(idx, _)| self.resources.get_index(idx))
                .map(|(uid, _)| uid.clone())
                .collect();
            return Err(StackError::CycleDetected { remaining });
        }

        Ok(order)
    }

    /// Visits every resource in topological order, stopping at the first
    /// error returned by `visit`.
    ///
    /// A cyclic stack fails before any resource is visited.
    pub fn traverse<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&dyn StackResource) -> Result<(), E>,
        E: From<StackError>,
    {
        for res in self.topological_order()? {
            visit(res)?;
        }
        Ok(())
    }

    /// Maps each resource's `Kind/name` to its id.
    ///
    /// Logical names are expected to be unique per kind; a later resource
    /// replaces an earlier one with the same key.
    pub fn identities(&self) -> BTreeMap<String, String> {
        self.resources
            .iter()
            .map(|(uid, res)| {
                (
                    identity_key(uid.kind, res.resource_name()),
                    uid.id.clone(),
                )
            })
            .collect()
    }
}

/// Formats the key under which a resource's identity is recorded.
pub fn identity_key(kind: Kind, name: &str) -> String {
    format!("{kind}/{name}")
}

/// Parses an identity key back into its kind and logical name.
pub fn parse_identity_key(key: &str) -> Result<(Kind, &str), UnknownKind> {
    let (kind, name) = key
        .split_once('/')
        .ok_or_else(|| UnknownKind(key.to_string()))?;
    Ok((kind.parse()?, name))
}
