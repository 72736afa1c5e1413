//! Remote resources described by the model.
//!
//! Every resource's id is derived from its content; the id itself is not
//! hashed.

use crate::{
    core::{id_from_hash, routes::RouteMatch, Kind, Resource},
    k8s::policy::HealthCheckConfig,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNetwork {
    #[serde(skip)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNetworkVpcAssociation {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub service_network: String,
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub route_kind: &'static str,
    pub hostnames: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNetworkServiceAssociation {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub service: String,
    pub service_network: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub service: String,
    pub protocol: &'static str,
    pub port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub listener: String,
    pub priority: usize,
    pub matches: Vec<RouteMatch>,
    pub forward: Vec<WeightedTargetGroup>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTargetGroup {
    pub target_group: String,
    pub weight: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroup {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    /// The source object the target group is provisioned for. Target groups
    /// are never shared, so tearing down one owner leaves others intact.
    pub owner: String,
    pub service: String,
    pub port: Option<u16>,
    pub protocol: String,
    pub protocol_version: String,
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Targets {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub owner: String,
    pub target_group: String,
    pub service: String,
    pub port: Option<u16>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogSubscription {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub target: String,
    pub destination_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicy {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub target: String,
    pub policy: String,
}

/// A resource whose id is derived from its content.
pub trait Hashed: Resource + Serialize + Sized {
    fn set_id(&mut self, id: String);

    fn hashed(mut self) -> anyhow::Result<Self> {
        let id = id_from_hash(&self)?;
        self.set_id(id);
        Ok(self)
    }
}

macro_rules! impl_resource {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Resource for $ty {
                const KIND: Kind = Kind::$ty;

                fn id(&self) -> &str {
                    &self.id
                }

                fn name(&self) -> &str {
                    &self.name
                }
            }

            impl Hashed for $ty {
                fn set_id(&mut self, id: String) {
                    self.id = id;
                }
            }
        )+
    };
}

impl_resource!(
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
);
