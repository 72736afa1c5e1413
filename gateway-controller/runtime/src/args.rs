use crate::{
    core::CONTROLLER_NAME,
    k8s::{
        self,
        policy::{AccessLogPolicy, IamAuthPolicy, TargetGroupPolicy, VpcAssociationPolicy},
        Resource,
    },
    reconcile::{
        self, EventSink, GatewayHandler, Handler, KubeCluster, KubeEvents, PolicyHandler,
        ReconcileMetrics, Reconciler, RouteHandler, Settings,
    },
    DryRunDeployer, LatticeModel,
};
use anyhow::{bail, Result};
use clap::Parser;
use futures::prelude::*;
use kube::{
    api::Api,
    runtime::{controller::Controller, watcher},
    Client,
};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "gateway-controller",
    about = "Reconciles Gateway API resources onto VPC Lattice"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "appnet=info,warn",
        env = "APPNET_GATEWAY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Only Gateways of this class, and routes attached to them, are managed.
    #[clap(
        long,
        default_value = "amazon-vpc-lattice",
        env = "APPNET_GATEWAY_CLASS"
    )]
    gateway_class: String,

    /// Seconds to wait before retrying a reconcile that hit a transient
    /// remote failure.
    #[clap(long, default_value = "30")]
    retry_delay_secs: u64,

    #[clap(long, default_value = "5")]
    min_backoff_secs: u64,

    #[clap(long, default_value = "300")]
    max_backoff_secs: u64,
}

/// Shared by every controller.
#[derive(Clone)]
struct Context {
    cluster: KubeCluster,
    model: Arc<LatticeModel>,
    deployer: Arc<DryRunDeployer>,
    events: Arc<dyn EventSink>,
    metrics: ReconcileMetrics,
    settings: Settings,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            gateway_class,
            retry_delay_secs,
            min_backoff_secs,
            max_backoff_secs,
        } = self;

        if min_backoff_secs > max_backoff_secs {
            bail!("--min-backoff-secs must not exceed --max-backoff-secs");
        }
        let settings = Settings {
            retry_delay: Duration::from_secs(retry_delay_secs),
            min_backoff: Duration::from_secs(min_backoff_secs),
            max_backoff: Duration::from_secs(max_backoff_secs),
        };

        let mut prom = <Registry>::default();
        let metrics = ReconcileMetrics::register(prom.sub_registry_with_prefix("gateway_controller"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();
        let ctx = Context {
            cluster: KubeCluster::new(client.clone()),
            model: Arc::new(LatticeModel::new()),
            deployer: Arc::new(DryRunDeployer::new()),
            events: Arc::new(KubeEvents::new(client.clone(), CONTROLLER_NAME)),
            metrics,
            settings,
        };
        let drain = runtime.shutdown_handle();

        info!(%gateway_class, "Starting controllers");
        spawn(
            &client,
            &ctx,
            &drain,
            GatewayHandler::new(gateway_class.clone()),
        )
        .await;
        spawn(
            &client,
            &ctx,
            &drain,
            RouteHandler::<k8s::HttpRoute>::new(gateway_class.clone()),
        )
        .await;
        spawn(
            &client,
            &ctx,
            &drain,
            RouteHandler::<k8s::GrpcRoute>::new(gateway_class.clone()),
        )
        .await;
        spawn(
            &client,
            &ctx,
            &drain,
            RouteHandler::<k8s::TlsRoute>::new(gateway_class),
        )
        .await;
        spawn(&client, &ctx, &drain, PolicyHandler::<TargetGroupPolicy>::new()).await;
        spawn(&client, &ctx, &drain, PolicyHandler::<VpcAssociationPolicy>::new()).await;
        spawn(&client, &ctx, &drain, PolicyHandler::<AccessLogPolicy>::new()).await;
        spawn(&client, &ctx, &drain, PolicyHandler::<IamAuthPolicy>::new()).await;

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the controllers to finish their in-flight reconciles.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Spawns a controller for the handler's kind if the kind is installed.
async fn spawn<H>(client: &Client, ctx: &Context, drain: &drain::Watch, handler: H)
where
    H: Handler,
    LatticeModel: crate::core::ModelBuilder<H::Object>,
{
    if !api_resource_exists::<H::Object>(client).await {
        info!(kind = H::KIND, "Resource kind not installed; skipping controller");
        return;
    }

    let reconciler = Arc::new(Reconciler::new(
        ctx.cluster.clone(),
        handler,
        ctx.model.clone(),
        ctx.deployer.clone(),
        ctx.events.clone(),
        ctx.metrics.clone(),
        ctx.settings,
    ));

    let controller = Controller::new(
        Api::<H::Object>::all(client.clone()),
        watcher::Config::default(),
    )
    .run(
        reconcile::reconcile::<KubeCluster, H>,
        reconcile::error_policy::<KubeCluster, H>,
        reconciler,
    )
    .for_each(|res| async move {
        match res {
            Ok((obj, action)) => tracing::debug!(%obj, ?action, "Reconciled"),
            Err(error) => tracing::warn!(%error, "Reconcile failed"),
        }
    });

    let drain = drain.clone();
    tokio::spawn(
        async move {
            tokio::select! {
                _ = controller => {}
                handle = drain.signaled() => {
                    info!("Shutting down");
                    drop(handle);
                }
            }
        }
        .instrument(info_span!("controller", kind = H::KIND)),
    );
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
