mod args;
mod error;

use crate::args::Arguments;
use crate::error::Result;

use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use models::constants::SLOWDRAIN;
use models::drain::{drain_node, StdinConfirmer};
use models::node::K8SClusterClient;
use models::telemetry;
use snafu::{OptionExt, ResultExt};
use tracing::{event, Level};

use std::io;
use std::process;

const SLOWDRAIN_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Arguments = argh::from_env();

    if args.version {
        println!("{} version: {}", SLOWDRAIN, SLOWDRAIN_VERSION);
        return Ok(());
    }
    let node_name = args
        .node_name
        .clone()
        .context(error::MissingNodeNameSnafu)?;

    telemetry::init_telemetry(args.log_level).context(error::TelemetryInitSnafu)?;
    event!(Level::DEBUG, "DEBUG log level enabled");
    event!(Level::INFO, "Initialize the node drain: {}", node_name);

    let k8s_client = k8s_client(&args).await?;
    let cluster_client = K8SClusterClient::new(k8s_client);

    let report = drain_node(
        &cluster_client,
        &StdinConfirmer,
        &args.drain_config(),
        &node_name,
        &mut io::stdout(),
    )
    .await
    .context(error::DrainSnafu)?;

    let failed = report
        .deletions
        .iter()
        .filter(|outcome| !outcome.is_deleted())
        .count();
    event!(
        Level::DEBUG,
        state = ?report.state,
        attempted = report.deletions.len(),
        failed,
        "Drain finished"
    );

    Ok(())
}

/// Builds a Kubernetes client from `--kubeconfig`/`--context` when given, otherwise from the environment.
async fn k8s_client(args: &Arguments) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: args.context.clone(),
        ..Default::default()
    };

    let config = match (&args.kubeconfig, &args.context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
                .context(error::KubeconfigReadSnafu { path })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
                .context(error::ClientConfigSnafu)?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::ClientConfigSnafu)?,
        (None, None) => Config::infer()
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::ClientConfigSnafu)?,
    };

    kube::Client::try_from(config).context(error::ClientCreateSnafu)
}
