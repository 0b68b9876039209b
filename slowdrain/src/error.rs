use models::drain::DrainError;
use models::telemetry::TelemetryConfigError;
use snafu::Snafu;

use std::path::PathBuf;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Missing required argument: <node_name>. Run with --help for usage."))]
    MissingNodeName,

    #[snafu(display("Error reading kubeconfig '{}': '{}'", path.display(), source))]
    KubeconfigRead {
        source: Box<dyn std::error::Error + Send + Sync>,
        path: PathBuf,
    },

    #[snafu(display("Error getting Kubernetes configuration: '{}'", source))]
    ClientConfig {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Error creating Kubernetes client: '{}'", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Error configuring telemetry: '{}'", source))]
    TelemetryInit { source: TelemetryConfigError },

    #[snafu(display("{}", source))]
    Drain { source: DrainError },
}
