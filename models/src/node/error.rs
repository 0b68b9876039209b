use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a `ClusterClient` while talking to the Kubernetes API.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to fetch Node '{}': '{}'", node_name, source))]
    FetchNode {
        source: Box<dyn std::error::Error + Send + Sync>,
        node_name: String,
    },

    #[snafu(display("Unable to update Node '{}': '{}'", node_name, source))]
    UpdateNode {
        source: Box<dyn std::error::Error + Send + Sync>,
        node_name: String,
    },

    #[snafu(display("Unable to list Pods bound to Node '{}': '{}'", node_name, source))]
    ListWorkloads {
        source: Box<dyn std::error::Error + Send + Sync>,
        node_name: String,
    },

    #[snafu(display("Unable to delete Pod '{}/{}': '{}'", namespace, name, source))]
    DeleteWorkload {
        source: Box<dyn std::error::Error + Send + Sync>,
        namespace: String,
        name: String,
    },

    #[snafu(display("Node object returned by the API server has no name"))]
    MissingNodeName,
}
