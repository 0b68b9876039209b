use crate::node::ClusterClientError;

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, DrainError>;

/// Errors which abort a drain. Failing to delete an individual Pod is not among them: those are recorded per
/// Pod and the drain carries on.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DrainError {
    #[snafu(display("Error getting node {}: '{}'", node_name, source))]
    NodeNotFound {
        source: ClusterClientError,
        node_name: String,
    },

    #[snafu(display("Error applying cordon to node {}: '{}'", node_name, source))]
    NodeUpdateConflict {
        source: ClusterClientError,
        node_name: String,
    },

    #[snafu(display("Error listing pods of node {}: '{}'", node_name, source))]
    ListError {
        source: ClusterClientError,
        node_name: String,
    },

    #[snafu(display("Unable to write the drain summary: '{}'", source))]
    Presentation { source: std::io::Error },
}
