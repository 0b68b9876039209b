//! Access to the Node being drained, and the "cordon" step which stops new Pods from being scheduled onto it.
mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as ClusterClientError;

use crate::drain::error::{self as drain_error, DrainError};

use k8s_openapi::api::core::v1::Node;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// The result of cordoning a Node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CordonOutcome {
    /// The Node was schedulable and has now been marked unschedulable.
    Cordoned,
    /// The Node was already unschedulable; nothing was written.
    AlreadyCordoned,
}

/// Returns whether the Node is marked unschedulable. A Node without a spec, or without the flag, is schedulable.
pub fn is_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

/// Marks the given Node as unschedulable, preventing Pods from being deployed onto it.
///
/// Cordoning an already-cordoned Node is a no-op. Failures are fatal to the drain and are not retried.
#[instrument(skip(client))]
pub async fn cordon_node<C: ClusterClient>(
    client: &C,
    node_name: &str,
) -> Result<CordonOutcome, DrainError> {
    let mut node = client
        .get_node(node_name)
        .await
        .context(drain_error::NodeNotFoundSnafu { node_name })?;

    if is_unschedulable(&node) {
        event!(Level::WARN, "Node {} was already cordoned", node_name);
        return Ok(CordonOutcome::AlreadyCordoned);
    }

    node.spec.get_or_insert_with(Default::default).unschedulable = Some(true);
    client
        .update_node(&node)
        .await
        .context(drain_error::NodeUpdateConflictSnafu { node_name })?;

    event!(Level::INFO, "Node {} marked as cordoned", node_name);
    Ok(CordonOutcome::Cordoned)
}
