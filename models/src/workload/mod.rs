//! Discovery and classification of the Pods bound to a Node.
//!
//! Pods are split into "infra" and "application" sets purely by namespace: a Pod is infra when its namespace
//! starts with one of the configured prefixes. Only application Pods are removed during a drain.
mod table;

pub use self::table::{write_deletion_list, write_workload_table};

use crate::constants::{DEFAULT_INFRA_PREFIXES, DEFAULT_WORKLOAD_NAMESPACE};
use crate::drain::error::{self as drain_error, DrainError};
use crate::node::ClusterClient;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

use std::fmt;

/// A Pod running on the Node being drained, identified by namespace and name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WorkloadInstance {
    pub namespace: String,
    pub name: String,
}

impl WorkloadInstance {
    pub fn new<S1, S2>(namespace: S1, name: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        WorkloadInstance {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl From<Pod> for WorkloadInstance {
    fn from(pod: Pod) -> Self {
        WorkloadInstance {
            namespace: pod
                .namespace()
                .unwrap_or_else(|| DEFAULT_WORKLOAD_NAMESPACE.to_string()),
            name: pod.name_any(),
        }
    }
}

impl fmt::Display for WorkloadInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Ordered list of namespace prefixes which mark a Pod as cluster infrastructure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InfraPrefixes(Vec<String>);

impl InfraPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InfraPrefixes(prefixes.into_iter().map(Into::into).collect())
    }

    /// Case-sensitive literal prefix match against any configured prefix.
    pub fn is_infra(&self, namespace: &str) -> bool {
        self.0
            .iter()
            .any(|prefix| namespace.starts_with(prefix.as_str()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for InfraPrefixes {
    fn default() -> Self {
        InfraPrefixes::new(DEFAULT_INFRA_PREFIXES.iter().copied())
    }
}

/// The Pods of a Node, partitioned into infra and application sets. Both sets keep the order in which the API
/// server listed them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Classification {
    pub infra: Vec<WorkloadInstance>,
    pub application: Vec<WorkloadInstance>,
}

impl Classification {
    pub fn from_workloads<I>(workloads: I, prefixes: &InfraPrefixes) -> Self
    where
        I: IntoIterator<Item = WorkloadInstance>,
    {
        let (infra, application) = workloads
            .into_iter()
            .partition(|workload| prefixes.is_infra(&workload.namespace));

        Classification { infra, application }
    }
}

/// Lists every Pod bound to the Node and classifies them.
///
/// A listing failure is fatal: no deletion may start without a complete picture of the Node.
#[instrument(skip(client, prefixes))]
pub async fn discover_workloads<C: ClusterClient>(
    client: &C,
    node_name: &str,
    prefixes: &InfraPrefixes,
) -> Result<Classification, DrainError> {
    event!(Level::INFO, "Getting pods in the node {}...", node_name);
    let workloads = client
        .list_workloads(node_name)
        .await
        .context(drain_error::ListSnafu { node_name })?;

    let classification = Classification::from_workloads(workloads, prefixes);
    event!(
        Level::INFO,
        "Infrastructure pods detected: {}",
        classification.infra.len()
    );
    event!(
        Level::INFO,
        "Application pods detected: {}",
        classification.application.len()
    );

    Ok(classification)
}
