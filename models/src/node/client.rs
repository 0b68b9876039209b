use super::error::{self, Result};
use crate::constants::POD_NODE_NAME_FIELD;
use crate::workload::WorkloadInstance;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

#[cfg(any(feature = "mockall", test))]
use mockall::mock;

#[async_trait]
/// A trait providing the handful of Kubernetes API calls needed to drain a Node. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait ClusterClient: Send + Sync {
    /// Fetch the Node object with the given name.
    async fn get_node(&self, node_name: &str) -> Result<Node>;
    /// Persist a modified Node object. The update carries the fetched `resourceVersion`, so a concurrent
    /// writer results in a conflict rather than a lost update.
    async fn update_node(&self, node: &Node) -> Result<()>;
    /// List every Pod bound to the given Node, across all namespaces.
    async fn list_workloads(&self, node_name: &str) -> Result<Vec<WorkloadInstance>>;
    /// Delete a single Pod.
    async fn delete_workload(&self, workload: &WorkloadInstance) -> Result<()>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock ClusterClient for use in tests.
    pub ClusterClient {}
    #[async_trait]
    impl ClusterClient for ClusterClient {
        async fn get_node(&self, node_name: &str) -> Result<Node>;
        async fn update_node(&self, node: &Node) -> Result<()>;
        async fn list_workloads(&self, node_name: &str) -> Result<Vec<WorkloadInstance>>;
        async fn delete_workload(&self, workload: &WorkloadInstance) -> Result<()>;
    }
}

#[derive(Clone)]
/// Concrete implementation of the `ClusterClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SClusterClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterClient { k8s_client }
    }
}

#[async_trait]
impl ClusterClient for K8SClusterClient {
    #[instrument(skip(self), err)]
    async fn get_node(&self, node_name: &str) -> Result<Node> {
        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        nodes
            .get(node_name)
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::FetchNodeSnafu { node_name })
    }

    #[instrument(skip(self, node), err)]
    async fn update_node(&self, node: &Node) -> Result<()> {
        let node_name = node
            .metadata
            .name
            .as_deref()
            .context(error::MissingNodeNameSnafu)?;

        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        nodes
            .replace(node_name, &PostParams::default(), node)
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::UpdateNodeSnafu { node_name })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_workloads(&self, node_name: &str) -> Result<Vec<WorkloadInstance>> {
        let pods: Api<Pod> = Api::all(self.k8s_client.clone());

        let node_pods = pods
            .list(&ListParams {
                field_selector: Some(format!("{}={}", POD_NODE_NAME_FIELD, node_name)),
                ..Default::default()
            })
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::ListWorkloadsSnafu { node_name })?;

        Ok(node_pods.into_iter().map(WorkloadInstance::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_workload(&self, workload: &WorkloadInstance) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), &workload.namespace);
        pods.delete(&workload.name, &DeleteParams::default())
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(error::DeleteWorkloadSnafu {
                namespace: &workload.namespace,
                name: &workload.name,
            })?;

        Ok(())
    }
}
