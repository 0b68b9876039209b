//! Drains a Node slowly: cordon it, then delete its application Pods one at a time with a pause after each.
//!
//! Deleting every Pod at once forces all of their replacements to be scheduled, pulled and warmed up at the same
//! time. Spacing deletions out gives the replicas elsewhere a chance to absorb the load before the next Pod goes.
//!
//! Pods are deleted rather than evicted, and the drain does not wait for replacements to become ready.
mod confirm;
pub mod error;

pub use self::confirm::*;
pub use self::error::DrainError;
use self::error::Result;

use crate::constants::{CONFIRMATION_PROMPT, DEFAULT_DELAY};
use crate::node::{cordon_node, ClusterClient, CordonOutcome};
use crate::workload::{
    discover_workloads, write_deletion_list, write_workload_table, Classification, InfraPrefixes,
    WorkloadInstance,
};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use snafu::ResultExt;
use tokio::time::{sleep, Duration};
use tracing::{event, instrument, Level};

use std::io::Write;

/// Settings for a single drain, fixed before the drain starts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrainConfig {
    /// Pause after each deletion attempt.
    pub delay: Duration,
    /// Skip the interactive confirmation.
    pub assume_yes: bool,
    pub infra_prefixes: InfraPrefixes,
}

impl Default for DrainConfig {
    fn default() -> Self {
        DrainConfig {
            delay: DEFAULT_DELAY,
            assume_yes: false,
            infra_prefixes: InfraPrefixes::default(),
        }
    }
}

/// DrainState represents the progress of a drain.
///
/// `Init -> Cordoned -> Classified -> {Cancelled | Draining -> Completed}`. A Node without application Pods moves
/// from `Classified` straight to `Completed`. Any fatal error moves the drain to `Failed`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DrainState {
    Init,
    /// The Node has been marked unschedulable.
    Cordoned,
    /// The Node's Pods have been listed and classified.
    Classified,
    /// The operator declined the deletion.
    Cancelled,
    /// Application Pods are being deleted.
    Draining,
    Completed,
    Failed,
}

/// What happened when deleting a single Pod.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeletionResult {
    Deleted,
    Failed { reason: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeletionOutcome {
    pub workload: WorkloadInstance,
    pub result: DeletionResult,
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        self.result == DeletionResult::Deleted
    }
}

/// Summary of a drain which did not hit a fatal error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrainReport {
    pub node_name: String,
    pub cordon: CordonOutcome,
    pub classification: Classification,
    pub state: DrainState,
    /// One entry per deletion attempt, in the order the deletions were made.
    pub deletions: Vec<DeletionOutcome>,
}

/// Randomly permutes the Pods so that deletion order is independent of listing order, namespace or name.
pub fn shuffle_workloads<R: Rng + ?Sized>(workloads: &mut [WorkloadInstance], rng: &mut R) {
    workloads.shuffle(rng);
}

/// Drains the given Node.
///
/// The Node is cordoned, its Pods are listed and classified, and both sets are written to `out`. Unless
/// `assume_yes` is set, the operator is then asked to confirm. Confirmed application Pods are deleted one by one
/// in random order, sleeping for the configured delay after every attempt.
///
/// Errors are returned only for failures which stop the drain: fetching or cordoning the Node, listing its Pods,
/// or writing the summary. A cordon that succeeded is never undone. Failed deletions are logged and recorded in
/// the returned report, and the drain moves on to the next Pod.
pub async fn drain_node<C, F, W>(
    client: &C,
    confirmer: &F,
    config: &DrainConfig,
    node_name: &str,
    out: &mut W,
) -> Result<DrainReport>
where
    C: ClusterClient,
    F: Confirmer,
    W: Write,
{
    let mut rng = StdRng::from_rng(&mut rand::rng());
    drain_node_with_rng(client, confirmer, config, node_name, out, &mut rng).await
}

/// Like [`drain_node`], shuffling the deletion order with the given random number generator.
#[instrument(skip(client, confirmer, out, rng))]
pub async fn drain_node_with_rng<C, F, W, R>(
    client: &C,
    confirmer: &F,
    config: &DrainConfig,
    node_name: &str,
    out: &mut W,
    rng: &mut R,
) -> Result<DrainReport>
where
    C: ClusterClient,
    F: Confirmer,
    W: Write,
    R: Rng + ?Sized,
{
    let mut run = DrainRun::new(node_name, config);
    let report = run.execute(client, confirmer, out, rng).await;
    if report.is_err() {
        run.transition(DrainState::Failed);
    }
    report
}

/// In-memory context of one drain. Nothing about a drain is persisted.
struct DrainRun<'a> {
    node_name: &'a str,
    config: &'a DrainConfig,
    state: DrainState,
}

impl<'a> DrainRun<'a> {
    fn new(node_name: &'a str, config: &'a DrainConfig) -> Self {
        DrainRun {
            node_name,
            config,
            state: DrainState::Init,
        }
    }

    fn transition(&mut self, next: DrainState) {
        event!(
            Level::DEBUG,
            node_name = self.node_name,
            from = ?self.state,
            to = ?next,
            "Drain state transition"
        );
        self.state = next;
    }

    async fn execute<C, F, W, R>(
        &mut self,
        client: &C,
        confirmer: &F,
        out: &mut W,
        rng: &mut R,
    ) -> Result<DrainReport>
    where
        C: ClusterClient,
        F: Confirmer,
        W: Write,
        R: Rng + ?Sized,
    {
        event!(Level::INFO, "Mark the node {} as cordoned", self.node_name);
        let cordon = cordon_node(client, self.node_name).await?;
        self.transition(DrainState::Cordoned);

        let classification =
            discover_workloads(client, self.node_name, &self.config.infra_prefixes).await?;
        self.transition(DrainState::Classified);

        self.present(out, &classification)?;

        let deletions = if classification.application.is_empty() {
            event!(
                Level::INFO,
                "There are no application pods on the node {}",
                self.node_name
            );
            self.transition(DrainState::Completed);
            Vec::new()
        } else if !self.confirmed(confirmer) {
            event!(Level::WARN, "Node {} drain cancelled", self.node_name);
            self.transition(DrainState::Cancelled);
            Vec::new()
        } else {
            self.transition(DrainState::Draining);

            // The deletion order is a snapshot of the classification; Pods which appear later are not considered.
            let mut deletion_order = classification.application.clone();
            shuffle_workloads(&mut deletion_order, rng);

            let deletions = self.delete_workloads(client, deletion_order).await;
            event!(Level::INFO, "Node {} drain completed", self.node_name);
            self.transition(DrainState::Completed);
            deletions
        };

        Ok(DrainReport {
            node_name: self.node_name.to_string(),
            cordon,
            classification,
            state: self.state,
            deletions,
        })
    }

    fn present<W: Write>(&self, out: &mut W, classification: &Classification) -> Result<()> {
        let mut write_summary = || -> std::io::Result<()> {
            writeln!(
                out,
                "Node {} has the following pods scheduled:\n",
                self.node_name
            )?;
            write_workload_table(out, classification)?;
            if !classification.application.is_empty() {
                write_deletion_list(out, &classification.application)?;
            }
            out.flush()
        };
        write_summary().context(error::PresentationSnafu)
    }

    fn confirmed<F: Confirmer>(&self, confirmer: &F) -> bool {
        if self.config.assume_yes {
            event!(
                Level::WARN,
                "Auto-confirmation enabled (-y). Proceeding with draining node {}.",
                self.node_name
            );
            true
        } else {
            confirmer.ask(CONFIRMATION_PROMPT)
        }
    }

    /// Deletes each Pod in turn. A failed deletion is recorded and does not skip the following delay.
    async fn delete_workloads<C: ClusterClient>(
        &self,
        client: &C,
        deletion_order: Vec<WorkloadInstance>,
    ) -> Vec<DeletionOutcome> {
        let mut outcomes = Vec::with_capacity(deletion_order.len());

        for workload in deletion_order {
            event!(Level::INFO, "Deleting pod {}...", workload);
            let result = match client.delete_workload(&workload).await {
                Ok(()) => {
                    event!(Level::INFO, "Pod {} successfully deleted", workload);
                    DeletionResult::Deleted
                }
                Err(e) => {
                    event!(Level::ERROR, "Error deleting pod {}: '{}'", workload, e);
                    DeletionResult::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(DeletionOutcome { workload, result });

            // The pause also follows the final deletion.
            event!(
                Level::INFO,
                "Waiting {} seconds before deleting the next pod...",
                self.config.delay.as_secs()
            );
            sleep(self.config.delay).await;
        }

        outcomes
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::test::{fake_client_error, fake_node};
    use crate::node::{ClusterClientError, MockClusterClient};

    use mockall::predicate;

    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn scenario_workloads() -> Vec<WorkloadInstance> {
        vec![
            WorkloadInstance::new("kube-system", "a"),
            WorkloadInstance::new("default", "b"),
            WorkloadInstance::new("default", "c"),
        ]
    }

    fn test_config(assume_yes: bool) -> DrainConfig {
        DrainConfig {
            delay: Duration::from_secs(0),
            assume_yes,
            infra_prefixes: InfraPrefixes::new(["kube-"]),
        }
    }

    /// A client for a schedulable node `n1` hosting the given Pods.
    fn fake_cluster(workloads: Vec<WorkloadInstance>) -> MockClusterClient {
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .with(predicate::eq("n1"))
            .returning(|_| Ok(fake_node("n1", None)))
            .times(1);
        client
            .expect_update_node()
            .returning(|_| Ok(()))
            .times(1);
        client
            .expect_list_workloads()
            .with(predicate::eq("n1"))
            .returning(move |_| Ok(workloads.clone()))
            .times(1);
        client
    }

    fn sorted_names(outcomes: &[DeletionOutcome]) -> Vec<String> {
        let mut names: Vec<String> = outcomes
            .iter()
            .map(|outcome| outcome.workload.name.clone())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_drain_with_assume_yes() {
        let mut client = fake_cluster(scenario_workloads());
        client
            .expect_delete_workload()
            .withf(|workload: &WorkloadInstance| workload.namespace == "default")
            .returning(|_| Ok(()))
            .times(2);
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_ask().times(0);

        let mut out = Vec::new();
        let report = drain_node(&client, &confirmer, &test_config(true), "n1", &mut out)
            .await
            .unwrap();

        assert_eq!(report.cordon, CordonOutcome::Cordoned);
        assert_eq!(report.state, DrainState::Completed);
        assert_eq!(
            report.classification.infra,
            vec![WorkloadInstance::new("kube-system", "a")]
        );
        assert_eq!(
            report.classification.application,
            vec![
                WorkloadInstance::new("default", "b"),
                WorkloadInstance::new("default", "c"),
            ]
        );
        assert!(report.deletions.iter().all(DeletionOutcome::is_deleted));
        assert_eq!(sorted_names(&report.deletions), vec!["b", "c"]);

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Node n1 has the following pods scheduled:\n"));
        assert!(out.contains("kube-system  a\n"));
        assert!(out.contains(" - default/b\n"));
        assert!(out.contains(" - default/c\n"));
    }

    #[tokio::test]
    async fn test_drain_confirmed_interactively() {
        let mut client = fake_cluster(scenario_workloads());
        client
            .expect_delete_workload()
            .returning(|_| Ok(()))
            .times(2);
        let mut confirmer = MockConfirmer::new();
        confirmer
            .expect_ask()
            .with(predicate::eq(CONFIRMATION_PROMPT))
            .return_const(true)
            .times(1);

        let report = drain_node(
            &client,
            &confirmer,
            &test_config(false),
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(report.state, DrainState::Completed);
        assert_eq!(report.deletions.len(), 2);
    }

    #[tokio::test]
    async fn test_drain_cancelled() {
        let mut client = fake_cluster(scenario_workloads());
        client.expect_delete_workload().times(0);
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_ask().return_const(false).times(1);

        let report = drain_node(
            &client,
            &confirmer,
            &test_config(false),
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(report.state, DrainState::Cancelled);
        assert!(report.deletions.is_empty());
    }

    #[tokio::test]
    async fn test_drain_without_application_pods() {
        let mut client = fake_cluster(vec![
            WorkloadInstance::new("kube-system", "coredns"),
            WorkloadInstance::new("kube-system", "kube-proxy"),
        ]);
        client.expect_delete_workload().times(0);
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_ask().times(0);

        let mut out = Vec::new();
        let report = drain_node(&client, &confirmer, &test_config(false), "n1", &mut out)
            .await
            .unwrap();

        assert_eq!(report.state, DrainState::Completed);
        assert!(report.deletions.is_empty());
        assert_eq!(report.classification.infra.len(), 2);

        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("will be deleted"));
    }

    #[tokio::test]
    async fn test_failed_deletion_does_not_stop_drain() {
        let workloads = vec![
            WorkloadInstance::new("default", "a"),
            WorkloadInstance::new("default", "b"),
            WorkloadInstance::new("default", "c"),
        ];
        let mut client = fake_cluster(workloads);
        let attempted = Arc::new(Mutex::new(Vec::new()));
        let attempts = attempted.clone();
        client
            .expect_delete_workload()
            .returning(move |workload| {
                attempts.lock().unwrap().push(workload.name.clone());
                if workload.name == "b" {
                    Err(ClusterClientError::DeleteWorkload {
                        source: fake_client_error("pods \"b\" is forbidden"),
                        namespace: workload.namespace.clone(),
                        name: workload.name.clone(),
                    })
                } else {
                    Ok(())
                }
            })
            .times(3);

        let report = drain_node(
            &client,
            &MockConfirmer::new(),
            &test_config(true),
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(report.state, DrainState::Completed);
        assert_eq!(sorted_names(&report.deletions), vec!["a", "b", "c"]);

        let mut attempted = attempted.lock().unwrap().clone();
        attempted.sort();
        assert_eq!(attempted, vec!["a", "b", "c"]);

        let failed: Vec<&DeletionOutcome> = report
            .deletions
            .iter()
            .filter(|outcome| !outcome.is_deleted())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].workload, WorkloadInstance::new("default", "b"));
        assert!(matches!(
            &failed[0].result,
            DeletionResult::Failed { reason } if reason.contains("forbidden")
        ));
    }

    #[tokio::test]
    async fn test_node_not_found_is_fatal() {
        let mut client = MockClusterClient::new();
        client.expect_get_node().returning(|node_name| {
            Err(ClusterClientError::FetchNode {
                source: fake_client_error("nodes \"n1\" not found"),
                node_name: node_name.to_string(),
            })
        });
        client.expect_update_node().times(0);
        client.expect_list_workloads().times(0);
        client.expect_delete_workload().times(0);

        let err = drain_node(
            &client,
            &MockConfirmer::new(),
            &test_config(true),
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DrainError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .returning(|_| Ok(fake_node("n1", Some(true))));
        client.expect_update_node().times(0);
        client.expect_list_workloads().returning(|node_name| {
            Err(ClusterClientError::ListWorkloads {
                source: fake_client_error("etcdserver: request timed out"),
                node_name: node_name.to_string(),
            })
        });
        client.expect_delete_workload().times(0);

        let err = drain_node(
            &client,
            &MockConfirmer::new(),
            &test_config(true),
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DrainError::ListError { .. }));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unwritable_summary_stops_before_deleting() {
        let mut client = fake_cluster(scenario_workloads());
        client.expect_delete_workload().times(0);
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_ask().times(0);

        let err = drain_node(
            &client,
            &confirmer,
            &test_config(false),
            "n1",
            &mut BrokenPipe,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DrainError::Presentation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_follows_every_deletion() {
        let mut client = fake_cluster(scenario_workloads());
        client
            .expect_delete_workload()
            .returning(|_| Ok(()))
            .times(2);
        let config = DrainConfig {
            delay: Duration::from_secs(20),
            ..test_config(true)
        };

        let start = tokio::time::Instant::now();
        let report = drain_node(
            &client,
            &MockConfirmer::new(),
            &config,
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(report.deletions.len(), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(40), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(60), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_follows_failed_deletion() {
        let mut client = fake_cluster(vec![
            WorkloadInstance::new("default", "a"),
            WorkloadInstance::new("default", "b"),
            WorkloadInstance::new("default", "c"),
        ]);
        client
            .expect_delete_workload()
            .returning(|workload| {
                Err(ClusterClientError::DeleteWorkload {
                    source: fake_client_error("pod is being terminated"),
                    namespace: workload.namespace.clone(),
                    name: workload.name.clone(),
                })
            })
            .times(3);
        let config = DrainConfig {
            delay: Duration::from_secs(20),
            ..test_config(true)
        };

        let start = tokio::time::Instant::now();
        let report = drain_node(
            &client,
            &MockConfirmer::new(),
            &config,
            "n1",
            &mut io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(report.state, DrainState::Completed);
        assert!(report.deletions.iter().all(|outcome| !outcome.is_deleted()));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn test_drain_deletes_in_shuffled_order() {
        let listed: Vec<WorkloadInstance> = (0..8)
            .map(|i| WorkloadInstance::new("default", format!("web-{}", i)))
            .collect();

        let mut orders = Vec::new();
        for seed in 0..5 {
            let mut expected = listed.clone();
            shuffle_workloads(&mut expected, &mut StdRng::seed_from_u64(seed));

            let mut client = fake_cluster(listed.clone());
            let deleted = Arc::new(Mutex::new(Vec::new()));
            let deletions = deleted.clone();
            client
                .expect_delete_workload()
                .returning(move |workload| {
                    deletions.lock().unwrap().push(workload.clone());
                    Ok(())
                })
                .times(listed.len());

            let report = drain_node_with_rng(
                &client,
                &MockConfirmer::new(),
                &test_config(true),
                "n1",
                &mut io::sink(),
                &mut StdRng::seed_from_u64(seed),
            )
            .await
            .unwrap();

            let reported: Vec<WorkloadInstance> = report
                .deletions
                .into_iter()
                .map(|outcome| outcome.workload)
                .collect();
            assert_eq!(reported, expected);
            assert_eq!(*deleted.lock().unwrap(), expected);
            // The classification itself keeps the listing order.
            assert_eq!(report.classification.application, listed);
            orders.push(reported);
        }

        // 8! orderings: five seeds all reproducing the listing order would mean nothing was shuffled.
        assert!(orders.iter().any(|order| *order != listed));
    }

    #[test]
    fn test_shuffle_preserves_workloads() {
        let original: Vec<WorkloadInstance> = (0..50)
            .map(|i| WorkloadInstance::new(format!("ns-{}", i % 7), format!("pod-{}", i)))
            .collect();
        let mut shuffled = original.clone();
        shuffle_workloads(&mut shuffled, &mut StdRng::seed_from_u64(7));

        let mut sorted_original = original.clone();
        sorted_original.sort();
        shuffled.sort();
        assert_eq!(shuffled, sorted_original);
    }

    #[test]
    fn test_shuffle_is_uniform() {
        const ROUNDS: usize = 6000;
        let original = vec![
            WorkloadInstance::new("default", "a"),
            WorkloadInstance::new("default", "b"),
            WorkloadInstance::new("default", "c"),
        ];
        let mut rng = StdRng::seed_from_u64(1234);

        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        for _ in 0..ROUNDS {
            let mut shuffled = original.clone();
            shuffle_workloads(&mut shuffled, &mut rng);
            let order = shuffled.into_iter().map(|workload| workload.name).collect();
            *counts.entry(order).or_default() += 1;
        }

        // 3! permutations, each expected ROUNDS / 6 = 1000 times with a standard deviation of about 29.
        assert_eq!(counts.len(), 6);
        for (order, count) in counts {
            assert!((850..=1150).contains(&count), "{:?} seen {} times", order, count);
        }
    }
}
