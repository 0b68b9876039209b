use tokio::time::Duration;

pub const SLOWDRAIN: &str = "slowdrain";

// Drain defaults, overridable from the command line.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(20);
pub const DEFAULT_INFRA_PREFIXES: &[&str] = &["kube-", "openshift-", "infra-"];

// Namespace reported for Pods which carry no namespace in their metadata.
pub const DEFAULT_WORKLOAD_NAMESPACE: &str = "default";

// Field selector key used to list the Pods bound to a Node.
pub const POD_NODE_NAME_FIELD: &str = "spec.nodeName";

pub const CONFIRMATION_PROMPT: &str = "Confirm pod deletion? [y/N]: ";
