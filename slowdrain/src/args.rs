use argh::FromArgs;
use models::constants::DEFAULT_DELAY;
use models::drain::DrainConfig;
use models::telemetry::LogLevel;
use models::workload::InfraPrefixes;
use tokio::time::Duration;

use std::path::PathBuf;

#[derive(FromArgs, Debug, PartialEq)]
/// Drains a node, deleting application pods one by one with a delay between deletions.
pub(crate) struct Arguments {
    /// seconds to wait after each pod deletion (default 20)
    #[argh(option, short = 'd', default = "DEFAULT_DELAY.as_secs()")]
    pub delay: u64,

    /// comma separated namespace prefixes of infrastructure pods, which are never deleted; entries are trimmed
    /// and empty entries are ignored, so "" deletes pods in every namespace (default "kube-,openshift-,infra-")
    #[argh(option)]
    pub infra_prefixes: Option<String>,

    /// skip the confirmation prompt
    #[argh(switch, short = 'y')]
    pub assumeyes: bool,

    /// minimum log level: debug, info, warn or error (default info)
    #[argh(option, default = "LogLevel::default()")]
    pub log_level: LogLevel,

    /// path to the kubeconfig file to use
    #[argh(option)]
    pub kubeconfig: Option<PathBuf>,

    /// name of the kubeconfig context to use
    #[argh(option)]
    pub context: Option<String>,

    /// print the version and exit
    #[argh(switch)]
    pub version: bool,

    /// name of the node to drain
    #[argh(positional)]
    pub node_name: Option<String>,
}

impl Arguments {
    pub(crate) fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            delay: Duration::from_secs(self.delay),
            assume_yes: self.assumeyes,
            infra_prefixes: self
                .infra_prefixes
                .as_deref()
                .map(parse_infra_prefixes)
                .unwrap_or_default(),
        }
    }
}

/// An explicitly empty list configures no prefixes at all, so that every Pod is an application Pod.
fn parse_infra_prefixes(prefixes: &str) -> InfraPrefixes {
    InfraPrefixes::new(
        prefixes
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty()),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Arguments {
        Arguments::from_args(&["slowdrain"], args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["n1"]);
        assert_eq!(args.node_name.as_deref(), Some("n1"));
        assert_eq!(args.log_level, LogLevel::Info);
        assert!(!args.version);
        assert_eq!(args.drain_config(), DrainConfig::default());
    }

    #[test]
    fn test_flags() {
        let args = parse(&[
            "-d",
            "5",
            "-y",
            "--infra-prefixes",
            "kube-, monitoring-",
            "--log-level",
            "debug",
            "--context",
            "staging",
            "n1",
        ]);

        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(args.context.as_deref(), Some("staging"));
        assert_eq!(
            args.drain_config(),
            DrainConfig {
                delay: Duration::from_secs(5),
                assume_yes: true,
                infra_prefixes: InfraPrefixes::new(["kube-", "monitoring-"]),
            }
        );
    }

    #[test]
    fn test_empty_infra_prefixes() {
        let config = parse(&["--infra-prefixes", "", "n1"]).drain_config();
        assert!(config.infra_prefixes.as_slice().is_empty());
        assert!(!config.infra_prefixes.is_infra("kube-system"));
    }

    #[test]
    fn test_empty_infra_prefix_entries_are_ignored() {
        let test_cases = vec!["kube-,", ",kube-", "kube-, ,", " kube- "];

        for value in test_cases {
            let config = parse(&["--infra-prefixes", value, "n1"]).drain_config();
            assert_eq!(config.infra_prefixes, InfraPrefixes::new(["kube-"]), "{:?}", value);
            assert!(config.infra_prefixes.is_infra("kube-system"));
            assert!(!config.infra_prefixes.is_infra("default"), "{:?}", value);
        }
    }

    #[test]
    fn test_invalid_arguments() {
        let test_cases: Vec<&[&str]> = vec![
            &["--log-level", "verbose", "n1"],
            &["--delay", "-3", "n1"],
            &["n1", "n2"],
        ];

        for args in test_cases {
            assert!(
                Arguments::from_args(&["slowdrain"], args).is_err(),
                "{:?}",
                args
            );
        }
    }

    #[test]
    fn test_version_without_node() {
        let args = parse(&["--version"]);
        assert!(args.version);
        assert_eq!(args.node_name, None);
    }
}
