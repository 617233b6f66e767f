//! The `lifecycle.toml` configuration file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use lifecycle::{Delay, PolicyOverride, PolicyRecord, PolicyRegistry, PolicyStore, RepositoryId};
use manager::ManagerConfig;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_SIGNAL_TIMEOUT: Delay = Delay::seconds(30);
const DEFAULT_MAX_RATE_LIMIT_WAIT: Delay = Delay::seconds(15 * 60);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    repos: Vec<RepositoryId>,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    signal_timeout: Option<Delay>,
    #[serde(default)]
    github: GithubSection,
    #[serde(default)]
    zenhub: ZenhubSection,
    #[serde(default)]
    lifecycle: Option<LifecycleSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GithubSection {
    api_url: Option<String>,
    max_rate_limit_wait: Option<Delay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ZenhubSection {
    api_url: Option<String>,
}

/// `[lifecycle]`: the default record's fields plus `[[lifecycle.overrides]]`.
///
/// Both are kept as raw tables and read into [`PolicyRecord`] afterwards;
/// `deny_unknown_fields` has no effect through `flatten`.
#[derive(Debug, Deserialize)]
struct LifecycleSection {
    #[serde(default)]
    overrides: Vec<toml::Table>,
    #[serde(flatten)]
    default: toml::Table,
}

/// Validated configuration, ready for wiring.
#[derive(Debug)]
pub struct Config {
    pub policies: PolicyRegistry,
    pub manager: ManagerConfig,
    pub github_api_url: Option<String>,
    pub max_rate_limit_wait: Duration,
    pub zenhub_api_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;

        let (default, overrides) = match file.lifecycle {
            None => (None, Vec::new()),
            Some(section) => {
                let default = if section.default.is_empty() {
                    None
                } else {
                    let record = toml::Value::Table(section.default)
                        .try_into::<PolicyRecord>()
                        .context("invalid [lifecycle] default record")?;
                    Some(record)
                };
                let overrides = section
                    .overrides
                    .into_iter()
                    .enumerate()
                    .map(|(position, table)| parse_override(position, table))
                    .collect::<Result<Vec<_>>>()?;
                (default, overrides)
            }
        };

        let policies = PolicyRegistry::new(file.repos, default, overrides)?;
        warn_about_ordering(&policies);

        let concurrency = file.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        anyhow::ensure!(concurrency > 0, "concurrency must be at least 1");

        Ok(Self {
            policies,
            manager: ManagerConfig {
                concurrency,
                signal_timeout: to_duration(file.signal_timeout.unwrap_or(DEFAULT_SIGNAL_TIMEOUT)),
            },
            github_api_url: file.github.api_url,
            max_rate_limit_wait: to_duration(
                file.github
                    .max_rate_limit_wait
                    .unwrap_or(DEFAULT_MAX_RATE_LIMIT_WAIT),
            ),
            zenhub_api_url: file.zenhub.api_url,
        })
    }
}

/// One `[[lifecycle.overrides]]` entry: `repos` plus record fields.
fn parse_override(position: usize, mut table: toml::Table) -> Result<PolicyOverride> {
    let repos = table
        .remove("repos")
        .map(|value| value.try_into::<Vec<RepositoryId>>())
        .transpose()
        .with_context(|| format!("invalid repos in lifecycle override #{position}"))?
        .unwrap_or_default();
    let record = toml::Value::Table(table)
        .try_into::<PolicyRecord>()
        .with_context(|| format!("invalid lifecycle override #{position}"))?;
    Ok(PolicyOverride { repos, record })
}

fn to_duration(delay: Delay) -> Duration {
    Duration::from_secs(delay.as_secs())
}

fn warn_about_ordering(policies: &PolicyRegistry) {
    for repository in policies.repositories() {
        let Some(record) = policies.record_for(repository) else {
            warn!(%repository, "No lifecycle policy applies; repository will be skipped");
            continue;
        };
        for kind in record.ordering_violations() {
            warn!(
                %repository,
                %kind,
                "Close delay is not longer than stale delay; items may close without a stale warning"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use lifecycle::PolicyError;
    use pretty_assertions::assert_eq;

    use super::*;

    fn repo(name: &str) -> RepositoryId {
        name.parse().unwrap()
    }

    #[test]
    fn full_file_is_parsed() {
        let config = Config::parse(
            r#"
            repos = ["istio/istio", "istio/api"]
            concurrency = 2
            signal_timeout = "45s"

            [github]
            api_url = "https://github.example.com/api/v3"
            max_rate_limit_wait = "5m"

            [lifecycle]
            triage_delay = "2d"
            close_label = "lifecycle/automatically-closed"
            stale_comment = "Stale since {last_activity}."

            [[lifecycle.overrides]]
            repos = ["istio/api"]
            issue_stale_delay = "90d"
            "#,
        )
        .unwrap();

        assert_eq!(config.manager.concurrency, 2);
        assert_eq!(config.manager.signal_timeout, Duration::from_secs(45));
        assert_eq!(config.max_rate_limit_wait, Duration::from_secs(300));
        assert_eq!(
            config.github_api_url.as_deref(),
            Some("https://github.example.com/api/v3")
        );

        let istio = config.policies.record_for(&repo("istio/istio")).unwrap();
        assert_eq!(istio.triage_delay, Delay::days(2));
        assert_eq!(istio.close_label, "lifecycle/automatically-closed");
        assert_eq!(istio.issue_stale_delay, Delay::days(30));

        // Overrides replace the default record wholesale.
        let api = config.policies.record_for(&repo("istio/api")).unwrap();
        assert_eq!(api.issue_stale_delay, Delay::days(90));
        assert_eq!(api.triage_delay, Delay::ZERO);
        assert_eq!(api.close_label, "");
    }

    #[test]
    fn minimal_file_uses_defaults_and_no_default_record() {
        let config = Config::parse(r#"repos = ["istio/istio"]"#).unwrap();

        assert_eq!(config.manager, ManagerConfig::default());
        assert_eq!(config.max_rate_limit_wait, Duration::from_secs(900));
        assert!(config.policies.record_for(&repo("istio/istio")).is_none());
    }

    #[test]
    fn overrides_alone_do_not_create_a_default() {
        let config = Config::parse(
            r#"
            repos = ["istio/istio", "istio/api"]

            [[lifecycle.overrides]]
            repos = ["istio/api"]
            "#,
        )
        .unwrap();

        assert!(config.policies.record_for(&repo("istio/istio")).is_none());
        assert_eq!(
            config.policies.record_for(&repo("istio/api")),
            Some(&PolicyRecord::default())
        );
    }

    #[test]
    fn one_record_per_repository() {
        let err = Config::parse(
            r#"
            repos = ["istio/istio"]

            [[lifecycle.overrides]]
            repos = ["istio/istio"]

            [[lifecycle.overrides]]
            repos = ["istio/istio"]
            issue_close_delay = "10d"
            "#,
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<PolicyError>(),
            Some(&PolicyError::MultipleRecords(repo("istio/istio")))
        );
    }

    #[test]
    fn misspelled_policy_keys_are_rejected() {
        let err = Config::parse(
            r#"
            repos = ["istio/istio"]

            [lifecycle]
            issue_close_dealy = "5d"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("issue_close_dealy"), "{err:#}");

        let err = Config::parse(
            r#"
            repos = ["istio/istio"]

            [[lifecycle.overrides]]
            repos = ["istio/istio"]
            isue_stale_delay = "1d"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("isue_stale_delay"), "{err:#}");
    }

    #[test]
    fn override_without_repos_is_rejected() {
        let err = Config::parse(
            r#"
            repos = ["istio/istio"]

            [[lifecycle.overrides]]
            issue_stale_delay = "1d"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PolicyError>(),
            Some(&PolicyError::EmptyOverride(0))
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Config::parse(r#"repos = ["istio"]"#).is_err());
        assert!(Config::parse("repos = []\nsignal_timeout = \"5w\"").is_err());
        assert!(Config::parse("repos = []\nconcurrency = 0").is_err());
        assert!(Config::parse("repos = []\nunknown = true").is_err());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"repos = ["istio/istio"]"#).unwrap();
        writeln!(file, "[lifecycle]").unwrap();
        writeln!(file, r#"ignore_labels = ["lifecycle/frozen"]"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        let record = config.policies.record_for(&repo("istio/istio")).unwrap();
        assert!(record.is_ignore_label("lifecycle/frozen"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Config::load(Path::new("/nonexistent/lifecycle.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lifecycle.toml"));
    }
}
