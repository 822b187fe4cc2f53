use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "pipeline.yml";
pub const DEFAULT_ALERT_REGION: &str = "eu-west-3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found")]
    NotFound(Utf8PathBuf),
    #[error("reading config {path}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config {path}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("missing required config key `{0}`")]
    MissingField(&'static str),
    #[error("invalid repo.target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: &'static str },
    #[error("test.command must contain at least one word")]
    EmptyTestCommand,
}

/// Root configuration document, loaded once per invocation.
///
/// Every key is optional at parse time; each stage asks only for what it
/// needs through the accessors below.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineConfig {
    pub repo: Option<RepoConfig>,
    pub test: Option<TestConfig>,
    pub deploy: Option<DeployConfig>,
    #[serde(alias = "aws")]
    pub alert: Option<AlertConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoConfig {
    pub url: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    pub command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployConfig {
    pub branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertConfig {
    #[serde(alias = "sns_topic_arn")]
    pub topic_arn: Option<String>,
    pub region: Option<String>,
}

impl PipelineConfig {
    pub fn repo_url(&self) -> Result<&str, ConfigError> {
        self.repo
            .as_ref()
            .and_then(|repo| non_empty(repo.url.as_deref()))
            .ok_or(ConfigError::MissingField("repo.url"))
    }

    /// Name of the working copy directory, validated to be a single path component.
    pub fn target(&self) -> Result<&str, ConfigError> {
        let target = self
            .repo
            .as_ref()
            .and_then(|repo| repo.target.as_deref())
            .ok_or(ConfigError::MissingField("repo.target"))?;
        validate_target(target)?;
        Ok(target)
    }

    /// The configured test command split on whitespace into an argv.
    pub fn test_argv(&self) -> Result<Vec<String>, ConfigError> {
        let command = self
            .test
            .as_ref()
            .and_then(|test| test.command.as_deref())
            .ok_or(ConfigError::MissingField("test.command"))?;
        let argv: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
        if argv.is_empty() {
            return Err(ConfigError::EmptyTestCommand);
        }
        Ok(argv)
    }

    pub fn deploy_branch(&self) -> Result<&str, ConfigError> {
        self.deploy
            .as_ref()
            .and_then(|deploy| non_empty(deploy.branch.as_deref()))
            .ok_or(ConfigError::MissingField("deploy.branch"))
    }

    /// Alert destination, or `None` when alerting is disabled.
    pub fn alert_destination(&self) -> Option<AlertDestination<'_>> {
        let alert = self.alert.as_ref()?;
        let topic_arn = non_empty(alert.topic_arn.as_deref())?;
        let region = non_empty(alert.region.as_deref()).unwrap_or(DEFAULT_ALERT_REGION);
        Some(AlertDestination { topic_arn, region })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AlertDestination<'a> {
    pub topic_arn: &'a str,
    pub region: &'a str,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_target(target: &str) -> Result<(), ConfigError> {
    let reason = if target.trim().is_empty() {
        Some("must not be empty")
    } else if target == "." || target == ".." {
        Some("must name a directory, not `.` or `..`")
    } else if target.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if target.contains('\0') {
        Some("must not contain NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidTarget {
            target: target.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Load a configuration file from disk and deserialize it.
pub fn load_from_path(path: &Utf8Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_owned()));
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    parse(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn parse(raw: &str) -> Result<PipelineConfig, serde_yml::Error> {
    if raw.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    serde_yml::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
repo:
  url: https://example/repo.git
  target: demo
test:
  command: "cargo test --workspace"
deploy:
  branch: main
aws:
  sns_topic_arn: arn:aws:sns:eu-west-3:123456789012:pipeline
"#;

    #[test]
    fn reads_every_section() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.repo_url().unwrap(), "https://example/repo.git");
        assert_eq!(config.target().unwrap(), "demo");
        assert_eq!(config.test_argv().unwrap(), ["cargo", "test", "--workspace"]);
        assert_eq!(config.deploy_branch().unwrap(), "main");

        let destination = config.alert_destination().unwrap();
        assert_eq!(
            destination.topic_arn,
            "arn:aws:sns:eu-west-3:123456789012:pipeline"
        );
        assert_eq!(destination.region, DEFAULT_ALERT_REGION);
    }

    #[test]
    fn generic_alert_section_is_accepted() {
        let config = parse("alert:\n  topic_arn: arn:topic\n  region: us-east-1\n").unwrap();
        let destination = config.alert_destination().unwrap();
        assert_eq!(destination.topic_arn, "arn:topic");
        assert_eq!(destination.region, "us-east-1");
    }

    #[test]
    fn alerting_is_disabled_without_topic() {
        assert!(parse(SAMPLE.split("aws:").next().unwrap())
            .unwrap()
            .alert_destination()
            .is_none());
        assert!(parse("aws:\n  region: eu-west-1\n")
            .unwrap()
            .alert_destination()
            .is_none());
    }

    #[test]
    fn missing_fields_are_reported_by_key() {
        let config = parse("repo:\n  target: demo\n").unwrap();
        assert!(matches!(
            config.repo_url(),
            Err(ConfigError::MissingField("repo.url"))
        ));
        assert!(matches!(
            config.test_argv(),
            Err(ConfigError::MissingField("test.command"))
        ));
        assert!(matches!(
            config.deploy_branch(),
            Err(ConfigError::MissingField("deploy.branch"))
        ));
        assert!(config.target().is_ok());
    }

    #[test]
    fn empty_document_is_an_empty_config() {
        let config = parse("   \n").unwrap();
        assert!(config.repo.is_none());
        assert!(matches!(
            config.target(),
            Err(ConfigError::MissingField("repo.target"))
        ));
    }

    #[test]
    fn target_must_be_a_single_safe_component() {
        for bad in ["", "  ", ".", "..", "a/b", "..\\up", "nul\0byte"] {
            let config = PipelineConfig {
                repo: Some(RepoConfig {
                    url: None,
                    target: Some(bad.to_owned()),
                }),
                ..PipelineConfig::default()
            };
            assert!(
                matches!(config.target(), Err(ConfigError::InvalidTarget { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_test_command_is_rejected() {
        let config = parse("test:\n  command: \"   \"\n").unwrap();
        assert!(matches!(
            config.test_argv(),
            Err(ConfigError::EmptyTestCommand)
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(ConfigError::NotFound(p)) if p == path
        ));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        fs::write(&path, "repo: [unterminated\n").unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));

        fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_from_path(&path).unwrap().target().unwrap(), "demo");
    }
}
