use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Top-level CLI definition: one stage per invocation.
#[derive(Parser, Debug)]
#[command(name = "deployer", version, about = "Minimal CI/CD pipeline runner")]
pub struct Cli {
    /// Stage to run.
    #[arg(value_enum)]
    pub stage: Stage,
    /// Root directory holding `logs/` and `cloned_projects/`.
    #[arg(short = 'C', long = "base-dir")]
    pub base_dir: Option<PathBuf>,
    /// Pipeline configuration (defaults to `<base-dir>/pipeline.yml`).
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,
    #[arg(long = "no-color")]
    pub no_color: bool,
}

/// Closed set of stages the engine knows how to run.
#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Clone,
    Build,
    Test,
    Deploy,
    Rollback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clone => "clone",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::Deploy => "deploy",
            Stage::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Helper entry point so `main` can stay minimal.
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_and_flags() {
        let cli = Cli::try_parse_from([
            "deployer",
            "--base-dir",
            "/srv/ci",
            "-f",
            "/srv/ci/other.yml",
            "--no-color",
            "deploy",
        ])
        .unwrap();
        assert_eq!(cli.stage, Stage::Deploy);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/srv/ci")));
        assert_eq!(cli.file, Some(PathBuf::from("/srv/ci/other.yml")));
        assert!(cli.no_color);
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["deployer", "publish"]).is_err());
        assert!(Cli::try_parse_from(["deployer"]).is_err());
    }

    #[test]
    fn stage_names_round_trip_through_value_enum() {
        for stage in Stage::value_variants() {
            let parsed = Stage::from_str(stage.as_str(), false).unwrap();
            assert_eq!(parsed, *stage);
        }
    }
}
