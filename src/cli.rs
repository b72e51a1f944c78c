use crate::defaults::DEFAULT_NOT_FOUND_TOKEN;
use crate::policy::{NotFoundMode, PolicySettings};
use crate::resource::{FamilyKind, Operation};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "settle")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Wait for cloud resources to converge and build sparse update payloads",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/settle/config.toml)
    #[arg(long, global = true, env = "SETTLE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll a describe command until the resource converges
    Wait(WaitArgs),

    /// Read a resource's state once, retrying transient errors
    Describe(DescribeArgs),

    /// Compute the sparse update payload between two JSON documents
    Diff(DiffArgs),

    /// Show whether service error codes are retried
    Classify(ClassifyArgs),

    /// List resource families, their states and operation presets
    Families(FamiliesArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Wait
// ============================================================================

#[derive(Args)]
pub struct WaitArgs {
    /// State family used to parse describe output
    #[arg(short, long, value_enum)]
    pub family: Option<FamilyKind>,

    /// Named policy from the config file
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Use the family's preset for this operation
    #[arg(short, long, value_enum)]
    pub operation: Option<Operation>,

    /// State meaning "still in progress" (repeatable)
    #[arg(long = "pending", value_name = "STATE")]
    pub pending: Vec<String>,

    /// State meaning "done" (repeatable)
    #[arg(long = "target", value_name = "STATE")]
    pub target: Vec<String>,

    /// Overall deadline, e.g. "10m"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Minimum time between describe calls, e.g. "5s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// What a missing resource means
    #[arg(long, value_enum)]
    pub not_found: Option<NotFoundMode>,

    /// Consecutive not-found reads tolerated with `--not-found tolerate`
    #[arg(long)]
    pub not_found_checks: Option<u32>,

    /// Consecutive target observations required
    #[arg(long)]
    pub occurrences: Option<u32>,

    /// Command printing the current state token
    #[arg(short, long, value_name = "COMMAND")]
    pub describe_cmd: String,

    /// Command starting the operation and printing its id
    #[arg(short, long, value_name = "COMMAND", conflicts_with = "id")]
    pub submit_cmd: Option<String>,

    /// Resource id to wait on (`key` or `key#secondary`)
    #[arg(long, required_unless_present = "submit_cmd")]
    pub id: Option<String>,

    /// Describe output meaning the resource does not exist
    #[arg(long, default_value = DEFAULT_NOT_FOUND_TOKEN)]
    pub not_found_token: String,

    /// Extra service error code to retry (repeatable)
    #[arg(long = "retryable-code", value_name = "CODE")]
    pub retryable_codes: Vec<String>,

    /// Describe calls per second across the wait
    #[arg(long, requires = "burst")]
    pub rate: Option<f64>,

    /// Calls allowed back to back
    #[arg(long, requires = "rate")]
    pub burst: Option<u32>,

    /// Deadline for retrying the submit command
    #[arg(long, value_parser = humantime::parse_duration)]
    pub submit_timeout: Option<Duration>,
}

impl WaitArgs {
    /// Policy settings given on the command line
    pub fn settings(&self) -> PolicySettings {
        PolicySettings {
            operation: self.operation,
            pending: self.pending.clone(),
            target: self.target.clone(),
            timeout: self.timeout,
            interval: self.interval,
            not_found: self.not_found,
            not_found_checks: self.not_found_checks,
            occurrences: self.occurrences,
        }
    }
}

// ============================================================================
// Describe
// ============================================================================

#[derive(Args)]
pub struct DescribeArgs {
    /// State family used to parse describe output
    #[arg(short, long, value_enum)]
    pub family: FamilyKind,

    /// Command printing the current state token
    #[arg(short, long, value_name = "COMMAND")]
    pub describe_cmd: String,

    /// Resource id (`key` or `key#secondary`)
    #[arg(long)]
    pub id: String,

    /// Describe output meaning the resource does not exist
    #[arg(long, default_value = DEFAULT_NOT_FOUND_TOKEN)]
    pub not_found_token: String,

    /// Extra service error code to retry (repeatable)
    #[arg(long = "retryable-code", value_name = "CODE")]
    pub retryable_codes: Vec<String>,

    /// Deadline for retrying the read, e.g. "30s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Args)]
pub struct DiffArgs {
    /// Document as last applied
    pub previous: PathBuf,

    /// Document as it should be
    pub desired: PathBuf,

    /// Print the operation list instead of the payload
    #[arg(long, conflicts_with = "apply")]
    pub ops: bool,

    /// Print the previous document with the payload merged in
    #[arg(long)]
    pub apply: bool,
}

// ============================================================================
// Classify
// ============================================================================

#[derive(Args)]
pub struct ClassifyArgs {
    /// Service error codes, e.g. ResourceInUse.Instance
    #[arg(required = true)]
    pub codes: Vec<String>,

    /// Extra service error code to retry (repeatable)
    #[arg(long = "retryable-code", value_name = "CODE")]
    pub retryable_codes: Vec<String>,
}

// ============================================================================
// Families
// ============================================================================

#[derive(Args)]
pub struct FamiliesArgs {
    /// Only show this family
    #[arg(value_enum)]
    pub family: Option<FamilyKind>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_wait_args() {
        let cli = Cli::parse_from([
            "settle",
            "-v",
            "wait",
            "--family",
            "cvm-instance",
            "--operation",
            "create",
            "--target",
            "RUNNING",
            "--target",
            "STOPPED",
            "--timeout",
            "90s",
            "--describe-cmd",
            "echo RUNNING",
            "--id",
            "ins-1",
        ]);
        assert_eq!(cli.verbose, 1);
        let Command::Wait(args) = cli.command else {
            panic!("expected wait");
        };
        assert_eq!(args.family, Some(FamilyKind::CvmInstance));
        assert_eq!(args.operation, Some(Operation::Create));
        assert_eq!(args.target, vec!["RUNNING", "STOPPED"]);
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
        assert_eq!(args.not_found_token, DEFAULT_NOT_FOUND_TOKEN);

        let settings = args.settings();
        assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
        assert!(settings.pending.is_empty());
    }

    #[test]
    fn test_wait_requires_id_or_submit() {
        let result = Cli::try_parse_from(["settle", "wait", "--describe-cmd", "true"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "settle",
            "wait",
            "--describe-cmd",
            "true",
            "--submit-cmd",
            "echo ins-1",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_rate_requires_burst() {
        let result = Cli::try_parse_from([
            "settle",
            "wait",
            "--describe-cmd",
            "true",
            "--id",
            "x",
            "--rate",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        let result = Cli::try_parse_from([
            "settle",
            "wait",
            "--describe-cmd",
            "true",
            "--id",
            "x",
            "--timeout",
            "soon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_diff_flags_conflict() {
        let result = Cli::try_parse_from(["settle", "diff", "a.json", "b.json", "--ops", "--apply"]);
        assert!(result.is_err());
    }
}
