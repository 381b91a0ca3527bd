use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::allowlist::{Allowlist, DEFAULT_BANKS};
use crate::batch::{BatchPolicy, DEFAULT_CHECKPOINT_EVERY, DEFAULT_ERROR_SAMPLE};

#[derive(Parser, Debug)]
#[command(
    name = "loader",
    about = "Loads classified bank reviews into the banks/reviews schema"
)]
pub struct Args {
    /// Path to the analyzed reviews CSV
    #[arg(long, default_value = "data/analyzed_reviews.csv")]
    pub input: PathBuf,

    /// Dry run - load into an in-memory store instead of the database
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Commit after this many successful inserts
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_EVERY as u64, value_parser = clap::value_parser!(u64).range(1..))]
    pub checkpoint_every: u64,

    /// Number of row errors shown in the final report
    #[arg(long, default_value_t = DEFAULT_ERROR_SAMPLE)]
    pub error_sample: usize,

    /// Allowed bank label (repeatable)
    #[arg(long = "allow", value_name = "LABEL", default_values_t = DEFAULT_BANKS.map(String::from))]
    pub allow: Vec<String>,
}

/// Where the pipeline writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Postgres { db_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub target: StoreTarget,
    pub policy: BatchPolicy,
    pub allowlist: Allowlist,
}

impl Config {
    /// Combines CLI arguments with the environment. `DB_URL` is only
    /// required when writing to Postgres.
    pub fn from_args(args: Args) -> Result<Self> {
        let target = if args.dry_run {
            StoreTarget::Memory
        } else {
            StoreTarget::Postgres {
                db_url: std::env::var("DB_URL").context("DB_URL env var missing")?,
            }
        };

        Ok(Self {
            input: args.input,
            target,
            policy: BatchPolicy {
                checkpoint_every: usize::try_from(args.checkpoint_every)
                    .context("checkpoint interval out of range")?,
                error_sample: args.error_sample,
            },
            allowlist: Allowlist::new(args.allow),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["loader", "--dry-run"]).unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.input, PathBuf::from("data/analyzed_reviews.csv"));
        assert_eq!(config.target, StoreTarget::Memory);
        assert_eq!(config.policy, BatchPolicy::default());
        assert_eq!(config.allowlist, Allowlist::default());
    }

    #[test]
    fn test_custom_allowlist_and_policy() {
        let args = Args::try_parse_from([
            "loader",
            "--dry-run",
            "--input",
            "reviews.csv",
            "--checkpoint-every",
            "25",
            "--error-sample",
            "10",
            "--allow",
            "Awash",
            "--allow",
            "Zemen",
        ])
        .unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.policy.checkpoint_every, 25);
        assert_eq!(config.policy.error_sample, 10);
        assert!(config.allowlist.contains("Zemen"));
        assert!(!config.allowlist.contains("CBE"));
    }

    #[test]
    fn test_zero_checkpoint_rejected() {
        let result = Args::try_parse_from(["loader", "--checkpoint-every", "0"]);
        assert!(result.is_err());
    }
}
