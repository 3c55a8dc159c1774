//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Errata Reconcile - Declarative Errata Tool configuration manager.
#[derive(Parser, Debug)]
#[command(name = "errata-reconcile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the manifest file.
    #[arg(short, long, global = true, env = "ERRATA_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a manifest template.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the manifest.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what would change, without writing anything.
    Plan {
        /// Show before/after settings for changed resources.
        #[arg(short, long)]
        diff: bool,
    },

    /// Bring the Errata Tool to the state in the manifest.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Look up a user account.
    UserInfo {
        /// Login name, e.g. `kdreyer@redhat.com`.
        login_name: String,
    },

    /// Send a raw API request.
    Request {
        /// API path, e.g. `api/v1/releases?filter[name]=rhceph-4.0`.
        path: String,

        /// HTTP method.
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Include the raw response body.
        #[arg(long)]
        content: bool,
    },

    /// List the IDs behind a label enumeration.
    Labels {
        /// Enumeration to list.
        #[arg(value_enum)]
        enumeration: LabelKind,
    },
}

/// Label enumerations the CLI can list.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LabelKind {
    /// Push targets.
    PushTargets,
    /// Workflow rule sets.
    WorkflowRules,
    /// Default solutions.
    DefaultSolutions,
    /// EXD org groups.
    ExdOrgGroups,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_with_global_options() {
        let cli = Cli::try_parse_from([
            "errata-reconcile",
            "plan",
            "--manifest",
            "ceph.yaml",
            "--output",
            "json",
            "--diff",
        ])
        .expect("parse");
        assert_eq!(cli.manifest, Some(PathBuf::from("ceph.yaml")));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Plan { diff: true }));
    }

    #[test]
    fn test_request_defaults_to_get() {
        let cli = Cli::try_parse_from(["errata-reconcile", "request", "api/v1/user/me"])
            .expect("parse");
        match cli.command {
            Commands::Request {
                path,
                method,
                content,
            } => {
                assert_eq!(path, "api/v1/user/me");
                assert_eq!(method, "GET");
                assert!(!content);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_labels_enumeration() {
        let cli = Cli::try_parse_from(["errata-reconcile", "labels", "workflow-rules"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Labels {
                enumeration: LabelKind::WorkflowRules
            }
        ));
    }
}
