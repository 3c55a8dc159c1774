//! CLI module for the Errata Reconcile tool.
//!
//! This module provides the command-line interface for reconciling
//! Errata Tool configuration against a manifest.

mod commands;
mod output;

pub use commands::{Cli, Commands, LabelKind, OutputFormat};
pub use output::OutputFormatter;
