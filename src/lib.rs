// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Errata Reconcile
//!
//! Declarative, idempotent configuration management for the Errata Tool.
//!
//! ## Overview
//!
//! Products, product versions, variants, releases, RHEL releases, users and
//! CDN repositories are described in a YAML manifest. Each run reads the live
//! settings of every declared object, diffs them against the manifest, and
//! sends only the changed fields:
//!
//! - Check mode reports the changes without writing anything
//! - Lists are compared as sets, so reordering is not a change
//! - Change lines read like `changing active from False to True`
//! - Before/after data is available for diff viewers
//!
//! ## Architecture
//!
//! 1. **Desired State**: Defined in `errata.yaml`
//! 2. **Current State**: Read from the Errata Tool API, flattened to settings
//! 3. **Reconciler**: Diffs the two and creates or edits the object
//!
//! Several endpoints only accept internal integer IDs for values people know
//! by name. The [`labels`] module resolves those names, scraping HTML pages
//! where no API exists.
//!
//! ## Modules
//!
//! - [`settings`]: Settings differ and change describer
//! - [`fields`]: Wire-name to logical-name field mapping
//! - [`client`]: Errata Tool HTTP client
//! - [`labels`]: Label to ID resolution
//! - [`resources`]: Per-resource fetch, create and edit
//! - [`reconciler`]: State reconciliation engine
//! - [`config`]: Manifest parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! products:
//!   - short_name: RHCEPH
//!     name: Red Hat Ceph Storage
//!     description: Red Hat Ceph Storage
//!     push_targets: [ftp, cdn_stage, cdn]
//!     default_solution: enterprise
//!     state_machine_rule_set: Default
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod labels;
pub mod reconciler;
pub mod resources;
pub mod settings;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use client::{ApiResponse, ErrataClient};
pub use config::{Manifest, ManifestParser, ManifestValidator};
pub use error::{ErrataError, Result};
pub use labels::{LabelResolver, LabelTable, Resolvers};
pub use reconciler::{ReconcileOutcome, Reconciler, RunReport};
pub use resources::{ManagedResource, Session};
pub use settings::{describe_changes, diff_settings, task_diff, Difference, Settings, TaskDiff};
