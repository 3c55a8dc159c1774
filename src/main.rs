//! Errata Reconcile CLI entrypoint.
//!
//! This is the main entrypoint for the errata-reconcile command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use errata_reconcile::cli::{Cli, Commands, LabelKind, OutputFormatter};
use errata_reconcile::client::ErrataClient;
use errata_reconcile::config::{
    find_manifest_file, Manifest, ManifestParser, ManifestValidator,
};
use errata_reconcile::error::Result;
use errata_reconcile::labels::{default_solutions, exd_org_groups, Resolvers};
use errata_reconcile::reconciler::{Reconciler, RunReport};
use errata_reconcile::resources::{raw_request, user_info, Session};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let manifest_path = cli.manifest.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(manifest_path, warnings, &formatter),
        Commands::Plan { diff } => cmd_plan(manifest_path, diff, &formatter).await,
        Commands::Apply { yes } => cmd_apply(manifest_path, yes, &formatter).await,
        Commands::UserInfo { login_name } => {
            cmd_user_info(manifest_path, &login_name, &formatter).await
        }
        Commands::Request {
            path,
            method,
            content,
        } => cmd_request(manifest_path, &path, &method, content, &formatter).await,
        Commands::Labels { enumeration } => {
            cmd_labels(manifest_path, enumeration, &formatter).await
        }
    }
}

/// Write a manifest template.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing manifest in: {}", path.display());

    let manifest_path = path.join("errata.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && manifest_path.exists() {
        eprintln!("Manifest already exists: {}", manifest_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&manifest_path, include_str!("../templates/errata.yaml"))?;
    eprintln!("Created: {}", manifest_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.lines().any(|line| line.trim() == ".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n.env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Copy .env.example to .env and set your server and token");
    eprintln!("  2. Edit errata.yaml");
    eprintln!("  3. Run 'errata-reconcile plan'");
    Ok(())
}

/// Validate the manifest.
fn cmd_validate(
    manifest_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let manifest_file = resolve_manifest_path(manifest_path)?;
    info!("Validating manifest: {}", manifest_file.display());

    let manifest = ManifestParser::new().load_file(&manifest_file)?;
    let result = ManifestValidator::new().check(&manifest);
    println!("{}", formatter.format_validation(&result, &manifest, show_warnings));

    // Report every error above, then fail with the first.
    ManifestValidator::new().validate(&manifest)?;
    Ok(())
}

/// Show what would change.
async fn cmd_plan(
    manifest_path: Option<&PathBuf>,
    show_diff: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (manifest, session) = load_manifest_and_session(manifest_path)?;
    let reports = Reconciler::new(&session).apply_manifest(&manifest, true).await?;
    println!("{}", formatter.format_reports(&reports, true, show_diff));
    Ok(())
}

/// Reconcile for real.
async fn cmd_apply(
    manifest_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (manifest, session) = load_manifest_and_session(manifest_path)?;
    let reconciler = Reconciler::new(&session);

    if !auto_approve {
        let plan = reconciler.apply_manifest(&manifest, true).await?;
        if RunReport::changed_count(&plan) == 0 {
            eprintln!("No changes to apply.");
            return Ok(());
        }
        eprintln!("{}", formatter.format_reports(&plan, true, false));

        eprint!("Do you want to apply these changes? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(());
        }
    }

    let reports = reconciler.apply_manifest(&manifest, false).await?;
    println!("{}", formatter.format_reports(&reports, false, false));
    Ok(())
}

/// Look up a user account.
async fn cmd_user_info(
    manifest_path: Option<&PathBuf>,
    login_name: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let client = create_client(manifest_path)?;
    let info = user_info(&client, login_name, false).await?;
    println!("{}", formatter.format_user_info(login_name, &info));
    Ok(())
}

/// Send a raw API request.
async fn cmd_request(
    manifest_path: Option<&PathBuf>,
    path: &str,
    method: &str,
    return_content: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let client = create_client(manifest_path)?;
    let response = raw_request(&client, method, path, return_content).await?;
    println!("{}", formatter.format_raw(&response));
    Ok(())
}

/// List a label enumeration.
async fn cmd_labels(
    manifest_path: Option<&PathBuf>,
    enumeration: LabelKind,
    formatter: &OutputFormatter,
) -> Result<()> {
    let manifest = load_optional_manifest(manifest_path)?;
    let client = ErrataClient::new(&ManifestParser::server_from_env(&manifest.server)?)?;
    let resolvers = Resolvers::from_config(&client, &manifest.labels);

    let resolver = match enumeration {
        LabelKind::PushTargets => resolvers.push_targets,
        LabelKind::WorkflowRules => resolvers.workflow_rules,
        LabelKind::DefaultSolutions => default_solutions(&client),
        LabelKind::ExdOrgGroups => exd_org_groups(&client),
    };
    let output = formatter.format_labels(resolver.table().await?);
    println!("{output}");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the manifest path.
fn resolve_manifest_path(manifest_path: Option<&PathBuf>) -> Result<PathBuf> {
    manifest_path.map_or_else(|| find_manifest_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` next to the manifest, then the manifest itself.
fn load_manifest(manifest_file: &Path) -> Result<Manifest> {
    let parser = ManifestParser::new()
        .with_base_path(manifest_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_file(manifest_file)
}

/// Loads the manifest if one is given or found, otherwise an empty one.
fn load_optional_manifest(manifest_path: Option<&PathBuf>) -> Result<Manifest> {
    if let Some(path) = manifest_path {
        return load_manifest(path);
    }
    match find_manifest_file(".") {
        Ok(path) => load_manifest(&path),
        Err(_) => {
            debug!("No manifest found; using environment settings only");
            ManifestParser::new().load_dotenv()?;
            Ok(Manifest::default())
        }
    }
}

/// Loads and validates the manifest, and connects to the server.
fn load_manifest_and_session(manifest_path: Option<&PathBuf>) -> Result<(Manifest, Session)> {
    let manifest_file = resolve_manifest_path(manifest_path)?;
    debug!("Loading manifest from: {}", manifest_file.display());

    let manifest = load_manifest(&manifest_file)?;
    ManifestValidator::new().validate(&manifest)?;

    let server = ManifestParser::server_from_env(&manifest.server)?;
    info!("Using Errata Tool at {}", server.url);
    let client = ErrataClient::new(&server)?;
    let labels = Resolvers::from_config(&client, &manifest.labels);
    let session = Session::new(client, labels)
        .with_strict_user_check(ManifestParser::strict_user_check_from_env());

    Ok((manifest, session))
}

/// Creates a client from the manifest's server section, if any, and the
/// environment.
fn create_client(manifest_path: Option<&PathBuf>) -> Result<ErrataClient> {
    let manifest = load_optional_manifest(manifest_path)?;
    ErrataClient::new(&ManifestParser::server_from_env(&manifest.server)?)
}
