//! declplan CLI entrypoint.
//!
//! This is the main entrypoint for the declplan command-line tool.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use declplan::cli::{Cli, Commands, LogFormat, ModeArg, OutputFormatter};
use declplan::config::{ConfigParser, ConfigValidator, ResourceSet, find_config_file};
use declplan::error::{ConfigError, PlannerError, Result};
use declplan::planner::{Plan, PlanHasher, PlanOptions, Planner};
use declplan::state::SnapshotStateProvider;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for failures caused by the inputs rather than the tool.
const EXIT_USER_ERROR: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.log_format);

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
            if e.is_user_error() {
                ExitCode::from(EXIT_USER_ERROR)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`. Logs go to stderr so that
/// stdout carries only command output.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Plan {
            state,
            mode,
            generator,
            out,
        } => {
            cmd_plan(
                cli.config.as_deref(),
                state.as_deref(),
                mode,
                generator,
                out.as_deref(),
                &formatter,
            )
            .await
        }
        Commands::Validate { warnings } => cmd_validate(cli.config.as_deref(), warnings, &formatter),
        Commands::Show { plan } => cmd_show(&plan, &formatter).await,
    }
}

/// Generate a plan.
async fn cmd_plan(
    config_path: Option<&Path>,
    state_path: Option<&Path>,
    mode: ModeArg,
    generator: Option<String>,
    out: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let resources = load_resources(config_path)?;
    ConfigValidator::new().validate(&resources)?;

    let provider = match state_path {
        Some(path) => SnapshotStateProvider::load(path).await?,
        None => {
            warn!("No state snapshot given; planning against empty state");
            SnapshotStateProvider::default()
        }
    };

    // Snapshot types are planned too so that sync can delete them
    let mut resource_types: BTreeSet<String> = resources
        .resource_types()
        .into_iter()
        .map(str::to_string)
        .collect();
    resource_types.extend(
        provider
            .snapshot()
            .resources
            .iter()
            .map(|r| r.resource_type.clone()),
    );
    debug!("Planning resource types: {resource_types:?}");

    let planner = Planner::new(provider).with_declarative_types(resource_types);

    let mut options = PlanOptions::new(mode.into());
    if let Some(generator) = generator {
        options = options.with_generator(generator);
    }

    let plan = planner.generate_plan(&resources, &options).await?;
    let digest = PlanHasher::new().hash_plan(&plan);
    info!(
        "Planned {} change(s), digest {}",
        plan.summary.total_changes,
        PlanHasher::new().short_hash(&digest)
    );

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&plan)?;
        tokio::fs::write(path, json).await?;
        info!("Plan written to {}", path.display());
    }

    print_output(&formatter.format_plan(&plan, &digest))
}

/// Validate the desired-state document.
fn cmd_validate(config_path: Option<&Path>, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let resources = load_resources(config_path)?;
    let result = ConfigValidator::new().collect(&resources);

    print_output(&formatter.format_validation(&result, show_warnings))?;

    match result.errors.first() {
        None => Ok(()),
        Some(first) => Err(PlannerError::Config(ConfigError::validation(
            format!("{} validation error(s), first: {}", result.error_count(), first.message),
            first.field.clone(),
        ))),
    }
}

/// Load a saved plan, check that it round-trips, and display it.
async fn cmd_show(plan_path: &Path, formatter: &OutputFormatter) -> Result<()> {
    info!("Loading plan from: {}", plan_path.display());

    let content = tokio::fs::read_to_string(plan_path).await?;
    let plan: Plan = serde_json::from_str(&content)?;

    let hasher = PlanHasher::new();
    let digest = hasher.hash_plan(&plan);

    let restored: Plan = serde_json::from_str(&serde_json::to_string(&plan)?)?;
    if restored != plan || !PlanHasher::hashes_match(&digest, &hasher.hash_plan(&restored)) {
        return Err(PlannerError::internal(format!(
            "plan {} does not survive a serialization round trip",
            plan_path.display()
        )));
    }
    debug!("Plan round trip verified");

    print_output(&formatter.format_plan(&plan, &digest))
}

/// Resolves the document path and loads it with environment overrides.
fn load_resources(config_path: Option<&Path>) -> Result<ResourceSet> {
    let config_path = resolve_config_path(config_path)?;

    let base_path = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let parser = ConfigParser::new().with_base_path(base_path);
    parser.load_dotenv()?;

    parser.load_with_env(&config_path)
}

/// Resolves the document path.
fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir()?;
            find_config_file(cwd)
        }
    }
}

/// Writes command output to stdout.
fn print_output(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
