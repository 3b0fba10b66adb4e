mod bootstrap;
mod config;
mod redaction;
mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use schoolseed_core::{EntitySet, Error as CoreError, Phase, PhasePlan};
use schoolseed_generate::output::{write_dataset, write_report};
use schoolseed_generate::{
    Bootstrap, DirectBootstrap, GenerationEngine, GenerationError, GenerationResult, MemoryStore,
};
use schoolseed_postgres::{ConnectOptions, PgStore, apply_ddl, drop_tables, split_statements};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use bootstrap::HttpBootstrap;
use config::{ConfigError, FileConfig, Overrides, Settings};
use redaction::redact_connection_string;
use registry::{RunContext, RunPaths, init_run_logging, start_run};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
    #[error("{failed} DDL statement(s) failed")]
    Ddl { failed: usize },
}

#[derive(Parser, Debug)]
#[command(name = "schoolseed", version, about = "Seeds a school records database")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Database connection string; falls back to the config file, then DATABASE_URL.
    #[arg(long, value_name = "CONNECTION_STRING", global = true)]
    conn: Option<String>,
    /// TOML config file.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Seed for every random draw.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Run against an in-memory store and export the tables as CSV.
    #[arg(long, default_value_t = false, global = true)]
    dry_run: bool,
    /// Output directory for runs.
    #[arg(long, default_value = "runs", global = true)]
    run_dir: PathBuf,
    /// Registration endpoint for the testing accounts.
    #[arg(long, value_name = "URL", global = true)]
    bootstrap_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the whole synthetic school.
    InsertFakeData,
    /// Create the fixed 12-year course grid.
    CreateCourses,
    /// Register the testing accounts and wire them into the last year.
    CreateUsers,
    /// Assign the testing preceptor to the last year.
    CreatePreceptors,
    /// Write the fixed timetable of the last year.
    CreateTimetables,
    /// Courses, then users, then preceptors.
    CreateAll,
    /// Apply a DDL script, one statement at a time.
    CreateTables(CreateTablesArgs),
    /// Drop every table of the current schema.
    DeleteTables,
}

#[derive(Args, Debug)]
struct CreateTablesArgs {
    /// SQL file with `;`-separated statements.
    #[arg(long)]
    file: PathBuf,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::InsertFakeData => "insert-fake-data",
            Command::CreateCourses => "create-courses",
            Command::CreateUsers => "create-users",
            Command::CreatePreceptors => "create-preceptors",
            Command::CreateTimetables => "create-timetables",
            Command::CreateAll => "create-all",
            Command::CreateTables(_) => "create-tables",
            Command::DeleteTables => "delete-tables",
        }
    }

    /// Phases to run. Against a database, single fixture commands trust what
    /// earlier commands committed; a dry run starts empty and runs them too.
    fn plan(&self, dry_run: bool) -> Result<Option<PhasePlan>, CoreError> {
        use EntitySet as E;
        use Phase::{FixtureCourses, FixturePreceptors, FixtureTimetables, FixtureUsers};

        let plan = match (self, dry_run) {
            (Command::InsertFakeData, _) => PhasePlan::synthetic()?,
            (Command::CreateCourses, _) => PhasePlan::new(&[FixtureCourses], &[])?,
            (Command::CreateUsers, false) => PhasePlan::new(&[FixtureUsers], &[E::Courses])?,
            (Command::CreateUsers, true) => PhasePlan::new(&[FixtureCourses, FixtureUsers], &[])?,
            (Command::CreatePreceptors, false) => {
                PhasePlan::new(&[FixturePreceptors], &[E::Courses, E::TestingAccounts])?
            }
            (Command::CreateTimetables, false) => {
                PhasePlan::new(&[FixtureTimetables], &[E::Courses, E::Subjects])?
            }
            (Command::CreatePreceptors, true) | (Command::CreateAll, _) => {
                PhasePlan::new(&[FixtureCourses, FixtureUsers, FixturePreceptors], &[])?
            }
            (Command::CreateTimetables, true) => {
                PhasePlan::new(&[FixtureCourses, FixtureUsers, FixtureTimetables], &[])?
            }
            (Command::CreateTables(_) | Command::DeleteTables, _) => return Ok(None),
        };
        Ok(Some(plan))
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;

    let file = match &global.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        database_url: global.conn.clone(),
        bootstrap_url: global.bootstrap_url.clone(),
        seed: global.seed,
    };
    let settings = Settings::resolve(file, overrides, std::env::var("DATABASE_URL").ok());

    let plan = command.plan(global.dry_run)?;
    let engine = match plan {
        Some(_) => Some(GenerationEngine::new(settings.options.clone())?),
        None => None,
    };

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: command.name().to_string(),
        dry_run: global.dry_run,
        run_dir: global.run_dir.clone(),
        options: settings.options.clone(),
        connection: settings.database_url.as_deref().map(redact_connection_string),
        bootstrap: settings.bootstrap_url.as_deref().map(redact_connection_string),
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    info!(
        event = "run_started",
        run_id = %run_id,
        command = command.name(),
        dry_run = global.dry_run,
        seed = settings.options.seed
    );
    let timer = Instant::now();

    let outcome = match (&command, plan, engine) {
        (Command::CreateTables(args), _, _) => {
            create_tables(&settings, &args.file, global.dry_run).await
        }
        (Command::DeleteTables, _, _) => delete_tables(&settings, global.dry_run).await,
        (_, Some(plan), Some(engine)) if global.dry_run => {
            generate_dry_run(&engine, &plan, &run_paths).await
        }
        (_, Some(plan), Some(engine)) => generate(&engine, &plan, &settings, &run_paths).await,
        _ => Err(CliError::InvalidConfig(format!(
            "'{}' has no phases to run",
            command.name()
        ))),
    };

    let duration_ms = timer.elapsed().as_millis() as u64;
    match &outcome {
        Ok(()) => info!(event = "run_finished", status = "success", duration_ms),
        Err(err) => error!(event = "run_finished", status = "failed", duration_ms, error = %err),
    }
    outcome
}

async fn generate(
    engine: &GenerationEngine,
    plan: &PhasePlan,
    settings: &Settings,
    paths: &RunPaths,
) -> Result<(), CliError> {
    let conn = connection_string(settings)?;
    let pool = ConnectOptions::default().connect(conn).await?;
    info!(event = "database_connected", engine = "postgres");
    let mut store = PgStore::new(pool);

    let bootstrap: Box<dyn Bootstrap> = match &settings.bootstrap_url {
        Some(url) => {
            let url = Url::parse(url)
                .map_err(|err| CliError::InvalidConfig(format!("bootstrap url: {err}")))?;
            Box::new(HttpBootstrap::new(url))
        }
        None => {
            if plan.phases().any(|phase| phase == Phase::FixtureUsers) {
                warn!("no bootstrap url configured; registering testing accounts directly");
            }
            Box::new(DirectBootstrap)
        }
    };

    let outcome = engine.run(plan, &mut store, bootstrap.as_ref()).await;
    finish(outcome, paths)
}

async fn generate_dry_run(
    engine: &GenerationEngine,
    plan: &PhasePlan,
    paths: &RunPaths,
) -> Result<(), CliError> {
    let mut store = MemoryStore::new();
    let outcome = engine.run(plan, &mut store, &DirectBootstrap).await;

    // Committed phases are exported even when a later one failed.
    std::fs::create_dir_all(&paths.dataset_dir)?;
    let files = write_dataset(&paths.dataset_dir, store.dataset()).map_err(GenerationError::from)?;
    info!(
        event = "dataset_written",
        path = %paths.dataset_dir.display(),
        tables = files.tables.len(),
        bytes = files.bytes_written()
    );
    finish(outcome, paths)
}

/// Writes the report, whether the run committed every phase or not.
fn finish(
    outcome: Result<GenerationResult, GenerationError>,
    paths: &RunPaths,
) -> Result<(), CliError> {
    match outcome {
        Ok(result) => {
            write_report(&paths.root, &result.report)?;
            info!(event = "report_written", path = %paths.root.display());
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                write_report(&paths.root, report)?;
                info!(event = "report_written", path = %paths.root.display());
            }
            Err(err.into())
        }
    }
}

async fn create_tables(
    settings: &Settings,
    file: &std::path::Path,
    dry_run: bool,
) -> Result<(), CliError> {
    let script = std::fs::read_to_string(file)?;
    if dry_run {
        let statements = split_statements(&script);
        info!(event = "ddl_parsed", path = %file.display(), statements = statements.len());
        return Ok(());
    }

    let conn = connection_string(settings)?;
    let pool = ConnectOptions::default().connect(conn).await?;
    let report = apply_ddl(&pool, &script).await;
    info!(
        event = "ddl_finished",
        applied = report.applied,
        failed = report.failed.len()
    );
    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::Ddl {
            failed: report.failed.len(),
        })
    }
}

async fn delete_tables(settings: &Settings, dry_run: bool) -> Result<(), CliError> {
    if dry_run {
        info!(event = "tables_kept", "dry run drops nothing");
        return Ok(());
    }
    let conn = connection_string(settings)?;
    let pool = ConnectOptions::default().connect(conn).await?;
    let dropped = drop_tables(&pool).await?;
    info!(event = "tables_dropped", count = dropped.len());
    Ok(())
}

fn connection_string(settings: &Settings) -> Result<&str, CliError> {
    let conn = settings.database_url.as_deref().ok_or_else(|| {
        CliError::InvalidConfig(
            "connection string is required (--conn, config file or DATABASE_URL)".to_string(),
        )
    })?;
    detect_engine(conn)?;
    Ok(conn)
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}
