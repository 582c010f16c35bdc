//! tidemark Migration CLI Tool
//!
//! Command-line interface for planning, applying and reverting SQL migrations.
//! Suitable for interactive use and for CI/CD pipelines: every surfaced error
//! exits with status 1.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tidemark::config::MigrateConfig;
use tidemark::connection;
use tidemark::migration::{Direction, Migrator, Reporter};
use tidemark::{dialect_for, DbExecutor};
use tidemark_cli::{create_migration, resolve, ConsoleReporter, Overrides};

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Reversible, ordered SQL schema migrations")]
#[command(version)]
struct Cli {
    /// Database connection URL (falls back to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// SQL dialect: postgresql, sqlite3 or mysql
    #[arg(long, global = true)]
    dialect: Option<String>,

    /// Tracking table name
    #[arg(long, global = true)]
    table: Option<String>,

    /// Schema holding the tracking table
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Configuration file (default: config/migrate.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrates the database to the most recent version available
    Up {
        /// Max number of migrations to apply (0: all pending)
        #[arg(long, default_value = "0")]
        limit: usize,

        /// Don't apply migrations, just print them
        #[arg(long)]
        dry_run: bool,
    },

    /// Undo database migrations
    Down {
        /// Max number of migrations to revert (0: all applied)
        #[arg(long, default_value = "1")]
        limit: usize,

        /// Don't revert migrations, just print them
        #[arg(long)]
        dry_run: bool,
    },

    /// Reapply the last migration
    Redo {
        /// Don't reapply, just print the statements
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status
    Status,

    /// Record pending migrations as applied without running them
    Skip {
        /// Max number of migrations to skip (0: all pending)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Create a new migration
    New {
        /// The name of the migration (e.g. "create_users_table")
        name: String,
    },
}

/// A failure the reporter has already printed in its own wording
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct AlreadyReported(tidemark::MigrationError);

fn init_logging(verbose: bool, quiet: bool) {
    // The console reporter owns normal output; the log stream is for diagnostics.
    let default_filter = if quiet {
        "off"
    } else if verbose {
        "debug"
    } else {
        "error"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let reporter = ConsoleReporter::new(cli.quiet);
    match run(cli, &reporter) {
        Ok(()) => process::exit(0),
        Err(e) => {
            if !e.is::<AlreadyReported>() {
                reporter.error(&format!("{e:#}"));
            }
            process::exit(1);
        }
    }
}

fn run(cli: Cli, reporter: &ConsoleReporter) -> Result<()> {
    let overrides = Overrides {
        database_url: cli.database_url,
        dir: cli.dir,
        dialect: cli.dialect,
        table: cli.table,
        schema: cli.schema,
    };
    let config = resolve(
        cli.config.as_deref(),
        overrides,
        std::env::var("DATABASE_URL").ok(),
    )?;

    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "Failed to create migrations directory {}",
            config.directory.display()
        )
    })?;

    match cli.command {
        Commands::New { name } => handle_new(&config, &name, reporter),
        Commands::Up { limit, dry_run } => {
            let (migrator, db) = connect(&config)?;
            migrator
                .apply_with_report(db.as_ref(), Direction::Up, limit, dry_run, reporter)
                .map_err(AlreadyReported)?;
            Ok(())
        }
        Commands::Down { limit, dry_run } => {
            let (migrator, db) = connect(&config)?;
            migrator
                .apply_with_report(db.as_ref(), Direction::Down, limit, dry_run, reporter)
                .map_err(AlreadyReported)?;
            Ok(())
        }
        Commands::Redo { dry_run } => {
            let (migrator, db) = connect(&config)?;
            migrator
                .redo(db.as_ref(), dry_run, reporter)
                .map_err(AlreadyReported)?;
            Ok(())
        }
        Commands::Status => {
            let (migrator, db) = connect(&config)?;
            migrator
                .status_with_report(db.as_ref(), reporter)
                .map_err(AlreadyReported)?;
            Ok(())
        }
        Commands::Skip { limit } => {
            let (migrator, db) = connect(&config)?;
            migrator
                .skip_with_report(db.as_ref(), Direction::Up, limit, reporter)
                .map_err(AlreadyReported)?;
            Ok(())
        }
    }
}

fn connect(config: &MigrateConfig) -> Result<(Migrator, Box<dyn DbExecutor>)> {
    let migrator = Migrator::from_config(config)?;
    let db = open_database(config)?;
    Ok((migrator, db))
}

fn open_database(config: &MigrateConfig) -> Result<Box<dyn DbExecutor>> {
    let url = config.url.as_deref().context(
        "Database URL not provided. Use --database-url, set TIDEMARK__MIGRATE__URL or DATABASE_URL",
    )?;
    let db = connection::open(config.dialect_kind()?, url)
        .with_context(|| format!("Error connecting to {} database", config.dialect))?;
    Ok(db)
}

fn handle_new(config: &MigrateConfig, name: &str, reporter: &dyn Reporter) -> Result<()> {
    let dialect = dialect_for(config.dialect_kind()?);
    let path = create_migration(&config.directory, name, dialect.as_ref(), chrono::Utc::now())?;
    reporter.output(&format!("Created migration {}", path.display()));
    Ok(())
}
