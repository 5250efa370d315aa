//! Tidepool CLI
//!
//! Runs the schema build step outside of `build.rs`, or checks a changelog
//! without starting a database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tidepool::changelog::load_changelog;
use tidepool_build::{BuildConfig, ChangelogRunner, Orchestrator};

#[derive(Parser)]
#[command(name = "tidepool")]
#[command(about = "Migrate an ephemeral PostgreSQL instance and generate Rust bindings from it")]
#[command(version)]
struct Cli {
    /// Configuration file (default: tidepool.toml, then [package.metadata.tidepool] in Cargo.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root that relative paths resolve against
    #[arg(long, default_value = ".", global = true)]
    project_root: PathBuf,

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
    /// Start a database, apply the changelog and generate sources
    Generate,
    /// Parse the changelog and list its changesets without touching a database
    Check,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = match cli.command {
        Commands::Generate => handle_generate(&cli),
        Commands::Check => handle_check(&cli),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn load(cli: &Cli) -> anyhow::Result<(BuildConfig, PathBuf)> {
    let project_root = fs::canonicalize(&cli.project_root)
        .with_context(|| format!("project root {} does not exist", cli.project_root.display()))?;
    let config = match &cli.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::discover(&project_root)?.0,
    };
    Ok((config, project_root))
}

fn handle_generate(cli: &Cli) -> anyhow::Result<()> {
    let (config, project_root) = load(cli)?;

    let orchestrator = Orchestrator::new(config.database.embedded_settings())
        .with_migration_runner(Box::new(ChangelogRunner::new(config.changelog.lock_timeout())));
    let outcome = orchestrator.execute(&config.changelog.file, &config.generator, &project_root)?;

    if !cli.quiet {
        let migration = &outcome.migration;
        println!(
            "{} Changelog applied: {} executed, {} reran, {} skipped",
            "✔".green(),
            migration.executed,
            migration.reran,
            migration.skipped
        );
        if migration.failed_ignored > 0 {
            println!(
                "{} {} changeset(s) failed and were ignored (failOnError: false)",
                "!".yellow(),
                migration.failed_ignored
            );
        }
        println!(
            "{} Generated {} table module(s) in {}",
            "✔".green(),
            outcome.generation.table_count,
            outcome.generation.output_dir.display()
        );
    }
    Ok(())
}

fn handle_check(cli: &Cli) -> anyhow::Result<()> {
    let (config, project_root) = load(cli)?;
    let change_log = load_changelog(&project_root, &config.changelog.file)?;

    if cli.quiet {
        return Ok(());
    }

    println!("\n{} {}\n", "Changelog".bold(), relative(&change_log.root_file, &project_root));
    for change_set in &change_log.change_sets {
        let mut flags = Vec::new();
        if change_set.run_always {
            flags.push("runAlways");
        }
        if change_set.run_on_change {
            flags.push("runOnChange");
        }
        if !change_set.fail_on_error {
            flags.push("failOnError: false");
        }
        if !change_set.run_in_transaction {
            flags.push("runInTransaction: false");
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  {} {}{}",
            "•".cyan(),
            change_set.display_id(),
            flags.dimmed()
        );
    }

    println!(
        "\n{} {} changeset(s) in {} file(s)",
        "✔".green(),
        change_log.change_sets.len(),
        change_log.source_files.len()
    );
    Ok(())
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
