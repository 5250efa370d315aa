//! Tidepool Codegen - generate table bindings from an existing database

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidepool_codegen::{Configuration, ConnectionDescriptor, GenerationTool};

#[derive(Parser)]
#[command(name = "tidepool-codegen")]
#[command(about = "Generate typed Rust bindings from a PostgreSQL schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate sources from a running database
    Generate {
        /// Configuration file (.toml or .json)
        #[arg(short, long)]
        config: PathBuf,

        /// Connection URL, overriding the configuration file
        #[arg(long)]
        url: Option<String>,

        /// Output directory, overriding the configuration file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Commands::Generate { config, url, output } => {
            let mut configuration = Configuration::from_file(&config)?;
            if let Some(url) = url {
                configuration.connection = Some(ConnectionDescriptor::postgres(url));
            }
            if let Some(output) = output {
                configuration.generator.target.directory = output;
            }
            // Standalone runs default the names the same way the build orchestrator does
            let generator = &mut configuration.generator;
            generator.name.get_or_insert_with(|| "rust".to_string());
            generator.database.name.get_or_insert_with(|| "postgres".to_string());

            let report = GenerationTool::generate(&configuration)?;
            if cli.quiet {
                return Ok(());
            }
            println!(
                "Generated {} table module{} in {}",
                report.table_count,
                if report.table_count == 1 { "" } else { "s" },
                report.output_dir.display()
            );
        }
    }

    Ok(())
}
