//! Binary entry point for tabport.
//!
//! This binary provides the CLI interface for the tabport import/export
//! pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    JobsAction, cmd_export, cmd_import, cmd_jobs_list, cmd_jobs_show, cmd_template, cmd_types,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabport::TabportConfig;
use tabport::observability::{self, LoggingConfig};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "TABPORT_CONFIG";

/// Tabport - tabular import/export with per-row outcome tracking.
#[derive(Parser)]
#[command(name = "tabport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Write the header-only CSV template for a type.
    Template {
        /// The logical type.
        type_name: String,

        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a CSV file.
    Import {
        /// The logical type.
        type_name: String,

        /// File to import.
        file: PathBuf,

        /// Declared MIME type of the file.
        #[arg(short, long)]
        mimetype: Option<String>,

        /// Owner reference recorded on the job.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Export a type to CSV.
    Export {
        /// The logical type.
        type_name: String,

        /// Filter as key=value (repeatable).
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Owner reference recorded on the job.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Inspect jobs.
    Jobs {
        /// Jobs subcommand.
        #[command(subcommand)]
        action: JobsAction,
    },

    /// List registered types.
    Types,
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(config.logging.as_ref(), cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run_command(command: Commands, config: &TabportConfig) -> tabport::Result<()> {
    match command {
        Commands::Template { type_name, output } => cmd_template(config, &type_name, output),
        Commands::Import {
            type_name,
            file,
            mimetype,
            owner,
        } => cmd_import(config, type_name, &file, mimetype, owner),
        Commands::Export {
            type_name,
            filters,
            output,
            owner,
        } => cmd_export(config, &type_name, &filters, output, owner),
        Commands::Jobs { action } => match action {
            JobsAction::List {
                type_name,
                direction,
                status,
                page,
                per_page,
            } => cmd_jobs_list(config, type_name, direction, status, page, per_page),
            JobsAction::Show { id } => cmd_jobs_show(config, &id),
        },
        Commands::Types => cmd_types(config),
    }
}

/// Loads configuration.
fn load_config(path: Option<&Path>) -> tabport::Result<TabportConfig> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return TabportConfig::load_from_file(config_path).map(TabportConfig::with_env_overrides);
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var(CONFIG_ENV)
        && !config_path.trim().is_empty()
    {
        return TabportConfig::load_from_file(Path::new(config_path.trim()))
            .map(TabportConfig::with_env_overrides);
    }

    // Otherwise, load from default location
    Ok(TabportConfig::load_default().with_env_overrides())
}
