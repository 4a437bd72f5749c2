//! Doctor CLI - export and upload organization resources.
//!
//! This tool copies object definitions, transformations and elements between
//! local JSON files and a remote environment.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use doctor_api::{HttpApiClient, RemoteApi};
use doctor_common::{Environment, ScopeLevel};
use doctor_sync::{ExportObject, Exporter, Orchestrator, SyncReport, UploadObject, UploadOptions};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "doctor")]
#[command(about = "Doctor - export and upload object definitions and transformations")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(long)]
    verbose: bool,

    /// Configuration file (default: <config dir>/doctor/config.json).
    #[arg(long, env = "DOCTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export remote resources to a JSON file.
    Export {
        /// What to export.
        object: ExportArg,

        /// Environment name from the configuration file.
        environment: String,

        /// File to write.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Upload resources from a JSON file or directory.
    Upload {
        /// What to upload.
        object: UploadArg,

        /// Environment name from the configuration file.
        environment: String,

        /// Upload document.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory of upload documents (ignored when --file is given).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Only the resource group or element with this name.
        #[arg(short, long)]
        name: Option<String>,

        /// Target level. Without it everything goes to the organization.
        #[arg(short, long, ignore_case = true)]
        level: Option<LevelArg>,

        /// Account id, required for the account level.
        #[arg(short, long = "account")]
        account_id: Option<String>,

        /// Instance id, required for the instance level.
        #[arg(short, long = "instance")]
        instance_id: Option<String>,

        /// Version to pick when a group exists in several versions.
        #[arg(short, long)]
        version: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    Vdrs,
    #[value(name = "commonResources", alias = "common-resources")]
    CommonResources,
    Elements,
    All,
}

impl From<ExportArg> for ExportObject {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::Vdrs => ExportObject::Vdrs,
            ExportArg::CommonResources => ExportObject::CommonResources,
            ExportArg::Elements => ExportObject::Elements,
            ExportArg::All => ExportObject::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum UploadArg {
    Vdrs,
    #[value(name = "commonResources", alias = "common-resources")]
    CommonResources,
    Elements,
    All,
}

impl From<UploadArg> for UploadObject {
    fn from(arg: UploadArg) -> Self {
        match arg {
            UploadArg::Vdrs => UploadObject::Vdrs,
            UploadArg::CommonResources => UploadObject::CommonResources,
            UploadArg::Elements => UploadObject::Elements,
            UploadArg::All => UploadObject::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Organization,
    Account,
    Instance,
}

impl From<LevelArg> for ScopeLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Organization => ScopeLevel::Organization,
            LevelArg::Account => ScopeLevel::Account,
            LevelArg::Instance => ScopeLevel::Instance,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Export {
            object,
            environment,
            file,
        } => {
            let Some(file) = file else {
                anyhow::bail!("Please specify a file to save with -f");
            };
            let env = load_environment(cli.config.as_deref(), &environment)?;
            cmd_export(&env, object.into(), &file).await
        }

        Commands::Upload {
            object,
            environment,
            file,
            dir,
            name,
            level,
            account_id,
            instance_id,
            version,
        } => {
            let options = UploadOptions {
                file,
                dir,
                name,
                level: level.map(Into::into),
                account_id,
                instance_id,
                version,
                ..UploadOptions::new(object.into())
            };
            let env = load_environment(cli.config.as_deref(), &environment)?;
            cmd_upload(&env, &options).await
        }
    }
}

fn load_environment(config: Option<&Path>, name: &str) -> Result<Environment> {
    let config = Config::load(config).context("Failed to load configuration")?;
    let env = config.environment(name)?;
    Ok(env.clone())
}

fn connect(env: &Environment) -> Result<Arc<HttpApiClient>> {
    let client = HttpApiClient::new(env)
        .with_context(|| format!("Failed to create client for '{}'", env.name))?;
    info!("Using environment {} ({})", env.name, client.name());
    Ok(Arc::new(client))
}

/// Export resources to a file.
async fn cmd_export(env: &Environment, object: ExportObject, file: &Path) -> Result<()> {
    let exporter = Exporter::new(connect(env)?);

    exporter
        .export(object, file)
        .await
        .with_context(|| format!("Failed to export {}", object.as_str()))?;

    println!("Exported {} to {}", object.as_str(), file.display());
    Ok(())
}

/// Upload resources and print the outcome.
async fn cmd_upload(env: &Environment, options: &UploadOptions) -> Result<()> {
    let orchestrator = Orchestrator::new(connect(env)?);

    let report = orchestrator
        .upload(options)
        .await
        .with_context(|| format!("Failed to upload {}", options.object.as_str()))?;

    print_report(&report);

    if !report.is_success() {
        anyhow::bail!("{} record(s) failed to upload", report.failed.len());
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for id in &report.created {
        println!("  [CREATED] {}", id);
    }
    for id in &report.updated {
        println!("  [UPDATED] {}", id);
    }
    for failure in &report.failed {
        println!("  [FAILED]  {}: {}", failure.id, failure.reason);
    }
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    println!("\n{}", report);
}
