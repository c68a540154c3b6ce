//! MySQL Dump Tool
//!
//! Dumps the configured MySQL databases into gzip files and ships them to
//! Amazon S3 or an Amazon Glacier vault.

// s3dump/src/main.rs
mod backup;
mod config;
mod errors;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use backup::{CleanupOutcome, DEFAULT_STAGING_DIR, JobResult, JobStatus, RunOptions, RunReport};
use config::{ConfigTemplate, Configuration, DEFAULT_CONFIG_FILE, TargetKind};

#[derive(Parser)]
#[command(name = "s3dump", version, about = "Dumps MySQL databases and writes them to Amazon S3 or Glacier")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump every configured database and upload the dumps
    Dump(DumpArgs),
    /// Generate a JSON config file from the given arguments
    GenerateConfig(GenerateConfigArgs),
}

#[derive(Args)]
struct DumpArgs {
    /// Config file to read (JSON only; older s3dump.yml files must be rewritten, see generate-config)
    #[arg(short, long, env = "S3DUMP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Write dumps to this directory. Unless --skip-upload is given, the whole
    /// directory and everything in it is deleted after the upload
    #[arg(short, long, default_value = DEFAULT_STAGING_DIR)]
    location: PathBuf,

    /// Where to upload the dumps
    #[arg(short, long, value_enum, default_value = "s3")]
    target: TargetKind,

    /// Do not upload; the dumps remain in the target directory
    #[arg(long, visible_aliases = ["skip-s3", "skip-glacier"])]
    skip_upload: bool,
}

#[derive(Args)]
struct GenerateConfigArgs {
    /// Database name
    database: Option<String>,
    /// Database user name
    user: Option<String>,
    /// Database user password
    password: Option<String>,
    /// Your AWS S3 key
    s3_key: Option<String>,
    /// Your AWS S3 secret
    s3_secret: Option<String>,
    /// Use this bucket as save location
    s3_bucket: Option<String>,

    /// File to write
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

/// Main entry point for the dump tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    print_banner();
    match run_app(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!(" {} {:#}", "[ERROR]:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "s3dump=debug" } else { "s3dump=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_app(command: Command) -> Result<ExitCode> {
    match command {
        Command::Dump(args) => run_dump(args).await,
        Command::GenerateConfig(args) => run_generate_config(args),
    }
}

async fn run_dump(args: DumpArgs) -> Result<ExitCode> {
    let config = Configuration::load_from_json(&args.config)
        .context(format!("No usable {} file found", args.config.display()))?;

    let options = RunOptions {
        staging_dir: args.location,
        upload: (!args.skip_upload).then_some(args.target),
    };
    if options.upload.is_none() {
        println!(" {}", format!("Skipping {}...", args.target).cyan());
    }

    let report = backup::run_backup_flow(&config, &options)
        .await
        .context("Backup run aborted before any database was dumped")?;
    print_report(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_generate_config(args: GenerateConfigArgs) -> Result<ExitCode> {
    let defaults = ConfigTemplate::default();
    let template = ConfigTemplate {
        database: args.database.unwrap_or(defaults.database),
        user: args.user.unwrap_or(defaults.user),
        password: args.password.unwrap_or(defaults.password),
        s3_key: args.s3_key.unwrap_or(defaults.s3_key),
        s3_secret: args.s3_secret.unwrap_or(defaults.s3_secret),
        s3_bucket: args.s3_bucket.unwrap_or(defaults.s3_bucket),
    };

    config::write_config_template(&args.output, &template, args.force)?;
    println!(" Generated file {}.", args.output.display().to_string().cyan());
    Ok(ExitCode::SUCCESS)
}

fn print_banner() {
    println!();
    println!(
        " {}{} {}",
        "s3".blue().bold(),
        "dump".green().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!();
}

fn print_report(report: &RunReport) {
    for result in &report.results {
        print_job(result, report.target.as_deref());
    }

    match &report.cleanup {
        CleanupOutcome::NotRequested => {
            println!(" Dumps kept in {}.", report.staging_dir.display().to_string().cyan());
        }
        CleanupOutcome::Removed => {
            println!(" Removed temporary folder {}.", report.staging_dir.display().to_string().cyan());
        }
        CleanupOutcome::Failed(e) => println!(" {} {}", "[ERROR]:".red().bold(), e),
    }

    let failed = report.failures().count();
    let summary = format!(
        "{} database(s): {} uploaded, {} dumped only, {} failed",
        report.results.len(),
        report.count(JobStatus::Completed),
        report.count(JobStatus::UploadSkipped),
        failed
    );
    println!();
    if report.is_success() {
        println!(" {}", summary.green().bold());
    } else {
        println!(" {}", summary.red().bold());
    }
}

fn print_job(result: &JobResult, target: Option<&str>) {
    let elapsed = format!("{:.1}", result.elapsed.as_secs_f64());
    let status = match result.status {
        JobStatus::Completed | JobStatus::UploadSkipped => result.status.label().green(),
        JobStatus::DumpFailed | JobStatus::UploadFailed => result.status.label().red(),
    };

    match result.status {
        JobStatus::Completed => println!(
            " [{}] {} ...wrote {} to {} in {} seconds.",
            status,
            result.database,
            result.remote_id.as_deref().unwrap_or_default().cyan(),
            target.unwrap_or("remote storage").cyan(),
            elapsed.cyan()
        ),
        JobStatus::UploadSkipped => println!(
            " [{}] {} ...generated {} in {} seconds.",
            status,
            result.database,
            result.artifact.display().to_string().cyan(),
            elapsed.cyan()
        ),
        JobStatus::DumpFailed | JobStatus::UploadFailed => println!(
            " [{}] {}: {}",
            status,
            result.database,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
