//! `cfd`: CloudFoundry Driver for the GitLab Runner custom executor.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cfd", version)]
#[command(about = "CloudFoundry Driver", long_about = None)]
#[command(after_help = "gitlab-runner should run cfd with its \"drive\" subcommands, e.g. \"cfd drive prepare\".")]
struct Cli {
    /// Platform API root, overriding the one in VCAP_APPLICATION
    #[arg(long, env = "CF_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a custom executor stage
    Drive {
        #[command(subcommand)]
        stage: DriveCommands,
    },
}

#[derive(Subcommand)]
enum DriveCommands {
    /// Print the executor config JSON (config_exec)
    Config,
    /// Start service containers and the job container (prepare_exec)
    Prepare,
    /// Run one sub-stage script in the job container (run_exec)
    Run {
        /// Script generated by GitLab Runner
        script: PathBuf,
        /// Sub-stage name, e.g. build_script
        sub_stage: String,
    },
    /// Remove everything the job started (cleanup_exec)
    Cleanup,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout belongs to the job log.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_url = cli.api_url.as_deref();

    let result = match cli.command {
        Commands::Drive { stage } => match stage {
            DriveCommands::Config => commands::drive::config(),
            DriveCommands::Prepare => commands::drive::prepare(api_url).await,
            DriveCommands::Run { script, sub_stage } => {
                commands::drive::run(api_url, &script, &sub_stage).await
            }
            DriveCommands::Cleanup => commands::drive::cleanup(api_url).await,
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(commands::exit_code(&err, |key| std::env::var(key).ok()))
        }
    }
}
