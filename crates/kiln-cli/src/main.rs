mod cmd_build;
mod cmd_run;
mod cmd_status;
mod cmd_validate;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln", version, about = "Continuous build loop daemon")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "kiln.yml")]
    config: PathBuf,
    /// Log level (overrides the KILN_LOG environment variable)
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Command {
    /// Run every configured project loop until interrupted
    Run,
    /// Force one build cycle for a single project, then exit
    Build {
        /// Project name as declared in the configuration
        project: String,
    },
    /// Show the latest status snapshot of every project
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse and validate the configuration file
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level)?;

    match cli.cmd {
        Command::Run => cmd_run::execute(&cli.config),
        Command::Build { project } => cmd_build::execute(&cli.config, &project),
        Command::Status { json } => cmd_status::execute(&cli.config, json),
        Command::Validate => cmd_validate::execute(&cli.config),
    }
}
