pub mod args;
pub mod options;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::debug;

use crate::config::env::ProcessEnv;
use crate::config::resolver;
use crate::config::ConfigSources;
use crate::container::builder::build_container_config;
use crate::container::dry_run;
use crate::orchestrator::host::HostIo;
use crate::orchestrator::Orchestrator;
use crate::runtime;
use crate::utils::logger::{self, LogSettings};
use options::CliOptions;

#[derive(Parser, Debug)]
#[command(name = "cderun")]
#[command(version)]
#[command(about = "Run development tools inside containers as if they were installed locally", long_about = None)]
#[command(after_help = "Flags must come before COMMAND; everything after it is passed to the tool.\n\
Internal overrides (--cderun-*) may only appear after COMMAND.")]
pub struct Cli {
    #[command(flatten)]
    pub options: CliOptions,

    /// Tool to run, followed by its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Handle one invocation and return the process exit code
pub async fn run(raw_args: Vec<String>) -> Result<i32> {
    let args = args::preprocess(raw_args)?;
    let cli = Cli::parse_from(args);

    let Some((subcommand, passthrough)) = cli.command.split_first() else {
        Cli::command().print_help()?;
        return Ok(0);
    };

    let sources = ConfigSources::discover();
    let resolved = match resolver::resolve(
        subcommand,
        &cli.options,
        sources.tools.as_ref(),
        sources.global.as_ref(),
        &ProcessEnv,
    ) {
        Ok(resolved) => resolved,
        Err(e) => {
            // A broken config file is the usual cause, so surface it with the error
            if logger::init(&LogSettings::default()).is_ok() {
                sources.report();
            }
            return Err(e).context("configuration error");
        }
    };

    logger::init(&resolved.log)?;
    sources.report();
    debug!("Resolved configuration for {}: {:?}", subcommand, resolved);

    let container = build_container_config(&resolved, subcommand, passthrough, sources.tools.as_ref())
        .context("container configuration error")?;

    if let Some(format) = resolved.dry_run {
        print!("{}", dry_run::render(&container, format)?);
        return Ok(0);
    }

    let runtime = runtime::connect(&resolved.runtime, &resolved.socket)
        .await
        .context("failed to initialize runtime")?;
    let host = HostIo::from_process(&container).context("failed to set up terminal and signal handling")?;

    let exit_code = Orchestrator::new(runtime, host).run(&container).await?;
    debug!("{} exited with code {}", subcommand, exit_code);

    Ok(i32::try_from(exit_code).unwrap_or(1))
}
