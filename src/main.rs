mod cli;
mod config;
mod container;
mod orchestrator;
mod runtime;
mod utils;

use colored::Colorize;

#[tokio::main]
async fn main() {
    let code = match cli::run(std::env::args().collect()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            1
        }
    };

    // Exit directly: a blocking stdin read may still be parked on the
    // runtime's thread pool and would stall a normal shutdown.
    std::process::exit(code);
}
