mod cli;
mod engine;
mod error;
mod logging;
mod model;
mod orchestrator;
mod storage;
mod text_summary;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_silent = args.silent;
    logging::init_logging(args.log_level.as_deref(), args.verbose, args.no_color)?;

    // Exit explicitly: a pending blocking stdin read would otherwise hold up runtime shutdown.
    match cli::run(args).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            if is_silent {
                println!("{}", e);
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}
