mod api;
mod cli;
mod format;
mod logging;
mod model;
mod orchestrator;
mod storage;
#[cfg(feature = "tui")]
mod tui;
mod view;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.is_non_tui();

    if is_non_tui {
        logging::init_stderr();
    } else {
        logging::init_file(&args.data_dir());
    }

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            if is_non_tui {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
