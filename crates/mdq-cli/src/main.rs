use mdq_core::logging;

mod api;
mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // File logging under the XDG state dir; stderr if that is not writable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("mdq error: {:#}", err);
        std::process::exit(1);
    }
}
