//! HTTP service and CLI for the partner marketplace.

mod cli;
mod demo;
mod infra;
mod routes;
mod server;

pub use partner_marketplace::error::AppError;

/// Parse the command line and run the selected subcommand (`serve` when none is given).
pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
