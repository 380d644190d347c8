mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod terminal;

use posyandu_kpsp::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
