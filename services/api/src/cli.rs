use crate::demo::{run_demo, DemoArgs};
use crate::infra::BackendChoice;
use crate::server;
use crate::terminal::{run_screen, ScreenArgs};
use clap::{Args, Parser, Subcommand};
use posyandu_kpsp::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Posyandu KPSP Screening",
    about = "Run KPSP developmental screenings for posyandu cadres",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk through a screening interactively in the terminal
    Screen(ScreenArgs),
    /// Run a scripted screening against the built-in sample posyandu
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Data source for children, questionnaires and submissions
    #[arg(long, value_enum, default_value_t)]
    pub(crate) backend: BackendChoice,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Screen(args) => run_screen(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
