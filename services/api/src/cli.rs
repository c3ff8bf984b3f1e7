use crate::demo::{run_demo, run_vendor_match, DemoArgs, VendorMatchArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tenant_maintenance::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Maintenance Coordinator",
    about = "Run and demonstrate the work order lifecycle and vendor matching engine",
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
    /// Vendor roster utilities
    Vendors {
        #[command(subcommand)]
        command: VendorCommand,
    },
    /// Walk a burst-pipe request from submission to tenant verification
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum VendorCommand {
    /// Rank vendors from a roster export against an issue description
    Match(VendorMatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Vendor roster CSV to serve instead of the built-in fixtures
    #[arg(long)]
    pub(crate) vendors_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Vendors {
            command: VendorCommand::Match(args),
        } => run_vendor_match(args),
        Command::Demo(args) => run_demo(args),
    }
}
