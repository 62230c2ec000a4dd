use crate::demo::{run_demo, run_workflow_validation, DemoArgs, WorkflowValidateArgs};
use crate::server;
use accreditation::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Media Accreditation Service",
    about = "Run and exercise the multi-agency media accreditation approval service",
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
    /// Inspect approval workflow definitions
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Walk one application through entry and exit clearance in memory
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum WorkflowCommand {
    /// Validate a workflow catalog and print its execution plan
    Validate(WorkflowValidateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Workflow {
            command: WorkflowCommand::Validate(args),
        } => run_workflow_validation(args),
        Command::Demo(args) => run_demo(args),
    }
}
