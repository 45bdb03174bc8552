use crate::commands::{run_rules_reset, run_rules_show, run_score, run_webhooks, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lead_score::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Wedding Lead Scorer",
    about = "Score wedding-planning leads and sync the result to ActiveCampaign",
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
    /// Score one lead against the stored rules
    Score(ScoreArgs),
    /// Inspect or reset the scoring rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// List the webhook payloads cached by the last server run
    Webhooks(DataArgs),
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Print regions, thresholds, and settings
    Show(DataArgs),
    /// Restore the seeded rule tables and settings
    Reset(DataArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct DataArgs {
    /// Override the directory holding the persisted rule documents
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) data: DataArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Rules {
            command: RulesCommand::Show(args),
        } => run_rules_show(args),
        Command::Rules {
            command: RulesCommand::Reset(args),
        } => run_rules_reset(args),
        Command::Webhooks(args) => run_webhooks(args),
    }
}
