// Meridian CLI (spec.md §6)
//
// Design Decision: clap derive for argument parsing, matching the teacher's
// CLI crate.
// Design Decision: text/json/yaml output formats for scripting.

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "meridian")]
#[command(about = "Meridian CLI - run missions, inspect sessions, resume workflows")]
#[command(version)]
pub struct Cli {
    /// API base URL
    #[arg(long, env = "MERIDIAN_API_URL", default_value = "http://localhost:8090")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a mission through the ordinary (non-epic) or auto-routed pipeline
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },

    /// Run a mission forced into epic mode, bypassing the auto-epic classifier
    Epic {
        #[command(subcommand)]
        command: EpicCommand,
    },

    /// Inspect or manage sessions
    Sessions {
        #[command(subcommand)]
        command: commands::sessions::SessionsCommand,
    },

    /// Resume a paused resumable workflow
    Workflows {
        #[command(subcommand)]
        command: commands::workflows::WorkflowsCommand,
    },
}

#[derive(Subcommand)]
pub enum RunCommand {
    /// Execute a mission
    Mission {
        /// The mission text
        mission: String,

        /// Named execution profile's agent id override
        #[arg(long)]
        profile: Option<String>,

        /// Resume an existing session instead of starting a new one
        #[arg(long)]
        session: Option<String>,

        /// Stream `StreamEvent`s as the mission runs instead of waiting for completion
        #[arg(long)]
        stream: bool,

        /// Force the classifier on (default) or off for this call
        #[arg(long, conflicts_with = "no_auto_epic")]
        auto_epic: bool,

        #[arg(long)]
        no_auto_epic: bool,
    },
}

#[derive(Subcommand)]
pub enum EpicCommand {
    /// Run a mission forced straight into the epic orchestrator
    Run {
        /// The mission text
        mission: String,

        /// Suggested worker count for this run
        #[arg(long)]
        workers: Option<usize>,

        /// Stream `StreamEvent`s as the run progresses
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = client::Client::new(&cli.api_url);
    let output = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Run { command: RunCommand::Mission { mission, profile, session, stream, auto_epic, no_auto_epic } } => {
            let auto_epic = if auto_epic { Some(true) } else if no_auto_epic { Some(false) } else { None };
            commands::run::run_mission(&client, output, mission, profile, session, auto_epic, false, None, stream).await
        }
        Commands::Epic { command: EpicCommand::Run { mission, workers, stream } } => {
            commands::run::run_mission(&client, output, mission, None, None, None, true, workers, stream).await
        }
        Commands::Sessions { command } => commands::sessions::run(command, &client, output).await,
        Commands::Workflows { command } => commands::workflows::run(command, &client, output).await,
    }
}
