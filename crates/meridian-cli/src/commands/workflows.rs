// `meridian workflows resume <run_id>` (spec.md §4.18, §6).

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::output::{print_field, OutputFormat};

#[derive(Subcommand)]
pub enum WorkflowsCommand {
    /// Resume a paused run with a reply payload (JSON)
    Resume {
        /// The run id the workflow checkpointed under
        run_id: String,
        /// Reply payload as a JSON string, e.g. '{"approved": true}'
        payload: String,
        /// Skip the dedup/schema-mismatch handling used for inbound replies
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
struct ResumeRequest {
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResumeResponse {
    outcome: String,
    #[serde(default)]
    node_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn run(command: WorkflowsCommand, client: &Client, output: OutputFormat) -> Result<()> {
    match command {
        WorkflowsCommand::Resume { run_id, payload, force } => resume(client, output, run_id, payload, force).await,
    }
}

async fn resume(client: &Client, output: OutputFormat, run_id: String, payload: String, force: bool) -> Result<()> {
    let payload: serde_json::Value = serde_json::from_str(&payload)?;
    let path = if force {
        format!("/workflows/{run_id}/resume")
    } else {
        format!("/workflows/{run_id}/resume-and-continue")
    };
    let response: ResumeResponse = client.post(&path, &ResumeRequest { payload }).await?;

    if output.is_text() {
        print_field("Outcome", &response.outcome);
        if let Some(node_id) = &response.node_id {
            print_field("Node", node_id);
        }
        if let Some(reason) = &response.reason {
            print_field("Reason", reason);
        }
    } else {
        output.print_value(&response);
    }
    Ok(())
}
