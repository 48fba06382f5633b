// `meridian run mission <text>` (spec.md §6): execute a mission, optionally
// streaming its `StreamEvent`s as they happen.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::output::{print_field, OutputFormat};

#[derive(Debug, Serialize)]
struct ExecuteRequest {
    mission: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preferred_worker_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_epic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    force_mode: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ExecutionResult {
    status: String,
    #[serde(default)]
    final_answer: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_kind: Option<String>,
    step_count: usize,
}

#[allow(clippy::too_many_arguments)]
pub async fn run_mission(
    client: &Client,
    output: OutputFormat,
    mission: String,
    agent_id: Option<String>,
    session_id: Option<String>,
    auto_epic: Option<bool>,
    force_epic: bool,
    workers: Option<usize>,
    stream: bool,
) -> Result<()> {
    let force_mode = if force_epic { Some("epic".to_string()) } else { None };
    let request = ExecuteRequest {
        mission,
        scopes: Vec::new(),
        preferred_worker_count: workers,
        agent_id,
        session_id,
        auto_epic,
        force_mode,
    };

    if stream {
        return stream_mission(client, output, &request).await;
    }

    let result: ExecutionResult = client.post("/execute", &request).await?;
    print_result(output, &result);
    Ok(())
}

async fn stream_mission(client: &Client, output: OutputFormat, request: &ExecuteRequest) -> Result<()> {
    let mut final_result: Option<ExecutionResult> = None;
    client
        .post_stream("/execute/stream", request, |event, data| match event {
            "stream-event" => {
                if output.is_text() {
                    println!("{data}");
                } else {
                    println!("{data}");
                }
            }
            "execution-result" => {
                final_result = serde_json::from_str(data).ok();
            }
            _ => {}
        })
        .await?;

    if let Some(result) = final_result {
        print_result(output, &result);
    }
    Ok(())
}

fn print_result(output: OutputFormat, result: &ExecutionResult) {
    if output.is_text() {
        print_field("Status", &result.status);
        if let Some(answer) = &result.final_answer {
            println!("\n{answer}");
        }
        if let Some(message) = &result.error_message {
            eprintln!("\nError: {message}");
        }
        print_field("Steps", &result.step_count.to_string());
    } else {
        output.print_value(result);
    }
}
