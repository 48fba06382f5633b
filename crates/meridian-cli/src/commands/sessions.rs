// `meridian sessions list|show|delete` (spec.md §6).

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::client::{Client, ClientError};
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List all known sessions
    List,
    /// Show one session's state
    Show {
        /// Session ID
        session_id: String,
    },
    /// Delete a session's persisted state
    Delete {
        /// Session ID
        session_id: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Session {
    session_id: String,
    agent_id: String,
    created_at: String,
    updated_at: String,
    version: u64,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

pub async fn run(command: SessionsCommand, client: &Client, output: OutputFormat) -> Result<()> {
    match command {
        SessionsCommand::List => list(client, output).await,
        SessionsCommand::Show { session_id } => show(client, output, session_id).await,
        SessionsCommand::Delete { session_id } => delete(client, session_id).await,
    }
}

async fn list(client: &Client, output: OutputFormat) -> Result<()> {
    let response: ListResponse<Session> = client.get("/sessions").await?;

    if output.is_text() {
        if response.data.is_empty() {
            println!("No sessions found");
            return Ok(());
        }
        print_table_header(&[("SESSION_ID", 40), ("AGENT", 20), ("UPDATED", 25)]);
        for session in &response.data {
            print_table_row(&[
                (&session.session_id, 40),
                (&session.agent_id, 20),
                (&session.updated_at, 25),
            ]);
        }
    } else {
        output.print_value(&response);
    }
    Ok(())
}

async fn show(client: &Client, output: OutputFormat, session_id: String) -> Result<()> {
    let session: Session = client
        .get(&format!("/sessions/{session_id}"))
        .await
        .map_err(|e| match e {
            ClientError::NotFound => anyhow::anyhow!("session not found: {session_id}"),
            e => e.into(),
        })?;

    if output.is_text() {
        print_field("Session", &session.session_id);
        print_field("Agent", &session.agent_id);
        print_field("Updated", &session.updated_at);
        print_field("Created", &session.created_at);
        print_field("Version", &session.version.to_string());
    } else {
        output.print_value(&session);
    }
    Ok(())
}

async fn delete(client: &Client, session_id: String) -> Result<()> {
    client.delete(&format!("/sessions/{session_id}")).await.map_err(|e| match e {
        ClientError::NotFound => anyhow::anyhow!("session not found: {session_id}"),
        e => e.into(),
    })?;
    println!("Deleted session {session_id}");
    Ok(())
}
