//! Reference decision engine process.
//!
//! Usage: `astra-engine <Operation>` with the JSON request on stdin. The JSON
//! response is written to stdout; errors go to stderr with exit code 1.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use astra_orchestrator::adapters::{DecisionEngine, Operation, ReferenceEngine};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("astra-engine: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let name = match std::env::args().nth(1) {
        Some(name) => name,
        None => bail!("usage: astra-engine <EvaluatePolicy|IssueApprovalToken|ExecuteRun>"),
    };
    let operation =
        Operation::parse(&name).with_context(|| format!("unknown operation: {}", name))?;

    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .context("Failed to read request from stdin")?;

    let engine = ReferenceEngine::new();
    let output = match operation {
        Operation::EvaluatePolicy => {
            let request = decode(&input, operation)?;
            encode(&engine.evaluate_policy(&request).await?)?
        }
        Operation::IssueApprovalToken => {
            let request = decode(&input, operation)?;
            encode(&engine.issue_approval_token(&request).await?)?
        }
        Operation::ExecuteRun => {
            let request = decode(&input, operation)?;
            encode(&engine.execute_run(&request).await?)?
        }
    };

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn decode<T: DeserializeOwned>(input: &[u8], operation: Operation) -> Result<T> {
    serde_json::from_slice(input)
        .with_context(|| format!("invalid {} request", operation.as_str()))
}

fn encode<T: Serialize>(response: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(response).context("Failed to encode response")
}
