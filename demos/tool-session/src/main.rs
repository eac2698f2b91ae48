//! Line-oriented tool session over the in-process service.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout:
//!
//! ```text
//! {"tool": "create_bell_pair_circuit", "arguments": {}}
//! {"tool": "list_tools"}
//! {"resource": "amazon-braket://devices"}
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=braket_tools=debug` for more.

use braket_tools::ToolRouter;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

fn failure(error: String, error_type: &str) -> Value {
    json!({"success": false, "error": error, "error_type": error_type})
}

async fn respond(router: &ToolRouter, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(err) => {
            return failure(format!("bad request: {err}"), "ValidationError");
        }
    };

    if let Some(uri) = request.get("resource").and_then(Value::as_str) {
        return match router.read_resource(uri).await {
            Ok(doc) => doc,
            Err(err) => failure(err.to_string(), err.kind()),
        };
    }
    match request.get("tool").and_then(Value::as_str) {
        Some("list_tools") => json!({ "tools": router.list_tools() }),
        Some(name) => {
            let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);
            router.handle_tool_call(name, arguments).await
        }
        None => failure(
            "request needs a 'tool' or 'resource' field".to_string(),
            "ValidationError",
        ),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("braket_tools=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let router = ToolRouter::local();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(&router, &line).await;
        stdout.write_all(response.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
