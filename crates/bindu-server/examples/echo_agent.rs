//! Minimal echo agent.
//!
//! Run with `cargo run --example echo_agent`, then:
//!
//! ```bash
//! curl -s localhost:3773 -d '{"jsonrpc":"2.0","id":1,"method":"message/send",
//!   "params":{"message":{"role":"user","parts":[{"type":"text","text":"hi"}]}}}'
//! ```

use bindu_a2a_protocol::{AgentDid, Skill};
use bindu_server::{AgentManifest, BinduServer, FnHandler, HandlerTurn};
use serde_json::{json, Value};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let handler = FnHandler::new(|history: Vec<HandlerTurn>| async move {
        let last = history.last().map(|t| t.content.clone()).unwrap_or_default();
        Ok::<Value, bindu_server::HandlerError>(json!(format!("echo: {}", last)))
    });

    let manifest = AgentManifest::new("echo-agent", "Echoes the last user message")
        .with_version("0.1.0")
        .with_did(AgentDid::new("did:bindu:example:echo-agent"))
        .with_skill(Skill {
            id: "echo".into(),
            name: "Echo".into(),
            description: Some("Repeat the last message back".into()),
            version: Some("0.1.0".into()),
            tags: vec!["demo".into()],
            input_modes: vec!["text/plain".into()],
            output_modes: vec!["text/plain".into()],
            examples: vec!["say hello".into()],
            documentation_content: Some("name: echo\nusage: send any text message\n".into()),
        });

    let server = match BinduServer::builder()
        .manifest(manifest)
        .handler(handler)
        .build()
    {
        Ok(server) => server,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("server error: {}", err);
        std::process::exit(1);
    }
}
