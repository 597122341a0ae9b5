//! Demo CLI: a REPL that feeds typed lines to the turn execution engine,
//! wired to in-memory stores, the local `get_weather` tool, and the
//! scripted [`demo_provider::DemoProvider`] (spec SPEC_FULL §1 "CLI").

mod config;
mod demo_provider;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures_util::StreamExt;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tl_core::event::Event;
use tl_core::message::LlmMessage;
use tl_core::plugin::{LocalToolOutcome, ToolPlugin};
use tl_core::sse::format_sse_event;
use tl_engine::runtime::{Agent, CancelMap, IterationRunner, LocalTool, LocalToolPlugin, LoopRunner, ToolRunner};
use tl_stores::{InMemoryAgentStore, InMemoryMessageStore};

#[derive(Parser, Debug)]
#[command(name = "tl-cli", about = "Interactive demo for the turn execution engine")]
struct Cli {
    /// Path to a TOML config file (see EngineConfig for the shape).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Context id to scope the conversation under.
    #[arg(long, default_value = "demo")]
    context_id: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_new(config::log_level()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config::is_production() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn weather_tool() -> Arc<dyn ToolPlugin> {
    let tool = LocalTool::new(
        "get_weather",
        "Looks up a (fake) weather report for a query",
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
        }),
        |args| {
            Box::pin(async move {
                let query = args.get("query").and_then(serde_json::Value::as_str).unwrap_or("your area");
                LocalToolOutcome::ok(json!({ "summary": format!("sunny and 72F in {query}") }))
            })
        },
    );
    Arc::new(LocalToolPlugin::new().register(tool))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let engine_config = config::load_engine_config(cli.config.as_deref())?;
    let issues = engine_config.validate();
    for issue in &issues {
        match issue.severity {
            tl_engine::ConfigSeverity::Error => error!(field = issue.field, "{}", issue.message),
            tl_engine::ConfigSeverity::Warning => tracing::warn!(field = issue.field, "{}", issue.message),
        }
    }
    if tl_engine::EngineConfig::has_errors(&issues) {
        anyhow::bail!("refusing to start with invalid configuration");
    }

    let tool_runner = Arc::new(ToolRunner::new(vec![weather_tool()]));
    let iteration_runner = Arc::new(IterationRunner::new(Arc::new(demo_provider::DemoProvider), tool_runner));
    let messages: Arc<dyn tl_core::store::MessageStore> = Arc::new(InMemoryMessageStore::new());
    let loop_runner = Arc::new(LoopRunner::new(iteration_runner, messages, engine_config.loop_config()));
    let agent_store: Arc<dyn tl_core::store::AgentStore> = Arc::new(InMemoryAgentStore::new());
    let agent = Agent::new(loop_runner, agent_store, Arc::new(CancelMap::new()));

    println!("tl-cli demo — type a message and press enter (ctrl-d to quit).");
    println!("try a message containing \"weather\" to see a tool call.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut turn = 0u64;
    let mut sse_id = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        turn += 1;
        let task_id = format!("task-{turn}");

        let stream = agent
            .handle_turn(&cli.context_id, &task_id, LlmMessage::user(line), vec![])
            .await?;
        futures_util::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            if event.is_external() {
                sse_id += 1;
                print!("{}", format_sse_event(sse_id, &event));
            }
            if let Event::TaskComplete { content, .. } = &event.event {
                println!("\n> {content}\n");
            }
        }
    }

    Ok(())
}
