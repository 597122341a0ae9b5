//! End-to-end turn scenarios (spec §8 S1–S6), driven through [`Agent`]
//! against in-memory stores and the crate's scripted fixtures.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;

use tl_core::event::{Event, FinishReason, TaskStatus};
use tl_core::message::{LlmMessage, ToolCall};
use tl_core::plugin::{LocalToolOutcome, ToolPlugin};
use tl_core::store::{AgentStore, ArtifactStore, MessageStore};
use tl_engine::runtime::{Agent, CancelMap, IterationRunner, LocalTool, LocalToolPlugin, LoopConfig, LoopRunner, ToolRunner};
use tl_engine::test_support::{FailingProvider, ScriptedProvider, ScriptedTurn};
use tl_stores::{InMemoryAgentStore, InMemoryMessageStore};

fn build_agent(provider: Arc<dyn tl_core::provider::LlmProvider>, plugins: Vec<Arc<dyn ToolPlugin>>, max_iterations: u32) -> (Agent, Arc<dyn MessageStore>, Arc<dyn AgentStore>) {
    let tool_runner = Arc::new(ToolRunner::new(plugins));
    let iteration_runner = Arc::new(IterationRunner::new(provider, tool_runner));
    let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
    let loop_runner = Arc::new(LoopRunner::new(iteration_runner, messages.clone(), LoopConfig { max_iterations }));
    let agent_store: Arc<dyn AgentStore> = Arc::new(InMemoryAgentStore::new());
    let agent = Agent::new(loop_runner, agent_store.clone(), Arc::new(CancelMap::new()));
    (agent, messages, agent_store)
}

fn echo_plugin() -> Arc<dyn ToolPlugin> {
    let tool = LocalTool::new(
        "echo",
        "echoes its input",
        json!({ "type": "object" }),
        |args| Box::pin(async move { LocalToolOutcome::ok(args) }),
    );
    Arc::new(LocalToolPlugin::new().register(tool))
}

/// S1: a single-shot reply with no tool calls completes in one iteration.
#[tokio::test]
async fn s1_single_shot_reply_completes() {
    let provider = Arc::new(ScriptedProvider::single_reply("the answer is 4", FinishReason::Stop));
    let (agent, messages, _) = build_agent(provider, vec![], 10);

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("2+2?"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut saw_complete = false;
    while let Some(ev) = stream.next().await {
        if let Event::TaskComplete { content, .. } = ev.event {
            assert_eq!(content, "the answer is 4");
            saw_complete = true;
        }
    }
    assert!(saw_complete);

    let history = messages.get_all("ctx-1").await.unwrap();
    assert_eq!(history.len(), 2);
}

/// S2: a reply with tool calls triggers dispatch, and the tool result is
/// fed back for a second iteration that then terminates normally.
#[tokio::test]
async fn s2_tool_call_then_final_reply() {
    let call = ToolCall::new("c1", "echo", json!({ "x": 1 }));
    let provider = ScriptedProvider::new(vec![
        ScriptedTurn { content: String::new(), finish_reason: FinishReason::ToolCalls, tool_calls: vec![call] },
        ScriptedTurn { content: "done".to_string(), finish_reason: FinishReason::Stop, tool_calls: vec![] },
    ]);
    let (agent, messages, _) = build_agent(Arc::new(provider), vec![echo_plugin()], 10);

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("go"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut tool_complete_count = 0;
    let mut final_content = None;
    while let Some(ev) = stream.next().await {
        match ev.event {
            Event::ToolComplete { success, .. } => {
                assert!(success);
                tool_complete_count += 1;
            }
            Event::TaskComplete { content, .. } => final_content = Some(content),
            _ => {}
        }
    }
    assert_eq!(tool_complete_count, 1);
    assert_eq!(final_content.as_deref(), Some("done"));

    // user + assistant(tool_calls) + tool-result + assistant(final)
    let history = messages.get_all("ctx-1").await.unwrap();
    assert_eq!(history.len(), 4);
}

/// The iteration cap is enforced — a provider that always asks for another
/// tool call never reaches `content-complete` with a stop reason, and the
/// loop reports failure (followed by an empty `task-complete`) rather than
/// looping forever.
#[tokio::test]
async fn iteration_cap_is_enforced() {
    let call = ToolCall::new("c1", "echo", json!({}));
    let provider = ScriptedProvider::single_reply_with_tool_calls("", vec![call]);
    let (agent, _messages, _) = build_agent(Arc::new(provider), vec![echo_plugin()], 3);

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("loop forever"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut statuses = Vec::new();
    let mut saw_empty_complete = false;
    while let Some(ev) = stream.next().await {
        match ev.event {
            Event::TaskStatus { status, ref message, .. } => {
                statuses.push(status);
                if status == TaskStatus::Failed {
                    assert_eq!(message.as_deref(), Some("max iterations reached"));
                }
            }
            Event::TaskComplete { ref content, .. } => saw_empty_complete = content.is_empty(),
            _ => {}
        }
    }
    assert_eq!(statuses.last(), Some(&TaskStatus::Failed));
    assert!(saw_empty_complete);
}

/// Cancelling before the loop starts its next iteration stops the turn
/// without a completion event.
#[tokio::test]
async fn cancellation_stops_the_turn() {
    let call = ToolCall::new("c1", "echo", json!({}));
    let provider = ScriptedProvider::single_reply_with_tool_calls("", vec![call]);
    let tool_runner = Arc::new(ToolRunner::new(vec![echo_plugin()]));
    let iteration_runner = Arc::new(IterationRunner::new(Arc::new(provider), tool_runner));
    let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
    let loop_runner = Arc::new(LoopRunner::new(iteration_runner, messages, LoopConfig { max_iterations: 10 }));
    let cancel_map = Arc::new(CancelMap::new());
    let agent = Agent::new(loop_runner, Arc::new(InMemoryAgentStore::new()), cancel_map.clone());

    cancel_map.register("task-1");
    cancel_map.cancel("task-1");

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("go"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut saw_cancelled = false;
    while let Some(ev) = stream.next().await {
        if let Event::TaskStatus { status: TaskStatus::Canceled, .. } = ev.event {
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled);
}

/// A provider error surfaces as a failed task status rather than
/// propagating a panic or a bare `Err` out of the stream.
#[tokio::test]
async fn provider_error_fails_the_turn_gracefully() {
    let (agent, _messages, _) = build_agent(Arc::new(FailingProvider), vec![], 10);

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("hello"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut saw_failed = false;
    while let Some(ev) = stream.next().await {
        if let Event::TaskStatus { status: TaskStatus::Failed, .. } = ev.event {
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

/// S3 — concurrent artifact writes. A create and three appends are
/// submitted in one batch against the same artifact id; the scheduler's
/// per-key serialization must still apply them in submission order.
#[tokio::test]
async fn s3_concurrent_artifact_writes_apply_in_submission_order() {
    use tl_core::artifact::{ArtifactStatus, CreateArtifactRequest};
    use tl_core::store::AppendChunkOptions;

    let scheduler = Arc::new(tl_stores::ArtifactScheduler::new(tl_stores::InMemoryArtifactStore::new()));

    let create_req = CreateArtifactRequest {
        artifact_id: "a".into(),
        task_id: "task-1".into(),
        context_id: "ctx-1".into(),
        name: Some("r.txt".into()),
        r#override: false,
    };

    let (s1, s2, s3, s4) = (scheduler.clone(), scheduler.clone(), scheduler.clone(), scheduler.clone());
    let _ = tokio::join!(
        s1.create_file_artifact(create_req, "text/plain".into(), "utf-8".into()),
        s2.append_file_chunk("ctx-1", "a", "Based on ".into(), AppendChunkOptions { is_last_chunk: false, encoding: None }),
        s3.append_file_chunk("ctx-1", "a", "the analysis, ".into(), AppendChunkOptions { is_last_chunk: false, encoding: None }),
        s4.append_file_chunk(
            "ctx-1",
            "a",
            "I recommend...".into(),
            AppendChunkOptions { is_last_chunk: true, encoding: None },
        ),
    );

    let artifact = scheduler.get_artifact("ctx-1", "a").await.unwrap().unwrap();
    assert_eq!(artifact.header().status, ArtifactStatus::Complete);
    let file = artifact.as_file().unwrap();
    assert_eq!(file.chunks.len(), 3);
    assert_eq!(file.chunks.concat(), "Based on the analysis, I recommend...");
}

/// S4 — invalid tool arguments, exercised end to end. A `strict` local tool
/// rejects its arguments against its declared schema; the turn still
/// completes, the tool outcome reports the schema failure, and the next
/// iteration's history carries a `tool` message with that error text.
#[tokio::test]
async fn s4_invalid_tool_arguments_end_to_end() {
    let strict_tool = LocalTool::new(
        "strict",
        "requires a well-formed email and a non-negative age",
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "pattern": "^[^@\\s]+@[^@\\s]+\\.[^@\\s]+$" },
                "age": { "type": "integer", "minimum": 0 },
            },
            "required": ["email", "age"],
        }),
        |args| Box::pin(async move { LocalToolOutcome::ok(args) }),
    );
    let plugin: Arc<dyn ToolPlugin> = Arc::new(LocalToolPlugin::new().register(strict_tool));

    let call = ToolCall::new("c1", "strict", json!({ "email": "not-an-email", "age": 25 }));
    let provider = ScriptedProvider::new(vec![
        ScriptedTurn { content: String::new(), finish_reason: FinishReason::ToolCalls, tool_calls: vec![call] },
        ScriptedTurn { content: "done".to_string(), finish_reason: FinishReason::Stop, tool_calls: vec![] },
    ]);
    let (agent, messages, _) = build_agent(Arc::new(provider), vec![plugin], 10);

    let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("register me"), vec![]).await.unwrap();
    futures_util::pin_mut!(stream);
    let mut tool_error = None;
    while let Some(ev) = stream.next().await {
        if let Event::ToolComplete { success, error, .. } = ev.event {
            assert!(!success);
            tool_error = error;
        }
    }
    let tool_error = tool_error.expect("expected exactly one failing tool outcome");
    assert!(tool_error.to_lowercase().contains("invalid arguments"));

    let history = messages.get_all("ctx-1").await.unwrap();
    let tool_message = history
        .iter()
        .find(|m| matches!(m, LlmMessage::Tool { .. }))
        .expect("history should carry the tool-result message");
    assert_eq!(tool_message.content(), tool_error.as_str());
}

/// S5 — artifact override. Creating over an existing artifact id with
/// `override: true` bumps the version by exactly one, resets status to
/// `building`, and leaves `createdAt` unchanged.
#[tokio::test]
async fn s5_artifact_override_bumps_version_and_preserves_created_at() {
    use tl_core::artifact::CreateArtifactRequest;
    use tl_core::artifact::ArtifactStatus;

    let store = tl_stores::InMemoryArtifactStore::new();
    let req = CreateArtifactRequest {
        artifact_id: "test-file".into(),
        task_id: "task-1".into(),
        context_id: "ctx-1".into(),
        name: None,
        r#override: false,
    };
    let original = store.create_data_artifact(req).await.unwrap();

    let override_req = CreateArtifactRequest {
        artifact_id: "test-file".into(),
        task_id: "task-1".into(),
        context_id: "ctx-1".into(),
        name: Some("Updated".into()),
        r#override: true,
    };
    store.create_data_artifact(override_req).await.unwrap();

    let artifact = store.get_artifact("ctx-1", "test-file").await.unwrap().unwrap();
    assert_eq!(artifact.header().name.as_deref(), Some("Updated"));
    assert_eq!(artifact.header().version, original.header().version + 1);
    assert_eq!(artifact.header().status, ArtifactStatus::Building);
    assert_eq!(artifact.header().created_at, original.header().created_at);
}

/// S6 — busy guard. A turn T1 is started without consuming its stream to
/// completion; a second `handle_turn` call for the same context emits
/// exactly one `task-status{status:"failed"}` mentioning that a turn is
/// already running and completes, while T1 is unaffected.
#[tokio::test]
async fn s6_busy_agent_rejects_a_second_concurrent_turn() {
    let provider = Arc::new(ScriptedProvider::single_reply("hi", FinishReason::Stop));
    let (agent, _messages, _) = build_agent(provider, vec![], 10);

    let t1_stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("first"), vec![]).await.unwrap();

    let t2_stream = agent.handle_turn("ctx-1", "task-2", LlmMessage::user("second"), vec![]).await.unwrap();
    futures_util::pin_mut!(t2_stream);
    let mut t2_events = Vec::new();
    while let Some(ev) = t2_stream.next().await {
        t2_events.push(ev.event);
    }
    assert_eq!(t2_events.len(), 1);
    match &t2_events[0] {
        Event::TaskStatus { status: TaskStatus::Failed, message: Some(message), .. } => {
            assert!(message.contains("already executing a turn"));
        }
        other => panic!("expected a single failed task-status, got {other:?}"),
    }

    futures_util::pin_mut!(t1_stream);
    let mut t1_completed = false;
    while let Some(ev) = t1_stream.next().await {
        if let Event::TaskComplete { content, .. } = ev.event {
            assert_eq!(content, "hi");
            t1_completed = true;
        }
    }
    assert!(t1_completed);
}
