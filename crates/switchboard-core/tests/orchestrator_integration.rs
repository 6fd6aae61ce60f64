//! Query orchestration and session teardown against scripted fakes.
//!
//! `ScriptedProvider` replays canned model responses and records every request;
//! `FakeLauncher` stands in for tool-server processes and records calls and
//! closes.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use serde_json::{Value, json};
use switchboard_core::{Orchestrator, ToolRegistry, run_with_cleanup};
use switchboard_mcp::{
    LaunchSettings, McpError, McpFuture, PoolError, ServerLaunch, ServerLauncher, ServerPool,
    ToolCallResult, ToolDescriptor, ToolServer,
};
use switchboard_types::{
    ApiError, ContentBlock, CreateMessageRequest, CreateMessageResponse, Provider, ProviderFuture,
    Role,
};

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<CreateMessageResponse, ApiError>>>,
    requests: Mutex<Vec<CreateMessageRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<CreateMessageResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CreateMessageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Provider for ScriptedProvider {
    fn create_message<'a>(&'a self, request: &'a CreateMessageRequest) -> ProviderFuture<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected model call #{}", self.requests().len()))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn reply(blocks: Vec<ContentBlock>) -> Result<CreateMessageResponse, ApiError> {
    Ok(CreateMessageResponse::assistant(blocks))
}

fn text(t: &str) -> ContentBlock {
    ContentBlock::Text { text: t.into() }
}

fn tool_use(name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: format!("toolu_{name}"),
        name: name.into(),
        input,
    }
}

// ---------------------------------------------------------------------------
// FakeLauncher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Record {
    closed: AtomicUsize,
    calls: Mutex<Vec<(usize, String, Value)>>,
}

/// Serves the tools listed for each script file name. Unlisted scripts fail
/// to launch. Tool `flaky` fails in transport; tool `blank` returns nothing.
struct FakeLauncher {
    servers: HashMap<String, Vec<String>>,
    record: Arc<Record>,
}

struct FakeServer {
    index: usize,
    tools: Vec<ToolDescriptor>,
    record: Arc<Record>,
}

impl ServerLauncher for FakeLauncher {
    fn launch<'a>(&'a self, launch: &'a ServerLaunch) -> McpFuture<'a, Box<dyn ToolServer>> {
        Box::pin(async move {
            let file = launch.path.to_string_lossy().into_owned();
            let Some(names) = self.servers.get(&file) else {
                return Err(McpError::ServerClosed);
            };
            let tools = names
                .iter()
                .map(|n| ToolDescriptor {
                    name: n.clone(),
                    description: format!("{n} on {file}"),
                    input_schema: json!({"type": "object"}),
                })
                .collect();
            Ok(Box::new(FakeServer {
                index: launch.index,
                tools,
                record: Arc::clone(&self.record),
            }) as Box<dyn ToolServer>)
        })
    }
}

impl ToolServer for FakeServer {
    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> McpFuture<'a, ToolCallResult> {
        Box::pin(async move {
            self.record
                .calls
                .lock()
                .unwrap()
                .push((self.index, name.to_string(), arguments.clone()));
            match name {
                "flaky" => Err(McpError::ServerClosed),
                "blank" => Ok(ToolCallResult::default()),
                _ => Ok(ToolCallResult::text(format!(
                    "{name} answered by server {} for {arguments}",
                    self.index + 1
                ))),
            }
        })
    }

    fn shutdown(self: Box<Self>) -> McpFuture<'static, ()> {
        Box::pin(async move {
            self.record.closed.fetch_add(1, Ordering::SeqCst);
            Ok::<(), McpError>(())
        })
    }
}

fn fake_pool(servers: &[(&str, &[&str])]) -> (ServerPool, Arc<Record>) {
    let record = Arc::new(Record::default());
    let launcher = FakeLauncher {
        servers: servers
            .iter()
            .map(|(file, tools)| {
                (
                    file.to_string(),
                    tools.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect(),
        record: Arc::clone(&record),
    };
    (
        ServerPool::new(Arc::new(launcher), LaunchSettings::default()),
        record,
    )
}

async fn connected(servers: &[(&str, &[&str])]) -> (ServerPool, ToolRegistry, Arc<Record>) {
    let (mut pool, record) = fake_pool(servers);
    let paths: Vec<&str> = servers.iter().map(|(file, _)| *file).collect();
    let catalogs = pool.connect(&paths[..]).await.unwrap();
    let registry = ToolRegistry::from_catalogs(&catalogs);
    (pool, registry, record)
}

const WEATHER: (&str, &[&str]) = (
    "weather.py",
    &["get_forecast", "get_alerts", "flaky", "blank"],
);
const FILES: (&str, &[&str]) = ("files.js", &["read_file"]);

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_only_response_is_joined_with_one_call() {
    let (pool, registry, record) = connected(&[WEATHER, FILES]).await;
    let provider = ScriptedProvider::new(vec![reply(vec![
        text("Hello!"),
        text("How can I help?"),
    ])]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("hi").await;

    assert_eq!(answer, "Hello!\nHow can I help?");
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test-model");
    assert_eq!(requests[0].max_tokens, 1000);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].content[0].as_text(), Some("hi"));
    assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(5));
    assert!(record.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tool_call_then_text_keeps_block_order() {
    let (pool, registry, record) = connected(&[WEATHER, FILES]).await;
    let provider = ScriptedProvider::new(vec![
        reply(vec![
            tool_use("get_forecast", json!({"city": "Lisbon", "days": 2})),
            text("Anything else?"),
        ]),
        reply(vec![text("Sunny all week.")]),
    ]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("Weather in Lisbon?").await;

    assert_eq!(
        answer,
        "[Called tool get_forecast with args {\"city\":\"Lisbon\",\"days\":2}]\n\
         Sunny all week.\n\
         Anything else?"
    );
    assert_eq!(
        *record.calls.lock().unwrap(),
        vec![(
            0,
            "get_forecast".to_string(),
            json!({"city": "Lisbon", "days": 2})
        )]
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.is_some());
    assert!(requests[1].tools.is_none());

    let follow_up = &requests[1].messages;
    assert_eq!(follow_up.len(), 2);
    assert_eq!(follow_up[1].role, Role::User);
    assert_eq!(
        follow_up[1].content[0].as_text(),
        Some("get_forecast answered by server 1 for {\"city\":\"Lisbon\",\"days\":2}")
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_without_any_call() {
    let (pool, registry, record) = connected(&[WEATHER]).await;
    let provider = ScriptedProvider::new(vec![reply(vec![
        tool_use("delete_everything", json!({})),
        text("Done."),
    ])]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("clean up").await;

    assert_eq!(
        answer,
        "[Error: Tool delete_everything not found in any connected server]\nDone."
    );
    assert!(record.calls.lock().unwrap().is_empty());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn colliding_tool_routes_to_later_server() {
    const FIRST: (&str, &[&str]) = ("first.py", &["search"]);
    const SECOND: (&str, &[&str]) = ("second.js", &["search"]);
    let (pool, registry, record) = connected(&[FIRST, SECOND]).await;
    let provider = ScriptedProvider::new(vec![
        reply(vec![tool_use("search", json!({"q": "rust"}))]),
        reply(vec![text("Found it.")]),
    ]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    orchestrator.process_query("search rust").await;

    let calls = record.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 1);
    assert_eq!(provider.requests()[0].tools.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn each_tool_block_gets_its_own_continuation() {
    let (pool, registry, record) = connected(&[WEATHER, FILES]).await;
    let provider = ScriptedProvider::new(vec![
        reply(vec![
            tool_use("get_alerts", json!({"state": "CA"})),
            tool_use("read_file", json!({"path": "notes.txt"})),
        ]),
        reply(vec![text("No alerts.")]),
        reply(vec![text("The notes say hi.")]),
    ]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("alerts and notes").await;

    let lines: Vec<&str> = answer.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "No alerts.");
    assert_eq!(lines[3], "The notes say hi.");

    let servers: Vec<usize> = record.calls.lock().unwrap().iter().map(|c| c.0).collect();
    assert_eq!(servers, vec![0, 1]);

    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].messages.len(), 3);
    assert!(requests[2].tools.is_none());
}

#[tokio::test]
async fn non_text_continuation_contributes_empty_line() {
    let (pool, registry, _) = connected(&[WEATHER]).await;
    let provider = ScriptedProvider::new(vec![
        reply(vec![tool_use("blank", json!({}))]),
        reply(vec![tool_use("get_alerts", json!({"state": "NY"}))]),
    ]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("anything").await;

    assert_eq!(answer, "[Called tool blank with args {}]\n");
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages[1].content[0].as_text(), Some("(no output)"));
}

#[tokio::test]
async fn model_failure_is_rendered_inline() {
    let (pool, registry, _) = connected(&[WEATHER]).await;
    let provider = ScriptedProvider::new(vec![Err(ApiError::Overloaded)]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("hi").await;

    assert_eq!(
        answer,
        format!("[Error processing query: {}]", ApiError::Overloaded)
    );
}

#[tokio::test]
async fn tool_failure_keeps_marker_and_partial_text() {
    let (pool, registry, _) = connected(&[WEATHER]).await;
    let provider = ScriptedProvider::new(vec![reply(vec![
        text("Let me check."),
        tool_use("flaky", json!({"x": 1})),
        text("never reached"),
    ])]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    let answer = orchestrator.process_query("go").await;

    let lines: Vec<&str> = answer.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Let me check.");
    assert_eq!(lines[1], "[Called tool flaky with args {\"x\":1}]");
    assert!(lines[2].starts_with("[Error processing query: Tool 'flaky' failed"));
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn empty_registry_sends_no_catalog() {
    const BARE: (&str, &[&str]) = ("bare.py", &[]);
    let (pool, registry, _) = connected(&[BARE]).await;
    let provider = ScriptedProvider::new(vec![reply(vec![text("ok")])]);
    let orchestrator = Orchestrator::new(provider.clone(), &registry, &pool, "test-model", 1000);

    orchestrator.process_query("hi").await;

    assert!(provider.requests()[0].tools.is_none());
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cleanup_after_normal_exit() {
    let (mut pool, record) = fake_pool(&[WEATHER, FILES]);

    let served = run_with_cleanup(&mut pool, |pool| {
        Box::pin(async move {
            pool.connect(&["weather.py", "files.js"]).await.unwrap();
            pool.len()
        })
    })
    .await;

    assert_eq!(served, 2);
    assert_eq!(record.closed.load(Ordering::SeqCst), 2);
    assert!(pool.is_empty());
}

#[tokio::test]
async fn cleanup_after_error_exit() {
    let (mut pool, record) = fake_pool(&[WEATHER, FILES]);

    let result: Result<(), PoolError> = run_with_cleanup(&mut pool, |pool| {
        Box::pin(async move {
            pool.connect(&["weather.py", "files.js"]).await?;
            pool.invoke(9, "get_alerts", json!({})).await?;
            Ok::<(), PoolError>(())
        })
    })
    .await;

    assert!(matches!(result, Err(PoolError::ServerNotConnected { index: 9 })));
    assert_eq!(record.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cleanup_after_panic() {
    let (mut pool, record) = fake_pool(&[WEATHER, FILES]);

    let outcome = AssertUnwindSafe(run_with_cleanup::<(), _>(&mut pool, |pool| {
        Box::pin(async move {
            pool.connect(&["weather.py", "files.js"]).await.unwrap();
            panic!("shell crashed");
        })
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(record.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cleanup_closes_siblings_of_failed_server() {
    let (mut pool, record) = fake_pool(&[WEATHER, FILES]);

    let result = run_with_cleanup(&mut pool, |pool| {
        Box::pin(async move {
            pool.connect(&["weather.py", "missing.py", "files.js"])
                .await
                .map(|_| ())
        })
    })
    .await;

    assert!(matches!(result, Err(PoolError::Connect { index: 1, .. })));
    assert_eq!(record.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bad_extension_opens_nothing() {
    let (mut pool, record) = fake_pool(&[WEATHER]);

    let result = run_with_cleanup(&mut pool, |pool| {
        Box::pin(async move { pool.connect(&["weather.py", "notes.md"]).await.map(|_| ()) })
    })
    .await;

    assert!(matches!(result, Err(PoolError::UnsupportedExtension { .. })));
    assert_eq!(record.closed.load(Ordering::SeqCst), 0);
}
