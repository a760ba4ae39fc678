//! Collaborator behaviour against a mock HTTP server and a temp directory

use pretty_assertions::assert_eq;
use serde_json::json;
use swarm_core::{
    AgentRole, Credentials, GenerationConfig, InferenceClient, InferenceError, InferenceRequest,
    Message, ToolError, Workspace,
};
use swarm_tools::{GeminiClient, LocalWorkspace};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/gemini-2.5-flash:generateContent";

fn request() -> InferenceRequest {
    InferenceRequest {
        role: AgentRole::Judge,
        model: "gemini-2.5-flash".into(),
        system_prompt: "You are the Judge".into(),
        messages: vec![Message::user("{\"file_path\": \"calc.py\"}")],
        generation: GenerationConfig::new(0.1, 2000),
    }
}

async fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(&Credentials::new("test-key"))
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn gemini_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "You are the Judge"}]},
            "generationConfig": {"maxOutputTokens": 2000}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"verdict\": \"PASS\"}"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).await.invoke(request()).await.unwrap();
    assert_eq!(text, "{\"verdict\": \"PASS\"}");
}

#[tokio::test]
async fn gemini_rate_limit_is_quota_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let err = client(&server).await.invoke(request()).await.unwrap_err();
    assert_eq!(err, InferenceError::QuotaExceeded("RESOURCE_EXHAUSTED".into()));
}

#[tokio::test]
async fn gemini_server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).await.invoke(request()).await.unwrap_err();
    assert!(matches!(err, InferenceError::Http { status: 503, .. }));
}

#[tokio::test]
async fn gemini_without_candidates_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let err = client(&server).await.invoke(request()).await.unwrap_err();
    assert_eq!(err, InferenceError::EmptyResponse);
}

#[tokio::test]
async fn gemini_non_json_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).await.invoke(request()).await.unwrap_err();
    assert!(matches!(err, InferenceError::Decode(_)));
}

#[tokio::test]
async fn workspace_round_trips_inside_sandbox() {
    let dir = TempDir::new().unwrap();
    let ws = LocalWorkspace::new(dir.path());
    let file = dir.path().join("calc.py");
    std::fs::write(&file, "x = 1\n").unwrap();

    assert_eq!(ws.read(&file).await.as_deref(), Some("x = 1\n"));
    assert!(ws.write(&file, "x = 2\n").await);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "x = 2\n");
    assert!(ws.exists(&file).await);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".swarm.tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn workspace_refuses_outside_paths() {
    let sandbox = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let ws = LocalWorkspace::new(sandbox.path());
    let target = outside.path().join("victim.py");
    std::fs::write(&target, "safe\n").unwrap();

    assert!(!ws.write(&target, "pwned\n").await);
    assert_eq!(ws.read(&target).await, None);
    assert!(!ws.exists(&target).await);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "safe\n");

    let escape = sandbox.path().join("..").join("x.py");
    assert!(matches!(ws.resolve(&escape), Err(ToolError::OutsideWorkspace(_))));
}

#[tokio::test]
async fn workspace_missing_file_reads_none() {
    let dir = TempDir::new().unwrap();
    let ws = LocalWorkspace::new(dir.path());
    assert_eq!(ws.read(&dir.path().join("absent.py")).await, None);
    assert!(!ws.exists(&dir.path().join("absent.py")).await);
}

#[tokio::test]
async fn missing_tools_are_reported() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("calc.py");
    std::fs::write(&file, "x = 1\n").unwrap();
    let ws = LocalWorkspace::new(dir.path())
        .with_pylint("swarm-no-such-pylint")
        .with_pytest("swarm-no-such-pytest");

    assert!(matches!(
        ws.static_analysis(&file).await,
        Err(ToolError::NotInstalled { tool }) if tool == "swarm-no-such-pylint"
    ));
    assert!(matches!(
        ws.run_tests(&file).await,
        Err(ToolError::NotInstalled { .. })
    ));
}
