//! End-to-end integration tests for Baso.
//!
//! These tests exercise the full pipeline from user input to the published
//! conversation: config, policy registry, prompt assembly, the real HTTP
//! transports against a local SSE server, and the session controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use baso_config::AppConfig;
use baso_core::error::TransportError;
use baso_core::message::MessageStatus;
use baso_core::mode::Mode;
use baso_core::prompt::{AssembledRequest, LanguagePreference, TurnShape};
use baso_core::transport::{FragmentReceiver, Transport, fragment_channel};
use baso_session::{SessionController, SessionState, SubmitOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Mock Transport ───────────────────────────────────────────────────────

/// A mock transport that replays scripted fragment lists in sequence.
struct ScriptedTransport {
    replies: Mutex<Vec<Result<Vec<&'static str>, TransportError>>>,
    requests: Mutex<Vec<AssembledRequest>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<Vec<&'static str>, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<AssembledRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn stream(&self, request: AssembledRequest) -> Result<FragmentReceiver, TransportError> {
        self.requests.lock().unwrap().push(request);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                panic!("ScriptedTransport exhausted");
            }
            replies.remove(0)
        };
        let fragments = reply?;

        let (tx, rx) = fragment_channel(fragments.len().max(1));
        for fragment in fragments {
            tx.send(Ok(fragment.to_string())).await.unwrap();
        }
        Ok(rx)
    }
}

// ── Local SSE server ─────────────────────────────────────────────────────

/// What the server saw for one request.
#[derive(Debug, Clone)]
struct Captured {
    request_line: String,
    headers: String,
    body: serde_json::Value,
}

/// Serve one HTTP request with a fixed status and SSE body.
async fn serve_once(status: &'static str, sse_body: String) -> (String, tokio::task::JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while raw.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{sse_body}"
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        let (request_line, headers) = head.split_once("\r\n").unwrap();
        Captured {
            request_line: request_line.to_string(),
            headers: headers.to_lowercase(),
            body: serde_json::from_slice(&raw[header_end..header_end + content_length])
                .unwrap_or(serde_json::Value::Null),
        }
    });

    (format!("http://{addr}"), handle)
}

fn gemini_event(text: &str) -> String {
    let chunk = serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    });
    format!("data: {chunk}\r\n\r\n")
}

fn openai_event(text: &str) -> String {
    let chunk = serde_json::json!({ "choices": [{ "delta": { "content": text } }] });
    format!("data: {chunk}\n\n")
}

fn gemini_config(base_url: &str) -> AppConfig {
    AppConfig {
        api_key: Some("test-key".into()),
        base_url: Some(base_url.into()),
        ..AppConfig::default()
    }
}

// ── Scripted pipeline ────────────────────────────────────────────────────

#[tokio::test]
async fn translate_pipeline_is_stateless() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(vec!["Salamaik pagi"]),
        Ok(vec!["Tarimo", " kasih", " sangaik"]),
    ]));
    let session =
        SessionController::from_config(&AppConfig::default(), Mode::Translate, transport.clone())
            .unwrap();

    session.submit("Selamat pagi", None).await.unwrap();
    let outcome = session.submit("Terima kasih banyak", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].prior_turns.is_empty());
    assert_eq!(requests[1].model, "gemini-2.5-flash");
    assert!(requests[1].reasoning.is_none());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages.len(), 4);
    let last = snapshot.last().unwrap();
    assert_eq!(last.content, "Tarimo kasih sangaik");
    assert_eq!(last.status, MessageStatus::Complete);
}

#[tokio::test]
async fn knowledge_pipeline_carries_history_and_reasoning() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(vec!["Rendang ", "adolah masakan."]),
        Ok(vec!["Dimasak ", "bajam-jam."]),
    ]));
    let config = AppConfig {
        reasoning_budget: 4096,
        ..AppConfig::default()
    };
    let session = SessionController::from_config(&config, Mode::Knowledge, transport.clone()).unwrap();

    session.submit("Apo itu rendang?", None).await.unwrap();
    session.submit("Baa caro mamasaknyo?", None).await.unwrap();

    let request = &transport.requests()[1];
    assert_eq!(request.shape, TurnShape::MultiTurn);
    assert_eq!(request.prior_turns.len(), 2);
    assert_eq!(request.prior_turns[1].text, "Rendang adolah masakan.");
    assert_eq!(request.reasoning.unwrap().budget_tokens, 4096);
    assert_eq!(request.model, "gemini-3-pro-preview");
}

#[tokio::test]
async fn failure_then_recovery() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(TransportError::QuotaExceeded { retry_after_secs: 5 }),
        Ok(vec!["Alah pulih"]),
    ]));
    let session = SessionController::from_config(&AppConfig::default(), Mode::Chat, transport)
        .unwrap()
        .with_language(Some(LanguagePreference::Indonesian));

    session.submit("Halo", None).await.unwrap();
    let failed = session.snapshot().last().cloned().unwrap();
    assert_eq!(failed.status, MessageStatus::Failed);
    assert_eq!(failed.content, LanguagePreference::Indonesian.failure_message());
    assert_eq!(session.state(), SessionState::Idle);

    session.submit("Halo lai", None).await.unwrap();
    assert_eq!(session.snapshot().last().unwrap().content, "Alah pulih");
}

#[tokio::test]
async fn snapshots_serialize_for_the_ui() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(vec!["Yo"])]));
    let session = SessionController::from_config(&AppConfig::default(), Mode::Chat, transport).unwrap();
    let mut events = session.subscribe();

    session.submit("Iyo?", None).await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        let json = serde_json::to_value(event.as_ref()).unwrap();
        assert!(json["snapshot"]["messages"].is_array());
        types.push(json["type"].as_str().unwrap().to_string());
    }
    assert_eq!(types, vec!["submitted", "fragment", "completed"]);
}

// ── Real transports over HTTP ────────────────────────────────────────────

#[tokio::test]
async fn gemini_transport_streams_over_sse() {
    let body = [gemini_event("Tarimo"), gemini_event(" kasih"), gemini_event(" sangaik")].concat();
    let (base_url, server) = serve_once("200 OK", body).await;

    let config = gemini_config(&base_url);
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Translate, transport).unwrap();

    let outcome = session.submit("Terima kasih banyak", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    assert_eq!(session.snapshot().last().unwrap().content, "Tarimo kasih sangaik");

    let captured = server.await.unwrap();
    assert!(
        captured
            .request_line
            .starts_with("POST /models/gemini-2.5-flash:streamGenerateContent?alt=sse")
    );
    assert!(captured.headers.contains("x-goog-api-key: test-key"));
    assert_eq!(captured.body["contents"].as_array().unwrap().len(), 1);
    assert_eq!(
        captured.body["contents"][0]["parts"][0]["text"],
        "Terima kasih banyak"
    );
    assert!(
        captured.body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("TRANSLATOR")
    );
}

#[tokio::test]
async fn gemini_empty_stream_becomes_failed_message() {
    let (base_url, server) = serve_once("200 OK", String::new()).await;

    let config = gemini_config(&base_url);
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Chat, transport).unwrap();

    let outcome = session.submit("Halo", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    let last = session.snapshot().last().cloned().unwrap();
    assert_eq!(last.status, MessageStatus::Failed);
    assert_eq!(last.content, LanguagePreference::Minang.failure_message());
    server.await.unwrap();
}

#[tokio::test]
async fn gemini_error_after_partial_text_fails_message() {
    let error = r#"{"error":{"code":500,"message":"Internal error encountered.","status":"INTERNAL"}}"#;
    let body = [gemini_event("Assalamual"), format!("data: {error}\r\n\r\n")].concat();
    let (base_url, server) = serve_once("200 OK", body).await;

    let config = gemini_config(&base_url);
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Chat, transport).unwrap();
    let mut events = session.subscribe();

    let outcome = session.submit("Assalamualaikum", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    let last = session.snapshot().last().cloned().unwrap();
    assert_eq!(last.status, MessageStatus::Failed);
    assert_eq!(last.content, LanguagePreference::Minang.failure_message());
    assert_eq!(session.state(), SessionState::Idle);

    let mut saw_partial = false;
    while let Ok(event) = events.try_recv() {
        if let Some(message) = event.snapshot().last() {
            saw_partial |= message.content == "Assalamual";
        }
    }
    assert!(saw_partial);
    server.await.unwrap();
}

#[tokio::test]
async fn gemini_quota_error_becomes_failed_message() {
    let (base_url, server) = serve_once("429 Too Many Requests", String::new()).await;

    let config = gemini_config(&base_url);
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Chat, transport).unwrap();

    let outcome = session.submit("Halo", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(session.state(), SessionState::Idle);
    server.await.unwrap();
}

#[tokio::test]
async fn openai_compat_transport_streams_until_done() {
    let body = [
        openai_event("Halo"),
        openai_event(" Sanak"),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();
    let (base_url, server) = serve_once("200 OK", body).await;

    let config = AppConfig {
        transport: "openai_compat".into(),
        base_url: Some(base_url),
        ..AppConfig::default()
    };
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Writer, transport).unwrap();

    session.submit("Buek pantun", None).await.unwrap();
    assert_eq!(session.snapshot().last().unwrap().content, "Halo Sanak");

    let captured = server.await.unwrap();
    assert!(captured.request_line.starts_with("POST /chat/completions"));
    assert_eq!(captured.body["stream"], true);
    assert_eq!(captured.body["messages"][0]["role"], "system");
    assert_eq!(captured.body["reasoning_effort"], "medium");
}

#[tokio::test]
async fn openai_compat_undecodable_chunk_fails_message() {
    let body = [
        openai_event("Halo"),
        "data: {\"choices\":[{\"delta\"\n\n".to_string(),
        openai_event(" Sanak"),
    ]
    .concat();
    let (base_url, server) = serve_once("200 OK", body).await;

    let config = AppConfig {
        transport: "openai_compat".into(),
        base_url: Some(base_url),
        ..AppConfig::default()
    };
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Chat, transport).unwrap();

    let outcome = session.submit("Halo", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(session.snapshot().last().unwrap().status, MessageStatus::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn openai_compat_error_chunk_fails_message() {
    let body = [
        openai_event("Halo"),
        "data: {\"error\":{\"message\":\"model overloaded\",\"code\":null}}\n\n".to_string(),
    ]
    .concat();
    let (base_url, server) = serve_once("200 OK", body).await;

    let config = AppConfig {
        transport: "openai_compat".into(),
        base_url: Some(base_url),
        ..AppConfig::default()
    };
    let transport = baso_providers::build_from_config(&config).unwrap();
    let session = SessionController::from_config(&config, Mode::Chat, transport).unwrap();

    let outcome = session.submit("Halo", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(
        session.snapshot().last().unwrap().content,
        LanguagePreference::Minang.failure_message()
    );
    server.await.unwrap();
}

#[tokio::test]
async fn transport_health_check_against_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = AppConfig {
        request_timeout_secs: 2,
        ..gemini_config(&format!("http://{addr}"))
    };
    let transport = baso_providers::build_from_config(&config).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), transport.health_check())
        .await
        .unwrap();
    assert!(result.is_err());
}
