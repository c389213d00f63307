use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use docqa_core::types::Role;
use docqa_relay::{ChatMessage, ChatRequest, Frame, GenerationBackend, OpenAiCompatibleBackend, PromptAssembler, StreamRelay};

/// Accept one connection, capture the request, reply with `response` verbatim
/// and close. Returns the base URL and the captured request text.
async fn serve_once(response: Vec<u8>) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = tx.send(request);
        socket.write_all(&response).await.unwrap();
        let _ = socket.shutdown().await;
    });
    (format!("http://{addr}/v1"), rx)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim().eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return text;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn delta(text: &str) -> String {
    serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": text } }] }).to_string()
}

fn sse_body(events: &[String]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn http_response(status: &str, content_type: &str, body: &str, content_length: usize) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {content_length}\r\nconnection: close\r\n\r\n{body}"
    )
    .into_bytes()
}

fn relay_to(base_url: &str) -> StreamRelay {
    let backend = OpenAiCompatibleBackend::new(base_url, Some("sk-test".to_string()), 64).unwrap();
    StreamRelay::new(Arc::new(backend), PromptAssembler::default())
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        model: "llama-test".to_string(),
        messages: vec![ChatMessage { role: Role::User, content: "hi".to_string() }],
        temperature: 0.5,
    }
}

#[tokio::test]
async fn streamed_tokens_end_at_done_marker() {
    let body = sse_body(&[delta("Hel"), delta("lo"), "[DONE]".to_string(), delta("ignored")]);
    let (base_url, request) = serve_once(http_response("200 OK", "text/event-stream", &body, body.len())).await;

    let frames: Vec<Frame> = relay_to(&base_url).stream("q", &[], "llama-test", 0.5, &[]).collect().await;
    assert_eq!(frames, vec![Frame::Content("Hel".into()), Frame::Content("lo".into()), Frame::Done]);

    let request = request.await.unwrap();
    let lower = request.to_lowercase();
    assert!(request.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(lower.contains("authorization: bearer sk-test"));
    assert!(request.contains("\"stream\":true"));
    assert!(request.contains("\"model\":\"llama-test\""));
    assert!(request.contains("\"max_tokens\":64"));
    assert!(request.contains("\"role\":\"user\""));
}

#[tokio::test]
async fn error_status_becomes_single_error_frame() {
    let (base_url, _request) = serve_once(http_response("500 Internal Server Error", "text/plain", "boom", 4)).await;

    let frames: Vec<Frame> = relay_to(&base_url).stream("q", &[], "m", 0.5, &[]).collect().await;
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        Frame::Error(message) => {
            assert!(message.contains("500"), "{message}");
            assert!(message.contains("boom"), "{message}");
        }
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn truncated_body_keeps_partial_content_then_errors() {
    let body = sse_body(&[delta("X")]);
    let (base_url, _request) = serve_once(http_response("200 OK", "text/event-stream", &body, body.len() + 500)).await;

    let frames: Vec<Frame> = relay_to(&base_url).stream("q", &[], "m", 0.5, &[]).collect().await;
    assert_eq!(frames.len(), 2, "{frames:?}");
    assert_eq!(frames[0], Frame::Content("X".into()));
    assert!(matches!(&frames[1], Frame::Error(_)), "{frames:?}");
}

#[tokio::test]
async fn body_without_done_marker_flushes_trailing_line() {
    let body = format!("data: {}\n\ndata: {}", delta("a"), delta("b"));
    let (base_url, _request) = serve_once(http_response("200 OK", "text/event-stream", &body, body.len())).await;

    let frames: Vec<Frame> = relay_to(&base_url).stream("q", &[], "m", 0.5, &[]).collect().await;
    assert_eq!(frames, vec![Frame::Content("a".into()), Frame::Content("b".into()), Frame::Done]);
}

#[tokio::test]
async fn in_band_error_event_stops_stream() {
    let error = serde_json::json!({ "error": { "message": "rate limited" } }).to_string();
    let body = sse_body(&[delta("partial"), error, delta("never")]);
    let (base_url, _request) = serve_once(http_response("200 OK", "text/event-stream", &body, body.len())).await;

    let frames: Vec<Frame> = relay_to(&base_url).stream("q", &[], "m", 0.5, &[]).collect().await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], Frame::Content("partial".into()));
    assert!(matches!(&frames[1], Frame::Error(m) if m.contains("rate limited")));
}

#[tokio::test]
async fn unreachable_backend_yields_error_item() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = OpenAiCompatibleBackend::new(format!("http://{addr}/v1"), None, 16).unwrap();
    let items: Vec<_> = backend.stream_chat(chat_request()).collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(docqa_core::Error::BackendFailure(_))));
}
