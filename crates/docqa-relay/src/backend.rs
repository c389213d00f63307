use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::config::GenerationSettings;
use docqa_core::types::Role;
use docqa_core::{Error, Result};

use crate::sse::{SseDecoder, SseEvent};

/// Lazily-evaluated sequence of generated text fragments.
pub type TokenStream = BoxStream<'static, Result<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// A remote model that streams its completion.
///
/// `stream_chat` must not perform I/O itself: the call starts when the
/// returned stream is first polled, and dropping the stream must release the
/// underlying connection. Failures are yielded as `Err` items.
pub trait GenerationBackend: Send + Sync {
    fn stream_chat(&self, request: ChatRequest) -> TokenStream;
}

/// Client for OpenAI-style `/chat/completions` streaming endpoints (Groq by
/// default).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, max_tokens: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, base_url: base_url.into(), api_key, max_tokens })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        if settings.api_key.as_deref().map_or(true, str::is_empty) {
            tracing::warn!(base_url = %settings.base_url, "no generation API key configured");
        }
        Self::new(settings.base_url.clone(), settings.api_key.clone(), settings.max_tokens)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl GenerationBackend for OpenAiCompatibleBackend {
    fn stream_chat(&self, request: ChatRequest) -> TokenStream {
        Box::pin(completion_stream(self.client.clone(), self.endpoint(), self.api_key.clone(), self.max_tokens, request))
    }
}

fn completion_stream(
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    max_tokens: u32,
    request: ChatRequest,
) -> impl Stream<Item = Result<String>> + Send + 'static {
    async_stream::try_stream! {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens,
            stream: true,
        };
        tracing::info!(model = %request.model, messages = request.messages.len(), "calling generation backend");
        let mut builder = client.post(&url).json(&body);
        if let Some(key) = api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }
        let response = send_checked(builder).await?;

        let mut chunks = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut finished = false;
        while !finished {
            let Some(bytes) = chunks.next().await else { break };
            let bytes = bytes.map_err(transport_error)?;
            for event in decoder.push(&bytes) {
                match event {
                    SseEvent::Done => { finished = true; break; }
                    SseEvent::Data(data) => {
                        if let Some(token) = parse_delta(&data)? { yield token; }
                    }
                }
            }
        }
        if !finished {
            if let Some(SseEvent::Data(data)) = decoder.finish() {
                if let Some(token) = parse_delta(&data)? { yield token; }
            }
        }
    }
}

/// Send the request; a non-2xx status becomes `BackendFailure` carrying the
/// status line and response body.
async fn send_checked(builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(Error::BackendFailure(format!("{status}: {detail}")))
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::BackendFailure(e.to_string())
}

/// Extract the content delta of one streamed completion chunk. Chunks
/// without text (role announcements, finish markers) yield `None`.
pub fn parse_delta(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| Error::BackendFailure(format!("malformed stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        let message = error.get("message").and_then(serde_json::Value::as_str).map_or_else(|| error.to_string(), str::to_string);
        return Err(Error::BackendFailure(message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty()))
}
