use serde::Serialize;

/// One self-contained unit of a streamed answer.
///
/// Serializes as `{"content": ...}`, `{"error": ...}` or `"done"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    Content(String),
    Done,
    Error(String),
}

impl Frame {
    /// `Done` and `Error` end a stream; nothing follows them.
    pub fn is_terminal(&self) -> bool { !matches!(self, Frame::Content(_)) }

    /// Server-sent-event encoding, one frame per event.
    pub fn to_sse(&self) -> String {
        match self {
            Frame::Content(text) => format!("data: {}\n\n", serde_json::json!({ "content": text })),
            Frame::Done => "data: [DONE]\n\n".to_string(),
            Frame::Error(message) => format!("data: {}\n\n", serde_json::json!({ "error": message })),
        }
    }
}
