//! Prompt assembly and streaming relay to a chat-completions backend.

pub mod backend;
pub mod frame;
pub mod prompt;
pub mod relay;
pub mod request;
pub mod sse;

pub use backend::{ChatMessage, ChatRequest, GenerationBackend, OpenAiCompatibleBackend, TokenStream};
pub use frame::Frame;
pub use prompt::PromptAssembler;
pub use relay::{FrameStream, StreamRelay};
pub use request::AskRequest;
