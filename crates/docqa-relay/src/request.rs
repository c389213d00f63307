use serde::{Deserialize, Serialize};

use docqa_core::types::ConversationTurn;
use docqa_core::{Error, Result};

/// Inbound question with optional history and sampling temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Some(t) = self.temperature {
            validate_temperature(t)?;
        }
        Ok(())
    }

    pub fn temperature_or(&self, default: f32) -> f32 { self.temperature.unwrap_or(default) }
}

pub fn validate_temperature(t: f32) -> Result<()> {
    if (0.0..=2.0).contains(&t) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("temperature must be within [0.0, 2.0], got {t}")))
    }
}
