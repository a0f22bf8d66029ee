use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Delivered,
    Failed(String),
}

/// One speech request issued to the avatar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpokenUtterance {
    pub id: Uuid,
    pub session_id: String,
    pub text: String,
    pub spoken_at: DateTime<Utc>,
    pub outcome: Outcome,
}

impl SpokenUtterance {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            text: text.into(),
            spoken_at: Utc::now(),
            outcome,
        }
    }

    pub fn delivered(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(session_id, text, Outcome::Delivered)
    }

    pub fn failed(
        session_id: impl Into<String>,
        text: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(session_id, text, Outcome::Failed(error.into()))
    }

    pub fn is_delivered(&self) -> bool {
        self.outcome == Outcome::Delivered
    }
}
