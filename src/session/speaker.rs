//! Speech sink bound to one avatar session

use crate::heygen::{AvatarApi, TaskResult};
use crate::messages::{SpokenUtterance, UtteranceLog};
use crate::relay::SpeechSink;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Sends flushed text to the avatar as a speak task
#[derive(Clone)]
pub struct SessionSpeaker {
    api: Arc<dyn AvatarApi>,
    session_id: String,
    log: Option<UtteranceLog>,
}

impl SessionSpeaker {
    pub fn new(api: Arc<dyn AvatarApi>, session_id: impl Into<String>) -> Self {
        Self {
            api,
            session_id: session_id.into(),
            log: None,
        }
    }

    /// Record every speak call, successful or not, in `log`
    pub fn with_log(mut self, log: UtteranceLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl SpeechSink for SessionSpeaker {
    async fn speak(&self, text: String) -> Result<()> {
        debug!("Speaking {} chars in session {}", text.len(), self.session_id);

        let result = self.api.speak(&self.session_id, &text).await;

        if let Some(log) = &self.log {
            let utterance = match &result {
                Ok(_) => SpokenUtterance::delivered(&self.session_id, text),
                Err(e) => SpokenUtterance::failed(&self.session_id, text, e.to_string()),
            };
            log.add(utterance);
        }

        let task: TaskResult = serde_json::from_value(result?).unwrap_or_default();
        debug!(
            "Speak task accepted: {}",
            task.task_id.as_deref().unwrap_or("(no task id)")
        );
        Ok(())
    }
}
