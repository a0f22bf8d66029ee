//! Widget adapter: filters widget events and feeds their text to listeners

use crate::widget::events::WidgetEvent;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Default location of the widget script
pub const DEFAULT_WIDGET_URL: &str = "https://stable.loyjoy.com/widget.js";

/// Characters the widget uses for markdown emphasis and headings
const MARKUP_CHARS: [char; 2] = ['#', '*'];

/// Receiver of cleaned message text
pub trait MessageListener: Send + Sync {
    fn on_message(&self, text: &str);
}

/// Configuration for the chat widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// URL of the widget script
    pub script_url: String,

    /// Widget process (chat flow) to boot
    pub process_id: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            script_url: DEFAULT_WIDGET_URL.to_string(),
            process_id: String::new(),
        }
    }
}

impl WidgetConfig {
    /// Create a widget config for a process
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            ..Default::default()
        }
    }

    /// Set the script URL
    pub fn with_script_url(mut self, script_url: impl Into<String>) -> Self {
        self.script_url = script_url.into();
        self
    }

    /// Options passed to the widget's `boot` call by the embedding page
    pub fn boot_options(&self) -> serde_json::Value {
        serde_json::json!({ "process": self.process_id })
    }
}

/// Strip markup characters the avatar would otherwise read out
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|c| !MARKUP_CHARS.contains(c)).collect()
}

/// Dispatches recognized widget events to subscribed listeners
pub struct WidgetAdapter {
    config: WidgetConfig,
    listeners: Vec<Arc<dyn MessageListener>>,
}

impl WidgetAdapter {
    /// Create an adapter without listeners
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
        }
    }

    /// Register a listener for cleaned message text
    pub fn subscribe(&mut self, listener: Arc<dyn MessageListener>) {
        self.listeners.push(listener);
    }

    /// Builder form of [`WidgetAdapter::subscribe`]
    pub fn with_listener(mut self, listener: Arc<dyn MessageListener>) -> Self {
        self.subscribe(listener);
        self
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Get the widget configuration
    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Handle one widget event
    ///
    /// Returns true if the event carried text and was dispatched.
    pub fn handle_event(&self, event: &WidgetEvent) -> bool {
        let Some(text) = event.message_text() else {
            trace!("Ignoring widget event {}", event.kind);
            return false;
        };

        // Cleaning may leave an empty string; it is still forwarded
        let cleaned = clean_text(text);
        debug!("Widget message ({} chars) -> {} listeners", cleaned.len(), self.listeners.len());

        for listener in &self.listeners {
            listener.on_message(&cleaned);
        }

        true
    }

    /// Parse a JSON-encoded widget event and handle it
    pub fn handle_json(&self, json: &str) -> Result<bool> {
        let event: WidgetEvent = serde_json::from_str(json)?;
        Ok(self.handle_event(&event))
    }
}
