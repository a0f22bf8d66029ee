//! Chat widget integration
//!
//! The widget itself runs in the embedding page; this module models its
//! events and turns bot messages into cleaned text for the relay.

pub mod adapter;
pub mod events;
pub mod source;

pub use adapter::{clean_text, MessageListener, WidgetAdapter, WidgetConfig, DEFAULT_WIDGET_URL};
pub use events::{EventDetail, MessagePayload, WidgetEvent, MESSAGE_RECEIVED, SEND_MESSAGE};
pub use source::JsonLinesSource;
