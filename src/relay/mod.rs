//! Text relay between the chat widget and the avatar
//!
//! This module provides:
//! - Debounced aggregation of chat fragments into speech requests
//! - The cancellable flush timer behind the quiet period

pub mod aggregator;
pub mod timer;

pub use aggregator::{
    join_fragments, AggregatorConfig, AggregatorState, SpeechSink, TextAggregator,
    DEFAULT_QUIET_PERIOD_MS,
};
pub use timer::FlushTimer;
