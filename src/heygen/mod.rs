//! Streaming avatar vendor API

pub mod client;
pub mod types;

pub use client::{ApiConfig, AvatarApi, HeyGenClient, TaskResult, DEFAULT_API_URL};
pub use types::{Endpoint, NewSessionRequest, Quality, SessionInfo};
