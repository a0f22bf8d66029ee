//! Streaming avatar API wire types

use crate::session::peer::{IceCandidateInit, IceServer, SessionDescription};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Video quality requested for a new session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        };
        f.write_str(name)
    }
}

/// API endpoints, all `POST`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    NewSession,
    StartSession,
    Ice,
    Task,
    StopSession,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::NewSession => "/v1/streaming.new",
            Endpoint::StartSession => "/v1/streaming.start",
            Endpoint::Ice => "/v1/streaming.ice",
            Endpoint::Task => "/v1/streaming.task",
            Endpoint::StopSession => "/v1/streaming.stop",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewSessionRequest {
    pub quality: Quality,
    pub avatar_name: String,
    pub voice: VoiceSettings,
}

impl NewSessionRequest {
    pub fn new(quality: Quality, avatar_id: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            quality,
            avatar_name: avatar_id.into(),
            voice: VoiceSettings {
                voice_id: voice_id.into(),
            },
        }
    }
}

/// Session returned by `streaming.new`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,

    /// Server offer
    pub sdp: SessionDescription,

    #[serde(rename = "ice_servers2", default)]
    pub ice_servers: Vec<IceServer>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StartSessionRequest<'a> {
    pub session_id: &'a str,
    pub sdp: &'a SessionDescription,
}

#[derive(Clone, Debug, Serialize)]
pub struct IceRequest<'a> {
    pub session_id: &'a str,
    pub candidate: &'a IceCandidateInit,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskRequest<'a> {
    pub session_id: &'a str,
    pub text: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct StopSessionRequest<'a> {
    pub session_id: &'a str,
}

/// Response envelope; payloads are under `data`
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

/// Error body returned with 4xx statuses
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}
