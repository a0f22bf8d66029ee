//! Peer connection capability used by the session bootstrap
//!
//! The media stack (ICE agent, DTLS, RTP, rendering of the avatar's audio and
//! video tracks) lives outside this crate. The bootstrap only drives the
//! offer/answer exchange and forwards local ICE candidates, so it needs no
//! more than the operations below.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// SDP message type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description as exchanged with the vendor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Serialized local ICE candidate (browser `RTCIceCandidateInit` shape)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, sdp_mid: impl Into<String>, sdp_m_line_index: u16) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self.sdp_m_line_index = Some(sdp_m_line_index);
        self
    }
}

/// `urls` may be a single URL or a list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

impl IceUrls {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            IceUrls::One(url) => vec![url.clone()],
            IceUrls::Many(urls) => urls.clone(),
        }
    }
}

/// STUN/TURN server handed out with a new session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// A WebRTC peer connection driven by the bootstrap
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Apply the server's offer
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Create the local answer for the applied offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply the local answer; starts ICE gathering
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Receiver of locally gathered candidates
    ///
    /// Returns `None` once taken. The channel closes when gathering ends.
    fn take_local_candidates(&self) -> Option<UnboundedReceiver<IceCandidateInit>>;

    /// Target playout delay for all receivers
    fn set_jitter_buffer_target(&self, target: Duration);

    async fn close(&self) -> Result<()>;
}

/// Creates peer connections configured with the session's ICE servers
pub trait PeerFactory: Send + Sync {
    fn create(&self, ice_servers: &[IceServer]) -> Result<Arc<dyn PeerConnection>>;
}
