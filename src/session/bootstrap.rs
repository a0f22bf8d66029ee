//! Avatar session bootstrap
//!
//! Opening a session asks the vendor for a new session, which comes back with
//! a server offer and ICE servers. Starting it answers the offer locally,
//! forwards local ICE candidates as they are gathered, and hands the answer
//! to the vendor. Media then flows over the peer connection.

use crate::heygen::{AvatarApi, NewSessionRequest, Quality};
use crate::session::peer::{IceCandidateInit, PeerConnection, PeerFactory};
use crate::session::speaker::SessionSpeaker;
use crate::{BridgeError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which avatar and voice to stream
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub avatar_id: String,
    pub voice_id: String,
    pub quality: Quality,
}

impl AvatarConfig {
    pub fn new(avatar_id: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            voice_id: voice_id.into(),
            quality: Quality::default(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    fn request(&self) -> NewSessionRequest {
        NewSessionRequest::new(self.quality, &self.avatar_id, &self.voice_id)
    }
}

/// Media settings applied once the session has started
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Receiver jitter buffer target in milliseconds
    pub jitter_buffer_target_ms: u64,

    /// Speak into this already-established session instead of opening one
    pub attach_session_id: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            jitter_buffer_target_ms: 500,
            attach_session_id: None,
        }
    }
}

impl MediaConfig {
    pub fn jitter_buffer_target(&self) -> Duration {
        Duration::from_millis(self.jitter_buffer_target_ms)
    }

    pub fn with_attach_session(mut self, session_id: impl Into<String>) -> Self {
        self.attach_session_id = Some(session_id.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Remote offer applied, waiting for `start`
    Negotiating,
    Started,
    Closed,
}

/// One streaming avatar session
pub struct AvatarSession {
    api: Arc<dyn AvatarApi>,
    peer: Option<Arc<dyn PeerConnection>>,
    session_id: String,
    media: MediaConfig,
    state: Mutex<SessionState>,
    ice_forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl AvatarSession {
    /// Create a vendor session and apply its offer to a new peer connection
    pub async fn open(
        api: Arc<dyn AvatarApi>,
        peers: &dyn PeerFactory,
        avatar: &AvatarConfig,
        media: MediaConfig,
    ) -> Result<Self> {
        let session = api.new_session(&avatar.request()).await?;
        info!(
            "Session {} created ({} ICE servers)",
            session.session_id,
            session.ice_servers.len()
        );

        let negotiated = async {
            let peer = peers.create(&session.ice_servers)?;
            peer.set_remote_description(session.sdp.clone()).await?;
            Ok::<_, BridgeError>(peer)
        }
        .await;

        let peer = match negotiated {
            Ok(peer) => peer,
            Err(e) => {
                // The vendor session exists already; don't leave it running
                if let Err(stop_err) = api.stop_session(&session.session_id).await {
                    warn!("Failed to stop session {}: {}", session.session_id, stop_err);
                }
                return Err(e);
            }
        };

        Ok(Self {
            api,
            peer: Some(peer),
            session_id: session.session_id,
            media,
            state: Mutex::new(SessionState::Negotiating),
            ice_forwarder: Mutex::new(None),
        })
    }

    /// Wrap a session whose media was negotiated elsewhere
    pub fn attach(api: Arc<dyn AvatarApi>, session_id: impl Into<String>, media: MediaConfig) -> Self {
        let session_id = session_id.into();
        info!("Attached to session {}", session_id);

        Self {
            api,
            peer: None,
            session_id,
            media,
            state: Mutex::new(SessionState::Started),
            ice_forwarder: Mutex::new(None),
        }
    }

    /// Answer the offer, forward local candidates and start streaming
    pub async fn start(&self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Negotiating {
            return Err(BridgeError::SessionError(format!(
                "Session {} cannot start while {:?}",
                self.session_id, state
            )));
        }

        let peer = self.peer.as_ref().ok_or_else(|| {
            BridgeError::SessionError(format!("Session {} has no peer connection", self.session_id))
        })?;

        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;

        if let Some(candidates) = peer.take_local_candidates() {
            self.spawn_ice_forwarder(candidates);
        }

        self.api.start_session(&self.session_id, &answer).await?;

        peer.set_jitter_buffer_target(self.media.jitter_buffer_target());
        *self.state.lock() = SessionState::Started;

        info!("Session {} started", self.session_id);
        Ok(())
    }

    fn spawn_ice_forwarder(&self, mut candidates: UnboundedReceiver<IceCandidateInit>) {
        let api = Arc::clone(&self.api);
        let session_id = self.session_id.clone();

        let handle = tokio::spawn(async move {
            let mut sent = 0usize;
            while let Some(candidate) = candidates.recv().await {
                match api.send_ice_candidate(&session_id, &candidate).await {
                    Ok(_) => sent += 1,
                    Err(e) => warn!("Failed to send ICE candidate for {}: {}", session_id, e),
                }
            }
            debug!("ICE gathering done for {} ({} candidates sent)", session_id, sent);
        });

        if let Some(previous) = self.ice_forwarder.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Have the avatar speak `text`
    pub async fn speak(&self, text: &str) -> Result<Value> {
        if self.state() == SessionState::Closed {
            return Err(BridgeError::SessionError(format!(
                "Session {} is closed",
                self.session_id
            )));
        }
        self.api.speak(&self.session_id, text).await
    }

    /// Close the peer connection and stop the vendor session
    ///
    /// Closing an already closed session does nothing.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                debug!("Session {} already closed", self.session_id);
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        if let Some(forwarder) = self.ice_forwarder.lock().take() {
            forwarder.abort();
        }

        if let Some(peer) = &self.peer {
            if let Err(e) = peer.close().await {
                warn!("Failed to close peer connection: {}", e);
            }
        }

        let response = self.api.stop_session(&self.session_id).await?;
        info!("Session {} stopped: {}", self.session_id, response);
        Ok(())
    }

    /// Speech sink bound to this session
    pub fn speaker(&self) -> SessionSpeaker {
        SessionSpeaker::new(Arc::clone(&self.api), self.session_id.clone())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether media was negotiated by this session
    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }
}
