//! Streaming avatar session: bootstrap, peer capability and speech sink

pub mod bootstrap;
pub mod peer;
pub mod speaker;

pub use bootstrap::{AvatarConfig, AvatarSession, MediaConfig, SessionState};
pub use peer::{
    IceCandidateInit, IceServer, IceUrls, PeerConnection, PeerFactory, SdpType, SessionDescription,
};
pub use speaker::SessionSpeaker;
