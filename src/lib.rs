pub mod heygen;
pub mod integration;
pub mod messages;
pub mod relay;
pub mod session;
pub mod widget;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error on {endpoint}")]
    ServerError { endpoint: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Peer connection error: {0}")]
    PeerError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::DecodeError(e.to_string())
    }
}

impl BridgeError {
    /// Check if this error is recoverable
    ///
    /// Nothing is retried automatically; recoverable errors only mean the
    /// user can try the same action again without restarting.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::ConfigError(_) => false,
            // The vendor may come back; the user can click start again
            BridgeError::ServerError { .. } => true,
            BridgeError::BadRequest(_) => false,
            BridgeError::ApiError { status, .. } => *status == 429,
            BridgeError::TransportError(_) => true,
            BridgeError::DecodeError(_) => false,
            BridgeError::PeerError(_) => true,
            BridgeError::SessionError(_) => true,
            BridgeError::ChannelError(_) => false,
            BridgeError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            BridgeError::ServerError { .. } => {
                "The avatar service reported a server error. Please try again.".to_string()
            }
            // The vendor's own message is what the error display shows
            BridgeError::BadRequest(message) => message.clone(),
            BridgeError::ApiError { .. } => {
                "The avatar service rejected the request.".to_string()
            }
            BridgeError::TransportError(_) => {
                "Could not reach the avatar service. Please check your connection.".to_string()
            }
            BridgeError::DecodeError(_) => {
                "Received an unexpected response.".to_string()
            }
            BridgeError::PeerError(_) => {
                "Media connection failed. Please close and start again.".to_string()
            }
            BridgeError::SessionError(_) => {
                "Avatar session error. Please close and start again.".to_string()
            }
            BridgeError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            BridgeError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
