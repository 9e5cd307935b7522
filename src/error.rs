//! Crate-wide error types

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by registry and session operations
#[derive(Debug, Error)]
pub enum Error {
    /// Stream id is not registered
    #[error("stream {0} not found")]
    SourceNotFound(String),

    /// A stream with this id is already registered
    #[error("stream {0} already exists")]
    SourceExists(String),

    /// The codec gate timed out before the stream published usable codecs
    #[error("codecs not ready for stream {0}")]
    CodecNotReady(String),

    /// The WebRTC muxer rejected the negotiation
    #[error("muxer: {0}")]
    Muxer(#[from] crate::webrtc::MuxerError),

    /// Configuration could not be read or parsed
    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Exit causes of a stream worker's serve pass.
///
/// Everything except `NoViewer` is retriable: the reconnect loop logs the
/// error, stores it as the stream's `last_error` and redials after 1s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No keyframe arrived within the keyframe window
    #[error("stream exit no video on stream")]
    NoVideoOnStream,

    /// The RTSP peer stopped sending RTP
    #[error("stream exit rtsp disconnect")]
    RtspDisconnect,

    /// On-demand stream with no attached viewers
    #[error("stream exit on demand no viewer")]
    NoViewer,

    /// Transport-level failure from the RTSP driver (dial or session)
    #[error("rtsp: {0}")]
    Rtsp(String),
}

impl StreamError {
    /// True when the worker should give up instead of redialing
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::NoViewer)
    }
}
