//! WebRTC muxer interface
//!
//! The muxer is the external writer that turns an SDP offer plus codec
//! metadata into an SDP answer and then accepts media packets for the peer.
//! The bridge constructs one muxer per viewer session from the configured
//! ICE servers and UDP port range.

use async_trait::async_trait;
use thiserror::Error;

use crate::media::{CodecInfo, Packet};

/// Marker the driver emits when `write_header` was handed a raw (non-base64)
/// SDP offer. The orchestrator retries once with the offer base64-wrapped.
pub const RAW_SDP_MARKER: &str = "illegal base64 data at input byte 1";

/// Failure from the muxer driver
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MuxerError(pub String);

impl MuxerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Whether the failure means the offer was not base64-encoded
    pub fn is_raw_sdp(&self) -> bool {
        self.0.contains(RAW_SDP_MARKER)
    }
}

/// ICE and transport configuration for a muxer
#[derive(Debug, Clone, Default)]
pub struct MuxerOptions {
    pub ice_servers: Vec<String>,
    pub ice_username: String,
    pub ice_credential: String,
    /// Low end of the UDP port range, 0 for unrestricted
    pub port_min: u16,
    /// High end of the UDP port range, 0 for unrestricted
    pub port_max: u16,
}

/// One WebRTC peer connection in muxer form
#[async_trait]
pub trait Muxer: Send + 'static {
    /// Negotiate: consume the codec list and the client's SDP offer, return
    /// the SDP answer
    async fn write_header(
        &mut self,
        codecs: &[CodecInfo],
        sdp_offer: &str,
    ) -> Result<String, MuxerError>;

    /// Forward one media packet to the peer
    async fn write_packet(&mut self, pkt: &Packet) -> Result<(), MuxerError>;

    /// Tear the peer connection down
    async fn close(&mut self);
}

/// Creates muxers. One factory is shared by all viewer sessions.
pub trait MuxerFactory: Send + Sync + 'static {
    fn create(&self, opts: MuxerOptions) -> Box<dyn Muxer>;
}
