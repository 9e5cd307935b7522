//! RTSP driver interface
//!
//! The bridge does not speak RTSP itself; it drives an external client
//! through this interface. A driver dials the camera, demuxes RTP, and feeds
//! the session handle's channels:
//!
//! ```text
//!   driver I/O task ──codecs──► RtspSession.codecs   (known at dial time, or later)
//!                  ──signals─► RtspSession.signals  (codec updates, RTP stop)
//!                  ──packets─► RtspSession.packets  (demuxed media)
//! ```
//!
//! Dropping the session handle closes both receivers; the driver observes the
//! closed channels and tears the network session down. That is the only close
//! protocol; there is no separate shutdown call.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::media::{CodecInfo, Packet};

/// Connect timeout handed to drivers
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);
/// Read/write timeout handed to drivers
pub const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for a single dial attempt
#[derive(Debug, Clone)]
pub struct RtspOptions {
    /// `rtsp://` URL of the source
    pub url: String,
    /// Skip audio track setup
    pub disable_audio: bool,
    /// Verbose driver logging
    pub debug: bool,
    /// TCP connect timeout
    pub dial_timeout: Duration,
    /// Socket read/write timeout
    pub io_timeout: Duration,
}

impl RtspOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            disable_audio: false,
            debug: false,
            dial_timeout: DIAL_TIMEOUT,
            io_timeout: IO_TIMEOUT,
        }
    }
}

/// Out-of-band events from the driver's control plane
#[derive(Debug, Clone)]
pub enum RtspSignal {
    /// The source's codec list changed; the new list replaces the old one
    CodecUpdate(Vec<CodecInfo>),
    /// The peer stopped sending RTP
    RtpStop,
}

/// Handle to one established RTSP session
#[derive(Debug)]
pub struct RtspSession {
    /// Codec list parsed from the SDP, when the driver knows it at dial time
    pub codecs: Option<Vec<CodecInfo>>,
    /// Control-plane events
    pub signals: mpsc::Receiver<RtspSignal>,
    /// Demuxed media packets
    pub packets: mpsc::Receiver<Packet>,
}

/// Dials RTSP sources. Implemented by the embedder's client library binding;
/// tests and the demo use synthetic drivers.
#[async_trait]
pub trait RtspDialer: Send + Sync + 'static {
    async fn dial(&self, opts: RtspOptions) -> Result<RtspSession, StreamError>;
}
