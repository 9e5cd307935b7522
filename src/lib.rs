//! RTSP to WebRTC bridge
//!
//! Pulls RTP from RTSP cameras and fans every packet out to browser viewers
//! over WebRTC. One worker task per registered source keeps the RTSP session
//! alive (reconnecting as needed) and publishes discovered codecs; viewers
//! negotiate over HTTP with an SDP exchange and then receive packets through
//! a bounded per-viewer queue that drops instead of blocking the source.
//!
//! # Architecture
//!
//! ```text
//! HTTP adapter ──ensure_started / wait_for_codecs──► StreamRegistry
//!      │                                                  ▲  │
//!      │ negotiate()                        cast/codecs   │  │ viewer queues
//!      ▼                                                  │  ▼
//! session pump ◄──packets── viewer queue      StreamWorker ──► RTSP driver
//!      │                                           (one per running source)
//!      └──► WebRTC muxer
//! ```
//!
//! The RTSP client and the WebRTC muxer are external drivers behind the
//! [`rtsp::RtspDialer`] and [`webrtc::MuxerFactory`] traits; the bridge
//! supplies everything in between.

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod registry;
pub mod rtsp;
pub mod session;
pub mod webrtc;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use app::Bridge;
pub use config::{AppConfig, Args, ConfigStore, ServerSettings};
pub use error::{Error, Result, StreamError};
pub use media::{CodecInfo, Packet};
pub use registry::{Source, StreamRegistry, ViewerHandle};
pub use rtsp::{RtspDialer, RtspOptions, RtspSession, RtspSignal};
pub use webrtc::{Muxer, MuxerError, MuxerFactory, MuxerOptions};
