//! Media types shared across the bridge
//!
//! This module provides:
//! - Codec descriptors with H.264 readiness checks
//! - The demuxed packet value passed through viewer queues

pub mod codec;
pub mod packet;

pub use codec::{audio_only, codecs_ready, CodecInfo};
pub use packet::Packet;
