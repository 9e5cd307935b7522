//! Demuxed media packets
//!
//! Packets cross two queue boundaries: RTSP driver -> worker, and worker ->
//! viewer. `Bytes` keeps the payload reference-counted, so fan-out to N
//! viewers clones a handle, not the media data.

use std::time::Duration;

use bytes::Bytes;

/// A single demuxed media packet as delivered by the RTSP driver
#[derive(Debug, Clone)]
pub struct Packet {
    /// Track index into the stream's codec list
    pub idx: usize,
    /// Whether this is a self-contained video frame (IDR)
    pub is_key_frame: bool,
    /// Media timestamp relative to stream start
    pub time: Duration,
    /// Payload
    pub data: Bytes,
}

impl Packet {
    /// Video packet on the given track
    pub fn video(idx: usize, time: Duration, data: Bytes, is_key_frame: bool) -> Self {
        Self {
            idx,
            is_key_frame,
            time,
            data,
        }
    }

    /// Audio packet on the given track
    pub fn audio(idx: usize, time: Duration, data: Bytes) -> Self {
        Self {
            idx,
            is_key_frame: false,
            time,
            data,
        }
    }
}
