//! Codec descriptors published by RTSP sessions
//!
//! A stream's codec list is the track metadata parsed from the source's SDP.
//! Viewers cannot be offered a WebRTC answer until the list is known, and an
//! H.264 track is only usable once both parameter sets are present.

use bytes::Bytes;

/// Track metadata for a single elementary stream.
///
/// The variants the bridge can hand to a WebRTC peer are H.264, PCM A-law,
/// PCM u-law and Opus; anything else is carried through the registry but
/// omitted from capability listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecInfo {
    /// H.264 video with its parameter sets
    H264 {
        /// Sequence Parameter Set
        sps: Bytes,
        /// Picture Parameter Set
        pps: Bytes,
    },
    /// PCM A-law audio
    PcmAlaw,
    /// PCM u-law audio
    PcmMulaw,
    /// Opus audio
    Opus,
    /// AAC audio
    Aac,
    /// Any other track type, by name
    Other(String),
}

impl CodecInfo {
    /// Whether this track carries video
    pub fn is_video(&self) -> bool {
        matches!(self, CodecInfo::H264 { .. })
    }

    /// Whether this track carries audio
    pub fn is_audio(&self) -> bool {
        !self.is_video()
    }

    /// Whether WebRTC peers can consume this track
    pub fn is_webrtc_supported(&self) -> bool {
        matches!(
            self,
            CodecInfo::H264 { .. } | CodecInfo::PcmAlaw | CodecInfo::PcmMulaw | CodecInfo::Opus
        )
    }

    /// H.264 decoders need both SPS and PPS; a descriptor missing either is
    /// treated as "not ready yet" by the codec gate. Non-H.264 tracks are
    /// always ready.
    pub fn is_ready(&self) -> bool {
        match self {
            CodecInfo::H264 { sps, pps } => !sps.is_empty() && !pps.is_empty(),
            _ => true,
        }
    }
}

/// True when every H.264 entry in the list has usable parameter sets
pub fn codecs_ready(codecs: &[CodecInfo]) -> bool {
    codecs.iter().all(CodecInfo::is_ready)
}

/// True when the stream is audio-only: a single track, and it is audio
pub fn audio_only(codecs: &[CodecInfo]) -> bool {
    codecs.len() == 1 && codecs[0].is_audio()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h264(sps: &'static [u8], pps: &'static [u8]) -> CodecInfo {
        CodecInfo::H264 {
            sps: Bytes::from_static(sps),
            pps: Bytes::from_static(pps),
        }
    }

    #[test]
    fn test_h264_readiness() {
        assert!(h264(&[0x67, 0x64], &[0x68, 0xEF]).is_ready());
        assert!(!h264(&[], &[0x68]).is_ready());
        assert!(!h264(&[0x67], &[]).is_ready());
    }

    #[test]
    fn test_codecs_ready() {
        let good = vec![h264(&[0x67], &[0x68]), CodecInfo::PcmAlaw];
        assert!(codecs_ready(&good));

        let bad = vec![h264(&[0x67], &[0x68]), h264(&[], &[])];
        assert!(!codecs_ready(&bad));

        // audio-only lists have nothing to gate on
        assert!(codecs_ready(&[CodecInfo::Opus]));
        assert!(codecs_ready(&[]));
    }

    #[test]
    fn test_webrtc_support() {
        assert!(h264(&[0x67], &[0x68]).is_webrtc_supported());
        assert!(CodecInfo::PcmAlaw.is_webrtc_supported());
        assert!(CodecInfo::PcmMulaw.is_webrtc_supported());
        assert!(CodecInfo::Opus.is_webrtc_supported());
        assert!(!CodecInfo::Aac.is_webrtc_supported());
        assert!(!CodecInfo::Other("MJPEG".into()).is_webrtc_supported());
    }

    #[test]
    fn test_audio_only() {
        assert!(audio_only(&[CodecInfo::PcmMulaw]));
        assert!(!audio_only(&[h264(&[0x67], &[0x68])]));
        assert!(!audio_only(&[h264(&[0x67], &[0x68]), CodecInfo::Opus]));
        assert!(!audio_only(&[]));
    }
}
