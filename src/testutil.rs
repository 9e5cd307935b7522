//! Scripted drivers for tests
//!
//! The RTSP dialer and the WebRTC muxer are external collaborators; these
//! doubles let tests script their behavior and inspect what the bridge did
//! with them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::media::{CodecInfo, Packet};
use crate::rtsp::{RtspDialer, RtspOptions, RtspSession, RtspSignal};
use crate::webrtc::{Muxer, MuxerError, MuxerFactory, MuxerOptions};

pub(crate) fn video_packet(ms: u64, is_key_frame: bool) -> Packet {
    Packet::video(
        0,
        Duration::from_millis(ms),
        Bytes::from_static(b"frame"),
        is_key_frame,
    )
}

pub(crate) fn audio_packet(ms: u64) -> Packet {
    Packet::audio(0, Duration::from_millis(ms), Bytes::from_static(b"sample"))
}

/// One valid H.264 video track
pub(crate) fn h264_codecs() -> Vec<CodecInfo> {
    vec![CodecInfo::H264 {
        sps: Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F]),
        pps: Bytes::from_static(&[0x68, 0xEF, 0x38]),
    }]
}

/// A single audio track, for audio-only paths
pub(crate) fn audio_codecs() -> Vec<CodecInfo> {
    vec![CodecInfo::PcmMulaw]
}

enum DialOutcome {
    Fail(StreamError),
    Session(RtspSession),
}

/// Test-side handle feeding an accepted session
pub(crate) struct SessionDriver {
    pub signals: mpsc::Sender<RtspSignal>,
    pub packets: mpsc::Sender<Packet>,
}

/// Dialer that hands out pre-scripted sessions in order. With no script
/// queued, `dial` never resolves.
pub(crate) struct ScriptedDialer {
    script: Mutex<VecDeque<DialOutcome>>,
    dials: AtomicUsize,
    last_opts: Mutex<Option<RtspOptions>>,
}

impl ScriptedDialer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            dials: AtomicUsize::new(0),
            last_opts: Mutex::new(None),
        })
    }

    pub(crate) fn push_failure(&self, err: StreamError) {
        self.script.lock().push_back(DialOutcome::Fail(err));
    }

    /// Queue a successful dial; the returned driver feeds the session
    pub(crate) fn push_session(&self, codecs: Option<Vec<CodecInfo>>) -> SessionDriver {
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (packet_tx, packet_rx) = mpsc::channel(256);
        self.script
            .lock()
            .push_back(DialOutcome::Session(RtspSession {
                codecs,
                signals: signal_rx,
                packets: packet_rx,
            }));
        SessionDriver {
            signals: signal_tx,
            packets: packet_tx,
        }
    }

    pub(crate) fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn last_opts(&self) -> Option<RtspOptions> {
        self.last_opts.lock().clone()
    }
}

#[async_trait]
impl RtspDialer for ScriptedDialer {
    async fn dial(&self, opts: RtspOptions) -> Result<RtspSession, StreamError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        *self.last_opts.lock() = Some(opts);
        let outcome = self.script.lock().pop_front();
        match outcome {
            Some(DialOutcome::Fail(err)) => Err(err),
            Some(DialOutcome::Session(session)) => Ok(session),
            None => std::future::pending().await,
        }
    }
}

/// Dialer with one queued session carrying valid H.264 codecs
pub(crate) fn scripted_dialer() -> (Arc<ScriptedDialer>, SessionDriver) {
    let dialer = ScriptedDialer::new();
    let driver = dialer.push_session(Some(h264_codecs()));
    (dialer, driver)
}

/// Dialer whose `dial` never resolves, for tests that never reach the wire
pub(crate) fn pending_dialer() -> Arc<dyn RtspDialer> {
    ScriptedDialer::new()
}

/// Shared observable state of every muxer a [`RecordingMuxerFactory`] makes
#[derive(Default)]
pub(crate) struct MuxerState {
    /// Offers passed to `write_header`, in call order
    pub offers: Mutex<Vec<String>>,
    /// Scripted `write_header` results; empty means `Ok("test-answer")`
    pub header_script: Mutex<VecDeque<Result<String, MuxerError>>>,
    /// Packets accepted by `write_packet`
    pub written: Mutex<Vec<Packet>>,
    /// When set, `write_packet` fails once this many packets were accepted
    pub fail_write_after: Mutex<Option<usize>>,
    pub closed: AtomicUsize,
    pub created: AtomicUsize,
    pub last_opts: Mutex<Option<MuxerOptions>>,
}

impl MuxerState {
    pub(crate) fn written_count(&self) -> usize {
        self.written.lock().len()
    }
}

pub(crate) struct RecordingMuxerFactory {
    pub state: Arc<MuxerState>,
}

impl RecordingMuxerFactory {
    pub(crate) fn new() -> (Arc<Self>, Arc<MuxerState>) {
        let state = Arc::new(MuxerState::default());
        (
            Arc::new(Self {
                state: Arc::clone(&state),
            }),
            state,
        )
    }
}

impl MuxerFactory for RecordingMuxerFactory {
    fn create(&self, opts: MuxerOptions) -> Box<dyn Muxer> {
        self.state.created.fetch_add(1, Ordering::SeqCst);
        *self.state.last_opts.lock() = Some(opts);
        Box::new(RecordingMuxer {
            state: Arc::clone(&self.state),
        })
    }
}

struct RecordingMuxer {
    state: Arc<MuxerState>,
}

#[async_trait]
impl Muxer for RecordingMuxer {
    async fn write_header(
        &mut self,
        _codecs: &[CodecInfo],
        sdp_offer: &str,
    ) -> Result<String, MuxerError> {
        self.state.offers.lock().push(sdp_offer.to_string());
        match self.state.header_script.lock().pop_front() {
            Some(result) => result,
            None => Ok("test-answer".to_string()),
        }
    }

    async fn write_packet(&mut self, pkt: &Packet) -> Result<(), MuxerError> {
        let mut written = self.state.written.lock();
        if let Some(limit) = *self.state.fail_write_after.lock() {
            if written.len() >= limit {
                return Err(MuxerError::new("peer connection closed"));
            }
        }
        written.push(pkt.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}
