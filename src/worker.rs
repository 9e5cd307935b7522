//! Per-source stream worker
//!
//! One worker task exists per running source (the registry's run lock
//! enforces the "one" part). A worker owns the RTSP session, publishes
//! codec discoveries, fans packets out through the registry, and polices
//! two liveness conditions: keyframe silence and, for on-demand sources,
//! viewer presence.
//!
//! The worker is a small state machine:
//!
//! ```text
//! Connecting ──dial ok──► Running ──exit cause──► Reconnecting ──1s──► Connecting
//!     │                                               │
//!     └──── on-demand with no viewers, or NoViewer ───┴──► Draining ──► Exited
//! ```
//!
//! `Exited` always releases the run lock and clears status and codecs, so a
//! later `ensure_started` begins from a clean slate.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::StreamError;
use crate::media::audio_only;
use crate::registry::{Source, StreamRegistry};
use crate::rtsp::{RtspDialer, RtspOptions, RtspSignal};

/// Exit the serve pass when no keyframe (or, audio-only, no packet) arrives
/// within this window
pub const KEYFRAME_TIMEOUT: Duration = Duration::from_secs(20);
/// How often an on-demand worker checks that somebody is still watching
pub const VIEWER_CHECK_INTERVAL: Duration = Duration::from_secs(20);
/// Pause between redial attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Connecting,
    Running,
    Reconnecting,
    Draining,
    Exited,
}

/// Long-lived task serving one source
pub struct StreamWorker {
    registry: Arc<StreamRegistry>,
    dialer: Arc<dyn RtspDialer>,
    id: String,
    url: String,
    on_demand: bool,
    disable_audio: bool,
    debug: bool,
}

impl StreamWorker {
    pub(crate) fn new(
        registry: Arc<StreamRegistry>,
        dialer: Arc<dyn RtspDialer>,
        id: &str,
        source: &Source,
    ) -> Self {
        Self {
            registry,
            dialer,
            id: id.to_string(),
            url: source.url.clone(),
            on_demand: source.on_demand,
            disable_audio: source.disable_audio,
            debug: source.debug,
        }
    }

    /// Reconnect loop. Runs until the source is on-demand and idle, then
    /// releases the run lock.
    pub(crate) async fn run(self) {
        let mut state = WorkerState::Connecting;
        loop {
            tracing::debug!(stream = %self.id, state = ?state, "stream connect attempt");
            let err = self.serve().await;
            tracing::warn!(stream = %self.id, error = %err, "stream worker pass ended");
            self.registry.store_last_error(&self.id, err.clone());

            if err.is_terminal() || (self.on_demand && !self.registry.has_viewer(&self.id)) {
                state = WorkerState::Draining;
                tracing::debug!(stream = %self.id, state = ?state, "no viewers on on-demand stream, giving up");
                break;
            }

            state = WorkerState::Reconnecting;
            tracing::debug!(stream = %self.id, state = ?state, "redialing shortly");
            sleep(RECONNECT_DELAY).await;
            state = WorkerState::Connecting;
        }
        self.registry.release(&self.id);
        state = WorkerState::Exited;
        tracing::debug!(stream = %self.id, state = ?state, "stream worker done");
    }

    /// One dial-and-serve pass; always returns the cause of the exit
    async fn serve(&self) -> StreamError {
        let opts = RtspOptions {
            disable_audio: self.disable_audio,
            debug: self.debug,
            ..RtspOptions::new(self.url.clone())
        };
        let mut session = match self.dialer.dial(opts).await {
            Ok(session) => session,
            Err(err) => return err,
        };

        let mut audio_only_stream = false;
        if let Some(codecs) = session.codecs.take() {
            audio_only_stream = audio_only(&codecs);
            self.registry.set_codecs(&self.id, codecs);
        }
        tracing::debug!(stream = %self.id, state = ?WorkerState::Running, audio_only = audio_only_stream, "rtsp session established");

        let keyframe_deadline = sleep(KEYFRAME_TIMEOUT);
        tokio::pin!(keyframe_deadline);
        let viewer_deadline = sleep(VIEWER_CHECK_INTERVAL);
        tokio::pin!(viewer_deadline);

        loop {
            tokio::select! {
                _ = &mut keyframe_deadline => {
                    return StreamError::NoVideoOnStream;
                }
                _ = &mut viewer_deadline, if self.on_demand => {
                    if !self.registry.has_viewer(&self.id) {
                        return StreamError::NoViewer;
                    }
                    viewer_deadline.as_mut().reset(Instant::now() + VIEWER_CHECK_INTERVAL);
                }
                signal = session.signals.recv() => {
                    match signal {
                        Some(RtspSignal::CodecUpdate(codecs)) => {
                            audio_only_stream = audio_only(&codecs);
                            self.registry.set_codecs(&self.id, codecs);
                        }
                        Some(RtspSignal::RtpStop) | None => {
                            return StreamError::RtspDisconnect;
                        }
                    }
                }
                pkt = session.packets.recv() => {
                    let Some(pkt) = pkt else {
                        return StreamError::RtspDisconnect;
                    };
                    if audio_only_stream || pkt.is_key_frame {
                        keyframe_deadline.as_mut().reset(Instant::now() + KEYFRAME_TIMEOUT);
                    }
                    if self.debug {
                        tracing::trace!(
                            stream = %self.id,
                            idx = pkt.idx,
                            key = pkt.is_key_frame,
                            bytes = pkt.data.len(),
                            "packet"
                        );
                    }
                    self.registry.cast(&self.id, pkt);
                }
            }
        }
    }
}
