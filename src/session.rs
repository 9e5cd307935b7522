//! Per-viewer session orchestration
//!
//! One negotiation turns an SDP offer into an SDP answer plus a background
//! pump task that moves packets from the viewer queue into the WebRTC muxer.
//! The pump gates on the first keyframe (WebRTC decoders must start at an
//! IDR), times out when video stops arriving, and releases its viewer queue
//! through the handle's drop guard no matter how it exits.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::time::{sleep, Instant};

use crate::error::{Error, Result};
use crate::media::audio_only;
use crate::registry::StreamRegistry;
use crate::webrtc::{Muxer, MuxerFactory, MuxerOptions};

/// End the session when no keyframe (or, audio-only, no packet) arrives
/// within this window
pub const NO_VIDEO_TIMEOUT: Duration = Duration::from_secs(10);

/// Negotiate a viewer session on `id`.
///
/// Ensures the stream is running, waits for usable codecs, and exchanges the
/// SDP offer for an answer. Offers that reach the muxer un-encoded are
/// retried once in base64. On success the packet pump is already running in
/// the background.
pub async fn negotiate(
    registry: &Arc<StreamRegistry>,
    muxers: &Arc<dyn MuxerFactory>,
    opts: MuxerOptions,
    id: &str,
    sdp_offer: &str,
) -> Result<String> {
    if !registry.exists(id) {
        return Err(Error::SourceNotFound(id.to_string()));
    }
    registry.ensure_started(id);
    let codecs = registry
        .wait_for_codecs(id)
        .await
        .ok_or_else(|| Error::CodecNotReady(id.to_string()))?;
    let audio_only_stream = audio_only(&codecs);

    let mut muxer = muxers.create(opts);
    let answer = match muxer.write_header(&codecs, sdp_offer).await {
        Ok(answer) => answer,
        Err(err) if err.is_raw_sdp() => {
            tracing::debug!(stream = %id, "offer was not base64, retrying wrapped");
            let wrapped = BASE64.encode(sdp_offer);
            match muxer.write_header(&codecs, &wrapped).await {
                Ok(answer) => answer,
                Err(err) => {
                    muxer.close().await;
                    return Err(err.into());
                }
            }
        }
        Err(err) => {
            muxer.close().await;
            return Err(err.into());
        }
    };

    let registry = Arc::clone(registry);
    let id = id.to_string();
    tokio::spawn(async move {
        pump(registry, id, muxer, audio_only_stream).await;
    });

    Ok(answer)
}

/// Move packets from the viewer queue into the muxer until video goes idle,
/// the muxer rejects a write, or the stream disappears.
async fn pump(
    registry: Arc<StreamRegistry>,
    id: String,
    mut muxer: Box<dyn Muxer>,
    audio_only_stream: bool,
) {
    let Some(mut viewer) = registry.attach_viewer(&id) else {
        tracing::debug!(stream = %id, "stream gone before viewer could attach");
        muxer.close().await;
        return;
    };
    tracing::info!(stream = %id, viewer = %viewer.viewer_id(), "viewer session started");

    let no_video = sleep(NO_VIDEO_TIMEOUT);
    tokio::pin!(no_video);
    let mut started = false;
    // Set once the stream entry is deleted; the timer then runs the session
    // out instead of ending it abruptly.
    let mut queue_closed = false;

    loop {
        tokio::select! {
            _ = &mut no_video => {
                tracing::debug!(stream = %id, viewer = %viewer.viewer_id(), "no video within window, ending session");
                break;
            }
            pkt = viewer.recv(), if !queue_closed => {
                let Some(pkt) = pkt else {
                    queue_closed = true;
                    continue;
                };
                if pkt.is_key_frame || audio_only_stream {
                    no_video.as_mut().reset(Instant::now() + NO_VIDEO_TIMEOUT);
                    started = true;
                }
                if !started && !audio_only_stream {
                    // Mid-GOP video is useless to the peer before an IDR.
                    continue;
                }
                if let Err(err) = muxer.write_packet(&pkt).await {
                    tracing::debug!(stream = %id, viewer = %viewer.viewer_id(), error = %err, "muxer write failed, ending session");
                    break;
                }
            }
        }
    }

    muxer.close().await;
    tracing::info!(stream = %id, viewer = %viewer.viewer_id(), "viewer session ended");
    // The viewer handle detaches its queue on drop.
}
