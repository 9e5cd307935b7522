//! Per-viewer queues and the packet fan-out bus
//!
//! One producer (the stream worker) feeds N bounded viewer queues. A slow or
//! stalled viewer must never apply backpressure to the RTSP read loop or to
//! other viewers, so `publish` try-sends and drops on a full queue; a late
//! viewer resynchronizes at the next keyframe.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::media::Packet;
use crate::registry::store::StreamRegistry;

/// Bounded capacity of each viewer queue, in packets
pub const VIEWER_QUEUE_CAPACITY: usize = 100;

/// Sender side of one viewer queue
struct Viewer {
    tx: mpsc::Sender<Packet>,
    /// Packets dropped because the queue was full
    dropped: u64,
}

/// Fan-out bus embedded in a stream's runtime state.
///
/// All mutation happens under the registry lock; the queue handles themselves
/// are thread-safe and used lock-free by sessions.
#[derive(Default)]
pub(crate) struct PacketBus {
    viewers: HashMap<String, Viewer>,
}

impl PacketBus {
    /// Enqueue `pkt` for every viewer with space left; drop for the rest.
    /// Never blocks.
    pub(crate) fn publish(&mut self, stream_id: &str, pkt: Packet) {
        for (viewer_id, viewer) in &mut self.viewers {
            match viewer.tx.try_send(pkt.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    viewer.dropped += 1;
                    tracing::debug!(
                        stream = %stream_id,
                        viewer = %viewer_id,
                        dropped = viewer.dropped,
                        "viewer queue full, dropping packet"
                    );
                }
                // Receiver gone but not yet detached; the detach follows.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Allocate a queue under a fresh random viewer id
    pub(crate) fn subscribe(&mut self) -> (String, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(VIEWER_QUEUE_CAPACITY);
        let viewer_id = viewer_id();
        self.viewers.insert(viewer_id.clone(), Viewer { tx, dropped: 0 });
        (viewer_id, rx)
    }

    /// Remove a queue; in-flight packets are discarded with it
    pub(crate) fn unsubscribe(&mut self, viewer_id: &str) -> bool {
        self.viewers.remove(viewer_id).is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.viewers.len()
    }
}

/// 128-bit random viewer id, uppercase hex in 8-4-4-4-12 groups
fn viewer_id() -> String {
    let b: [u8; 16] = rand::random();
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
    )
}

/// A viewer's end of its packet queue.
///
/// Sessions hold only this handle; the registry owns the queue. Dropping the
/// handle detaches the viewer, so a panicking session cannot leak its queue.
pub struct ViewerHandle {
    stream_id: String,
    viewer_id: String,
    rx: mpsc::Receiver<Packet>,
    registry: Arc<StreamRegistry>,
}

impl ViewerHandle {
    pub(crate) fn new(
        stream_id: String,
        viewer_id: String,
        rx: mpsc::Receiver<Packet>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            stream_id,
            viewer_id,
            rx,
            registry,
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Next packet, or `None` once the stream entry (and with it the sender)
    /// is gone
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.registry.detach_viewer(&self.stream_id, &self.viewer_id);
    }
}
