//! Stream registry implementation
//!
//! The central registry that owns every registered source, its runtime state
//! and its viewer queues, and that spawns stream workers on demand.
//!
//! Locking discipline: one `RwLock` guards the whole map. It is held for
//! single map/field updates only, never across I/O or an await point. The
//! codec gate waits on a per-source `watch` channel instead of polling, so
//! `wait_for_codecs` suspends without touching the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Error, Result, StreamError};
use crate::media::{codecs_ready, CodecInfo, Packet};
use crate::registry::source::Source;
use crate::registry::viewer::{PacketBus, ViewerHandle};
use crate::rtsp::RtspDialer;
use crate::worker::StreamWorker;

/// Total time the codec gate will hold a caller
pub const CODEC_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the gate logs that it is still waiting
const CODEC_WAIT_PROGRESS: Duration = Duration::from_secs(2);

/// Runtime state attached to a source while the process runs
struct StreamRuntime {
    /// True while a worker task exists for this source
    run_lock: bool,
    /// True once any packet or codec info has been observed
    status: bool,
    /// Last published codec list, replaced atomically as a whole
    codecs: Option<Vec<CodecInfo>>,
    /// Viewer queues
    bus: PacketBus,
    /// Error from the most recent worker exit
    last_error: Option<StreamError>,
    /// Bumped on every codec publication; the gate subscribes to it
    codec_gate: watch::Sender<u64>,
}

impl StreamRuntime {
    fn new() -> Self {
        Self {
            run_lock: false,
            status: false,
            codecs: None,
            bus: PacketBus::default(),
            last_error: None,
            codec_gate: watch::channel(0).0,
        }
    }
}

struct StreamEntry {
    source: Source,
    runtime: StreamRuntime,
}

/// Process-wide registry of RTSP sources.
///
/// Created once at boot and shared by reference with the HTTP adapter and
/// every worker; there is no global instance.
pub struct StreamRegistry {
    dialer: Arc<dyn RtspDialer>,
    streams: RwLock<HashMap<String, StreamEntry>>,
}

impl StreamRegistry {
    pub fn new(dialer: Arc<dyn RtspDialer>) -> Self {
        Self {
            dialer,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the registry from persisted sources (runtime fields start clean)
    pub fn with_sources(dialer: Arc<dyn RtspDialer>, sources: BTreeMap<String, Source>) -> Self {
        let registry = Self::new(dialer);
        {
            let mut streams = registry.streams.write();
            for (id, mut source) in sources {
                if source.name.is_empty() {
                    source.name = id.clone();
                }
                source.status = false;
                streams.insert(
                    id,
                    StreamEntry {
                        source,
                        runtime: StreamRuntime::new(),
                    },
                );
            }
        }
        registry
    }

    /// Membership check
    pub fn exists(&self, id: &str) -> bool {
        self.streams.read().contains_key(id)
    }

    /// Register a new source under `id`
    pub fn add(&self, id: &str, mut source: Source) -> Result<()> {
        let mut streams = self.streams.write();
        if streams.contains_key(id) {
            return Err(Error::SourceExists(id.to_string()));
        }
        if source.name.is_empty() {
            source.name = id.to_string();
        }
        source.status = false;
        streams.insert(
            id.to_string(),
            StreamEntry {
                source,
                runtime: StreamRuntime::new(),
            },
        );
        tracing::info!(stream = %id, "source added");
        Ok(())
    }

    /// Replace the source under `id`, re-keying to the new URL when it
    /// changed. Runtime state (worker, codecs, viewers) carries over; a
    /// running worker is not stopped. Returns the id the source now lives
    /// under.
    pub fn update(&self, id: &str, mut source: Source) -> Result<String> {
        let mut streams = self.streams.write();
        let Some(mut entry) = streams.remove(id) else {
            return Err(Error::SourceNotFound(id.to_string()));
        };
        let new_id = if source.url != id && !source.url.is_empty() {
            if streams.contains_key(&source.url) {
                streams.insert(id.to_string(), entry);
                return Err(Error::SourceExists(source.url));
            }
            source.url.clone()
        } else {
            id.to_string()
        };
        if source.name.is_empty() {
            source.name = new_id.clone();
        }
        source.status = entry.runtime.status;
        entry.source = source;
        streams.insert(new_id.clone(), entry);
        tracing::info!(stream = %id, new_id = %new_id, "source updated");
        Ok(new_id)
    }

    /// Remove the source. The id becomes invisible to new viewers at once;
    /// a running worker and attached sessions run to their own timeouts.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut streams = self.streams.write();
        if streams.remove(id).is_none() {
            return Err(Error::SourceNotFound(id.to_string()));
        }
        tracing::info!(stream = %id, "source deleted");
        Ok(())
    }

    /// Source descriptor with live status, for listings
    pub fn source(&self, id: &str) -> Option<Source> {
        let streams = self.streams.read();
        streams.get(id).map(|entry| {
            let mut source = entry.source.clone();
            source.status = entry.runtime.status;
            source
        })
    }

    /// All sources with live status, keyed by id. Sorted for stable
    /// serialization; this is also the persisted shape.
    pub fn snapshot_sources(&self) -> BTreeMap<String, Source> {
        let streams = self.streams.read();
        streams
            .iter()
            .map(|(id, entry)| {
                let mut source = entry.source.clone();
                source.status = entry.runtime.status;
                (id.clone(), source)
            })
            .collect()
    }

    /// First id (for UI defaulting) plus all ids
    pub fn list(&self) -> (Option<String>, Vec<String>) {
        let snapshot = self.snapshot_sources();
        let ids: Vec<String> = snapshot.keys().cloned().collect();
        (ids.first().cloned(), ids)
    }

    /// Spawn the stream worker unless one is already running.
    ///
    /// Status and codecs are cleared before the spawn so viewers arriving
    /// after a restart never observe state from the previous worker life.
    pub fn ensure_started(self: &Arc<Self>, id: &str) {
        let worker = {
            let mut streams = self.streams.write();
            let Some(entry) = streams.get_mut(id) else {
                tracing::debug!(stream = %id, "ensure_started: unknown stream");
                return;
            };
            if entry.runtime.run_lock {
                tracing::trace!(stream = %id, "ensure_started: already running");
                return;
            }
            entry.runtime.run_lock = true;
            entry.runtime.status = false;
            entry.runtime.codecs = None;
            tracing::info!(stream = %id, on_demand = entry.source.on_demand, "starting stream worker");
            StreamWorker::new(Arc::clone(self), Arc::clone(&self.dialer), id, &entry.source)
        };
        tokio::spawn(worker.run());
    }

    /// Worker exit: unlock the run flag and clear observed state
    pub(crate) fn release(&self, id: &str) {
        let mut streams = self.streams.write();
        if let Some(entry) = streams.get_mut(id) {
            entry.runtime.run_lock = false;
            entry.runtime.status = false;
            entry.runtime.codecs = None;
            tracing::info!(stream = %id, "stream worker stopped");
        }
    }

    /// Whether a worker currently holds the run lock
    pub fn is_running(&self, id: &str) -> bool {
        self.streams
            .read()
            .get(id)
            .map(|e| e.runtime.run_lock)
            .unwrap_or(false)
    }

    /// Atomically replace the codec list and wake gate waiters
    pub(crate) fn set_codecs(&self, id: &str, codecs: Vec<CodecInfo>) {
        let mut streams = self.streams.write();
        if let Some(entry) = streams.get_mut(id) {
            tracing::debug!(stream = %id, tracks = codecs.len(), "codecs published");
            entry.runtime.codecs = Some(codecs);
            entry.runtime.status = true;
            entry.runtime.codec_gate.send_modify(|generation| *generation += 1);
        }
    }

    /// Current codec list without waiting
    pub fn codecs(&self, id: &str) -> Option<Vec<CodecInfo>> {
        self.streams
            .read()
            .get(id)
            .and_then(|e| e.runtime.codecs.clone())
    }

    /// Fan a packet out to every viewer of the stream
    pub(crate) fn cast(&self, id: &str, pkt: Packet) {
        let mut streams = self.streams.write();
        if let Some(entry) = streams.get_mut(id) {
            if !entry.runtime.status {
                entry.runtime.status = true;
            }
            entry.runtime.bus.publish(id, pkt);
        }
    }

    pub(crate) fn store_last_error(&self, id: &str, err: StreamError) {
        let mut streams = self.streams.write();
        if let Some(entry) = streams.get_mut(id) {
            entry.runtime.last_error = Some(err);
        }
    }

    /// Error from the most recent worker exit, if any
    pub fn last_error(&self, id: &str) -> Option<StreamError> {
        self.streams
            .read()
            .get(id)
            .and_then(|e| e.runtime.last_error.clone())
    }

    /// Allocate a viewer queue on the stream. The returned handle detaches
    /// on drop.
    pub fn attach_viewer(self: &Arc<Self>, id: &str) -> Option<ViewerHandle> {
        let mut streams = self.streams.write();
        let entry = streams.get_mut(id)?;
        let (viewer_id, rx) = entry.runtime.bus.subscribe();
        tracing::info!(
            stream = %id,
            viewer = %viewer_id,
            viewers = entry.runtime.bus.len(),
            "viewer attached"
        );
        Some(ViewerHandle::new(
            id.to_string(),
            viewer_id,
            rx,
            Arc::clone(self),
        ))
    }

    pub(crate) fn detach_viewer(&self, id: &str, viewer_id: &str) {
        let mut streams = self.streams.write();
        if let Some(entry) = streams.get_mut(id) {
            if entry.runtime.bus.unsubscribe(viewer_id) {
                tracing::info!(
                    stream = %id,
                    viewer = %viewer_id,
                    remaining = entry.runtime.bus.len(),
                    "viewer detached"
                );
            }
        }
    }

    /// Whether any viewer is attached
    pub fn has_viewer(&self, id: &str) -> bool {
        self.streams
            .read()
            .get(id)
            .map(|e| !e.runtime.bus.is_empty())
            .unwrap_or(false)
    }

    /// The codec-readiness gate.
    ///
    /// Starts an on-demand source that is not running, then waits until the
    /// stream has published a codec list whose every H.264 entry carries
    /// non-empty SPS and PPS. An incomplete list counts as "not ready yet".
    /// Returns `None` when the source does not exist, disappears while
    /// waiting, or stays not-ready past the deadline.
    pub async fn wait_for_codecs(self: &Arc<Self>, id: &str) -> Option<Vec<CodecInfo>> {
        let autostart = {
            let streams = self.streams.read();
            let entry = streams.get(id)?;
            entry.source.on_demand && !entry.runtime.run_lock
        };
        if autostart {
            tracing::debug!(stream = %id, "on-demand stream not running, starting for codec discovery");
            self.ensure_started(id);
        }

        let deadline = Instant::now() + CODEC_WAIT_TIMEOUT;
        loop {
            // Read the state and subscribe to the gate under one lock
            // acquisition, so a publication cannot slip between them.
            let (codecs, mut gate) = {
                let streams = self.streams.read();
                let Some(entry) = streams.get(id) else {
                    tracing::debug!(stream = %id, "stream disappeared while waiting for codecs");
                    return None;
                };
                (
                    entry.runtime.codecs.clone(),
                    entry.runtime.codec_gate.subscribe(),
                )
            };

            if let Some(codecs) = codecs {
                if codecs_ready(&codecs) {
                    return Some(codecs);
                }
                tracing::debug!(stream = %id, "H.264 codec missing SPS or PPS, waiting");
            }

            let slice = (Instant::now() + CODEC_WAIT_PROGRESS).min(deadline);
            match tokio::time::timeout_at(slice, gate.changed()).await {
                // New publication, or the entry (and its gate) went away;
                // either way re-check above.
                Ok(_) => {}
                Err(_) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(stream = %id, "timed out waiting for codecs");
                        return None;
                    }
                    tracing::debug!(stream = %id, "still waiting for codecs");
                }
            }
        }
    }
}
