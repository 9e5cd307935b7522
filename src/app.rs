//! Bootstrap wiring
//!
//! A [`Bridge`] is the assembled service: registry seeded from configuration,
//! the muxer factory for viewer sessions, and the config store that rewrites
//! `config.json` on mutations. Boot starts every always-on worker right away
//! and, a moment later, runs each on-demand source once so its codecs are
//! already discovered when the first viewer shows up; those warm-up workers
//! exit on their own when the viewer-presence timer finds nobody watching.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ConfigStore};
use crate::error::Result;
use crate::http::{self, AppState};
use crate::registry::StreamRegistry;
use crate::rtsp::RtspDialer;
use crate::webrtc::MuxerFactory;

/// Delay before the on-demand codec pre-discovery pass
pub const WARMUP_DELAY: Duration = Duration::from_secs(2);

/// The assembled bridge service
pub struct Bridge {
    pub registry: Arc<StreamRegistry>,
    pub muxers: Arc<dyn MuxerFactory>,
    pub config: Arc<ConfigStore>,
}

impl Bridge {
    pub fn new(
        config: AppConfig,
        config_path: impl Into<PathBuf>,
        dialer: Arc<dyn RtspDialer>,
        muxers: Arc<dyn MuxerFactory>,
    ) -> Self {
        let registry = Arc::new(StreamRegistry::with_sources(dialer, config.streams));
        Self {
            registry,
            muxers,
            config: Arc::new(ConfigStore::new(config_path, config.server)),
        }
    }

    /// Handler state for the HTTP adapter
    pub fn state(&self) -> AppState {
        AppState {
            registry: Arc::clone(&self.registry),
            muxers: Arc::clone(&self.muxers),
            config: Arc::clone(&self.config),
        }
    }

    /// Start always-on workers now; warm on-demand sources up shortly after
    pub fn serve_streams(&self) {
        let (_, ids) = self.registry.list();
        let mut deferred = Vec::new();
        for id in ids {
            let Some(source) = self.registry.source(&id) else {
                continue;
            };
            if source.on_demand {
                deferred.push(id);
            } else {
                self.registry.ensure_started(&id);
            }
        }

        if deferred.is_empty() {
            return;
        }
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            tokio::time::sleep(WARMUP_DELAY).await;
            for id in deferred {
                tracing::info!(stream = %id, "warming up on-demand stream for codec discovery");
                registry.ensure_started(&id);
            }
        });
    }

    /// Start the workers and serve HTTP until the process ends
    pub async fn run(self) -> Result<()> {
        self.serve_streams();
        let addr = self.config.server.listen_addr();
        http::serve(self.state(), &addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Source;
    use crate::testutil::{RecordingMuxerFactory, ScriptedDialer};

    #[tokio::test(start_paused = true)]
    async fn test_boot_starts_workers_in_two_waves() {
        let dialer = ScriptedDialer::new();
        let (muxers, _state) = RecordingMuxerFactory::new();

        let mut config = AppConfig::default();
        config
            .streams
            .insert("always".into(), Source::new("rtsp://cam/always"));
        config.streams.insert(
            "lazy".into(),
            Source::new("rtsp://cam/lazy").on_demand(true),
        );

        let bridge = Bridge::new(
            config,
            "config.json",
            dialer.clone() as Arc<dyn RtspDialer>,
            muxers,
        );
        bridge.serve_streams();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bridge.registry.is_running("always"));
        assert!(!bridge.registry.is_running("lazy"));
        assert_eq!(dialer.dial_count(), 1);

        tokio::time::sleep(WARMUP_DELAY).await;
        assert!(bridge.registry.is_running("lazy"));
        assert_eq!(dialer.dial_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_with_no_streams_is_quiet() {
        let dialer = ScriptedDialer::new();
        let (muxers, _state) = RecordingMuxerFactory::new();
        let bridge = Bridge::new(
            AppConfig::default(),
            "config.json",
            dialer.clone() as Arc<dyn RtspDialer>,
            muxers,
        );
        bridge.serve_streams();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(dialer.dial_count(), 0);
    }
}
