//! Configuration: `config.json` model, load/save, CLI fallback
//!
//! A single JSON file in the working directory persists the server settings
//! and the registered sources. It is loaded once at boot and rewritten after
//! every mutation of the source map. When the file is absent, defaults come
//! from CLI flags instead.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::{Source, StreamRegistry};
use crate::webrtc::MuxerOptions;

/// Default config file name, resolved in the working directory
pub const CONFIG_FILE: &str = "config.json";

const DEFAULT_HTTP_PORT: &str = "8083";

/// The `server` section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// `"PORT"`, `":PORT"` or `"HOST:PORT"`
    #[serde(default)]
    pub http_port: String,
    #[serde(default)]
    pub ice_servers: Vec<String>,
    #[serde(default)]
    pub ice_username: String,
    #[serde(default)]
    pub ice_credential: String,
    #[serde(default)]
    pub webrtc_port_min: u16,
    #[serde(default)]
    pub webrtc_port_max: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT.to_string(),
            ice_servers: Vec::new(),
            ice_username: String::new(),
            ice_credential: String::new(),
            webrtc_port_min: 0,
            webrtc_port_max: 0,
        }
    }
}

impl ServerSettings {
    /// Bindable socket address for the HTTP listener
    pub fn listen_addr(&self) -> String {
        let port = if self.http_port.is_empty() {
            DEFAULT_HTTP_PORT
        } else {
            &self.http_port
        };
        if let Some(stripped) = port.strip_prefix(':') {
            format!("0.0.0.0:{stripped}")
        } else if port.contains(':') {
            port.to_string()
        } else {
            format!("0.0.0.0:{port}")
        }
    }

    /// ICE and port-range options for a new muxer
    pub fn muxer_options(&self) -> MuxerOptions {
        MuxerOptions {
            ice_servers: self.ice_servers.clone(),
            ice_username: self.ice_username.clone(),
            ice_credential: self.ice_credential.clone(),
            port_min: self.webrtc_port_min,
            port_max: self.webrtc_port_max,
        }
    }
}

/// The whole config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub streams: BTreeMap<String, Source>,
}

impl AppConfig {
    /// Load from `path`. `Ok(None)` when the file does not exist. Empty
    /// stream names default to the stream id; persisted runtime fields are
    /// reset.
    pub fn load(path: &Path) -> Result<Option<AppConfig>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut config: AppConfig =
            serde_json::from_slice(&data).map_err(|e| Error::Config(e.to_string()))?;
        for (id, source) in &mut config.streams {
            if source.name.is_empty() {
                source.name = id.clone();
            }
            source.status = false;
        }
        tracing::info!(
            path = %path.display(),
            streams = config.streams.len(),
            "loaded config"
        );
        Ok(Some(config))
    }

    /// Write to `path` as two-space-indented JSON, mode 0644
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
        }
        Ok(())
    }
}

/// CLI flags, consulted only when no config file exists
#[derive(Parser, Debug)]
#[command(name = "rtsp-bridge")]
#[command(about = "RTSP to WebRTC bridge", long_about = None)]
pub struct Args {
    /// HTTP host:port
    #[arg(long, default_value = DEFAULT_HTTP_PORT)]
    pub listen: String,

    /// WebRTC UDP port min
    #[arg(long = "udp_min", default_value_t = 0)]
    pub udp_min: u16,

    /// WebRTC UDP port max
    #[arg(long = "udp_max", default_value_t = 0)]
    pub udp_max: u16,

    /// ICE server URL
    #[arg(long = "ice_server", default_value = "")]
    pub ice_server: String,
}

impl Args {
    /// Config with these flags and no streams
    pub fn into_config(self) -> AppConfig {
        let ice_servers = if self.ice_server.is_empty() {
            Vec::new()
        } else {
            vec![self.ice_server]
        };
        AppConfig {
            server: ServerSettings {
                http_port: self.listen,
                ice_servers,
                webrtc_port_min: self.udp_min,
                webrtc_port_max: self.udp_max,
                ..ServerSettings::default()
            },
            streams: BTreeMap::new(),
        }
    }
}

/// Server settings plus the file path to rewrite on mutations.
///
/// A failed save is logged and swallowed: persistence trouble must never
/// surface to streaming clients.
pub struct ConfigStore {
    path: PathBuf,
    pub server: ServerSettings,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, server: ServerSettings) -> Self {
        Self {
            path: path.into(),
            server,
        }
    }

    /// Snapshot the registry and rewrite the config file
    pub fn persist(&self, registry: &StreamRegistry) {
        let config = AppConfig {
            server: self.server.clone(),
            streams: registry.snapshot_sources(),
        };
        match config.save(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "config persisted"),
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "failed to persist config")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        let nonce: u64 = rand::random();
        std::env::temp_dir().join(format!("rtsp-bridge-{tag}-{nonce:016x}.json"))
    }

    #[test]
    fn test_listen_addr_forms() {
        let mut settings = ServerSettings::default();
        assert_eq!(settings.listen_addr(), "0.0.0.0:8083");

        settings.http_port = ":9000".into();
        assert_eq!(settings.listen_addr(), "0.0.0.0:9000");

        settings.http_port = "127.0.0.1:9000".into();
        assert_eq!(settings.listen_addr(), "127.0.0.1:9000");

        settings.http_port = String::new();
        assert_eq!(settings.listen_addr(), "0.0.0.0:8083");
    }

    #[test]
    fn test_load_missing_file() {
        let loaded = AppConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let path = temp_path("badjson");
        std::fs::write(&path, b"{not json").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_round_trip_resets_runtime_fields() {
        let mut config = AppConfig::default();
        config.server.http_port = ":8083".into();
        config.server.ice_servers = vec!["stun:stun.l.google.com:19302".into()];
        let mut source = Source::new("rtsp://cam/1").name("front door");
        source.status = true; // stale runtime value on disk
        config.streams.insert("cam1".into(), source);
        // Empty name falls back to the id on load.
        config
            .streams
            .insert("cam2".into(), Source::new("rtsp://cam/2"));

        let path = temp_path("roundtrip");
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.server, config.server);
        assert_eq!(loaded.streams["cam1"].name, "front door");
        assert!(!loaded.streams["cam1"].status);
        assert_eq!(loaded.streams["cam2"].name, "cam2");
        assert_eq!(loaded.streams["cam1"].url, "rtsp://cam/1");
    }

    #[test]
    fn test_saved_json_is_two_space_indented() {
        let mut config = AppConfig::default();
        config
            .streams
            .insert("cam1".into(), Source::new("rtsp://cam/1"));
        let path = temp_path("indent");
        config.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(text.starts_with("{\n  \"server\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_mode_is_0644() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode");
        AppConfig::default().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        std::fs::remove_file(&path).ok();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "rtsp-bridge",
            "--listen",
            ":9001",
            "--udp_min",
            "40000",
            "--udp_max",
            "40100",
            "--ice_server",
            "stun:stun.example.com:3478",
        ]);
        let config = args.into_config();
        assert_eq!(config.server.http_port, ":9001");
        assert_eq!(config.server.webrtc_port_min, 40000);
        assert_eq!(config.server.webrtc_port_max, 40100);
        assert_eq!(
            config.server.ice_servers,
            vec!["stun:stun.example.com:3478"]
        );
        assert!(config.streams.is_empty());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["rtsp-bridge"]);
        let config = args.into_config();
        assert_eq!(config.server.http_port, "8083");
        assert_eq!(config.server.webrtc_port_min, 0);
        assert!(config.server.ice_servers.is_empty());
    }
}
