//! Persisted source descriptors

use serde::{Deserialize, Serialize};

/// A registered RTSP source.
///
/// This is the persisted shape: it round-trips through `config.json` and the
/// HTTP API. The stream id is the registry map key, not a field. `status` is
/// informational output only: it mirrors the runtime state on save and in
/// listings, and is never trusted on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Human label; defaults to the stream id when empty
    #[serde(default)]
    pub name: String,

    /// `rtsp://` URL of the camera
    pub url: String,

    /// Live indicator, filled from runtime state on save
    #[serde(default)]
    pub status: bool,

    /// Run the worker only while viewers are attached
    #[serde(default)]
    pub on_demand: bool,

    /// Ask the RTSP client to skip audio setup
    #[serde(default)]
    pub disable_audio: bool,

    /// Verbose worker logging
    #[serde(default)]
    pub debug: bool,
}

impl Source {
    /// New source for the given URL, with everything else off
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: String::new(),
            url,
            status: false,
            on_demand: false,
            disable_audio: false,
            debug: false,
        }
    }

    pub fn on_demand(mut self, on_demand: bool) -> Self {
        self.on_demand = on_demand;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
