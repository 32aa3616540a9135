use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use arcache_core::TrailerPolicy;
use serde::{Deserialize, Serialize};

use crate::wire::DEFAULT_MAX_RESPONSE_SIZE;

pub const DEFAULT_BIND: &str = "127.0.0.1:43594";

/// Server settings, loadable from a JSON file. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind: SocketAddr,
    /// Snapshot directory holding `manifest.json` and the archive contents.
    pub root: PathBuf,
    /// Pack every archive at load time and serve cached frames.
    pub preload: bool,
    pub trailer_policy: TrailerPolicy,
    /// Responses with a larger body are refused.
    pub max_response_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 43594)),
            root: PathBuf::from("cache"),
            preload: false,
            trailer_policy: TrailerPolicy::default(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {:?}", path))
    }
}
