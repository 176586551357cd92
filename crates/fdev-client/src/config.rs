//! Client configuration.
//!
//! Loaded from a RON file, every field optional:
//!
//! ```ron
//! (
//!     address: "192.168.1.20:50051",
//!     chunk_buffer: 2,
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CONFIG_FILE_NAME, CONNECT_TIMEOUT, DEFAULT_ADDRESS, DEFAULT_CHUNK_BUFFER,
    DEFAULT_MAX_FRAME_LEN,
};

/// Connection parameters for [`SocketTransport`](crate::SocketTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the file device server.
    pub address: String,
    /// Largest frame accepted from or sent to the server.
    pub max_frame_len: usize,
    /// Chunks the server may send ahead of each search consumer. Zero is treated as one.
    pub chunk_buffer: usize,
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            chunk_buffer: DEFAULT_CHUNK_BUFFER,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Parse a config from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&text)
    }

    /// Load `path` if given, else the default config file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/fdev/client.ron`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fdev").join(CONFIG_FILE_NAME))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Search window, at least one chunk.
    pub fn effective_chunk_buffer(&self) -> usize {
        self.chunk_buffer.max(1)
    }
}

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
