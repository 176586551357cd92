//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

use fdev_types::RECORD_SIZE;

/// Default file device server address.
pub const DEFAULT_ADDRESS: &str = "localhost:50051";

/// Largest chunk payload the server sends (16 MiB).
pub const MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Records the server packs into one search chunk.
pub const SERVER_BATCH_RECORDS: usize = MAX_CHUNK_BYTES / RECORD_SIZE;

/// Room for the frame envelope around a full chunk (variant tag, call id, length).
const FRAME_OVERHEAD: usize = 64;

/// Default maximum length of one wire frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = MAX_CHUNK_BYTES + FRAME_OVERHEAD;

/// Chunks the server may send ahead of a search consumer before waiting for credit.
pub const DEFAULT_CHUNK_BUFFER: usize = 1;

/// Timeout for establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config file name under the user config directory.
pub const CONFIG_FILE_NAME: &str = "client.ron";
