//! Transport boundary.
//!
//! The client needs exactly three calls from whatever carries its requests:
//! two unary calls and one server-streamed call. [`FileDeviceTransport`]
//! names them; [`SocketTransport`](crate::SocketTransport) and
//! [`MemoryDevice`](crate::MemoryDevice) implement them.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw search response chunks, each zero or more whole records.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Pre-load every packfile under a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub path: String,
}

/// Ask whether a file, directory, packfile or packfile entry exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsRequest {
    pub path: String,
}

/// List the entries of a directory or packfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub path: String,
    pub pattern: String,
    pub recurse: bool,
    /// Entry-kind mask, interpreted only by the server.
    pub include_flags: i32,
}

/// Calls a file device server answers.
#[async_trait]
pub trait FileDeviceTransport: Send + Sync {
    /// Resolves once the server acknowledges the scan finished.
    async fn scan_directory(&self, request: ScanRequest) -> Result<(), TransportError>;

    async fn is_file_exists(&self, request: ExistsRequest) -> Result<bool, TransportError>;

    /// Open a server-streamed search.
    ///
    /// The stream ends when the server completes the search. Dropping it
    /// cancels the call.
    async fn search(&self, request: SearchRequest) -> Result<ChunkStream, TransportError>;
}

/// A call that could not be completed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection is gone; no reply will arrive.
    #[error("connection closed")]
    Closed,

    /// The connection failed while calls were in flight.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server answered the call with an error.
    #[error("server error: {0}")]
    Server(String),

    /// A frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] postcard::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
