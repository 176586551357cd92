//! fdev file device client
//!
//! Browses a remote file device: directories, packfiles and the entries
//! inside them. Three calls are exposed through [`FileDeviceClient`]:
//! pre-loading a directory, checking whether a path exists, and a lazy,
//! cancellable search that streams [`FileEntry`] values decoded from
//! fixed-width records.
//!
//! The client owns its transport explicitly. [`SocketTransport`] speaks the
//! framed socket protocol in [`wire`]; [`MemoryDevice`] answers from memory
//! for tests.
//!
//! ```no_run
//! use fdev_client::{ClientConfig, SearchInclude, connect};
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = connect(&ClientConfig::default()).await?;
//! client.scan_directory("x64").await?;
//!
//! let mut results = client.search("x64", "*.rpf", true, SearchInclude::ALL, CancellationToken::new());
//! while let Some(entry) = results.next().await {
//!     println!("{}", entry?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod memory;
pub mod search;
pub mod socket;
pub mod transport;
pub mod wire;

pub use client::FileDeviceClient;
pub use config::{ClientConfig, ConfigError};
pub use memory::MemoryDevice;
pub use search::{SearchError, SearchStream, Termination};
pub use socket::SocketTransport;
pub use transport::{
    ChunkStream, ExistsRequest, FileDeviceTransport, ScanRequest, SearchRequest, TransportError,
};

pub use fdev_types::{EntryKind, FileEntry, SearchInclude};

/// Connect to a file device server over TCP.
///
/// Must be called within a tokio runtime.
pub async fn connect(config: &ClientConfig) -> Result<FileDeviceClient, TransportError> {
    let transport = SocketTransport::connect(config).await?;
    Ok(FileDeviceClient::with_transport(transport))
}
