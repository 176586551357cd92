//! File device client.
//!
//! Thin orchestration over an injected [`FileDeviceTransport`]: each method
//! builds a request, issues one call, and maps the reply.

use std::sync::Arc;

use fdev_types::SearchInclude;
use tokio_util::sync::CancellationToken;

use crate::search::SearchStream;
use crate::transport::{
    ExistsRequest, FileDeviceTransport, ScanRequest, SearchRequest, TransportError,
};

/// Client for a remote file device.
///
/// Cheap to clone; clones share the transport. Calls from different clones
/// or tasks may run concurrently.
#[derive(Clone)]
pub struct FileDeviceClient {
    transport: Arc<dyn FileDeviceTransport>,
}

impl FileDeviceClient {
    pub fn new(transport: Arc<dyn FileDeviceTransport>) -> Self {
        Self { transport }
    }

    /// Wrap a transport the client will own.
    pub fn with_transport(transport: impl FileDeviceTransport + 'static) -> Self {
        Self::new(Arc::new(transport))
    }

    pub fn transport(&self) -> &Arc<dyn FileDeviceTransport> {
        &self.transport
    }

    /// Pre-load every packfile under `path`, recursively.
    ///
    /// Recommended before [`search`](Self::search). Resolves once the server
    /// has finished scanning.
    #[tracing::instrument(skip(self))]
    pub async fn scan_directory(&self, path: &str) -> Result<(), TransportError> {
        self.transport
            .scan_directory(ScanRequest {
                path: path.to_string(),
            })
            .await
    }

    /// Whether a file, directory, packfile or packfile entry exists at `path`.
    #[tracing::instrument(skip(self))]
    pub async fn is_file_exists(&self, path: &str) -> Result<bool, TransportError> {
        self.transport
            .is_file_exists(ExistsRequest {
                path: path.to_string(),
            })
            .await
    }

    /// Stream the entries of a directory or packfile.
    ///
    /// `pattern` is a glob (`*`, `?`) or a plain substring; `include` selects
    /// entry kinds. Both go to the server as-is. The call is opened when the
    /// stream is first polled and cancelled when `cancel` fires or the
    /// stream is dropped.
    pub fn search(
        &self,
        path: &str,
        pattern: &str,
        recurse: bool,
        include: SearchInclude,
        cancel: CancellationToken,
    ) -> SearchStream {
        let span = tracing::info_span!("search", path, pattern, recurse, include = include.bits());
        let request = SearchRequest {
            path: path.to_string(),
            pattern: pattern.to_string(),
            recurse,
            include_flags: include.bits(),
        };
        let transport = self.transport.clone();
        let open = Box::pin(async move { transport.search(request).await });
        SearchStream::new(open, cancel).instrument(span)
    }
}

impl std::fmt::Debug for FileDeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDeviceClient").finish_non_exhaustive()
    }
}
