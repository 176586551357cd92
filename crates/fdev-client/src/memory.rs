//! In-memory file device.
//!
//! Answers the three transport calls from a flat list of entries the way a
//! file device server does. Used for testing and for serving fixtures from
//! the fake servers in the integration tests.

use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use fdev_types::{FileEntry, Matcher, SearchInclude, encode_all};
use futures::{StreamExt, stream};

use crate::constants::SERVER_BATCH_RECORDS;
use crate::transport::{
    ChunkStream, ExistsRequest, FileDeviceTransport, ScanRequest, SearchRequest, TransportError,
};

/// In-memory file device.
///
/// Entries are kept in insertion order, which is also the order searches
/// return them in. Thread-safe via internal `RwLock`.
#[derive(Debug)]
pub struct MemoryDevice {
    entries: RwLock<Vec<FileEntry>>,
    scanned: RwLock<Vec<String>>,
    batch_size: usize,
    search_calls: AtomicUsize,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice {
    /// Create an empty device that batches like a real server.
    pub fn new() -> Self {
        Self::with_batch_size(SERVER_BATCH_RECORDS)
    }

    /// Create an empty device sending at most `batch_size` records per chunk.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            scanned: RwLock::new(Vec::new()),
            batch_size: batch_size.max(1),
            search_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, entry: FileEntry) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = FileEntry>) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).extend(entries);
    }

    /// Directories passed to `scan_directory`, in call order.
    pub fn scanned_directories(&self) -> Vec<String> {
        self.scanned.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of search calls opened so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Entries a search would return, before chunking.
    pub fn matching(&self, request: &SearchRequest) -> Vec<FileEntry> {
        let root = normalize(&request.path);
        let include = SearchInclude::from_bits_retain(request.include_flags);
        let matcher = Matcher::compile_case_insensitive(&request.pattern);

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| {
                let path = normalize(&entry.path);
                match relative_to(&path, &root) {
                    Some(rest) if !rest.is_empty() => request.recurse || !rest.contains('/'),
                    _ => false,
                }
            })
            .filter(|entry| include.includes(entry.kind()))
            .filter(|entry| matcher.matches(entry.file_name()))
            .cloned()
            .collect()
    }

    fn contains(&self, path: &str) -> bool {
        let target = normalize(path);
        if target.is_empty() {
            return true;
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().any(|entry| {
            let path = normalize(&entry.path);
            // Parents of stored entries exist implicitly.
            relative_to(&path, &target).is_some()
        })
    }
}

/// Lowercase with `/` separators and no leading or trailing separator.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_lowercase()
}

/// `path` relative to `root`, or `None` if it is not at or below `root`.
fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

#[async_trait]
impl FileDeviceTransport for MemoryDevice {
    async fn scan_directory(&self, request: ScanRequest) -> Result<(), TransportError> {
        self.scanned
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.path);
        Ok(())
    }

    async fn is_file_exists(&self, request: ExistsRequest) -> Result<bool, TransportError> {
        Ok(self.contains(&request.path))
    }

    async fn search(&self, request: SearchRequest) -> Result<ChunkStream, TransportError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let matches = self.matching(&request);

        let chunks = matches
            .chunks(self.batch_size)
            .map(|batch| {
                encode_all(batch)
                    .map(Bytes::from)
                    .map_err(|e| TransportError::Server(e.to_string()))
            })
            .collect::<Vec<_>>();
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdev_types::decode_all;
    use futures::TryStreamExt;

    fn device() -> MemoryDevice {
        let device = MemoryDevice::with_batch_size(2);
        device.extend([
            FileEntry::directory("Game/x64"),
            FileEntry::packfile("Game/x64/audio.rpf", 1024),
            FileEntry::file("Game/x64/audio.rpf/intro.awc", 512),
            FileEntry::file("Game/readme.TXT", 12),
            FileEntry::file("Other/readme.txt", 1),
        ]);
        device
    }

    fn request(path: &str, pattern: &str, recurse: bool, include: SearchInclude) -> SearchRequest {
        SearchRequest {
            path: path.into(),
            pattern: pattern.into(),
            recurse,
            include_flags: include.bits(),
        }
    }

    fn paths(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_direct_children_only() {
        let found = device().matching(&request("game", "", false, SearchInclude::ALL));
        assert_eq!(paths(&found), ["Game/x64", "Game/readme.TXT"]);
    }

    #[test]
    fn test_recursive() {
        let found = device().matching(&request("game\\", "", true, SearchInclude::ALL));
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_pattern_is_case_insensitive() {
        let found = device().matching(&request("", "*.txt", true, SearchInclude::ALL));
        assert_eq!(paths(&found), ["Game/readme.TXT", "Other/readme.txt"]);
    }

    #[test]
    fn test_include_mask() {
        let found = device().matching(&request("game", "", true, SearchInclude::ARCHIVE));
        assert_eq!(paths(&found), ["Game/x64/audio.rpf"]);
    }

    #[tokio::test]
    async fn test_search_chunks_by_batch_size() {
        let device = device();
        let chunks: Vec<Bytes> = device
            .search(request("game", "", true, SearchInclude::ALL))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let sizes: Vec<_> = chunks.iter().map(|c| decode_all(c).unwrap().len()).collect();
        assert_eq!(sizes, [2, 2]);
        assert_eq!(device.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_scan() {
        let device = device();
        assert!(device.is_file_exists(ExistsRequest { path: "game/X64/Audio.rpf".into() }).await.unwrap());
        assert!(device.is_file_exists(ExistsRequest { path: "other".into() }).await.unwrap());
        assert!(!device.is_file_exists(ExistsRequest { path: "game/x6".into() }).await.unwrap());

        device.scan_directory(ScanRequest { path: "game".into() }).await.unwrap();
        assert_eq!(device.scanned_directories(), ["game"]);
    }
}
