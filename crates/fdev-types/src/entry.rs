//! File entry types.
//!
//! A [`FileEntry`] is one search result: a file, directory, packfile, or a
//! resource living inside a packfile. Entries are plain values decoded from
//! the wire (see [`crate::codec`]) and never mutated afterwards.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::filetime;

/// What a file entry is, as classified by the server.
///
/// The discriminant is the 2-bit `entry_type` field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EntryKind {
    /// Any binary file that is neither a resource nor a packfile.
    File = 0,
    /// An archive browsable as a directory.
    Packfile = 1,
    Directory = 2,
    /// Compiled game resource (drawable, texture dictionary, ...).
    Resource = 3,
}

impl EntryKind {
    /// Map a raw 2-bit discriminant. Bits above the field width are ignored.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => EntryKind::File,
            1 => EntryKind::Packfile,
            2 => EntryKind::Directory,
            _ => EntryKind::Resource,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// The include flag that selects this kind in a search.
    pub fn include_flag(self) -> SearchInclude {
        SearchInclude::from_bits_truncate(1 << self.bits())
    }
}

/// Encryption applied to an entry's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Encryption {
    None = 0,
    Tfit = 1,
    Aes = 2,
    /// Unassigned value of the 2-bit field.
    Reserved = 3,
}

impl Encryption {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Encryption::None,
            1 => Encryption::Tfit,
            2 => Encryption::Aes,
            _ => Encryption::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

bitflags! {
    /// Which kinds of entries a search should return.
    ///
    /// Bit `k` selects entries whose [`EntryKind`] discriminant is `k`. The
    /// client passes the mask through to the server untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SearchInclude: i32 {
        const FILE = 1 << 0;
        const ARCHIVE = 1 << 1;
        const DIRECTORY = 1 << 2;
        const RESOURCE = 1 << 3;
        const ALL = 0xF;
    }
}

impl SearchInclude {
    /// True if entries of `kind` are selected.
    pub fn includes(self, kind: EntryKind) -> bool {
        self.contains(kind.include_flag())
    }
}

impl Default for SearchInclude {
    fn default() -> Self {
        SearchInclude::ALL
    }
}

/// A single file entry, decoded from one wire record.
///
/// `path` holds the raw record bytes mapped one-to-one onto characters
/// U+0000..=U+00FF; use [`FileEntry::path_bytes`] to get them back, or
/// [`FileEntry::path_utf8`] when the server wrote UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    /// Resource version, zero for anything that isn't a resource.
    pub version: u8,
    /// Raw 2-bit encryption mode.
    pub encryption: u8,
    /// Logical (uncompressed) size in bytes.
    pub size: u64,
    /// Opaque offset/compression value, passed through from the server.
    pub packed: u64,
    /// Modification time in file-time ticks.
    pub modified_raw: i64,
    /// Raw 2-bit entry type.
    pub entry_type: u8,
    /// 28-bit virtual segment size of a resource.
    pub virtual_size: u32,
    /// 28-bit physical segment size of a resource.
    pub physical_size: u32,
}

impl FileEntry {
    /// Create an entry with every numeric field zeroed.
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            version: 0,
            encryption: Encryption::None.bits(),
            size: 0,
            packed: 0,
            modified_raw: 0,
            entry_type: kind.bits(),
            virtual_size: 0,
            physical_size: 0,
        }
    }

    /// Create a plain file entry.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self::new(path, EntryKind::File).with_size(size)
    }

    /// Create a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::Directory)
    }

    /// Create a packfile entry.
    pub fn packfile(path: impl Into<String>, size: u64) -> Self {
        Self::new(path, EntryKind::Packfile).with_size(size)
    }

    /// Create a resource entry with its version and segment sizes.
    pub fn resource(path: impl Into<String>, version: u8, virtual_size: u32, physical_size: u32) -> Self {
        Self {
            version,
            virtual_size,
            physical_size,
            ..Self::new(path, EntryKind::Resource)
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_packed(mut self, packed: u64) -> Self {
        self.packed = packed;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption.bits();
        self
    }

    pub fn with_modified_raw(mut self, ticks: i64) -> Self {
        self.modified_raw = ticks;
        self
    }

    /// Set the modification time. Instants outside the file-time range are stored as zero.
    pub fn with_modified(self, time: DateTime<Utc>) -> Self {
        self.with_modified_raw(filetime::datetime_to_ticks(time).unwrap_or(0))
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_bits(self.entry_type)
    }

    pub fn encryption_mode(&self) -> Encryption {
        Encryption::from_bits(self.encryption)
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    pub fn is_packfile(&self) -> bool {
        self.kind() == EntryKind::Packfile
    }

    /// Modification time, or `None` if the tick count is negative.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        filetime::ticks_to_datetime(self.modified_raw)
    }

    /// The path as it appeared on the wire.
    ///
    /// Characters above U+00FF cannot come from a decoded record; they are
    /// replaced with `?`.
    pub fn path_bytes(&self) -> Vec<u8> {
        self.path
            .chars()
            .map(|ch| u8::try_from(ch).unwrap_or(b'?'))
            .collect()
    }

    /// The wire path interpreted as UTF-8, if it is valid UTF-8.
    pub fn path_utf8(&self) -> Option<String> {
        String::from_utf8(self.path_bytes()).ok()
    }

    /// Final path component. Both `/` and `\` separate components.
    pub fn file_name(&self) -> &str {
        let trimmed = self.path.trim_end_matches(['/', '\\']);
        match trimmed.rfind(['/', '\\']) {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }
}

impl std::fmt::Display for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}
