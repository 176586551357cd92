//! Shared file entry types and the record codec for fdev.
//!
//! This crate holds everything about a search result that does not need a
//! connection: the [`FileEntry`] value type, the fixed-width wire codec, the
//! name pattern matcher, and directory-first grouping. It is a leaf crate;
//! `fdev-client` builds the transport and streaming on top of it.
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`FileEntry`]     | One decoded search result                    |
//! | [`EntryKind`]     | File / packfile / directory / resource       |
//! | [`Encryption`]    | Typed view of the 2-bit encryption field     |
//! | [`SearchInclude`] | Entry-kind mask passed through to the server |
//! | [`Matcher`]       | Glob-or-substring name pattern               |
//! | [`CodecError`]    | Malformed record buffers, unencodable values |
//! |-------------------|----------------------------------------------|

pub mod codec;
pub mod entry;
pub mod error;
pub mod filetime;
pub mod grouping;
pub mod layout;
pub mod pattern;

pub use codec::{decode, decode_all, encode, encode_all, records};
pub use entry::{Encryption, EntryKind, FileEntry, SearchInclude};
pub use error::{CodecError, CodecResult};
pub use grouping::{group_directories_first, group_entries, grouped};
pub use layout::RECORD_SIZE;
pub use pattern::Matcher;
