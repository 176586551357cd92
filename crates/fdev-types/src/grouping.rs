//! Directory-first presentation order.
//!
//! Mirrors what a file explorer shows: directories first, then everything
//! else, each group keeping the order the server produced.

use crate::entry::FileEntry;

/// Move every directory before every non-directory, in place.
///
/// The partition is stable: entries within each group keep their relative
/// order.
pub fn group_directories_first<T>(entries: &mut [T], mut is_directory: impl FnMut(&T) -> bool) {
    entries.sort_by_key(|entry| !is_directory(entry));
}

/// Group a sequence into a new vector, directories first.
pub fn grouped<T>(entries: impl IntoIterator<Item = T>, mut is_directory: impl FnMut(&T) -> bool) -> Vec<T> {
    let (mut dirs, rest): (Vec<T>, Vec<T>) = entries.into_iter().partition(|e| is_directory(e));
    dirs.extend(rest);
    dirs
}

/// [`group_directories_first`] for decoded file entries.
pub fn group_entries(entries: &mut [FileEntry]) {
    group_directories_first(entries, FileEntry::is_directory);
}
