//! Record codec.
//!
//! Converts between [`FileEntry`] values and the fixed [`RECORD_SIZE`] wire
//! layout described in [`crate::layout`]. Fields are read and written one at
//! a time with explicit little-endian accessors and mask/shift bitfield
//! arithmetic; nothing depends on in-memory struct layout.

use bytes::{Buf, BufMut};

use crate::entry::FileEntry;
use crate::error::{CodecError, CodecResult};
use crate::layout::{
    BitField, ENCRYPTION, ENTRY_TYPE, MAX_PATH_LEN, PATH_FIELD_LEN, PHYSICAL_SIZE, RECORD_SIZE,
    VERSION, VIRTUAL_SIZE,
};

/// Number of whole records in `len` bytes.
///
/// Fails with [`CodecError::PartialRecord`] when `len` is not a multiple of
/// [`RECORD_SIZE`].
pub fn record_count(len: usize) -> CodecResult<usize> {
    if len % RECORD_SIZE != 0 {
        return Err(CodecError::PartialRecord { len });
    }
    Ok(len / RECORD_SIZE)
}

/// Decode a single record.
pub fn decode(record: &[u8; RECORD_SIZE]) -> FileEntry {
    let mut buf = &record[..];

    let path = decode_path(&buf[..PATH_FIELD_LEN]);
    buf.advance(PATH_FIELD_LEN);

    let word0 = u64::from(buf.get_u32_le());
    let size = buf.get_u64_le();
    let packed = buf.get_u64_le();
    let modified_raw = buf.get_i64_le();
    let word1 = buf.get_u64_le();
    debug_assert!(!buf.has_remaining());

    FileEntry {
        path,
        version: VERSION.extract(word0) as u8,
        encryption: ENCRYPTION.extract(word0) as u8,
        size,
        packed,
        modified_raw,
        entry_type: ENTRY_TYPE.extract(word1) as u8,
        virtual_size: VIRTUAL_SIZE.extract(word1) as u32,
        physical_size: PHYSICAL_SIZE.extract(word1) as u32,
    }
}

/// Decode every record in `buffer`, in buffer order.
pub fn decode_all(buffer: &[u8]) -> CodecResult<Vec<FileEntry>> {
    Ok(records(buffer)?.collect())
}

/// Lazily decode the records of `buffer`.
///
/// The length check happens up front, so a malformed buffer yields nothing.
pub fn records(buffer: &[u8]) -> CodecResult<Records<'_>> {
    record_count(buffer.len())?;
    Ok(Records {
        chunks: buffer.chunks_exact(RECORD_SIZE),
    })
}

/// Iterator over the records of a length-checked buffer.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl Iterator for Records<'_> {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        let chunk = self.chunks.next()?;
        // chunks_exact only hands out RECORD_SIZE slices.
        let record: &[u8; RECORD_SIZE] = chunk.try_into().ok()?;
        Some(decode(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Records<'_> {}

/// Encode a single entry.
pub fn encode(entry: &FileEntry) -> CodecResult<[u8; RECORD_SIZE]> {
    let mut record = [0u8; RECORD_SIZE];
    encode_into(entry, &mut &mut record[..])?;
    Ok(record)
}

/// Encode entries back to back, as one chunk.
pub fn encode_all<'a>(entries: impl IntoIterator<Item = &'a FileEntry>) -> CodecResult<Vec<u8>> {
    let entries = entries.into_iter();
    let mut out = Vec::with_capacity(entries.size_hint().0 * RECORD_SIZE);
    for entry in entries {
        encode_into(entry, &mut out)?;
    }
    Ok(out)
}

/// Append one encoded record to `out`. Nothing is written on error.
pub fn encode_into(entry: &FileEntry, out: &mut impl BufMut) -> CodecResult<()> {
    let path = encode_path(&entry.path)?;

    let mut word0 = 0u64;
    word0 = pack(VERSION, word0, u64::from(entry.version))?;
    word0 = pack(ENCRYPTION, word0, u64::from(entry.encryption))?;

    let mut word1 = 0u64;
    word1 = pack(ENTRY_TYPE, word1, u64::from(entry.entry_type))?;
    word1 = pack(VIRTUAL_SIZE, word1, u64::from(entry.virtual_size))?;
    word1 = pack(PHYSICAL_SIZE, word1, u64::from(entry.physical_size))?;

    out.put_slice(&path);
    // word0 only ever has its low 10 bits set.
    out.put_u32_le(word0 as u32);
    out.put_u64_le(entry.size);
    out.put_u64_le(entry.packed);
    out.put_i64_le(entry.modified_raw);
    out.put_u64_le(word1);
    Ok(())
}

fn pack(field: BitField, word: u64, value: u64) -> CodecResult<u64> {
    if value > field.max_value() {
        return Err(CodecError::FieldOverflow {
            field: field.name,
            value,
            bits: field.width,
        });
    }
    Ok(field.insert(word, value))
}

/// Read the path up to the first NUL. An unterminated field is cut at
/// [`MAX_PATH_LEN`] bytes, the last byte being the terminator's slot.
fn decode_path(field: &[u8]) -> String {
    let field = &field[..MAX_PATH_LEN];
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    field[..end].iter().map(|b| char::from(*b)).collect()
}

fn encode_path(path: &str) -> CodecResult<[u8; PATH_FIELD_LEN]> {
    let mut field = [0u8; PATH_FIELD_LEN];
    let mut len = 0;
    for ch in path.chars() {
        let byte = u8::try_from(ch).map_err(|_| CodecError::PathNotSingleByte { ch })?;
        if byte == 0 {
            return Err(CodecError::PathContainsNul);
        }
        if len == MAX_PATH_LEN {
            return Err(CodecError::PathTooLong {
                len: path.chars().count(),
            });
        }
        field[len] = byte;
        len += 1;
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, Encryption};
    use crate::layout::{WORD0_OFFSET, WORD1_OFFSET};

    fn sample(i: usize) -> FileEntry {
        FileEntry::resource(format!("x64/models/prop_{i:03}.ydr"), 165, 0x4000 + i as u32, 0x100)
            .with_size(1024 * i as u64)
            .with_packed(0xDEAD_0000 + i as u64)
            .with_modified_raw(133_485_408_000_000_000 + i as i64)
    }

    #[test]
    fn test_roundtrip_boundary_values() {
        let entry = FileEntry {
            path: "a".repeat(MAX_PATH_LEN),
            version: u8::MAX,
            encryption: 3,
            size: u64::MAX,
            packed: u64::MAX,
            modified_raw: i64::MIN,
            entry_type: 3,
            virtual_size: (1 << 28) - 1,
            physical_size: 0,
        };
        let record = encode(&entry).unwrap();
        assert_eq!(decode(&record), entry);

        let flipped = FileEntry {
            virtual_size: 0,
            physical_size: (1 << 28) - 1,
            entry_type: 0,
            encryption: 0,
            version: 0,
            modified_raw: i64::MAX,
            path: String::new(),
            ..entry
        };
        let record = encode(&flipped).unwrap();
        assert_eq!(decode(&record), flipped);
    }

    #[test]
    fn test_field_offsets_on_wire() {
        let entry = FileEntry::new("ab", EntryKind::Directory)
            .with_encryption(Encryption::Aes)
            .with_size(0x0102_0304_0506_0708);
        let record = encode(&entry).unwrap();

        assert_eq!(&record[..3], b"ab\0");
        // encryption 2 at bit 8 of word0
        assert_eq!(&record[WORD0_OFFSET..WORD0_OFFSET + 4], &[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(&record[264..272], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        // entry type 2 in the low bits of word1
        assert_eq!(record[WORD1_OFFSET], 0x02);
    }

    #[test]
    fn test_bitfields_lsb_first() {
        let mut record = [0u8; RECORD_SIZE];
        record[WORD0_OFFSET] = 7; // version
        record[WORD0_OFFSET + 1] = 0b01; // encryption
        // type=1, virtual=5, physical=9
        let word1: u64 = 1 | (5 << 2) | (9 << 30);
        record[WORD1_OFFSET..].copy_from_slice(&word1.to_le_bytes());

        let entry = decode(&record);
        assert_eq!(entry.version, 7);
        assert_eq!(entry.encryption_mode(), Encryption::Tfit);
        assert_eq!(entry.kind(), EntryKind::Packfile);
        assert_eq!(entry.virtual_size, 5);
        assert_eq!(entry.physical_size, 9);
    }

    #[test]
    fn test_reserved_bits_ignored() {
        let mut record = encode(&FileEntry::file("f", 1)).unwrap();
        record[WORD0_OFFSET + 3] = 0xFF;
        record[WORD1_OFFSET + 7] = 0xFC;
        let entry = decode(&record);
        assert_eq!(entry, FileEntry::file("f", 1));
    }

    #[test]
    fn test_decode_all_counts() {
        for k in [0usize, 1, 2, 100] {
            let entries: Vec<_> = (0..k).map(sample).collect();
            let buffer = encode_all(&entries).unwrap();
            assert_eq!(buffer.len(), k * RECORD_SIZE);

            let decoded = decode_all(&buffer).unwrap();
            assert_eq!(decoded.len(), k);
            assert_eq!(decoded, entries);
        }
    }

    #[test]
    fn test_partial_record_rejected() {
        let mut buffer = encode_all(&[sample(1)]).unwrap();
        buffer.push(0);
        let err = decode_all(&buffer).unwrap_err();
        assert_eq!(err, CodecError::PartialRecord { len: RECORD_SIZE + 1 });
        assert!(err.is_malformed_stream());

        assert!(decode_all(&buffer[..RECORD_SIZE - 1]).is_err());
        assert!(records(&[0u8; 2 * RECORD_SIZE - 7]).is_err());
    }

    #[test]
    fn test_unterminated_path_truncated() {
        let mut record = [0u8; RECORD_SIZE];
        record[..PATH_FIELD_LEN].fill(b'z');
        let entry = decode(&record);
        assert_eq!(entry.path.len(), MAX_PATH_LEN);
        assert!(entry.path.chars().all(|c| c == 'z'));
    }

    #[test]
    fn test_path_stops_at_first_nul() {
        let mut record = [0u8; RECORD_SIZE];
        record[..7].copy_from_slice(b"abc\0def");
        assert_eq!(decode(&record).path, "abc");
    }

    #[test]
    fn test_high_bytes_pass_through() {
        let mut record = [0u8; RECORD_SIZE];
        record[..3].copy_from_slice(&[0xC3, 0xA9, 0x41]);
        let entry = decode(&record);
        assert_eq!(entry.path, "\u{c3}\u{a9}A");
        assert_eq!(encode(&entry).unwrap(), record);
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let mut entry = FileEntry::file("f", 0);
        entry.virtual_size = 1 << 28;
        assert_eq!(
            encode(&entry).unwrap_err(),
            CodecError::FieldOverflow { field: "virtual_size", value: 1 << 28, bits: 28 }
        );

        let mut entry = FileEntry::file("f", 0);
        entry.encryption = 4;
        assert!(matches!(encode(&entry), Err(CodecError::FieldOverflow { field: "encryption", .. })));
    }

    #[test]
    fn test_encode_rejects_bad_paths() {
        let long = FileEntry::file("p".repeat(MAX_PATH_LEN + 1), 0);
        assert_eq!(encode(&long).unwrap_err(), CodecError::PathTooLong { len: MAX_PATH_LEN + 1 });

        let wide = FileEntry::file("snow\u{2603}", 0);
        assert_eq!(encode(&wide).unwrap_err(), CodecError::PathNotSingleByte { ch: '\u{2603}' });

        let nul = FileEntry::file("a\0b", 0);
        assert_eq!(encode(&nul).unwrap_err(), CodecError::PathContainsNul);
    }

    #[test]
    fn test_encode_into_writes_nothing_on_error() {
        let mut out = Vec::new();
        let mut bad = FileEntry::file("f", 0);
        bad.entry_type = 4;
        assert!(encode_into(&bad, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_records_iterator_is_exact() {
        let buffer = encode_all(&[sample(0), sample(1), sample(2)]).unwrap();
        let iter = records(&buffer).unwrap();
        assert_eq!(iter.len(), 3);
        let paths: Vec<_> = iter.map(|e| e.path).collect();
        assert_eq!(paths[2], "x64/models/prop_002.ydr");
    }
}
