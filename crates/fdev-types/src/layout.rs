//! On-wire layout of a file entry record.
//!
//! Every record is a fixed-width little-endian struct shared with the file
//! device server:
//!
//! ```text
//!  offset  size  field
//!  ──────  ────  ─────────────────────────────────────────────
//!       0   260  path (NUL-terminated, single-byte characters)
//!     260     4  word0: version:8 | encryption:2 | reserved:22
//!     264     8  size (u64)
//!     272     8  packed (u64, opaque)
//!     280     8  modified (i64, file-time ticks)
//!     288     8  word1: type:2 | virtual_size:28 | physical_size:28 | reserved:6
//!  ──────  ────
//!            296
//! ```
//!
//! Bitfields are least-significant-bit first within their containing word.

/// Width of the fixed path field, terminator included.
pub const PATH_FIELD_LEN: usize = 260;

/// Longest path that fits alongside its terminator.
pub const MAX_PATH_LEN: usize = PATH_FIELD_LEN - 1;

pub const WORD0_OFFSET: usize = PATH_FIELD_LEN;
pub const SIZE_OFFSET: usize = WORD0_OFFSET + 4;
pub const PACKED_OFFSET: usize = SIZE_OFFSET + 8;
pub const MODIFIED_OFFSET: usize = PACKED_OFFSET + 8;
pub const WORD1_OFFSET: usize = MODIFIED_OFFSET + 8;

/// Total byte width of one record. Buffers are only ever split on this.
pub const RECORD_SIZE: usize = WORD1_OFFSET + 8;

/// A sub-range of bits within an integer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    /// Bit offset from the least significant bit.
    pub offset: u32,
    pub width: u32,
}

impl BitField {
    const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self { name, offset, width }
    }

    /// Mask of the field's value, unshifted.
    pub const fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Largest value the field can hold.
    pub const fn max_value(&self) -> u64 {
        self.mask()
    }

    pub fn extract(&self, word: u64) -> u64 {
        (word >> self.offset) & self.mask()
    }

    /// Place `value` into `word`. The caller checks the value fits.
    pub fn insert(&self, word: u64, value: u64) -> u64 {
        let cleared = word & !(self.mask() << self.offset);
        cleared | ((value & self.mask()) << self.offset)
    }
}

pub const VERSION: BitField = BitField::new("version", 0, 8);
pub const ENCRYPTION: BitField = BitField::new("encryption", 8, 2);

pub const ENTRY_TYPE: BitField = BitField::new("entry_type", 0, 2);
pub const VIRTUAL_SIZE: BitField = BitField::new("virtual_size", 2, 28);
pub const PHYSICAL_SIZE: BitField = BitField::new("physical_size", 30, 28);

/// Fields of the 32-bit word following the path, in declaration order.
pub const WORD0_FIELDS: [BitField; 2] = [VERSION, ENCRYPTION];

/// Fields of the trailing 64-bit word, in declaration order.
pub const WORD1_FIELDS: [BitField; 3] = [ENTRY_TYPE, VIRTUAL_SIZE, PHYSICAL_SIZE];
