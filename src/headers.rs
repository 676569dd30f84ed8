//! The file header of a GBWT index.

use crate::GBWTError;
use crate::support;

use std::io;

//-----------------------------------------------------------------------------

/// The header of a serialized GBWT index.
///
/// The header is five 64-bit words: the magic number and the version packed
/// into one word, the flags, and the three size fields. The reader rejects
/// unknown versions and unknown flag bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBWTHeader {
    /// Number of sequences in the index.
    pub sequences: usize,
    /// Size of the alphabet, including the endmarker.
    pub alphabet_size: usize,
    /// Distance between sampled sequence identifiers along a sequence.
    pub sample_interval: usize,
    /// Flag bits.
    pub flags: u64,
}

impl GBWTHeader {
    /// Magic number: `"GBWT"` as a little-endian 32-bit integer.
    pub const MAGIC: u32 = u32::from_le_bytes(*b"GBWT");

    /// Current file format version.
    pub const VERSION: u32 = 5;

    /// Flag: the index is bidirectional.
    pub const FLAG_BIDIRECTIONAL: u64 = 0x1;
    /// Flag: the index contains metadata.
    pub const FLAG_METADATA: u64 = 0x2;
    /// Flag: the index contains an alphabet remap.
    pub const FLAG_REMAP: u64 = 0x4;
    /// Flag: the index contains document array samples.
    pub const FLAG_DA_SAMPLES: u64 = 0x8;

    /// Mask of the flags this implementation understands.
    pub const FLAG_MASK: u64 = 0xF;

    /// Creates a header for an empty index.
    pub fn new() -> Self {
        GBWTHeader {
            sequences: 0,
            alphabet_size: 1,
            sample_interval: 0,
            flags: 0,
        }
    }

    /// Returns `true` if the given flag bits are all set.
    #[inline]
    pub fn is_set(&self, flag: u64) -> bool {
        self.flags & flag == flag
    }

    /// Sets the given flag bits.
    #[inline]
    pub fn set(&mut self, flag: u64) {
        self.flags |= flag;
    }

    /// Unsets the given flag bits.
    #[inline]
    pub fn unset(&mut self, flag: u64) {
        self.flags &= !flag;
    }

    /// Serializes the header.
    pub fn serialize<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let tag = (Self::MAGIC as u64) | ((Self::VERSION as u64) << 32);
        support::write_word(writer, tag)?;
        support::write_word(writer, self.flags)?;
        support::write_word(writer, self.sequences as u64)?;
        support::write_word(writer, self.alphabet_size as u64)?;
        support::write_word(writer, self.sample_interval as u64)?;
        Ok(())
    }

    /// Loads and validates a header.
    pub fn load<T: io::Read>(reader: &mut T) -> Result<Self, GBWTError> {
        let tag = support::read_word(reader)?;
        if (tag & 0xFFFF_FFFF) as u32 != Self::MAGIC {
            return Err(GBWTError::BadMagic);
        }
        let version = (tag >> 32) as u32;
        if version != Self::VERSION {
            return Err(GBWTError::UnsupportedVersion(format!(
                "file version {} (expected {})", version, Self::VERSION
            )));
        }
        let flags = support::read_word(reader)?;
        if flags & !Self::FLAG_MASK != 0 {
            return Err(GBWTError::UnsupportedVersion(format!(
                "unknown flag bits {:#x}", flags & !Self::FLAG_MASK
            )));
        }
        let sequences = support::read_word(reader)? as usize;
        let alphabet_size = support::read_word(reader)? as usize;
        let sample_interval = support::read_word(reader)? as usize;
        if alphabet_size == 0 {
            return Err(GBWTError::UnsupportedVersion(String::from("the alphabet must contain the endmarker")));
        }
        Ok(GBWTHeader { sequences, alphabet_size, sample_interval, flags })
    }

    pub(crate) fn size_in_elements() -> usize {
        5
    }
}

impl Default for GBWTHeader {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------
