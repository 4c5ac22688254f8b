//! Per-entry flags encoding.

use crate::error::{CodecError, CodecResult};

/// Number of low bits reserved for the backend.
pub const RESERVED_BITS: u32 = 16;

/// Backend bit marking the stored bytes as compressed.
pub const COMPRESSED_BIT: u32 = 1;

/// Mask over the backend-owned bits.
const BACKEND_MASK: u32 = (1 << RESERVED_BITS) - 1;

/// Largest part count the high field can carry (`part_count + 1` must fit).
pub const MAX_PART_COUNT: u32 = (u32::MAX >> RESERVED_BITS) - 1;

/// The structured contents of a flags integer.
///
/// `part_count` is the number of chunks stored *in addition to* chunk 0.
/// `None` means the entry carries no chunk metadata (high field is zero),
/// which is distinct from `Some(0)`: a value that fit in a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// Whether the backend compressed the stored bytes.
    pub compressed: bool,
    /// Additional chunks beyond chunk 0, if chunk metadata is present.
    pub part_count: Option<u32>,
}

impl Flags {
    /// Flags for a chunk carrying metadata.
    #[must_use]
    pub const fn chunked(compressed: bool, part_count: u32) -> Self {
        Self {
            compressed,
            part_count: Some(part_count),
        }
    }

    /// Flags without chunk metadata.
    #[must_use]
    pub const fn plain(compressed: bool) -> Self {
        Self {
            compressed,
            part_count: None,
        }
    }

    /// Packs the fields into the store's flags integer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PartCountOverflow`] if `part_count` exceeds
    /// [`MAX_PART_COUNT`].
    pub fn encode(self) -> CodecResult<u32> {
        let field = match self.part_count {
            None => 0,
            Some(n) if n <= MAX_PART_COUNT => n + 1,
            Some(n) => {
                return Err(CodecError::PartCountOverflow {
                    part_count: n,
                    max: MAX_PART_COUNT,
                })
            }
        };
        let backend = if self.compressed { COMPRESSED_BIT } else { 0 };
        Ok(backend | (field << RESERVED_BITS))
    }

    /// Unpacks a flags integer.
    ///
    /// Backend bits other than [`COMPRESSED_BIT`] are ignored.
    #[must_use]
    pub const fn decode(flags: u32) -> Self {
        let field = flags >> RESERVED_BITS;
        Self {
            compressed: flags & BACKEND_MASK & COMPRESSED_BIT != 0,
            part_count: field.checked_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_chunk_is_distinct_from_no_metadata() {
        assert_eq!(Flags::plain(false).encode().unwrap(), 0);
        assert_eq!(Flags::chunked(false, 0).encode().unwrap(), 1 << 16);
        assert_eq!(Flags::decode(0).part_count, None);
        assert_eq!(Flags::decode(1 << 16).part_count, Some(0));
    }

    #[test]
    fn compression_bit_is_independent() {
        let flags = Flags::chunked(true, 3).encode().unwrap();
        assert_eq!(flags, COMPRESSED_BIT | (4 << RESERVED_BITS));

        let decoded = Flags::decode(flags);
        assert!(decoded.compressed);
        assert_eq!(decoded.part_count, Some(3));

        let plain = Flags::decode(COMPRESSED_BIT);
        assert!(plain.compressed);
        assert_eq!(plain.part_count, None);
    }

    #[test]
    fn foreign_backend_bits_are_ignored() {
        let decoded = Flags::decode(0b1010 | (2 << RESERVED_BITS));
        assert!(!decoded.compressed);
        assert_eq!(decoded.part_count, Some(1));
    }

    #[test]
    fn part_count_overflow() {
        assert!(Flags::chunked(false, MAX_PART_COUNT).encode().is_ok());
        assert_eq!(
            Flags::chunked(false, MAX_PART_COUNT + 1).encode(),
            Err(CodecError::PartCountOverflow {
                part_count: MAX_PART_COUNT + 1,
                max: MAX_PART_COUNT,
            })
        );
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(compressed: bool, parts in proptest::option::of(0..=MAX_PART_COUNT)) {
            let flags = Flags { compressed, part_count: parts };
            prop_assert_eq!(Flags::decode(flags.encode().unwrap()), flags);
        }
    }
}
