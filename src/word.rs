//! The word: the unit of alignment, length, and offset in the wire format.

/// Size in bytes of a word, the crate's unit of segment length/capacity/offset.
pub const BYTES_PER_WORD: usize = 8;

/// An 8-byte-aligned word of message data.
///
/// Segments are allocated in terms of `Word`s so that the byte buffer
/// backing a heap-allocated segment is always 8-byte aligned, as required
/// by `spec.md` §3's segment invariants. Reading and writing through a
/// `Word` buffer always goes through [`crate::codec`], which is
/// alignment-agnostic, so `Word` itself carries no accessors beyond
/// conversion to/from byte slices.
#[derive(Clone, Copy)]
#[repr(align(8))]
pub struct Word([u8; BYTES_PER_WORD]);

impl Word {
    pub const fn zero() -> Word {
        Word([0; BYTES_PER_WORD])
    }

    /// Allocates a zero-filled vector of `n` words.
    pub fn allocate_zeroed_vec(n: usize) -> Vec<Word> {
        vec![Word::zero(); n]
    }

    pub fn words_to_bytes(words: &[Word]) -> &[u8] {
        // SAFETY: `Word` is `repr(align(8))` around `[u8; 8]`, so a slice of
        // `Word` and a slice of `u8` of the same byte length have identical
        // layout; there is no validity requirement on `u8` that `Word`'s
        // bytes could violate.
        unsafe {
            std::slice::from_raw_parts(words.as_ptr().cast::<u8>(), words.len() * BYTES_PER_WORD)
        }
    }

    pub fn words_to_bytes_mut(words: &mut [Word]) -> &mut [u8] {
        // SAFETY: see `words_to_bytes`.
        unsafe {
            std::slice::from_raw_parts_mut(
                words.as_mut_ptr().cast::<u8>(),
                words.len() * BYTES_PER_WORD,
            )
        }
    }

    /// Rounds a byte count up to a whole number of bytes-per-word.
    pub fn round_up_byte_count(bytes: u64) -> u64 {
        (bytes + (BYTES_PER_WORD as u64 - 1)) & !(BYTES_PER_WORD as u64 - 1)
    }

    /// Rounds a byte count up to a whole number of words.
    pub fn round_up_to_words(bytes: u64) -> u64 {
        Self::round_up_byte_count(bytes) / BYTES_PER_WORD as u64
    }
}

impl Default for Word {
    fn default() -> Word {
        Word::zero()
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Word({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_aligned() {
        let words = Word::allocate_zeroed_vec(4);
        let bytes = Word::words_to_bytes(&words);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes.as_ptr() as usize % BYTES_PER_WORD, 0);
    }

    #[test]
    fn round_up() {
        assert_eq!(Word::round_up_byte_count(0), 0);
        assert_eq!(Word::round_up_byte_count(1), 8);
        assert_eq!(Word::round_up_byte_count(8), 8);
        assert_eq!(Word::round_up_byte_count(9), 16);
        assert_eq!(Word::round_up_to_words(17), 3);
    }
}
