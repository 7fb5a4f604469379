//! Encoding and decoding of the 64-bit tagged wire pointer (`spec.md` §3,
//! §4.3).
//!
//! Bit layout, little-endian, low two bits select the kind:
//!
//! ```text
//! struct (00): [0:2)=kind [2:32)=signed offset [32:48)=data words [48:64)=ptr words
//! list   (01): [0:2)=kind [2:32)=signed offset [32:35)=element size [35:64)=element count
//! far    (10): [0:2)=kind [2:3)=double [3:32)=offset into target segment [32:64)=segment id
//! other  (11): opaque; this layer doesn't interpret it.
//! ```
//!
//! A composite list's tag word reuses the struct layout: its `offset`
//! field (bits [2:32), here unsigned) holds the element count instead of
//! an offset, and `data words`/`ptr words` give the per-element stride.

/// Element size code of a list pointer, `spec.md` §3's "3-bit element-size
/// code".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementSize {
    Void,
    Bit,
    Byte,
    TwoBytes,
    FourBytes,
    EightBytes,
    Pointer,
    InlineComposite,
}

impl ElementSize {
    pub(crate) fn from_code(code: u8) -> ElementSize {
        match code & 0b111 {
            0 => ElementSize::Void,
            1 => ElementSize::Bit,
            2 => ElementSize::Byte,
            3 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            5 => ElementSize::EightBytes,
            6 => ElementSize::Pointer,
            _ => ElementSize::InlineComposite,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            ElementSize::Void => 0,
            ElementSize::Bit => 1,
            ElementSize::Byte => 2,
            ElementSize::TwoBytes => 3,
            ElementSize::FourBytes => 4,
            ElementSize::EightBytes => 5,
            ElementSize::Pointer => 6,
            ElementSize::InlineComposite => 7,
        }
    }

    /// Bits occupied by one element, for the non-composite, non-pointer
    /// sizes. Pointer and InlineComposite are handled separately by
    /// callers (a pointer element is one word; a composite element's
    /// size comes from its tag).
    pub(crate) fn data_bits(self) -> u32 {
        match self {
            ElementSize::Void => 0,
            ElementSize::Bit => 1,
            ElementSize::Byte => 8,
            ElementSize::TwoBytes => 16,
            ElementSize::FourBytes => 32,
            ElementSize::EightBytes => 64,
            ElementSize::Pointer => 64,
            ElementSize::InlineComposite => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Wire {
    Null,
    Struct {
        offset: i32,
        data_words: u16,
        ptr_words: u16,
    },
    List {
        offset: i32,
        size: ElementSize,
        /// Element count, except for `InlineComposite`, where this is the
        /// word count of the list's payload (tag word not included).
        count: u32,
    },
    Far {
        double: bool,
        seg_id: u32,
        offset: u32,
    },
    /// Kind `11`; capability pointers and anything else this layer is not
    /// specified to interpret (`spec.md` §1: capability/RPC out of scope).
    Other(u64),
}

fn sign_extend_30(bits: u32) -> i32 {
    // bits holds a 30-bit two's complement value in its low 30 bits.
    ((bits << 2) as i32) >> 2
}

pub(crate) fn decode(word: u64) -> Wire {
    if word == 0 {
        return Wire::Null;
    }
    match word & 0b11 {
        0b00 => {
            let offset = sign_extend_30(((word >> 2) & 0x3FFF_FFFF) as u32);
            let data_words = ((word >> 32) & 0xFFFF) as u16;
            let ptr_words = ((word >> 48) & 0xFFFF) as u16;
            Wire::Struct {
                offset,
                data_words,
                ptr_words,
            }
        }
        0b01 => {
            let offset = sign_extend_30(((word >> 2) & 0x3FFF_FFFF) as u32);
            let size = ElementSize::from_code(((word >> 32) & 0b111) as u8);
            let count = ((word >> 35) & 0x1FFF_FFFF) as u32;
            Wire::List {
                offset,
                size,
                count,
            }
        }
        0b10 => {
            let double = (word >> 2) & 1 != 0;
            let offset = ((word >> 3) & 0x1FFF_FFFF) as u32;
            let seg_id = (word >> 32) as u32;
            Wire::Far {
                double,
                seg_id,
                offset,
            }
        }
        _ => Wire::Other(word),
    }
}

/// Decodes a composite-list tag word. The tag word always has struct
/// encoding with its "offset" field reinterpreted as an unsigned element
/// count, per `spec.md` §3/§4.3.
pub(crate) fn decode_composite_tag(word: u64) -> (u32, u16, u16) {
    let count = ((word >> 2) & 0x3FFF_FFFF) as u32;
    let data_words = ((word >> 32) & 0xFFFF) as u16;
    let ptr_words = ((word >> 48) & 0xFFFF) as u16;
    (count, data_words, ptr_words)
}

pub(crate) fn encode_composite_tag(count: u32, data_words: u16, ptr_words: u16) -> u64 {
    debug_assert!(count < (1 << 30));
    (count as u64) << 2 | (data_words as u64) << 32 | (ptr_words as u64) << 48
}

pub(crate) fn encode_null() -> u64 {
    0
}

pub(crate) fn encode_struct(offset: i32, data_words: u16, ptr_words: u16) -> u64 {
    let offset_bits = (offset as u32) & 0x3FFF_FFFF;
    0b00u64 | (offset_bits as u64) << 2 | (data_words as u64) << 32 | (ptr_words as u64) << 48
}

pub(crate) fn encode_list(offset: i32, size: ElementSize, count: u32) -> u64 {
    debug_assert!(count < (1 << 29));
    let offset_bits = (offset as u32) & 0x3FFF_FFFF;
    0b01u64 | (offset_bits as u64) << 2 | (size.code() as u64) << 32 | (count as u64) << 35
}

pub(crate) fn encode_far(double: bool, seg_id: u32, offset: u32) -> u64 {
    debug_assert!(offset < (1 << 29));
    0b10u64 | (double as u64) << 2 | (offset as u64) << 3 | (seg_id as u64) << 32
}

/// The largest word offset a near pointer can express: a signed 30-bit
/// field, `spec.md` §4.2's "Every near pointer's word-offset fits in a
/// signed 30-bit field (+-2^29 words)".
pub(crate) const MAX_NEAR_OFFSET: i64 = (1i64 << 29) - 1;
pub(crate) const MIN_NEAR_OFFSET: i64 = -(1i64 << 29);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_pointer_round_trips() {
        let w = encode_struct(5, 2, 1);
        match decode(w) {
            Wire::Struct {
                offset,
                data_words,
                ptr_words,
            } => {
                assert_eq!(offset, 5);
                assert_eq!(data_words, 2);
                assert_eq!(ptr_words, 1);
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn struct_pointer_negative_offset_round_trips() {
        let w = encode_struct(-1, 0, 0);
        match decode(w) {
            Wire::Struct { offset, .. } => assert_eq!(offset, -1),
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn list_pointer_round_trips() {
        let w = encode_list(-3, ElementSize::EightBytes, 7);
        match decode(w) {
            Wire::List {
                offset,
                size,
                count,
            } => {
                assert_eq!(offset, -3);
                assert_eq!(size, ElementSize::EightBytes);
                assert_eq!(count, 7);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn far_pointer_round_trips() {
        let w = encode_far(true, 42, 100);
        match decode(w) {
            Wire::Far {
                double,
                seg_id,
                offset,
            } => {
                assert!(double);
                assert_eq!(seg_id, 42);
                assert_eq!(offset, 100);
            }
            other => panic!("expected far, got {other:?}"),
        }
        // spec.md scenario 5: kind bits of an encoded far pointer are `10`.
        assert_eq!(w & 0b11, 0b10);
    }

    #[test]
    fn null_word_decodes_to_null() {
        assert!(matches!(decode(0), Wire::Null));
    }

    #[test]
    fn composite_tag_round_trips() {
        let tag = encode_composite_tag(3, 1, 0);
        assert_eq!(decode_composite_tag(tag), (3, 1, 0));
    }
}
