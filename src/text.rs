//! Text view over a `Byte`-element list: a NUL-terminated UTF-8 string
//! the way Cap'n Proto stores it on the wire, with the trailing NUL
//! excluded from what callers see (`spec.md` §4.4's "text" accessor,
//! §9 Open Question "string constructor").
//!
//! [`new_text`] takes an explicit byte slice with no embedded NUL
//! requirement; [`new_c_string`] is the convenience constructor for a
//! Rust `&str` with no interior NUL, matching the split the original
//! library's two constructors (`capn_new_string`/explicit-length) drew.

use crate::error::{Error, ErrorKind, Result};
use crate::list;
use crate::private::wire::ElementSize;
use crate::ptr::{Kind, Ptr};
use crate::session::{Session, SegmentFactory};

/// Allocates a new text value from `s`, appending the trailing NUL the
/// wire format requires. `s` itself may contain any bytes, including
/// embedded NULs -- callers that want C-string semantics should use
/// [`new_c_string`] instead.
pub fn new_text<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, s: &str) -> Result<Ptr> {
    let bytes = s.as_bytes();
    let p = list::new_list(session, preferred_seg, ElementSize::Byte, bytes.len() as u32 + 1)?;
    let dest = session
        .bytes_mut(p.segment_id())
        .expect("segment just allocated into");
    let off = p.byte_offset() as usize;
    dest[off..off + bytes.len()].copy_from_slice(bytes);
    dest[off + bytes.len()] = 0;
    // `p.size` stays at `bytes.len() + 1`, matching `spec.md` §4.4's "size
    // equals byte-length-including-NUL": this is the wire list's actual
    // element count, and it's what `list_wire_shape` encodes when this
    // pointer is attached to a parent. `as_str` subtracts 1 for the
    // logical (NUL-excluded) view.
    Ok(p)
}

/// Convenience constructor matching the original library's
/// `capn_new_string`: rejects embedded NULs up front rather than
/// silently truncating at the first one on read-back.
pub fn new_c_string<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, s: &str) -> Result<Ptr> {
    if s.as_bytes().contains(&0) {
        return Err(Error::new(ErrorKind::ElementSizeMismatch, "string contains an embedded NUL"));
    }
    new_text(session, preferred_seg, s)
}

/// Borrows a text value's contents (excluding the trailing NUL) as a
/// `&str`. Returns `""` for anything that isn't a well-formed text blob:
/// wrong kind/element size, invalid UTF-8, or a missing/misplaced NUL
/// terminator -- all schema-tolerant per `spec.md` §4.8.
pub fn as_str<'a, F: SegmentFactory>(session: &'a Session<F>, p: Ptr) -> &'a str {
    if !matches!(p.kind(), Kind::List) || p.element_size() != ElementSize::Byte || p.len() == 0 {
        return "";
    }
    let Some(bytes) = session.bytes(p.segment_id()) else { return "" };
    let start = p.byte_offset() as usize;
    // `p.len()` is the wire length, including the trailing NUL; the
    // logical string is everything before it.
    let end = start + p.len() as usize - 1;
    if end >= bytes.len() || bytes[end] != 0 {
        return "";
    }
    std::str::from_utf8(&bytes[start..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HeapFactory;

    #[test]
    fn text_round_trips_and_is_nul_terminated() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = new_text(&mut s, 0, "hello").unwrap();
        assert_eq!(as_str(&s, p), "hello");
        assert_eq!(p.len(), 6, "wire size must include the trailing NUL");
        let bytes = s.bytes(p.segment_id()).unwrap();
        assert_eq!(bytes[p.byte_offset() as usize + 5], 0);
    }

    #[test]
    fn text_attached_to_a_parent_keeps_its_nul_on_the_wire() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        let text = new_text(&mut s, 0, "hi").unwrap();
        let parent = list::new_struct(&mut s, 0, 0, 1).unwrap();
        list::setp(&mut s, parent, 0, text).unwrap();

        let got = list::getp(&mut s, parent, 0);
        assert_eq!(got.len(), 3, "round-tripped list must still declare the NUL byte");
        assert_eq!(as_str(&s, got), "hi");
    }

    #[test]
    fn c_string_rejects_embedded_nul() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        assert!(new_c_string(&mut s, 0, "a\0b").is_err());
    }
}
