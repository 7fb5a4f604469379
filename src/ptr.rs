//! The pointer value: a fat runtime handle (segment + address + parsed
//! tag), as opposed to the 64-bit *wire* pointer that [`crate::private::wire`]
//! encodes/decodes. See `spec.md` §3 "Pointer value".
//!
//! Per the Design Notes in `spec.md` §9, this does *not* borrow from its
//! segment or hold a raw pointer: it is inert `(segment id, byte offset)`
//! data, and every operation that needs to actually read or write bytes
//! takes the owning [`crate::Session`] explicitly alongside it. That keeps
//! `Ptr: Copy` and sidesteps any self-referential-borrow concerns.

use crate::private::wire::ElementSize;

/// Which of the five shapes (`spec.md` §3) a [`Ptr`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Struct,
    /// A list of non-pointer elements (void/bit/N-byte primitive, or
    /// composite-struct). Use [`Ptr::element_size`] to distinguish them.
    List,
    PtrList,
}

/// An untyped pointer value: a struct, a list (of any element kind), a
/// pointer-list, or null.
#[derive(Debug, Clone, Copy)]
pub struct Ptr {
    pub(crate) kind: Kind,
    pub(crate) is_list_member: bool,
    pub(crate) has_ptr_tag: bool,
    pub(crate) has_composite_tag: bool,
    /// Bytes in the data section (struct), or per-element data bytes for a
    /// composite list. Zero for everything else.
    pub(crate) datasz: u32,
    /// Bytes in the pointer section (struct), or per-element pointer bytes
    /// for a composite list. Zero for everything else.
    pub(crate) ptrsz: u32,
    /// Element count for lists; 0 for a lone struct.
    pub(crate) size: i32,
    pub(crate) seg: u32,
    pub(crate) off: u32,
    pub(crate) element_size: ElementSize,
}

impl Ptr {
    pub fn null() -> Ptr {
        Ptr {
            kind: Kind::Null,
            is_list_member: false,
            has_ptr_tag: false,
            has_composite_tag: false,
            datasz: 0,
            ptrsz: 0,
            size: 0,
            seg: 0,
            off: 0,
            element_size: ElementSize::Void,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, Kind::Null)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Is this pointer one element of a parent list (as opposed to, e.g.,
    /// a struct field or the session root)?
    pub fn is_list_member(&self) -> bool {
        self.is_list_member
    }

    /// Element count for list kinds; 0 for `Struct`/`Null`.
    pub fn len(&self) -> i32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes in the data section (for `Struct`, or per-element for a
    /// composite `List`).
    pub fn data_size(&self) -> u32 {
        self.datasz
    }

    /// Bytes in the pointer section (for `Struct`, or per-element for a
    /// composite `List`).
    pub fn ptr_size(&self) -> u32 {
        self.ptrsz
    }

    pub fn segment_id(&self) -> u32 {
        self.seg
    }

    /// The byte offset this pointer's content starts at within its
    /// segment. Exposed for introspection/testing against the wire
    /// format directly; ordinary field access goes through `crate::list`.
    pub fn byte_offset(&self) -> u32 {
        self.off
    }

    pub(crate) fn element_size(&self) -> ElementSize {
        self.element_size
    }

    pub(crate) fn is_composite(&self) -> bool {
        self.has_composite_tag
    }

    /// Total struct size in words (data + pointer sections).
    pub(crate) fn struct_words(&self) -> u32 {
        self.datasz / 8 + self.ptrsz / 8
    }
}
