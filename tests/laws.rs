//! The five cross-module laws from `spec.md` §8, as distinct from the six
//! concrete scenarios already covered in `tests/roundtrip.rs`.

use capn::factory::HeapFactory;
use capn::list;
use capn::session::Session;

quickcheck::quickcheck! {
    /// `spec.md` §8's round-trip-packed law, checked over arbitrary
    /// word-aligned inputs rather than one hand-picked sequence.
    fn prop_inflate_of_deflate_is_identity(bytes: Vec<u8>) -> bool {
        let mut bytes = bytes;
        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }
        let mut packed = Vec::new();
        if capn::packed::pack(&bytes, &mut packed).is_err() {
            return false;
        }
        let mut unpacked = Vec::new();
        if capn::packed::unpack(&packed, &mut unpacked).is_err() {
            return false;
        }
        unpacked == bytes
    }
}

#[test]
fn round_trip_packed_inflate_of_deflate_is_identity() {
    let words: Vec<u8> = (0u8..48).map(|i| if i % 7 == 0 { 0 } else { i }).collect();
    let mut packed = Vec::new();
    capn::packed::pack(&words, &mut packed).unwrap();

    let mut unpacked = Vec::new();
    capn::packed::unpack(&packed, &mut unpacked).unwrap();
    assert_eq!(unpacked, words);
}

#[test]
fn round_trip_packed_deflate_of_inflate_is_identity() {
    let words = [0u8; 24];
    let mut packed = Vec::new();
    capn::packed::pack(&words, &mut packed).unwrap();

    let mut unpacked = Vec::new();
    capn::packed::unpack(&packed, &mut unpacked).unwrap();

    let mut repacked = Vec::new();
    capn::packed::pack(&unpacked, &mut repacked).unwrap();
    assert_eq!(repacked, packed);
}

#[test]
fn round_trip_serialize_preserves_every_field() {
    let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
    let root = list::new_struct(&mut src, 0, 24, 0).unwrap();
    list::set_u64(&mut src, root, 0, 0x1122_3344_5566_7788).unwrap();
    list::set_u32(&mut src, root, 2, 0xDEAD_BEEF).unwrap();
    list::set_u16(&mut src, root, 6, 0x9ABC).unwrap();
    src.set_root(root).unwrap();

    let segments = src.segments_for_output();
    let mut buf = Vec::new();
    capn::serialize::write_message(&mut buf, &segments).unwrap();

    let mut reader = buf.as_slice();
    let mut dst = capn::serialize::read_message(&mut reader).unwrap();
    let r = dst.root();
    assert_eq!(list::get_u64(&dst, r, 0), 0x1122_3344_5566_7788);
    assert_eq!(list::get_u32(&dst, r, 2), 0xDEAD_BEEF);
    assert_eq!(list::get_u16(&dst, r, 6), 0x9ABC);
}

#[test]
fn copy_idempotence_two_copies_are_independent() {
    let mut a: Session<HeapFactory> = Session::new(HeapFactory::new());
    let x = list::new_struct(&mut a, 0, 8, 0).unwrap();
    list::set_u64(&mut a, x, 0, 7).unwrap();

    let mut b: Session<HeapFactory> = Session::new(HeapFactory::new());
    let first = capn::copy::copy(&mut b, 0, &mut a, x).unwrap();
    let second = capn::copy::copy(&mut b, 0, &mut a, x).unwrap();

    assert_ne!(
        (first.segment_id(), first.byte_offset()),
        (second.segment_id(), second.byte_offset())
    );
    assert_eq!(list::get_u64(&b, first, 0), 7);
    assert_eq!(list::get_u64(&b, second, 0), 7);
    assert_eq!(list::get_u64(&b, first, 0), list::get_u64(&a, x, 0));
}

#[test]
fn default_tolerance_reads_past_datasz_yield_default_values() {
    let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
    let narrow = list::new_struct(&mut s, 0, 8, 0).unwrap();

    assert_eq!(list::get_u64(&s, narrow, 1), 0);
    assert_eq!(list::get_u32(&s, narrow, 4), 0);
    assert_eq!(list::get_f32(&s, narrow, 3, 1.5), 1.5);
    assert_eq!(list::get_f64(&s, narrow, 3, -2.25), -2.25);
}

#[test]
fn sharing_preservation_dag_keeps_exactly_n_destination_objects() {
    let mut a: Session<HeapFactory> = Session::new(HeapFactory::new());
    let shared = list::new_struct(&mut a, 0, 8, 0).unwrap();
    list::set_u64(&mut a, shared, 0, 0xFEED).unwrap();

    let root = list::new_struct(&mut a, 0, 0, 2).unwrap();
    list::setp(&mut a, root, 0, shared).unwrap();
    list::setp(&mut a, root, 1, shared).unwrap();

    let mut b: Session<HeapFactory> = Session::new(HeapFactory::new());
    let copied_root = capn::copy::copy(&mut b, 0, &mut a, root).unwrap();

    let via_field_0 = list::getp(&mut b, copied_root, 0);
    let via_field_1 = list::getp(&mut b, copied_root, 1);
    assert_eq!(
        (via_field_0.segment_id(), via_field_0.byte_offset()),
        (via_field_1.segment_id(), via_field_1.byte_offset())
    );
    assert_eq!(list::get_u64(&b, via_field_0, 0), 0xFEED);
}
