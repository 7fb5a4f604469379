//! Concrete scenarios 1, 3, 4, 5, 6 from `spec.md` §8.

use capn::factory::HeapFactory;
use capn::list;
use capn::segment::Segment;
use capn::session::{NullFactory, Session};

#[test]
fn scenario_1_struct_field_round_trip_through_serialize() {
    let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
    let root = list::new_struct(&mut src, 0, 16, 1).unwrap();
    list::set_u64(&mut src, root, 0, 0x0123_4567_89AB_CDEF).unwrap();
    list::set_u32(&mut src, root, 2, 0xCAFEBABE).unwrap();
    src.set_root(root).unwrap();

    let segments = src.segments_for_output();
    let mut buf = Vec::new();
    capn::serialize::write_message(&mut buf, &segments).unwrap();

    let mut reader = buf.as_slice();
    let mut dst = capn::serialize::read_message(&mut reader).unwrap();
    let r = dst.root();
    assert_eq!(list::get_u64(&dst, r, 0), 0x0123_4567_89AB_CDEF);
    assert_eq!(list::get_u32(&dst, r, 2), 0xCAFEBABE);
}

#[test]
fn scenario_3_composite_list_bulk_round_trip() {
    let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
    let list_ptr = list::new_composite_list(&mut s, 0, 8, 0, 3).unwrap();
    for (i, &v) in [1u64, 2, 3].iter().enumerate() {
        let elem = list::get_composite_element(list_ptr, i as u32);
        list::set_u64(&mut s, elem, 0, v).unwrap();
    }
    let mut out = [0u64; 3];
    for i in 0..3 {
        let elem = list::get_composite_element(list_ptr, i as u32);
        out[i] = list::get_u64(&s, elem, 0);
    }
    assert_eq!(out, [1, 2, 3]);
}

#[test]
fn scenario_4_cross_session_copy_does_not_reference_source() {
    let mut a: Session<HeapFactory> = Session::new(HeapFactory::new());
    let x = list::new_struct(&mut a, 0, 8, 0).unwrap();
    list::set_u64(&mut a, x, 0, 0x5555).unwrap();

    let mut b: Session<HeapFactory> = Session::new(HeapFactory::new());
    let root = list::new_struct(&mut b, 0, 0, 1).unwrap();
    let copied = capn::copy::copy(&mut b, 0, &mut a, x).unwrap();
    list::setp(&mut b, root, 0, copied).unwrap();
    b.set_root(root).unwrap();

    // Mutating A after the copy must not affect B -- confirms no aliasing.
    list::set_u64(&mut a, x, 0, 0x9999).unwrap();

    let r = b.root();
    let via_root = list::getp(&mut b, r, 0);
    assert_eq!(list::get_u64(&b, via_root, 0), 0x5555);
}

#[test]
fn scenario_5_cross_segment_write_forces_a_far_pointer() {
    let mut s: Session<NullFactory> = Session::new(NullFactory);
    s.append_segment(Segment::new_owned(0, 4)).unwrap();
    s.append_segment(Segment::new_owned(1, 4)).unwrap();

    let target = list::new_struct(&mut s, 1, 8, 0).unwrap();
    assert_eq!(target.segment_id(), 1);
    list::set_u64(&mut s, target, 0, 0x42).unwrap();
    s.set_root(target).unwrap();

    let bytes = s.segment_bytes(0).unwrap();
    let word = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    assert_eq!(word & 0b11, 0b10);

    let resolved = s.root();
    assert_eq!(list::get_u64(&s, resolved, 0), 0x42);
}

#[test]
fn scenario_6_bit_list_layout_and_bulk_read() {
    let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
    let bits = list::new_bit_list(&mut s, 0, 13).unwrap();
    for &i in &[0u32, 5, 12] {
        list::set_list_u64(&mut s, bits, i, 1).unwrap();
    }
    let bytes = s.segment_bytes(bits.segment_id()).unwrap();
    let off = bits.byte_offset() as usize;
    assert_eq!(&bytes[off..off + 2], &[0x21, 0x10]);

    let mut read_back = [0u64; 13];
    for i in 0..13 {
        read_back[i] = list::get_list_u64(&s, bits, i as u32);
    }
    assert_eq!(
        read_back,
        [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1]
    );
}
