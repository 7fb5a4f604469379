//! Unpacked message framing (`spec.md` §6): a segment-count/size table
//! followed by each segment's raw words, as read and written by the
//! three collaborator readers/writers.

use std::io::{Read, Write};

use crate::codec;
use crate::error::{Error, ErrorKind, Result};
use crate::segment::Segment;
use crate::session::{NullFactory, Session};
use crate::word::{Word, BYTES_PER_WORD};

/// Reads a framed message from `reader` into a fresh, single-use session
/// with no growth factory: segment 0 through `n-1` in file order, each
/// attached under its file-order id. Mirrors the reference library's
/// stream reader.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Session<'static, NullFactory>> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    let segment_count = codec::read_u32(&header, 0) as usize + 1;

    let table_len = Word::round_up_byte_count(4 + 4 * segment_count as u64) as usize;
    let mut table = vec![0u8; table_len - 4];
    reader.read_exact(&mut table)?;
    let mut sizes = Vec::with_capacity(segment_count);
    for i in 0..segment_count {
        sizes.push(codec::read_u32(&table, i * 4));
    }

    let mut session = Session::new(NullFactory);
    for (id, &words) in sizes.iter().enumerate() {
        let mut buf = Word::allocate_zeroed_vec(words as usize);
        reader.read_exact(Word::words_to_bytes_mut(&mut buf))?;
        // Leaked intentionally, same tradeoff as `factory::FileSegments`:
        // a `'static` segment for the life of the process instead of
        // threading a lifetime through `Session` for owned-but-read-only data.
        let leaked: &'static [Word] = Box::leak(buf.into_boxed_slice());
        session.append_segment(Segment::new_borrowed(id as u32, Word::words_to_bytes(leaked))?)?;
    }
    Ok(session)
}

/// Writes `segments` (each a whole number of words, in ascending segment
/// id order) to `writer` in the same framing [`read_message`] expects.
pub fn write_message<W: Write>(writer: &mut W, segments: &[&[u8]]) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::new(ErrorKind::Io, "a message must have at least one segment"));
    }
    let mut header = Vec::new();
    let mut count_bytes = [0u8; 4];
    codec::write_u32(&mut count_bytes, 0, segments.len() as u32 - 1);
    header.extend_from_slice(&count_bytes);
    for seg in segments {
        if seg.len() % BYTES_PER_WORD != 0 {
            return Err(Error::new(ErrorKind::Misaligned, "segment length is not a whole number of words"));
        }
        let mut size_bytes = [0u8; 4];
        codec::write_u32(&mut size_bytes, 0, (seg.len() / BYTES_PER_WORD) as u32);
        header.extend_from_slice(&size_bytes);
    }
    if header.len() % BYTES_PER_WORD != 0 {
        header.extend_from_slice(&[0u8; 4]);
    }
    writer.write_all(&header)?;
    for seg in segments {
        writer.write_all(seg)?;
    }
    Ok(())
}

/// Reads a packed-framed message: identical segment table framing to
/// [`read_message`], but the segment bytes that follow are packed
/// (`spec.md` §4.7) and must be inflated first.
pub fn read_packed_message<R: Read>(reader: &mut R) -> Result<Session<'static, NullFactory>> {
    let mut all_packed = Vec::new();
    reader.read_to_end(&mut all_packed)?;
    let mut unpacked = Vec::new();
    crate::packed::unpack(&all_packed, &mut unpacked)?;
    read_message(&mut unpacked.as_slice())
}

/// Writes a packed-framed message: builds the same header
/// [`write_message`] would, then packs the whole header+segments stream.
pub fn write_packed_message<W: Write>(writer: &mut W, segments: &[&[u8]]) -> Result<()> {
    let mut unpacked = Vec::new();
    write_message(&mut unpacked, segments)?;
    let mut packed = Vec::new();
    crate::packed::pack(&unpacked, &mut packed)?;
    writer.write_all(&packed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HeapFactory;
    use crate::list;

    #[test]
    fn round_trips_single_segment_message() {
        let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
        let root = list::new_struct(&mut src, 0, 8, 0).unwrap();
        list::set_u64(&mut src, root, 0, 0xDEAD_BEEF).unwrap();
        src.set_root(root).unwrap();

        let segments = src.segments_for_output();
        let mut buf = Vec::new();
        write_message(&mut buf, &segments).unwrap();

        let mut reader = buf.as_slice();
        let mut dst = read_message(&mut reader).unwrap();
        let root2 = dst.root();
        assert_eq!(list::get_u64(&dst, root2, 0), 0xDEAD_BEEF);
    }

    #[test]
    fn round_trips_packed_message() {
        let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
        let root = list::new_struct(&mut src, 0, 8, 0).unwrap();
        list::set_u64(&mut src, root, 0, 123).unwrap();
        src.set_root(root).unwrap();

        let segments = src.segments_for_output();
        let mut buf = Vec::new();
        write_packed_message(&mut buf, &segments).unwrap();

        let mut reader = buf.as_slice();
        let mut dst = read_packed_message(&mut reader).unwrap();
        let root2 = dst.root();
        assert_eq!(list::get_u64(&dst, root2, 0), 123);
    }
}
