//! The packed wire format (`spec.md` §4.7): a zero-run-eliding transform
//! over the unpacked word stream, bit-compatible with the reference
//! implementation's packing scheme.
//!
//! Every output word is preceded by a tag byte. `0x00` means "the next
//! word is all zero bytes, skip it" (actually: count how many
//! consecutive all-zero words follow and emit one tag + a single
//! following byte holding how many *additional* zero words to skip,
//! capped at 255). `0xFF` means "the next word is not worth
//! bit-packing, emit it raw, and also emit a follow-on byte counting how
//! many further raw words follow" -- this is what lets a long run of
//! high-entropy data avoid a tag byte per word. Anything else is a
//! bitmask: bit `i` set means output byte `i` of this word is nonzero
//! and appears in the stream; bit `i` clear means output byte `i` is
//! zero and elided.

use crate::error::{Error, ErrorKind, Result};
use crate::word::BYTES_PER_WORD;

/// Packs `words` (a whole number of 8-byte words) into `out`, appending
/// to whatever's already there. Returns the number of bytes appended.
pub fn pack(words: &[u8], out: &mut Vec<u8>) -> Result<usize> {
    if words.len() % BYTES_PER_WORD != 0 {
        return Err(Error::new(ErrorKind::Misaligned, "pack input is not a whole number of words"));
    }
    let start_len = out.len();
    let mut i = 0;
    while i < words.len() {
        let word = &words[i..i + BYTES_PER_WORD];
        if word.iter().all(|&b| b == 0) {
            let mut run = 0u8;
            let mut j = i + BYTES_PER_WORD;
            while run < 255 && j < words.len() && words[j..j + BYTES_PER_WORD].iter().all(|&b| b == 0) {
                run += 1;
                j += BYTES_PER_WORD;
            }
            out.push(0x00);
            out.push(run);
            i = j;
            continue;
        }

        if should_emit_raw(words, i) {
            out.push(0xFF);
            out.extend_from_slice(&words[i..i + BYTES_PER_WORD]);
            let after_first = i + BYTES_PER_WORD;
            if after_first == words.len() {
                // No more input at all: the reference packer omits the run
                // count byte entirely rather than writing a trailing zero,
                // so a literal word can end a packed stream in exactly 9
                // bytes (spec.md §8 scenario 2).
                i = after_first;
                continue;
            }
            let mut run = 0u8;
            let mut j = after_first;
            while run < 255 && j < words.len() && should_emit_raw(words, j) {
                run += 1;
                j += BYTES_PER_WORD;
            }
            out.push(run);
            out.extend_from_slice(&words[after_first..j]);
            i = j;
            continue;
        }

        let mut tag = 0u8;
        for (bit, &b) in word.iter().enumerate() {
            if b != 0 {
                tag |= 1 << bit;
            }
        }
        out.push(tag);
        out.extend(word.iter().copied().filter(|&b| b != 0));
        i += BYTES_PER_WORD;
    }
    Ok(out.len() - start_len)
}

/// A word is a good candidate for the `0xFF` raw run if at least 6 of its
/// 8 bytes are nonzero -- below that threshold, bitmask-packing it saves
/// more than the extra tag byte the raw encoding costs on every word in
/// the run. This threshold is a policy choice (`spec.md` §9 Open
/// Question): it trades a slightly worse compression ratio on borderline
/// words for cheaper encode/decode, matching the reference packer's own
/// heuristic.
fn should_emit_raw(words: &[u8], offset: usize) -> bool {
    let word = &words[offset..offset + BYTES_PER_WORD];
    word.iter().filter(|&&b| b != 0).count() >= 6
}

/// Unpacks `input` (produced by [`pack`]) into `out`, appending a whole
/// number of 8-byte words. Returns the number of input bytes consumed,
/// which may be less than `input.len()` if `input` ends mid-word (the
/// resumable `PackedStream` below handles that case; this function
/// requires a complete, self-contained input).
pub fn unpack(input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
    let mut stream = PackedStream::new();
    let mut consumed = 0;
    loop {
        let (used, _) = stream.inflate(&input[consumed..], out)?;
        consumed += used;
        if used == 0 {
            break;
        }
    }
    if !stream.at_word_boundary() {
        return Err(Error::new(ErrorKind::NeedMore, "packed input ended mid-word"));
    }
    Ok(consumed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a tag byte.
    Tag,
    /// Reading a zero-run count byte.
    ZeroRunCount,
    /// Reading the `n`th of 8 bytes of a bitmask-tagged word; bytes whose
    /// tag bit is clear are synthesized as zero without consuming input.
    Bitmask { tag: u8, byte_index: u8 },
    /// Reading the count byte that follows a raw (`0xFF`) word.
    RawRunCount,
    /// Copying `remaining` further raw words verbatim (the first raw word
    /// is read via `Bitmask`-style full-byte copy instead).
    RawRun { remaining: u16 },
}

/// A resumable inflate state machine, for callers that receive packed
/// bytes in arbitrary chunks (a non-blocking socket, a fixed-size read
/// buffer) rather than all at once. Mirrors the original library's
/// `next_in`/`avail_in`/`next_out`/`avail_out` resumption model, adapted
/// to Rust slices instead of raw pointers.
pub struct PackedStream {
    state: State,
    /// Bytes of the word currently being assembled, and how many of its
    /// 8 slots are filled so far.
    pending_word: [u8; BYTES_PER_WORD],
    pending_len: u8,
}

impl PackedStream {
    pub fn new() -> Self {
        PackedStream {
            state: State::Tag,
            pending_word: [0; BYTES_PER_WORD],
            pending_len: 0,
        }
    }

    /// True if the stream has emitted a whole number of words and isn't
    /// mid-word (safe point to consider the stream "done" if no more
    /// input is coming).
    pub fn at_word_boundary(&self) -> bool {
        // `RawRunCount` with no partial word pending means the last thing
        // we did was finish a literal (`0xff`) word; the reference format
        // omits the trailing run-count byte when that word is the last
        // thing in the stream, so this is a valid place to stop, not just
        // `Tag`.
        matches!(self.state, State::Tag | State::RawRunCount) && self.pending_len == 0
    }

    fn flush_word(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.pending_word);
        self.pending_word = [0; BYTES_PER_WORD];
        self.pending_len = 0;
    }

    /// Consumes as much of `input` as it can, appending decoded words to
    /// `out`. Returns `(bytes consumed, words produced)`. Consuming zero
    /// bytes with input non-empty would mean an internal inconsistency;
    /// consuming zero bytes with empty input just means "out of input for
    /// now, call again with more".
    pub fn inflate(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(usize, usize)> {
        let mut pos = 0;
        let mut words_out = 0;
        while pos < input.len() {
            match self.state {
                State::Tag => {
                    let tag = input[pos];
                    pos += 1;
                    match tag {
                        0x00 => self.state = State::ZeroRunCount,
                        0xFF => self.state = State::Bitmask { tag: 0xFF, byte_index: 0 },
                        _ => self.state = State::Bitmask { tag, byte_index: 0 },
                    }
                }
                State::ZeroRunCount => {
                    let run = input[pos];
                    pos += 1;
                    out.extend_from_slice(&[0u8; BYTES_PER_WORD]);
                    words_out += 1;
                    for _ in 0..run {
                        out.extend_from_slice(&[0u8; BYTES_PER_WORD]);
                        words_out += 1;
                    }
                    self.state = State::Tag;
                }
                State::Bitmask { tag, byte_index } => {
                    if tag == 0xFF && byte_index == 0 {
                        // Raw word: all 8 bytes come straight from input.
                        let available = (input.len() - pos).min(BYTES_PER_WORD as usize - self.pending_len as usize);
                        for k in 0..available {
                            self.pending_word[self.pending_len as usize + k] = input[pos + k];
                        }
                        pos += available;
                        self.pending_len += available as u8;
                        if self.pending_len == BYTES_PER_WORD as u8 {
                            self.flush_word(out);
                            words_out += 1;
                            self.state = State::RawRunCount;
                        } else {
                            self.state = State::Bitmask { tag, byte_index: 0 };
                            break;
                        }
                        continue;
                    }
                    let mut idx = byte_index;
                    while idx < 8 {
                        if tag & (1 << idx) != 0 {
                            if pos >= input.len() {
                                self.state = State::Bitmask { tag, byte_index: idx };
                                break;
                            }
                            self.pending_word[idx as usize] = input[pos];
                            pos += 1;
                        } else {
                            self.pending_word[idx as usize] = 0;
                        }
                        idx += 1;
                    }
                    if idx == 8 {
                        self.flush_word(out);
                        words_out += 1;
                        self.state = State::Tag;
                    } else {
                        self.state = State::Bitmask { tag, byte_index: idx };
                    }
                }
                State::RawRunCount => {
                    let run = input[pos];
                    pos += 1;
                    if run == 0 {
                        self.state = State::Tag;
                    } else {
                        self.state = State::RawRun { remaining: run as u16 };
                    }
                }
                State::RawRun { remaining } => {
                    let available = (input.len() - pos).min(BYTES_PER_WORD as usize - self.pending_len as usize);
                    for k in 0..available {
                        self.pending_word[self.pending_len as usize + k] = input[pos + k];
                    }
                    pos += available;
                    self.pending_len += available as u8;
                    if self.pending_len == BYTES_PER_WORD as u8 {
                        self.flush_word(out);
                        words_out += 1;
                        self.state = if remaining > 1 {
                            State::RawRun { remaining: remaining - 1 }
                        } else {
                            State::Tag
                        };
                    } else {
                        break;
                    }
                }
            }
        }
        Ok((pos, words_out))
    }

    /// Packs `words` in one shot into `out`. Unlike [`inflate`], packing
    /// needs no resumable state since the lookahead it performs (for
    /// zero/raw runs) only ever looks forward within the buffer already
    /// in hand; see [`pack`] for the one-shot free function this wraps.
    pub fn deflate(words: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        pack(words, out)
    }
}

impl Default for PackedStream {
    fn default() -> Self {
        PackedStream::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(words: &[u8]) {
        let mut packed = Vec::new();
        pack(words, &mut packed).unwrap();
        let mut unpacked = Vec::new();
        unpack(&packed, &mut unpacked).unwrap();
        assert_eq!(unpacked, words);
    }

    #[test]
    fn all_zero_word_packs_to_two_bytes() {
        let words = [0u8; 8];
        let mut packed = Vec::new();
        pack(&words, &mut packed).unwrap();
        assert_eq!(packed, vec![0x00, 0x00]);
        round_trip(&words);
    }

    #[test]
    fn zero_run_collapses_multiple_words() {
        let words = [0u8; 24];
        let mut packed = Vec::new();
        pack(&words, &mut packed).unwrap();
        assert_eq!(packed, vec![0x00, 0x02]);
        round_trip(&words);
    }

    #[test]
    fn sparse_word_uses_bitmask() {
        let mut word = [0u8; 8];
        word[0] = 1;
        word[3] = 2;
        let mut packed = Vec::new();
        pack(&word, &mut packed).unwrap();
        assert_eq!(packed, vec![0b0000_1001, 1, 2]);
        round_trip(&word);
    }

    #[test]
    fn dense_word_emits_raw() {
        let word = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut packed = Vec::new();
        pack(&word, &mut packed).unwrap();
        // A literal word that is also the last word in the input carries no
        // trailing run-count byte (spec.md §8 scenario 2).
        assert_eq!(packed, vec![0xFF, 1, 2, 3, 4, 5, 6, 7, 8]);
        round_trip(&word);
    }

    #[test]
    fn scenario_2_packs_to_exact_bytes() {
        let input: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut packed = Vec::new();
        pack(&input, &mut packed).unwrap();
        assert_eq!(
            packed,
            vec![0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        round_trip(&input);
    }

    #[test]
    fn literal_word_followed_by_more_data_keeps_run_byte() {
        let mut words = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        words.extend_from_slice(&[0u8; 8]);
        let mut packed = Vec::new();
        pack(&words, &mut packed).unwrap();
        assert_eq!(&packed[0..9], &[0xFF, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(packed[9], 0); // run byte present: more input followed
        assert_eq!(&packed[10..], &[0x00, 0x00]);
        round_trip(&words);
    }

    #[test]
    fn resumable_inflate_across_chunks() {
        let mut words = vec![0u8; 8];
        words.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut packed = Vec::new();
        pack(&words, &mut packed).unwrap();

        let mut stream = PackedStream::new();
        let mut out = Vec::new();
        for chunk in packed.chunks(1) {
            stream.inflate(chunk, &mut out).unwrap();
        }
        assert!(stream.at_word_boundary());
        assert_eq!(out, words);
    }

    #[test]
    fn rejects_misaligned_pack_input() {
        let mut out = Vec::new();
        assert!(pack(&[0u8; 3], &mut out).is_err());
    }
}
