//! Pure Rust LZMA / LZMA2 codec with thin LZMA_Alone and lzip container
//! adapters.
//!
//! The crate is layered bottom up: a hash-chain match finder, a binary range
//! coder, literal/length/distance sub-coders built on a 12-state probability
//! machine, the LZMA1 stream codec, the LZMA2 chunked protocol, and finally
//! the two container formats. Each layer depends only on the one below it.

use std::io;

mod decoder;
#[cfg(feature = "encoder")]
pub mod enc;
pub mod lz;
mod lzma2_reader;
mod lzma_reader;
mod options;
mod range_dec;
mod state;

#[cfg(feature = "lzip")]
pub mod lzip;

pub use lzma2_reader::{get_memory_usage as lzma2_get_memory_usage, LZMA2Reader};
pub use lzma_reader::LZMAReader;
pub use options::{LZIPOptions, LZMA2Options, LZMAOptions, MFType};
pub use state::State;

#[cfg(feature = "encoder")]
pub use enc::{LZMA2Writer, LZMAWriter};

#[cfg(all(feature = "lzip", feature = "encoder"))]
pub use lzip::{AutoFinishLZIPWriter, LZIPWriter};
#[cfg(feature = "lzip")]
pub use lzip::LZIPReader;

pub(crate) use crate::{decoder::LZMADecoder, range_dec::RangeDecoder};

/// The crate's error type. A plain `std::io::Error` so that every layer
/// composes directly with anything already written against `std::io`.
pub type Error = io::Error;

/// The crate's result type.
pub type Result<T> = io::Result<T>;

pub use std::io::{Read, Write};

pub(crate) fn error_invalid_data(msg: impl Into<String>) -> Error {
    Error::new(io::ErrorKind::InvalidData, msg.into())
}

pub(crate) fn error_invalid_input(msg: impl Into<String>) -> Error {
    Error::new(io::ErrorKind::InvalidInput, msg.into())
}

pub(crate) fn error_unsupported(msg: impl Into<String>) -> Error {
    Error::new(io::ErrorKind::Unsupported, msg.into())
}

pub(crate) fn error_eof(msg: impl Into<String>) -> Error {
    Error::new(io::ErrorKind::UnexpectedEof, msg.into())
}

#[allow(dead_code)]
pub(crate) fn error_other(msg: impl Into<String>) -> Error {
    Error::new(io::ErrorKind::Other, msg.into())
}

/// `io::Error` is not `Clone`; readers that latch a terminal error and must
/// keep returning it on every subsequent call reconstruct one from a
/// reference with this helper.
pub(crate) fn copy_error(error: &Error) -> Error {
    Error::new(error.kind(), error.to_string())
}

/// Extension trait adding fixed-width integer reads to any [`Read`].
pub trait ByteReader: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_u16_be(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }
}

impl<R: Read + ?Sized> ByteReader for R {}

/// Extension trait adding fixed-width integer writes to any [`Write`].
pub trait ByteWriter: Write {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_all(&[v])
    }

    fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    fn write_u16_be(&mut self, v: u16) -> Result<()> {
        self.write_all(&v.to_be_bytes())
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    fn write_u32_be(&mut self, v: u32) -> Result<()> {
        self.write_all(&v.to_be_bytes())
    }

    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }
}

impl<W: Write + ?Sized> ByteWriter for W {}

/// Wraps a reader, counting the bytes read through it.
///
/// Used by the lzip reader to check the declared member size in the trailer
/// against what was actually consumed.
pub struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Wraps a writer, counting the bytes written through it.
///
/// Used by `LZMAWriter::bytes_for_decode` (spec §6) which LZMA2 needs to
/// know the uncompressed byte count excluding the 5-byte range-coder flush
/// tail.
pub struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

// --- Probability model constants (spec §3) ---

pub(crate) const BIT_MODEL_TOTAL_BITS: u32 = 11;
pub(crate) const BIT_MODEL_TOTAL: u32 = 1 << BIT_MODEL_TOTAL_BITS;
pub(crate) const PROB_INIT: u16 = (BIT_MODEL_TOTAL / 2) as u16;
pub(crate) const MOVE_BITS: u32 = 5;
pub(crate) const SHIFT_BITS: u32 = 8;
pub(crate) const TOP_MASK: u32 = 0xFF00_0000;

pub(crate) const REPS: usize = 4;
pub(crate) const STATES: usize = 12;
pub(crate) const POS_STATES_MAX: usize = 1 << 4;

pub(crate) const MATCH_LEN_MIN: usize = 2;
pub(crate) const MATCH_LEN_MAX: usize = MATCH_LEN_MIN + LOW_SYMBOLS + MID_SYMBOLS + HIGH_SYMBOLS - 1;

pub(crate) const LOW_SYMBOLS: usize = 1 << 3;
pub(crate) const MID_SYMBOLS: usize = 1 << 3;
pub(crate) const HIGH_SYMBOLS: usize = 1 << 8;

pub(crate) const DIST_STATES: usize = 4;
pub(crate) const DIST_SLOTS: usize = 1 << 6;
pub(crate) const DIST_MODEL_START: usize = 4;
pub(crate) const DIST_MODEL_END: usize = 14;
pub(crate) const FULL_DISTANCES: usize = 1 << (DIST_MODEL_END / 2);

pub(crate) const ALIGN_BITS: u32 = 4;
pub(crate) const ALIGN_SIZE: usize = 1 << ALIGN_BITS;
pub(crate) const ALIGN_MASK: usize = ALIGN_SIZE - 1;

/// Non-overlapping slice bounds into the flat 124-entry `dist_special` table,
/// one pair per distance slot 4..13. Widths double every two slots
/// (2,2,4,4,8,8,16,16,32,32), matching `2^footer_bits` for each slot's
/// `footer_bits = (slot >> 1) - 1`.
pub(crate) const DIST_SPECIAL_INDEX: [usize; 10] = [0, 2, 4, 8, 12, 20, 28, 44, 60, 92];
pub(crate) const DIST_SPECIAL_END: [usize; 10] = [2, 4, 8, 12, 20, 28, 44, 60, 92, 124];

pub(crate) fn init_probs(probs: &mut [u16]) {
    probs.fill(PROB_INIT);
}

/// Maps a match length to one of the four length-state buckets used to pick
/// a `dist_slot` probability row.
pub(crate) fn get_dist_state(len: u32) -> u32 {
    if (len as usize) < DIST_STATES + MATCH_LEN_MIN {
        len - MATCH_LEN_MIN as u32
    } else {
        DIST_STATES as u32 - 1
    }
}

/// Shared probability tables for one LZMA1 codec instance (spec §3).
///
/// Literal probabilities live in [`LiteralCoder`]'s per-context
/// [`LiteralSubCoder`]s, not here.
pub(crate) struct LZMACoder {
    pub(crate) pos_mask: u32,
    pub(crate) reps: [i32; REPS],
    pub(crate) state: State,

    pub(crate) is_match: [[u16; POS_STATES_MAX]; STATES],
    pub(crate) is_rep: [u16; STATES],
    pub(crate) is_rep0: [u16; STATES],
    pub(crate) is_rep1: [u16; STATES],
    pub(crate) is_rep2: [u16; STATES],
    pub(crate) is_rep0_long: [[u16; POS_STATES_MAX]; STATES],

    pub(crate) dist_slots: [[u16; DIST_SLOTS]; DIST_STATES],
    pub(crate) dist_special: [u16; 124],
    pub(crate) dist_align: [u16; ALIGN_SIZE],
}

impl LZMACoder {
    pub(crate) fn new(pb: usize) -> Self {
        let mut c = Self {
            pos_mask: (1 << pb) - 1,
            reps: [0; REPS],
            state: State::default(),
            is_match: [[0; POS_STATES_MAX]; STATES],
            is_rep: [0; STATES],
            is_rep0: [0; STATES],
            is_rep1: [0; STATES],
            is_rep2: [0; STATES],
            is_rep0_long: [[0; POS_STATES_MAX]; STATES],
            dist_slots: [[0; DIST_SLOTS]; DIST_STATES],
            dist_special: [0; 124],
            dist_align: [0; ALIGN_SIZE],
        };
        c.reset();
        c
    }

    pub(crate) fn reset(&mut self) {
        self.reps = [0; REPS];
        self.state = State::default();
        for row in self.is_match.iter_mut() {
            init_probs(row);
        }
        init_probs(&mut self.is_rep);
        init_probs(&mut self.is_rep0);
        init_probs(&mut self.is_rep1);
        init_probs(&mut self.is_rep2);
        for row in self.is_rep0_long.iter_mut() {
            init_probs(row);
        }
        for row in self.dist_slots.iter_mut() {
            init_probs(row);
        }
        init_probs(&mut self.dist_special);
        init_probs(&mut self.dist_align);
    }

    /// Returns the slice of `dist_special` reserved for slot
    /// `DIST_MODEL_START + i`.
    pub(crate) fn get_dist_special(&mut self, i: usize) -> &mut [u16] {
        &mut self.dist_special[DIST_SPECIAL_INDEX[i]..DIST_SPECIAL_END[i]]
    }
}

/// Selects which literal sub-coder context a byte falls into, from the
/// previous output byte and the current output position (spec §4.2).
pub(crate) struct LiteralCoder {
    lc: u32,
    literal_pos_mask: u32,
}

impl LiteralCoder {
    pub(crate) fn new(lc: u32, lp: u32) -> Self {
        Self {
            lc,
            literal_pos_mask: (1 << lp) - 1,
        }
    }

    pub(crate) fn get_sub_coder_index(&self, prev_byte: u32, pos: u32) -> u32 {
        let low = prev_byte >> (8 - self.lc);
        let high = (pos & self.literal_pos_mask) << self.lc;
        low + high
    }
}

/// One literal context's probability tree: 0x100 plain-tree slots plus the
/// 0x100 matched-tree slots sharing the same flat array (spec §3's
/// `literal[...]` table, split per context).
#[derive(Clone)]
pub(crate) struct LiteralSubCoder {
    pub(crate) probs: [u16; 0x300],
}

impl LiteralSubCoder {
    pub(crate) fn new() -> Self {
        let mut probs = [0u16; 0x300];
        init_probs(&mut probs);
        Self { probs }
    }

    pub(crate) fn reset(&mut self) {
        init_probs(&mut self.probs);
    }
}

/// Shared low/mid/high tree layout used by both the match-length and
/// rep-length coders (spec §4.2).
pub(crate) struct LengthCoder {
    pub(crate) choice: [u16; 2],
    pub(crate) low: [[u16; LOW_SYMBOLS]; POS_STATES_MAX],
    pub(crate) mid: [[u16; MID_SYMBOLS]; POS_STATES_MAX],
    pub(crate) high: [u16; HIGH_SYMBOLS],
}

impl LengthCoder {
    pub(crate) fn new() -> Self {
        let mut c = Self {
            choice: [0; 2],
            low: [[0; LOW_SYMBOLS]; POS_STATES_MAX],
            mid: [[0; MID_SYMBOLS]; POS_STATES_MAX],
            high: [0; HIGH_SYMBOLS],
        };
        c.reset();
        c
    }

    pub(crate) fn reset(&mut self) {
        init_probs(&mut self.choice);
        for row in self.low.iter_mut() {
            init_probs(row);
        }
        for row in self.mid.iter_mut() {
            init_probs(row);
        }
        init_probs(&mut self.high);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist_special_slices_are_contiguous_and_non_overlapping() {
        assert_eq!(DIST_SPECIAL_INDEX[0], 0);
        assert_eq!(*DIST_SPECIAL_END.last().unwrap(), 124);
        for i in 0..10 {
            assert_eq!(DIST_SPECIAL_INDEX[i], if i == 0 { 0 } else { DIST_SPECIAL_END[i - 1] });
            let width = DIST_SPECIAL_END[i] - DIST_SPECIAL_INDEX[i];
            let slot = DIST_MODEL_START + i;
            let footer_bits = (slot >> 1) - 1;
            assert_eq!(width, 1 << footer_bits);
        }
    }

    #[test]
    fn dist_state_bucketing() {
        assert_eq!(get_dist_state(2), 0);
        assert_eq!(get_dist_state(3), 1);
        assert_eq!(get_dist_state(4), 2);
        assert_eq!(get_dist_state(5), 3);
        assert_eq!(get_dist_state(273), 3);
    }
}
