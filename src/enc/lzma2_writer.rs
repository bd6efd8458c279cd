//! The LZMA2 chunked stream writer: frames the LZMA1 fast-mode encoder into
//! independently-resettable chunks (spec §4.4).

use crate::{
    enc::{
        lzma_encoder::LZMAEncoder,
        range_enc::{RangeEncoder, RangeEncoderBuffer},
    },
    ByteWriter, LZMA2Options, Result, Write,
};

/// Reset scope a chunk's control byte declares to the decoder (spec §4.4
/// control-byte bits 5-6): `0` continues everything from the previous
/// chunk, `1` resets only the probability state, `2` additionally sends new
/// properties, `3` additionally resets the match-finder dictionary.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ResetScope {
    None,
    State,
    StateAndProps,
    StateAndPropsAndDict,
}

impl ResetScope {
    fn bits(self) -> u8 {
        match self {
            ResetScope::None => 0,
            ResetScope::State => 1,
            ResetScope::StateAndProps => 2,
            ResetScope::StateAndPropsAndDict => 3,
        }
    }
}

/// A single-threaded LZMA2 compressor.
///
/// # Examples
/// ```
/// use std::io::Write;
///
/// use lzma_codec::{LZMA2Options, LZMA2Writer};
///
/// let mut out = Vec::new();
/// let mut w = LZMA2Writer::new(&mut out, LZMA2Options::with_preset(1)).unwrap();
/// w.write_all(b"Hello, world! Hello, world!").unwrap();
/// w.finish().unwrap();
/// assert_eq!(out.last(), Some(&0u8));
/// ```
pub struct LZMA2Writer<W> {
    out: W,
    lzma: LZMAEncoder,
    rc: RangeEncoder<RangeEncoderBuffer>,
    props: u8,

    pending_dict_reset: bool,
    pending_props: bool,
    pending_state_reset: bool,

    chunk_active: bool,
    chunk_start_pos: i32,
    chunk_dict_reset: bool,
    chunk_props_needed: bool,
    chunk_state_reset: bool,

    finished: bool,
}

impl<W: Write> LZMA2Writer<W> {
    pub fn new(out: W, options: LZMA2Options) -> Result<Self> {
        let lzma = LZMAEncoder::new(&options);
        let rc = RangeEncoder::new_buffer(LZMA2Options::COMPRESSED_SIZE_MAX as usize + 128);
        Ok(Self {
            out,
            lzma,
            rc,
            props: options.get_props(),
            pending_dict_reset: true,
            pending_props: true,
            pending_state_reset: true,
            chunk_active: false,
            chunk_start_pos: 0,
            chunk_dict_reset: false,
            chunk_props_needed: false,
            chunk_state_reset: false,
            finished: false,
        })
    }

    fn begin_chunk_if_needed(&mut self) {
        if self.chunk_active {
            return;
        }
        self.chunk_start_pos = self.lzma.get_pos();
        self.chunk_dict_reset = self.pending_dict_reset;
        self.chunk_props_needed = self.pending_props || self.pending_dict_reset;
        self.chunk_state_reset = self.pending_state_reset || self.pending_dict_reset;
        self.rc.reset_buffer();
        self.chunk_active = true;
    }

    /// Drains as much of the match finder's window as will fit into chunks,
    /// without forcing out a short final chunk. Called after every `write`
    /// and, with the encoder in finishing mode, once more from `finish`.
    fn drain(&mut self) -> Result<()> {
        loop {
            self.begin_chunk_if_needed();
            let full = self.lzma.encode_for_lzma2(&mut self.rc, self.chunk_start_pos)?;
            if !full {
                return Ok(());
            }
            self.flush_chunk()?;
        }
    }

    fn scope(&self) -> ResetScope {
        if self.chunk_props_needed {
            if self.chunk_dict_reset {
                ResetScope::StateAndPropsAndDict
            } else {
                ResetScope::StateAndProps
            }
        } else if self.chunk_state_reset {
            ResetScope::State
        } else {
            ResetScope::None
        }
    }

    /// Writes out the currently active chunk (compressed, or uncompressed if
    /// compression did not shrink it) and clears the pending reset flags it
    /// satisfied. No-op if nothing was encoded since the last flush.
    fn flush_chunk(&mut self) -> Result<()> {
        if !self.chunk_active {
            return Ok(());
        }
        let uncompressed_size = (self.lzma.get_pos() - self.chunk_start_pos) as u32;
        if uncompressed_size == 0 {
            self.chunk_active = false;
            return Ok(());
        }

        let compressed_size = self.rc.finish_buffer()?.unwrap() as u32;

        if compressed_size >= uncompressed_size {
            let control = if self.chunk_dict_reset { 0x01 } else { 0x02 };
            self.out.write_u8(control)?;
            self.out.write_u16_be((uncompressed_size - 1) as u16)?;
            self.lzma.copy_uncompressed(&mut self.out, uncompressed_size as i32, uncompressed_size as usize)?;

            // The probability state the discarded compress attempt mutated
            // no longer matches what the decoder holds (it never decoded
            // this chunk). Reset it so the next compressed chunk's state
            // reset bit is telling the truth.
            self.lzma.reset();
            self.pending_state_reset = true;
            self.pending_dict_reset = false;
        } else {
            let scope = self.scope();
            let mut control = 0x80 | (scope.bits() << 5);
            control |= ((uncompressed_size - 1) >> 16) as u8;
            self.out.write_u8(control)?;
            self.out.write_u16_be((uncompressed_size - 1) as u16)?;
            self.out.write_u16_be((compressed_size - 1) as u16)?;
            if self.chunk_props_needed {
                self.out.write_u8(self.props)?;
            }
            self.rc.write_to(&mut self.out)?;

            self.pending_dict_reset = false;
            self.pending_props = false;
            self.pending_state_reset = false;
        }

        self.chunk_active = false;
        Ok(())
    }

    /// Flushes the remaining window, writes the terminating `0x00` control
    /// byte, and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if !self.finished {
            self.lzma.set_finishing();
            self.drain()?;
            self.flush_chunk()?;
            self.out.write_u8(0x00)?;
            self.finished = true;
        }
        Ok(self.out)
    }
}

impl<W: Write> Write for LZMA2Writer<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut total = 0;
        while total < buf.len() {
            let n = self.lzma.fill_window(&buf[total..]);
            if n == 0 {
                break;
            }
            total += n;
            self.drain()?;
        }
        Ok(total)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LZMA2Reader;

    fn roundtrip(data: &[u8], preset: u32) {
        let mut out = Vec::new();
        let mut w = LZMA2Writer::new(&mut out, LZMA2Options::with_preset(preset)).unwrap();
        w.write_all(data).unwrap();
        let out = w.finish().unwrap();

        let mut r = LZMA2Reader::new(out.as_slice(), LZMA2Options::with_preset(preset).dict_size, None);
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrips_small_input() {
        roundtrip(b"Hello, world! Hello, world! Hello, world!", 1);
    }

    #[test]
    fn roundtrips_incompressible_data() {
        // Pseudo-random bytes: compression is unlikely to shrink this,
        // exercising the uncompressed-chunk fallback path.
        let mut data = Vec::with_capacity(4096);
        let mut x: u32 = 0x2545F491;
        for _ in 0..4096 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            data.push((x & 0xFF) as u8);
        }
        roundtrip(&data, 0);
    }

    #[test]
    fn roundtrips_multi_chunk_input() {
        let data = vec![b'x'; 3 * (1 << 21)];
        roundtrip(&data, 0);
    }

    #[test]
    fn ends_with_terminating_control_byte() {
        let mut out = Vec::new();
        let mut w = LZMA2Writer::new(&mut out, LZMA2Options::with_preset(0)).unwrap();
        w.write_all(b"abc").unwrap();
        let out = w.finish().unwrap();
        assert_eq!(*out.last().unwrap(), 0x00);
    }
}
