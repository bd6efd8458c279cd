//! The binary range decoder (spec §4.1 "Decoder contract").

use crate::{ByteReader, Read, Result, BIT_MODEL_TOTAL, BIT_MODEL_TOTAL_BITS, MOVE_BITS};

/// Decodes the bit-exact inverse of [`crate::enc::range_enc::RangeEncoder`].
///
/// Generic over the byte source so the same decode loop drives both a
/// standalone stream (`R: Read`, used by LZMA_Alone/lzip) and a pre-buffered
/// LZMA2 chunk ([`RangeDecoderBuffer`]).
pub(crate) struct RangeDecoder<R> {
    inner: R,
    range: u32,
    code: u32,
}

impl<R: ByteReader> RangeDecoder<R> {
    /// Reads the 5-byte init sequence (spec: "first byte is 0, then a
    /// big-endian u32 seeds `code`") and arms the decoder.
    pub(crate) fn new_stream(mut inner: R) -> Result<Self> {
        let first = inner.read_u8()?;
        if first != 0x00 {
            return Err(crate::error_invalid_data("range decoder first byte must be 0"));
        }
        let code = inner.read_u32_be()?;
        Ok(Self {
            inner,
            code,
            range: 0xFFFF_FFFF,
        })
    }

    /// Range-coder termination check (spec §8): a well-formed stream ends
    /// with `code == 0`.
    pub(crate) fn is_stream_finished(&self) -> bool {
        self.code == 0
    }

    /// Hands back the underlying reader, positioned exactly after the last
    /// byte the range coder consumed. Used by the lzip reader to read a
    /// member's trailer (and the next member's header) from the same
    /// stream once a member's LZMA1 payload is fully decoded.
    pub(crate) fn into_inner(self) -> R {
        self.inner
    }

    pub(crate) fn normalize(&mut self) -> Result<()> {
        if self.range < 0x0100_0000 {
            let b = self.inner.read_u8()? as u32;
            self.code = (self.code << 8) | b;
            self.range <<= 8;
        }
        Ok(())
    }

    pub(crate) fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        self.normalize()?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        if self.code < bound {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL - *prob as u32) >> MOVE_BITS) as u16;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            Ok(1)
        }
    }

    /// Decodes a plain bit-tree symbol: `probs.len()` is the tree's leaf
    /// count, the returned symbol is in `[0, probs.len())`.
    pub(crate) fn decode_bit_tree(&mut self, probs: &mut [u16]) -> Result<u32> {
        let mut symbol = 1u32;
        let limit = probs.len() as u32;
        loop {
            symbol = (symbol << 1) | self.decode_bit(&mut probs[symbol as usize])?;
            if symbol >= limit {
                break;
            }
        }
        Ok(symbol - limit)
    }

    /// Decodes a reverse bit-tree symbol (distance "special"/"align" coders,
    /// spec §4.2): bits are emitted LSB-first as the tree is walked.
    pub(crate) fn decode_reverse_bit_tree(&mut self, probs: &mut [u16]) -> Result<u32> {
        let mut symbol = 1u32;
        let limit = probs.len() as u32;
        let mut result = 0u32;
        let mut i = 0;
        loop {
            let bit = self.decode_bit(&mut probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
            result |= bit << i;
            i += 1;
            if symbol >= limit {
                break;
            }
        }
        Ok(result)
    }

    /// Decodes `count` bits with no probability model (spec §4.1
    /// `decode_direct_bits`), MSB first.
    pub(crate) fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            self.normalize()?;
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            let t = 0u32.wrapping_sub(self.code >> 31);
            self.code = self.code.wrapping_add(self.range & t);
            result = (result << 1).wrapping_add(t.wrapping_add(1));
        }
        Ok(result)
    }
}

/// A fully-buffered byte source for [`RangeDecoder`], used by LZMA2 chunk
/// decode: the whole compressed chunk (minus its 2-byte size header) is read
/// up front so the LZMA1 decode loop never has to block on partial input
/// mid-chunk (spec §4.4).
pub(crate) struct RangeDecoderBuffer {
    buf: Vec<u8>,
    pos: usize,
}

impl RangeDecoderBuffer {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            buf: vec![0; len],
            pos: len,
        }
    }
}

/// `read_u8`/`read_u32_be` etc. come from the [`ByteReader`] blanket impl
/// over any [`Read`]; a plain forward-consuming `read` is all this needs.
impl Read for RangeDecoderBuffer {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.buf.len() - self.pos);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl RangeDecoder<RangeDecoderBuffer> {
    /// Allocates the chunk buffer; `len` is the full LZMA2 compressed-chunk
    /// size including the 5-byte range-coder init sequence.
    pub(crate) fn new_buffer(len: usize) -> Self {
        Self {
            inner: RangeDecoderBuffer::new(len.saturating_sub(5)),
            code: 0,
            range: 0,
        }
    }

    /// Fills the buffer from `reader` and re-arms `code`/`range` for a new
    /// chunk (spec §4.4 step (iii): "swaps the input buffer").
    pub(crate) fn prepare<R: Read>(&mut self, mut reader: R, len: usize) -> Result<()> {
        if len < 5 {
            return Err(crate::error_invalid_input("LZMA2 chunk shorter than the range coder init sequence"));
        }
        let first = reader.read_u8()?;
        if first != 0x00 {
            return Err(crate::error_invalid_data("range decoder first byte must be 0"));
        }
        self.code = reader.read_u32_be()?;
        self.range = 0xFFFF_FFFF;

        let body_len = len - 5;
        let pos = self.inner.buf.len() - body_len;
        self.inner.pos = pos;
        reader.read_exact(&mut self.inner.buf[pos..pos + body_len])
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.inner.pos == self.inner.buf.len() && self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{enc::range_enc::RangeEncoder, init_probs};

    #[test]
    fn bit_round_trips_through_shared_probability() {
        let bits = [0u32, 1, 1, 0, 0, 0, 1, 1, 1, 0];
        let mut enc_prob = [0u16; 1];
        init_probs(&mut enc_prob);
        let mut buf = Vec::new();
        {
            let mut rc = RangeEncoder::new(&mut buf);
            for &b in &bits {
                rc.encode_bit(&mut enc_prob[0], b).unwrap();
            }
            rc.finish().unwrap();
        }

        let mut dec_prob = [0u16; 1];
        init_probs(&mut dec_prob);
        let mut rc = RangeDecoder::new_stream(buf.as_slice()).unwrap();
        for &b in &bits {
            assert_eq!(rc.decode_bit(&mut dec_prob[0]).unwrap(), b);
        }
        assert_eq!(enc_prob, dec_prob);
    }

    #[test]
    fn direct_bits_round_trip() {
        let mut buf = Vec::new();
        {
            let mut rc = RangeEncoder::new(&mut buf);
            rc.encode_direct_bits(0b10110, 5).unwrap();
            rc.finish().unwrap();
        }
        let mut rc = RangeDecoder::new_stream(buf.as_slice()).unwrap();
        assert_eq!(rc.decode_direct_bits(5).unwrap(), 0b10110);
    }

    /// Range-coder law (spec §8): for random sequences of `(initial
    /// probability, bit)` pairs, `decode_bit(encode_bit(p, b)) == b` and the
    /// probability ends up identical on both sides.
    #[test]
    fn random_bit_sequences_round_trip_with_matching_probabilities() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x1357_9BDF);

        for _ in 0..50 {
            let initial: u16 = rng.gen_range(1..crate::BIT_MODEL_TOTAL as u16);
            let bits: Vec<u32> = (0..200).map(|_| rng.gen_range(0..2)).collect();

            let mut enc_prob = initial;
            let mut buf = Vec::new();
            {
                let mut rc = RangeEncoder::new(&mut buf);
                for &b in &bits {
                    rc.encode_bit(&mut enc_prob, b).unwrap();
                }
                rc.finish().unwrap();
            }

            let mut dec_prob = initial;
            let mut rc = RangeDecoder::new_stream(buf.as_slice()).unwrap();
            for &b in &bits {
                assert_eq!(rc.decode_bit(&mut dec_prob).unwrap(), b);
            }
            assert_eq!(enc_prob, dec_prob);
        }
    }
}
