use crate::{error_invalid_data, Read, Result};

/// The sliding-window dictionary used by the LZMA1 decoder.
///
/// A plain modulo ring buffer of exactly `dict_size` bytes: `pos` advances
/// until it reaches the buffer end and then wraps to zero. `full` is the
/// count of valid bytes written since the last reset, saturating at
/// `dict_size`; a distance is legal only while `full > distance` (spec §3).
///
/// This is a deliberately simpler internal representation than the padded
/// ring (`INIT_POS`/`REPEAT_MAX` bookkeeping) spec.md describes: the exact
/// value of `pos` is not part of the external bit-exact contract, only the
/// bytes produced and the `full`/distance-validity invariant are, so the
/// classic unpadded ring (as used by the reference decoder this was ported
/// from) is a safe substitution. See DESIGN.md.
pub(crate) struct LZDecoder {
    buf: Vec<u8>,
    start: usize,
    pos: usize,
    full: usize,
    limit: usize,
    pending_len: u32,
    pending_dist: usize,
}

impl LZDecoder {
    pub(crate) fn new(dict_size: usize, preset_dict: Option<&[u8]>) -> Self {
        let mut buf = vec![0u8; dict_size];
        let mut start = 0;
        let mut pos = 0;
        let mut full = 0;

        if let Some(dict) = preset_dict {
            if !dict.is_empty() {
                let copy_size = dict.len().min(dict_size);
                let offset = dict.len() - copy_size;
                buf[..copy_size].copy_from_slice(&dict[offset..offset + copy_size]);
                start = copy_size;
                pos = copy_size;
                full = copy_size;
            }
        }

        Self {
            buf,
            start,
            pos,
            full,
            limit: 0,
            pending_len: 0,
            pending_dist: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.start = 0;
        self.pos = 0;
        self.full = 0;
        self.pending_len = 0;
    }

    pub(crate) fn set_limit(&mut self, out_max: usize) {
        self.limit = (self.buf.len() - self.pos).min(out_max) + self.pos;
    }

    pub(crate) fn has_space(&self) -> bool {
        self.pos < self.limit
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending_len != 0
    }

    pub(crate) fn get_pos(&self) -> i32 {
        self.pos as i32
    }

    pub(crate) fn get_byte(&self, dist: usize) -> u8 {
        let mut offset = self.pos as isize - dist as isize - 1;
        if dist >= self.pos {
            offset += self.buf.len() as isize;
        }
        self.buf[offset as usize]
    }

    pub(crate) fn put_byte(&mut self, b: u8) {
        self.buf[self.pos] = b;
        self.pos += 1;
        if self.pos > self.full {
            self.full = self.pos;
        }
    }

    /// Copies `len` bytes from `pos - dist - 1` (with ring wraparound) to the
    /// write cursor. `dist` is the zero-based distance (spec's raw decoded
    /// value; the actual byte offset back is `dist + 1`).
    pub(crate) fn repeat(&mut self, dist: i32, len: u32) -> Result<()> {
        if dist < 0 || dist as usize >= self.full {
            return Err(error_invalid_data("decoded distance exceeds dictionary extent"));
        }
        let dist = dist as usize;

        let left = (self.limit - self.pos).min(len as usize);
        self.pending_len = len - left as u32;
        self.pending_dist = dist;

        let mut back = self.pos as isize - dist as isize - 1;
        if dist >= self.pos {
            back += self.buf.len() as isize;
        }
        let mut back = back as usize;

        for _ in 0..left {
            self.buf[self.pos] = self.buf[back];
            self.pos += 1;
            back += 1;
            if back == self.buf.len() {
                back = 0;
            }
        }
        if self.pos > self.full {
            self.full = self.pos;
        }
        Ok(())
    }

    pub(crate) fn repeat_pending(&mut self) -> Result<()> {
        if self.pending_len > 0 {
            self.repeat(self.pending_dist as i32, self.pending_len)?;
        }
        Ok(())
    }

    pub(crate) fn copy_uncompressed<R: Read>(&mut self, mut input: R, len: usize) -> Result<()> {
        let copy_size = (self.buf.len() - self.pos).min(len);
        input.read_exact(&mut self.buf[self.pos..self.pos + copy_size])?;
        self.pos += copy_size;
        if self.pos > self.full {
            self.full = self.pos;
        }
        Ok(())
    }

    /// Drains everything produced since the last flush into `out[off..]`,
    /// returning how many bytes were copied.
    pub(crate) fn flush(&mut self, out: &mut [u8], off: usize) -> usize {
        let copy_size = self.pos - self.start;
        if self.pos == self.buf.len() {
            self.pos = 0;
        }
        out[off..off + copy_size].copy_from_slice(&self.buf[self.start..self.start + copy_size]);
        self.start = self.pos;
        copy_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_bytes_round_trip_through_flush() {
        let mut lz = LZDecoder::new(64, None);
        lz.set_limit(4);
        for b in [b'a', b'b', b'c', b'd'] {
            lz.put_byte(b);
        }
        let mut out = [0u8; 4];
        let n = lz.flush(&mut out, 0);
        assert_eq!(n, 4);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn repeat_rejects_distance_beyond_full() {
        let mut lz = LZDecoder::new(64, None);
        lz.set_limit(4);
        lz.put_byte(b'a');
        assert!(lz.repeat(5, 2).is_err());
    }

    #[test]
    fn repeat_copies_previous_bytes() {
        let mut lz = LZDecoder::new(64, None);
        lz.set_limit(8);
        for b in [b'a', b'b'] {
            lz.put_byte(b);
        }
        // dist=1 means "one byte back from the most recent" -> repeats "ab"
        lz.repeat(1, 4).unwrap();
        let mut out = [0u8; 6];
        let n = lz.flush(&mut out, 0);
        assert_eq!(n, 6);
        assert_eq!(&out, b"ababab");
    }

    /// Random valid (distance, length) pairs injected into a match stream
    /// (spec §8 "Property tests"): the dictionary's output must match a
    /// naive reference LZ77 interpreter working over a plain `Vec<u8>`.
    #[test]
    fn random_match_stream_matches_naive_lz77_interpreter() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xA5A5_5A5A);

        let mut lz = LZDecoder::new(1 << 20, None);
        lz.set_limit(1 << 16);
        let mut reference: Vec<u8> = Vec::new();

        for _ in 0..500 {
            let avail = lz.limit - lz.pos;
            if avail == 0 {
                break;
            }
            if reference.is_empty() || rng.gen_bool(0.3) {
                let b = rng.gen();
                lz.put_byte(b);
                reference.push(b);
            } else {
                let max_dist = reference.len().min((1 << 20) - 1);
                let dist = rng.gen_range(0..max_dist) as i32;
                let len = (rng.gen_range(1..=32usize)).min(avail) as u32;
                lz.repeat(dist, len).unwrap();
                for i in 0..len as usize {
                    let back = reference.len() - dist as usize - 1 + i;
                    let b = reference[back];
                    reference.push(b);
                }
            }
        }

        let mut out = vec![0u8; reference.len()];
        let n = lz.flush(&mut out, 0);
        assert_eq!(n, reference.len());
        assert_eq!(out, reference);
    }
}
