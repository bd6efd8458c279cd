//! The LZMA1 decode loop: literal/length/distance sub-coders plus the
//! per-symbol dispatch (spec §4.2, §4.3).

use crate::{
    get_dist_state, lz::LZDecoder, range_dec::RangeDecoder, ByteReader, LZMACoder, LengthCoder,
    LiteralCoder, LiteralSubCoder, Result, ALIGN_BITS, DIST_MODEL_END, DIST_MODEL_START,
    MATCH_LEN_MIN,
};

/// Owns every probability table and the dictionary-independent state needed
/// to decode an LZMA1 stream: the 12-state machine, rep distances, and the
/// literal/length/distance sub-coders (spec §3 data model).
///
/// Does not own the dictionary window ([`LZDecoder`]) or the range coder
/// ([`RangeDecoder`]) — both are threaded through `decode` so the same
/// decoder type serves standalone LZMA1 streams and LZMA2 chunks, which
/// reset/reuse those two independently of the probability tables (spec §4.4).
pub(crate) struct LZMADecoder {
    coder: LZMACoder,
    literal_coder: LiteralCoder,
    literal_probs: Vec<LiteralSubCoder>,
    match_len_coder: LengthCoder,
    rep_len_coder: LengthCoder,
    end_marker_detected: bool,
}

impl LZMADecoder {
    pub(crate) fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self {
            coder: LZMACoder::new(pb as usize),
            literal_coder: LiteralCoder::new(lc, lp),
            literal_probs: vec![LiteralSubCoder::new(); 1usize << (lc + lp)],
            match_len_coder: LengthCoder::new(),
            rep_len_coder: LengthCoder::new(),
            end_marker_detected: false,
        }
    }

    /// Full reset: rep distances, state machine, and every probability
    /// table (spec §3 "Lifecycles"; driven by LZMA2 control `0xA0+`, which
    /// reuses this decoder instance rather than constructing a new one).
    pub(crate) fn reset(&mut self) {
        self.coder.reset();
        for p in self.literal_probs.iter_mut() {
            p.reset();
        }
        self.match_len_coder.reset();
        self.rep_len_coder.reset();
        self.end_marker_detected = false;
    }

    /// Whether the last `decode` call consumed an end-of-payload marker
    /// (spec §6 `decoder.decode`; used by the standalone `.lzma` reader to
    /// tell a legitimate EOPM-terminated stream from truncation).
    pub(crate) fn end_marker_detected(&self) -> bool {
        self.end_marker_detected
    }

    /// Decodes symbols until `lz` has no more room for this call (its
    /// `set_limit` bound) or an EOPM is hit.
    pub(crate) fn decode<R: ByteReader>(
        &mut self,
        lz: &mut LZDecoder,
        rc: &mut RangeDecoder<R>,
    ) -> Result<()> {
        lz.repeat_pending()?;

        while lz.has_space() {
            let pos_state = lz.get_pos() as u32 & self.coder.pos_mask;
            let state = self.coder.state.get() as usize;

            if rc.decode_bit(&mut self.coder.is_match[state][pos_state as usize])? == 0 {
                self.decode_literal(lz, rc)?;
                continue;
            }

            let len = if rc.decode_bit(&mut self.coder.is_rep[state])? == 0 {
                // Normal match: decode length then distance slot/special/align.
                let len = Self::decode_length(&mut self.match_len_coder, rc, pos_state)?;
                let dist_state = get_dist_state(len);
                let dist = self.decode_distance(rc, dist_state)?;

                if dist == 0xFFFF_FFFF {
                    // End-of-payload marker (spec §4.2 "GLOSSARY: EOPM").
                    self.end_marker_detected = true;
                    return Ok(());
                }

                self.coder.reps[3] = self.coder.reps[2];
                self.coder.reps[2] = self.coder.reps[1];
                self.coder.reps[1] = self.coder.reps[0];
                self.coder.reps[0] = dist as i32;
                self.coder.state.update_match();
                len
            } else {
                // Rep match: select one of the four cached distances.
                if rc.decode_bit(&mut self.coder.is_rep0[state])? == 0 {
                    if rc.decode_bit(&mut self.coder.is_rep0_long[state][pos_state as usize])? == 0
                    {
                        self.coder.state.update_short_rep();
                        lz.repeat(self.coder.reps[0], 1)?;
                        continue;
                    }
                } else {
                    let dist;
                    if rc.decode_bit(&mut self.coder.is_rep1[state])? == 0 {
                        dist = self.coder.reps[1];
                        self.coder.reps[1] = self.coder.reps[0];
                    } else if rc.decode_bit(&mut self.coder.is_rep2[state])? == 0 {
                        dist = self.coder.reps[2];
                        self.coder.reps[2] = self.coder.reps[1];
                        self.coder.reps[1] = self.coder.reps[0];
                    } else {
                        dist = self.coder.reps[3];
                        self.coder.reps[3] = self.coder.reps[2];
                        self.coder.reps[2] = self.coder.reps[1];
                        self.coder.reps[1] = self.coder.reps[0];
                    }
                    self.coder.reps[0] = dist;
                }
                let len = Self::decode_length(&mut self.rep_len_coder, rc, pos_state)?;
                self.coder.state.update_long_rep();
                len
            };

            lz.repeat(self.coder.reps[0], len)?;
        }
        Ok(())
    }

    fn decode_literal<R: ByteReader>(
        &mut self,
        lz: &mut LZDecoder,
        rc: &mut RangeDecoder<R>,
    ) -> Result<()> {
        let pos = lz.get_pos() as u32;
        let prev_byte = if pos == 0 { 0u32 } else { lz.get_byte(0) as u32 };

        let index = self.literal_coder.get_sub_coder_index(prev_byte, pos) as usize;
        let probs = &mut self.literal_probs[index].probs;

        let symbol = if self.coder.state.is_literal() {
            let mut symbol = 1u32;
            while symbol < 0x100 {
                symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol as usize])?;
            }
            symbol
        } else {
            let match_byte = lz.get_byte(self.coder.reps[0] as usize) as u32;
            decode_matched_literal(rc, probs, match_byte)?
        };

        lz.put_byte(symbol as u8);
        self.coder.state.update_literal();
        Ok(())
    }

    fn decode_length<R: ByteReader>(
        coder: &mut LengthCoder,
        rc: &mut RangeDecoder<R>,
        pos_state: u32,
    ) -> Result<u32> {
        if rc.decode_bit(&mut coder.choice[0])? == 0 {
            return Ok(MATCH_LEN_MIN as u32 + rc.decode_bit_tree(&mut coder.low[pos_state as usize])?);
        }
        if rc.decode_bit(&mut coder.choice[1])? == 0 {
            return Ok(MATCH_LEN_MIN as u32 + 8 + rc.decode_bit_tree(&mut coder.mid[pos_state as usize])?);
        }
        Ok(MATCH_LEN_MIN as u32 + 16 + rc.decode_bit_tree(&mut coder.high)?)
    }

    /// Decodes a distance slot and its trailing bits, per spec §4.2
    /// "Distance sub-coder". Returns the raw decoded value, which may be
    /// `0xFFFF_FFFF` (EOPM) — validity against `full` is the caller's job.
    fn decode_distance<R: ByteReader>(&mut self, rc: &mut RangeDecoder<R>, dist_state: u32) -> Result<u32> {
        let slot = rc.decode_bit_tree(&mut self.coder.dist_slots[dist_state as usize])?;
        if (slot as usize) < DIST_MODEL_START {
            return Ok(slot);
        }

        let footer_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << footer_bits;

        if (slot as usize) < DIST_MODEL_END {
            let probs = self.coder.get_dist_special((slot as usize) - DIST_MODEL_START);
            Ok(base + rc.decode_reverse_bit_tree(probs)?)
        } else {
            let direct_bits = footer_bits - ALIGN_BITS;
            let high = rc.decode_direct_bits(direct_bits)?;
            let low = rc.decode_reverse_bit_tree(&mut self.coder.dist_align)?;
            Ok(base + (high << ALIGN_BITS) + low)
        }
    }
}

/// The "matched literal" path (spec §4.2): bits are coded against the
/// matched-byte tree until the decoded bit diverges from `match_byte`.
/// `offset` masks to zero the moment a bit disagrees, which folds the
/// remaining iterations onto `probs[symbol]` — the plain tree — without a
/// separate fallback branch.
fn decode_matched_literal<R: ByteReader>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    match_byte: u32,
) -> Result<u32> {
    let mut match_byte = match_byte;
    let mut symbol = 1u32;
    let mut offset = 0x100u32;

    while symbol < 0x100 {
        match_byte <<= 1;
        let match_bit = match_byte & offset;
        let bit = rc.decode_bit(&mut probs[(offset + match_bit + symbol) as usize])?;
        symbol = (symbol << 1) | bit;
        offset &= (0u32.wrapping_sub(bit)) ^ !match_bit;
    }
    Ok(symbol & 0xFF)
}

// Full encode/decode round-trip coverage lives in `tests/lzma.rs`, exercised
// through the public `LZMAReader`/`LZMAWriter` API rather than this
// module's internals.
