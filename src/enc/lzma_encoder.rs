//! The LZMA1 fast-mode encode loop: a greedy LZ77 parse (hash-chain match
//! finder, rep-distance preference) driving the literal/length/distance
//! sub-coders (spec §4.5 "Encoder", §9 redesign flag — optimal/normal-mode
//! parsing is out of scope, only the fast/greedy parse is implemented).

use crate::{
    enc::range_enc::{RangeEncoder, RangeEncoderBuffer},
    get_dist_state,
    lz::LZEncoder,
    ByteWriter, LZMACoder, LZMAOptions, LengthCoder, LiteralCoder, LiteralSubCoder, Result, Write,
    ALIGN_BITS, DIST_MODEL_END, DIST_MODEL_START, MATCH_LEN_MAX, MATCH_LEN_MIN,
};

/// A short match is only worth coding over a literal if it is either close
/// (small distance) or long; short, far matches cost more than they save.
/// Thresholds taken from the classic LZMA fast-mode heuristic (spec §9
/// redesign flag: the exact thresholds are a quality tuning knob, not part
/// of the wire contract).
const LEN2_DIST_LIMIT: i32 = 0x80;
const LEN3_DIST_LIMIT: i32 = 0x800;

/// Per-chunk uncompressed/compressed size bounds an LZMA2 encoder must stop
/// within (spec §4.4): 2 MiB minus one worst-case match's length, and 64 KiB
/// minus a safety margin for the handful of bytes a single symbol can still
/// add to the range coder's pending output once the limit is checked.
const LZMA2_UNCOMPRESSED_LIMIT: u32 = (1 << 21) - MATCH_LEN_MAX as u32;
const LZMA2_COMPRESSED_LIMIT: u32 = (1 << 16) - 26;

pub(crate) struct LZMAEncoder {
    lz: LZEncoder,
    coder: LZMACoder,
    literal_coder: LiteralCoder,
    literal_probs: Vec<LiteralSubCoder>,
    match_len_coder: LengthCoder,
    rep_len_coder: LengthCoder,
}

impl LZMAEncoder {
    pub(crate) fn get_memory_usage(options: &LZMAOptions) -> u32 {
        crate::lz::LZEncoder::get_memory_usage(
            options.dict_size,
            0,
            MATCH_LEN_MAX as u32,
            MATCH_LEN_MAX as u32,
            options.mf,
        ) + 10
    }

    pub(crate) fn new(options: &LZMAOptions) -> Self {
        let mut lz = LZEncoder::new_hc4(
            options.dict_size,
            0,
            MATCH_LEN_MAX as u32,
            options.nice_len,
            MATCH_LEN_MAX as u32,
            options.depth_limit,
        );
        if let Some(preset_dict) = &options.preset_dict {
            if !preset_dict.is_empty() {
                lz.set_preset_dict(options.dict_size, preset_dict);
            }
        }

        let lc = options.lc;
        let lp = options.lp;
        Self {
            lz,
            coder: LZMACoder::new(options.pb as usize),
            literal_coder: LiteralCoder::new(lc, lp),
            literal_probs: vec![LiteralSubCoder::new(); 1usize << (lc + lp)],
            match_len_coder: LengthCoder::new(),
            rep_len_coder: LengthCoder::new(),
        }
    }

    /// Feeds more uncompressed bytes into the match finder's window (spec
    /// §4.5 "fill_window").
    pub(crate) fn fill_window(&mut self, input: &[u8]) -> usize {
        self.lz.fill_window(input)
    }

    pub(crate) fn set_finishing(&mut self) {
        self.lz.set_finishing()
    }

    pub(crate) fn set_flushing(&mut self) {
        self.lz.set_flushing()
    }

    pub(crate) fn has_enough_data(&self, already_read_len: i32) -> bool {
        self.lz.has_enough_data(already_read_len)
    }

    /// Writes `len` raw bytes already sitting in the match finder's window
    /// straight to `out`, bypassing the range coder. Used by the LZMA2
    /// writer's uncompressed-chunk fallback (spec §4.4 control bytes
    /// `0x01`/`0x02`) when compressing a block failed to shrink it.
    pub(crate) fn copy_uncompressed<W: Write>(&self, out: &mut W, backward: i32, len: usize) -> Result<()> {
        self.lz.copy_uncompressed(out, backward, len)
    }

    /// Resets every probability table and the state machine (spec §3
    /// "Lifecycles"; LZMA2 control `0xA0+`/`0xC0+` drive this between
    /// chunks). Does not touch the match finder's window.
    pub(crate) fn reset(&mut self) {
        self.coder.reset();
        for p in self.literal_probs.iter_mut() {
            p.reset();
        }
        self.match_len_coder.reset();
        self.rep_len_coder.reset();
    }

    /// Greedily encodes symbols until the match finder has nothing left to
    /// offer for this call (spec §4.5). Returns the number of uncompressed
    /// bytes consumed.
    pub(crate) fn encode<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>) -> Result<u32> {
        let start_pos = self.lz.get_pos();
        while self.encode_symbol(rc)? {}
        Ok((self.lz.get_pos() - start_pos) as u32)
    }

    /// The match finder's current uncompressed-byte cursor, used by the
    /// LZMA2 writer to measure how much a chunk has grown since it began.
    pub(crate) fn get_pos(&self) -> i32 {
        self.lz.get_pos()
    }

    /// Encodes symbols into a buffered range coder until either LZMA2's
    /// per-chunk uncompressed/compressed size limits are reached (returns
    /// `Ok(true)`: caller should flush the chunk and start a new one) or the
    /// match finder runs out of data for this call (returns `Ok(false)`)
    /// (spec §4.4 "Chunk uncompressed size is bounded by 2^21 bytes").
    pub(crate) fn encode_for_lzma2(
        &mut self,
        rc: &mut RangeEncoder<RangeEncoderBuffer>,
        chunk_start_pos: i32,
    ) -> Result<bool> {
        while (self.lz.get_pos() - chunk_start_pos) as u32 <= LZMA2_UNCOMPRESSED_LIMIT
            && rc.get_pending_size() <= LZMA2_COMPRESSED_LIMIT
        {
            if !self.encode_symbol(rc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Encodes the LZMA1 end-of-payload marker: a normal match whose
    /// distance is `0xFFFF_FFFF` (spec §4.2 GLOSSARY "EOPM"). Used by the
    /// standalone `.lzma` writer when the uncompressed size was not known
    /// up front; LZMA2 chunks never use it (their own framing carries the
    /// size instead, spec §4.3 "allow_eopm = false" in chunk mode).
    pub(crate) fn encode_end_marker<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>) -> Result<()> {
        let state = self.coder.state.get() as usize;
        let pos_state = self.pos_state();
        rc.encode_bit(&mut self.coder.is_match[state][pos_state as usize], 1)?;
        rc.encode_bit(&mut self.coder.is_rep[state], 0)?;
        Self::encode_length(&mut self.match_len_coder, rc, pos_state, MATCH_LEN_MIN as u32)?;
        let dist_state = get_dist_state(MATCH_LEN_MIN as u32);
        self.encode_distance(rc, dist_state, 0xFFFF_FFFF)
    }

    /// Encodes exactly one symbol (literal, match, or rep match). Returns
    /// `false` once the match finder reports no more data for this call.
    fn encode_symbol<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>) -> Result<bool> {
        if !self.lz.has_enough_data(0) {
            return Ok(false);
        }

        self.lz.find_matches();
        if !self.lz.has_enough_data(0) {
            return Ok(false);
        }

        let avail = self.lz.get_avail().min(MATCH_LEN_MAX as i32);
        if avail < MATCH_LEN_MIN as i32 {
            self.encode_literal(rc)?;
            return Ok(true);
        }

        let (main_len, main_dist) = {
            let matches = self.lz.matches();
            if matches.count > 0 {
                let i = matches.count as usize - 1;
                (matches.len[i] as i32, matches.dist[i])
            } else {
                (0, 0)
            }
        };

        let mut rep_len = 0i32;
        let mut rep_index = 0usize;
        for (i, &dist) in self.coder.reps.iter().enumerate() {
            // A rep candidate is only valid once the window holds enough
            // history behind the current position (spec §3 "A decoded
            // distance d is legal iff full > d"); reps start at 0 and must
            // not be probed before the very first byte has been written.
            if dist < 0 || dist >= self.lz.get_pos() {
                continue;
            }
            let len = self.lz.get_match_len(dist, avail);
            if len as i32 > rep_len {
                rep_len = len as i32;
                rep_index = i;
            }
        }

        let mut use_rep = false;
        let mut use_match = false;

        if rep_len >= MATCH_LEN_MIN as i32 && (rep_len + 1 >= main_len || rep_len >= self.lz_nice_len()) {
            use_rep = true;
        } else if main_len >= MATCH_LEN_MIN as i32 {
            let worth_it = match main_len {
                2 => main_dist < LEN2_DIST_LIMIT,
                3 => main_dist < LEN3_DIST_LIMIT,
                _ => true,
            };
            if worth_it {
                use_match = true;
            }
        }

        if use_rep {
            self.encode_rep_match(rc, rep_index, rep_len as u32)?;
            if rep_len > 1 {
                self.lz.skip(rep_len as usize - 1);
            }
        } else if use_match {
            self.encode_match(rc, main_dist, main_len as u32)?;
            if main_len > 1 {
                self.lz.skip(main_len as usize - 1);
            }
        } else {
            self.encode_literal(rc)?;
        }

        Ok(true)
    }

    fn lz_nice_len(&self) -> i32 {
        self.lz.nice_len as i32
    }

    fn pos_state(&self) -> u32 {
        self.lz.get_pos() as u32 & self.coder.pos_mask
    }

    fn encode_literal<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>) -> Result<()> {
        let pos = self.lz.get_pos() as u32;
        let prev_byte = if pos == 0 { 0u32 } else { self.lz.get_byte(0, 1) as u32 };
        let cur_byte = self.lz.get_byte(0, 0);

        let state = self.coder.state.get() as usize;
        let pos_state = self.pos_state();
        rc.encode_bit(&mut self.coder.is_match[state][pos_state as usize], 0)?;

        let index = self.literal_coder.get_sub_coder_index(prev_byte, pos) as usize;
        let probs = &mut self.literal_probs[index].probs;

        if self.coder.state.is_literal() {
            let mut context = 1u32;
            for i in (0..8).rev() {
                let bit = ((cur_byte >> i) & 1) as u32;
                rc.encode_bit(&mut probs[context as usize], bit)?;
                context = (context << 1) | bit;
            }
        } else {
            let match_byte = self.lz.get_byte(0, (self.coder.reps[0] + 1) as i32) as u32;
            encode_matched_literal(rc, probs, match_byte, cur_byte as u32)?;
        }

        self.coder.state.update_literal();
        Ok(())
    }

    fn encode_match<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>, dist: i32, len: u32) -> Result<()> {
        let state = self.coder.state.get() as usize;
        let pos_state = self.pos_state();
        rc.encode_bit(&mut self.coder.is_match[state][pos_state as usize], 1)?;
        rc.encode_bit(&mut self.coder.is_rep[state], 0)?;

        self.coder.reps[3] = self.coder.reps[2];
        self.coder.reps[2] = self.coder.reps[1];
        self.coder.reps[1] = self.coder.reps[0];
        self.coder.reps[0] = dist;
        self.coder.state.update_match();

        Self::encode_length(&mut self.match_len_coder, rc, pos_state, len)?;

        let dist_state = get_dist_state(len);
        self.encode_distance(rc, dist_state, dist as u32)
    }

    fn encode_rep_match<W: ByteWriter>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        rep_index: usize,
        len: u32,
    ) -> Result<()> {
        let state = self.coder.state.get() as usize;
        let pos_state = self.pos_state();
        rc.encode_bit(&mut self.coder.is_match[state][pos_state as usize], 1)?;
        rc.encode_bit(&mut self.coder.is_rep[state], 1)?;

        if rep_index == 0 {
            rc.encode_bit(&mut self.coder.is_rep0[state], 0)?;
            if len == 1 {
                rc.encode_bit(&mut self.coder.is_rep0_long[state][pos_state as usize], 0)?;
                self.coder.state.update_short_rep();
                return Ok(());
            }
            rc.encode_bit(&mut self.coder.is_rep0_long[state][pos_state as usize], 1)?;
        } else {
            rc.encode_bit(&mut self.coder.is_rep0[state], 1)?;
            let dist = self.coder.reps[rep_index];
            if rep_index == 1 {
                rc.encode_bit(&mut self.coder.is_rep1[state], 0)?;
            } else {
                rc.encode_bit(&mut self.coder.is_rep1[state], 1)?;
                if rep_index == 2 {
                    rc.encode_bit(&mut self.coder.is_rep2[state], 0)?;
                } else {
                    rc.encode_bit(&mut self.coder.is_rep2[state], 1)?;
                    self.coder.reps[3] = self.coder.reps[2];
                }
                self.coder.reps[2] = self.coder.reps[1];
            }
            self.coder.reps[1] = self.coder.reps[0];
            self.coder.reps[0] = dist;
        }

        self.coder.state.update_long_rep();
        Self::encode_length(&mut self.rep_len_coder, rc, pos_state, len)
    }

    fn encode_length<W: ByteWriter>(
        coder: &mut LengthCoder,
        rc: &mut RangeEncoder<W>,
        pos_state: u32,
        len: u32,
    ) -> Result<()> {
        let len = len - MATCH_LEN_MIN as u32;
        if len < 8 {
            rc.encode_bit(&mut coder.choice[0], 0)?;
            rc.encode_bit_tree(&mut coder.low[pos_state as usize], len)
        } else if len < 16 {
            rc.encode_bit(&mut coder.choice[0], 1)?;
            rc.encode_bit(&mut coder.choice[1], 0)?;
            rc.encode_bit_tree(&mut coder.mid[pos_state as usize], len - 8)
        } else {
            rc.encode_bit(&mut coder.choice[0], 1)?;
            rc.encode_bit(&mut coder.choice[1], 1)?;
            rc.encode_bit_tree(&mut coder.high, len - 16)
        }
    }

    fn encode_distance<W: ByteWriter>(&mut self, rc: &mut RangeEncoder<W>, dist_state: u32, dist: u32) -> Result<()> {
        let slot = get_dist_slot(dist);
        rc.encode_bit_tree(&mut self.coder.dist_slots[dist_state as usize], slot)?;

        if (slot as usize) < DIST_MODEL_START {
            return Ok(());
        }

        let footer_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << footer_bits;
        let rest = dist - base;

        if (slot as usize) < DIST_MODEL_END {
            let probs = self.coder.get_dist_special((slot as usize) - DIST_MODEL_START);
            rc.encode_reverse_bit_tree(probs, rest)
        } else {
            let direct_bits = footer_bits - ALIGN_BITS;
            rc.encode_direct_bits(rest >> ALIGN_BITS, direct_bits)?;
            rc.encode_reverse_bit_tree(&mut self.coder.dist_align, rest & crate::ALIGN_MASK)
        }
    }
}

/// The inverse of `decode_matched_literal` (spec §4.2): each bit is coded
/// against the matched-byte tree until it diverges from `match_byte`, after
/// which the `offset` mask collapses to zero and every remaining bit is
/// coded against `probs[symbol]` — the plain tree — with no separate branch.
fn encode_matched_literal<W: ByteWriter>(
    rc: &mut RangeEncoder<W>,
    probs: &mut [u16],
    match_byte: u32,
    symbol: u32,
) -> Result<()> {
    let mut match_byte = match_byte;
    let mut offset = 0x100u32;
    let mut context = 1u32;

    for i in (0..8).rev() {
        let bit = (symbol >> i) & 1;
        match_byte <<= 1;
        let match_bit = match_byte & offset;
        rc.encode_bit(&mut probs[(offset + match_bit + context) as usize], bit)?;
        context = (context << 1) | bit;
        offset &= (0u32.wrapping_sub(bit)) ^ !match_bit;
    }
    Ok(())
}

/// The inverse of distance-slot decoding: maps a full distance value to its
/// 6-bit slot (spec §4.2 "Distance sub-coder"). Slots `0..4` are the
/// distance itself; beyond that, the slot encodes the top two bits plus the
/// bit-length of the remainder.
fn get_dist_slot(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }
    let n = 31 - dist.leading_zeros();
    (n << 1) | ((dist >> (n - 1)) & 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist_slot_matches_low_raw_range() {
        for d in 0..4 {
            assert_eq!(get_dist_slot(d), d);
        }
    }

    #[test]
    fn dist_slot_roundtrips_through_base_plus_footer() {
        for &dist in &[4u32, 5, 6, 7, 8, 1000, 1 << 20, u32::MAX] {
            let slot = get_dist_slot(dist);
            if slot < 4 {
                continue;
            }
            let footer_bits = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << footer_bits;
            assert!(dist >= base, "dist={dist} slot={slot} base={base}");
            assert!(dist < base + (1 << footer_bits));
        }
    }
}
