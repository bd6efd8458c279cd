//! The standalone `.lzma` (LZMA_Alone) reader and the raw-stream entry point
//! LZMA2 and lzip build on (spec §4.3 decoder contract, §4.6 LZMA_Alone).

use crate::{
    copy_error, decoder::LZMADecoder, error_invalid_data, error_invalid_input, error_unsupported,
    lz::LZDecoder, range_dec::RangeDecoder, ByteReader, Error, LZMAOptions, Read, Result,
};

/// Calculates the approximate memory usage in KiB for decoding with the
/// given `(dict_size, lc, lp)`. Mirrors the source project's
/// `get_memory_usage`, used as a sanity check before committing to a
/// caller-declared dictionary size.
pub fn get_memory_usage(dict_size: u32, lc: u32, lp: u32) -> Result<u32> {
    if lc > 8 || lp > 4 {
        return Err(error_invalid_input("lc must be <= 8 and lp must be <= 4"));
    }
    Ok(10 + round_dict_size(dict_size)? / 1024 + ((2 * 0x300) << (lc + lp)) / 1024)
}

/// Same as [`get_memory_usage`] but unpacks `lc`/`lp` from a property byte
/// (spec §3 "props = (pb·5 + lp)·9 + lc").
pub fn get_memory_usage_by_props(dict_size: u32, props: u8) -> Result<u32> {
    let (_pb, lp, lc) = unpack_props(props)?;
    get_memory_usage(dict_size, lc, lp)
}

fn unpack_props(props: u8) -> Result<(u32, u32, u32)> {
    if props as u32 > (4 * 5 + 4) * 9 + 8 {
        return Err(error_invalid_input("invalid LZMA properties byte"));
    }
    let pb = props as u32 / (9 * 5);
    let rest = props as u32 - pb * 9 * 5;
    let lp = rest / 9;
    let lc = rest - lp * 9;
    if lc + lp > 4 {
        return Err(error_invalid_input("lc + lp must be <= 4"));
    }
    Ok((pb, lp, lc))
}

fn round_dict_size(dict_size: u32) -> Result<u32> {
    if dict_size > LZMAOptions::DICT_SIZE_MAX {
        return Err(error_invalid_input("dict_size too large"));
    }
    let dict_size = dict_size.max(LZMAOptions::DICT_SIZE_MIN);
    Ok((dict_size + 15) & !15)
}

/// Validates the "picky" dictionary-size rule from the LZMA SDK's
/// LZMA_Alone encoder: a size must be exactly `2^n` or `2^n + 2^(n-1)`
/// (spec §9 "Open questions": taken verbatim from the reference, required
/// only for `picky` compatibility, not correctness).
fn is_picky_dict_size(dict_size: u32) -> bool {
    if dict_size == 0 {
        return false;
    }
    if dict_size.is_power_of_two() {
        return true;
    }
    for n in 1..32u32 {
        let base = 1u32.checked_shl(n);
        let Some(base) = base else { break };
        if let Some(half) = base.checked_shr(1) {
            if base.checked_add(half) == Some(dict_size) {
                return true;
            }
        }
    }
    false
}

/// Picky mode's size ceiling: `2^38` (spec §4.6, §9).
const PICKY_SIZE_MAX: u64 = 1 << 38;

/// A single-threaded LZMA1 decompressor.
///
/// Operates in one of two modes (spec §4.3): *standalone* (`allow_eopm =
/// true`, constructed via [`LZMAReader::new`]/[`new_picky`](Self::new_picky),
/// reading the 13-byte LZMA_Alone header first) or *raw* (`allow_eopm`
/// follows the caller's declared size, via
/// [`new_with_props`](Self::new_with_props)/[`new`](Self::new_raw)), used
/// directly by the lzip container adapter.
///
/// # Examples
/// ```
/// use std::io::Read;
///
/// use lzma_codec::LZMAReader;
///
/// let compressed: Vec<u8> = vec![
///     93, 0, 0, 128, 0, 255, 255, 255, 255, 255, 255, 255, 255, 0, 36, 25, 73, 152, 111, 22, 2,
///     140, 232, 230, 91, 177, 71, 198, 206, 183, 99, 255, 255, 60, 172, 0, 0,
/// ];
/// let mut reader = LZMAReader::new(compressed.as_slice(), None).unwrap();
/// let mut out = Vec::new();
/// reader.read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"Hello, world!");
/// ```
pub struct LZMAReader<R> {
    lz: LZDecoder,
    rc: RangeDecoder<R>,
    lzma: LZMADecoder,
    end_reached: bool,
    relaxed_end_cond: bool,
    remaining_size: u64,
    error: Option<Error>,
}

impl<R: Read> LZMAReader<R> {
    fn construct(
        reader: R,
        uncomp_size: u64,
        lc: u32,
        lp: u32,
        pb: u32,
        dict_size: u32,
        preset_dict: Option<&[u8]>,
    ) -> Result<Self> {
        if lc > 8 || lp > 4 || lc + lp > 4 || pb > 4 {
            return Err(error_invalid_input("invalid lc/lp/pb combination"));
        }
        let mut dict_size = round_dict_size(dict_size)?;
        if uncomp_size <= u64::MAX / 2 && (dict_size as u64) > uncomp_size {
            dict_size = round_dict_size(uncomp_size as u32)?;
        }
        let rc = RangeDecoder::new_stream(reader)?;
        let lz = LZDecoder::new(dict_size as usize, preset_dict);
        let lzma = LZMADecoder::new(lc, lp, pb);
        Ok(Self {
            lz,
            rc,
            lzma,
            end_reached: false,
            relaxed_end_cond: true,
            remaining_size: uncomp_size,
            error: None,
        })
    }

    /// Reads the 13-byte LZMA_Alone header (props, dict size, uncompressed
    /// size) and decodes the rest of `reader` as its payload (spec §4.6).
    /// `uncompressed_size == u64::MAX` in the header means "unknown",
    /// terminated by an EOPM instead of a byte count.
    pub fn new(mut reader: R, preset_dict: Option<&[u8]>) -> Result<Self> {
        let props = reader.read_u8()?;
        let dict_size = reader.read_u32()?;
        let uncomp_size = reader.read_u64()?;
        let (pb, lp, lc) = unpack_props(props)?;
        Self::construct(reader, uncomp_size, lc, lp, pb, dict_size, preset_dict)
    }

    /// As [`new`](Self::new), but additionally enforces the LZMA SDK's
    /// "picky" validation rules: the dict size must be `2^n` or
    /// `2^n + 2^(n-1)`, and a known uncompressed size must be `< 2^38`
    /// (spec §9).
    pub fn new_picky(mut reader: R, preset_dict: Option<&[u8]>) -> Result<Self> {
        let props = reader.read_u8()?;
        let dict_size = reader.read_u32()?;
        let uncomp_size = reader.read_u64()?;
        if !is_picky_dict_size(dict_size) {
            return Err(error_unsupported("dict_size fails picky validation"));
        }
        if uncomp_size != u64::MAX && uncomp_size >= PICKY_SIZE_MAX {
            return Err(error_unsupported("uncompressed_size exceeds picky limit (2^38)"));
        }
        let (pb, lp, lc) = unpack_props(props)?;
        Self::construct(reader, uncomp_size, lc, lp, pb, dict_size, preset_dict)
    }

    /// Decodes a raw LZMA1 stream with no LZMA_Alone header: `props` is the
    /// packed `(lc, lp, pb)` byte and `uncomp_size` is the caller-supplied
    /// size (`u64::MAX` for "unknown, terminated by EOPM"). Used by the
    /// lzip container adapter, whose own header carries these parameters in
    /// a different layout.
    pub fn new_with_props(
        reader: R,
        uncomp_size: u64,
        props: u8,
        dict_size: u32,
        preset_dict: Option<&[u8]>,
    ) -> Result<Self> {
        let (pb, lp, lc) = unpack_props(props)?;
        Self::construct(reader, uncomp_size, lc, lp, pb, dict_size, preset_dict)
    }

    /// As [`new_with_props`](Self::new_with_props), but with `lc`/`lp`/`pb`
    /// already split out.
    #[allow(clippy::too_many_arguments)]
    pub fn new_raw(
        reader: R,
        uncomp_size: u64,
        lc: u32,
        lp: u32,
        pb: u32,
        dict_size: u32,
        preset_dict: Option<&[u8]>,
    ) -> Result<Self> {
        Self::construct(reader, uncomp_size, lc, lp, pb, dict_size, preset_dict)
    }

    /// Hands back the underlying reader. Only meaningful once decoding has
    /// reached the end of the payload (spec §4.6 lzip: the reader positions
    /// exactly at the member's trailer, ready for the next read).
    pub(crate) fn into_inner(self) -> R {
        self.rc.into_inner()
    }

    fn read_decode(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(error) = &self.error {
            return Err(copy_error(error));
        }
        if self.end_reached {
            return Ok(0);
        }

        let mut size = 0u64;
        let mut len = buf.len() as u64;
        let mut off = 0u64;

        while len > 0 {
            let copy_size_max = if self.remaining_size <= u64::MAX / 2 {
                self.remaining_size.min(len)
            } else {
                len
            };
            self.lz.set_limit(copy_size_max as usize);

            match self.lzma.decode(&mut self.lz, &mut self.rc) {
                Ok(()) => {}
                Err(e) => return Err(e),
            }

            if self.lzma.end_marker_detected() {
                if self.remaining_size != u64::MAX {
                    return Err(error_invalid_data("EOPM with a known uncompressed size"));
                }
                self.end_reached = true;
                self.rc.normalize()?;
            }

            let copied = self.lz.flush(buf, off as usize) as u64;
            off += copied;
            len -= copied;
            size += copied;
            if self.remaining_size <= u64::MAX / 2 {
                self.remaining_size -= copied;
                if self.remaining_size == 0 {
                    self.end_reached = true;
                }
            }

            if self.end_reached {
                if self.lz.has_pending()
                    || (!self.relaxed_end_cond && !self.rc.is_stream_finished())
                {
                    return Err(error_invalid_data("stream ended with undecoded data pending"));
                }
                return Ok(size as usize);
            }
        }
        Ok(size as usize)
    }
}

impl<R: Read> Read for LZMAReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.read_decode(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                let latched = copy_error(&e);
                self.error = Some(latched);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picky_dict_size_accepts_power_of_two_and_one_and_a_half() {
        assert!(is_picky_dict_size(1 << 16));
        assert!(is_picky_dict_size((1 << 16) + (1 << 15)));
        assert!(!is_picky_dict_size((1 << 16) + 123));
    }

    #[test]
    fn unpack_props_rejects_lc_lp_overflow() {
        // pb=0, lp=4, lc=1 -> lc + lp == 5, invalid.
        let props = (0 * 5 + 4) * 9 + 1;
        assert!(unpack_props(props).is_err());
    }

    #[test]
    fn unpack_props_splits_default_triple() {
        // lc=3, lp=0, pb=2 (lzip's fixed triple).
        let props = (2 * 5 + 0) * 9 + 3;
        let (pb, lp, lc) = unpack_props(props).unwrap();
        assert_eq!((pb, lp, lc), (2, 0, 3));
    }
}
