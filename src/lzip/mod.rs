//! lzip (`.lz`) container support: a thin CRC32 + size-trailer wrapper
//! around a raw LZMA1 stream with `lc=3, lp=0, pb=2` fixed (spec §4.6).
//!
//! A member is `"LZIP"` + version byte + dict-size byte, then the raw LZMA1
//! payload (no LZMA_Alone header, its own end marker instead), then a
//! 20-byte trailer: CRC32 of the uncompressed data, the uncompressed size,
//! and the member's total size on the wire. A file may concatenate several
//! members; readers transparently decode all of them back to back.

mod reader;
#[cfg(feature = "encoder")]
mod writer;

pub use reader::LZIPReader;
#[cfg(feature = "encoder")]
pub use writer::{AutoFinishLZIPWriter, LZIPWriter};

use crate::{ByteReader, Read, Result};

pub(crate) const LZIP_MAGIC: [u8; 4] = *b"LZIP";
pub(crate) const HEADER_SIZE: usize = 6;
/// Trailer size for version 1 members (CRC32 + data size + member size).
/// Version 0 members (obsolete, decode-only) omit the member-size field and
/// are 8 bytes shorter.
pub(crate) const TRAILER_SIZE: usize = 20;
pub(crate) const TRAILER_SIZE_V0: usize = 12;

pub(crate) const MIN_DICT_SIZE: u32 = 1 << 12;
pub(crate) const MAX_DICT_SIZE: u32 = 1 << 29;

fn crc(bytes: &[u8]) -> u32 {
    const TABLE: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    TABLE.checksum(bytes)
}

pub(crate) struct Crc32Digest(crc::Digest<'static, u32>);

impl Crc32Digest {
    pub(crate) fn new() -> Self {
        static TABLE: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        Self(TABLE.digest())
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub(crate) fn finalize(self) -> u32 {
        self.0.finalize()
    }
}

/// Decodes a dict-size byte into bytes (spec §4.6): 5 low bits are the
/// power-of-two exponent `b` (`2^b`), 3 high bits `f` subtract up to 7
/// sixteenths of that power: `size = 2^b - f * 2^(b-4)`.
pub(crate) fn decode_dict_size(byte: u8) -> u32 {
    let b = (byte & 0x1F) as u32;
    let f = ((byte >> 5) & 0x07) as u32;
    let base = 1u32 << b;
    if f == 0 {
        base
    } else {
        base - (base >> 4) * f
    }
}

/// Finds the smallest representable dict size `>= dict_size`, clamped to
/// lzip's `[4 KiB, 512 MiB]` range, and its byte encoding.
pub(crate) fn encode_dict_size(dict_size: u32) -> (u8, u32) {
    let dict_size = dict_size.clamp(MIN_DICT_SIZE, MAX_DICT_SIZE);
    for b in 12u32..=29 {
        for f in 0u32..=7 {
            let base = 1u32 << b;
            let candidate = if f == 0 { base } else { base - (base >> 4) * f };
            if candidate >= dict_size {
                return ((b | (f << 5)) as u8, candidate);
            }
        }
    }
    (29, 1 << 29)
}

pub(crate) struct LzipTrailer {
    pub(crate) crc32: u32,
    pub(crate) data_size: u64,
    /// `None` for a version-0 member, which never recorded its own size.
    pub(crate) member_size: Option<u64>,
}

impl LzipTrailer {
    pub(crate) fn parse<R: Read>(r: &mut R, version: u8) -> Result<Self> {
        let crc32 = r.read_u32()?;
        let data_size = r.read_u64()?;
        let member_size = if version >= 1 { Some(r.read_u64()?) } else { None };
        Ok(Self {
            crc32,
            data_size,
            member_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_dict_size_examples() {
        // Plain powers of two (f = 0).
        assert_eq!(decode_dict_size(12), 1 << 12);
        assert_eq!(decode_dict_size(20), 1 << 20);
        // f = 1: one sixteenth subtracted.
        let byte = 20 | (1 << 5);
        assert_eq!(decode_dict_size(byte), (1 << 20) - (1 << 16));
        // f = 7: seven sixteenths subtracted (lzip's minimum non-power-of-two shape).
        let byte = 21 | (7 << 5);
        assert_eq!(decode_dict_size(byte), (1 << 21) - 7 * (1 << 17));
    }

    #[test]
    fn encode_dict_size_round_trips_powers_of_two() {
        for b in 12u32..=25 {
            let (byte, size) = encode_dict_size(1 << b);
            assert_eq!(size, 1 << b);
            assert_eq!(decode_dict_size(byte), size);
        }
    }

    #[test]
    fn encode_dict_size_rounds_up_non_representable_sizes() {
        let (byte, size) = encode_dict_size((1 << 20) + 1);
        assert!(size >= (1 << 20) + 1);
        assert_eq!(decode_dict_size(byte), size);
    }

    #[test]
    fn encode_dict_size_clamps_to_lzip_bounds() {
        let (_, size) = encode_dict_size(1 << 10);
        assert_eq!(size, MIN_DICT_SIZE);
        let (_, size) = encode_dict_size(u32::MAX);
        assert_eq!(size, MAX_DICT_SIZE);
    }

    #[test]
    fn crc32_matches_known_vector() {
        assert_eq!(crc(b"123456789"), 0xCBF4_3926);
    }
}
