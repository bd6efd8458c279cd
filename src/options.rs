//! Encoder/container configuration surface (spec §3/§4.6, SPEC_FULL §2).
//!
//! None of this is part of the bit-exact wire contract; it is the ergonomic
//! layer a caller uses to arrive at a legal `(lc, lp, pb, dict_size, ...)`
//! combination, modeled on the preset ladder the project this crate is
//! based on exposes (`with_preset`, levels 0..9).

use std::ops::{Deref, DerefMut};

use crate::{error_invalid_input, Result};

/// Match finder selection for the LZ77 search (spec §4.5, §9 redesign flag).
///
/// The source carries multiple match-finder variants (hash-chain and
/// binary-tree) behind one enum. Optimal parsing (the only consumer of the
/// binary-tree finder) is out of scope here, so only the hash-chain finder
/// remains; the variant stays so the option struct's shape does not need to
/// change if a second finder is ever added back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MFType {
    #[default]
    HC4,
}

/// Encoder settings for a raw LZMA1 stream (spec §4.3, §6 `create_encoder`).
#[derive(Debug, Clone)]
pub struct LZMAOptions {
    pub dict_size: u32,
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    pub nice_len: u32,
    pub mf: MFType,
    pub depth_limit: i32,
    pub preset_dict: Option<Vec<u8>>,
}

impl Default for LZMAOptions {
    fn default() -> Self {
        Self::with_preset(6)
    }
}

impl LZMAOptions {
    pub const LC_DEFAULT: u32 = 3;
    pub const LP_DEFAULT: u32 = 0;
    pub const PB_DEFAULT: u32 = 2;

    pub const NICE_LEN_MIN: u32 = 8;
    pub const NICE_LEN_MAX: u32 = 273;

    pub const DICT_SIZE_MIN: u32 = 4096;
    /// 4 GiB − 1 (spec §3: `dict_size ∈ [4 KiB, 4 GiB−1]`).
    pub const DICT_SIZE_MAX: u32 = u32::MAX;
    pub const DICT_SIZE_DEFAULT: u32 = 8 << 20;

    const PRESET_TO_DICT_SIZE: [u32; 10] = [
        1 << 18,
        1 << 20,
        1 << 21,
        1 << 22,
        1 << 22,
        1 << 23,
        1 << 23,
        1 << 24,
        1 << 25,
        1 << 26,
    ];

    const PRESET_TO_NICE_LEN: [u32; 10] = [128, 128, 192, 256, 273, 273, 273, 273, 273, 273];
    const PRESET_TO_DEPTH_LIMIT: [i32; 10] = [4, 8, 12, 16, 24, 32, 40, 48, 56, 64];

    /// Validated manual construction (spec §3 parameter triple + dict size
    /// invariants). Returns [`InvalidProperties`](crate)/`InvalidDictSize`
    /// style `io::Error`s on an illegal combination.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dict_size: u32,
        lc: u32,
        lp: u32,
        pb: u32,
        nice_len: u32,
        mf: MFType,
        depth_limit: i32,
    ) -> Result<Self> {
        if lc > 8 || lp > 4 || lc + lp > 4 {
            return Err(error_invalid_input("lc + lp must be <= 4"));
        }
        if pb > 4 {
            return Err(error_invalid_input("pb must be <= 4"));
        }
        if !(Self::DICT_SIZE_MIN..=Self::DICT_SIZE_MAX).contains(&dict_size) {
            return Err(error_invalid_input("dict_size out of range"));
        }
        if !(Self::NICE_LEN_MIN..=Self::NICE_LEN_MAX).contains(&nice_len) {
            return Err(error_invalid_input("nice_len out of range"));
        }
        Ok(Self {
            dict_size,
            lc,
            lp,
            pb,
            nice_len,
            mf,
            depth_limit,
            preset_dict: None,
        })
    }

    /// `preset` is clamped to `[0, 9]`. All presets select the hash-chain
    /// finder and fast-mode greedy parsing (spec's Non-goals exclude
    /// optimal/normal-mode parsing).
    pub fn with_preset(preset: u32) -> Self {
        let preset = preset.min(9) as usize;
        Self {
            dict_size: Self::PRESET_TO_DICT_SIZE[preset],
            lc: Self::LC_DEFAULT,
            lp: Self::LP_DEFAULT,
            pb: Self::PB_DEFAULT,
            nice_len: Self::PRESET_TO_NICE_LEN[preset],
            mf: MFType::HC4,
            depth_limit: Self::PRESET_TO_DEPTH_LIMIT[preset],
            preset_dict: None,
        }
    }

    pub fn with_preset_dict(mut self, preset_dict: Vec<u8>) -> Self {
        self.preset_dict = Some(preset_dict);
        self
    }

    /// Packs `(lc, lp, pb)` into the single property byte (spec §3).
    pub fn get_props(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }
}

/// Encoder settings for an LZMA2 chunked stream.
///
/// Identical shape to [`LZMAOptions`]: LZMA2 frames the same LZMA1 codec
/// into resettable chunks, so every per-chunk parameter is an LZMA1
/// parameter. Kept as its own type (rather than reusing `LZMAOptions`
/// directly) so the two wire formats have distinct, non-interchangeable
/// option types at the API boundary.
#[derive(Debug, Clone)]
pub struct LZMA2Options(pub LZMAOptions);

impl Deref for LZMA2Options {
    type Target = LZMAOptions;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for LZMA2Options {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Default for LZMA2Options {
    fn default() -> Self {
        Self(LZMAOptions::default())
    }
}

impl LZMA2Options {
    /// Upper bound on a single LZMA2 chunk's uncompressed size (spec §4.4):
    /// 5 control-byte bits plus a 16-bit field, i.e. `2^21` bytes.
    pub const UNCOMPRESSED_SIZE_MAX: u32 = 1 << 21;
    /// Upper bound on a single LZMA2 chunk's compressed size: a 16-bit
    /// field, i.e. `2^16` bytes.
    pub const COMPRESSED_SIZE_MAX: u32 = 1 << 16;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dict_size: u32,
        lc: u32,
        lp: u32,
        pb: u32,
        nice_len: u32,
        mf: MFType,
        depth_limit: i32,
    ) -> Result<Self> {
        Ok(Self(LZMAOptions::new(
            dict_size,
            lc,
            lp,
            pb,
            nice_len,
            mf,
            depth_limit,
        )?))
    }

    pub fn with_preset(preset: u32) -> Self {
        Self(LZMAOptions::with_preset(preset))
    }

    pub fn with_preset_dict(mut self, preset_dict: Vec<u8>) -> Self {
        self.0.preset_dict = Some(preset_dict);
        self
    }
}

/// lzip (`.lz`) container settings (spec §4.6).
///
/// `lc`/`lp`/`pb` are not configurable: the lzip format fixes them at
/// `(3, 0, 2)`.
#[derive(Debug, Clone)]
pub struct LZIPOptions {
    pub dict_size: u32,
    pub nice_len: u32,
    pub depth_limit: i32,
    pub preset_dict: Option<Vec<u8>>,
    /// lzip member format version written to the header. Version 1 adds
    /// the member-size trailer field; version 0 omits it. Only version 1
    /// is written by this crate's encoder, but both are accepted on read.
    pub version: u8,
}

impl LZIPOptions {
    pub const LC: u32 = 3;
    pub const LP: u32 = 0;
    pub const PB: u32 = 2;

    pub fn with_preset(preset: u32) -> Self {
        let lzma = LZMAOptions::with_preset(preset);
        Self {
            dict_size: lzma.dict_size,
            nice_len: lzma.nice_len,
            depth_limit: lzma.depth_limit,
            preset_dict: None,
            version: 1,
        }
    }
}

impl Default for LZIPOptions {
    fn default() -> Self {
        Self::with_preset(6)
    }
}
