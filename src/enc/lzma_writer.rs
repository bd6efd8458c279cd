//! The standalone `.lzma` (LZMA_Alone) writer and the raw-stream entry point
//! LZMA2 and lzip build on (spec §4.3 encoder contract, §4.6 LZMA_Alone).

use crate::{
    enc::{lzma_encoder::LZMAEncoder, range_enc::RangeEncoder},
    error_invalid_input, ByteWriter, LZMAOptions, Result, Write,
};

/// A single-threaded LZMA1 compressor.
///
/// Operates in one of two modes (spec §4.3): *standalone* (writes the
/// 13-byte LZMA_Alone header first, via
/// [`new_use_header`](Self::new_use_header)) or *raw* (via
/// [`new_no_header`](Self::new_no_header)), used directly by the lzip
/// container adapter. Either mode can end with an end-of-payload marker
/// (spec's EOPM) instead of, or in addition to, a caller-tracked byte count.
///
/// # Examples
/// ```
/// use std::io::Write;
///
/// use lzma_codec::{LZMAOptions, LZMAWriter};
///
/// let mut out = Vec::new();
/// let mut w = LZMAWriter::new_use_header(&mut out, &LZMAOptions::with_preset(1), Some(13)).unwrap();
/// w.write_all(b"Hello, world!").unwrap();
/// w.finish().unwrap();
/// assert!(!out.is_empty());
/// ```
pub struct LZMAWriter<W> {
    lzma: LZMAEncoder,
    rc: RangeEncoder<W>,
    use_end_marker: bool,
    expected_uncompressed_size: Option<u64>,
    current_uncompressed_size: u64,
    props: u8,
    dict_size: u32,
    finished: bool,
}

impl<W: Write> LZMAWriter<W> {
    #[allow(clippy::too_many_arguments)]
    fn construct(
        mut out: W,
        options: &LZMAOptions,
        use_header: bool,
        use_end_marker: bool,
        expected_uncompressed_size: Option<u64>,
    ) -> Result<Self> {
        if expected_uncompressed_size.is_none() && !use_end_marker {
            return Err(error_invalid_input(
                "use_end_marker must be true when the uncompressed size is not known up front",
            ));
        }
        let props = options.get_props();
        if use_header {
            out.write_u8(props)?;
            out.write_u32(options.dict_size)?;
            out.write_u64(expected_uncompressed_size.unwrap_or(u64::MAX))?;
        }
        let lzma = LZMAEncoder::new(options);
        let rc = RangeEncoder::new(out);
        Ok(Self {
            lzma,
            rc,
            use_end_marker,
            expected_uncompressed_size,
            current_uncompressed_size: 0,
            props,
            dict_size: options.dict_size,
            finished: false,
        })
    }

    /// Writes the LZMA_Alone header (props, dict size, uncompressed size)
    /// before the payload (spec §4.6). `expected_uncompressed_size` of
    /// `None` writes `u64::MAX` ("unknown") and requires an end marker.
    pub fn new_use_header(out: W, options: &LZMAOptions, expected_uncompressed_size: Option<u64>) -> Result<Self> {
        Self::construct(
            out,
            options,
            true,
            expected_uncompressed_size.is_none(),
            expected_uncompressed_size,
        )
    }

    /// Writes a raw LZMA1 stream with no LZMA_Alone header. Used by the lzip
    /// container adapter, whose own header carries `(lc, lp, pb, dict_size)`
    /// in a different layout.
    pub fn new_no_header(
        out: W,
        options: &LZMAOptions,
        use_end_marker: bool,
        expected_uncompressed_size: Option<u64>,
    ) -> Result<Self> {
        Self::construct(out, options, false, use_end_marker, expected_uncompressed_size)
    }

    /// The packed `(lc, lp, pb)` property byte written (or that would be
    /// written) in the header.
    pub fn props(&self) -> u8 {
        self.props
    }

    pub fn dict_size(&self) -> u32 {
        self.dict_size
    }

    fn encode_all_pending(&mut self) -> Result<()> {
        loop {
            let n = self.lzma.encode(&mut self.rc)?;
            if n == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Flushes the remaining window through the encoder, optionally writes
    /// the end marker, and flushes the range coder's five pending bytes.
    /// Returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if !self.finished {
            self.lzma.set_finishing();
            self.encode_all_pending()?;
            if self.use_end_marker {
                self.lzma.encode_end_marker(&mut self.rc)?;
            }
            self.rc.finish()?;
            self.finished = true;
        }
        Ok(self.rc.into_inner())
    }
}

impl<W: Write> Write for LZMAWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(expected) = self.expected_uncompressed_size {
            if self.current_uncompressed_size + buf.len() as u64 > expected {
                return Err(error_invalid_input("wrote more than the declared uncompressed size"));
            }
        }
        let mut total = 0;
        while total < buf.len() {
            let n = self.lzma.fill_window(&buf[total..]);
            if n == 0 {
                break;
            }
            self.encode_all_pending()?;
            total += n;
        }
        self.current_uncompressed_size += total as u64;
        Ok(total)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LZMAReader;

    #[test]
    fn header_roundtrips_through_reader() {
        let mut out = Vec::new();
        let data = b"the quick brown fox jumps over the lazy dog, again and again and again";
        let mut w = LZMAWriter::new_use_header(&mut out, &LZMAOptions::with_preset(1), Some(data.len() as u64))
            .unwrap();
        w.write_all(data).unwrap();
        w.finish().unwrap();

        let mut r = LZMAReader::new(out.as_slice(), None).unwrap();
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn end_marker_roundtrips_with_unknown_size() {
        let mut out = Vec::new();
        let data = b"abcabcabcabcabcabcabc";
        let mut w = LZMAWriter::new_use_header(&mut out, &LZMAOptions::with_preset(0), None).unwrap();
        w.write_all(data).unwrap();
        w.finish().unwrap();

        let mut r = LZMAReader::new(out.as_slice(), None).unwrap();
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rejects_writes_past_declared_size() {
        let mut out = Vec::new();
        let mut w = LZMAWriter::new_use_header(&mut out, &LZMAOptions::with_preset(0), Some(2)).unwrap();
        assert!(w.write_all(b"abc").is_err());
    }

    #[test]
    fn no_header_mode_requires_end_marker_or_known_size() {
        let mut out = Vec::new();
        let err = LZMAWriter::new_no_header(&mut out, &LZMAOptions::with_preset(0), false, None);
        assert!(err.is_err());
    }
}
