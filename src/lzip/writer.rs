//! The single-threaded lzip (`.lz`) writer (spec §4.6).

use super::{encode_dict_size, Crc32Digest, HEADER_SIZE, LZIP_MAGIC, TRAILER_SIZE};
use crate::{ByteWriter, CountingWriter, LZIPOptions, LZMAOptions, LZMAWriter, MFType, Result, Write};

/// A single-threaded lzip compressor. Writes exactly one member per
/// instance; concatenate the output of several instances to build a
/// multi-member file (spec §4.6).
///
/// # Examples
/// ```
/// use std::io::Write;
///
/// use lzma_codec::{LZIPOptions, LZIPWriter};
///
/// let mut out = Vec::new();
/// let mut w = LZIPWriter::new(&mut out, LZIPOptions::with_preset(1)).unwrap();
/// w.write_all(b"Hello, world!").unwrap();
/// w.finish().unwrap();
/// assert_eq!(&out[..4], b"LZIP");
/// ```
pub struct LZIPWriter<W> {
    lzma: LZMAWriter<CountingWriter<W>>,
    digest: Crc32Digest,
    uncompressed_size: u64,
}

impl<W: Write> LZIPWriter<W> {
    /// Writes the 6-byte member header and prepares the LZMA1 payload
    /// encoder. Always writes a version-1 member (`lc=3, lp=0, pb=2`,
    /// member-size trailer field present), regardless of
    /// `options.version` — that field only governs what [`LZIPReader`]
    /// accepts on read.
    ///
    /// [`LZIPReader`]: super::LZIPReader
    pub fn new(mut out: W, options: LZIPOptions) -> Result<Self> {
        let (dict_byte, dict_size) = encode_dict_size(options.dict_size);
        out.write_all(&LZIP_MAGIC)?;
        out.write_u8(1)?;
        out.write_u8(dict_byte)?;

        let lzma_options = LZMAOptions {
            dict_size,
            lc: LZIPOptions::LC,
            lp: LZIPOptions::LP,
            pb: LZIPOptions::PB,
            nice_len: options.nice_len,
            mf: MFType::HC4,
            depth_limit: options.depth_limit,
            preset_dict: options.preset_dict,
        };
        let counting = CountingWriter::new(out);
        let lzma = LZMAWriter::new_no_header(counting, &lzma_options, true, None)?;

        Ok(Self {
            lzma,
            digest: Crc32Digest::new(),
            uncompressed_size: 0,
        })
    }

    /// Flushes the LZMA1 payload (with its end marker), appends the CRC32 +
    /// size trailer, and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        let counting = self.lzma.finish()?;
        let compressed_len = counting.bytes_written();
        let mut out = counting.into_inner();

        out.write_u32(self.digest.finalize())?;
        out.write_u64(self.uncompressed_size)?;
        let member_size = HEADER_SIZE as u64 + compressed_len + TRAILER_SIZE as u64;
        out.write_u64(member_size)?;
        Ok(out)
    }
}

impl<W: Write> Write for LZIPWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.lzma.write(buf)?;
        self.digest.update(&buf[..n]);
        self.uncompressed_size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Wraps a [`LZIPWriter`], calling [`finish`](LZIPWriter::finish) on drop if
/// the caller never did so explicitly. Errors from that implicit finish are
/// silently discarded (there is nowhere to report them from a `Drop` impl);
/// callers that care about encode errors should call `finish` themselves.
pub struct AutoFinishLZIPWriter<W: Write> {
    inner: Option<LZIPWriter<W>>,
}

impl<W: Write> AutoFinishLZIPWriter<W> {
    pub fn new(writer: LZIPWriter<W>) -> Self {
        Self { inner: Some(writer) }
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.take().expect("finish called twice").finish()
    }
}

impl<W: Write> Write for AutoFinishLZIPWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.as_mut().expect("write after finish").write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.as_mut().expect("flush after finish").flush()
    }
}

impl<W: Write> Drop for AutoFinishLZIPWriter<W> {
    fn drop(&mut self) {
        if let Some(writer) = self.inner.take() {
            let _ = writer.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LZIPReader;

    #[test]
    fn header_has_lzip_magic_and_version_one() {
        let mut out = Vec::new();
        let w = LZIPWriter::new(&mut out, LZIPOptions::with_preset(0)).unwrap();
        w.finish().unwrap();
        assert_eq!(&out[..4], b"LZIP");
        assert_eq!(out[4], 1);
    }

    #[test]
    fn roundtrips_through_reader() {
        let mut out = Vec::new();
        let mut w = LZIPWriter::new(&mut out, LZIPOptions::with_preset(2)).unwrap();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        w.write_all(&data).unwrap();
        w.finish().unwrap();

        let mut r = LZIPReader::new(out.as_slice());
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn auto_finish_writer_appends_trailer_on_drop() {
        let mut out = Vec::new();
        {
            let w = LZIPWriter::new(&mut out, LZIPOptions::with_preset(0)).unwrap();
            let mut w = AutoFinishLZIPWriter::new(w);
            w.write_all(b"dropped without calling finish").unwrap();
        }
        let mut r = LZIPReader::new(out.as_slice());
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, b"dropped without calling finish");
    }
}
