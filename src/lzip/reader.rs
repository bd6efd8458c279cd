//! The single-threaded lzip (`.lz`) reader (spec §4.6).

use super::{decode_dict_size, Crc32Digest, LzipTrailer, HEADER_SIZE, LZIP_MAGIC, TRAILER_SIZE};
use crate::{
    error_eof, error_invalid_data, error_unsupported, ByteReader, CountingReader, LZIPOptions, LZMAReader, Read,
    Result,
};

enum MemberState<R> {
    BeforeHeader(R),
    InPayload(LZMAReader<CountingReader<R>>),
    Exhausted,
}

/// A single-threaded lzip decompressor.
///
/// Transparently decodes every member in a concatenated lzip file (spec §4.6
/// "a file may be the concatenation of several members"), validating each
/// member's CRC32, uncompressed size, and total wire size against its
/// trailer.
///
/// # Examples
/// ```
/// use std::io::{Read, Write};
///
/// use lzma_codec::{LZIPOptions, LZIPReader, LZIPWriter};
///
/// let mut compressed = Vec::new();
/// let mut w = LZIPWriter::new(&mut compressed, LZIPOptions::with_preset(1)).unwrap();
/// w.write_all(b"Hello, world!").unwrap();
/// w.finish().unwrap();
///
/// let mut r = LZIPReader::new(compressed.as_slice());
/// let mut out = Vec::new();
/// r.read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"Hello, world!");
/// ```
pub struct LZIPReader<R> {
    state: MemberState<R>,
    digest: Crc32Digest,
    uncompressed_in_member: u64,
    member_version: u8,
}

impl<R: Read> LZIPReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            state: MemberState::BeforeHeader(reader),
            digest: Crc32Digest::new(),
            uncompressed_in_member: 0,
            member_version: 1,
        }
    }

    fn try_read_magic(reader: &mut R) -> Result<Option<()>> {
        let mut magic = [0u8; 4];
        let mut filled = 0;
        while filled < magic.len() {
            let n = reader.read(&mut magic[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(error_eof("truncated lzip member header"));
            }
            filled += n;
        }
        if magic != LZIP_MAGIC {
            return Err(error_invalid_data("not an lzip stream (bad magic)"));
        }
        Ok(Some(()))
    }

    /// Starts the next member, or returns `Ok(false)` at a clean end of
    /// input (no partial header bytes pending).
    fn start_next_member(&mut self) -> Result<bool> {
        let mut reader = match std::mem::replace(&mut self.state, MemberState::Exhausted) {
            MemberState::BeforeHeader(r) => r,
            state @ (MemberState::InPayload(_) | MemberState::Exhausted) => {
                self.state = state;
                return Ok(false);
            }
        };

        if Self::try_read_magic(&mut reader)?.is_none() {
            self.state = MemberState::Exhausted;
            return Ok(false);
        }

        let version = reader.read_u8()?;
        if version != 0 && version != 1 {
            return Err(error_unsupported("unsupported lzip version"));
        }
        let dict_byte = reader.read_u8()?;
        let dict_size = decode_dict_size(dict_byte);

        let counting = CountingReader::new(reader);
        let lzma = LZMAReader::new_raw(
            counting,
            u64::MAX,
            LZIPOptions::LC,
            LZIPOptions::LP,
            LZIPOptions::PB,
            dict_size,
            None,
        )?;

        self.digest = Crc32Digest::new();
        self.uncompressed_in_member = 0;
        self.member_version = version;
        self.state = MemberState::InPayload(lzma);
        Ok(true)
    }

    fn finish_current_member(&mut self) -> Result<()> {
        let lzma = match std::mem::replace(&mut self.state, MemberState::Exhausted) {
            MemberState::InPayload(l) => l,
            state => {
                self.state = state;
                return Ok(());
            }
        };

        let counting = lzma.into_inner();
        let consumed = counting.bytes_read();
        let mut reader = counting.into_inner();

        let trailer = LzipTrailer::parse(&mut reader, self.member_version)?;
        let crc32 = std::mem::replace(&mut self.digest, Crc32Digest::new()).finalize();
        if trailer.crc32 != crc32 {
            return Err(error_invalid_data("lzip member CRC32 mismatch"));
        }
        if trailer.data_size != self.uncompressed_in_member {
            return Err(error_invalid_data("lzip member data size mismatch"));
        }
        if let Some(declared) = trailer.member_size {
            let trailer_size = if self.member_version >= 1 { TRAILER_SIZE } else { super::TRAILER_SIZE_V0 };
            let member_size = HEADER_SIZE as u64 + consumed + trailer_size as u64;
            if declared != member_size {
                return Err(error_invalid_data("lzip member size mismatch"));
            }
        }

        self.state = MemberState::BeforeHeader(reader);
        Ok(())
    }
}

impl<R: Read> Read for LZIPReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match &mut self.state {
                MemberState::Exhausted => return Ok(0),
                MemberState::BeforeHeader(_) => {
                    if !self.start_next_member()? {
                        return Ok(0);
                    }
                }
                MemberState::InPayload(lzma) => {
                    let n = lzma.read(buf)?;
                    if n == 0 {
                        self.finish_current_member()?;
                        continue;
                    }
                    self.digest.update(&buf[..n]);
                    self.uncompressed_in_member += n as u64;
                    return Ok(n);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let mut r = LZIPReader::new(&b"not lzip data at all"[..]);
        let mut out = Vec::new();
        assert!(r.read_to_end(&mut out).is_err());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let mut r = LZIPReader::new(&b""[..]);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    #[cfg(feature = "encoder")]
    fn decodes_concatenated_members() {
        use crate::{LZIPWriter, Write};
        let mut buf = Vec::new();
        {
            let mut w = LZIPWriter::new(&mut buf, LZIPOptions::with_preset(0)).unwrap();
            w.write_all(b"first member ").unwrap();
            w.finish().unwrap();
        }
        {
            let mut w = LZIPWriter::new(&mut buf, LZIPOptions::with_preset(0)).unwrap();
            w.write_all(b"second member").unwrap();
            w.finish().unwrap();
        }

        let mut r = LZIPReader::new(buf.as_slice());
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first member second member");
    }
}
