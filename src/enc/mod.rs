//! Encoder-side modules: the fast-mode LZMA1 parser, the binary range
//! encoder, and the single-threaded LZMA1/LZMA2 stream writers built on top
//! of them (spec §4.1, §4.3, §4.4, §4.5).

pub(crate) mod lzma_encoder;
mod lzma2_writer;
mod lzma_writer;
pub(crate) mod range_enc;

pub use lzma2_writer::LZMA2Writer;
pub use lzma_writer::LZMAWriter;
