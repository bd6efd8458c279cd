use std::io::{Read, Write};

use lzma_codec::{LZIPOptions, LZIPReader, LZIPWriter, LZMA2Options, LZMA2Reader, LZMA2Writer, LZMAOptions, LZMAReader, LZMAWriter};

const PARAGRAPHS: &str = include_str!("data/sample.txt");

fn sample(repeat: usize) -> String {
    PARAGRAPHS.repeat(repeat)
}

fn round_trip_lzma1(text: &str, level: u32) {
    let options = LZMAOptions::with_preset(level);

    let mut compressed = Vec::new();
    {
        let mut writer = LZMAWriter::new_use_header(&mut compressed, &options, Some(text.len() as u64)).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    let mut decoded = Vec::new();
    {
        let mut reader = LZMAReader::new(compressed.as_slice(), None).unwrap();
        reader.read_to_end(&mut decoded).unwrap();
    }

    assert!(decoded == text.as_bytes());
}

fn round_trip_lzma2(text: &str, level: u32) {
    let options = LZMA2Options::with_preset(level);
    let dict_size = options.dict_size;

    let mut compressed = Vec::new();
    {
        let mut writer = LZMA2Writer::new(&mut compressed, options).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    let mut decoded = Vec::new();
    {
        let mut reader = LZMA2Reader::new(compressed.as_slice(), dict_size, None);
        reader.read_to_end(&mut decoded).unwrap();
    }

    assert!(decoded == text.as_bytes());
}

fn round_trip_lzip(text: &str, level: u32) {
    let options = LZIPOptions::with_preset(level);

    let mut compressed = Vec::new();
    {
        let mut writer = LZIPWriter::new(&mut compressed, options).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    let mut decoded = Vec::new();
    {
        let mut reader = LZIPReader::new(compressed.as_slice());
        reader.read_to_end(&mut decoded).unwrap();
    }

    assert!(decoded == text.as_bytes());
}

macro_rules! level_tests {
    ($name:ident, $func:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn level_0() {
                $func(&sample(1), 0);
            }

            #[test]
            fn level_1() {
                $func(&sample(3), 1);
            }

            #[test]
            fn level_6() {
                $func(&sample(8), 6);
            }

            #[test]
            fn level_9() {
                $func(&sample(16), 9);
            }
        }
    };
}

level_tests!(lzma1, round_trip_lzma1);
level_tests!(lzma2, round_trip_lzma2);
level_tests!(lzip, round_trip_lzip);

#[test]
fn empty_input_round_trips() {
    round_trip_lzma1("", 1);
    round_trip_lzma2("", 1);
    round_trip_lzip("", 1);
}

#[test]
fn single_byte_round_trips() {
    round_trip_lzma1("x", 0);
    round_trip_lzma2("x", 0);
    round_trip_lzip("x", 0);
}
