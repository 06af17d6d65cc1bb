//! End-to-end round trips over the public surface.

use std::io::Read;

use bzip2_core::{compress_bytes, decompress_bytes, BzReader, Error};

/// Deterministic pseudo-random bytes from the classic LCG,
/// x = x * 1103515245 + 12345 (mod 2^31).
fn lcg_bytes(seed: u32, len: usize) -> Vec<u8> {
    let mut x = seed & 0x7fff_ffff;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7fff_ffff;
            (x >> 8) as u8
        })
        .collect()
}

#[test]
fn empty_input_level_1() {
    let packed = compress_bytes(b"", 1).unwrap();
    assert_eq!(&packed[..4], &[0x42, 0x5a, 0x68, 0x31]);
    assert_eq!(decompress_bytes(&packed).unwrap(), b"");
}

#[test]
fn empty_input_all_levels() {
    for level in 1..=9 {
        let packed = compress_bytes(b"", level).unwrap();
        assert_eq!(packed[3], b'0' + level as u8);
        assert_eq!(decompress_bytes(&packed).unwrap(), b"");
    }
}

#[test]
fn fox_line_level_9() {
    let data = b"The quick brown fox jumps over.\n";
    assert_eq!(data.len(), 32);
    let packed = compress_bytes(data, 9).unwrap();
    assert_eq!(decompress_bytes(&packed).unwrap(), data);
}

#[test]
fn one_mebibyte_of_a() {
    let data = vec![0x41_u8; 1 << 20];
    let packed = compress_bytes(&data, 9).unwrap();
    assert!(
        packed.len() < 200,
        "1 MiB of 'A' compressed to {} bytes",
        packed.len()
    );
    assert_eq!(decompress_bytes(&packed).unwrap(), data);
}

#[test]
fn random_block_levels_1_5_9() {
    let data = lcg_bytes(0xdead_beef, 900_000);
    for level in [1, 5, 9] {
        let packed = compress_bytes(&data, level).unwrap();
        assert_eq!(
            decompress_bytes(&packed).unwrap(),
            data,
            "level {} failed",
            level
        );
    }
}

#[test]
fn output_is_deterministic() {
    let data = lcg_bytes(42, 60_000);
    let a = compress_bytes(&data, 5).unwrap();
    let b = compress_bytes(&data, 5).unwrap();
    assert_eq!(a, b);
}

#[test]
fn multi_block_stream() {
    // Over 100_000 bytes at level 1 forces several blocks.
    let data = lcg_bytes(7, 350_000);
    let packed = compress_bytes(&data, 1).unwrap();
    assert_eq!(decompress_bytes(&packed).unwrap(), data);
}

#[test]
fn truncated_stream_reports_eof() {
    let packed = compress_bytes(b"some data worth keeping", 1).unwrap();
    let cut = &packed[..packed.len() - 1];

    // The core keeps asking for more input.
    assert!(matches!(
        decompress_bytes(cut),
        Err(Error::UnexpectedEof)
    ));

    // The byte wrapper turns that into an UnexpectedEof read error.
    let mut reader = BzReader::new(std::io::Cursor::new(cut.to_vec())).unwrap();
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn concatenated_streams_decode_back_to_back() {
    let a = b"first stream".to_vec();
    let b = lcg_bytes(99, 30_000);
    let mut joined = compress_bytes(&a, 1).unwrap();
    joined.extend(compress_bytes(&b, 5).unwrap());

    let mut reader =
        BzReader::with_options(std::io::Cursor::new(joined), false, true).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();

    let mut expect = a;
    expect.extend_from_slice(&b);
    assert_eq!(out, expect);
}

#[test]
fn single_stream_reader_leaves_the_tail_unused() {
    let packed = compress_bytes(b"payload", 1).unwrap();
    let mut joined = packed.clone();
    joined.extend_from_slice(b"tail bytes the decoder never asked for");

    let mut reader = BzReader::new(std::io::Cursor::new(joined)).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"payload");
    // Whatever the reader over-read from the source is retrievable.
    assert!(!reader.unused().is_empty());
}

#[test]
fn small_decoder_matches_fast_decoder() {
    let data = lcg_bytes(5, 120_000);
    let packed = compress_bytes(&data, 1).unwrap();

    let mut fast = BzReader::with_options(std::io::Cursor::new(packed.clone()), false, false)
        .unwrap();
    let mut small = BzReader::with_options(std::io::Cursor::new(packed), true, false).unwrap();
    let (mut a, mut b) = (Vec::new(), Vec::new());
    fast.read_to_end(&mut a).unwrap();
    small.read_to_end(&mut b).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, data);
}

#[test]
fn structured_text_round_trips() {
    // Text-like data exercises the main sort's recursion rather than the
    // bucket pass alone.
    let mut data = Vec::new();
    while data.len() < 200_000 {
        data.extend_from_slice(b"It was the best of times, it was the worst of times. ");
    }
    for level in [1, 9] {
        let packed = compress_bytes(&data, level).unwrap();
        assert_eq!(decompress_bytes(&packed).unwrap(), data);
    }
}
