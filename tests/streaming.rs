//! The streaming contract: resumability, backpressure, sequencing, and
//! corruption handling on the raw handles.

use bzip2_core::{
    compress_bytes, decompress_bytes, Action, CompressStream, DecompressStream, Error, Status,
};

fn sample(len: usize) -> Vec<u8> {
    let mut x = 0x1234_5678_u32;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7fff_ffff;
            // Bias toward text-ish bytes so all pipeline stages do real work.
            if x & 3 == 0 {
                b' '
            } else {
                b'a' + ((x >> 8) % 26) as u8
            }
        })
        .collect()
}

#[test]
fn decoder_accepts_one_byte_input_windows() {
    let data = sample(40_000);
    let packed = compress_bytes(&data, 1).unwrap();

    let mut strm = DecompressStream::new(false).unwrap();
    let mut out = Vec::new();
    let mut window = vec![0_u8; 4096];
    for &byte in &packed {
        let mut fed = false;
        while !fed {
            let p = strm.decompress(std::slice::from_ref(&byte), &mut window).unwrap();
            out.extend_from_slice(&window[..p.produced]);
            fed = p.consumed == 1;
            if p.status == Status::StreamEnd {
                break;
            }
        }
    }
    assert_eq!(out, data);
}

#[test]
fn decoder_respects_output_backpressure() {
    let data = sample(10_000);
    let packed = compress_bytes(&data, 1).unwrap();

    // A k-byte window never receives more than k bytes per call, and the
    // byte sequence is identical to a single-shot decode.
    for k in [1_usize, 3, 17] {
        let mut strm = DecompressStream::new(false).unwrap();
        let mut out = Vec::new();
        let mut consumed = 0_usize;
        loop {
            let mut window = vec![0_u8; k];
            let p = strm.decompress(&packed[consumed..], &mut window).unwrap();
            assert!(p.produced <= k);
            consumed += p.consumed;
            out.extend_from_slice(&window[..p.produced]);
            if p.status == Status::StreamEnd {
                break;
            }
        }
        assert_eq!(out, data, "window size {}", k);
    }
}

#[test]
fn every_input_partition_gives_the_same_output() {
    let data = sample(5_000);
    let packed = compress_bytes(&data, 1).unwrap();

    for chunk in [1_usize, 2, 7, 64, 1024] {
        let mut strm = DecompressStream::new(false).unwrap();
        let mut out = Vec::new();
        let mut window = vec![0_u8; 512];
        let mut fed = 0_usize;
        loop {
            let end = (fed + chunk).min(packed.len());
            let p = strm.decompress(&packed[fed..end], &mut window).unwrap();
            fed += p.consumed;
            out.extend_from_slice(&window[..p.produced]);
            if p.status == Status::StreamEnd {
                break;
            }
        }
        assert_eq!(out, data, "chunk size {}", chunk);
    }
}

#[test]
fn compressor_resumes_across_action_calls() {
    // Run in dribbles, flush mid-stream, then finish; the decoder must see
    // one seamless stream with a forced block boundary inside it.
    let first = sample(30_000);
    let second = sample(20_000);

    let mut strm = CompressStream::new(1, 0).unwrap();
    let mut packed = Vec::new();
    let mut window = vec![0_u8; 777];

    let mut fed = 0_usize;
    while fed < first.len() {
        let p = strm
            .compress(&first[fed..(fed + 500).min(first.len())], &mut window, Action::Run)
            .unwrap();
        fed += p.consumed;
        packed.extend_from_slice(&window[..p.produced]);
    }
    loop {
        let p = strm.compress(&[], &mut window, Action::Flush).unwrap();
        packed.extend_from_slice(&window[..p.produced]);
        if p.status == Status::RunOk {
            break;
        }
        assert_eq!(p.status, Status::FlushOk);
    }
    let mut fed = 0_usize;
    loop {
        let p = strm
            .compress(&second[fed..], &mut window, Action::Finish)
            .unwrap();
        fed += p.consumed;
        packed.extend_from_slice(&window[..p.produced]);
        if p.status == Status::StreamEnd {
            break;
        }
    }

    let mut expect = first;
    expect.extend_from_slice(&second);
    assert_eq!(decompress_bytes(&packed).unwrap(), expect);
}

#[test]
fn run_after_flush_must_keep_flushing() {
    let mut strm = CompressStream::new(1, 0).unwrap();
    let mut window = [0_u8; 2];
    let p = strm.compress(b"abcabc", &mut window, Action::Flush).unwrap();
    assert_eq!(p.status, Status::FlushOk);
    assert!(matches!(
        strm.compress(&[], &mut window, Action::Run),
        Err(Error::Sequence)
    ));
}

#[test]
fn decoder_after_stream_end_is_a_sequence_error() {
    let packed = compress_bytes(b"done", 1).unwrap();
    let mut strm = DecompressStream::new(false).unwrap();
    let mut window = vec![0_u8; 64];
    let p = strm.decompress(&packed, &mut window).unwrap();
    assert_eq!(p.status, Status::StreamEnd);
    assert!(matches!(
        strm.decompress(b"BZh1", &mut window),
        Err(Error::Sequence)
    ));
}

#[test]
fn magic_rejection_comes_before_any_output() {
    let mut strm = DecompressStream::new(false).unwrap();
    let mut window = vec![0_u8; 64];
    let err = strm.decompress(b"GIF89a.....", &mut window).unwrap_err();
    assert!(matches!(err, Error::DataMagic));
}

#[test]
fn bit_flips_are_detected() {
    let data = sample(20_000);
    let packed = compress_bytes(&data, 1).unwrap();

    // Flip one bit at a spread of payload positions. Every flip must either
    // produce a structural error, a CRC mismatch, or starve the parser;
    // none may yield a "successful" wrong answer.
    for &pos in &[20, 100, 1000, packed.len() / 2, packed.len() - 10] {
        for bit in [0_u8, 3, 7] {
            let mut bad = packed.clone();
            bad[pos] ^= 1 << bit;
            match decompress_bytes(&bad) {
                Err(_) => {}
                Ok(plain) => {
                    assert_eq!(
                        plain, data,
                        "flip at {}:{} silently changed the plaintext",
                        pos, bit
                    );
                }
            }
        }
    }
}

#[test]
fn block_crc_mismatch_is_a_data_error() {
    // Flipping a bit in the stored block CRC itself leaves the payload
    // parseable, so the failure must be the CRC comparison.
    let data = sample(5_000);
    let mut packed = compress_bytes(&data, 1).unwrap();
    // Block CRC sits right after "BZh1" + 6 bytes of block magic.
    packed[11] ^= 0x10;
    assert!(matches!(decompress_bytes(&packed), Err(Error::Data)));
}

#[test]
fn totals_are_tracked_in_both_directions() {
    let data = sample(1_000);
    let packed = compress_bytes(&data, 1).unwrap();

    let mut strm = DecompressStream::new(false).unwrap();
    let mut window = vec![0_u8; 8192];
    let p = strm.decompress(&packed, &mut window).unwrap();
    assert_eq!(p.status, Status::StreamEnd);
    assert_eq!(strm.total_in(), packed.len() as u64);
    assert_eq!(strm.total_out(), data.len() as u64);
}
