//! Engine-level round trips through the public surface: adapter in,
//! adapter out, nothing but blocks in between.

use flacio_codec::{EncoderConfig, StreamDecoder, StreamEncoder};
use flacio_core::io::StreamAdapter;
use flacio_core::sample::SampleBlock;
use std::io::Cursor;

fn triangle_wave(len: usize, period: i32, amplitude: i32) -> Vec<i32> {
    (0..len as i32)
        .map(|i| {
            let phase = i % period;
            let up = phase < period / 2;
            let p = if up { phase } else { period - phase };
            (p * 2 * amplitude / period) - amplitude / 2
        })
        .collect()
}

fn round_trip(cfg: EncoderConfig, blocks: Vec<Vec<Vec<i32>>>) -> Vec<SampleBlock> {
    let io = StreamAdapter::for_writing(Cursor::new(Vec::new())).unwrap();
    let mut encoder = StreamEncoder::new(io, cfg).unwrap();
    for planes in &blocks {
        encoder.process(planes).unwrap();
    }
    let bytes = encoder.finish().unwrap().into_inner().into_inner();

    let io = StreamAdapter::for_reading(Cursor::new(bytes)).unwrap();
    let mut decoder = StreamDecoder::new(io);
    let mut out = Vec::new();
    while let Some(block) = decoder.next_block().unwrap() {
        out.push(block);
    }
    out
}

#[test]
fn tonal_stereo_round_trip() {
    let left = triangle_wave(4096, 110, 20_000);
    let right = triangle_wave(4096, 73, 15_000);
    let cfg = EncoderConfig::default();
    let decoded = round_trip(cfg, vec![vec![left.clone(), right.clone()]]);

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].channel(0), &left[..]);
    assert_eq!(decoded[0].channel(1), &right[..]);
    assert_eq!(decoded[0].sample_rate(), 44_100);
    assert_eq!(decoded[0].bits_per_sample(), 16);
}

#[test]
fn eight_channel_round_trip() {
    let cfg = EncoderConfig {
        channels: 8,
        blocksize: 192,
        ..EncoderConfig::default()
    };
    let planes: Vec<Vec<i32>> = (0..8)
        .map(|ch| triangle_wave(192, 40 + ch, 1000 * (ch as i32 + 1)))
        .collect();
    let decoded = round_trip(cfg, vec![planes.clone()]);
    assert_eq!(decoded[0].channel_count(), 8);
    for (ch, plane) in planes.iter().enumerate() {
        assert_eq!(decoded[0].channel(ch), &plane[..], "channel {ch}");
    }
}

#[test]
fn alternating_silence_and_noise_blocks() {
    // Constant subframes for silence, Rice-coded noise in between.
    let cfg = EncoderConfig {
        channels: 1,
        blocksize: 1024,
        ..EncoderConfig::default()
    };
    let silence = vec![0i32; 1024];
    let noise: Vec<i32> = (0..1024).map(|i| ((i * 2654435761u64 as usize) % 9973) as i32 - 4986).collect();
    let blocks = vec![
        vec![silence.clone()],
        vec![noise.clone()],
        vec![silence.clone()],
    ];
    let decoded = round_trip(cfg, blocks);
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0].channel(0), &silence[..]);
    assert_eq!(decoded[1].channel(0), &noise[..]);
    assert_eq!(decoded[2].channel(0), &silence[..]);
}

#[test]
fn exhaustive_search_with_precision_search() {
    let cfg = EncoderConfig {
        channels: 1,
        blocksize: 512,
        do_exhaustive_model_search: true,
        do_qlp_coeff_prec_search: true,
        max_lpc_order: 6,
        ..EncoderConfig::default()
    };
    let signal = triangle_wave(512, 97, 8000);
    let decoded = round_trip(cfg, vec![vec![signal.clone()]]);
    assert_eq!(decoded[0].channel(0), &signal[..]);
}

#[test]
fn twenty_bit_samples_round_trip() {
    let cfg = EncoderConfig {
        channels: 2,
        bits_per_sample: 20,
        blocksize: 576,
        ..EncoderConfig::default()
    };
    let left = triangle_wave(576, 50, 400_000);
    let right: Vec<i32> = left.iter().map(|&v| -v).collect();
    let decoded = round_trip(cfg, vec![vec![left.clone(), right.clone()]]);
    assert_eq!(decoded[0].channel(0), &left[..]);
    assert_eq!(decoded[0].channel(1), &right[..]);
}
