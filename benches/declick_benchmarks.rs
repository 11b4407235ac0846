//! Declick Benchmarks
//!
//! Predictor throughput and whole-channel scans.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use declick::dsp::BurgPredictor;
use declick::engine::{Channel, ChannelTag, ClickScanner, SignalId};
use declick::ProcessingSettings;

/// Two detuned sines with a click every 4096 samples
fn test_signal(len: usize) -> Vec<f32> {
    let mut samples: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / 44100.0;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                + 0.2 * (2.0 * std::f32::consts::PI * 613.0 * t).sin()
        })
        .collect();
    for start in (2048..len.saturating_sub(64)).step_by(4096) {
        for (k, sample) in samples[start..start + 6].iter_mut().enumerate() {
            *sample += if k % 2 == 0 { 0.6 } else { -0.6 };
        }
    }
    samples
}

fn benchmark_burg_prediction(c: &mut Criterion) {
    let history = test_signal(512);
    let mut predictor = BurgPredictor::new(4, 512);

    c.bench_function("burg_predict_512_order_4", |b| {
        b.iter(|| predictor.predict(black_box(&history)))
    });
}

fn benchmark_preprocess(c: &mut Criterion) {
    let samples = test_signal(44100);
    let settings = ProcessingSettings::default();
    let scanner = ClickScanner::new();

    c.bench_function("preprocess_1s_mono", |b| {
        b.iter(|| {
            let mut channel = Channel::new(samples.clone()).unwrap();
            scanner.preprocess(&mut channel, &settings, None).unwrap();
        })
    });
}

fn benchmark_rescan(c: &mut Criterion) {
    let settings = ProcessingSettings::default();
    let scanner = ClickScanner::new();
    let id = SignalId::new();
    let mut channel = Channel::new(test_signal(10 * 44100)).unwrap();
    scanner.preprocess(&mut channel, &settings, None).unwrap();

    c.bench_function("rescan_10s_mono", |b| {
        b.iter(|| {
            scanner
                .scan(black_box(&mut channel), &settings, ChannelTag::Mono, id, None)
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_burg_prediction, benchmark_preprocess, benchmark_rescan);
criterion_main!(benches);
