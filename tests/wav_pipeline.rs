//! WAV Pipeline Tests
//!
//! Import, repair and export through real files.

use declick::engine::{export_wav, import_wav, AudioSignal, ChannelTag, ClickScanner};
use declick::ProcessingSettings;
use tempfile::tempdir;

#[test]
fn test_stereo_file_repair() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("damaged.wav");
    let output = dir.path().join("repaired.wav");

    let mut left = vec![0.5f32; 4096];
    left[2000..2004].fill(-0.25);
    let mut right = vec![-0.5f32; 4096];
    right[3000..3007].fill(0.0);
    let damaged = AudioSignal::stereo(left, right, 48000, ProcessingSettings::default()).unwrap();
    export_wav(&damaged, &input, 32).unwrap();

    let mut signal = import_wav(&input, ProcessingSettings::default()).unwrap();
    assert_eq!(signal.sample_rate(), 48000);
    signal.scan_all(&ClickScanner::new(), None).unwrap();
    assert_eq!(signal.click_count(), 2);
    export_wav(&signal, &output, 32).unwrap();

    let repaired = import_wav(&output, ProcessingSettings::default()).unwrap();
    let left = repaired.channel(ChannelTag::Left).unwrap().input_samples();
    let right = repaired.channel(ChannelTag::Right).unwrap().input_samples();
    assert!(left.iter().all(|&s| s == 0.5));
    assert!(right.iter().all(|&s| s == -0.5));
}

#[test]
fn test_24bit_export_is_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");

    let samples: Vec<f32> = (0..3000)
        .map(|i| 0.8 * (2.0 * std::f32::consts::PI * i as f32 / 100.0).sin())
        .collect();
    let signal = AudioSignal::mono(samples.clone(), 96000, ProcessingSettings::default()).unwrap();
    export_wav(&signal, &path, 24).unwrap();

    let back = import_wav(&path, ProcessingSettings::default()).unwrap();
    let imported = back.channel(ChannelTag::Mono).unwrap().input_samples();
    for (a, b) in samples.iter().zip(imported) {
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    }
}
