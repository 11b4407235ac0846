//! WAV import and export
//!
//! Decodes mono or stereo WAV files into an [`AudioSignal`] and writes the
//! repaired output buffers back. Integer formats are scaled to `[-1, 1)`;
//! no resampling is done, the signal keeps the file's sample rate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::engine::signal::{AudioSignal, Channels};
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

/// Bit depths accepted by [`export_wav`]
pub fn supported_bit_depths() -> &'static [u16] {
    &SUPPORTED_BIT_DEPTHS
}

/// Import a WAV file
///
/// # Arguments
/// * `path` - WAV file to read
/// * `settings` - Processing settings for the new signal
///
/// # Errors
/// * `UnsupportedFormat` - More than two channels, or an unknown integer width
/// * `Wav` - The file cannot be opened or decoded
/// * `NonFiniteSample` - A float file carries NaN or infinity
pub fn import_wav(path: &Path, settings: ProcessingSettings) -> Result<AudioSignal> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(DeclickError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono and stereo are supported)", channels),
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let mut split = deinterleave(&samples, channels);
    debug!(
        path = %path.display(),
        channels,
        frames = split[0].len(),
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "wav imported"
    );

    if channels == 1 {
        let mono = split.remove(0);
        AudioSignal::mono(mono, spec.sample_rate, settings)
    } else {
        let right = split.remove(1);
        let left = split.remove(0);
        AudioSignal::stereo(left, right, spec.sample_rate, settings)
    }
}

/// Write a signal's repaired output to a WAV file
///
/// # Arguments
/// * `signal` - Signal whose output buffers are written
/// * `path` - Destination file
/// * `bit_depth` - 16 or 24 (integer) or 32 (float)
pub fn export_wav(signal: &AudioSignal, path: &Path, bit_depth: u16) -> Result<()> {
    if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
        return Err(DeclickError::UnsupportedFormat {
            format: format!("{}-bit output (only 16, 24 and 32 are supported)", bit_depth),
        });
    }

    let outputs: Vec<&[f32]> = match signal.channels() {
        Channels::Mono(channel) => vec![channel.output_samples()],
        Channels::Stereo(left, right) => vec![left.output_samples(), right.output_samples()],
    };

    let spec = WavSpec {
        channels: outputs.len() as u16,
        sample_rate: signal.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in interleave(&outputs) {
        match bit_depth {
            16 => writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?,
            24 => writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)?,
            _ => writer.write_sample(sample)?,
        }
    }
    writer.finalize()?;

    debug!(path = %path.display(), bit_depth, "wav exported");
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            return Err(DeclickError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            })
        }
    };
    Ok(samples)
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in result.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[&[f32]]) -> Vec<f32> {
    let frames = channels.first().map_or(0, |c| c.len());
    let mut result = Vec::with_capacity(frames * channels.len());

    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}
