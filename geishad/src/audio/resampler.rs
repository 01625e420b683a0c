//! Sample-rate conversion using rubato
//!
//! A decoded track is converted once, in full, to the rate of the device it
//! is about to play on.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use crate::error::{Error, Result};

/// Convert interleaved `input` from `input_rate` to `output_rate`
///
/// Returns a copy when the rates already match.
pub fn resample(
    input: &[f32],
    channels: usize,
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>> {
    if channels == 0 {
        return Err(Error::Decode("Cannot resample zero channels".to_string()));
    }
    let frames = input.len() / channels;
    if input_rate == output_rate || frames == 0 {
        return Ok(input.to_vec());
    }

    debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        frames, input_rate, output_rate, channels
    );

    // rubato works on planar buffers
    let planar = deinterleave(input, channels);

    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(output_rate) / f64::from(input_rate),
        1.0,
        PolynomialDegree::Septic,
        frames,
        channels,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    Ok(interleave(&output))
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for index in 0..frames {
        interleaved.extend(planar.iter().map(|channel| channel[index]));
    }
    interleaved
}
