//! Sample-rate conversion for analysis.

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

const CHUNK_SIZE: usize = 1024;

/// Resample a mono signal from `from_rate` to `to_rate`.
///
/// The resampler's group delay is removed and the result is cut to
/// `round(len * to_rate / from_rate)` samples, so the output lines up with
/// the input in time.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init: {e}")))?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    loop {
        let needed = resampler.input_frames_next();
        if samples.len() - pos < needed {
            break;
        }
        let input = [&samples[pos..pos + needed]];
        let chunk = resampler
            .process(&input[..], None)
            .map_err(|e| Error::Audio(format!("resample: {e}")))?;
        out.extend_from_slice(&chunk[0]);
        pos += needed;
    }

    if pos < samples.len() {
        let input = [&samples[pos..]];
        let chunk = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(|e| Error::Audio(format!("resample: {e}")))?;
        out.extend_from_slice(&chunk[0]);
    }

    // Drain the filter tail.
    while out.len() < delay + expected {
        let chunk = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| Error::Audio(format!("resample flush: {e}")))?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}
