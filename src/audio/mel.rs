//! Mel spectrogram computation via STFT + mel filterbank.
//!
//! Defaults follow the common analysis setup used for previews:
//! - Sample rate: 22050 Hz
//! - FFT size: 2048 (1025 frequency bins), periodic Hann window
//! - Hop length: 512
//! - Mel bins: 128 over 0 Hz – Nyquist, Slaney scale and normalization
//! - Centered frames, zero padded by `n_fft / 2` on both sides
//! - Power spectrum (`|X|²`)

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Configuration for the mel spectrogram.
#[derive(Debug, Clone)]
pub struct MelConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub f_min: f64,
    /// Upper band edge; `None` means Nyquist.
    pub f_max: Option<f64>,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            f_min: 0.0,
            f_max: None,
        }
    }
}

/// Mel spectrogram processor.
///
/// Pre-computes the Hann window, FFT plan, and mel filterbank on construction.
/// Then call [`MelSpectrogram::process`] to convert audio samples to a mel
/// power spectrogram.
pub struct MelSpectrogram {
    config: MelConfig,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
    fft: std::sync::Arc<dyn rustfft::Fft<f64>>,
}

impl MelSpectrogram {
    pub fn new(config: MelConfig) -> Self {
        let window = hann_window(config.n_fft);
        let f_max = config.f_max.unwrap_or(config.sample_rate as f64 / 2.0);
        let filterbank = mel_filterbank(
            config.n_fft,
            config.n_mels,
            config.sample_rate,
            config.f_min,
            f_max,
        );
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Self {
            config,
            window,
            filterbank,
            fft,
        }
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Compute a mel power spectrogram from mono samples.
    ///
    /// Output: `[n_mels, num_frames]`, row 0 is the lowest band.
    pub fn process(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let pad = self.config.n_fft / 2;
        let mut padded = vec![0.0f64; pad];
        padded.extend(samples.iter().map(|&s| s as f64));
        padded.extend(std::iter::repeat_n(0.0, pad));

        let power = self.stft_power(&padded);

        let num_frames = power.len();
        let mut mel_spec = vec![vec![0.0; num_frames]; self.config.n_mels];

        for (frame_idx, frame_power) in power.iter().enumerate() {
            for (mel_idx, filter) in self.filterbank.iter().enumerate() {
                let mut sum = 0.0;
                for (bin_idx, &weight) in filter.iter().enumerate() {
                    if weight > 0.0 {
                        sum += weight * frame_power[bin_idx];
                    }
                }
                mel_spec[mel_idx][frame_idx] = sum;
            }
        }

        mel_spec
    }

    /// Short-time Fourier transform. Returns one-sided power spectra per frame.
    fn stft_power(&self, padded: &[f64]) -> Vec<Vec<f64>> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let num_bins = n_fft / 2 + 1;

        let num_frames = (padded.len().saturating_sub(n_fft)) / hop + 1;
        let mut frames = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let start = frame_idx * hop;
            if start + n_fft > padded.len() {
                break;
            }

            let mut buffer: Vec<Complex<f64>> = (0..n_fft)
                .map(|i| Complex::new(padded[start + i] * self.window[i], 0.0))
                .collect();

            self.fft.process(&mut buffer);

            frames.push(buffer[..num_bins].iter().map(|c| c.norm_sqr()).collect());
        }

        frames
    }
}

/// Convert a power spectrogram to decibels relative to its peak.
///
/// `10·log10(max(S, amin)) - 10·log10(max(peak, amin))`, floored at
/// `max - top_db`. The loudest cell maps to 0 dB.
pub fn power_to_db(spec: &[Vec<f64>], amin: f64, top_db: Option<f64>) -> Vec<Vec<f64>> {
    let peak = spec
        .iter()
        .flat_map(|row| row.iter())
        .cloned()
        .fold(0.0f64, f64::max);
    let reference = 10.0 * peak.max(amin).log10();

    let mut db: Vec<Vec<f64>> = spec
        .iter()
        .map(|row| {
            row.iter()
                .map(|&p| 10.0 * p.max(amin).log10() - reference)
                .collect()
        })
        .collect();

    if let Some(top_db) = top_db {
        let max_db = db
            .iter()
            .flat_map(|row| row.iter())
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = max_db - top_db;
        for v in db.iter_mut().flat_map(|row| row.iter_mut()) {
            *v = v.max(floor);
        }
    }

    db
}

/// Periodic Hann window.
fn hann_window(length: usize) -> Vec<f64> {
    (0..length)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / length as f64;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Build a Slaney-normalized mel filterbank.
///
/// Returns `n_mels` filters, each with `n_fft/2 + 1` weights.
fn mel_filterbank(
    n_fft: usize,
    n_mels: usize,
    sample_rate: u32,
    f_min: f64,
    f_max: f64,
) -> Vec<Vec<f64>> {
    let num_bins = n_fft / 2 + 1;
    let sr = sample_rate as f64;

    let mel_min = hz_to_mel_slaney(f_min);
    let mel_max = hz_to_mel_slaney(f_max);

    let hz_points: Vec<f64> = (0..=(n_mels + 1))
        .map(|i| mel_to_hz_slaney(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let bin_freqs: Vec<f64> = (0..num_bins)
        .map(|i| sr * i as f64 / n_fft as f64)
        .collect();

    let mut filters = Vec::with_capacity(n_mels);

    for i in 0..n_mels {
        let f_left = hz_points[i];
        let f_center = hz_points[i + 1];
        let f_right = hz_points[i + 2];

        let norm = 2.0 / (f_right - f_left);

        let filter: Vec<f64> = bin_freqs
            .iter()
            .map(|&f| {
                if f < f_left || f > f_right {
                    0.0
                } else if f <= f_center {
                    norm * (f - f_left) / (f_center - f_left)
                } else {
                    norm * (f_right - f) / (f_right - f_center)
                }
            })
            .collect();

        filters.push(filter);
    }

    filters
}

/// Hz to Slaney mel: linear below 1 kHz, logarithmic above.
fn hz_to_mel_slaney(hz: f64) -> f64 {
    if hz < 1000.0 {
        3.0 * hz / 200.0
    } else {
        15.0 + 27.0 * (hz / 1000.0).ln() / (6.4_f64).ln()
    }
}

fn mel_to_hz_slaney(mel: f64) -> f64 {
    if mel < 15.0 {
        200.0 * mel / 3.0
    } else {
        1000.0 * ((mel - 15.0) * (6.4_f64).ln() / 27.0).exp()
    }
}
