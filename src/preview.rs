//! Pixelated spectrogram preview.
//!
//! The trimmed audio is downmixed, resampled to the analysis rate and turned
//! into a dB-scaled mel spectrogram. That spectrogram is rasterized with no
//! axes onto a small square canvas, round-tripped through an in-memory PNG,
//! then blown up with nearest-neighbour sampling so every canvas pixel
//! becomes a visible block.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};

use crate::Result;
use crate::audio::mel::{MelConfig, MelSpectrogram, power_to_db};
use crate::audio::{AudioBuffer, resample_mono};

/// Floor for power values before taking the log.
const AMIN: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub mel: MelConfig,
    /// Dynamic range kept below the peak, in dB.
    pub top_db: Option<f64>,
    pub canvas_px: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            mel: MelConfig::default(),
            top_db: Some(80.0),
            canvas_px: 128,
            width: 1028,
            height: 512,
        }
    }
}

/// Render the preview image for `audio`.
pub fn render_preview(audio: &AudioBuffer, cfg: &PreviewConfig) -> Result<RgbImage> {
    let mono = resample_mono(&audio.to_mono(), audio.sample_rate, cfg.mel.sample_rate)?;
    let mel = MelSpectrogram::new(cfg.mel.clone());
    let db = power_to_db(&mel.process(&mono), AMIN, cfg.top_db);
    tracing::debug!(
        n_mels = db.len(),
        frames = db.first().map_or(0, |r| r.len()),
        "mel spectrogram computed"
    );

    let canvas = rasterize(&db, cfg.canvas_px);

    let mut png = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    let reopened = image::load_from_memory_with_format(&png, ImageFormat::Png)?.to_rgb8();

    Ok(imageops::resize(
        &reopened,
        cfg.width,
        cfg.height,
        FilterType::Nearest,
    ))
}

/// Render and save as PNG.
pub fn write_preview(audio: &AudioBuffer, cfg: &PreviewConfig, path: impl AsRef<Path>) -> Result<()> {
    render_preview(audio, cfg)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Draw `[n_mels, frames]` onto a `size × size` canvas, low bands at the bottom.
///
/// Colours are normalized between the spectrogram's own minimum and maximum.
fn rasterize(db: &[Vec<f64>], size: u32) -> RgbImage {
    let n_mels = db.len();
    let frames = db.first().map_or(0, |r| r.len());
    if n_mels == 0 || frames == 0 {
        return RgbImage::from_pixel(size, size, cool(0.0));
    }

    let (lo, hi) = db
        .iter()
        .flat_map(|row| row.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;

    RgbImage::from_fn(size, size, |x, y| {
        let col = (x as usize * frames / size as usize).min(frames - 1);
        let band = (y as usize * n_mels / size as usize).min(n_mels - 1);
        let row = n_mels - 1 - band;
        let t = if range > 0.0 {
            (db[row][col] - lo) / range
        } else {
            0.0
        };
        cool(t)
    })
}

/// Cyan-to-magenta colormap: `(t, 1 - t, 1)`.
fn cool(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    Rgb([
        (t * 255.0).round() as u8,
        ((1.0 - t) * 255.0).round() as u8,
        255,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f64, sample_rate: u32, channels: u16) -> AudioBuffer {
        let frames = (seconds * sample_rate as f64) as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sample_rate as f64).sin()
                    as f32
                    * 0.5;
                std::iter::repeat_n(v, channels as usize)
            })
            .collect();
        AudioBuffer {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn test_cool_endpoints() {
        assert_eq!(cool(0.0), Rgb([0, 255, 255]));
        assert_eq!(cool(1.0), Rgb([255, 0, 255]));
        assert_eq!(cool(2.0), Rgb([255, 0, 255]));
    }

    #[test]
    fn test_preview_dimensions_fixed() {
        let cfg = PreviewConfig::default();
        for seconds in [0.05, 1.0, 4.0] {
            let img = render_preview(&tone(seconds, 44100, 2), &cfg).unwrap();
            assert_eq!(img.dimensions(), (1028, 512), "for {seconds}s");
        }
    }

    #[test]
    fn test_silence_renders_flat_colour() {
        let audio = AudioBuffer {
            samples: vec![0.0; 22050],
            sample_rate: 22050,
            channels: 1,
        };
        let img = render_preview(&audio, &PreviewConfig::default()).unwrap();
        assert!(img.pixels().all(|p| *p == Rgb([0, 255, 255])));
    }

    #[test]
    fn test_tone_is_brightest_low_on_canvas() {
        let db = vec![vec![-80.0; 4], vec![0.0; 4], vec![-80.0; 4], vec![-80.0; 4]];
        let canvas = rasterize(&db, 8);
        // band 1 of 4 (from the bottom) covers canvas rows 4..6
        assert_eq!(*canvas.get_pixel(0, 4), Rgb([255, 0, 255]));
        assert_eq!(*canvas.get_pixel(0, 7), Rgb([0, 255, 255]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 255, 255]));
    }

    #[test]
    fn test_write_preview_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        write_preview(&tone(0.5, 22050, 1), &PreviewConfig::default(), &path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (1028, 512));
    }
}
