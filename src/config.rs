//! Model metadata and render configuration.
//!
//! [`ModelMeta`] is read from the JSON file shipped next to the weights.
//! [`RenderConfig`] collects everything else a [`RenderContext`] needs at
//! startup: artifact paths, device, synthesizer and preview settings.
//!
//! [`RenderContext`]: crate::pipeline::RenderContext

use std::path::{Path, PathBuf};

use candle_core::DType;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hyperparameters describing the piano-roll model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Pitch rows in the piano roll (input and output width).
    pub n_pitches: usize,
    /// LSTM hidden size.
    pub hidden_size: usize,
    /// Stacked LSTM layers.
    pub num_layers: usize,
    /// Piano-roll frames per second of music.
    pub frames_per_second: f64,

    /// MIDI key of pitch row 0.
    #[serde(default = "default_lowest_pitch")]
    pub lowest_pitch: u8,
    /// Sigmoid activation above which a pitch is considered sounding.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Velocity assigned to every generated note.
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// General MIDI program for the single instrument track.
    #[serde(default)]
    pub program: u8,
    /// Hard cap on generated frames regardless of requested duration.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

fn default_lowest_pitch() -> u8 {
    0
}

fn default_threshold() -> f32 {
    0.5
}

fn default_velocity() -> u8 {
    100
}

fn default_max_frames() -> usize {
    8192
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            n_pitches: 128,
            hidden_size: 256,
            num_layers: 2,
            frames_per_second: 8.0,
            lowest_pitch: default_lowest_pitch(),
            threshold: default_threshold(),
            velocity: default_velocity(),
            program: 0,
            max_frames: default_max_frames(),
        }
    }
}

impl ModelMeta {
    /// Read and validate metadata from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read metadata {}: {e}", path.display()))
        })?;
        let meta: Self = serde_json::from_str(&text)?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_pitches == 0 || self.hidden_size == 0 || self.num_layers == 0 {
            return Err(Error::Config(format!(
                "n_pitches, hidden_size and num_layers must be non-zero, got {}/{}/{}",
                self.n_pitches, self.hidden_size, self.num_layers
            )));
        }
        if !(self.frames_per_second.is_finite() && self.frames_per_second > 0.0) {
            return Err(Error::Config(format!(
                "frames_per_second must be positive, got {}",
                self.frames_per_second
            )));
        }
        if self.velocity > 127 || self.program > 127 {
            return Err(Error::Config(format!(
                "velocity and program must be 0..=127, got {}/{}",
                self.velocity, self.program
            )));
        }
        Ok(())
    }

    /// Number of frames to generate for `duration_s` seconds, capped at `max_frames`.
    pub fn frames_for(&self, duration_s: f64) -> usize {
        let frames = (duration_s * self.frames_per_second).ceil() as usize;
        frames.clamp(1, self.max_frames.max(1))
    }
}

/// Startup configuration for a render context.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Seed bank (safetensors, tensor `seeds` shaped `[N, T, P]`).
    pub seeds_path: PathBuf,
    /// Model metadata (JSON).
    pub meta_path: PathBuf,
    /// Model weights (`.safetensors`, or a PyTorch `.pth` checkpoint).
    pub weights_path: PathBuf,
    /// Key holding the state dict inside a `.pth` checkpoint.
    pub weights_key: Option<String>,
    /// Soundfont handed to the synthesizer.
    pub soundfont_path: PathBuf,

    /// CUDA device ordinal (0 = first GPU). Ignored when CUDA is unavailable.
    pub cuda_device: usize,
    /// Data type for model weights and activations.
    pub dtype: DType,

    /// Name or path of the fluidsynth executable.
    pub fluidsynth_bin: PathBuf,
    /// Output gain passed to fluidsynth (`-g`).
    pub synth_gain: f32,
    /// Sample rate of the synthesized WAV (`-r`).
    pub synth_sample_rate: u32,

    /// Seconds kept past the last note-off when trimming.
    pub trim_buffer_s: f64,
    /// Side length of the square canvas the spectrogram is rasterized onto.
    pub preview_canvas_px: u32,
    /// Final preview width after nearest-neighbour upscaling.
    pub preview_width: u32,
    /// Final preview height after nearest-neighbour upscaling.
    pub preview_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            seeds_path: PathBuf::from("seeds.safetensors"),
            meta_path: PathBuf::from("meta.json"),
            weights_path: PathBuf::from("weights.safetensors"),
            weights_key: Some("model".to_string()),
            soundfont_path: PathBuf::from("FluidR3_GM.sf2"),
            cuda_device: 0,
            dtype: DType::F32,
            fluidsynth_bin: PathBuf::from("fluidsynth"),
            synth_gain: 0.2,
            synth_sample_rate: 44100,
            trim_buffer_s: 0.1,
            // 2in × 64dpi
            preview_canvas_px: 128,
            preview_width: 1028,
            preview_height: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_optional_fields_default() {
        let meta: ModelMeta = serde_json::from_str(
            r#"{"n_pitches": 88, "hidden_size": 64, "num_layers": 1, "frames_per_second": 4.0}"#,
        )
        .unwrap();
        assert_eq!(meta.n_pitches, 88);
        assert_eq!(meta.threshold, 0.5);
        assert_eq!(meta.velocity, 100);
        assert_eq!(meta.program, 0);
        assert_eq!(meta.max_frames, 8192);
        meta.validate().unwrap();
    }

    #[test]
    fn test_meta_rejects_zero_fps() {
        let meta = ModelMeta {
            frames_per_second: 0.0,
            ..ModelMeta::default()
        };
        assert!(matches!(meta.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_frames_for_rounds_up_and_caps() {
        let meta = ModelMeta {
            frames_per_second: 8.0,
            max_frames: 100,
            ..ModelMeta::default()
        };
        assert_eq!(meta.frames_for(1.0), 8);
        assert_eq!(meta.frames_for(1.01), 9);
        assert_eq!(meta.frames_for(0.01), 1);
        assert_eq!(meta.frames_for(60.0), 100);
    }

    #[test]
    fn test_meta_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, serde_json::to_string(&ModelMeta::default()).unwrap()).unwrap();
        assert_eq!(ModelMeta::from_file(&path).unwrap(), ModelMeta::default());
        assert!(ModelMeta::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_render_config_defaults() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.trim_buffer_s, 0.1);
        assert_eq!((cfg.preview_width, cfg.preview_height), (1028, 512));
        assert_eq!(cfg.synth_sample_rate, 44100);
        assert_eq!(cfg.dtype, DType::F32);
    }
}
