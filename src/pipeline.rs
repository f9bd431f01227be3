//! End-to-end render pipeline.
//!
//! [`RenderContext::load`] reads every artifact once; after that the context
//! is immutable. [`RenderContext::postprocess`] then turns one seed into
//! three files in the caller's output directory:
//!
//! 1. Generate a piano roll from the seed and convert it to a MIDI score
//! 2. Write `music.midi`
//! 3. Synthesize `music.wav` from the MIDI file
//! 4. Trim `music.wav` to the score's end time plus a short buffer
//! 5. Render `preview.png` from the trimmed audio

use std::path::{Path, PathBuf};

use candle_core::Device;

use crate::audio::{read_wav, trim_to_end_time, write_wav};
use crate::config::{ModelMeta, RenderConfig};
use crate::midi::tensor_to_midi;
use crate::model::{MusicGen, SeedBank, generate};
use crate::preview::{PreviewConfig, write_preview};
use crate::synth::{FluidSynth, Synthesizer};
use crate::{Error, Result};

pub const MIDI_FILE: &str = "music.midi";
pub const WAV_FILE: &str = "music.wav";
pub const PREVIEW_FILE: &str = "preview.png";

/// Files written by one render and what the trim step did.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub midi_path: PathBuf,
    pub wav_path: PathBuf,
    pub preview_path: PathBuf,
    /// Time of the last note-off in the generated score.
    pub midi_end_time_s: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames in the WAV as synthesized.
    pub synthesized_frames: usize,
    /// Frames left after trimming.
    pub trimmed_frames: usize,
}

impl RenderOutput {
    pub fn duration_s(&self) -> f64 {
        self.trimmed_frames as f64 / self.sample_rate as f64
    }
}

/// Everything loaded at startup, shared read-only by every render.
pub struct RenderContext {
    model: MusicGen,
    meta: ModelMeta,
    seeds: SeedBank,
    synth: Box<dyn Synthesizer>,
    device: Device,
    trim_buffer_s: f64,
    preview: PreviewConfig,
}

impl RenderContext {
    /// Load seeds, metadata and weights, probe the device, and set up the
    /// synthesizer. Any missing or corrupt artifact is an error.
    pub fn load(config: &RenderConfig) -> Result<Self> {
        let device = crate::manager::preferred_device(config.cuda_device);
        tracing::info!(device = ?device, "loading render context");

        let seeds = SeedBank::load(&config.seeds_path)?;
        let meta = ModelMeta::from_file(&config.meta_path)?;
        let model = MusicGen::load(
            &meta,
            &config.weights_path,
            config.weights_key.as_deref(),
            &device,
            config.dtype,
        )?;
        let synth = FluidSynth::new(&config.fluidsynth_bin, &config.soundfont_path)?
            .with_sample_rate(config.synth_sample_rate)
            .with_gain(config.synth_gain);

        let preview = PreviewConfig {
            canvas_px: config.preview_canvas_px,
            width: config.preview_width,
            height: config.preview_height,
            ..PreviewConfig::default()
        };

        Self::from_parts(
            model,
            meta,
            seeds,
            Box::new(synth),
            device,
            config.trim_buffer_s,
            preview,
        )
    }

    /// Assemble a context from already-loaded parts.
    pub fn from_parts(
        model: MusicGen,
        meta: ModelMeta,
        seeds: SeedBank,
        synth: Box<dyn Synthesizer>,
        device: Device,
        trim_buffer_s: f64,
        preview: PreviewConfig,
    ) -> Result<Self> {
        if seeds.n_pitches() != meta.n_pitches {
            return Err(Error::Config(format!(
                "seed bank has {} pitch rows, metadata says {}",
                seeds.n_pitches(),
                meta.n_pitches
            )));
        }
        tracing::info!(seeds = seeds.len(), pitches = meta.n_pitches, "render context ready");
        Ok(Self {
            model,
            meta,
            seeds,
            synth,
            device,
            trim_buffer_s,
            preview,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn num_seeds(&self) -> usize {
        self.seeds.len()
    }

    /// Render seed `seed_index` for `duration_s` seconds into `output_dir`.
    ///
    /// Writes `music.midi`, `music.wav` and `preview.png`, overwriting any
    /// existing files of those names.
    pub fn postprocess(
        &self,
        seed_index: i64,
        duration_s: f64,
        output_dir: impl AsRef<Path>,
    ) -> Result<RenderOutput> {
        let output_dir = output_dir.as_ref();
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(Error::InvalidRequest(format!(
                "duration must be a positive number of seconds, got {duration_s}"
            )));
        }
        if !output_dir.is_dir() {
            return Err(Error::OutputDir(output_dir.to_path_buf()));
        }
        let seed = self.seeds.get(seed_index)?;

        tracing::info!(seed_index, duration_s, "creating midi");
        let roll = generate(
            &self.model,
            &self.meta,
            &seed.unsqueeze(0)?,
            duration_s,
            &self.device,
        )?;
        let score = tensor_to_midi(&roll, &self.meta)?;
        let midi_end_time_s = score.end_time();
        let midi_path = output_dir.join(MIDI_FILE);
        score.write(&midi_path)?;
        tracing::debug!(notes = score.notes.len(), end_time_s = midi_end_time_s, "midi written");

        tracing::info!("creating wav");
        let wav_path = output_dir.join(WAV_FILE);
        self.synth.render(&midi_path, &wav_path)?;

        let mut audio = read_wav(&wav_path)?;
        let synthesized_frames = audio.frames();
        let trimmed_frames = trim_to_end_time(&mut audio, midi_end_time_s, self.trim_buffer_s);
        write_wav(&wav_path, &audio)?;
        tracing::debug!(synthesized_frames, trimmed_frames, "wav trimmed");

        tracing::info!("creating preview");
        let preview_path = output_dir.join(PREVIEW_FILE);
        write_preview(&audio, &self.preview, &preview_path)?;

        Ok(RenderOutput {
            midi_path,
            wav_path,
            preview_path,
            midi_end_time_s,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            synthesized_frames,
            trimmed_frames,
        })
    }
}
