//! Render seed-conditioned piano-roll generations to audio.
//!
//! Loads a small LSTM piano-roll model and a bank of seed rolls with candle,
//! then turns one seed into a MIDI file, a soundfont-rendered WAV trimmed to
//! the music, and a pixelated mel-spectrogram preview.
//!
//! ## Pipeline
//!
//! ```text
//! seed [T, P] ──→ MusicGen (LSTM, autoregressive) ──→ piano roll [F, P]
//!                                                         ↓
//!                                               music.midi (midly)
//!                                                         ↓
//!                                       fluidsynth + soundfont → music.wav
//!                                                         ↓
//!                                        trim to last note-off + 0.1 s
//!                                                         ↓
//!                        mel spectrogram → 128px canvas → 1028×512 preview.png
//! ```
//!
//! ## Modules
//!
//! - [`audio`]: WAV I/O, trimming, resampling, mel spectrogram
//! - [`model`]: piano-roll LSTM, generation loop, seed bank
//! - [`midi`]: piano roll → Standard MIDI File
//! - [`synth`]: external MIDI → WAV renderer
//! - [`preview`]: spectrogram preview image
//! - [`pipeline`]: the loaded context and the render operation
//! - [`manager`]: serialized access to one context from async callers

pub mod audio;
pub mod config;
pub mod manager;
pub mod midi;
pub mod model;
pub mod pipeline;
pub mod preview;
pub mod synth;

mod error;

pub use error::{Error, Result};
pub use pipeline::{RenderContext, RenderOutput};
