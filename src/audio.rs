//! Audio utilities.
//!
//! WAV read/write, tail trimming, resampling and mel spectrograms for the
//! render pipeline.

pub mod mel;
mod resample;
mod trim;
mod wav;

pub use resample::resample_mono;
pub use trim::{frames_to_keep, trim_to_end_time};
pub use wav::{AudioBuffer, read_wav, write_wav};
