//! MIDI → WAV synthesis.
//!
//! [`FluidSynth`] shells out to the `fluidsynth` command-line renderer with a
//! fixed soundfont. The child is waited on and its exit status checked; a
//! failed or silent run surfaces as [`Error::Synth`] with the captured stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Result};

/// Renders a MIDI file to a WAV file.
pub trait Synthesizer: Send + Sync {
    fn render(&self, midi_path: &Path, wav_path: &Path) -> Result<()>;
}

/// Soundfont-based offline renderer backed by the `fluidsynth` CLI.
#[derive(Debug, Clone)]
pub struct FluidSynth {
    binary: PathBuf,
    soundfont: PathBuf,
    sample_rate: u32,
    gain: f32,
}

impl FluidSynth {
    /// Fails if the soundfont does not exist.
    pub fn new(binary: impl Into<PathBuf>, soundfont: impl Into<PathBuf>) -> Result<Self> {
        let soundfont = soundfont.into();
        if !soundfont.is_file() {
            return Err(Error::Synth(format!(
                "soundfont not found: {}",
                soundfont.display()
            )));
        }
        Ok(Self {
            binary: binary.into(),
            soundfont,
            sample_rate: 44100,
            gain: 0.2,
        })
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn soundfont(&self) -> &Path {
        &self.soundfont
    }

    fn command(&self, midi_path: &Path, wav_path: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-ni")
            .arg("-g")
            .arg(self.gain.to_string())
            .arg(&self.soundfont)
            .arg(midi_path)
            .arg("-F")
            .arg(wav_path)
            .arg("-r")
            .arg(self.sample_rate.to_string());
        cmd
    }
}

impl Synthesizer for FluidSynth {
    fn render(&self, midi_path: &Path, wav_path: &Path) -> Result<()> {
        let output = self.command(midi_path, wav_path).output().map_err(|e| {
            Error::Synth(format!("failed to run {}: {e}", self.binary.display()))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Synth(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let written = std::fs::metadata(wav_path).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::Synth(format!(
                "{} produced no audio at {}",
                self.binary.display(),
                wav_path.display()
            )));
        }

        tracing::debug!(bytes = written, wav = %wav_path.display(), "fluidsynth finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soundfont(dir: &Path) -> PathBuf {
        let path = dir.join("test.sf2");
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[test]
    fn test_missing_soundfont_rejected() {
        let err = FluidSynth::new("fluidsynth", "/nonexistent/FluidR3_GM.sf2").unwrap_err();
        assert!(matches!(err, Error::Synth(_)), "{err}");
    }

    #[test]
    fn test_command_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let sf = soundfont(dir.path());
        let synth = FluidSynth::new("fluidsynth", &sf).unwrap().with_sample_rate(48000);
        let cmd = synth.command(Path::new("in.midi"), Path::new("out.wav"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-ni".to_string(),
                "-g".into(),
                "0.2".into(),
                sf.to_string_lossy().into_owned(),
                "in.midi".into(),
                "-F".into(),
                "out.wav".into(),
                "-r".into(),
                "48000".into(),
            ]
        );
    }

    #[test]
    fn test_missing_binary_is_synth_error() {
        let dir = tempfile::tempdir().unwrap();
        let sf = soundfont(dir.path());
        let synth = FluidSynth::new("/nonexistent/fluidsynth-binary", &sf).unwrap();
        let err = synth
            .render(&dir.path().join("in.midi"), &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(matches!(err, Error::Synth(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_synth_error() {
        let dir = tempfile::tempdir().unwrap();
        let sf = soundfont(dir.path());
        // `false` ignores its arguments and exits 1.
        let synth = FluidSynth::new("false", &sf).unwrap();
        let err = synth
            .render(&dir.path().join("in.midi"), &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_synth_error() {
        let dir = tempfile::tempdir().unwrap();
        let sf = soundfont(dir.path());
        let synth = FluidSynth::new("true", &sf).unwrap();
        let err = synth
            .render(&dir.path().join("in.midi"), &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("produced no audio"), "{err}");
    }
}
