//! Trim synthesized audio to the musical content.
//!
//! Synthesizers keep rendering reverb and release tails past the final
//! note-off. The buffer is cut at `end_time + buffer_s`, never extended.

use super::AudioBuffer;

/// Frames to keep for a score ending at `end_time_s`, clamped to `available_frames`.
pub fn frames_to_keep(
    end_time_s: f64,
    buffer_s: f64,
    sample_rate: u32,
    available_frames: usize,
) -> usize {
    let wanted = ((end_time_s + buffer_s) * sample_rate as f64).round();
    if wanted <= 0.0 {
        return 0;
    }
    (wanted as usize).min(available_frames)
}

/// Truncate `audio` in place. Returns the number of frames kept.
pub fn trim_to_end_time(audio: &mut AudioBuffer, end_time_s: f64, buffer_s: f64) -> usize {
    let keep = frames_to_keep(end_time_s, buffer_s, audio.sample_rate, audio.frames());
    audio.samples.truncate(keep * audio.channels.max(1) as usize);
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: usize, sample_rate: u32) -> AudioBuffer {
        AudioBuffer {
            samples: vec![0.1; frames * 2],
            sample_rate,
            channels: 2,
        }
    }

    #[test]
    fn test_keep_rounds_to_nearest_frame() {
        // (1.0 + 0.1) * 44100 = 48510
        assert_eq!(frames_to_keep(1.0, 0.1, 44100, 1_000_000), 48510);
        // 0.00001 * 100 = 0.001 → 0, 0.006 * 100 = 0.6 → 1
        assert_eq!(frames_to_keep(0.00001, 0.0, 100, 10), 0);
        assert_eq!(frames_to_keep(0.006, 0.0, 100, 10), 1);
    }

    #[test]
    fn test_trim_cuts_tail() {
        let mut audio = stereo(44100 * 3, 44100);
        let kept = trim_to_end_time(&mut audio, 2.0, 0.1);
        assert_eq!(kept, 92610);
        assert_eq!(audio.frames(), 92610);
        assert_eq!(audio.samples.len(), 92610 * 2);
        assert!((audio.duration_s() - 2.1).abs() <= 1.0 / 44100.0);
    }

    #[test]
    fn test_trim_keeps_short_buffer_unchanged() {
        let mut audio = stereo(1000, 44100);
        let before = audio.clone();
        let kept = trim_to_end_time(&mut audio, 5.0, 0.1);
        assert_eq!(kept, 1000);
        assert_eq!(audio, before);
    }

    #[test]
    fn test_trim_empty_score_keeps_only_buffer() {
        let mut audio = stereo(44100, 44100);
        trim_to_end_time(&mut audio, 0.0, 0.1);
        assert_eq!(audio.frames(), 4410);
    }
}
