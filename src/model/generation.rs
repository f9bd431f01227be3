//! Seed-conditioned autoregressive piano-roll generation.

use candle_core::{D, DType, Device, IndexOp, Tensor};

use super::musicgen::MusicGen;
use crate::config::ModelMeta;

/// Generate a piano roll continuing `seed`.
///
/// - `seed`: `[1, T, P]` piano roll primed into the recurrent state
/// - `duration_s`: seconds of music to produce (see [`ModelMeta::frames_for`])
///
/// Each step thresholds `sigmoid(logits)` at `meta.threshold` and feeds the
/// binary frame back in, so the output is deterministic for fixed weights.
/// Returns `[frames, P]` with values in {0, 1}; the seed itself is not
/// included.
pub fn generate(
    model: &MusicGen,
    meta: &ModelMeta,
    seed: &Tensor,
    duration_s: f64,
    device: &Device,
) -> candle_core::Result<Tensor> {
    let (batch, seed_len, pitches) = seed.dims3()?;
    if batch != 1 {
        candle_core::bail!("seed batch must be 1, got {batch}");
    }
    if pitches != model.n_pitches() {
        candle_core::bail!(
            "seed has {pitches} pitch rows, model expects {}",
            model.n_pitches()
        );
    }

    let seed = seed.to_device(device)?.to_dtype(model.dtype())?;
    let mut state = model.zero_state(1)?;

    // Prime on the seed. An empty seed starts from silence.
    let mut logits = None;
    for t in 0..seed_len {
        let frame = seed.i((.., t, ..))?;
        let (l, s) = model.step(&frame, &state)?;
        logits = Some(l);
        state = s;
    }
    let mut logits = match logits {
        Some(l) => l,
        None => {
            let silence = Tensor::zeros((1, pitches), model.dtype(), device)?;
            let (l, s) = model.step(&silence, &state)?;
            state = s;
            l
        }
    };

    let num_frames = meta.frames_for(duration_s);
    tracing::debug!(seed_len, num_frames, "generating piano roll");

    let mut frames = Vec::with_capacity(num_frames);
    for step in 0..num_frames {
        let probs = candle_nn::ops::sigmoid(&logits.to_dtype(DType::F32)?)?;
        let frame = probs.gt(meta.threshold as f64)?.to_dtype(model.dtype())?;
        frames.push(frame.clone());
        if step + 1 < num_frames {
            let (l, s) = model.step(&frame, &state)?;
            logits = l;
            state = s;
        }
    }

    Tensor::cat(&frames, D::Minus2)?.to_dtype(DType::F32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::{VarBuilder, VarMap};

    fn tiny_model() -> (MusicGen, ModelMeta) {
        let meta = ModelMeta {
            n_pitches: 16,
            hidden_size: 8,
            num_layers: 1,
            frames_per_second: 4.0,
            ..ModelMeta::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        (MusicGen::new(&meta, vb).unwrap(), meta)
    }

    #[test]
    fn test_generate_shape_and_binary_values() {
        let (model, meta) = tiny_model();
        let seed = Tensor::ones((1, 3, 16), DType::F32, &Device::Cpu).unwrap();
        let roll = generate(&model, &meta, &seed, 2.0, &Device::Cpu).unwrap();
        assert_eq!(roll.dims(), &[8, 16]);
        for row in roll.to_vec2::<f32>().unwrap() {
            assert!(row.iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let (model, meta) = tiny_model();
        let seed = Tensor::zeros((1, 2, 16), DType::F32, &Device::Cpu).unwrap();
        let a = generate(&model, &meta, &seed, 1.5, &Device::Cpu).unwrap();
        let b = generate(&model, &meta, &seed, 1.5, &Device::Cpu).unwrap();
        assert_eq!(a.to_vec2::<f32>().unwrap(), b.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_generate_empty_seed() {
        let (model, meta) = tiny_model();
        let seed = Tensor::zeros((1, 0, 16), DType::F32, &Device::Cpu).unwrap();
        let roll = generate(&model, &meta, &seed, 1.0, &Device::Cpu).unwrap();
        assert_eq!(roll.dims(), &[4, 16]);
    }

    #[test]
    fn test_generate_rejects_wrong_pitch_count() {
        let (model, meta) = tiny_model();
        let seed = Tensor::zeros((1, 2, 12), DType::F32, &Device::Cpu).unwrap();
        assert!(generate(&model, &meta, &seed, 1.0, &Device::Cpu).is_err());
    }
}
