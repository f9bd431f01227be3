//! Piano-roll LSTM.
//!
//! ```text
//! frame [B, P] ─ input_proj (P→H) ─ LSTM × L ─ head (H→P) ─ logits [B, P]
//! ```
//!
//! Weight names follow the PyTorch module layout (`input_proj.weight`,
//! `lstm.weight_ih_l0`, `head.bias`, ...), so checkpoints exported from a
//! `nn.LSTM(num_layers=L)` load unchanged.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::LSTMState;
use candle_nn::{LSTM, LSTMConfig, Linear, RNN, VarBuilder};

use crate::config::ModelMeta;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct MusicGen {
    input_proj: Linear,
    layers: Vec<LSTM>,
    head: Linear,
    n_pitches: usize,
    device: Device,
    dtype: DType,
}

impl MusicGen {
    pub fn new(meta: &ModelMeta, vb: VarBuilder) -> candle_core::Result<Self> {
        let input_proj = candle_nn::linear(meta.n_pitches, meta.hidden_size, vb.pp("input_proj"))?;
        let layers = (0..meta.num_layers)
            .map(|layer_idx| {
                let cfg = LSTMConfig {
                    layer_idx,
                    ..Default::default()
                };
                candle_nn::lstm(meta.hidden_size, meta.hidden_size, cfg, vb.pp("lstm"))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let head = candle_nn::linear(meta.hidden_size, meta.n_pitches, vb.pp("head"))?;

        Ok(Self {
            input_proj,
            layers,
            head,
            n_pitches: meta.n_pitches,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Load weights from disk and bind the model to `device`.
    ///
    /// `.safetensors` files are memory-mapped. Anything else is read as a
    /// PyTorch pickle; `key` selects the state dict inside the checkpoint
    /// (e.g. `"model"` for `{"model": state_dict, "optimizer": ...}`).
    pub fn load(
        meta: &ModelMeta,
        weights_path: &Path,
        key: Option<&str>,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        tracing::info!("Loading model weights from {:?}", weights_path);
        let is_safetensors = weights_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("safetensors"));

        let vb = if is_safetensors {
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, device)
                    .map_err(|e| Error::WeightLoad(format!("{}: {e}", weights_path.display())))?
            }
        } else {
            let tensors = candle_core::pickle::read_all_with_key(weights_path, key)
                .map_err(|e| Error::WeightLoad(format!("{}: {e}", weights_path.display())))?;
            VarBuilder::from_tensors(tensors.into_iter().collect(), dtype, device)
        };

        Self::new(meta, vb).map_err(|e| Error::WeightLoad(format!("model init: {e}")))
    }

    pub fn n_pitches(&self) -> usize {
        self.n_pitches
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Fresh recurrent state, one entry per layer.
    pub fn zero_state(&self, batch: usize) -> candle_core::Result<Vec<LSTMState>> {
        self.layers.iter().map(|l| l.zero_state(batch)).collect()
    }

    /// Advance one frame.
    ///
    /// Input: `[B, P]` frame. Returns `[B, P]` logits for the next frame and
    /// the updated state.
    pub fn step(
        &self,
        frame: &Tensor,
        state: &[LSTMState],
    ) -> candle_core::Result<(Tensor, Vec<LSTMState>)> {
        let mut h = self.input_proj.forward(frame)?;
        let mut next_state = Vec::with_capacity(self.layers.len());
        for (layer, layer_state) in self.layers.iter().zip(state) {
            let s = layer.step(&h, layer_state)?;
            h = s.h().clone();
            next_state.push(s);
        }
        let logits = self.head.forward(&h)?;
        Ok((logits, next_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn tiny_meta() -> ModelMeta {
        ModelMeta {
            n_pitches: 12,
            hidden_size: 8,
            num_layers: 2,
            ..ModelMeta::default()
        }
    }

    #[test]
    fn test_step_shapes() {
        let meta = tiny_meta();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = MusicGen::new(&meta, vb).unwrap();

        let state = model.zero_state(1).unwrap();
        assert_eq!(state.len(), 2);

        let frame = Tensor::zeros((1, 12), DType::F32, &Device::Cpu).unwrap();
        let (logits, next) = model.step(&frame, &state).unwrap();
        assert_eq!(logits.dims(), &[1, 12]);
        assert_eq!(next.len(), 2);
        assert_eq!(next[1].h().dims(), &[1, 8]);
    }

    #[test]
    fn test_weight_names_match_pytorch_layout() {
        let meta = tiny_meta();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        MusicGen::new(&meta, vb).unwrap();

        let data = varmap.data().lock().unwrap();
        for name in [
            "input_proj.weight",
            "lstm.weight_ih_l0",
            "lstm.weight_hh_l1",
            "lstm.bias_ih_l1",
            "head.bias",
        ] {
            assert!(data.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn test_load_safetensors_roundtrip() {
        let meta = tiny_meta();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        MusicGen::new(&meta, vb).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        varmap.save(&path).unwrap();

        let model = MusicGen::load(&meta, &path, None, &Device::Cpu, DType::F32).unwrap();
        assert_eq!(model.n_pitches(), 12);
    }

    #[test]
    fn test_load_missing_weights_is_weight_error() {
        let err = MusicGen::load(
            &tiny_meta(),
            Path::new("/nonexistent/weights.safetensors"),
            None,
            &Device::Cpu,
            DType::F32,
        )
        .unwrap_err();
        assert!(matches!(err, Error::WeightLoad(_)), "{err}");
    }
}
