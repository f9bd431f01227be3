//! Seed bank: precomputed piano-roll openings selected by index.

use std::path::Path;

use candle_core::{Device, IndexOp, Tensor};

use crate::{Error, Result};

/// Name of the stacked seed tensor inside the safetensors file.
pub const SEEDS_TENSOR: &str = "seeds";

/// Read-only bank of `N` seeds, stored as one `[N, T, P]` tensor on the CPU.
#[derive(Debug, Clone)]
pub struct SeedBank {
    seeds: Tensor,
}

impl SeedBank {
    /// Load from a safetensors file holding a `seeds` tensor.
    ///
    /// A file with exactly one tensor is accepted whatever its name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading seed bank from {:?}", path);
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| Error::WeightLoad(format!("seed bank {}: {e}", path.display())))?;

        let seeds = match tensors.remove(SEEDS_TENSOR) {
            Some(t) => t,
            None if tensors.len() == 1 => tensors.into_values().next().ok_or_else(|| {
                Error::WeightLoad(format!("seed bank {} is empty", path.display()))
            })?,
            None => {
                return Err(Error::WeightLoad(format!(
                    "seed bank {} has no '{SEEDS_TENSOR}' tensor",
                    path.display()
                )));
            }
        };
        Self::from_tensor(seeds)
    }

    /// Wrap an in-memory `[N, T, P]` tensor.
    pub fn from_tensor(seeds: Tensor) -> Result<Self> {
        if seeds.rank() != 3 {
            return Err(Error::WeightLoad(format!(
                "seed bank must be [N, T, P], got shape {:?}",
                seeds.dims()
            )));
        }
        Ok(Self { seeds })
    }

    pub fn len(&self) -> usize {
        self.seeds.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pitch rows per frame.
    pub fn n_pitches(&self) -> usize {
        self.seeds.dims()[2]
    }

    /// Seed `index` as a `[T, P]` tensor.
    ///
    /// Negative indices and indices past the end are rejected.
    pub fn get(&self, index: i64) -> Result<Tensor> {
        let len = self.len();
        let idx = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(Error::SeedIndex { index, len })?;
        Ok(self.seeds.i(idx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use std::collections::HashMap;

    fn bank(n: usize) -> SeedBank {
        let data: Vec<f32> = (0..n * 4 * 6).map(|i| (i % 2) as f32).collect();
        SeedBank::from_tensor(Tensor::from_vec(data, (n, 4, 6), &Device::Cpu).unwrap()).unwrap()
    }

    #[test]
    fn test_get_valid_index() {
        let bank = bank(3);
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.n_pitches(), 6);
        let seed = bank.get(2).unwrap();
        assert_eq!(seed.dims(), &[4, 6]);
    }

    #[test]
    fn test_get_out_of_range() {
        let bank = bank(3);
        assert!(matches!(
            bank.get(3),
            Err(Error::SeedIndex { index: 3, len: 3 })
        ));
        assert!(matches!(
            bank.get(-1),
            Err(Error::SeedIndex { index: -1, len: 3 })
        ));
    }

    #[test]
    fn test_rejects_wrong_rank() {
        let t = Tensor::zeros((4, 6), DType::F32, &Device::Cpu).unwrap();
        assert!(SeedBank::from_tensor(t).is_err());
    }

    #[test]
    fn test_load_from_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.safetensors");
        let mut tensors = HashMap::new();
        tensors.insert(
            SEEDS_TENSOR.to_string(),
            Tensor::zeros((5, 2, 6), DType::F32, &Device::Cpu).unwrap(),
        );
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let bank = SeedBank::load(&path).unwrap();
        assert_eq!(bank.len(), 5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(matches!(
            SeedBank::load("/nonexistent/seeds.safetensors"),
            Err(Error::WeightLoad(_))
        ));
    }
}
