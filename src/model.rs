//! Model components.
//!
//! - [`musicgen`]: piano-roll LSTM and weight loading
//! - [`generation`]: seed-conditioned autoregressive sampling
//! - [`seeds`]: the indexed seed bank

pub mod generation;
pub mod musicgen;
pub mod seeds;

pub use generation::generate;
pub use musicgen::MusicGen;
pub use seeds::SeedBank;
