//! One-shot render CLI.
//!
//! Loads the seed bank, metadata and weights, renders one seed, and writes
//! `music.midi`, `music.wav` and `preview.png` into `--output-dir`.
//!
//! # Output
//!
//! On success prints a one-line JSON summary to stdout:
//!
//! ```json
//! {"output_dir":"/tmp/render","midi_end_time_s":12.5,"duration_s":12.6,"sample_rate":44100,"channels":2}
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use std::path::PathBuf;

use clap::Parser;
use musicgen_render::{RenderContext, config::RenderConfig};

#[derive(Parser, Debug)]
#[command(
    name = "musicgen-render",
    about = "Render a seed-conditioned generation to MIDI, WAV and a preview image"
)]
struct Args {
    /// Index into the seed bank.
    #[arg(long, short = 's', allow_negative_numbers = true)]
    seed: i64,

    /// Seconds of music to generate.
    #[arg(long, short = 'd', default_value_t = 30.0)]
    duration: f64,

    /// Directory receiving music.midi, music.wav and preview.png. Created if missing.
    #[arg(long, short = 'o')]
    output_dir: PathBuf,

    /// Seed bank (safetensors).
    #[arg(long, default_value = "seeds.safetensors")]
    seeds: PathBuf,

    /// Model metadata (JSON).
    #[arg(long, default_value = "meta.json")]
    meta: PathBuf,

    /// Model weights (.safetensors or PyTorch .pth).
    #[arg(long, default_value = "weights.safetensors")]
    weights: PathBuf,

    /// Soundfont used by fluidsynth.
    #[arg(long, default_value = "FluidR3_GM.sf2")]
    soundfont: PathBuf,

    /// fluidsynth executable.
    #[arg(long, default_value = "fluidsynth")]
    fluidsynth: PathBuf,

    /// CUDA device ordinal (0 = first GPU). Falls back to CPU when unavailable.
    #[arg(long, default_value_t = 0)]
    cuda_device: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if !(args.duration.is_finite() && args.duration > 0.0) {
        anyhow::bail!("duration must be positive, got {}", args.duration);
    }

    std::fs::create_dir_all(&args.output_dir)?;

    let config = RenderConfig {
        seeds_path: args.seeds,
        meta_path: args.meta,
        weights_path: args.weights,
        soundfont_path: args.soundfont,
        fluidsynth_bin: args.fluidsynth,
        cuda_device: args.cuda_device,
        ..RenderConfig::default()
    };

    let context = RenderContext::load(&config)
        .map_err(|e| anyhow::anyhow!("failed to load render context: {e}"))?;

    let output = context
        .postprocess(args.seed, args.duration, &args.output_dir)
        .map_err(|e| anyhow::anyhow!("render failed: {e}"))?;

    let summary = serde_json::json!({
        "output_dir": args.output_dir,
        "midi_end_time_s": output.midi_end_time_s,
        "duration_s": output.duration_s(),
        "sample_rate": output.sample_rate,
        "channels": output.channels,
    });
    println!("{summary}");

    Ok(())
}
