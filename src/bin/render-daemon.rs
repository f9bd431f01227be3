//! Render daemon: Unix socket, line-delimited JSON.
//!
//! Keeps the model resident across requests. Each client connection sends
//! one JSON request line and receives one JSON response line, then closes.
//! Renders are processed one at a time.
//!
//! # Socket path
//!
//! Default: `/tmp/musicgen-render.sock`. Override with `--socket`.
//!
//! # Protocol
//!
//! **Request** (one JSON line):
//! ```json
//! {"seed": 3, "duration_s": 20.0, "output_dir": "/tmp/render-3"}
//! ```
//!
//! **Response on success** (one JSON line):
//! ```json
//! {"ok": true, "midi": "/tmp/render-3/music.midi", "wav": "/tmp/render-3/music.wav",
//!  "preview": "/tmp/render-3/preview.png", "duration_s": 20.1}
//! ```
//!
//! **Response on error** (one JSON line):
//! ```json
//! {"ok": false, "error": "seed index 40 out of range (bank holds 32 seeds)"}
//! ```

use std::path::PathBuf;

use clap::Parser;
use musicgen_render::{
    config::RenderConfig,
    manager::{RenderManager, RenderRequest},
};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "render-daemon",
    about = "Resident render daemon with a Unix socket JSON interface"
)]
struct Args {
    /// Unix socket path to listen on.
    #[arg(long, default_value = "/tmp/musicgen-render.sock")]
    socket: PathBuf,

    #[arg(long, default_value = "seeds.safetensors")]
    seeds: PathBuf,

    #[arg(long, default_value = "meta.json")]
    meta: PathBuf,

    #[arg(long, default_value = "weights.safetensors")]
    weights: PathBuf,

    #[arg(long, default_value = "FluidR3_GM.sf2")]
    soundfont: PathBuf,

    #[arg(long, default_value = "fluidsynth")]
    fluidsynth: PathBuf,

    /// CUDA device ordinal (0 = first GPU).
    #[arg(long, default_value_t = 0)]
    cuda_device: usize,
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Request {
    seed: i64,

    #[serde(default = "default_duration")]
    duration_s: f64,

    output_dir: PathBuf,
}

fn default_duration() -> f64 {
    30.0
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Ok {
        ok: bool, // always true
        midi: PathBuf,
        wav: PathBuf,
        preview: PathBuf,
        duration_s: f64,
    },
    Err {
        ok: bool, // always false
        error: String,
    },
}

impl Response {
    fn err(msg: impl Into<String>) -> Self {
        Self::Err {
            ok: false,
            error: msg.into(),
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Remove stale socket file if present.
    if args.socket.exists() {
        std::fs::remove_file(&args.socket)?;
    }

    let listener = UnixListener::bind(&args.socket)?;
    tracing::info!("Listening on {:?} (loading model...)", args.socket);

    let config = RenderConfig {
        seeds_path: args.seeds,
        meta_path: args.meta,
        weights_path: args.weights,
        soundfont_path: args.soundfont,
        fluidsynth_bin: args.fluidsynth,
        cuda_device: args.cuda_device,
        ..RenderConfig::default()
    };
    let manager = RenderManager::start(config).await?;
    tracing::info!("Render context ready");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let manager = manager.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, manager).await {
                        tracing::warn!("connection error: {e}");
                    }
                });
            }
            Err(e) => {
                tracing::error!("accept error: {e}");
            }
        }
    }
}

// ── Connection handler ────────────────────────────────────────────────────────

async fn handle_connection(stream: UnixStream, manager: RenderManager) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let line = match lines.next_line().await? {
        Some(l) if !l.trim().is_empty() => l,
        _ => {
            send_response(&mut writer, Response::err("empty request")).await?;
            return Ok(());
        }
    };

    let response = process_request(&line, &manager).await;
    send_response(&mut writer, response).await?;
    Ok(())
}

async fn process_request(line: &str, manager: &RenderManager) -> Response {
    let req: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::err(format!("invalid JSON request: {e}")),
    };

    if let Err(e) = std::fs::create_dir_all(&req.output_dir) {
        return Response::err(format!("could not create output directory: {e}"));
    }

    tracing::info!(
        seed = req.seed,
        duration_s = req.duration_s,
        output_dir = %req.output_dir.display(),
        "rendering"
    );

    let request = RenderRequest {
        seed_index: req.seed,
        duration_s: req.duration_s,
        output_dir: req.output_dir,
    };
    match manager.render(request).await {
        Ok(output) => Response::Ok {
            ok: true,
            duration_s: output.duration_s(),
            midi: output.midi_path,
            wav: output.wav_path,
            preview: output.preview_path,
        },
        Err(e) => Response::err(format!("render failed: {e}")),
    }
}

async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: Response,
) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(&response)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}
