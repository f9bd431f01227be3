//! Render manager: keeps the context resident and serializes requests.
//!
//! A [`RenderContext`] must not run two renders at once on the same device.
//! The manager owns one context on a dedicated blocking thread; callers
//! submit [`RenderRequest`]s which are processed one at a time in arrival
//! order.
//!
//! # Example
//!
//! ```no_run
//! use musicgen_render::config::RenderConfig;
//! use musicgen_render::manager::{RenderManager, RenderRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = RenderManager::start(RenderConfig::default()).await.unwrap();
//!     let output = manager
//!         .render(RenderRequest {
//!             seed_index: 0,
//!             duration_s: 10.0,
//!             output_dir: "/tmp/render".into(),
//!         })
//!         .await
//!         .unwrap();
//!     println!("{}", output.wav_path.display());
//! }
//! ```

use std::path::PathBuf;

use candle_core::Device;
use tokio::sync::{mpsc, oneshot};

use crate::config::RenderConfig;
use crate::pipeline::{RenderContext, RenderOutput};
use crate::{Error, Result};

/// One render job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub seed_index: i64,
    pub duration_s: f64,
    pub output_dir: PathBuf,
}

struct PendingRequest {
    request: RenderRequest,
    reply: oneshot::Sender<Result<RenderOutput>>,
}

/// Handle for submitting render requests to a running manager.
#[derive(Clone)]
pub struct RenderManager {
    tx: mpsc::Sender<PendingRequest>,
}

impl RenderManager {
    /// Load the context from `config` and start the worker.
    ///
    /// Returns an error if loading fails; no worker is started in that case.
    pub async fn start(config: RenderConfig) -> Result<Self> {
        let context = tokio::task::spawn_blocking(move || RenderContext::load(&config))
            .await
            .map_err(|join_error| {
                Error::Manager(format!("context load task panicked: {join_error}"))
            })??;
        Ok(Self::with_context(context))
    }

    /// Start a worker around an already-loaded context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_context(context: RenderContext) -> Self {
        let (tx, rx) = mpsc::channel::<PendingRequest>(64);
        tokio::task::spawn_blocking(move || run_manager(context, rx));
        Self { tx }
    }

    /// Submit a render request and wait for the result.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutput> {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<RenderOutput>>();
        self.tx
            .send(PendingRequest {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Manager("manager has shut down".into()))?;

        reply_rx
            .await
            .map_err(|_| Error::Manager("manager dropped reply channel".into()))?
    }
}

/// The manager loop runs in a dedicated blocking thread until every
/// handle is dropped.
fn run_manager(context: RenderContext, mut rx: mpsc::Receiver<PendingRequest>) {
    while let Some(pending) = rx.blocking_recv() {
        let RenderRequest {
            seed_index,
            duration_s,
            output_dir,
        } = pending.request;
        let started = std::time::Instant::now();
        let result = context.postprocess(seed_index, duration_s, &output_dir);
        match &result {
            Ok(_) => tracing::info!(
                seed_index,
                output = %output_dir.display(),
                elapsed_s = started.elapsed().as_secs_f64(),
                "render finished"
            ),
            Err(error) => tracing::warn!(seed_index, %error, "render failed"),
        }
        // Ignore send errors; caller may have gone away.
        let _ = pending.reply.send(result);
    }
    tracing::info!("render manager shut down");
}

/// Return the preferred device: CUDA if available, otherwise CPU.
pub fn preferred_device(cuda_ordinal: usize) -> Device {
    Device::cuda_if_available(cuda_ordinal).unwrap_or(Device::Cpu)
}
