//! Pipeline assembly and lifecycle.
//!
//! [`Runtime::activate`] wires the whole pipeline together: it moves the
//! typesetting engine onto its worker thread, opens the discovery channel,
//! and spawns the render loop. The engine holds process-wide mutable state,
//! so at most one runtime may be active per [`ActivationGuard`]; the
//! embedder creates one guard for the process (or page) and passes it to
//! every activation attempt. A second activation against the same guard is
//! refused until the first runtime shuts down.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tkz_cache::RenderCache;
use tkz_engine::{EngineHandle, EngineStatus, EngineWorker, Typesetter};

use crate::controller::RenderController;
use crate::discovery::{DiscoverySender, discovery_channel};
use crate::events::PageSink;
use crate::fonts::FontProvider;

/// Tracks whether a pipeline is currently active.
///
/// Owned by the embedder and passed explicitly into
/// [`Runtime::activate`]; clones share the same slot. The slot is claimed
/// on activation and released when the runtime drops.
#[derive(Clone, Default)]
pub struct ActivationGuard {
    active: Arc<AtomicBool>,
}

impl ActivationGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a runtime currently holds this guard's slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn claim(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Everything a runtime needs besides the engine itself.
pub struct RuntimeConfig {
    pub sink: Arc<dyn PageSink>,
    pub cache: Arc<dyn RenderCache>,
    pub fonts: Option<Arc<dyn FontProvider>>,
}

/// Handle to an active render pipeline.
///
/// Dropping the runtime (or calling [`shutdown`](Self::shutdown)) stops the
/// render loop, signals the engine worker, and releases the activation slot.
pub struct Runtime {
    guard: ActivationGuard,
    worker: Option<EngineWorker>,
    engine: EngineHandle,
    render_loop: Option<tokio::task::JoinHandle<()>>,
    sender: DiscoverySender,
}

impl Runtime {
    /// Activate the pipeline against `guard`.
    ///
    /// Returns `None` when another runtime already holds the guard's slot;
    /// the caller keeps using the existing one.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn activate<T: Typesetter>(
        guard: &ActivationGuard,
        typesetter: T,
        asset_root: PathBuf,
        config: RuntimeConfig,
    ) -> Option<Self> {
        if !guard.claim() {
            tracing::warn!("render pipeline already active, ignoring activation");
            return None;
        }

        let (worker, engine) = tkz_engine::spawn(typesetter, asset_root);
        let (sender, receiver) = discovery_channel();
        let controller = match config.fonts {
            Some(fonts) => {
                RenderController::with_fonts(engine.clone(), config.sink, config.cache, fonts)
            }
            None => RenderController::new(engine.clone(), config.sink, config.cache),
        };
        let render_loop = tokio::spawn(controller.run(receiver));
        tracing::info!("render pipeline activated");

        Some(Self {
            guard: guard.clone(),
            worker: Some(worker),
            engine,
            render_loop: Some(render_loop),
            sender,
        })
    }

    /// Producer handle for feeding discovered elements into the pipeline.
    #[must_use]
    pub fn discovery(&self) -> DiscoverySender {
        self.sender.clone()
    }

    /// Current lifecycle state of the engine instance.
    #[must_use]
    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }

    /// Stop the pipeline and wait for the engine worker thread to exit.
    pub fn shutdown(mut self) {
        if let Some(task) = self.render_loop.take() {
            task.abort();
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        tracing::info!("render pipeline shut down");
        // Drop releases the activation slot.
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(task) = self.render_loop.take() {
            task.abort();
        }
        // A remaining worker signals its thread from its own drop.
        self.worker.take();
        self.guard.release();
    }
}
