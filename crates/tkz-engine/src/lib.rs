//! Typesetting engine boundary for tkz.
//!
//! The actual typesetting engine (a TeX build plus a DVI-to-SVG converter)
//! is an external collaborator: a single, stateful, non-reentrant instance
//! that must be addressed by at most one caller at a time. This crate owns
//! that constraint so the rest of the pipeline never touches the engine
//! directly:
//!
//! - [`Typesetter`]: the engine interface (`load` once, then `texify` calls)
//! - [`spawn`]: moves a [`Typesetter`] onto a dedicated worker thread and
//!   returns an [`EngineHandle`] that serializes all calls through a channel
//! - [`EngineStatus`]: `Initializing | Ready | Failed` lifecycle of the
//!   shared instance, published through a watch channel
//!
//! Jobs submitted while the engine is still loading simply queue; jobs
//! submitted after a failed load are answered with
//! [`EngineError::Unavailable`].
//!
//! # Example
//!
//! ```ignore
//! use tkz_engine::{spawn, MockTypesetter, TexOptions};
//!
//! // Requires the `mock` feature (or a real Typesetter implementation).
//! let (worker, handle) = spawn(MockTypesetter::fixed("<svg/>"), "assets".into());
//! let markup = handle.texify("\\begin{document}...", &TexOptions::default()).await;
//! assert_eq!(markup.unwrap(), "<svg/>");
//! worker.shutdown();
//! ```

use std::path::Path;

mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod worker;

pub use error::EngineError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTypesetter;
pub use worker::{EngineHandle, EngineWorker, spawn};

/// Per-call options forwarded to the engine.
#[derive(Clone, Debug, Default)]
pub struct TexOptions {
    /// Echo the engine's console output into the process log.
    pub show_console: bool,
}

/// Lifecycle state of the shared engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// The binary image and memory snapshot are still loading.
    Initializing,
    /// Loaded and accepting render calls.
    Ready,
    /// Loading failed; the engine is unusable for the rest of the session.
    Failed,
}

/// The external typesetting engine plus markup converter.
///
/// Implementations are stateful and not reentrant: `texify` must never be
/// called concurrently, which is why instances are driven exclusively from
/// the worker thread created by [`spawn`]. Engine-internal filesystem state
/// is reset at the end of each call, so calls are independent even though
/// the instance is shared.
pub trait Typesetter: Send + 'static {
    /// One-time initialization: load the engine's binary image and memory
    /// snapshot from `asset_root`.
    fn load(&mut self, asset_root: &Path) -> Result<(), EngineError>;

    /// Typeset a complete document and return the converted markup.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Render`] carrying the engine's diagnostic log
    /// when no output page-description binary was produced.
    fn texify(&mut self, document: &str, options: &TexOptions) -> Result<String, EngineError>;
}
