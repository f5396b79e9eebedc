//! Engine error types.

/// Error raised by the typesetting engine boundary.
#[derive(Clone, Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine ran but produced no output page; `log` carries the
    /// engine's diagnostic output for the failing document.
    #[error("typesetting failed:\n{log}")]
    Render {
        /// Diagnostic log text from the engine.
        log: String,
    },

    /// The engine never became usable (binary image or memory snapshot
    /// failed to load). Fatal for the whole session.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The worker thread is gone (shutdown or panic) and the call was
    /// dropped.
    #[error("engine worker terminated")]
    WorkerGone,
}
