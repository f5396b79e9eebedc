//! Page-side notification boundary.
//!
//! The render pipeline never touches the page directly. Every visible
//! effect of a render — swapping in a placeholder, resolving an element to
//! its final markup, marking it broken — goes through the [`PageSink`]
//! trait, so the pipeline can be driven against a real page or a recording
//! stub in tests.

use std::collections::HashMap;

/// Opaque identity of a diagram element on the page.
///
/// Assigned by whoever discovers elements; the pipeline only carries it
/// through to the sink callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Terminal outcome of an element's render attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// Final markup was produced and delivered.
    Success,
    /// The engine rejected the document; the element shows a broken
    /// indicator.
    Error,
}

/// Per-element completion notice delivered after an element reaches a
/// terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderFinished {
    pub status: RenderStatus,
    /// Engine log for failures, empty on success.
    pub message: String,
}

impl RenderFinished {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: RenderStatus::Success,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RenderStatus::Error,
            message: message.into(),
        }
    }
}

/// Receives every page-visible effect of the pipeline.
///
/// Calls for a single element arrive in lifecycle order: at most one
/// `show_placeholder`, then `resolve` + `element_loaded` (+
/// `render_finished` when an engine render actually ran), or `show_broken`
/// + `render_finished` on a rejected document. When the engine is
/// unavailable the placeholder is the final state and no further calls
/// arrive. Calls for different elements may interleave.
pub trait PageSink: Send + Sync {
    /// Replace the element's source text with a temporary placeholder of
    /// the given pixel dimensions while its render is pending.
    fn show_placeholder(&self, id: ElementId, width: u32, height: u32);

    /// Swap the element to its final markup.
    fn resolve(&self, id: ElementId, markup: &str);

    /// Swap the element to a broken-render indicator.
    fn show_broken(&self, id: ElementId);

    /// The element's final markup was inserted, whether freshly rendered
    /// or served from cache.
    fn element_loaded(&self, id: ElementId);

    /// Completion notice with the render outcome and, on failure, the
    /// engine log.
    fn render_finished(&self, id: ElementId, outcome: RenderFinished);
}

/// Sink that records every callback, for driving the pipeline in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: std::sync::Mutex<Vec<SinkCall>>,
}

/// One recorded [`PageSink`] callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkCall {
    Placeholder(ElementId, u32, u32),
    Resolved(ElementId, String),
    Broken(ElementId),
    Loaded(ElementId),
    Finished(ElementId, RenderFinished),
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls for one element, in arrival order.
    #[must_use]
    pub fn calls_for(&self, id: ElementId) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.element() == id)
            .cloned()
            .collect()
    }

    /// Final markup per element, from `Resolved` calls.
    #[must_use]
    pub fn resolved(&self) -> HashMap<ElementId, String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                SinkCall::Resolved(id, markup) => Some((*id, markup.clone())),
                _ => None,
            })
            .collect()
    }
}

impl SinkCall {
    #[must_use]
    pub fn element(&self) -> ElementId {
        match self {
            Self::Placeholder(id, _, _)
            | Self::Resolved(id, _)
            | Self::Broken(id)
            | Self::Loaded(id)
            | Self::Finished(id, _) => *id,
        }
    }
}

impl PageSink for RecordingSink {
    fn show_placeholder(&self, id: ElementId, width: u32, height: u32) {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Placeholder(id, width, height));
    }

    fn resolve(&self, id: ElementId, markup: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Resolved(id, markup.to_owned()));
    }

    fn show_broken(&self, id: ElementId) {
        self.calls.lock().unwrap().push(SinkCall::Broken(id));
    }

    fn element_loaded(&self, id: ElementId) {
        self.calls.lock().unwrap().push(SinkCall::Loaded(id));
    }

    fn render_finished(&self, id: ElementId, outcome: RenderFinished) {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Finished(id, outcome));
    }
}
