//! Inline TikZ diagram rendering pipeline.
//!
//! Takes diagram elements discovered on a page and turns each one into
//! final SVG markup through a local typesetting engine:
//! - Parse per-element options and fingerprint the render input
//! - Serve repeats from a pluggable cache without touching the engine
//! - Assemble a complete document (packages, libraries, preamble,
//!   non-native character fallbacks) around the element text
//! - Typeset through the single shared engine instance, one batch at a time
//! - Post-process the raw output (id namespacing, character restoration,
//!   page composition, accessibility label, optional font inlining)
//!
//! # Architecture
//!
//! - [`options`]: per-element attribute parsing (`ElementOptions`)
//! - [`fingerprint`]: content-addressed render identity
//! - [`assemble`]: document assembly around the element source
//! - [`postprocess`]: raw engine markup → page-safe final markup
//! - [`fonts`]: font fetching and `@font-face` inlining
//! - [`queue`]: single-flight FIFO ordering of render batches
//! - [`discovery`] / [`events`]: channel in, [`PageSink`] notifications out
//! - [`controller`]: the element lifecycle tying it all together
//! - [`runtime`]: activation, wiring, and teardown
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tkz_cache::FileCache;
//! use tkz_render::{ActivationGuard, Runtime, RuntimeConfig};
//!
//! let guard = ActivationGuard::new();
//! let runtime = Runtime::activate(
//!     &guard,
//!     engine,
//!     "assets".into(),
//!     RuntimeConfig {
//!         sink: Arc::new(page),
//!         cache: Arc::new(FileCache::new("cache".into(), "1")?),
//!         fonts: None,
//!     },
//! )
//! .expect("pipeline already active");
//!
//! let discovery = runtime.discovery();
//! // feed RenderableElements as the page scanner finds them
//! ```

pub mod assemble;
pub mod controller;
pub mod discovery;
pub mod events;
pub mod fingerprint;
pub mod fonts;
pub mod options;
pub mod postprocess;
pub mod queue;
pub mod runtime;

pub use controller::RenderController;
pub use discovery::{DiscoveryReceiver, DiscoverySender, RenderableElement, discovery_channel};
pub use events::{ElementId, PageSink, RenderFinished, RenderStatus};
pub use fingerprint::{Fingerprint, fingerprint};
pub use fonts::{DirFontProvider, FontProvider, HttpFontProvider};
pub use options::{ElementOptions, TIKZ_MIME_TYPE};
pub use postprocess::{PostprocessOptions, postprocess};
pub use runtime::{ActivationGuard, Runtime, RuntimeConfig};
