//! Per-element rendering options.
//!
//! Renderable elements carry their configuration as string-keyed data
//! attributes on the host page. [`ElementOptions::from_attrs`] parses the
//! recognized keys leniently: malformed values fall back to defaults with a
//! log line, and unknown keys are ignored (also logged), so one bad
//! attribute never blocks a render.

use std::collections::{BTreeMap, HashMap};

/// Content-type marker identifying renderable elements on the host page.
pub const TIKZ_MIME_TYPE: &str = "text/tikz";

/// Default placeholder edge length in pixels.
pub const DEFAULT_SIZE: u32 = 75;

/// JSON-encoded map of package name to bracketed package options.
pub const ATTR_PACKAGES: &str = "data-packages";
/// Comma-separated list of diagram-library extensions.
pub const ATTR_LIBRARIES: &str = "data-libs";
/// Free-form preamble text appended after the synthesized preamble.
pub const ATTR_PREAMBLE: &str = "data-preamble";
/// Explicit placeholder width in pixels.
pub const ATTR_WIDTH: &str = "data-width";
/// Explicit placeholder height in pixels.
pub const ATTR_HEIGHT: &str = "data-height";
/// Opt this element out of cache reads and writes.
pub const ATTR_NO_CACHE: &str = "data-no-cache";
/// Accessibility label injected into the rendered container.
pub const ATTR_ARIA_LABEL: &str = "data-aria-label";
/// Echo the engine's console output into the process log.
pub const ATTR_SHOW_CONSOLE: &str = "data-show-console";
/// Inline font resources into the rendered markup.
pub const ATTR_EMBED_FONTS: &str = "data-embed-fonts";

const KNOWN_ATTRS: &[&str] = &[
    ATTR_PACKAGES,
    ATTR_LIBRARIES,
    ATTR_PREAMBLE,
    ATTR_WIDTH,
    ATTR_HEIGHT,
    ATTR_NO_CACHE,
    ATTR_ARIA_LABEL,
    ATTR_SHOW_CONSOLE,
    ATTR_EMBED_FONTS,
];

/// Parsed configuration of one renderable element.
///
/// Packages are kept in a `BTreeMap` so iteration order (and therefore the
/// assembled preamble and the fingerprint) is canonical regardless of the
/// JSON key order in the attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementOptions {
    /// Package name → bracketed options ("" for none).
    pub packages: BTreeMap<String, String>,
    /// Diagram-library extensions.
    pub libraries: Vec<String>,
    /// User-supplied free-form preamble.
    pub preamble: String,
    /// Placeholder width (0 means use [`DEFAULT_SIZE`]).
    width: u32,
    /// Placeholder height (0 means use [`DEFAULT_SIZE`]).
    height: u32,
    /// Bypass cache reads and writes for this element.
    pub no_cache: bool,
    /// Accessibility label for the rendered container.
    pub aria_label: Option<String>,
    /// Echo the engine console into the log.
    pub show_console: bool,
    /// Inline font resources into the output.
    pub embed_fonts: bool,
}

impl ElementOptions {
    /// Parse options from an element's attribute map.
    #[must_use]
    pub fn from_attrs(attrs: &HashMap<String, String>) -> Self {
        let mut options = Self::default();

        if let Some(raw) = attrs.get(ATTR_PACKAGES) {
            options.packages = parse_package_map(raw);
        }
        if let Some(raw) = attrs.get(ATTR_LIBRARIES) {
            options.libraries = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(raw) = attrs.get(ATTR_PREAMBLE) {
            options.preamble = raw.clone();
        }
        options.width = parse_dimension(attrs.get(ATTR_WIDTH), ATTR_WIDTH);
        options.height = parse_dimension(attrs.get(ATTR_HEIGHT), ATTR_HEIGHT);
        options.no_cache = parse_flag(attrs.get(ATTR_NO_CACHE));
        options.aria_label = attrs.get(ATTR_ARIA_LABEL).cloned();
        options.show_console = parse_flag(attrs.get(ATTR_SHOW_CONSOLE));
        options.embed_fonts = parse_flag(attrs.get(ATTR_EMBED_FONTS));

        for key in attrs.keys().filter(|k| !KNOWN_ATTRS.contains(&k.as_str())) {
            tracing::debug!("ignoring unknown element attribute '{key}'");
        }

        options
    }

    /// Placeholder width, falling back to the default.
    #[must_use]
    pub fn width(&self) -> u32 {
        if self.width == 0 { DEFAULT_SIZE } else { self.width }
    }

    /// Placeholder height, falling back to the default.
    #[must_use]
    pub fn height(&self) -> u32 {
        if self.height == 0 {
            DEFAULT_SIZE
        } else {
            self.height
        }
    }

    /// Canonical serialization used as the configuration half of the
    /// fingerprint input. Every configuration key participates, so changing
    /// any option always produces a new fingerprint.
    #[must_use]
    pub fn config_string(&self) -> String {
        let mut out = String::new();
        for (name, opts) in &self.packages {
            out.push_str(&format!("pkg:{name}={opts};"));
        }
        for lib in &self.libraries {
            out.push_str(&format!("lib:{lib};"));
        }
        out.push_str(&format!("preamble:{};", self.preamble));
        out.push_str(&format!("width:{};height:{};", self.width, self.height));
        out.push_str(&format!("no-cache:{};", self.no_cache));
        out.push_str(&format!("show-console:{};", self.show_console));
        out.push_str(&format!("embed-fonts:{};", self.embed_fonts));
        if let Some(label) = &self.aria_label {
            out.push_str(&format!("aria:{label};"));
        }
        out
    }
}

/// Parse the JSON package map, e.g. `{"tikz-cd": "", "pgfplots": "v1.18"}`.
///
/// Non-object JSON and non-string values are dropped with a log line.
fn parse_package_map(raw: &str) -> BTreeMap<String, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(opts) => Some((name, opts)),
                serde_json::Value::Null => Some((name, String::new())),
                other => {
                    tracing::debug!("package '{name}' has non-string options {other}, skipping");
                    None
                }
            })
            .collect(),
        Ok(other) => {
            tracing::debug!("{ATTR_PACKAGES} is not a JSON object: {other}");
            BTreeMap::new()
        }
        Err(e) => {
            tracing::debug!("failed to parse {ATTR_PACKAGES}: {e}");
            BTreeMap::new()
        }
    }
}

fn parse_dimension(raw: Option<&String>, attr: &str) -> u32 {
    match raw {
        None => 0,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::debug!("invalid {attr} value '{value}', using default");
            0
        }),
    }
}

/// Flag attributes are truthy unless explicitly "false"/"0"/"" (presence of
/// the attribute is the signal).
fn parse_flag(raw: Option<&String>) -> bool {
    match raw.map(|s| s.trim()) {
        None => false,
        Some("false" | "0" | "") => false,
        Some(_) => true,
    }
}
