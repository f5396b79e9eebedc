//! Output post-processing: raw engine markup to page-safe final markup.
//!
//! Engine output is valid SVG but not safe to inject multiple times into
//! one document: internal ids (glyph definitions, clip paths, font defs)
//! are generated from a fixed counter and collide across diagrams. The
//! post-processor namespaces those ids with the element's fingerprint,
//! restores characters the engine could not natively encode, optionally
//! merges multi-page output into one container, applies the accessibility
//! label and optionally inlines font resources.
//!
//! Every step is idempotent given the same inputs, so re-running the
//! post-processor over its own output is harmless. A malformed engine
//! result (no `<svg` container where one is expected) degrades to returning
//! the input unchanged rather than failing the pipeline.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::fingerprint::Fingerprint;
use crate::fonts::{FontProvider, embed_fonts};

/// Id attribute values generated by the engine or converter: `pgf…` markers
/// plus the converter's glyph/font/clip-path counters (`g1`, `f2`, `cp3`,
/// `glyph4`, …). The trailing digit requirement keeps author-chosen ids out.
static ENGINE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bid=['"]((?:pgf[\w.-]*\d[\w.-]*|(?:glyph|clip|font|cp|g|f)\d[\w.-]*))['"]"#)
        .unwrap()
});

/// Bracketed code-point marker produced by the input assembler's fallback
/// directives, e.g. `[U+2192]`. Tolerant of whitespace and of markup tags
/// splitting the marker (text runs are often broken across tspans).
static UNICODE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:<[^>]*>|\s)*U(?:<[^>]*>|\s)*\+((?:[0-9A-Fa-f]|<[^>]*>|\s){1,24}?)\]")
        .unwrap()
});

/// Opening container tag.
static SVG_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").unwrap());

/// Markup tag, for dropping tags that interrupt a marker.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Per-element post-processing behavior.
#[derive(Clone, Debug)]
pub struct PostprocessOptions {
    /// Merge multi-page engine output into one container. Only triggers
    /// when the engine actually emitted more than one page.
    pub compose_pages: bool,
    /// Inline font resources referenced by the markup.
    pub embed_fonts: bool,
    /// Accessibility label injected into the opening container tag.
    pub aria_label: Option<String>,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            compose_pages: true,
            embed_fonts: false,
            aria_label: None,
        }
    }
}

/// Rewrite raw engine markup into page-safe, cache-ready final markup.
#[must_use]
pub fn postprocess(
    raw_markup: &str,
    source_hash: &Fingerprint,
    options: &PostprocessOptions,
    fonts: Option<&dyn FontProvider>,
) -> String {
    if !SVG_OPEN_RE.is_match(raw_markup) {
        tracing::warn!("engine output contains no svg container, leaving it untouched");
        return raw_markup.to_owned();
    }

    let mut markup = namespace_ids(raw_markup, source_hash);
    markup = restore_unicode(&markup);
    if options.compose_pages {
        markup = compose_pages(&markup);
    }
    if let Some(label) = &options.aria_label {
        markup = apply_aria_label(&markup, label);
    }
    if options.embed_fonts
        && let Some(provider) = fonts
    {
        markup = embed_fonts(&markup, provider);
    }
    markup
}

/// Namespace engine-generated ids with the element fingerprint.
///
/// Collects every id value matching the engine's generator patterns, then
/// rewrites all quoted and `#`-referenced occurrences in one pass. The
/// alternation is ordered longest-first so a shorter id (`g1`) never
/// partially rewrites a longer one (`g12`).
fn namespace_ids(markup: &str, source_hash: &Fingerprint) -> String {
    let prefix = source_hash.short();

    let mut ids: Vec<&str> = ENGINE_ID_RE
        .captures_iter(markup)
        .map(|caps| caps.get(1).unwrap().as_str())
        // Already namespaced output stays stable under re-processing
        .filter(|id| !id.starts_with(prefix))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if ids.is_empty() {
        return markup.to_owned();
    }
    ids.sort_by_key(|id| std::cmp::Reverse(id.len()));

    let alternation = ids
        .iter()
        .map(|id| regex::escape(id))
        .collect::<Vec<_>>()
        .join("|");
    // Ids only ever appear quoted (attributes) or behind '#' (url()/href
    // references), so anchoring on the preceding character is enough.
    // Ids are regex-escaped above, so this cannot fail to compile.
    let occurrence = Regex::new(&format!(r#"(["'#])({alternation})"#)).unwrap();

    occurrence
        .replace_all(markup, |caps: &regex::Captures| {
            format!("{}{prefix}-{}", &caps[1], &caps[2])
        })
        .into_owned()
}

/// Restore characters substituted by the assembler's fallback directives.
///
/// Markers may arrive split across text runs or padded with whitespace;
/// intervening tags are dropped along with the marker. Sequences that do
/// not decode to a valid scalar value are left as-is.
fn restore_unicode(markup: &str) -> String {
    UNICODE_MARKER_RE
        .replace_all(markup, |caps: &regex::Captures| {
            // Tags interrupting the marker belong to the marker's text runs
            // and go away with it; whitespace is insignificant padding.
            let hex: String = TAG_RE
                .replace_all(&caps[1], "")
                .chars()
                .filter(char::is_ascii_hexdigit)
                .collect();
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

/// Merge multi-page engine output into a single container.
///
/// The first container's opening attributes are preserved; every page body
/// is concatenated inside it. Single-page output is returned untouched.
fn compose_pages(markup: &str) -> String {
    let opens: Vec<_> = SVG_OPEN_RE.find_iter(markup).collect();
    if opens.len() < 2 {
        return markup.to_owned();
    }

    let mut merged = String::with_capacity(markup.len());
    // Prolog (XML declaration etc.) ahead of the first page
    merged.push_str(&markup[..opens[0].start()]);
    merged.push_str(opens[0].as_str());

    for open in &opens {
        let body_start = open.end();
        let Some(rel_end) = markup[body_start..].find("</svg>") else {
            tracing::warn!("unterminated svg container, skipping page composition");
            return markup.to_owned();
        };
        merged.push_str(&markup[body_start..body_start + rel_end]);
    }

    merged.push_str("</svg>");
    merged
}

/// Inject `role` and `aria-label` into the opening container tag.
fn apply_aria_label(markup: &str, label: &str) -> String {
    if markup.contains("aria-label=") {
        return markup.to_owned();
    }
    SVG_OPEN_RE
        .replace(markup, |caps: &regex::Captures| {
            let open = caps[0].strip_suffix('>').unwrap();
            format!(r#"{open} role="img" aria-label="{}">"#, escape_attr(label))
        })
        .into_owned()
}

/// Minimal attribute-value escaping.
pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
