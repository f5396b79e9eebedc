//! Font embedding for rendered markup.
//!
//! Engine output references fonts by family name. When an element opts in,
//! the post-processor inlines those fonts as base64 `@font-face` rules so
//! the markup renders identically wherever it is pasted. Fetching is
//! abstracted behind [`FontProvider`]; any individual family failing to
//! fetch degrades that family only — the diagram still renders.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use ureq::Agent;

/// Default HTTP timeout for font fetches.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `font-family` in a style property, e.g. `font-family:cmr10;`.
static STYLE_FAMILY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"font-family\s*:\s*([^;<}]+)").unwrap());

/// `font-family` as a presentation attribute, e.g. `font-family="cmr10"`.
static ATTR_FAMILY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"font-family\s*=\s*["']([^"']+)["']"#).unwrap());

static SVG_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").unwrap());

/// Error raised by a failed font fetch.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of font resources, one per family name.
pub trait FontProvider: Send + Sync {
    /// Fetch the font resource for `family`.
    ///
    /// # Errors
    ///
    /// Returns [`FontError`] when the resource cannot be fetched; the
    /// caller skips that family and keeps going.
    fn fetch(&self, family: &str) -> Result<Vec<u8>, FontError>;
}

/// [`FontProvider`] fetching `{base_url}/{family}.woff2` over HTTP.
pub struct HttpFontProvider {
    agent: Agent,
    base_url: String,
}

impl HttpFontProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: create_agent(DEFAULT_TIMEOUT),
            base_url: base_url.into(),
        }
    }

    /// Set the HTTP timeout for font fetches.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.agent = create_agent(timeout);
        self
    }
}

impl FontProvider for HttpFontProvider {
    fn fetch(&self, family: &str) -> Result<Vec<u8>, FontError> {
        let url = format!("{}/{family}.woff2", self.base_url.trim_end_matches('/'));
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| FontError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FontError::Http(format!("{url} returned {status}")));
        }
        response
            .into_body()
            .read_to_vec()
            .map_err(|e| FontError::Http(e.to_string()))
    }
}

/// [`FontProvider`] reading `{dir}/{family}.woff2` from disk.
///
/// Used for bundled font assets and in tests.
pub struct DirFontProvider {
    dir: PathBuf,
}

impl DirFontProvider {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl FontProvider for DirFontProvider {
    fn fetch(&self, family: &str) -> Result<Vec<u8>, FontError> {
        Ok(std::fs::read(self.dir.join(format!("{family}.woff2")))?)
    }
}

/// Create HTTP agent with the specified timeout.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Distinct font families referenced by the markup, in stable order.
fn font_families(markup: &str) -> BTreeSet<String> {
    let style = STYLE_FAMILY_RE
        .captures_iter(markup)
        .map(|caps| caps[1].trim().trim_matches(['\'', '"']).to_owned());
    let attr = ATTR_FAMILY_RE
        .captures_iter(markup)
        .map(|caps| caps[1].trim().to_owned());
    style.chain(attr).filter(|f| !f.is_empty()).collect()
}

/// Inline every referenced font as a `@font-face` rule.
///
/// The style block lands immediately after the opening container tag. A
/// family whose fetch fails is logged and skipped; if every fetch fails (or
/// the markup references no fonts) the input is returned unchanged.
#[must_use]
pub fn embed_fonts(markup: &str, provider: &dyn FontProvider) -> String {
    if markup.contains("data:font/woff2") {
        // Fonts already embedded by an earlier pass
        return markup.to_owned();
    }

    let mut rules = String::new();
    for family in font_families(markup) {
        match provider.fetch(&family) {
            Ok(bytes) => {
                let encoded = BASE64_STANDARD.encode(&bytes);
                rules.push_str(&format!(
                    "@font-face{{font-family:'{family}';\
                     src:url(data:font/woff2;base64,{encoded}) format('woff2');}}"
                ));
            }
            Err(e) => {
                tracing::warn!("failed to fetch font '{family}', skipping: {e}");
            }
        }
    }
    if rules.is_empty() {
        return markup.to_owned();
    }

    SVG_OPEN_RE
        .replace(markup, |caps: &regex::Captures| {
            format!("{}<style>{rules}</style>", &caps[0])
        })
        .into_owned()
}
