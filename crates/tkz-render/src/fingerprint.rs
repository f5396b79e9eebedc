//! Content fingerprinting of renderable elements.
//!
//! The fingerprint is the content-addressed identity of an element: cache
//! key, id-namespacing token and dedup handle all derive from it. It is a
//! collision-resistant digest, not a secret.

use sha2::{Digest, Sha256};

use crate::options::ElementOptions;

/// Number of digest characters used for id namespacing.
const SHORT_LEN: usize = 12;

/// Content-addressed digest of an element's configuration and source text.
///
/// 64 lowercase hex characters (SHA-256). Identical `(configuration, text)`
/// pairs always produce identical fingerprints; the configuration half is
/// canonicalized so attribute ordering does not matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full digest, used as the cache key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest prefix embedded into rewritten internal ids.
    ///
    /// 48 bits of digest is ample for collision avoidance within one page
    /// while keeping rewritten ids compact.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }

    /// Derive a distinct fingerprint by mixing in `salt`.
    ///
    /// Cache-bypassing elements with identical source would otherwise share
    /// a namespacing token; salting with a per-element value keeps their
    /// rewritten ids from colliding on the same page.
    #[must_use]
    pub fn salted(&self, salt: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.update(salt.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of one element.
///
/// Pure and deterministic: SHA-256 over the canonical configuration
/// serialization concatenated with the raw source text. Called exactly once
/// per element per rendering attempt; the result is carried for the rest of
/// the element's lifetime (cache read, cache write, id namespacing).
#[must_use]
pub fn fingerprint(options: &ElementOptions, text: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(options.config_string().as_bytes());
    hasher.update(text.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::options::{ATTR_PACKAGES, ATTR_SHOW_CONSOLE, ATTR_WIDTH};

    fn options_from(pairs: &[(&str, &str)]) -> ElementOptions {
        ElementOptions::from_attrs(
            &pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn test_fingerprint_is_repeatable() {
        let options = ElementOptions::default();
        let a = fingerprint(&options, "\\draw (0,0) -- (1,1);");
        let b = fingerprint(&options, "\\draw (0,0) -- (1,1);");

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_text_change_changes_fingerprint() {
        let options = ElementOptions::default();
        let a = fingerprint(&options, "\\draw (0,0) -- (1,1);");
        let b = fingerprint(&options, "\\draw (0,0) -- (1,2);");
        assert_ne!(a, b);
    }

    #[test]
    fn test_configuration_change_changes_fingerprint() {
        let text = "\\draw (0,0) -- (1,1);";
        let plain = ElementOptions::default();
        let mut with_package = plain.clone();
        with_package
            .packages
            .insert("pgfplots".to_owned(), String::new());

        assert_ne!(fingerprint(&plain, text), fingerprint(&with_package, text));
    }

    #[test]
    fn test_dimension_change_changes_fingerprint() {
        let text = "\\draw (0,0) -- (1,1);";
        let default = ElementOptions::default();
        let wide = options_from(&[(ATTR_WIDTH, "300")]);

        assert_ne!(fingerprint(&default, text), fingerprint(&wide, text));
    }

    #[test]
    fn test_flag_change_changes_fingerprint() {
        let text = "\\draw (0,0) -- (1,1);";
        let quiet = ElementOptions::default();
        let console = options_from(&[(ATTR_SHOW_CONSOLE, "true")]);

        assert_ne!(fingerprint(&quiet, text), fingerprint(&console, text));
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let a = ElementOptions::from_attrs(&HashMap::from([(
            ATTR_PACKAGES.to_owned(),
            r#"{"x": "", "y": ""}"#.to_owned(),
        )]));
        let b = ElementOptions::from_attrs(&HashMap::from([(
            ATTR_PACKAGES.to_owned(),
            r#"{"y": "", "x": ""}"#.to_owned(),
        )]));

        assert_eq!(fingerprint(&a, "t"), fingerprint(&b, "t"));
    }

    #[test]
    fn test_salted_fingerprint_differs() {
        let fp = fingerprint(&ElementOptions::default(), "text");
        let a = fp.salted("element#1");
        let b = fp.salted("element#2");

        assert_ne!(a, b);
        assert_ne!(a, fp);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_short_is_a_prefix() {
        let fp = fingerprint(&ElementOptions::default(), "text");
        assert_eq!(fp.short().len(), 12);
        assert!(fp.as_str().starts_with(fp.short()));
    }
}
