//! Input assembly: raw diagram text to a complete engine document.
//!
//! A purely textual transform with no I/O. The assembler strips blank
//! lines, synthesizes a preamble from the element's declared packages and
//! libraries, substitutes fallback markers for characters outside the
//! engine's native 8-bit input range, and wraps everything between document
//! boundary markers unless the text already carries its own.

use std::collections::BTreeSet;

use crate::options::ElementOptions;

/// Document boundary markers recognized in raw input and synthesized around
/// bare fragments.
pub const DOCUMENT_BEGIN: &str = "\\begin{document}";
pub const DOCUMENT_END: &str = "\\end{document}";

/// Highest code point the engine accepts natively.
const NATIVE_INPUT_MAX: u32 = 0xFF;

/// Assemble the complete document text for one element.
#[must_use]
pub fn assemble(raw_text: &str, options: &ElementOptions) -> String {
    let text = strip_blank_lines(raw_text);
    let preamble = build_preamble(&text, options);

    if let Some(pos) = text.find(DOCUMENT_BEGIN) {
        // The element brought its own document boundary: everything before
        // it is head material merged after the synthesized preamble.
        let head = text[..pos].trim_end();
        let body = &text[pos..];
        if head.is_empty() {
            format!("{preamble}\n{body}")
        } else {
            format!("{preamble}\n{head}\n{body}")
        }
    } else {
        format!("{preamble}\n{DOCUMENT_BEGIN}\n{text}\n{DOCUMENT_END}")
    }
}

/// Remove blank (or whitespace-only) lines.
fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct characters outside the engine's native input range, sorted by
/// code point so the synthesized directives are deterministic.
fn unsupported_chars(text: &str) -> BTreeSet<char> {
    text.chars()
        .filter(|c| u32::from(*c) > NATIVE_INPUT_MAX)
        .collect()
}

/// Directive making the engine render a bracketed code-point marker for a
/// character it cannot encode. The post-processor rewrites the marker back
/// to the original character.
fn fallback_directive(c: char) -> String {
    let code = u32::from(c);
    format!("\\DeclareUnicodeCharacter{{{code:04X}}}{{[U+{code:04X}]}}")
}

fn build_preamble(text: &str, options: &ElementOptions) -> String {
    let mut lines = Vec::new();

    for (name, opts) in &options.packages {
        if opts.is_empty() {
            lines.push(format!("\\usepackage{{{name}}}"));
        } else {
            lines.push(format!("\\usepackage[{opts}]{{{name}}}"));
        }
    }
    // tikz-cd output needs the matching library loaded alongside the package
    if options.packages.contains_key("tikz-cd") {
        lines.push("\\usetikzlibrary{cd}".to_owned());
    }

    if !options.libraries.is_empty() {
        lines.push(format!(
            "\\usetikzlibrary{{{}}}",
            options.libraries.join(",")
        ));
    }

    for c in unsupported_chars(text) {
        lines.push(fallback_directive(c));
    }

    if !options.preamble.is_empty() {
        lines.push(options.preamble.clone());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_wraps_bare_fragment() {
        let options = ElementOptions::default();
        let document = assemble("\\draw (0,0) -- (1,1);", &options);

        assert_eq!(
            document,
            "\n\\begin{document}\n\\draw (0,0) -- (1,1);\n\\end{document}"
        );
    }

    #[test]
    fn test_strips_blank_lines() {
        let options = ElementOptions::default();
        let document = assemble("\\draw (0,0);\n\n   \n\\draw (1,1);", &options);

        assert!(document.contains("\\draw (0,0);\n\\draw (1,1);"));
        assert!(!document.contains("\n\n"));
    }

    #[test]
    fn test_package_directives() {
        let mut options = ElementOptions::default();
        options.packages.insert("pgfplots".to_owned(), String::new());
        options
            .packages
            .insert("chemfig".to_owned(), "atom sep=2em".to_owned());

        let document = assemble("\\draw;", &options);

        // BTreeMap order: chemfig before pgfplots
        let chemfig = document.find("\\usepackage[atom sep=2em]{chemfig}").unwrap();
        let pgfplots = document.find("\\usepackage{pgfplots}").unwrap();
        assert!(chemfig < pgfplots);
    }

    #[test]
    fn test_tikz_cd_compatibility_directive() {
        let mut options = ElementOptions::default();
        options.packages.insert("tikz-cd".to_owned(), String::new());

        let document = assemble("\\draw;", &options);

        assert!(document.contains("\\usepackage{tikz-cd}"));
        assert!(document.contains("\\usetikzlibrary{cd}"));
    }

    #[test]
    fn test_library_directive() {
        let mut options = ElementOptions::default();
        options.libraries = vec!["arrows.meta".to_owned(), "positioning".to_owned()];

        let document = assemble("\\draw;", &options);
        assert!(document.contains("\\usetikzlibrary{arrows.meta,positioning}"));
    }

    #[test]
    fn test_user_preamble_comes_last() {
        let mut options = ElementOptions::default();
        options.packages.insert("tikz".to_owned(), String::new());
        options.preamble = "\\newcommand{\\R}{\\mathbb{R}}".to_owned();

        let document = assemble("\\draw;", &options);

        let pkg = document.find("\\usepackage{tikz}").unwrap();
        let user = document.find("\\newcommand{\\R}").unwrap();
        let begin = document.find(DOCUMENT_BEGIN).unwrap();
        assert!(pkg < user && user < begin);
    }

    #[test]
    fn test_unsupported_char_fallback() {
        let options = ElementOptions::default();
        let document = assemble("\\node {héllo → x};", &options);

        // One directive per distinct character above U+00FF; é (U+00E9) is
        // within the native range and needs none.
        assert!(document.contains("\\DeclareUnicodeCharacter{2192}{[U+2192]}"));
        assert!(!document.contains("\\DeclareUnicodeCharacter{00E9}"));
    }

    #[test]
    fn test_unsupported_char_directives_are_distinct() {
        let options = ElementOptions::default();
        let document = assemble("→ → ∀", &options);

        assert_eq!(document.matches("{2192}").count(), 1);
        assert!(document.contains("\\DeclareUnicodeCharacter{2200}{[U+2200]}"));
    }

    #[test]
    fn test_existing_document_boundary_preserved() {
        let mut options = ElementOptions::default();
        options.packages.insert("tikz".to_owned(), String::new());

        let raw = "\\newcommand{\\x}{1}\n\\begin{document}\n\\draw;\n\\end{document}";
        let document = assemble(raw, &options);

        // Head material lands between the synthesized preamble and the body
        let pkg = document.find("\\usepackage{tikz}").unwrap();
        let head = document.find("\\newcommand{\\x}{1}").unwrap();
        let begin = document.find(DOCUMENT_BEGIN).unwrap();
        assert!(pkg < head && head < begin);
        // No second boundary synthesized
        assert_eq!(document.matches(DOCUMENT_BEGIN).count(), 1);
        assert_eq!(document.matches(DOCUMENT_END).count(), 1);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let mut options = ElementOptions::default();
        options.packages.insert("a".to_owned(), String::new());
        options.packages.insert("b".to_owned(), String::new());

        let raw = "∀x → y";
        assert_eq!(assemble(raw, &options), assemble(raw, &options));
    }
}
