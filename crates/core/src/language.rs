//! Language code handling
//!
//! The pipeline treats languages as plain ISO-639-1 strings everywhere
//! (`Query.selected_language_code`, `Turn.language_code`,
//! `ClassifierResult.detected_language/expected_language`) rather than a
//! closed enum, since the spec never bounds the set of supported
//! languages. See DESIGN.md Open Question #1.

/// Languages routed to the fast chat backend ("Backend-A") by the model
/// router (spec §4.10). All other languages route to the multilingual
/// backend ("Backend-B").
pub const BACKEND_A_LANGS: &[&str] = &["en", "es", "de", "it", "pt"];

/// Returns true if `code` should route to Backend-A.
pub fn is_backend_a_language(code: &str) -> bool {
    BACKEND_A_LANGS.contains(&code.to_ascii_lowercase().as_str())
}

/// Normalizes a free-form language code to the lowercase ISO-639-1 form
/// used as a key throughout the pipeline (cache keys, routing, keyword
/// tables).
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_a_languages() {
        assert!(is_backend_a_language("en"));
        assert!(is_backend_a_language("PT"));
        assert!(!is_backend_a_language("hi"));
        assert!(!is_backend_a_language("zh"));
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_code("  En "), "en");
    }
}
