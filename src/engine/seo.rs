//! Pure text helpers for SEO metadata derivation: markup stripping,
//! sentence-aware truncation, and focus-keyword extraction.

use regex::Regex;
use std::sync::OnceLock;

/// Hard cap for excerpts and meta descriptions.
pub const META_DESCRIPTION_LIMIT: usize = 180;

/// Used when neither the body nor the title yields a focus keyword.
const FALLBACK_KEYWORD: &str = "cultura pop";

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<b>([^<]+)</b>").expect("valid bold regex"))
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+[.!?])\s*").expect("valid sentence regex"))
}

/// Remove all markup from a string, leaving the text content.
pub fn strip_html(input: &str) -> String {
    tag_re().replace_all(input, "").to_string()
}

/// Guarantee a plain-text title: no markup, single-spaced, trimmed.
pub fn sanitize_title(title: &str) -> String {
    let stripped = strip_html(title);
    spaces_re().replace_all(&stripped, " ").trim().to_string()
}

/// Truncate an excerpt to `max_length` characters at a natural boundary.
///
/// A sentence ending at >=60% of the limit wins (no ellipsis). Otherwise the
/// cut falls back to the last word boundary past 70% of the limit, trailing
/// `,;:` punctuation is dropped, and `...` is appended.
pub fn truncate_excerpt(excerpt: &str, max_length: usize) -> String {
    let clean = strip_html(excerpt).trim().to_string();
    let chars: Vec<char> = clean.chars().collect();
    if chars.len() <= max_length {
        return clean;
    }

    let truncated: String = chars[..max_length].iter().collect();

    if let Some(captures) = sentence_re().captures(&truncated) {
        let sentence = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        if sentence.chars().count() as f64 >= max_length as f64 * 0.6 {
            return sentence.trim().to_string();
        }
    }

    // No usable sentence boundary: cut at the last word boundary, but only
    // if it keeps at least 70% of the limit.
    let mut result = truncated.clone();
    if let Some(last_space) = truncated.rfind(' ') {
        let kept = truncated[..last_space].chars().count();
        if kept as f64 > max_length as f64 * 0.7 {
            result = truncated[..last_space].to_string();
        }
    }

    let result = result.trim().trim_end_matches([',', ';', ':']).to_string();
    format!("{}...", result)
}

/// Derive the focus keyword for a rewritten post: the first bold term in the
/// body, else the first two words of the title, else a fixed fallback.
pub fn extract_focus_keyword(title: &str, body: &str) -> String {
    if let Some(captures) = bold_re().captures(body) {
        if let Some(term) = captures.get(1) {
            let term = term.as_str().trim();
            if !term.is_empty() {
                return term.to_string();
            }
        }
    }

    let words: Vec<&str> = title.split_whitespace().collect();
    match words.len() {
        0 => FALLBACK_KEYWORD.to_string(),
        1 => words[0].to_string(),
        _ => format!("{} {}", words[0], words[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title_strips_markup_and_respaces() {
        assert_eq!(sanitize_title("<b>Dune</b> Part Two"), "Dune Part Two");
        assert_eq!(sanitize_title("<b>Dune</b>   Part  Two "), "Dune Part Two");
        assert_eq!(sanitize_title("Plain title"), "Plain title");
    }

    #[test]
    fn test_short_excerpt_passes_through() {
        assert_eq!(truncate_excerpt("Short and sweet.", 180), "Short and sweet.");
    }

    #[test]
    fn test_truncation_prefers_sentence_boundary_without_ellipsis() {
        // Sentence ends at 150 chars, past the 60% threshold of 180.
        let sentence = format!("{}.", "a".repeat(149));
        let excerpt = format!("{} {}", sentence, "b".repeat(100));
        let out = truncate_excerpt(&excerpt, 180);
        assert_eq!(out, sentence);
        assert!(!out.ends_with("..."));
    }

    #[test]
    fn test_truncation_falls_back_to_word_boundary_with_ellipsis() {
        // No sentence boundary; last space inside the limit sits past 70%.
        let excerpt = format!("{} {}", "word ".repeat(34).trim_end(), "c".repeat(100));
        let out = truncate_excerpt(&excerpt, 180);
        assert!(out.ends_with("..."));
        let kept = out.trim_end_matches("...");
        assert!(kept.chars().count() >= 126, "kept {} chars", kept.chars().count());
        assert!(kept.chars().count() <= 180);
        assert!(!kept.ends_with(' '));
    }

    #[test]
    fn test_truncation_strips_html_first() {
        let excerpt = "<p>Uma <b>série</b> incrível.</p>";
        assert_eq!(truncate_excerpt(excerpt, 180), "Uma série incrível.");
    }

    #[test]
    fn test_truncation_drops_dangling_punctuation() {
        // The word-boundary cut lands right after "abc," so the comma goes.
        let excerpt = format!("{} abc, {}", "w".repeat(170), "z".repeat(50));
        let out = truncate_excerpt(&excerpt, 180);
        assert!(out.ends_with("abc..."), "got: {out}");
    }

    #[test]
    fn test_focus_keyword_prefers_first_bold_term() {
        let body = "<p>Texto sobre <b>Stranger Things</b> e <b>Netflix</b>.</p>";
        assert_eq!(extract_focus_keyword("Qualquer título", body), "Stranger Things");
    }

    #[test]
    fn test_focus_keyword_falls_back_to_title_words() {
        assert_eq!(extract_focus_keyword("Duna Parte Dois estreia", "<p>sem negrito</p>"), "Duna Parte");
        assert_eq!(extract_focus_keyword("Duna", "<p>sem negrito</p>"), "Duna");
        assert_eq!(extract_focus_keyword("", "<p>sem negrito</p>"), "cultura pop");
    }
}
