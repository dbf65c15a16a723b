//! Parser for the structured rewrite response: four ordered labeled
//! sections. Title, excerpt, and body are mandatory; a missing one is a
//! parse failure. The SEO score defaults to 0 when absent.

use super::RewriteResult;
use crate::engine::seo::sanitize_title;
use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

const TITLE_HEADER: &str = "## Novo Título:";
const EXCERPT_HEADER: &str = "## Novo Resumo:";
const BODY_HEADER: &str = "## Novo Conteúdo:";
const SCORE_HEADER: &str = "## SEO Score:";

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid digits regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Excerpt,
    Body,
    Score,
}

/// Parse the raw model output into a validated [`RewriteResult`].
pub fn parse_response(raw: &str) -> Result<RewriteResult> {
    let mut title: Option<Vec<String>> = None;
    let mut excerpt: Option<Vec<String>> = None;
    let mut body: Option<Vec<String>> = None;
    let mut seo_score: u32 = 0;
    let mut score_found = false;
    let mut current: Option<Section> = None;

    for line in raw.trim().lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(TITLE_HEADER) {
            current = Some(Section::Title);
            // The title must be plain text whatever the model produced.
            title = Some(vec![sanitize_title(rest.trim())]);
        } else if let Some(rest) = line.strip_prefix(EXCERPT_HEADER) {
            current = Some(Section::Excerpt);
            excerpt = Some(vec![rest.trim().to_string()]);
        } else if let Some(rest) = line.strip_prefix(BODY_HEADER) {
            current = Some(Section::Body);
            body = Some(vec![rest.trim().to_string()]);
        } else if let Some(rest) = line.strip_prefix(SCORE_HEADER) {
            current = Some(Section::Score);
            if let Some(value) = first_digit_run(rest) {
                seo_score = value;
                score_found = true;
            }
        } else if !line.is_empty() {
            match current {
                Some(Section::Title) => {
                    if let Some(parts) = title.as_mut() {
                        parts.push(sanitize_title(line));
                    }
                }
                Some(Section::Excerpt) => {
                    if let Some(parts) = excerpt.as_mut() {
                        parts.push(line.to_string());
                    }
                }
                Some(Section::Body) => {
                    if let Some(parts) = body.as_mut() {
                        parts.push(line.to_string());
                    }
                }
                Some(Section::Score) => {
                    // The score usually sits on the line below the header.
                    // Only the first digit run counts; trailing commentary
                    // is ignored.
                    if !score_found {
                        if let Some(value) = first_digit_run(line) {
                            seo_score = value;
                            score_found = true;
                        }
                    }
                }
                None => {}
            }
        }
    }

    let title = join_section(title);
    let excerpt = join_section(excerpt);
    let body = join_section(body);

    let mut missing = Vec::new();
    if title.is_empty() {
        missing.push("title");
    }
    if excerpt.is_empty() {
        missing.push("excerpt");
    }
    if body.is_empty() {
        missing.push("body");
    }
    if !missing.is_empty() {
        anyhow::bail!(
            "rewrite response missing required sections: {}",
            missing.join(", ")
        );
    }

    Ok(RewriteResult {
        title,
        excerpt,
        body,
        seo_score,
    })
}

fn first_digit_run(text: &str) -> Option<u32> {
    digits_re().find(text).and_then(|m| m.as_str().parse().ok())
}

fn join_section(parts: Option<Vec<String>>) -> String {
    parts
        .map(|p| {
            p.into_iter()
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "\
## Novo Título:
Duna Parte Dois ganha data de estreia

## Novo Resumo:
O aguardado filme chega aos cinemas em março.

## Novo Conteúdo:
<p>Primeiro parágrafo com <b>Duna</b>.</p>
<p>Segundo parágrafo.</p>

## SEO Score:
87 (boa densidade de palavras-chave)
";

    #[test]
    fn test_full_response_parses() {
        let result = parse_response(FULL_RESPONSE).unwrap();
        assert_eq!(result.title, "Duna Parte Dois ganha data de estreia");
        assert_eq!(result.excerpt, "O aguardado filme chega aos cinemas em março.");
        assert!(result.body.starts_with("<p>Primeiro parágrafo"));
        assert!(result.body.contains("<p>Segundo parágrafo.</p>"));
        assert_eq!(result.seo_score, 87);
    }

    #[test]
    fn test_missing_excerpt_section_is_parse_failure() {
        let raw = "\
## Novo Título:
Um título

## Novo Conteúdo:
<p>Corpo.</p>

## SEO Score:
90
";
        let err = parse_response(raw).unwrap_err();
        assert!(err.to_string().contains("excerpt"), "got: {err}");
    }

    #[test]
    fn test_title_is_sanitized_to_plain_text() {
        let raw = "\
## Novo Título:
<b>Dune</b>   Part Two

## Novo Resumo:
Resumo.

## Novo Conteúdo:
<p>Corpo.</p>
";
        let result = parse_response(raw).unwrap();
        assert_eq!(result.title, "Dune Part Two");
        // Score section absent: defaults to 0.
        assert_eq!(result.seo_score, 0);
    }

    #[test]
    fn test_inline_section_values_on_header_line() {
        let raw = "\
## Novo Título: Título inline
## Novo Resumo: Resumo inline
## Novo Conteúdo: <p>Corpo inline.</p>
## SEO Score: nota 75 de 100
";
        let result = parse_response(raw).unwrap();
        assert_eq!(result.title, "Título inline");
        assert_eq!(result.excerpt, "Resumo inline");
        assert_eq!(result.body, "<p>Corpo inline.</p>");
        // First contiguous digit run wins.
        assert_eq!(result.seo_score, 75);
    }

    #[test]
    fn test_score_on_line_below_header_is_captured_once() {
        let raw = "\
## Novo Título:
Um título

## Novo Resumo:
Resumo.

## Novo Conteúdo:
<p>Corpo.</p>

## SEO Score:
92
Avaliação detalhada: 100 pontos de legibilidade.
";
        let result = parse_response(raw).unwrap();
        // The first digit run after the header wins; later commentary digits
        // do not override it.
        assert_eq!(result.seo_score, 92);
    }

    #[test]
    fn test_empty_response_fails() {
        let err = parse_response("").unwrap_err();
        assert!(err.to_string().contains("title"));
    }
}
