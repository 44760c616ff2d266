//! Central normalization for AI input and output text
//!
//! The extracted JSON candidate goes through `normalize_ai_response()` ONCE before parsing.
//! Ticker symbols go through `normalize_symbol()` on the way in and
//! `sanitize_symbol_for_prompt()` before they are embedded in an instruction.
//!
//! Common LLM formatting issues handled:
//! - Leading byte order mark
//! - CRLF line endings
//! - Unicode whitespace (NBSP, thin space) between JSON tokens
//!
//! Text inside JSON string literals is never rewritten.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_PROMPT_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'`{}\[\]\\<>\p{Cc}]"#).unwrap());
static RE_INNER_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a JSON candidate for parsing
pub fn normalize_ai_response(response: &str) -> String {
    let result = response.trim_start_matches('\u{feff}');
    let result = result.replace("\r\n", "\n");
    normalize_unicode_whitespace(&result)
}

/// Replace Unicode whitespace between JSON tokens with ASCII space.
/// Newlines, tabs, regular spaces and everything inside string literals are kept.
fn normalize_unicode_whitespace(s: &str) -> String {
    let mut in_string = false;
    let mut escaped = false;

    s.chars()
        .map(|c| {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                c
            } else if c == '"' {
                in_string = true;
                c
            } else if c.is_whitespace() && c != '\n' && c != '\t' && c != ' ' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

/// Trim and uppercase a ticker the way the dashboard input does
pub fn normalize_symbol(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Strip characters that could break out of the quoted symbol in an instruction
pub fn sanitize_symbol_for_prompt(symbol: &str) -> String {
    let stripped = RE_PROMPT_UNSAFE.replace_all(symbol, "");
    RE_INNER_WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_string()
}
