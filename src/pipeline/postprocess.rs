//! Post-processing: deterministic cleanup of raw recognizer output.
//!
//! OCR engines and vision models each leave their own artefacts in the text
//! they return:
//!
//! - tesseract terminates every page with a form feed (`\x0c`)
//! - vision models sometimes wrap the transcription in ` ``` ` fences
//! - Windows-style `\r\n` line endings, zero-width spaces, BOMs
//!
//! The line-item parser trims each line and ignores what it cannot match, so
//! none of this breaks parsing outright. Cleaning here keeps the merged text
//! readable and makes page boundaries line boundaries.
//!
//! ## Rule Order
//!
//! Fences are stripped first (they are detected on the raw text), line
//! endings are normalised before any line-based rule, and the final-newline
//! pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw text of one page.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF / CR → LF) and form feeds → LF
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. End with exactly one newline, or be empty
pub fn clean_ocr_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:text|plaintext|markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\x0c'], "\n")
}

// ── Rule 3: Remove invisible characters ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Final newline ────────────────────────────────────────────────────

/// Unlike markdown output, a blank page stays empty so the worker can tell
/// it apart from a page with content.
fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.trim_start().is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_lang() {
        let input = "```text\nWidget | x | y\n$1.00\n```";
        assert_eq!(strip_code_fences(input), "Widget | x | y\n$1.00");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("UOM: EA"), "UOM: EA");
    }

    #[test]
    fn test_form_feed_becomes_newline() {
        assert_eq!(normalise_line_endings("a\r\nb\rc\x0cd"), "a\nb\nc\nd");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Wid\u{200B}get\u{FEFF} | x | y\u{00AD}";
        assert_eq!(remove_invisible_chars(input), "Widget | x | y");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_blank_page_stays_empty() {
        assert_eq!(clean_ocr_text(""), "");
        assert_eq!(clean_ocr_text("  \n\x0c"), "");
    }

    #[test]
    fn test_tesseract_page_output() {
        let raw = "Widget A | 1 | CTN  \nSize: 2 X 500GR\n$12.50\n\n\x0c";
        assert_eq!(
            clean_ocr_text(raw),
            "Widget A | 1 | CTN\nSize: 2 X 500GR\n$12.50\n"
        );
    }
}
