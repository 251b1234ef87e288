//! System prompt for the vision-model recognizer.
//!
//! The downstream line-item parser depends on the physical line structure of
//! the document (item row, then `Size:`, `UOM:` and price lines), so the model
//! must transcribe verbatim rather than summarise or reformat.
//!
//! Callers can override it with [`crate::pipeline::llm::VisionFactory::system_prompt`].

/// Default system prompt for transcribing a scanned receipt or catalog page.
pub const TRANSCRIBE_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image exactly as printed.

Rules:
1. Output plain text only. No Markdown, no code fences, no commentary.
2. Keep one output line per printed line, in top-to-bottom reading order.
3. Render table rows on a single line with cells separated by " | ".
4. Copy numbers, prices, currency symbols, units and codes character for character.
5. Do not correct spelling, expand abbreviations, or invent missing text.
6. If the page contains no legible text, output nothing."#;
