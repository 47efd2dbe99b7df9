//! Turns the raw backend strings into the popup markup.
//!
//! Keyword bolding runs over already generated markup and has no notion of
//! existing `<strong>` tags, so a word can end up wrapped twice (once by the
//! `**bold**` pass, once by the keyword pass, or by two overlapping keywords).
//! Formatting an already formatted string nests the tags again.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use tracing::warn;

pub const SUMMARY_TOKEN: &str = "{{summary}}";
pub const HIGHLIGHTS_TOKEN: &str = "{{keyHighlights}}";

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^- (.*)$").expect("bullet pattern"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern"));

/// Splits the backend's `"A, B, C"` list. Empty entries are dropped.
pub fn parse_important_words(csv: &str) -> Vec<String> {
    csv.split(", ")
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn format_summary(summary: &str) -> String {
    let text = BOLD.replace_all(summary, "<strong>${1}</strong>");
    let text = BULLET.replace_all(&text, "<li>${1}</li>");
    BLANK_LINES.replace_all(&text, "</p><p>").into_owned()
}

pub fn format_highlights(highlights: &str) -> String {
    if highlights.is_empty() {
        return String::new();
    }
    highlights
        .split('\n')
        .map(|line| format!("<li>{}</li>", line.strip_prefix("- ").unwrap_or(line)))
        .collect()
}

/// Wraps every case-insensitive whole-word match of each word, in list order.
/// The inserted tag carries the word as listed, not as matched.
pub fn bold_important_words(text: &str, words: &[String]) -> String {
    words.iter().fold(text.to_string(), |acc, word| {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
        match Regex::new(&pattern) {
            Ok(re) => re
                .replace_all(&acc, NoExpand(&format!("<strong>{word}</strong>")))
                .into_owned(),
            Err(e) => {
                warn!(%word, error = %e, "skipping important word");
                acc
            }
        }
    })
}

/// Fills the template's `{{summary}}` and `{{keyHighlights}}` tokens. Only the
/// first occurrence of each token is replaced; a missing token drops that section.
pub fn format(
    summary: &str,
    key_highlights: &str,
    important_words: &str,
    template: &str,
) -> String {
    let words = parse_important_words(important_words);
    let summary_html = bold_important_words(&format_summary(summary), &words);
    let highlights_html = bold_important_words(&format_highlights(key_highlights), &words);

    template
        .replacen(SUMMARY_TOKEN, &summary_html, 1)
        .replacen(HIGHLIGHTS_TOKEN, &highlights_html, 1)
}
