// Instruction prompts sent upstream, one per backend route.

use crate::models::Endpoint;

pub const SUMMARY_PROMPT: &str = "Summarize the given text in a concise manner.";

pub const KEY_HIGHLIGHTS_PROMPT: &str = "Extract key highlights from the given text. Return only the bullet points without any additional text or context.";

pub const IMPORTANT_WORDS_PROMPT: &str = "Extract the most important words or phrases from the given text that are central to the main topics. Return only the words or phrases starting with a capital letter, separated by commas, without any additional text.";

pub fn prompt_for(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::Summary => SUMMARY_PROMPT,
        Endpoint::KeyHighlights => KEY_HIGHLIGHTS_PROMPT,
        Endpoint::ImportantWords => IMPORTANT_WORDS_PROMPT,
    }
}

pub fn user_message(prompt: &str, text: &str) -> String {
    format!("{prompt}\n\nText: {text}")
}
