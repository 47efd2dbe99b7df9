use serde::{Deserialize, Serialize};

pub const MENU_ITEM_ID: &str = "summarize";
pub const MENU_ITEM_TITLE: &str = "Summarize selected text";

pub const KEY_SUMMARY: &str = "summary";
pub const KEY_HIGHLIGHTS: &str = "keyHighlights";
pub const KEY_IMPORTANT_WORDS: &str = "importantWords";

pub const NO_SUMMARY: &str = "No summary available";
pub const NO_HIGHLIGHTS: &str = "No key highlights available";
pub const NO_IMPORTANT_WORDS: &str = "No important words available";
pub const FETCH_FAILED: &str = "Failed to fetch data.";

/// A context-menu click on selected text. Consumed immediately by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub selection_text: String,
    pub tab_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub summary: String,
    pub key_highlights: String,
    /// Comma separated phrases, e.g. `"Rust, Ownership, Borrow checker"`.
    pub important_words: String,
}

/// The three backend routes. Each one answers with its own field inside the envelope body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Summary,
    KeyHighlights,
    ImportantWords,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [
        Endpoint::Summary,
        Endpoint::KeyHighlights,
        Endpoint::ImportantWords,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Summary => "/summary",
            Endpoint::KeyHighlights => "/key-highlights",
            Endpoint::ImportantWords => "/important-words",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            Endpoint::Summary => KEY_SUMMARY,
            Endpoint::KeyHighlights => KEY_HIGHLIGHTS,
            Endpoint::ImportantWords => KEY_IMPORTANT_WORDS,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.path() == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuContext {
    Selection,
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

/// Data carried by a context-menu click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
}

/// Messages on the extension bus, tagged by `action` exactly like the JSON the
/// scripts exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Message {
    #[serde(rename = "displaySummary", rename_all = "camelCase")]
    DisplaySummary {
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_highlights: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        important_words: Option<String>,
    },
    #[serde(rename = "saveSummary", rename_all = "camelCase")]
    SaveSummary {
        summary: String,
        key_highlights: String,
        important_words: String,
    },
    #[serde(rename = "requestSummary")]
    RequestSummary,
}

impl Message {
    pub fn display(result: &SummaryResult) -> Self {
        Message::DisplaySummary {
            summary: result.summary.clone(),
            key_highlights: Some(result.key_highlights.clone()),
            important_words: Some(result.important_words.clone()),
        }
    }

    pub fn display_failure() -> Self {
        Message::DisplaySummary {
            summary: FETCH_FAILED.to_string(),
            key_highlights: None,
            important_words: None,
        }
    }
}

/// Replies sent back over a runtime message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageResponse {
    Status { status: String },
    Summary(SummaryResult),
}

impl MessageResponse {
    pub fn success() -> Self {
        MessageResponse::Status { status: "success".to_string() }
    }

    /// Acknowledges a `saveSummary` whose write did not go through.
    pub fn failure() -> Self {
        MessageResponse::Status { status: "error".to_string() }
    }
}
