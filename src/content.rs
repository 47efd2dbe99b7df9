use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{Message, SummaryResult};
use crate::platform::{Document, ElementRef};
use crate::ui::PopupController;

/// Page-side listener: turns `displaySummary` messages into a popup.
pub struct ContentScript<D: Document> {
    popup: PopupController<D>,
}

impl<D: Document> ContentScript<D> {
    pub fn new(popup: PopupController<D>) -> Self {
        Self { popup }
    }

    pub fn popup(&self) -> &PopupController<D> {
        &self.popup
    }

    /// Returns whether the message was a displayable summary.
    pub async fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::DisplaySummary {
                summary,
                key_highlights,
                important_words,
            } if !summary.is_empty() => {
                info!(%summary, "Handling displaySummary");
                let result = SummaryResult {
                    summary,
                    key_highlights: key_highlights.unwrap_or_default(),
                    important_words: important_words.unwrap_or_default(),
                };
                self.popup.display(&result).await;
                true
            }
            other => {
                debug!(message = ?other, "Invalid action or missing summary");
                false
            }
        }
    }

    pub async fn on_click(&mut self, target: ElementRef) -> bool {
        self.popup.on_click(target).await
    }

    /// Handles tab messages until the sending side goes away.
    pub async fn run(&mut self, mut messages: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = messages.recv().await {
            self.handle_message(message).await;
        }
        debug!("tab channel closed");
    }
}
