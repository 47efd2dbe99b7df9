use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::PlatformError;
use crate::models::{
    KEY_HIGHLIGHTS, KEY_IMPORTANT_WORDS, KEY_SUMMARY, MENU_ITEM_ID, MENU_ITEM_TITLE, MenuClick,
    MenuContext, MenuItem, Message, MessageResponse, NO_HIGHLIGHTS, NO_IMPORTANT_WORDS, NO_SUMMARY,
    SelectionEvent, SummaryResult,
};
use crate::network::{Orchestrator, store_result};
use crate::platform::{Menus, PendingMessage, Storage};

/// Background entry points: the context menu and the runtime message bus.
pub struct Router {
    menus: Arc<dyn Menus>,
    storage: Arc<dyn Storage>,
    orchestrator: Arc<Orchestrator>,
}

impl Router {
    pub fn new(menus: Arc<dyn Menus>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            menus,
            storage: orchestrator.storage().clone(),
            orchestrator,
        }
    }

    /// Registers the single "summarize" entry, shown only on a text selection.
    /// Safe to call again: existing entries are cleared first.
    pub fn install(&self) -> Result<(), PlatformError> {
        self.menus.remove_all();
        self.menus.create(MenuItem {
            id: MENU_ITEM_ID.to_string(),
            title: MENU_ITEM_TITLE.to_string(),
            contexts: vec![MenuContext::Selection],
        })?;
        info!("Context menu item created.");
        Ok(())
    }

    /// Runs the orchestrator for a click on our menu entry. Returns `false` for
    /// anything it did not handle.
    pub async fn on_menu_click(&self, click: MenuClick, tab_id: Option<i64>) -> bool {
        if click.menu_item_id != MENU_ITEM_ID {
            return false;
        }
        let (Some(selection_text), Some(tab_id)) = (click.selection_text, tab_id) else {
            warn!("menu click without a selection or tab");
            return false;
        };

        let event = SelectionEvent {
            selection_text,
            tab_id,
        };
        debug!(text = %event.selection_text, "Selected text");
        self.orchestrator
            .process_selection(&event.selection_text, event.tab_id)
            .await;
        true
    }

    /// Answers `saveSummary` and `requestSummary`; other actions get no reply.
    pub async fn handle_message(&self, message: Message) -> Option<MessageResponse> {
        match message {
            Message::SaveSummary {
                summary,
                key_highlights,
                important_words,
            } => {
                let result = SummaryResult {
                    summary,
                    key_highlights,
                    important_words,
                };
                match store_result(self.storage.as_ref(), &result).await {
                    Ok(()) => Some(MessageResponse::success()),
                    Err(e) => {
                        error!(error = %e, "saveSummary failed");
                        Some(MessageResponse::failure())
                    }
                }
            }
            Message::RequestSummary => {
                let mut data = self
                    .storage
                    .get(&[KEY_SUMMARY, KEY_HIGHLIGHTS, KEY_IMPORTANT_WORDS])
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "requestSummary could not read storage");
                        HashMap::new()
                    });
                let mut field = |key: &str, fallback: &str| {
                    data.remove(key)
                        .filter(|v| !v.is_empty())
                        .unwrap_or_else(|| fallback.to_string())
                };
                Some(MessageResponse::Summary(SummaryResult {
                    summary: field(KEY_SUMMARY, NO_SUMMARY),
                    key_highlights: field(KEY_HIGHLIGHTS, NO_HIGHLIGHTS),
                    important_words: field(KEY_IMPORTANT_WORDS, NO_IMPORTANT_WORDS),
                }))
            }
            Message::DisplaySummary { .. } => None,
        }
    }

    /// Serves runtime messages until every sender is dropped. Each message is
    /// answered on its own task; the caller's reply channel stays open until then.
    pub async fn listen(self: Arc<Self>, mut messages: mpsc::Receiver<PendingMessage>) {
        while let Some(PendingMessage { message, reply }) = messages.recv().await {
            let router = Arc::clone(&self);
            tokio::spawn(async move {
                if let Some(response) = router.handle_message(message).await {
                    if reply.send(response).is_err() {
                        debug!("sender stopped waiting for the reply");
                    }
                }
            });
        }
    }
}
