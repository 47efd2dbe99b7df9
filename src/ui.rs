use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::format::format;
use crate::models::SummaryResult;
use crate::platform::{Document, ElementRef};
use crate::template::TemplateCache;
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Absent,
    Creating,
    Visible,
    Closing,
}

/// The overlay and content container, created and destroyed as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupHandle {
    pub summary_popup: ElementRef,
    pub overlay: ElementRef,
}

/// Owns the popup lifecycle inside one document. At most one pair is in the
/// document at a time.
pub struct PopupController<D: Document> {
    document: D,
    templates: Arc<TemplateCache>,
    theme: Theme,
    state: PopupState,
    current: Option<PopupHandle>,
}

impl<D: Document> PopupController<D> {
    pub fn new(document: D, templates: Arc<TemplateCache>) -> Self {
        Self::with_theme(document, templates, Theme::default())
    }

    pub fn with_theme(document: D, templates: Arc<TemplateCache>, theme: Theme) -> Self {
        Self {
            document,
            templates,
            theme,
            state: PopupState::Absent,
            current: None,
        }
    }

    pub fn state(&self) -> PopupState {
        self.state
    }

    pub fn handle(&self) -> Option<PopupHandle> {
        self.current
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Shows an empty popup with the loading placeholder and slides it in.
    pub async fn open(&mut self) -> PopupHandle {
        if let Some(previous) = self.current.take() {
            warn!("popup already open, replacing it");
            self.detach(previous);
        }

        let overlay = self.document.create_element("div", self.theme.overlay_id);
        self.document.append(overlay);

        let summary_popup = self.document.create_element("div", self.theme.popup_id);
        if let Err(e) = self
            .document
            .set_inner_html(summary_popup, self.theme.loading_html)
        {
            warn!(error = %e, "could not set loading placeholder");
        }
        self.document.append(summary_popup);

        let handle = PopupHandle {
            summary_popup,
            overlay,
        };
        self.current = Some(handle);
        self.state = PopupState::Creating;
        debug!(?handle, "popup created");

        // lets the CSS transition see the initial position first
        sleep(self.theme.slide_in_delay).await;

        let slid = self
            .document
            .add_class(summary_popup, self.theme.slide_in_class)
            .and_then(|_| {
                self.document
                    .set_style(summary_popup, "right", self.theme.visible_offset)
            });
        if let Err(e) = slid {
            warn!(error = %e, "slide-in failed");
        }
        self.state = PopupState::Visible;
        handle
    }

    /// Replaces the popup content with the formatted result. Never fails: a
    /// missing template or empty output shows a fixed message instead.
    pub async fn update_content(&mut self, handle: PopupHandle, result: &SummaryResult) {
        if !self.document.contains(handle.summary_popup) {
            error!("Summary popup element not found.");
            return;
        }

        let template = self.templates.get_template().await;
        let html = if template.is_empty() {
            error!("Failed to load template.");
            self.theme.template_failed_html.to_string()
        } else {
            let formatted = format(
                &result.summary,
                &result.key_highlights,
                &result.important_words,
                &template,
            );
            if formatted.is_empty() {
                error!("Failed to format summary.");
                self.theme.format_failed_html.to_string()
            } else {
                formatted
            }
        };

        if let Err(e) = self.document.set_inner_html(handle.summary_popup, &html) {
            error!(error = %e, "could not update popup content");
        }
    }

    /// Opens a popup and fills it with `result`.
    pub async fn display(&mut self, result: &SummaryResult) -> PopupHandle {
        let handle = self.open().await;
        self.update_content(handle, result).await;
        handle
    }

    /// Dismisses the popup if `target` is the current overlay. Clicks anywhere
    /// else, including inside the content container, are ignored.
    pub async fn on_click(&mut self, target: ElementRef) -> bool {
        match self.current {
            Some(handle) if handle.overlay == target && self.state == PopupState::Visible => {
                info!("Overlay clicked, closing popup...");
                self.close(handle).await;
                true
            }
            _ => false,
        }
    }

    /// Slides the popup out and removes both elements after the closing
    /// animation. Closing a pair that is no longer in the document only logs.
    pub async fn close(&mut self, handle: PopupHandle) {
        debug!("Attempting to close popup...");
        let popup_present = self.document.contains(handle.summary_popup);
        let overlay_present = self.document.contains(handle.overlay);
        if !popup_present {
            debug!("summaryPopup is not in the DOM.");
        }
        if !overlay_present {
            debug!("overlay is not in the DOM.");
        }
        if !popup_present && !overlay_present {
            return;
        }

        if popup_present {
            if let Err(e) = self
                .document
                .set_style(handle.summary_popup, "right", self.theme.hidden_offset)
            {
                warn!(error = %e, "slide-out failed");
            }
        }
        let is_current = self.current == Some(handle);
        if is_current {
            self.state = PopupState::Closing;
        }

        sleep(self.theme.close_delay).await;

        self.detach(handle);
        if is_current {
            self.current = None;
            self.state = PopupState::Absent;
        }
    }

    fn detach(&mut self, handle: PopupHandle) {
        for el in [handle.summary_popup, handle.overlay] {
            if let Err(e) = self.document.remove(el) {
                debug!(error = %e, "element already removed");
            }
        }
        if self.current.is_none() {
            self.state = PopupState::Absent;
        }
    }
}
