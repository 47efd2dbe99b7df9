use std::time::Duration;

/// Element ids, classes, inline styles and animation timings of the popup.
pub struct Theme {
    pub overlay_id: &'static str,
    pub popup_id: &'static str,
    pub slide_in_class: &'static str,

    // Inline `right` offsets driving the CSS transition
    pub visible_offset: &'static str,
    pub hidden_offset: &'static str,

    pub slide_in_delay: Duration,
    pub close_delay: Duration,

    pub loading_html: &'static str,
    pub template_failed_html: &'static str,
    pub format_failed_html: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            overlay_id: "popup-overlay",
            popup_id: "summary-popup",
            slide_in_class: "popup-slide-in",

            visible_offset: "0",
            hidden_offset: "-400px",

            slide_in_delay: Duration::from_millis(10),
            close_delay: Duration::from_millis(500),

            loading_html: "<p>Loading summary...</p>",
            template_failed_html: "<p>Failed to load summary.</p>",
            format_failed_html: "<p>Failed to format summary.</p>",
        }
    }
}
