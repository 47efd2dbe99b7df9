use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{CONFIG_PATH, ExtensionConfig};
use crate::error::{FetchError, PlatformError};
use crate::models::{
    Endpoint, KEY_HIGHLIGHTS, KEY_IMPORTANT_WORDS, KEY_SUMMARY, Message, SummaryResult,
};
use crate::platform::{ResourceLoader, Storage, Tabs};

/// Outer wrapper the backend puts around every answer. `body` is itself a JSON
/// document carrying the field of interest.
#[derive(Debug, Deserialize)]
struct Envelope {
    summary: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    body: String,
}

/// Pulls `field` out of the double-encoded envelope.
pub fn decode_envelope(url: &str, raw: &str, field: &str) -> Result<String, FetchError> {
    let invalid = |reason: String| FetchError::Envelope {
        url: url.to_string(),
        reason,
    };
    let envelope: Envelope = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    let inner: Value =
        serde_json::from_str(&envelope.summary.body).map_err(|e| invalid(e.to_string()))?;
    inner
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("missing string field `{field}`")))
}

/// POSTs `{"text": ...}` to one backend route and returns its field.
pub async fn fetch_endpoint(
    client: &reqwest::Client,
    api_endpoint: &str,
    endpoint: Endpoint,
    text: &str,
) -> Result<String, FetchError> {
    let url = format!("{api_endpoint}{}", endpoint.path());
    let response = client
        .post(&url)
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url,
            status: response.status(),
        });
    }

    let raw = response.text().await.map_err(|source| FetchError::Http {
        url: url.clone(),
        source,
    })?;
    decode_envelope(&url, &raw, endpoint.field())
}

/// Calls the three routes concurrently. Any failure fails the whole result.
pub async fn fetch_all(
    client: &reqwest::Client,
    api_endpoint: &str,
    text: &str,
) -> Result<SummaryResult, FetchError> {
    let (summary, key_highlights, important_words) = futures::future::try_join3(
        fetch_endpoint(client, api_endpoint, Endpoint::Summary, text),
        fetch_endpoint(client, api_endpoint, Endpoint::KeyHighlights, text),
        fetch_endpoint(client, api_endpoint, Endpoint::ImportantWords, text),
    )
    .await?;

    Ok(SummaryResult {
        summary,
        key_highlights,
        important_words,
    })
}

/// Overwrites the persisted result. There is no history.
pub async fn store_result(
    storage: &dyn Storage,
    result: &SummaryResult,
) -> Result<(), PlatformError> {
    storage
        .set(vec![
            (KEY_SUMMARY.to_string(), result.summary.clone()),
            (KEY_HIGHLIGHTS.to_string(), result.key_highlights.clone()),
            (KEY_IMPORTANT_WORDS.to_string(), result.important_words.clone()),
        ])
        .await
}

/// Background-side pipeline from a selection to a `displaySummary` message.
///
/// Overlapping selections are not sequenced: a slow answer for an older
/// selection can land after, and overwrite, a newer one.
pub struct Orchestrator {
    client: reqwest::Client,
    resources: Arc<dyn ResourceLoader>,
    storage: Arc<dyn Storage>,
    tabs: Arc<dyn Tabs>,
}

impl Orchestrator {
    pub fn new(
        client: reqwest::Client,
        resources: Arc<dyn ResourceLoader>,
        storage: Arc<dyn Storage>,
        tabs: Arc<dyn Tabs>,
    ) -> Self {
        Self {
            client,
            resources,
            storage,
            tabs,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn load_config(&self) -> Result<ExtensionConfig, FetchError> {
        let raw = self
            .resources
            .load(CONFIG_PATH)
            .await
            .map_err(|e| FetchError::Config(e.to_string()))?;
        ExtensionConfig::parse(&raw)
    }

    pub async fn fetch_summary(&self, text: &str) -> Result<SummaryResult, FetchError> {
        let config = self.load_config().await?;
        fetch_all(&self.client, config.endpoint()?, text).await
    }

    /// Never fails: errors end up as a `Failed to fetch data.` message to the tab.
    pub async fn process_selection(&self, text: &str, tab_id: i64) {
        let message = match self.fetch_summary(text).await {
            Ok(result) => {
                if let Err(e) = store_result(self.storage.as_ref(), &result).await {
                    warn!(error = %e, "could not persist summary");
                }
                info!(tab_id, "summary ready");
                Message::display(&result)
            }
            Err(e) => {
                error!(error = %e, "Error fetching data");
                Message::display_failure()
            }
        };

        if let Err(e) = self.tabs.send_message(tab_id, message).await {
            error!(tab_id, error = %e, "could not deliver summary to tab");
        }
    }
}
