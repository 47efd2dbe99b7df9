use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("resource {path} could not be loaded: {reason}")]
    Resource { path: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("context menu error: {0}")]
    Menu(String),

    #[error("message channel closed: {0}")]
    Messaging(String),

    #[error("no content script listening in tab {0}")]
    TabUnavailable(i64),

    #[error("element {0} is not in the document")]
    ElementMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Error loading config: {0}")]
    Config(String),

    #[error("API endpoint is missing in the config.")]
    MissingEndpoint,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Error fetching {url}: {status}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("Invalid response format from {url}: {reason}")]
    Envelope { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not locate the home directory")]
    NoHome,

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_endpoint_message_is_descriptive() {
        assert_eq!(
            FetchError::MissingEndpoint.to_string(),
            "API endpoint is missing in the config."
        );
    }

    #[test]
    fn resource_error_names_path() {
        let err = PlatformError::Resource {
            path: "summary-template.html".into(),
            reason: "404".into(),
        };
        assert!(err.to_string().contains("summary-template.html"));
    }

    #[test]
    fn platform_error_converts_into_fetch_error() {
        let err: FetchError = PlatformError::Storage("quota".into()).into();
        assert!(err.to_string().contains("quota"));
    }
}
