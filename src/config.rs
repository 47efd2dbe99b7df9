use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FetchError, SettingsError};

pub const CONFIG_PATH: &str = "config.json";

/// The extension's bundled `config.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtensionConfig {
    #[serde(rename = "apiEndpoint", alias = "apiendpoint")]
    pub api_endpoint: Option<String>,
}

impl ExtensionConfig {
    pub fn parse(json: &str) -> Result<Self, FetchError> {
        Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| FetchError::Config(e.to_string()))
    }

    pub fn endpoint(&self) -> Result<&str, FetchError> {
        match self.api_endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => Ok(endpoint),
            _ => Err(FetchError::MissingEndpoint),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub listen_addr: String,
    pub gemini_model: String,
    pub gemini_api_key: Option<String>,
    pub extension_dir: String,
    pub storage_path: Option<String>,
}

impl Settings {
    /// Built-in defaults, then the user config, then `./instasum.toml`,
    /// then `INSTASUM_*` variables.
    pub fn new() -> Result<Self, SettingsError> {
        Self::load(get_user_config_path().ok(), Path::new("instasum.toml"))
    }

    pub fn load(user_config: Option<PathBuf>, local_config: &Path) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("listen_addr", "127.0.0.1:3000")?
            .set_default("gemini_model", "gemini-2.0-flash")?
            .set_default("extension_dir", "extension")?;

        if let Some(path) = user_config {
            builder = builder.add_source(File::from(path).required(false));
        }

        let s = builder
            .add_source(File::from(local_config.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("INSTASUM"))
            .build()?;

        Ok(s.try_deserialize()?)
    }

    pub fn extension_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.extension_dir).as_ref())
    }

    /// Where the CLI keeps its local storage. Defaults to the platform data directory.
    pub fn storage_path(&self) -> PathBuf {
        match &self.storage_path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("instasum")
                .join("storage.json"),
        }
    }
}

pub fn get_user_config_path() -> Result<PathBuf, SettingsError> {
    let mut path = dirs::home_dir().ok_or(SettingsError::NoHome)?;
    path.push(".config");
    path.push("instasum");
    path.push("instasum.toml");
    Ok(path)
}

pub fn save_api_key(api_key: &str) -> Result<PathBuf, SettingsError> {
    let path = get_user_config_path()?;
    save_api_key_to(&path, api_key)?;
    Ok(path)
}

/// Sets `gemini_api_key` in the TOML file at `path`, keeping every other key.
pub fn save_api_key_to(path: &Path, api_key: &str) -> Result<(), SettingsError> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let mut doc = config_str.parse::<toml::Table>()?;

    doc.insert("gemini_api_key".to_string(), toml::Value::String(api_key.to_string()));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_endpoint() {
        let config =
            ExtensionConfig::parse(r#"{"apiEndpoint": "https://api.example.com/prod"}"#).unwrap();
        assert_eq!(config.endpoint().unwrap(), "https://api.example.com/prod");
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let config = ExtensionConfig::parse("{}").unwrap();
        assert!(matches!(config.endpoint(), Err(FetchError::MissingEndpoint)));

        let blank = ExtensionConfig::parse(r#"{"apiEndpoint": "  "}"#).unwrap();
        assert!(matches!(blank.endpoint(), Err(FetchError::MissingEndpoint)));
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        assert!(matches!(
            ExtensionConfig::parse("{not json"),
            Err(FetchError::Config(_))
        ));
    }

    #[test]
    fn settings_defaults_and_local_override() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("instasum.toml");

        let defaults = Settings::load(None, &local).unwrap();
        assert_eq!(defaults.gemini_model, "gemini-2.0-flash");
        assert_eq!(defaults.extension_dir, "extension");

        fs::write(
            &local,
            "listen_addr = \"0.0.0.0:9000\"\nstorage_path = \"/tmp/s.json\"\n",
        )
        .unwrap();
        let settings = Settings::load(None, &local).unwrap();
        assert_eq!(settings.listen_addr, "0.0.0.0:9000");
        assert_eq!(settings.storage_path(), PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn save_api_key_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("instasum.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "gemini_model = \"gemini-pro\"\n").unwrap();

        save_api_key_to(&path, "secret").unwrap();

        let doc = fs::read_to_string(&path).unwrap().parse::<toml::Table>().unwrap();
        assert_eq!(doc["gemini_api_key"].as_str(), Some("secret"));
        assert_eq!(doc["gemini_model"].as_str(), Some("gemini-pro"));
    }
}
