use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use stream_core::client::DEFAULT_AUTH_SCHEME;
use stream_core::DEFAULT_MAX_IMAGES;
use tracing::debug;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "chat-stream";

/// Settings read from `settings.json`; every field may be overridden on the command line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Scheme in front of the API key; `null` sends the bare key
    pub auth_scheme: Option<String>,
    pub model: String,
    /// Cap on distinct image URLs collected during a stream
    pub max_images: usize,
    pub quantity: usize,
    pub ratio: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: None,
            auth_scheme: Some(DEFAULT_AUTH_SCHEME.to_string()),
            model: "gpt-4o-image".to_string(),
            max_images: DEFAULT_MAX_IMAGES,
            quantity: 1,
            ratio: "1:1".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `custom_path`, or from the first `settings.json`
    /// found in the config directories.
    ///
    /// A missing default file yields the defaults; a missing custom file is an error.
    pub fn load(custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Settings file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => match Self::find_settings_file() {
                Some(path) => path,
                None => {
                    debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let value = substitute_env_vars_in_value(value)?;
        Ok(serde_json::from_value(value)?)
    }

    fn find_settings_file() -> Option<PathBuf> {
        config_directories()
            .into_iter()
            .map(|dir| dir.join(SETTINGS_FILE))
            .find(|candidate| candidate.exists())
    }
}

/// Directories that may contain the settings file, ordered by priority
fn config_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(custom_dir) = std::env::var("CHAT_STREAM_CONFIG_DIR") {
        push_unique_dir(&mut dirs, PathBuf::from(custom_dir));
    }
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        push_unique_dir(&mut dirs, PathBuf::from(xdg_config).join(APP_DIR));
    }
    if let Some(home_dir) = dirs::home_dir() {
        push_unique_dir(&mut dirs, home_dir.join(".config").join(APP_DIR));
    }
    if let Some(system_config) = dirs::config_dir() {
        push_unique_dir(&mut dirs, system_config.join(APP_DIR));
    }
    if let Ok(current_dir) = std::env::current_dir() {
        push_unique_dir(&mut dirs, current_dir.join(APP_DIR));
    }

    dirs
}

fn push_unique_dir(dirs: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !dirs.iter().any(|existing| existing == &candidate) {
        dirs.push(candidate);
    }
}

/// Recursively substitute environment variables in JSON string values
fn substitute_env_vars_in_value(value: serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(
            substitute_env_vars_in_string(&s)?,
        )),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, val)| Ok((key, substitute_env_vars_in_value(val)?)))
            .collect::<Result<_>>()
            .map(serde_json::Value::Object),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(substitute_env_vars_in_value)
            .collect::<Result<_>>()
            .map(serde_json::Value::Array),
        other => Ok(other),
    }
}

/// Substitute `${VAR_NAME}` references in a string
fn substitute_env_vars_in_string(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let end = rest[start..].find('}').ok_or_else(|| {
            anyhow::anyhow!("Unclosed environment variable substitution: {input}")
        })?;
        let end = start + end;

        let var_name = &rest[start + 2..end];
        let var_value = std::env::var(var_name)
            .with_context(|| format!("Environment variable not set: {var_name}"))?;

        result.push_str(&rest[..start]);
        result.push_str(&var_value);
        rest = &rest[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("CHAT_STREAM_TEST_VAR", "test_value");

        let input = "prefix_${CHAT_STREAM_TEST_VAR}_suffix";
        let result = substitute_env_vars_in_string(input).unwrap();
        assert_eq!(result, "prefix_test_value_suffix");

        env::remove_var("CHAT_STREAM_TEST_VAR");
    }

    #[test]
    fn test_substituted_value_is_not_expanded_again() {
        env::set_var("CHAT_STREAM_TEST_NESTED", "${NOT_A_REFERENCE}");

        let result = substitute_env_vars_in_string("${CHAT_STREAM_TEST_NESTED}").unwrap();
        assert_eq!(result, "${NOT_A_REFERENCE}");

        env::remove_var("CHAT_STREAM_TEST_NESTED");
    }

    #[test]
    fn test_env_var_substitution_missing() {
        let result = substitute_env_vars_in_string("prefix_${CHAT_STREAM_NONEXISTENT}_suffix");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("CHAT_STREAM_NONEXISTENT"));
    }

    #[test]
    fn test_env_var_substitution_unclosed() {
        let result = substitute_env_vars_in_string("prefix_${UNCLOSED_VAR_suffix");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unclosed"));
    }

    #[test]
    fn test_settings_from_json() {
        env::set_var("CHAT_STREAM_TEST_KEY", "secret_key");

        let settings = Settings::from_json(
            r#"{
                "base_url": "https://api.example.com",
                "api_key": "${CHAT_STREAM_TEST_KEY}",
                "quantity": 4
            }"#,
        )
        .unwrap();

        assert_eq!(settings.base_url, "https://api.example.com");
        assert_eq!(settings.api_key.as_deref(), Some("secret_key"));
        assert_eq!(settings.quantity, 4);
        // Unset fields keep their defaults
        assert_eq!(settings.max_images, DEFAULT_MAX_IMAGES);
        assert_eq!(settings.ratio, "1:1");
        assert_eq!(settings.auth_scheme.as_deref(), Some("Bearer"));

        env::remove_var("CHAT_STREAM_TEST_KEY");
    }

    #[test]
    fn test_null_auth_scheme_sends_bare_key() {
        let settings = Settings::from_json(r#"{"api_key": "token", "auth_scheme": null}"#).unwrap();
        assert_eq!(settings.auth_scheme, None);
    }

    #[test]
    fn test_load_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"model": "painter", "max_images": 2}"#).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.model, "painter");
        assert_eq!(settings.max_images, 2);

        let missing = Settings::load(Some(&dir.path().join("missing.json")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_invalid_settings_report_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }
}
