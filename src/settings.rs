use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const SETTINGS_PATH_ENV: &str = "WORDLENS_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gateway_url: String,
    pub gateway_timeout_ms: u64,
    pub lookup_batch_size: usize,
    pub change_debounce_ms: u64,
    pub hover_debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub word_padding: f64,
    pub show_border: bool,
    pub prompt_for_permission: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:5000".into(),
            gateway_timeout_ms: 2000,
            lookup_batch_size: 32,
            change_debounce_ms: 250,
            hover_debounce_ms: 200,
            poll_interval_ms: 500,
            word_padding: 1.0,
            show_border: false,
            prompt_for_permission: true,
        }
    }
}

impl Settings {
    /// Settings file named by `WORDLENS_SETTINGS` (if any), then environment
    /// overrides, then validation.
    pub fn load() -> Result<Self> {
        let mut settings = match env::var_os(SETTINGS_PATH_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("WORDLENS_GATEWAY_URL") {
            self.gateway_url = url;
        }
        override_parsed(&lookup, "WORDLENS_GATEWAY_TIMEOUT_MS", &mut self.gateway_timeout_ms)?;
        override_parsed(&lookup, "WORDLENS_LOOKUP_BATCH_SIZE", &mut self.lookup_batch_size)?;
        override_parsed(&lookup, "WORDLENS_CHANGE_DEBOUNCE_MS", &mut self.change_debounce_ms)?;
        override_parsed(&lookup, "WORDLENS_HOVER_DEBOUNCE_MS", &mut self.hover_debounce_ms)?;
        override_parsed(&lookup, "WORDLENS_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        override_parsed(&lookup, "WORDLENS_WORD_PADDING", &mut self.word_padding)?;

        if let Some(value) = lookup("WORDLENS_SHOW_BORDER") {
            self.show_border = parse_flag(&value);
        }
        if let Some(value) = lookup("WORDLENS_PROMPT") {
            self.prompt_for_permission = parse_flag(&value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway_url.trim().is_empty() {
            bail!("gateway_url must not be empty");
        }
        if self.gateway_timeout_ms == 0 {
            bail!("gateway_timeout_ms must be greater than zero");
        }
        if self.lookup_batch_size == 0 {
            bail!("lookup_batch_size must be at least 1");
        }
        if self.change_debounce_ms == 0 || self.hover_debounce_ms == 0 {
            bail!("debounce windows must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if !self.word_padding.is_finite() || self.word_padding < 0.0 {
            bail!("word_padding must be a non-negative number");
        }
        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }

    pub fn hover_debounce(&self) -> Duration {
        Duration::from_millis(self.hover_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn override_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid value '{}' for {}: {}", raw, key, err))?;
    }
    Ok(())
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"gateway_url":"http://notes.local","show_border":true}"#)
                .unwrap();
        assert_eq!(settings.gateway_url, "http://notes.local");
        assert!(settings.show_border);
        assert_eq!(settings.change_debounce(), Duration::from_millis(250));
        assert_eq!(settings.hover_debounce(), Duration::from_millis(200));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(env_of(&[
                ("WORDLENS_LOOKUP_BATCH_SIZE", "8"),
                ("WORDLENS_SHOW_BORDER", "TRUE"),
                ("WORDLENS_PROMPT", "0"),
            ]))
            .unwrap();

        assert_eq!(settings.lookup_batch_size, 8);
        assert!(settings.show_border);
        assert!(!settings.prompt_for_permission);
    }

    #[test]
    fn malformed_override_is_an_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(env_of(&[("WORDLENS_POLL_INTERVAL_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("WORDLENS_POLL_INTERVAL_MS"));
    }

    #[test]
    fn zero_windows_are_rejected() {
        let settings = Settings {
            change_debounce_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }
}
