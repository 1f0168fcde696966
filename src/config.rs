use std::time::Duration;

use anyhow::Context;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Option<Duration>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            timeout: None,
            port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let api_key = get("GEMINI_API_KEY").filter(|k| k != DEMO_KEY);
        let timeout = get("GATEWAY_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>().context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds"))
            .transpose()?
            .map(Duration::from_secs);
        let port = get("PORT")
            .map(|v| v.parse::<u16>().context("PORT must be a number"))
            .transpose()?
            .unwrap_or(defaults.port);

        Ok(Self {
            api_key,
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            text_model: get("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: get("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            timeout,
            port,
        })
    }

    pub fn is_demo(&self) -> bool {
        self.api_key.is_none()
    }

    /// First ten characters of the key, for the startup log line.
    pub fn key_preview(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| key.chars().take(10).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_or_demo_key_selects_demo_mode() {
        assert!(Config::from_lookup(lookup(&[])).unwrap().is_demo());
        assert!(Config::from_lookup(lookup(&[("GEMINI_API_KEY", "DEMO_KEY")])).unwrap().is_demo());
        assert!(Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap().is_demo());
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "abc"),
            ("GEMINI_TEXT_MODEL", "gemini-x"),
            ("GATEWAY_TIMEOUT_SECS", "30"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.text_model, "gemini-x");
        assert_eq!(cfg.image_model, "gemini-3-pro-image-preview");
        assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn key_preview_is_char_safe() {
        let cfg = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "ключ-abcdefghij")])).unwrap();
        assert_eq!(cfg.key_preview().as_deref(), Some("ключ-abcde"));
        assert_eq!(Config::default().key_preview(), None);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(Config::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("GATEWAY_TIMEOUT_SECS", "-1")])).is_err());
    }
}
