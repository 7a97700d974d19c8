//! Dispatcher configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! middleware_timeout_ms      = 5000
//! not_found_message          = "Not Found"
//! method_not_allowed_message = "Method Not Allowed"
//! static_dir                 = "public"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default per-middleware budget.
pub const DEFAULT_MIDDLEWARE_TIMEOUT_MS: u64 = 5000;

/// Settings consumed by [`Router`](crate::Router).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How long one middleware may take to respond or proceed.
    pub middleware_timeout_ms: u64,
    /// Body of the `404` response.
    pub not_found_message: String,
    /// Body of the `405` response.
    pub method_not_allowed_message: String,
    /// Static asset root, relative to the router's base path. `None`
    /// disables static serving.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn middleware_timeout(&self) -> Duration {
        Duration::from_millis(self.middleware_timeout_ms)
    }

    pub fn with_middleware_timeout(mut self, timeout: Duration) -> Self {
        self.middleware_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_not_found_message(mut self, message: impl Into<String>) -> Self {
        self.not_found_message = message.into();
        self
    }

    pub fn with_method_not_allowed_message(mut self, message: impl Into<String>) -> Self {
        self.method_not_allowed_message = message.into();
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            middleware_timeout_ms:      DEFAULT_MIDDLEWARE_TIMEOUT_MS,
            not_found_message:          "Not Found".to_owned(),
            method_not_allowed_message: "Method Not Allowed".to_owned(),
            static_dir:                 None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").ok(), Some(Config::default()));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            middleware_timeout_ms = 250
            static_dir = "public"
            "#,
        )
        .unwrap();

        assert_eq!(config.middleware_timeout(), Duration::from_millis(250));
        assert_eq!(config.static_dir.as_deref(), Some(Path::new("public")));
        assert_eq!(config.not_found_message, "Not Found");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("timeout = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
