//! Runtime configuration supplied by the hosting page.

use std::str::FromStr;

use serde::Deserialize;

use crate::response_guard::{DEFAULT_ERROR_TEXT_MAX_CHARS, ResponseGuard};
use crate::upload::{ACCEPTED_CA_CERT_EXTENSIONS, MAX_CA_CERT_FILE_SIZE, UploadPolicy};

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("console config is not valid JSON: {message}")]
    Parse { message: String },
    #[error("max_ca_cert_file_size must be greater than zero")]
    ZeroFileSize,
    #[error("accepted_ca_cert_extensions must not be empty")]
    NoExtensions,
    #[error("invalid certificate extension {value:?}")]
    InvalidExtension { value: String },
    #[error("error_text_max_chars must be greater than zero")]
    ZeroErrorTextLimit,
    #[error("invalid log level {value:?}")]
    InvalidLogLevel { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    #[serde(alias = "maxCaCertFileSize")]
    pub max_ca_cert_file_size: u64,
    #[serde(alias = "acceptedCaCertExtensions")]
    pub accepted_ca_cert_extensions: Vec<String>,
    #[serde(alias = "errorTextMaxChars")]
    pub error_text_max_chars: usize,
    #[serde(alias = "logLevel")]
    pub log_level: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_ca_cert_file_size: MAX_CA_CERT_FILE_SIZE,
            accepted_ca_cert_extensions: ACCEPTED_CA_CERT_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            error_text_max_chars: DEFAULT_ERROR_TEXT_MAX_CHARS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|error| ConfigError::Parse {
            message: error.to_string(),
        })?;
        config.validate()
    }

    /// Checks limits and normalises extensions to lowercase with a leading dot.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.max_ca_cert_file_size == 0 {
            return Err(ConfigError::ZeroFileSize);
        }
        if self.error_text_max_chars == 0 {
            return Err(ConfigError::ZeroErrorTextLimit);
        }
        if self.accepted_ca_cert_extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        self.accepted_ca_cert_extensions = self
            .accepted_ca_cert_extensions
            .iter()
            .map(|raw| normalize_extension(raw))
            .collect::<Result<_, _>>()?;
        self.level()?;
        Ok(self)
    }

    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(self.log_level.trim()).map_err(|_| ConfigError::InvalidLogLevel {
            value: self.log_level.clone(),
        })
    }

    #[must_use]
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_ca_cert_file_size,
            accepted_extensions: self.accepted_ca_cert_extensions.clone(),
        }
    }

    #[must_use]
    pub fn response_guard(&self) -> ResponseGuard {
        ResponseGuard::new(self.error_text_max_chars)
    }
}

fn normalize_extension(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidExtension {
            value: raw.to_string(),
        });
    }
    Ok(format!(".{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ConsoleConfig::from_json_str("{}").expect("defaults");
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.upload_policy(), UploadPolicy::default());
        assert_eq!(config.response_guard(), ResponseGuard::default());
        assert_eq!(config.level(), Ok(tracing::Level::INFO));
    }

    #[test]
    fn camel_case_keys_and_extensions_are_normalised() {
        let config = ConsoleConfig::from_json_str(
            r#"{"maxCaCertFileSize": 1024, "acceptedCaCertExtensions": ["PEM", ".Crt"], "logLevel": "debug"}"#,
        )
        .expect("valid config");
        assert_eq!(config.max_ca_cert_file_size, 1024);
        assert_eq!(config.accepted_ca_cert_extensions, vec![".pem", ".crt"]);
        assert_eq!(config.level(), Ok(tracing::Level::DEBUG));
        assert!(config.upload_policy().accepts_name("root.CRT"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            ConsoleConfig::from_json_str(r#"{"max_ca_cert_file_size": 0}"#),
            Err(ConfigError::ZeroFileSize)
        );
        assert_eq!(
            ConsoleConfig::from_json_str(r#"{"accepted_ca_cert_extensions": []}"#),
            Err(ConfigError::NoExtensions)
        );
        assert_eq!(
            ConsoleConfig::from_json_str(r#"{"accepted_ca_cert_extensions": ["p e m"]}"#),
            Err(ConfigError::InvalidExtension {
                value: "p e m".to_string()
            })
        );
        assert_eq!(
            ConsoleConfig::from_json_str(r#"{"error_text_max_chars": 0}"#),
            Err(ConfigError::ZeroErrorTextLimit)
        );
        assert_eq!(
            ConsoleConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::InvalidLogLevel {
                value: "loud".to_string()
            })
        );
        assert!(matches!(
            ConsoleConfig::from_json_str("not json"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
