//! Configuration for the `WaChat` gateway
//!
//! All settings come from the process environment (optionally seeded from a
//! `.env` file by the binary). The resulting [`Config`] is built once at
//! startup and handed to each component at construction.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{Error, Result};

/// Default Graph API base URL (versioned)
pub const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v22.0";

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default timeout for outbound HTTP calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// `WhatsApp` Cloud API settings
    pub whatsapp: WhatsAppConfig,

    /// `OpenAI` settings
    pub openai: OpenAiConfig,

    /// HTTP server settings
    pub api_server: ApiServerConfig,

    /// Deployment environment tag (e.g. "development", "production")
    pub environment: String,

    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,

    /// Echo inbound images/documents back with the answer as caption
    pub echo_media: bool,

    /// Reply sent when the completion provider fails
    pub fallback_reply: String,
}

/// `WhatsApp` Cloud API configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Business API access token
    pub access_token: SecretString,

    /// Phone number ID used as the sender
    pub phone_number_id: String,

    /// Shared secret echoed back by Meta during webhook registration
    pub verify_token: SecretString,

    /// Graph API base URL, including the version segment
    pub api_base: String,
}

/// `OpenAI` configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: SecretString,

    /// Model identifier for the Responses API
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// Vector store backing the `file_search` tool, if any
    pub vector_store_id: Option<String>,

    /// System instructions sent with every request
    pub instructions: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Shared secret for the manual test endpoints (from `WACHAT_API_KEY`)
    pub api_key: Option<SecretString>,
}

/// Presence of a single configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Missing,
}

impl CheckStatus {
    const fn from_present(present: bool) -> Self {
        if present { Self::Ok } else { Self::Missing }
    }
}

/// Per-variable presence report for the required configuration
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentChecks {
    pub verify_token: CheckStatus,
    pub whatsapp_token: CheckStatus,
    pub phone_number_id: CheckStatus,
    pub openai_key: CheckStatus,
}

impl EnvironmentChecks {
    /// Each required environment variable with its status
    #[must_use]
    pub const fn entries(&self) -> [(&'static str, CheckStatus); 4] {
        [
            ("VERIFY_TOKEN", self.verify_token),
            ("WHATSAPP_TOKEN", self.whatsapp_token),
            ("PHONE_NUMBER_ID", self.phone_number_id),
            ("OPENAI_API_KEY", self.openai_key),
        ]
    }

    /// Names of the required variables that are missing
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, status)| *status == CheckStatus::Missing)
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether every required value is present
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.missing().is_empty()
    }
}

impl WhatsAppConfig {
    /// URL of the send-message endpoint
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is malformed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from the process environment, leaving missing
    /// required values empty
    ///
    /// Used for diagnostics; [`Self::environment_checks`] reports what is
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns error if an optional value is malformed
    pub fn from_env_lenient() -> Result<Self> {
        Self::from_lookup_lenient(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_lookup_lenient(lookup)?;

        let missing = config.environment_checks().missing();
        if !missing.is_empty() {
            for key in &missing {
                tracing::error!(var = key, "missing required environment variable");
            }
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(config)
    }

    /// Load configuration through a lookup without requiring the required
    /// variables
    ///
    /// # Errors
    ///
    /// Returns error if an optional value is malformed
    pub fn from_lookup_lenient<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).unwrap_or_default();

        let whatsapp = WhatsAppConfig {
            access_token: SecretString::from(required("WHATSAPP_TOKEN")),
            phone_number_id: required("PHONE_NUMBER_ID"),
            verify_token: SecretString::from(required("VERIFY_TOKEN")),
            api_base: get("WHATSAPP_API_BASE")
                .map_or_else(|| DEFAULT_WHATSAPP_API_BASE.to_string(), |s| trim_base(&s)),
        };

        let openai = OpenAiConfig {
            api_key: SecretString::from(required("OPENAI_API_KEY")),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL")
                .map_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string(), |s| trim_base(&s)),
            vector_store_id: get("OPENAI_VECTOR_STORE_ID"),
            instructions: get("WACHAT_SYSTEM_PROMPT")
                .unwrap_or_else(|| crate::prompt::DEFAULT_INSTRUCTIONS.to_string()),
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {raw}")))?,
            None => DEFAULT_PORT,
        };

        let api_server = ApiServerConfig {
            port,
            api_key: get("WACHAT_API_KEY").map(SecretString::from),
        };

        let http_timeout = match get("WACHAT_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| Error::Config(format!("invalid WACHAT_HTTP_TIMEOUT_SECS: {raw}")))?,
            None => DEFAULT_HTTP_TIMEOUT,
        };

        let echo_media = get("WACHAT_ECHO_MEDIA")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        Ok(Self {
            whatsapp,
            openai,
            api_server,
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            http_timeout,
            echo_media,
            fallback_reply: get("WACHAT_FALLBACK_REPLY")
                .unwrap_or_else(|| crate::agent::FALLBACK_REPLY.to_string()),
        })
    }

    /// Report which required values are present
    #[must_use]
    pub fn environment_checks(&self) -> EnvironmentChecks {
        let present = |s: &SecretString| !s.expose_secret().is_empty();
        EnvironmentChecks {
            verify_token: CheckStatus::from_present(present(&self.whatsapp.verify_token)),
            whatsapp_token: CheckStatus::from_present(present(&self.whatsapp.access_token)),
            phone_number_id: CheckStatus::from_present(!self.whatsapp.phone_number_id.is_empty()),
            openai_key: CheckStatus::from_present(present(&self.openai.api_key)),
        }
    }

    /// Whether a knowledge base is configured for document search
    #[must_use]
    pub const fn has_knowledge_base(&self) -> bool {
        self.openai.vector_store_id.is_some()
    }

    /// Whether this is a production deployment
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
            || self.environment.eq_ignore_ascii_case("prod")
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("VERIFY_TOKEN", "verify-me"),
        ("WHATSAPP_TOKEN", "wa-token"),
        ("PHONE_NUMBER_ID", "1234567890"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn test_loads_required_with_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.whatsapp.phone_number_id, "1234567890");
        assert_eq!(config.whatsapp.verify_token.expose_secret(), "verify-me");
        assert_eq!(config.whatsapp.api_base, DEFAULT_WHATSAPP_API_BASE);
        assert_eq!(config.openai.model, DEFAULT_MODEL);
        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.api_server.port, DEFAULT_PORT);
        assert_eq!(config.environment, "development");
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert!(config.openai.vector_store_id.is_none());
        assert!(config.api_server.api_key.is_none());
        assert!(!config.echo_media);
        assert_eq!(config.fallback_reply, crate::agent::FALLBACK_REPLY);
        assert!(!config.is_production());
        assert!(config.environment_checks().all_ok());
    }

    #[test]
    fn test_reports_every_missing_variable() {
        let err = Config::from_lookup(lookup(&[("VERIFY_TOKEN", "x"), ("WHATSAPP_TOKEN", "  ")]))
            .unwrap_err();
        let message = err.to_string();

        assert!(message.contains("WHATSAPP_TOKEN"));
        assert!(message.contains("PHONE_NUMBER_ID"));
        assert!(message.contains("OPENAI_API_KEY"));
        assert!(!message.contains("VERIFY_TOKEN"));
    }

    #[test]
    fn test_optional_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("OPENAI_VECTOR_STORE_ID", "vs_123"),
            ("ENVIRONMENT", "production"),
            ("PORT", "9000"),
            ("WHATSAPP_API_BASE", "http://localhost:1234/v22.0/"),
            ("WACHAT_HTTP_TIMEOUT_SECS", "5"),
            ("WACHAT_ECHO_MEDIA", "true"),
            ("WACHAT_API_KEY", "secret"),
            ("WACHAT_FALLBACK_REPLY", "Lo siento, inténtalo más tarde."),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert!(config.has_knowledge_base());
        assert!(config.is_production());
        assert_eq!(config.api_server.port, 9000);
        assert_eq!(config.whatsapp.api_base, "http://localhost:1234/v22.0");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.echo_media);
        assert!(config.api_server.api_key.is_some());
        assert_eq!(config.fallback_reply, "Lo siento, inténtalo más tarde.");
    }

    #[test]
    fn test_rejects_bad_port() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));

        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_checks_flag_empty_values() {
        let mut config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        config.openai.api_key = SecretString::from(String::new());

        let checks = config.environment_checks();
        assert_eq!(checks.openai_key, CheckStatus::Missing);
        assert_eq!(checks.verify_token, CheckStatus::Ok);
        assert!(!checks.all_ok());
    }

    #[test]
    fn test_lenient_load_reports_missing_through_checks() {
        let config =
            Config::from_lookup_lenient(lookup(&[("VERIFY_TOKEN", "x"), ("WHATSAPP_TOKEN", " ")]))
                .unwrap();

        let checks = config.environment_checks();
        assert_eq!(
            checks.missing(),
            vec!["WHATSAPP_TOKEN", "PHONE_NUMBER_ID", "OPENAI_API_KEY"]
        );
        assert_eq!(checks.entries()[0], ("VERIFY_TOKEN", CheckStatus::Ok));
    }
}
