// ============================================================================
// Configuration
// ============================================================================
//
// TOML file with environment overrides for the secrets. The file is looked
// up at SALES_ENGINE_CONFIG (default ./sales-engine.toml) and may be absent
// entirely, in which case defaults apply. Secrets are never required to live
// in the file: DATABASE_URL, GATEWAY_API_KEY, GATEWAY_WEBHOOK_SECRET and
// CARRIER_API_KEY always win over their file counterparts.
//
// ============================================================================

use anyhow::Context;
use serde::Deserialize;

use crate::services::quotes::QuotePolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub carrier: CarrierConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub shipping: ShippingConfig,
}

impl AppConfig {
    /// Load config from the configured path, then layer env overrides on
    /// top. A missing file is fine; a malformed one is not.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("SALES_ENGINE_CONFIG")
            .unwrap_or_else(|_| "sales-engine.toml".to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "no config file found, using defaults");
                AppConfig::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read config file: {}", path))
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(key) = std::env::var("GATEWAY_API_KEY") {
            self.gateway.api_key = key;
        }
        if let Ok(secret) = std::env::var("GATEWAY_WEBHOOK_SECRET") {
            self.gateway.webhook_secret = secret;
        }
        if let Ok(key) = std::env::var("CARRIER_API_KEY") {
            self.carrier.api_key = key;
        }
    }

    /// Refuse to start with holes that would silently disable security or
    /// point at nothing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway.webhook_secret.trim().is_empty() {
            anyhow::bail!(
                "gateway webhook secret is not configured; \
                 set GATEWAY_WEBHOOK_SECRET or [gateway].webhook_secret"
            );
        }
        if self.database.url.trim().is_empty() {
            anyhow::bail!("database url is not configured; set DATABASE_URL or [database].url");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "postgres://localhost/sales_engine".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    /// Shared secret for webhook signature verification. Must be set.
    #[serde(default)]
    pub webhook_secret: String,
}

fn default_gateway_url() -> String {
    "https://api.gateway.example.com".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_key: String::new(),
            webhook_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierConfig {
    #[serde(default = "default_carrier_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,
}

fn default_carrier_url() -> String {
    "https://api.carrier.example.com".to_string()
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            base_url: default_carrier_url(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_url")]
    pub base_url: String,
}

fn default_notifier_url() -> String {
    "http://localhost:8090".to_string()
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_notifier_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingConfig {
    /// Carrier favored within the quote tolerance band.
    #[serde(default)]
    pub preferred_carrier: Option<String>,

    /// Accepted band above the cheapest quote, in percent.
    #[serde(default = "default_tolerance_percent")]
    pub tolerance_percent: i64,

    /// Flat fee in cents charged when no carrier can quote.
    #[serde(default = "default_fallback_fee")]
    pub fallback_fee: i64,
}

fn default_tolerance_percent() -> i64 {
    10
}

fn default_fallback_fee() -> i64 {
    1_500
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            preferred_carrier: None,
            tolerance_percent: default_tolerance_percent(),
            fallback_fee: default_fallback_fee(),
        }
    }
}

impl ShippingConfig {
    pub fn quote_policy(&self) -> QuotePolicy {
        QuotePolicy {
            preferred_carrier: self.preferred_carrier.clone(),
            tolerance_percent: self.tolerance_percent,
            fallback_fee: self.fallback_fee,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_falls_back_to_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.shipping.tolerance_percent, 10);
        assert!(config.shipping.preferred_carrier.is_none());
    }

    #[test]
    fn test_partial_config_keeps_unnamed_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [shipping]
            preferred_carrier = "roadrunner"
            fallback_fee = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.shipping.fallback_fee, 2_000);
        assert_eq!(config.shipping.tolerance_percent, 10);
        assert_eq!(
            config.shipping.quote_policy().preferred_carrier.as_deref(),
            Some("roadrunner")
        );
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(AppConfig::from_toml("server = 12").is_err());
    }

    #[test]
    fn test_validate_requires_webhook_secret() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml(
            r#"
            [gateway]
            webhook_secret = "whsec_123"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
