//! # Host Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     BROKER_PORT=8080                                                    │
//! │     BROKER_SEED_DEMO=true                                               │
//! │     BROKER_JWT_SECRET=...                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     $BROKER_CONFIG, or                                                  │
//! │     ~/.config/broker/broker.toml (Linux)                                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [payments]
//! base_url = "https://erp.example.com"
//! payment_threshold_cents = 10000000
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_lifetime_secs = 3600
//!
//! [schema]
//! order_columns = ["project_id", "buyer_id", "invoice_amount", "sale_value"]
//!
//! [[actors]]
//! id = "u-ops"
//! name = "Operations"
//! capabilities = ["payment.submit", "commission.calculate"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use broker_core::schema::OptionalColumn;
use broker_core::voucher::ApprovalPolicy;
use broker_core::{Capability, Money, VoucherSettings, DEFAULT_CURRENCY, DEFAULT_RANKING_TOP_N};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Seed the in-memory store with demo orders and vouchers.
    pub seed_demo: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            seed_demo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Secret used to sign development tokens when none is configured.
pub const DEV_JWT_SECRET: &str = "broker-dev-secret-change-in-production";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 key for actor bearer tokens.
    pub jwt_secret: String,
    pub token_lifetime_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// Prefix of QR verification URLs.
    pub base_url: String,
    pub payment_threshold_cents: i64,
    pub receipt_threshold_cents: i64,
    /// Used when a voucher request names no currency.
    pub currency: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        let policy = ApprovalPolicy::default();
        Self {
            base_url: "http://localhost:8080".to_string(),
            payment_threshold_cents: policy.payment_threshold.cents(),
            receipt_threshold_cents: policy.receipt_threshold.cents(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionSettings {
    pub currency: String,
    /// Period of the settle tick. Zero disables it.
    pub settle_interval_secs: u64,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            settle_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub ranking_top_n: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            ranking_top_n: DEFAULT_RANKING_TOP_N,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Optional order columns the backing store exposes.
    pub order_columns: Vec<String>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            order_columns: OptionalColumn::ALL
                .iter()
                .map(|c| c.column_name().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_interval_ms: u64,
    /// Total time spent retrying one verb before the conflict is surfaced.
    pub max_elapsed_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 20,
            max_elapsed_ms: 2_000,
        }
    }
}

impl RetrySettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_ms)
    }
}

/// One `[[actors]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

// =============================================================================
// Root
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub payments: PaymentSettings,
    #[serde(default)]
    pub commission: CommissionSettings,
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub actors: Vec<ActorEntry>,
}

impl BrokerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`broker.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("BROKER_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);
        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading broker config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payments.payment_threshold_cents < 0 || self.payments.receipt_threshold_cents < 0 {
            return Err(ConfigError::Invalid(
                "approval thresholds must not be negative".into(),
            ));
        }
        if !self.payments.base_url.starts_with("http://")
            && !self.payments.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "payments.base_url must start with http:// or https://, got: {}",
                self.payments.base_url
            )));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_lifetime_secs must be greater than 0".into(),
            ));
        }
        if self.dashboard.ranking_top_n == 0 {
            return Err(ConfigError::Invalid(
                "dashboard.ranking_top_n must be greater than 0".into(),
            ));
        }
        if self.retry.max_elapsed_ms < self.retry.initial_interval_ms {
            return Err(ConfigError::Invalid(
                "retry.max_elapsed_ms must be at least retry.initial_interval_ms".into(),
            ));
        }
        for column in &self.schema.order_columns {
            if !OptionalColumn::ALL.iter().any(|c| c.column_name() == column) {
                return Err(ConfigError::Invalid(format!("unknown order column '{}'", column)));
            }
        }
        for actor in &self.actors {
            if actor.id.trim().is_empty() {
                return Err(ConfigError::Invalid("actor id must not be empty".into()));
            }
            for capability in &actor.capabilities {
                capability
                    .parse::<Capability>()
                    .map_err(|e| ConfigError::Invalid(format!("actor {}: {}", actor.id, e)))?;
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BROKER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("BROKER_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring unparsable BROKER_PORT"),
            }
        }

        if let Ok(seed) = std::env::var("BROKER_SEED_DEMO") {
            self.server.seed_demo = matches!(seed.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(level) = std::env::var("BROKER_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }

        if let Ok(secret) = std::env::var("BROKER_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(url) = std::env::var("BROKER_BASE_URL") {
            debug!(url = %url, "Overriding verification base URL from environment");
            self.payments.base_url = url;
        }
    }

    /// `broker.toml` in the platform config directory.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "broker", "broker")
            .map(|dirs| dirs.config_dir().join("broker.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn voucher_settings(&self) -> VoucherSettings {
        VoucherSettings {
            policy: ApprovalPolicy {
                payment_threshold: Money::from_cents(self.payments.payment_threshold_cents),
                receipt_threshold: Money::from_cents(self.payments.receipt_threshold_cents),
            },
            base_url: self.payments.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schema.order_columns.len(), OptionalColumn::ALL.len());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_sections() {
        let config = BrokerConfig::from_toml(
            r#"
            [server]
            port = 9000

            [payments]
            base_url = "https://erp.example.com/"
            payment_threshold_cents = 5000

            [schema]
            order_columns = ["project_id"]

            [[actors]]
            id = "u-1"
            name = "Ops"
            capabilities = ["payment.submit", "commission.pay"]
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.actors[0].capabilities.len(), 2);

        let settings = config.voucher_settings();
        assert_eq!(settings.base_url, "https://erp.example.com");
        assert_eq!(settings.policy.payment_threshold, Money::from_cents(5000));
    }

    #[test]
    fn test_rejects_unknown_capability() {
        let config = BrokerConfig::from_toml(
            r#"
            [[actors]]
            id = "u-1"
            name = "Ops"
            capabilities = ["payment.teleport"]
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_empty_jwt_secret() {
        let config = BrokerConfig::from_toml(
            r#"
            [auth]
            jwt_secret = "  "
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(BrokerConfig::default().auth.jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn test_rejects_unknown_column() {
        let mut config = BrokerConfig::default();
        config.schema.order_columns.push("developer_share".to_string());
        assert!(config.validate().is_err());
    }
}
