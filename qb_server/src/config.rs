//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use quiz_banner::db::{DatabaseConfig, DatabaseConfigError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub payments: PaymentConfig,
    pub app: AppConfig,
    /// Run the daily subscription sweep in this process
    pub sweep_enabled: bool,
    /// Prometheus scrape listener; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
    pub jwt_expiry_days: i64,
}

/// Stripe settings; payments are disabled without a secret key
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub stripe_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    /// Price of one premium term in cents
    pub price_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Frontend URL used in mailed links
    pub base_url: String,
    pub support_email: String,
    /// `development` or `production`
    pub environment: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// CLI flags passed as overrides take precedence over the environment.
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or unparsable
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        disable_sweep: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_or("SERVER_BIND", DEFAULT_BIND)?,
        };

        // Pool settings are read by the library; a missing URL falls back to
        // the local development database
        let mut database = match DatabaseConfig::from_env() {
            Ok(database) => database,
            Err(DatabaseConfigError::MissingUrl) => DatabaseConfig::development(),
            Err(DatabaseConfigError::Invalid { name, value }) => {
                return Err(ConfigError::Invalid {
                    var: name.to_string(),
                    reason: format!("cannot parse '{value}'"),
                });
            }
        };
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;
        let password_pepper =
            std::env::var("PASSWORD_PEPPER").map_err(|_| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let security = SecurityConfig {
            jwt_secret,
            password_pepper,
            jwt_expiry_days: parse_env_or("JWT_EXPIRY_DAYS", 7)?,
        };

        let payments = PaymentConfig {
            stripe_secret_key: non_empty_env("STRIPE_SECRET_KEY"),
            webhook_secret: non_empty_env("STRIPE_WEBHOOK_SECRET"),
            price_cents: parse_env_or("PREMIUM_PRICE_CENTS", 999)?,
            currency: std::env::var("PREMIUM_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        };

        let app = AppConfig {
            base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            support_email: std::env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| "support@quizbanner.app".to_string()),
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        };

        let metrics_bind = match non_empty_env("METRICS_BIND") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("'{value}' is not an IP:PORT address"),
            })?),
            None => None,
        };

        Ok(ServerConfig {
            bind,
            database,
            security,
            payments,
            app,
            sweep_enabled: !disable_sweep && parse_env_or("SWEEP_ENABLED", true)?,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if !(1..=90).contains(&self.security.jwt_expiry_days) {
            return Err(ConfigError::Invalid {
                var: "JWT_EXPIRY_DAYS".to_string(),
                reason: "Must be between 1 and 90".to_string(),
            });
        }

        if self.payments.price_cents <= 0 {
            return Err(ConfigError::Invalid {
                var: "PREMIUM_PRICE_CENTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.payments.currency.len() != 3 {
            return Err(ConfigError::Invalid {
                var: "PREMIUM_CURRENCY".to_string(),
                reason: "Must be a three-letter ISO currency code".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("cannot parse '{value}'"),
        }),
        Err(_) => Ok(default),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: DEFAULT_BIND,
            database: DatabaseConfig::development(),
            security: SecurityConfig {
                jwt_secret: "a".repeat(32),
                password_pepper: "a".repeat(16),
                jwt_expiry_days: 7,
            },
            payments: PaymentConfig {
                stripe_secret_key: None,
                webhook_secret: None,
                price_cents: 999,
                currency: "usd".to_string(),
            },
            app: AppConfig {
                base_url: "http://localhost:5173".to_string(),
                support_email: "support@example.com".to_string(),
                environment: "development".to_string(),
            },
            sweep_enabled: true,
            metrics_bind: None,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
        assert!(!valid_config().is_production());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = valid_config();
        config.security.jwt_secret = "short".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var, .. }) if var == "JWT_SECRET"
        ));
    }

    #[test]
    fn test_price_and_currency_checked() {
        let mut config = valid_config();
        config.payments.price_cents = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.payments.currency = "dollars".to_string();
        assert!(config.validate().is_err());
    }
}
