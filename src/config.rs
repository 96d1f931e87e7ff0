//! Configuration
//!
//! Environment-driven configuration for the daemon. Values come from the
//! process environment (the binary loads `.env` first via dotenvy).

use std::env;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://api-dev.springscan.springverify.com";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {message}")]
    InvalidVar { var: &'static str, message: String },
}

/// Identity verification provider settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Sent as the `tokenKey` request header.
    pub token_key: String,
    /// Request timeout; a timed-out call is a gateway failure for that
    /// record only.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub database_url: String,
    pub gateway: GatewayConfig,
}

impl VerifyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let token_key = require("GATEWAY_TOKEN_KEY")?;

        let base_url = env::var("GATEWAY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_BASE_URL.to_string());

        let timeout_secs = match env::var("GATEWAY_TIMEOUT_SECS") {
            Err(_) => DEFAULT_GATEWAY_TIMEOUT_SECS,
            Ok(raw) => raw.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidVar {
                    var: "GATEWAY_TIMEOUT_SECS",
                    message: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            database_url,
            gateway: GatewayConfig {
                base_url,
                token_key,
                timeout_secs,
            },
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the env mutations cannot race each other.
    #[test]
    fn from_env_round_trip() {
        env::remove_var("DATABASE_URL");
        env::remove_var("GATEWAY_TOKEN_KEY");
        env::remove_var("GATEWAY_BASE_URL");
        env::remove_var("GATEWAY_TIMEOUT_SECS");

        assert!(matches!(
            VerifyConfig::from_env(),
            Err(ConfigError::MissingVar("DATABASE_URL"))
        ));

        env::set_var("DATABASE_URL", "postgresql://localhost/car_dealer");
        env::set_var("GATEWAY_TOKEN_KEY", "test-token");

        let config = VerifyConfig::from_env().unwrap();
        assert_eq!(config.gateway.base_url, DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.gateway.token_key, "test-token");

        env::set_var("GATEWAY_TIMEOUT_SECS", "not-a-number");
        assert!(matches!(
            VerifyConfig::from_env(),
            Err(ConfigError::InvalidVar { var: "GATEWAY_TIMEOUT_SECS", .. })
        ));

        env::remove_var("DATABASE_URL");
        env::remove_var("GATEWAY_TOKEN_KEY");
        env::remove_var("GATEWAY_TIMEOUT_SECS");
    }
}
