// src/config.rs

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::blockchain::models::{Network, DEFAULT_EXPLORER_HOST};

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// Network the agent prepares transactions for. Principals for the
    /// other network are rejected by the intent builder.
    pub network: Network,
    /// Host used to build receipt and block links.
    pub explorer_host: String,
    /// Hiro API base used by the confirmation poller.
    pub stacks_api_url: String,

    // Transaction settings
    pub broadcast_timeout: Duration,
    pub confirmation_poll_interval: Duration,
    pub confirmation_max_polls: u32,

    // Rendering
    pub memoize_renders: bool,
}

impl Default for Config {
    fn default() -> Self {
        let network = Network::default();
        Self {
            port: 8080,
            network,
            explorer_host: DEFAULT_EXPLORER_HOST.to_string(),
            stacks_api_url: network.default_api_url().to_string(),
            broadcast_timeout: Duration::from_secs(30),
            confirmation_poll_interval: Duration::from_secs(10),
            confirmation_max_polls: 60,
            memoize_renders: false,
        }
    }
}

impl Config {
    /// API base for `network`: the configured one for the configured
    /// network, the public Hiro endpoint otherwise.
    pub fn api_url_for(&self, network: Network) -> &str {
        if network == self.network {
            &self.stacks_api_url
        } else {
            network.default_api_url()
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let network = match env::var("STACKS_NETWORK") {
            Ok(raw) => raw
                .parse::<Network>()
                .map_err(|e| anyhow!(e))
                .context("STACKS_NETWORK must be 'mainnet' or 'testnet'")?,
            Err(_) => defaults.network,
        };

        let stacks_api_url = env::var("STACKS_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| network.default_api_url().to_string());
        url::Url::parse(&stacks_api_url).context("STACKS_API_URL must be a valid URL")?;

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .context("PORT must be a valid number")?,

            network,
            explorer_host: env::var("EXPLORER_HOST").unwrap_or(defaults.explorer_host),
            stacks_api_url,

            broadcast_timeout: Duration::from_secs(
                env::var("BROADCAST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("BROADCAST_TIMEOUT_SECS must be a valid number")?,
            ),
            confirmation_poll_interval: Duration::from_secs(
                env::var("CONFIRMATION_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("CONFIRMATION_POLL_INTERVAL_SECS must be a valid number")?,
            ),
            confirmation_max_polls: env::var("CONFIRMATION_MAX_POLLS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("CONFIRMATION_MAX_POLLS must be a valid number")?,

            memoize_renders: env::var("MEMOIZE_RENDERS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.memoize_renders),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_network_uses_public_api() {
        let config = Config {
            stacks_api_url: "http://localhost:3999".into(),
            ..Config::default()
        };
        assert_eq!(config.api_url_for(Network::Testnet), "http://localhost:3999");
        assert_eq!(config.api_url_for(Network::Mainnet), "https://api.hiro.so");
    }
}
