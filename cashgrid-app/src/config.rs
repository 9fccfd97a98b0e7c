//! Configuration loading from environment.

use std::env;

use cashgrid_types::MissingLimitPolicy;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub missing_limit_policy: MissingLimitPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let missing_limit_policy = match env::var("MISSING_LIMIT_POLICY") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("MISSING_LIMIT_POLICY must be 'unrestricted' or 'deny'"))?,
            Err(_) => MissingLimitPolicy::default(),
        };

        Ok(Self {
            port,
            database_url,
            missing_limit_policy,
        })
    }
}
