//! Connection secrets
//!
//! Secrets come from the process environment, optionally seeded from a
//! `.env` file. Validation is presence only.

use std::fmt;

use crate::errors::{RagError, Result};

pub const ENV_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";
pub const ENV_USER: &str = "SNOWFLAKE_USER";
pub const ENV_PASSWORD: &str = "SNOWFLAKE_USER_PASSWORD";
pub const ENV_ROLE: &str = "SNOWFLAKE_ROLE";
pub const ENV_DATABASE: &str = "SNOWFLAKE_DATABASE";
pub const ENV_SCHEMA: &str = "SNOWFLAKE_SCHEMA";
pub const ENV_WAREHOUSE: &str = "SNOWFLAKE_WAREHOUSE";
pub const ENV_SEARCH_SERVICE: &str = "SNOWFLAKE_CORTEX_SEARCH_SERVICE";
pub const ENV_PAT: &str = "SNOWFLAKE_PAT";

/// Every secret that must be present
pub const REQUIRED_SECRETS: [&str; 8] = [
    ENV_ACCOUNT,
    ENV_USER,
    ENV_PASSWORD,
    ENV_ROLE,
    ENV_DATABASE,
    ENV_SCHEMA,
    ENV_WAREHOUSE,
    ENV_SEARCH_SERVICE,
];

/// Connection secrets for the data platform
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    pub user: String,
    pub password: String,
    pub role: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub search_service: String,
    /// Programmatic access token; skips password login when set
    pub pat: Option<String>,
}

impl Credentials {
    /// Read secrets from the environment, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read secrets through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| RagError::MissingSecret(key.to_string()))
        };

        Ok(Self {
            account: require(ENV_ACCOUNT)?,
            user: require(ENV_USER)?,
            password: require(ENV_PASSWORD)?,
            role: require(ENV_ROLE)?,
            database: require(ENV_DATABASE)?,
            schema: require(ENV_SCHEMA)?,
            warehouse: require(ENV_WAREHOUSE)?,
            search_service: require(ENV_SEARCH_SERVICE)?,
            pat: lookup(ENV_PAT).filter(|value| !value.trim().is_empty()),
        })
    }

    /// Names of required secrets the lookup cannot provide
    pub fn missing<F>(lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        REQUIRED_SECRETS
            .iter()
            .copied()
            .filter(|key| lookup(*key).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    /// Account URL derived from the account identifier
    pub fn account_url(&self) -> String {
        let host = self.account.trim().to_lowercase().replace('_', "-");
        format!("https://{}.snowflakecomputing.com", host)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"***")
            .field("role", &self.role)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("search_service", &self.search_service)
            .field("pat", &self.pat.as_ref().map(|_| "***"))
            .finish()
    }
}
