//! Authenticated HTTP session against the data platform
//!
//! One `Session` is built at startup and shared by the search client, the
//! completion client and the evaluation judge. It is never mutated after
//! construction.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::config::ConnectionConfig;
use crate::errors::{RagError, Result};
use crate::session::credentials::Credentials;

/// Login endpoint used for password authentication
const LOGIN_PATH: &str = "/session/v1/login-request";

/// Client identifier sent on login
const CLIENT_APP_ID: &str = "cortexrag";

/// How requests are authorized
#[derive(Clone)]
enum Authorization {
    /// Session token from password login
    SessionToken(String),
    /// Programmatic access token
    AccessToken(String),
}

/// Authenticated session handle
#[derive(Clone)]
pub struct Session {
    client: Client,
    base_url: String,
    authorization: Authorization,
    database: String,
    schema: String,
    search_service: String,
}

impl Session {
    /// Build the HTTP client and authenticate
    pub async fn connect(credentials: &Credentials, config: &ConnectionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(RagError::HttpError)?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| credentials.account_url());
        let base_url = base_url.trim_end_matches('/').to_string();

        let authorization = match &credentials.pat {
            Some(pat) => {
                debug!(%base_url, "using programmatic access token");
                Authorization::AccessToken(pat.clone())
            }
            None => {
                let token = login(&client, &base_url, credentials).await?;
                Authorization::SessionToken(token)
            }
        };

        info!(
            %base_url,
            database = %credentials.database,
            schema = %credentials.schema,
            "session established"
        );

        Ok(Self {
            client,
            base_url,
            authorization,
            database: credentials.database.clone(),
            schema: credentials.schema.clone(),
            search_service: credentials.search_service.clone(),
        })
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authorized POST request for an API path
    pub fn post(&self, path: &str) -> RequestBuilder {
        let request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream");

        match &self.authorization {
            Authorization::SessionToken(token) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("Snowflake Token=\"{}\"", token),
            ),
            Authorization::AccessToken(token) => request
                .bearer_auth(token)
                .header("X-Snowflake-Authorization-Token-Type", "PROGRAMMATIC_ACCESS_TOKEN"),
        }
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn search_service(&self) -> &str {
        &self.search_service
    }
}

/// Password login request body
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

/// Password login response
#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<LoginResponseData>,
}

#[derive(Debug, Deserialize)]
struct LoginResponseData {
    #[serde(default)]
    token: Option<String>,
}

/// Exchange user/password for a session token
async fn login(client: &Client, base_url: &str, credentials: &Credentials) -> Result<String> {
    let url = format!("{}{}", base_url, LOGIN_PATH);
    debug!(%url, user = %credentials.user, "logging in");

    let body = LoginRequest {
        data: LoginData {
            client_app_id: CLIENT_APP_ID,
            client_app_version: env!("CARGO_PKG_VERSION"),
            account_name: &credentials.account,
            login_name: &credentials.user,
            password: &credentials.password,
        },
    };

    let response = client
        .post(&url)
        .query(&[
            ("warehouse", credentials.warehouse.as_str()),
            ("databaseName", credentials.database.as_str()),
            ("schemaName", credentials.schema.as_str()),
            ("roleName", credentials.role.as_str()),
        ])
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(RagError::AuthError(format!("HTTP {}: {}", status, error_text)));
    }

    let login: LoginResponse = response.json().await?;
    if !login.success {
        return Err(RagError::AuthError(
            login.message.unwrap_or_else(|| "login rejected".to_string()),
        ));
    }

    login
        .data
        .and_then(|d| d.token)
        .ok_or_else(|| RagError::AuthError("login response carried no token".to_string()))
}
