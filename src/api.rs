//! Client for the Solarman OpenAPI endpoints used by the bridge.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Account;
use crate::error::{AuthError, Error, FetchError};
use crate::transform::RawResponse;

const HTTP_TIMEOUT_SECS: u64 = 30;

const TOKEN_PATH: &str = "/account/v1.0/token";
const STATION_REALTIME_PATH: &str = "/station/v1.0/realTime";
const DEVICE_CURRENT_DATA_PATH: &str = "/device/v1.0/currentData";

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    /// Lifetime in seconds; the platform sends it as a string.
    pub expires_in: Option<Value>,
    pub msg: Option<String>,
}

impl TokenResponse {
    /// Positive token lifetime, if the response carries a usable one.
    pub fn expires_in_secs(&self) -> Option<i64> {
        let secs = match self.expires_in.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        (secs > 0).then_some(secs)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("msg", &self.msg)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

/// Builds the shared HTTP client used for every API call.
pub fn http_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(Error::Http)
}

impl ApiClient {
    /// `host` is either a bare host name (HTTPS is assumed) or a full base URL.
    pub fn new(http: Client, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        let base_url = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchanges the account credentials for a bearer token.
    pub async fn request_token(&self, account: &Account) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(format!("{}{TOKEN_PATH}", self.base_url))
            .query(&[("appId", account.app_id.as_str()), ("language", "en")])
            .json(&json!({
                "appSecret": account.app_secret,
                "email": account.username,
                "password": account.passhash,
            }))
            .send()
            .await
            .map_err(AuthError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(AuthError::Decode)
    }

    pub async fn station_realtime(
        &self,
        station_id: u64,
        token: &str,
    ) -> Result<RawResponse, FetchError> {
        self.post(STATION_REALTIME_PATH, json!({ "stationId": station_id }), token)
            .await
    }

    pub async fn device_current_data(
        &self,
        device_sn: &str,
        token: &str,
    ) -> Result<RawResponse, FetchError> {
        self.post(DEVICE_CURRENT_DATA_PATH, json!({ "deviceSn": device_sn }), token)
            .await
    }

    async fn post(
        &self,
        endpoint: &'static str,
        body: Value,
        token: &str,
    ) -> Result<RawResponse, FetchError> {
        let response = self
            .http
            .post(format!("{}{endpoint}", self.base_url))
            .query(&[("language", "en")])
            .header(reqwest::header::AUTHORIZATION, format!("bearer {token}"))
            .json(&body)
            .send()
            .await
            .map_err(|source| FetchError::Request { endpoint, source })?;

        let raw = response
            .json::<RawResponse>()
            .await
            .map_err(|source| FetchError::Decode { endpoint, source })?;

        if let Some(msg) = raw.failure_message() {
            log::warn!("{endpoint} reported failure: {msg}");
        }
        Ok(raw)
    }
}
