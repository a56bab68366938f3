//! Bearer token acquisition and caching.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::api::ApiClient;
use crate::config::Account;
use crate::error::AuthError;

/// Tokens are renewed this long before they actually expire.
const TOKEN_EXPIRATION_HEADROOM_SECS: i64 = 300;
/// Lifetime assumed when the token response carries none (just under 60 days).
const DEFAULT_EXPIRES_IN_SECS: i64 = 5_183_999;

struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
    account: String,
}

impl Credential {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - TimeDelta::seconds(TOKEN_EXPIRATION_HEADROOM_SECS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("account", &self.account)
            .finish()
    }
}

/// Owns the cached credential for the lifetime of the process.
///
/// The daemon keeps one `Session` and hands it to every cycle, so a token is
/// only requested again once it is about to expire or the account changes.
#[derive(Debug, Default)]
pub struct Session {
    credential: Option<Credential>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub async fn token(&mut self, api: &ApiClient, account: &Account) -> Result<&str, AuthError> {
        self.token_at(api, account, Utc::now()).await
    }

    /// Returns the cached token when it is still valid at `now`, otherwise
    /// authenticates and replaces the cache as a whole.
    pub async fn token_at(
        &mut self,
        api: &ApiClient,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<&str, AuthError> {
        let account_key = account.key();
        let credential = match self.credential.take() {
            Some(cached) if cached.account == account_key && cached.is_fresh(now) => {
                log::debug!("using cached token");
                cached
            }
            previous => {
                log::info!("requesting a new access token");
                match authenticate(api, account, account_key, now).await {
                    Ok(fresh) => {
                        log::info!("received token valid until {}", fresh.expires_at);
                        fresh
                    }
                    Err(err) => {
                        self.credential = previous;
                        return Err(err);
                    }
                }
            }
        };

        Ok(&self.credential.insert(credential).token)
    }
}

async fn authenticate(
    api: &ApiClient,
    account: &Account,
    account_key: String,
    now: DateTime<Utc>,
) -> Result<Credential, AuthError> {
    let response = api.request_token(account).await?;

    let expires_at = response
        .expires_in_secs()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| {
            log::debug!("token lifetime missing or out of range, assuming the default");
            now + TimeDelta::seconds(DEFAULT_EXPIRES_IN_SECS)
        });
    let token = match response.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(AuthError::Rejected(
                response
                    .msg
                    .unwrap_or_else(|| "response carries no access_token".to_string()),
            ));
        }
    };

    Ok(Credential {
        token,
        expires_at,
        account: account_key,
    })
}
