use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::client::TokenClient;
use crate::config::{TdConfig, API_BASE_URL};
use crate::provider::{AuthorizationCodeProvider, BrowserCodeProvider};
use crate::store::{FileStore, RefreshRecord, RefreshTokenStore};
use crate::token::{
    TokenResponse, TokenState, RENEW_MARGIN_SECS, SINGLE_ACCESS_RENEW_MARGIN_SECS,
};

/// Bounded attempts for the full authorization-code flow.
const MAX_AUTH_ATTEMPTS: u32 = 3;

/// Content negotiation for [`TokenManager::headers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Default,
    /// Adds `Content-type: application/json`, for PUT/PATCH/POST bodies.
    Json,
}

/// Manages the OAuth token lifecycle for one TD Ameritrade application: the
/// initial browser-driven login, refresh-token persistence, and transparent
/// renewal of the access token before it expires.
///
/// Failed exchanges never propagate as errors. They leave the manager logged
/// out, which callers observe through [`TokenManager::is_logged_in`] or a
/// `None` from [`TokenManager::access_token`] and [`TokenManager::headers`].
pub struct TokenManager {
    config: TdConfig,
    client: TokenClient,
    provider: Box<dyn AuthorizationCodeProvider>,
    store: Box<dyn RefreshTokenStore>,
    store_refresh_token: bool,
    single_access: bool,
    tokens: TokenState,
    logged_in: bool,
}

impl TokenManager {
    pub fn builder(config: TdConfig) -> TokenManagerBuilder {
        TokenManagerBuilder {
            config,
            provider: None,
            store: None,
            store_refresh_token: true,
            single_access: false,
            token_endpoint: None,
        }
    }

    /// Startup policy: reuse a persisted refresh token when allowed, otherwise
    /// discard any persisted record and run the full authorization-code flow.
    async fn initialize(&mut self) {
        match self.store.load(&self.config.user) {
            Some(record) if self.store_refresh_token && !self.single_access => {
                self.tokens.refresh_token = Some(record.refresh_token);
                self.tokens.refresh_expiration = Some(record.refresh_expiration);
                self.refresh_access_token().await;
            }
            Some(_) => {
                self.store.delete(&self.config.user);
                self.get_access_token().await;
            }
            None => {
                self.get_access_token().await;
            }
        }
    }

    /// Full authentication: obtain an authorization code and exchange it for
    /// an access/refresh token pair. Retries with a fresh code on each
    /// failure; exhausting the bound leaves the manager logged out.
    pub async fn get_access_token(&mut self) {
        for attempt in 1..=MAX_AUTH_ATTEMPTS {
            let code = match self.provider.fetch_code(&self.config).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!(attempt, code = e.code(), "could not retrieve authorization code: {e}");
                    self.logged_in = false;
                    continue;
                }
            };

            match self
                .client
                .exchange_code(&self.config, &code, self.single_access)
                .await
            {
                Ok(resp) => {
                    if !self.single_access {
                        self.update_refresh_token(&resp);
                    }
                    self.update_access_token(&resp);
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, code = e.code(), "could not authenticate while getting access token: {e}");
                    self.logged_in = false;
                }
            }
        }
        tracing::error!("maximum retries reached, unable to authenticate");
    }

    /// Renew the access token with the refresh grant. A refresh token near its
    /// own expiration is not attempted; a failed exchange marks logged-out.
    /// Both cases fall back to the full flow.
    pub async fn refresh_access_token(&mut self) {
        if !self.tokens.refresh_usable() {
            tracing::warn!(
                expiration = ?self.tokens.refresh_expiration,
                "refresh token expired or about to expire, renewing it"
            );
            self.get_access_token().await;
            return;
        }
        let Some(refresh_token) = self.tokens.refresh_token.clone() else {
            self.get_access_token().await;
            return;
        };

        match self.client.refresh(&self.config, &refresh_token).await {
            Ok(resp) => self.update_access_token(&resp),
            Err(e) => {
                tracing::warn!(code = e.code(), "could not authenticate while refreshing access token: {e}");
                self.logged_in = false;
                self.get_access_token().await;
            }
        }
    }

    /// Ensure the current access token outlives the next request. Call before
    /// any operation that needs a valid token.
    pub async fn authenticate(&mut self) {
        if self.single_access {
            if self.tokens.access_expires_within(SINGLE_ACCESS_RENEW_MARGIN_SECS) {
                self.get_access_token().await;
            }
        } else if self.tokens.access_expires_within(RENEW_MARGIN_SECS) {
            self.refresh_access_token().await;
        }
    }

    /// Resolved absolute URL and request headers for an API call, or `None`
    /// when the manager could not log in.
    pub async fn headers(&mut self, endpoint: &str, mode: RequestMode) -> Option<(String, HeaderMap)> {
        self.authenticate().await;
        if !self.logged_in {
            tracing::warn!("wrong authentication");
            return None;
        }

        let url = resolve_endpoint(endpoint);
        let token = self.tokens.access_token.as_deref()?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
        headers.insert(AUTHORIZATION, bearer);
        if mode == RequestMode::Json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Some((url, headers))
    }

    /// Current bearer token, renewed first if needed. `None` when logged out.
    pub async fn access_token(&mut self) -> Option<String> {
        self.authenticate().await;
        if self.logged_in {
            self.tokens.access_token.clone()
        } else {
            None
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn update_refresh_token(&mut self, resp: &TokenResponse) {
        let Some(refresh_token) = resp.refresh_token.clone() else {
            tracing::warn!("token response carried no refresh token");
            return;
        };
        self.tokens.update_refresh(refresh_token);

        if self.store_refresh_token {
            if let (Some(refresh_token), Some(refresh_expiration)) = (
                self.tokens.refresh_token.clone(),
                self.tokens.refresh_expiration,
            ) {
                let record = RefreshRecord {
                    refresh_token,
                    refresh_expiration,
                };
                if let Err(e) = self.store.save(&self.config.user, &record) {
                    tracing::warn!("failed to persist refresh token: {e}");
                }
            }
        }
    }

    fn update_access_token(&mut self, resp: &TokenResponse) {
        self.tokens.update_access(resp.access_token.clone());
        self.logged_in = true;
    }
}

impl fmt::Display for TokenManager {
    /// Logged-in state, recomputed from the access expiration.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.logged_in && !self.tokens.access_expires_within(0);
        f.write_str(if live { "logged in" } else { "logged out" })
    }
}

fn resolve_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("{API_BASE_URL}{}", endpoint.trim_start_matches('/'))
    }
}

pub struct TokenManagerBuilder {
    config: TdConfig,
    provider: Option<Box<dyn AuthorizationCodeProvider>>,
    store: Option<Box<dyn RefreshTokenStore>>,
    store_refresh_token: bool,
    single_access: bool,
    token_endpoint: Option<String>,
}

impl TokenManagerBuilder {
    pub fn code_provider(mut self, provider: impl AuthorizationCodeProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn store(mut self, store: impl RefreshTokenStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Whether the refresh token is persisted across runs. Defaults to true.
    pub fn persist_refresh_token(mut self, yes: bool) -> Self {
        self.store_refresh_token = yes;
        self
    }

    /// Single-access mode: no refresh-token reuse at all, a full login on
    /// every access-token expiry.
    pub fn single_access(mut self, yes: bool) -> Self {
        self.single_access = yes;
        self
    }

    /// Point the manager at a non-default token endpoint.
    pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = Some(url.into());
        self
    }

    /// Construct the manager and run the startup authentication policy.
    pub async fn build(self) -> TokenManager {
        let client = match self.token_endpoint {
            Some(url) => TokenClient::with_endpoint(url),
            None => TokenClient::new(),
        };
        let mut manager = TokenManager {
            config: self.config,
            client,
            provider: self
                .provider
                .unwrap_or_else(|| Box::new(BrowserCodeProvider::new())),
            store: self.store.unwrap_or_else(|| Box::new(FileStore::default())),
            store_refresh_token: self.store_refresh_token,
            single_access: self.single_access,
            tokens: TokenState::default(),
            logged_in: false,
        };
        manager.initialize().await;
        tracing::info!(user = %manager.config.user, "token manager initialized");
        manager
    }
}
