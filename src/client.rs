use std::time::Duration;

use crate::config::{TdConfig, TOKEN_ENDPOINT};
use crate::error::TdAuthError;
use crate::token::TokenResponse;

/// Fixed timeout on every token-endpoint call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin client for the OAuth token endpoint.
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    pub fn new() -> Self {
        Self::with_endpoint(TOKEN_ENDPOINT)
    }

    /// Point the client at a non-default token endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Exchange an authorization code for an access/refresh token pair.
    /// `access_type=offline` is requested unless running single-access.
    pub async fn exchange_code(
        &self,
        config: &TdConfig,
        code: &str,
        single_access: bool,
    ) -> Result<TokenResponse, TdAuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ];
        if !single_access {
            params.push(("access_type", "offline"));
        }
        self.post(&params).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(
        &self,
        config: &TdConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse, TdAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ];
        self.post(&params).await
    }

    async fn post(&self, params: &[(&str, &str)]) -> Result<TokenResponse, TdAuthError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(HTTP_TIMEOUT)
            .form(params)
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TdAuthError::TokenEndpoint { status, body });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| TdAuthError::MalformedResponse(e.to_string()))
    }
}

impl Default for TokenClient {
    fn default() -> Self {
        Self::new()
    }
}
