/// Base URL that relative endpoints are joined against.
pub const API_BASE_URL: &str = "https://api.tdameritrade.com/v1/";

/// Token exchange endpoint for both the code and refresh grants.
pub const TOKEN_ENDPOINT: &str = "https://api.tdameritrade.com/v1/oauth2/token";

/// Browser-facing authorization endpoint.
pub const AUTH_ENDPOINT: &str = "https://auth.tdameritrade.com/auth";

/// Suffix TD Ameritrade appends to locally registered client ids in the
/// authorization URL. The token endpoint takes the raw client id.
pub const CLIENT_ID_SUFFIX: &str = "@AMER.OAUTHAP";

/// Immutable per-application configuration, supplied at construction.
#[derive(Debug, Clone)]
pub struct TdConfig {
    /// Consumer key assigned during app registration.
    pub client_id: String,
    /// Redirect URI registered with the application.
    pub redirect_uri: String,
    /// Local user name the refresh token is stored under.
    pub user: String,
    /// TD account number.
    pub account_id: String,
}

impl TdConfig {
    /// Client id as it appears in the authorization URL.
    pub fn oauth_client_code(&self) -> String {
        format!("{}{}", self.client_id, CLIENT_ID_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_client_code_appends_suffix() {
        let config = TdConfig {
            client_id: "MYAPP".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            user: "luke".into(),
            account_id: "123456".into(),
        };
        assert_eq!(config.oauth_client_code(), "MYAPP@AMER.OAUTHAP");
    }
}
