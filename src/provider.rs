use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::{TdConfig, AUTH_ENDPOINT};
use crate::error::TdAuthError;

/// Delay between attempts to read a usable callback from the login session.
const CALLBACK_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Source of one-time authorization codes.
#[async_trait]
pub trait AuthorizationCodeProvider: Send {
    async fn fetch_code(&mut self, config: &TdConfig) -> Result<String, TdAuthError>;
}

/// Authorization URL the user logs in at.
pub fn build_auth_url(config: &TdConfig) -> String {
    format!(
        "{AUTH_ENDPOINT}?response_type=code&redirect_uri={}&client_id={}",
        percent_encode(&config.redirect_uri),
        percent_encode(&config.oauth_client_code()),
    )
}

/// Interactive flow: open the system browser at the authorization URL and wait
/// on the loopback redirect port for the `code=` query parameter. There is no
/// overall timeout; the login session takes as long as the user needs.
#[derive(Debug, Default)]
pub struct BrowserCodeProvider;

impl BrowserCodeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthorizationCodeProvider for BrowserCodeProvider {
    async fn fetch_code(&mut self, config: &TdConfig) -> Result<String, TdAuthError> {
        let port = redirect_port(&config.redirect_uri).ok_or_else(|| {
            TdAuthError::CodeRetrieval(format!(
                "redirect URI '{}' has no explicit loopback port to listen on",
                config.redirect_uri
            ))
        })?;

        let listener = TcpListener::bind(("127.0.0.1", port)).await?;

        let auth_url = build_auth_url(config);
        if webbrowser::open(&auth_url).is_err() {
            tracing::warn!("Could not open browser automatically. Please visit:\n{auth_url}");
        }

        loop {
            let (mut stream, _) = listener.accept().await?;

            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await?;
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            match parse_code_from_request(&request) {
                Some(code) => {
                    let body = "<!DOCTYPE html><html><body><h1>Login successful!</h1>\
                                <p>You can close this window and return to the terminal.</p></body></html>";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).await?;
                    stream.shutdown().await?;
                    return Ok(code);
                }
                None => {
                    tracing::debug!("no authorization code in callback yet, still waiting");
                    stream.shutdown().await?;
                    tokio::time::sleep(CALLBACK_RETRY_DELAY).await;
                }
            }
        }
    }
}

/// Pre-supplied code, for tests and scripted use. Yields the same code on
/// every request.
#[derive(Debug, Clone)]
pub struct StaticCodeProvider {
    code: String,
}

impl StaticCodeProvider {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl AuthorizationCodeProvider for StaticCodeProvider {
    async fn fetch_code(&mut self, _config: &TdConfig) -> Result<String, TdAuthError> {
        Ok(self.code.clone())
    }
}

/// Explicit port of the loopback redirect URI, e.g. 8080 for
/// `http://localhost:8080/callback`.
fn redirect_port(redirect_uri: &str) -> Option<u16> {
    let rest = redirect_uri.split("://").nth(1)?;
    let authority = rest.split('/').next()?;
    let port = authority.rsplit(':').next()?;
    if port == authority {
        return None;
    }
    port.parse().ok()
}

fn parse_code_from_request(request: &str) -> Option<String> {
    // Extract the request path from "GET /callback?code=... HTTP/1.1"
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let query = path.split('?').nth(1)?;

    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("code=") {
            let decoded = urldecode(value);
            if !decoded.is_empty() {
                return Some(decoded);
            }
        }
    }
    None
}

fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(b as char);
            }
            _ => {
                result.push('%');
                result.push_str(&format!("{b:02X}"));
            }
        }
    }
    result
}

fn urldecode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(h), Some(l)) = (hi, lo) {
                let hex = [h, l];
                if let Ok(s) = std::str::from_utf8(&hex) {
                    if let Ok(val) = u8::from_str_radix(s, 16) {
                        result.push(val as char);
                        continue;
                    }
                }
            }
            result.push('%');
        } else if b == b'+' {
            result.push(' ');
        } else {
            result.push(b as char);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TdConfig {
        TdConfig {
            client_id: "MYAPP".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            user: "luke".into(),
            account_id: "123456".into(),
        }
    }

    #[test]
    fn auth_url_encodes_redirect_and_client_code() {
        let url = build_auth_url(&test_config());
        assert_eq!(
            url,
            "https://auth.tdameritrade.com/auth?response_type=code\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback\
             &client_id=MYAPP%40AMER.OAUTHAP"
        );
    }

    #[test]
    fn redirect_port_parsed_from_uri() {
        assert_eq!(redirect_port("http://localhost:8080/callback"), Some(8080));
        assert_eq!(redirect_port("https://127.0.0.1:9443"), Some(9443));
    }

    #[test]
    fn redirect_port_missing() {
        assert_eq!(redirect_port("https://localhost/callback"), None);
        assert_eq!(redirect_port("not-a-uri"), None);
    }

    #[test]
    fn parse_code_from_valid_request() {
        let request = "GET /callback?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\n";
        assert_eq!(parse_code_from_request(request), Some("abc123".into()));
    }

    #[test]
    fn parse_code_missing() {
        let request = "GET /callback?state=xyz HTTP/1.1\r\nHost: localhost\r\n";
        assert_eq!(parse_code_from_request(request), None);
    }

    #[test]
    fn parse_code_urlencoded() {
        let request = "GET /callback?code=abc%20123 HTTP/1.1\r\nHost: localhost\r\n";
        assert_eq!(parse_code_from_request(request), Some("abc 123".into()));
    }

    #[test]
    fn parse_code_empty_value() {
        let request = "GET /callback?code=&state=xyz HTTP/1.1\r\nHost: localhost\r\n";
        assert_eq!(parse_code_from_request(request), None);
    }

    #[test]
    fn urldecode_basic() {
        assert_eq!(urldecode("hello%20world"), "hello world");
        assert_eq!(urldecode("a+b"), "a b");
        assert_eq!(urldecode("plain"), "plain");
    }

    #[tokio::test]
    async fn static_provider_yields_same_code_repeatedly() {
        let config = test_config();
        let mut provider = StaticCodeProvider::new("the-code");
        assert_eq!(provider.fetch_code(&config).await.unwrap(), "the-code");
        assert_eq!(provider.fetch_code(&config).await.unwrap(), "the-code");
    }
}
