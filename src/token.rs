use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Access tokens are valid for 30 minutes from issuance.
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 1800;

/// Refresh tokens are valid for 90 days from issuance.
pub const REFRESH_TOKEN_LIFETIME_SECS: i64 = 7_776_000;

/// Margin before access-token expiry at which a normal-mode renewal kicks in.
pub const RENEW_MARGIN_SECS: i64 = 5;

/// Margin before access-token expiry at which a single-access-mode renewal
/// kicks in. Wider, since single access re-runs the full browser flow.
pub const SINGLE_ACCESS_RENEW_MARGIN_SECS: i64 = 30;

/// A refresh token within this margin of its own expiration is treated as
/// unusable and renewed via the full flow instead.
pub const REFRESH_USABILITY_MARGIN_SECS: i64 = 86_400;

/// In-memory token state. Created empty, populated by the first successful
/// exchange, mutated in place on every renewal.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub access_token: Option<String>,
    pub access_expiration: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub refresh_expiration: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Store a freshly issued access token and stamp its expiration.
    pub fn update_access(&mut self, access_token: String) {
        self.access_token = Some(access_token);
        self.access_expiration =
            Some(Utc::now() + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS));
    }

    /// Store a freshly issued refresh token and stamp its expiration.
    pub fn update_refresh(&mut self, refresh_token: String) {
        self.refresh_token = Some(refresh_token);
        self.refresh_expiration =
            Some(Utc::now() + Duration::seconds(REFRESH_TOKEN_LIFETIME_SECS));
    }

    /// Whether the access token expires within `margin_secs` from now.
    /// An absent expiration counts as already expired.
    pub fn access_expires_within(&self, margin_secs: i64) -> bool {
        match self.access_expiration {
            Some(expiration) => expiration - Duration::seconds(margin_secs) < Utc::now(),
            None => true,
        }
    }

    /// Whether the stored refresh token can still be exchanged. A token within
    /// one day of its own expiration is not worth attempting.
    pub fn refresh_usable(&self) -> bool {
        match (&self.refresh_token, self.refresh_expiration) {
            (Some(_), Some(expiration)) => {
                expiration - Duration::seconds(REFRESH_USABILITY_MARGIN_SECS) >= Utc::now()
            }
            _ => false,
        }
    }
}

/// Raw token response from the OAuth endpoint. The refresh grant omits
/// `refresh_token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_counts_as_expired() {
        let state = TokenState::default();
        assert!(state.access_expires_within(RENEW_MARGIN_SECS));
        assert!(!state.refresh_usable());
    }

    #[test]
    fn fresh_access_token_is_not_near_expiry() {
        let mut state = TokenState::default();
        state.update_access("A".into());
        assert!(!state.access_expires_within(RENEW_MARGIN_SECS));
        assert!(!state.access_expires_within(SINGLE_ACCESS_RENEW_MARGIN_SECS));
    }

    #[test]
    fn access_expiration_stamped_with_lifetime() {
        let mut state = TokenState::default();
        state.update_access("A".into());
        let expected = Utc::now() + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS);
        let delta = (state.access_expiration.unwrap() - expected).num_seconds();
        assert!(delta.abs() < 5);
    }

    #[test]
    fn access_within_margin_is_near_expiry() {
        let state = TokenState {
            access_token: Some("A".into()),
            access_expiration: Some(Utc::now() + Duration::seconds(3)),
            ..Default::default()
        };
        assert!(state.access_expires_within(RENEW_MARGIN_SECS));
    }

    #[test]
    fn access_past_expiry_is_near_expiry() {
        let state = TokenState {
            access_token: Some("A".into()),
            access_expiration: Some(Utc::now() - Duration::seconds(60)),
            ..Default::default()
        };
        assert!(state.access_expires_within(RENEW_MARGIN_SECS));
        assert!(state.access_expires_within(SINGLE_ACCESS_RENEW_MARGIN_SECS));
    }

    #[test]
    fn access_within_single_access_margin_only() {
        // 20s out: fine for normal mode (5s margin), not for single access (30s).
        let state = TokenState {
            access_token: Some("A".into()),
            access_expiration: Some(Utc::now() + Duration::seconds(20)),
            ..Default::default()
        };
        assert!(!state.access_expires_within(RENEW_MARGIN_SECS));
        assert!(state.access_expires_within(SINGLE_ACCESS_RENEW_MARGIN_SECS));
    }

    #[test]
    fn refresh_usable_when_far_from_expiry() {
        let mut state = TokenState::default();
        state.update_refresh("R".into());
        assert!(state.refresh_usable());
    }

    #[test]
    fn refresh_unusable_within_one_day_of_expiry() {
        let state = TokenState {
            refresh_token: Some("R".into()),
            refresh_expiration: Some(Utc::now() + Duration::hours(12)),
            ..Default::default()
        };
        assert!(!state.refresh_usable());
    }

    #[test]
    fn refresh_unusable_without_expiration() {
        let state = TokenState {
            refresh_token: Some("R".into()),
            ..Default::default()
        };
        assert!(!state.refresh_usable());
    }

    #[test]
    fn token_response_without_refresh_token() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A"}"#).unwrap();
        assert_eq!(resp.access_token, "A");
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn token_response_with_refresh_token() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","refresh_token":"R"}"#).unwrap();
        assert_eq!(resp.refresh_token.as_deref(), Some("R"));
    }
}
