use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use uuid::Uuid;

/// An authenticated backend session.
///
/// Carries the bearer token sent on every row, function, and realtime
/// call, plus the user id that scopes all row filters.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the access token is past its expiry (if one is known).
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Body of `POST /auth/v1/token?grant_type=password`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

/// Body of `GET /auth/v1/user` (and the `user` field of a token response).
#[derive(Debug, Deserialize)]
pub(crate) struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Error envelope from the auth endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthErrorBody {
    #[serde(default, alias = "error_description", alias = "msg")]
    pub message: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_session(self) -> Session {
        let expires_at = self
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            user_id: self.user.id,
            email: self.user.email,
            expires_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn token_response_builds_session() {
        let raw = serde_json::json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": "550e8400-e29b-41d4-a716-446655440000", "email": "a@b.c" }
        });
        let resp: TokenResponse = serde_json::from_value(raw).unwrap();
        let session = resp.into_session();
        assert_eq!(session.access_token.expose_secret(), "tok");
        assert_eq!(session.email.as_deref(), Some("a@b.c"));
        assert!(!session.is_expired());
    }
}
