// Session establishment against the backend auth endpoints.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::StoreClient;
use super::client::decode_body;
use crate::Error;
use crate::auth::{AuthErrorBody, AuthUser, Session, TokenResponse};

impl StoreClient {
    /// `POST /auth/v1/token?grant_type=password`
    ///
    /// Stores the resulting session on this client.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Arc<Session>, Error> {
        let url = self.url("auth/v1/token")?;
        debug!("POST {url} (password grant) for {email}");

        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let resp = self
            .http()
            .post(url)
            .header("apikey", self.api_key().expose_secret())
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }
        let token: TokenResponse = decode_body(resp).await?;
        Ok(self.set_session(token.into_session()))
    }

    /// Adopt an existing access token after validating it with
    /// `GET /auth/v1/user`.
    pub async fn sign_in_with_token(&self, token: &SecretString) -> Result<Arc<Session>, Error> {
        let url = self.url("auth/v1/user")?;
        debug!("GET {url}");

        let resp = self
            .http()
            .get(url)
            .header("apikey", self.api_key().expose_secret())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }
        let user: AuthUser = decode_body(resp).await?;
        Ok(self.set_session(Session {
            access_token: token.clone(),
            refresh_token: None,
            user_id: user.id,
            email: user.email,
            expires_at: None,
        }))
    }

    /// `POST /auth/v1/token?grant_type=refresh_token`
    ///
    /// Swaps the stored session for a fresh one. Sessions adopted from a
    /// bare access token carry no refresh token and yield
    /// [`Error::SessionExpired`].
    pub async fn refresh_session(&self) -> Result<Arc<Session>, Error> {
        let current = self.require_session()?;
        let refresh = current.refresh_token.as_ref().ok_or(Error::SessionExpired)?;
        let url = self.url("auth/v1/token")?;
        debug!("POST {url} (refresh grant)");

        let resp = self
            .http()
            .post(url)
            .header("apikey", self.api_key().expose_secret())
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh.expose_secret() }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }
        let token: TokenResponse = decode_body(resp).await?;
        Ok(self.set_session(token.into_session()))
    }

    /// The current access token, refreshed first if it has expired.
    pub async fn current_access_token(&self) -> Result<SecretString, Error> {
        let session = self.require_session()?;
        if !session.is_expired() {
            return Ok(session.access_token.clone());
        }
        self.refresh_session().await.map(|s| s.access_token.clone())
    }

    /// `POST /auth/v1/logout`, then drop the local session.
    ///
    /// The local session is cleared even if the server call fails.
    pub async fn sign_out(&self) -> Result<(), Error> {
        if self.session().is_none() {
            return Ok(());
        }
        let url = self.url("auth/v1/logout")?;
        debug!("POST {url}");

        let result = self.authorize(self.http().post(url)).send().await;
        self.clear_session();
        match result {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                warn!(status = %resp.status(), "logout rejected by server");
                Ok(())
            }
            Err(e) => Err(Error::Transport(e)),
        }
    }
}

async fn auth_error(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<AuthErrorBody>(&raw)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            if raw.is_empty() {
                status.to_string()
            } else {
                raw
            }
        });
    Error::Authentication { message }
}
