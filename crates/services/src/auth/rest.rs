use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracker_core::Clock;
use tracker_core::model::{AuthEvent, AuthEventKind, Session, UserId};

use storage::repository::KeyValueStore;
use storage::rest::BackendConfig;

use super::{SessionHub, SessionProvider};
use crate::error::AuthError;

/// Key under which the active session is persisted between runs.
pub const SESSION_KEY: &str = "authSession";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        Session {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Email/password auth against a hosted `GoTrue` endpoint.
///
/// The session survives restarts through the device key-value store.
pub struct RestAuthClient {
    client: Client,
    config: BackendConfig,
    kv: Arc<dyn KeyValueStore>,
    hub: SessionHub,
    clock: Clock,
}

impl RestAuthClient {
    /// Build a client and load any persisted session, refreshing it if expired.
    ///
    /// A session that cannot be refreshed is discarded; the client then starts
    /// signed out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the key-value store cannot be read.
    pub async fn restore(
        config: BackendConfig,
        kv: Arc<dyn KeyValueStore>,
        clock: Clock,
    ) -> Result<Self, AuthError> {
        let client = Self {
            client: Client::new(),
            config,
            kv,
            hub: SessionHub::default(),
            clock,
        };

        let Some(raw) = client.kv.get(SESSION_KEY).await? else {
            return Ok(client);
        };
        let session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "discarding unreadable stored session");
                client.kv.remove_entries(&[SESSION_KEY]).await?;
                return Ok(client);
            }
        };

        if !session.is_expired(clock.now()) {
            client.hub.emit(AuthEventKind::SignedIn, Some(session));
            return Ok(client);
        }
        let Some(refresh_token) = session.refresh_token.clone() else {
            info!("stored session expired without a refresh token");
            client.kv.remove_entries(&[SESSION_KEY]).await?;
            return Ok(client);
        };
        if let Err(err) = client.exchange_refresh_token(&refresh_token).await {
            warn!(error = %err, "could not refresh stored session");
            client.kv.remove_entries(&[SESSION_KEY]).await?;
        }
        Ok(client)
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.hub.current()
    }

    /// Sign in with email and password. Emits `SignedIn` on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` for bad credentials, or a transport error.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.config.endpoint("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session = self.read_session(response).await?;
        self.persist(&session).await?;
        self.hub.emit(AuthEventKind::SignedIn, Some(session.clone()));
        info!(user = %session.user_id, "signed in");
        Ok(session)
    }

    /// Exchange the refresh token for a new access token. Emits `TokenRefreshed`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when signed out or the session has no
    /// refresh token.
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .hub
            .current()
            .and_then(|session| session.refresh_token)
            .ok_or(AuthError::NoSession)?;
        self.exchange_refresh_token(&refresh_token).await
    }

    /// Revoke the session remotely and forget it locally. Emits `SignedOut`.
    ///
    /// The local session is dropped even if the backend rejects the logout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when already signed out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.hub.current().ok_or(AuthError::NoSession)?;
        let outcome = self
            .client
            .post(self.config.endpoint("auth/v1/logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;
        match outcome {
            Ok(response) if !response.status().is_success() => {
                warn!(status = response.status().as_u16(), "backend refused logout");
            }
            Err(err) => warn!(error = %err, "logout request failed"),
            Ok(_) => {}
        }
        self.kv.remove_entries(&[SESSION_KEY]).await?;
        self.hub.emit(AuthEventKind::SignedOut, None);
        info!(user = %session.user_id, "signed out");
        Ok(())
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.config.endpoint("auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let session = self.read_session(response).await?;
        self.persist(&session).await?;
        self.hub.emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    async fn read_session(&self, response: Response) -> Result<Session, AuthError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }
        let token: TokenResponse = serde_json::from_str(&body)?;
        Ok(token.into_session(self.clock.now()))
    }

    async fn persist(&self, session: &Session) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session)?;
        self.kv.set_entries(&[(SESSION_KEY, raw)]).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for RestAuthClient {
    async fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.hub.subscribe()
    }
}

/// Pull a human-readable message out of an auth error body.
fn rejection_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryKeyValueStore;
    use tracker_core::time::{fixed_clock, fixed_now};

    fn config() -> BackendConfig {
        // Port 9 is discard; nothing here should reach the network.
        BackendConfig::new("http://127.0.0.1:9", "anon")
    }

    #[test]
    fn token_response_computes_expiry_from_expires_in() {
        let raw = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": { "id": "7f8c1f0e-3f4a-4c1e-9a59-2b1f2c3d4e5f", "email": "a@b.co" }
        }"#;
        let token: TokenResponse = serde_json::from_str(raw).unwrap();
        let session = token.into_session(fixed_now());
        assert_eq!(session.expires_at, Some(fixed_now() + Duration::hours(1)));
        assert_eq!(session.email.as_deref(), Some("a@b.co"));
        assert_eq!(session.refresh_token.as_deref(), Some("rt"));
    }

    #[test]
    fn rejection_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(rejection_message(body), "Invalid login credentials");
        assert_eq!(rejection_message("plain failure\n"), "plain failure");
        assert_eq!(rejection_message(r#"{"code":400}"#), r#"{"code":400}"#);
    }

    #[tokio::test]
    async fn restore_picks_up_valid_stored_session() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let mut session = Session::local(UserId::random());
        session.expires_at = Some(fixed_now() + Duration::minutes(5));
        kv.set_entries(&[(SESSION_KEY, serde_json::to_string(&session).unwrap())])
            .await
            .unwrap();

        let client = RestAuthClient::restore(config(), kv, fixed_clock()).await.unwrap();
        assert_eq!(client.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn restore_drops_expired_session_without_refresh_token() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let mut session = Session::local(UserId::random());
        session.expires_at = Some(fixed_now() - Duration::minutes(5));
        kv.set_entries(&[(SESSION_KEY, serde_json::to_string(&session).unwrap())])
            .await
            .unwrap();

        let client = RestAuthClient::restore(config(), kv.clone(), fixed_clock())
            .await
            .unwrap();
        assert_eq!(client.current_session().await, None);
        assert!(kv.dump().is_empty());
    }

    #[tokio::test]
    async fn restore_discards_garbage() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.set_entries(&[(SESSION_KEY, "not json".to_string())])
            .await
            .unwrap();

        let client = RestAuthClient::restore(config(), kv.clone(), fixed_clock())
            .await
            .unwrap();
        assert_eq!(client.current(), None);
        assert!(kv.dump().is_empty());
    }

    #[tokio::test]
    async fn sign_out_without_session_is_an_error() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let client = RestAuthClient::restore(config(), kv, fixed_clock()).await.unwrap();
        assert!(matches!(client.sign_out().await, Err(AuthError::NoSession)));
    }
}
