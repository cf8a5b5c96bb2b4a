use anyhow::{Result, bail};
use async_trait::async_trait;
use log::{debug, info};

use crate::config::{Config, TOKEN_ENV};

/// An authenticated operator session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
}

impl Session {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

/// Source of sessions for the login screen.
///
/// `sign_in` either yields a session or an error that is shown to the
/// operator, who can retry.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in(&self) -> Result<Session>;
}

/// Reads the session token from configuration (already merged with the
/// environment override)
pub struct ConfigSessionProvider {
    username: Option<String>,
    token: Option<String>,
}

impl ConfigSessionProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl SessionProvider for ConfigSessionProvider {
    async fn sign_in(&self) -> Result<Session> {
        let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            bail!(
                "No session token configured. Run `fleet-console config set-token <TOKEN>` or set {}",
                TOKEN_ENV
            );
        };

        let username = self
            .username
            .clone()
            .unwrap_or_else(|| "operator".to_string());
        info!("Signed in as {}", username);
        Ok(Session::new(username, token))
    }
}

/// Always signs in with a fixed session. Used by offline mode.
pub struct StaticSessionProvider {
    session: Session,
}

impl StaticSessionProvider {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn sign_in(&self) -> Result<Session> {
        debug!("Using static session for {}", self.session.username);
        Ok(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_fails() {
        let provider = ConfigSessionProvider::new(&Config::default());
        let err = provider.sign_in().await.unwrap_err();
        assert!(err.to_string().contains("No session token"));
    }

    #[tokio::test]
    async fn test_configured_token() {
        let mut config = Config::default();
        config.set_token(Some("ops".to_string()), "abc".to_string());
        let session = ConfigSessionProvider::new(&config).sign_in().await.unwrap();
        assert_eq!(session, Session::new("ops", "abc"));
    }

    #[tokio::test]
    async fn test_default_username() {
        let config = Config::default().with_overrides(None, Some("abc".to_string()));
        let session = ConfigSessionProvider::new(&config).sign_in().await.unwrap();
        assert_eq!(session.username, "operator");
    }
}
