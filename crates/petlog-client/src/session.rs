//! Session credentials
//!
//! The session is owned by whoever builds the client and handed to it as an
//! `Arc`, so sign-in, refresh and sign-out are visible to every request.

use petlog_api::Credentials;
use petlog_util::UserId;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user_id: Option<UserId>,
}

/// Credentials of the signed-in user
#[derive(Debug, Default)]
pub struct Session {
    tokens: RwLock<Tokens>,
}

impl Session {
    /// A signed-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a session from tokens stored elsewhere (environment, flags).
    pub fn with_tokens(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access_token: access_token.filter(|t| !t.is_empty()),
                refresh_token: refresh_token.filter(|t| !t.is_empty()),
                user_id: None,
            }),
        }
    }

    /// Replace the credentials after a login or registration.
    ///
    /// A missing refresh token keeps the previous one.
    pub fn set(&self, credentials: &Credentials) {
        let mut tokens = self.write();
        tokens.access_token = Some(credentials.access_token.clone());
        if let Some(refresh) = &credentials.refresh_token {
            tokens.refresh_token = Some(refresh.clone());
        }
        if credentials.user_id.is_some() {
            tokens.user_id = credentials.user_id.clone();
        }
        debug!(user_id = ?tokens.user_id, "Session credentials updated");
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.write().access_token = Some(token.into());
    }

    /// Forget every credential.
    pub fn clear(&self) {
        *self.write() = Tokens::default();
        debug!("Session cleared");
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.read().user_id.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().access_token.is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(access: &str, refresh: Option<&str>) -> Credentials {
        Credentials {
            user_id: Some(UserId::new("u-1")),
            access_token: access.into(),
            refresh_token: refresh.map(Into::into),
        }
    }

    #[test]
    fn new_session_is_signed_out() {
        let session = Session::new();
        assert!(!session.is_signed_in());
        assert_eq!(session.access_token(), None);
    }

    #[test]
    fn set_then_clear() {
        let session = Session::new();
        session.set(&credentials("a", Some("r")));
        assert!(session.is_signed_in());
        assert_eq!(session.refresh_token().as_deref(), Some("r"));
        assert_eq!(session.user_id(), Some(UserId::new("u-1")));

        session.clear();
        assert!(!session.is_signed_in());
        assert_eq!(session.refresh_token(), None);
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn login_without_refresh_token_keeps_the_old_one() {
        let session = Session::with_tokens(Some("old".into()), Some("r".into()));
        session.set(&credentials("new", None));
        assert_eq!(session.access_token().as_deref(), Some("new"));
        assert_eq!(session.refresh_token().as_deref(), Some("r"));
    }

    #[test]
    fn empty_tokens_are_ignored() {
        let session = Session::with_tokens(Some(String::new()), Some(String::new()));
        assert!(!session.is_signed_in());
        assert_eq!(session.refresh_token(), None);
    }
}
