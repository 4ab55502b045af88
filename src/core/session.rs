//! Session store
//!
//! Holds the authenticated identity and its bearer token. Exactly one store is
//! built at startup and shared behind an `Arc`; it is the only writer of the
//! session, everything else reads through `current()` / `token()`.
//!
//! The session survives restarts through a `SessionStorage` backend under two
//! fixed keys: `token` (the raw bearer credential) and `user` (the identity
//! as JSON). Both are written on login and removed on logout.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::traits::{AuthApi, SessionStorage};
use crate::types::{LedgerError, Session};

/// Storage key of the bearer credential
pub const TOKEN_KEY: &str = "token";

/// Storage key of the serialized identity
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone)]
struct Authenticated {
    session: Session,
    token: String,
}

/// Process-wide owner of the authenticated session
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: RwLock<Option<Authenticated>>,
}

impl SessionStore {
    /// Build a store and restore any persisted session
    ///
    /// A session is restored only when both keys are present and the identity
    /// parses. A corrupt identity is cleared from storage and the store starts
    /// logged out.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Result<Self, LedgerError> {
        let token = storage.load(TOKEN_KEY)?;
        let user = storage.load(USER_KEY)?;

        let state = match (token, user) {
            (Some(token), Some(user)) => match serde_json::from_str::<Session>(&user) {
                Ok(session) => {
                    debug!(user_id = session.user_id, "restored persisted session");
                    Some(Authenticated { session, token })
                }
                Err(e) => {
                    warn!("Discarding unreadable persisted session: {e}");
                    storage.remove(TOKEN_KEY)?;
                    storage.remove(USER_KEY)?;
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            storage,
            state: RwLock::new(state),
        })
    }

    /// Authenticate and persist the resulting session
    pub async fn login(
        &self,
        auth: &dyn AuthApi,
        email: &str,
        password: &str,
    ) -> Result<Session, LedgerError> {
        let response = auth.login(email, password).await?;
        let session = Session::from(response.user);

        self.storage.save(TOKEN_KEY, &response.token)?;
        self.storage
            .save(USER_KEY, &serde_json::to_string(&session)?)?;

        *self.state.write().await = Some(Authenticated {
            session: session.clone(),
            token: response.token,
        });

        info!(user_id = session.user_id, role = %session.role, "logged in");
        Ok(session)
    }

    /// Forget the session, in memory and in storage
    pub async fn logout(&self) -> Result<(), LedgerError> {
        *self.state.write().await = None;
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        info!("logged out");
        Ok(())
    }

    /// Check the credential against `GET /auth/me`
    ///
    /// An authentication failure logs the session out. Any other failure
    /// (network, server) leaves the session in place and is returned.
    pub async fn verify(&self, auth: &dyn AuthApi) -> Result<Session, LedgerError> {
        self.require().await?;
        match auth.me().await {
            Ok(user) => {
                let session = Session::from(user);
                self.storage
                    .save(USER_KEY, &serde_json::to_string(&session)?)?;
                if let Some(state) = self.state.write().await.as_mut() {
                    state.session = session.clone();
                }
                Ok(session)
            }
            Err(e) if e.is_auth_failure() => {
                warn!("Session rejected by the server, logging out: {e}");
                self.logout().await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// The current identity, if logged in
    pub async fn current(&self) -> Option<Session> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|state| state.session.clone())
    }

    /// The current identity, or `LedgerError::NotLoggedIn`
    pub async fn require(&self) -> Result<Session, LedgerError> {
        self.current().await.ok_or(LedgerError::NotLoggedIn)
    }

    /// The bearer credential, if logged in
    pub async fn token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|state| state.token.clone())
    }
}
