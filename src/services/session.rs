//! Sign-in state.
//!
//! The census backend owns authentication; this module only models the
//! operations the client consumes and the "no session, back to login" guard.

use std::sync::Mutex;

use thiserror::Error;

use crate::core::{CoreError, Creator, Effect, Transience};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("{field} is required")]
    MissingCredential { field: &'static str },
    #[error("invalid user or password")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("session service unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SessionError {
    pub fn transience(&self) -> Transience {
        match self {
            SessionError::Unavailable { .. } => Transience::Retryable,
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Email or username plus password, both non-blank.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(
        identifier: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(SessionError::MissingCredential { field: "identifier" });
        }
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SessionError::MissingCredential { field: "password" });
        }
        Ok(Self { identifier, secret })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub display_name: Option<String>,
}

impl Session {
    /// Identity stamped into `createdBy`: the email, or the display name for
    /// accounts without one.
    pub fn creator(&self) -> Result<Creator, CoreError> {
        let raw = if self.email.trim().is_empty() {
            self.display_name.as_deref().unwrap_or_default()
        } else {
            self.email.as_str()
        };
        Creator::new(raw)
    }
}

/// Screens the client can be sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Trees,
    Register,
    Map,
    Statistics,
}

crate::core::enum_str! {
    impl Route {
        pub fn as_str(&self) -> &'static str;
        fn parse_str(raw: &str) -> Option<Self>;
        variants {
            Login => ["/login"],
            Trees => ["/trees"],
            Register => ["/register"],
            Map => ["/map"],
            Statistics => ["/statistics"],
        }
    }
}

pub trait SessionService: Send + Sync {
    fn sign_in(&self, credentials: &Credentials) -> Result<Session, SessionError>;
    fn sign_out(&self) -> Result<(), SessionError>;
    fn current_session(&self) -> Option<Session>;
}

/// The current session, or the route to send the user to.
///
/// Without a session any stale sign-in is cleared first; a failure to do so
/// is logged and does not change the outcome.
pub fn require_session(service: &dyn SessionService) -> Result<Session, Route> {
    if let Some(session) = service.current_session() {
        return Ok(session);
    }
    if let Err(err) = service.sign_out() {
        tracing::warn!("sign-out before login redirect failed: {err}");
    }
    Err(Route::Login)
}

#[derive(Clone, Debug)]
struct Account {
    email: String,
    username: Option<String>,
    password: String,
    display_name: Option<String>,
}

/// In-process accounts; sign-in accepts the email (any case) or the username.
#[derive(Debug, Default)]
pub struct MemorySessionService {
    accounts: Vec<Account>,
    current: Mutex<Option<Session>>,
}

impl MemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(
        mut self,
        email: impl Into<String>,
        username: Option<&str>,
        password: impl Into<String>,
    ) -> Self {
        self.accounts.push(Account {
            email: email.into(),
            username: username.map(str::to_string),
            password: password.into(),
            display_name: username.map(str::to_string),
        });
        self
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionService for MemorySessionService {
    fn sign_in(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        let id = credentials.identifier();
        let account = self
            .accounts
            .iter()
            .find(|account| {
                account.email.eq_ignore_ascii_case(id) || account.username.as_deref() == Some(id)
            })
            .filter(|account| account.password == credentials.secret())
            .ok_or(SessionError::InvalidCredentials)?;
        let session = Session {
            email: account.email.clone(),
            display_name: account.display_name.clone(),
        };
        *self.current() = Some(session.clone());
        tracing::info!(email = %session.email, "signed in");
        Ok(session)
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        if self.current().take().is_some() {
            tracing::info!("signed out");
        }
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.current().clone()
    }
}
