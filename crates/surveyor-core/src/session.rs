//! Signed-in identity, passed explicitly to whatever needs it

use std::sync::Arc;

use surveyor_types::Session;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::{AuthBackend, BackendError};
use crate::routes::{self, Route, RouteDecision};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not signed in")]
    SignedOut,

    #[error("Session expired, please sign in again")]
    Expired,

    #[error("Email and password are required")]
    MissingCredentials,

    #[error("{}", sign_in_message(.0))]
    Backend(#[from] BackendError),
}

/// Friendlier wording for the provider's common sign-in failures
fn sign_in_message(err: &BackendError) -> String {
    let raw = err.to_string();
    if raw.contains("Email not confirmed") {
        "Please confirm your email before logging in. Check your inbox for the confirmation link."
            .to_string()
    } else if raw.contains("Invalid login credentials") {
        "Invalid email or password. Please try again.".to_string()
    } else if raw.contains("User not found") {
        "No account found with this email. Please sign up first.".to_string()
    } else {
        raw
    }
}

/// Result of a sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    SignedIn,
    /// The provider wants the address confirmed before issuing a session
    NeedsConfirmation,
}

pub struct SessionContext {
    auth: Arc<dyn AuthBackend>,
    current: Option<Session>,
}

impl SessionContext {
    /// Start with a session restored from the previous run, if still valid
    pub fn initialize(auth: Arc<dyn AuthBackend>, restored: Option<Session>) -> Self {
        let current = restored.filter(|session| {
            let live = !session.is_expired();
            if !live {
                info!(user_id = %session.user_id, "Discarding expired session");
            }
            live
        });
        Self { auth, current }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The session, or why there is none
    pub fn require(&self) -> Result<&Session, SessionError> {
        match &self.current {
            None => Err(SessionError::SignedOut),
            Some(session) if session.is_expired() => Err(SessionError::Expired),
            Some(session) => Ok(session),
        }
    }

    pub fn guard(&self, route: &Route) -> RouteDecision {
        routes::guard(route, self.current.as_ref())
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        let session = self.auth.sign_in(email.trim(), password).await?;
        info!(user_id = %session.user_id, "Signed in");
        Ok(self.current.insert(session))
    }

    #[instrument(skip(self, password))]
    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<SignUp, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        match self.auth.sign_up(email.trim(), password).await? {
            Some(session) => {
                info!(user_id = %session.user_id, "Account created");
                self.current = Some(session);
                Ok(SignUp::SignedIn)
            }
            None => {
                info!("Account created, awaiting email confirmation");
                Ok(SignUp::NeedsConfirmation)
            }
        }
    }

    /// Local teardown always happens, even if the provider call fails
    #[instrument(skip(self))]
    pub async fn sign_out(&mut self) {
        let Some(session) = self.current.take() else {
            return;
        };
        if let Err(err) = self.auth.sign_out(&session).await {
            warn!(error = %err, "Remote sign-out failed, local session cleared anyway");
        }
        info!(user_id = %session.user_id, "Signed out");
    }
}
