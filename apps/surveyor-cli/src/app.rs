//! Wiring between the command line and the workflow core

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use surveyor_core::{
    guard, DamageStore, Garage, Route, RouteDecision, SessionContext, SessionError,
};
use surveyor_remote::{AuthClient, InferenceClient, RemoteConfig, RestClient};
use surveyor_types::Session;
use tracing::info;

use crate::session_file::SessionFile;

/// Remote clients are built on first use, so commands that only consult
/// the saved session work without any store configuration.
pub struct App {
    config: RemoteConfig,
    sessions: SessionFile,
    session: Option<Session>,
}

impl App {
    pub fn load(config: RemoteConfig, sessions: SessionFile) -> Result<Self> {
        let session = sessions.load()?.filter(|session| {
            let live = !session.is_expired();
            if !live {
                info!(user_id = %session.user_id, "Discarding expired session");
            }
            live
        });
        if session.is_none() {
            // drop an expired session left on disk
            sessions.clear()?;
        }
        Ok(Self {
            config,
            sessions,
            session,
        })
    }

    /// Sign-in state backed by the auth endpoint, seeded with the saved session
    pub fn session_context(&self) -> Result<SessionContext> {
        let auth = AuthClient::new(&self.config).context("auth endpoint is not configured")?;
        Ok(SessionContext::initialize(
            Arc::new(auth),
            self.session.clone(),
        ))
    }

    /// Take over whatever the context now holds and save it
    pub fn adopt(&mut self, context: &SessionContext) -> Result<()> {
        self.session = context.current().cloned();
        self.sessions.sync(self.session.as_ref())
    }

    /// Drop the session locally without calling the auth endpoint
    pub fn forget(&mut self) -> Result<()> {
        self.session = None;
        self.sessions.clear()
    }

    pub fn guard(&self, route: &Route) -> RouteDecision {
        guard(route, self.session.as_ref())
    }

    /// The session for a gated view, or an error naming the redirect
    pub fn enter(&self, route: &Route) -> Result<Session> {
        match self.guard(route) {
            RouteDecision::Render(_) => match &self.session {
                Some(session) if session.is_expired() => Err(SessionError::Expired.into()),
                Some(session) => Ok(session.clone()),
                None => Err(SessionError::SignedOut.into()),
            },
            RouteDecision::Redirect(to) => Err(anyhow!(
                "{route} requires a signed-in user (redirected to {to}); run `surveyor login` first"
            )),
        }
    }

    pub fn inference(&self) -> Result<InferenceClient> {
        Ok(InferenceClient::new(&self.config)?)
    }

    pub fn records(&self, session: &Session) -> Result<RestClient> {
        Ok(RestClient::new(&self.config)?.with_session(session))
    }

    pub fn store(&self, session: &Session) -> Result<DamageStore> {
        Ok(DamageStore::new(
            Arc::new(self.records(session)?),
            Arc::new(self.inference()?),
        ))
    }

    pub fn garage(&self, session: &Session) -> Result<Garage> {
        Ok(Garage::new(Arc::new(self.records(session)?)))
    }
}
