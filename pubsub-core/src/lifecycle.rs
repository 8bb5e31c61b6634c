//! # Lifecycle
//!
//! A run goes connect, fetch roster, send presence, execute one action,
//! disconnect. The disconnect happens on every path once a session exists,
//! including when the handler panics.
use std::{any::Any, fmt, panic::AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span};
use tracing_futures::Instrument;
use xmpp_stream::Jid;

use crate::{
    action::{Action, ActionKind},
    classify::classify,
    error::{SessionError, UnsupportedAction},
    handler::Context,
    outcome::{Failure, FailureKind, FaultContext, Outcome},
    registry::Registry,
    session::Session,
};

/// Opens a session. Implemented over the real stream by the binary and over a
/// scripted transport in tests.
#[async_trait]
pub trait Connect: Send + Sync {
    /// connect, authenticate, bind, and compose the capabilities
    async fn connect(&self) -> Result<Session, SessionError>;
}

/// Connection state of the run. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// nothing attempted yet
    Disconnected,
    /// stream being negotiated
    Connecting,
    /// authenticated and bound
    Authenticated,
    /// roster fetched and presence sent
    Active,
    /// disconnect in progress
    Closing,
    /// finished
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
struct StateTracker(SessionState);

impl StateTracker {
    fn advance(&mut self, next: SessionState) {
        if next > self.0 {
            debug!(from = %self.0, to = %next, "session state");
            self.0 = next;
        }
    }
}

/// What to run
#[derive(Debug, Clone)]
pub struct Invocation {
    /// pub/sub service addressed
    pub service: Jid,
    /// the action and its arguments
    pub action: Action,
    /// result set page size for listings
    pub page_size: Option<usize>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// the action that was dispatched
    pub action: ActionKind,
    /// its outcome
    pub outcome: Outcome,
    /// state the session ended in
    pub state: SessionState,
}

/// Failures that end a run before the action is reached
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// the action isn't in the registry
    #[error(transparent)]
    Unsupported(#[from] UnsupportedAction),
    /// the session could not be established
    #[error("connection failed: {0}")]
    Connection(String),
    /// credentials were refused
    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl From<SessionError> for LifecycleError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Authentication(reason) => Self::Authentication(reason),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Sequences one run
#[derive(Debug, Clone, Default)]
pub struct Controller {
    registry: Registry,
}

impl Controller {
    /// controller dispatching through `registry`
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Run `invocation` over a session from `connector`.
    ///
    /// Only an unsupported action or a failure to establish the session is
    /// returned as an error. Anything that goes wrong afterwards is reported
    /// in the [`RunReport`]'s outcome, and the session is closed regardless.
    pub async fn run<C>(
        &self,
        connector: &C,
        invocation: &Invocation,
    ) -> Result<RunReport, LifecycleError>
    where
        C: Connect + ?Sized,
    {
        let kind = invocation.action.kind;
        // resolved before any I/O
        let command = self.registry.get(kind)?;
        let mut state = StateTracker(SessionState::Disconnected);

        state.advance(SessionState::Connecting);
        let session = connector.connect().await?;
        state.advance(SessionState::Authenticated);
        info!(jid = %session.jid(), "session started");

        let outcome = match announce(&session).await {
            Ok(()) => {
                state.advance(SessionState::Active);
                let ctx = Context {
                    session: &session,
                    service: &invocation.service,
                    action: &invocation.action,
                    page_size: invocation.page_size,
                };
                let span = info_span!("action", action = %kind);
                match AssertUnwindSafe(command.execute(&ctx))
                    .catch_unwind()
                    .instrument(span)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let failure = aborted(kind, &invocation.action, panic);
                        error!(action = %kind, "could not execute {kind}: {}", failure.kind);
                        Outcome::Failure(failure)
                    }
                }
            }
            Err(err) => {
                let failure = classify(
                    format!("could not start session, skipping {kind}"),
                    err,
                    FaultContext::default().with_jid(session.jid().to_string()),
                );
                failure.log();
                Outcome::Failure(failure)
            }
        };

        state.advance(SessionState::Closing);
        // errors are logged by the session
        let _ = session.close().await;
        state.advance(SessionState::Closed);
        info!(action = %kind, success = outcome.is_success(), "disconnected");

        Ok(RunReport {
            action: kind,
            outcome,
            state: state.0,
        })
    }
}

/// roster first, then presence
async fn announce(session: &Session) -> Result<(), SessionError> {
    session.fetch_roster().await?;
    session.announce_presence().await
}

fn aborted(kind: ActionKind, action: &Action, panic: Box<dyn Any + Send>) -> Failure {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned());
    Failure {
        summary: format!("could not execute {kind}"),
        kind: FailureKind::Aborted { reason },
        context: FaultContext {
            node: action.node.clone(),
            ..FaultContext::default()
        },
    }
}
