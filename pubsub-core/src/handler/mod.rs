//! Command handlers, one per [`ActionKind`].
//!
//! Every handler builds one request, submits it through the session's
//! capabilities and turns the response into an [`Outcome`]. Faults are
//! classified and logged here; nothing propagates past `execute`.
use std::fmt;

use async_trait::async_trait;
use xmpp_stream::Jid;

use crate::{
    action::{Action, ActionKind},
    classify::{classify, invalid},
    error::{SessionError, ValidationError},
    outcome::{FaultContext, Outcome},
    session::Session,
};

mod affiliation;
mod item;
mod node;
mod nodes;
mod subscription;

pub use affiliation::{GetAffiliations, SetOwnerAffiliation};
pub use item::{GetItem, PLACEHOLDER_PAYLOAD, Publish, Retract};
pub use node::{Create, Delete, GetConfiguration, Purge};
pub use nodes::Nodes;
pub use subscription::{Subscribe, Unsubscribe};

/// Everything a handler may touch while it runs
#[derive(Debug)]
pub struct Context<'a> {
    /// the established session
    pub session: &'a Session,
    /// pub/sub service the action is addressed to
    pub service: &'a Jid,
    /// the action and its arguments
    pub action: &'a Action,
    /// result set page size for listings, `None` to take what the server sends
    pub page_size: Option<usize>,
}

impl Context<'_> {
    /// bare JID of this session
    pub fn bare_jid(&self) -> Jid {
        self.session.jid().bare()
    }
}

/// A handler for one action
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// the action this handles
    fn kind(&self) -> ActionKind;

    /// run the action. Must not panic on server or transport errors.
    async fn execute(&self, ctx: &Context<'_>) -> Outcome;
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.kind()).finish()
    }
}

/// log and wrap a failed request
fn failed(summary: String, err: SessionError, context: FaultContext) -> Outcome {
    let failure = classify(summary, err, context);
    failure.log();
    Outcome::Failure(failure)
}

/// log and wrap a request that could not be built
fn rejected(summary: String, err: ValidationError, context: FaultContext) -> Outcome {
    let failure = invalid(summary, err, context);
    failure.log();
    Outcome::Failure(failure)
}

/// the target node, or the rejection to return when it's missing
fn require_node<'a>(ctx: &'a Context<'_>, summary: &str) -> Result<&'a str, Outcome> {
    ctx.action
        .node()
        .map_err(|err| rejected(summary.to_owned(), err, FaultContext::default()))
}
