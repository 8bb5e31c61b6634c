//! # Session
//!
//! A [`Session`] is an authenticated [`Transport`] plus the capabilities
//! handlers use. It is assembled once per run with a [`SessionBuilder`];
//! plugins add themselves through [`Register`](crate::Register).
use std::{fmt, sync::Arc};

use tracing::{debug, warn};
use xmpp_stream::{Jid, ns, stanza};

use crate::{
    capability::{Discovery, PubSub, ResultSetPaging},
    error::SessionError,
    transport::Transport,
};

/// An established session and its capabilities
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    discovery: Arc<dyn Discovery>,
    paging: Arc<dyn ResultSetPaging>,
    pubsub: Arc<dyn PubSub>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("jid", self.transport.bound_jid())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// start assembling a session over `transport`
    pub fn builder(transport: Arc<dyn Transport>) -> SessionBuilder {
        SessionBuilder {
            transport,
            discovery: None,
            paging: None,
            pubsub: None,
        }
    }

    /// full JID of this session
    pub fn jid(&self) -> &Jid {
        self.transport.bound_jid()
    }

    /// the underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// XEP-0030 capability
    pub fn discovery(&self) -> &dyn Discovery {
        self.discovery.as_ref()
    }

    /// XEP-0059 capability
    pub fn paging(&self) -> &dyn ResultSetPaging {
        self.paging.as_ref()
    }

    /// XEP-0060 capability
    pub fn pubsub(&self) -> &dyn PubSub {
        self.pubsub.as_ref()
    }

    /// Fetch the account's roster. The contents aren't used, but the request
    /// completes before presence is sent.
    pub async fn fetch_roster(&self) -> Result<usize, SessionError> {
        let resp = self.transport.request(stanza::roster_get()).await?;
        let count = resp
            .get_child("query", ns::ROSTER)
            .map_or(0, |query| query.children_named("item", ns::ROSTER).count());
        debug!(count, "roster received");
        Ok(count)
    }

    /// send initial presence
    pub async fn announce_presence(&self) -> Result<(), SessionError> {
        self.transport.send(stanza::presence()).await?;
        debug!(jid = %self.jid(), "presence sent");
        Ok(())
    }

    /// end the session
    pub async fn close(&self) -> Result<(), SessionError> {
        self.transport.close().await.inspect_err(|err| {
            warn!(?err, "error closing session");
        })
    }
}

/// Collects capabilities until every slot is filled
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    discovery: Option<Arc<dyn Discovery>>,
    paging: Option<Arc<dyn ResultSetPaging>>,
    pubsub: Option<Arc<dyn PubSub>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("jid", self.transport.bound_jid())
            .field("discovery", &self.discovery.is_some())
            .field("paging", &self.paging.is_some())
            .field("pubsub", &self.pubsub.is_some())
            .finish()
    }
}

impl SessionBuilder {
    /// the transport capabilities are built on
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// set the discovery capability
    pub fn discovery<P, U>(&mut self, plugin: U) -> &mut Self
    where
        U: Into<Arc<P>>,
        P: Discovery,
    {
        let plugin: Arc<P> = plugin.into();
        if self.discovery.replace(plugin).is_some() {
            warn!("replacing discovery capability");
        }
        self
    }

    /// set the result set paging capability
    pub fn paging<P, U>(&mut self, plugin: U) -> &mut Self
    where
        U: Into<Arc<P>>,
        P: ResultSetPaging,
    {
        let plugin: Arc<P> = plugin.into();
        if self.paging.replace(plugin).is_some() {
            warn!("replacing paging capability");
        }
        self
    }

    /// set the pub/sub capability
    pub fn pubsub<P, U>(&mut self, plugin: U) -> &mut Self
    where
        U: Into<Arc<P>>,
        P: PubSub,
    {
        let plugin: Arc<P> = plugin.into();
        if self.pubsub.replace(plugin).is_some() {
            warn!("replacing pubsub capability");
        }
        self
    }

    /// finish the session; every capability must have been registered
    pub fn build(self) -> Result<Session, SessionError> {
        Ok(Session {
            transport: self.transport,
            discovery: self
                .discovery
                .ok_or(SessionError::MissingCapability("discovery"))?,
            paging: self
                .paging
                .ok_or(SessionError::MissingCapability("paging"))?,
            pubsub: self
                .pubsub
                .ok_or(SessionError::MissingCapability("pubsub"))?,
        })
    }
}
