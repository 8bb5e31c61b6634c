//! The transport seam between the session and the wire
use std::fmt;

use async_trait::async_trait;
use xmpp_stream::{Element, Jid, XmppClient};

use crate::error::SessionError;

/// An established, authenticated stream that can carry requests.
///
/// Capabilities build their requests on top of this, so each one can be
/// exercised against a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// the full JID the server bound this session to
    fn bound_jid(&self) -> &Jid;

    /// send an `<iq/>` and wait for its correlated response. An error response
    /// is returned as [`SessionError::Fault`].
    async fn request(&self, iq: Element) -> Result<Element, SessionError>;

    /// send a stanza that has no response
    async fn send(&self, stanza: Element) -> Result<(), SessionError>;

    /// end the session; must be safe to call more than once
    async fn close(&self) -> Result<(), SessionError>;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transport").field(self.bound_jid()).finish()
    }
}

#[async_trait]
impl Transport for XmppClient {
    fn bound_jid(&self) -> &Jid {
        XmppClient::bound_jid(self)
    }

    async fn request(&self, iq: Element) -> Result<Element, SessionError> {
        Ok(self.exchange(iq).await?)
    }

    async fn send(&self, stanza: Element) -> Result<(), SessionError> {
        Ok(XmppClient::send(self, stanza).await?)
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(XmppClient::close(self).await?)
    }
}
