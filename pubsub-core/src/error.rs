//! Error types shared by the session, the registry and the handlers
use std::time::Duration;

use thiserror::Error;
use xmpp_stream::StanzaError;

use crate::action::ActionKind;

/// Failures surfaced by the transport session and its capabilities
#[derive(Debug, Error)]
pub enum SessionError {
    /// network, TLS or stream negotiation failure; fatal before any action
    #[error("connection failed: {0}")]
    Connection(String),
    /// SASL failure; fatal before any action
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// the server answered with an error stanza
    #[error("{0}")]
    Fault(StanzaError),
    /// no response inside the transport's window
    #[error("no response after {0:?}")]
    Timeout(Duration),
    /// the stream failed after it was established
    #[error("transport error: {0}")]
    Transport(String),
    /// the server answered, but not with what the request asked for
    #[error("unexpected response: {0}")]
    Malformed(String),
    /// the session was assembled without a capability a handler needs
    #[error("session has no {0} capability registered")]
    MissingCapability(&'static str),
}

impl SessionError {
    /// Map an error raised while establishing the session. Anything but a
    /// SASL failure is a connection error at that stage.
    pub fn connecting(err: xmpp_stream::Error) -> Self {
        match err {
            xmpp_stream::Error::Authentication(reason) => Self::Authentication(reason),
            other => Self::Connection(other.to_string()),
        }
    }

    /// is this a server-returned fault rather than a local or transport error?
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl From<xmpp_stream::Error> for SessionError {
    fn from(err: xmpp_stream::Error) -> Self {
        use xmpp_stream::Error as E;
        match err {
            E::Stanza(fault) => Self::Fault(fault),
            E::Timeout(after) => Self::Timeout(after),
            E::Authentication(reason) => Self::Authentication(reason),
            err @ (E::Connection(_) | E::Tls(_) | E::Cert(_)) => Self::Connection(err.to_string()),
            err @ E::Xml(_) => Self::Malformed(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// An action name outside the fixed set
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported action {0:?}")]
pub struct UnsupportedAction(pub String);

/// A request that can't be built from the supplied arguments
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// every action but `nodes` targets a node
    #[error("action {0} requires a node")]
    NodeRequired(ActionKind),
    /// publish data that isn't a well-formed XML element
    #[error("payload is not well-formed XML: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use xmpp_stream::{DefinedCondition, ErrorType};

    use super::*;

    #[test]
    fn stream_errors_map_to_session_errors() {
        let fault = StanzaError::new(ErrorType::Cancel, DefinedCondition::Conflict);
        assert!(SessionError::from(xmpp_stream::Error::Stanza(fault)).is_fault());
        assert!(matches!(
            SessionError::from(xmpp_stream::Error::Timeout(Duration::from_secs(1))),
            SessionError::Timeout(_)
        ));
        assert!(matches!(
            SessionError::from(xmpp_stream::Error::StreamClosed),
            SessionError::Transport(_)
        ));
        assert!(matches!(
            SessionError::from(xmpp_stream::Error::Tls("bad cert".into())),
            SessionError::Connection(_)
        ));
    }

    #[test]
    fn connecting_keeps_authentication_apart() {
        assert!(matches!(
            SessionError::connecting(xmpp_stream::Error::Authentication("not-authorized".into())),
            SessionError::Authentication(_)
        ));
        assert!(matches!(
            SessionError::connecting(xmpp_stream::Error::StreamClosed),
            SessionError::Connection(_)
        ));
    }
}
