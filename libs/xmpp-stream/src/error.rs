//! Error types for the client stream.
//!
//! [`Error`] separates failures that happen while the stream is being set up
//! (connection, TLS, authentication) from errors the server returns for a
//! single request ([`StanzaError`]), which callers are expected to handle.
use std::{fmt, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::{element::Element, ns, tls::CertError};

/// Top-level error type for the xmpp-stream crate.
#[derive(Debug, Error)]
pub enum Error {
    /// socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TLS handshake or configuration failure
    #[error("TLS error: {0}")]
    Tls(String),
    /// certificate material could not be used
    #[error("certificate error: {0}")]
    Cert(#[from] CertError),
    /// malformed XML on the wire or in a payload
    #[error("XML error: {0}")]
    Xml(String),
    /// stream negotiation failed before authentication
    #[error("connection error: {0}")]
    Connection(String),
    /// SASL failed
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// no response to a request inside the configured window
    #[error("timed out waiting for response after {0:?}")]
    Timeout(Duration),
    /// the stream ended while a request was outstanding
    #[error("stream closed")]
    StreamClosed,
    /// a request reused the id of one still in flight
    #[error("iq id collision for id {0}")]
    IdCollision(String),
    /// the server answered a request with an error stanza
    #[error("{0}")]
    Stanza(StanzaError),
}

/// The `type` attribute of a stanza `<error/>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// retry after providing credentials
    Auth,
    /// do not retry
    Cancel,
    /// proceed, the condition was only a warning
    Continue,
    /// retry after changing the data sent
    Modify,
    /// retry after waiting
    Wait,
}

impl ErrorType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "auth" => Self::Auth,
            "cancel" => Self::Cancel,
            "continue" => Self::Continue,
            "modify" => Self::Modify,
            "wait" => Self::Wait,
            _ => return None,
        })
    }

    /// wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Cancel => "cancel",
            Self::Continue => "continue",
            Self::Modify => "modify",
            Self::Wait => "wait",
        }
    }
}

macro_rules! conditions {
    ($($variant:ident => $name:literal,)*) => {
        /// Defined stanza error conditions (RFC 6120 section 8.3.3)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum DefinedCondition {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl DefinedCondition {
            /// wire name of the condition element
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// look up a condition by element name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

conditions! {
    BadRequest => "bad-request",
    Conflict => "conflict",
    FeatureNotImplemented => "feature-not-implemented",
    Forbidden => "forbidden",
    Gone => "gone",
    InternalServerError => "internal-server-error",
    ItemNotFound => "item-not-found",
    JidMalformed => "jid-malformed",
    NotAcceptable => "not-acceptable",
    NotAllowed => "not-allowed",
    NotAuthorized => "not-authorized",
    PolicyViolation => "policy-violation",
    RecipientUnavailable => "recipient-unavailable",
    Redirect => "redirect",
    RegistrationRequired => "registration-required",
    RemoteServerNotFound => "remote-server-not-found",
    RemoteServerTimeout => "remote-server-timeout",
    ResourceConstraint => "resource-constraint",
    ServiceUnavailable => "service-unavailable",
    SubscriptionRequired => "subscription-required",
    UndefinedCondition => "undefined-condition",
    UnexpectedRequest => "unexpected-request",
}

impl fmt::Display for DefinedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application specific condition, e.g. a pubsub#errors element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppCondition {
    /// element name, e.g. `unsupported`
    pub name: String,
    /// element namespace
    pub ns: Option<String>,
    /// the `feature` attribute pubsub#errors uses for `unsupported`
    pub feature: Option<String>,
}

impl fmt::Display for AppCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(feature) = &self.feature {
            write!(f, " feature={feature}")?;
        }
        Ok(())
    }
}

/// An error stanza returned by the server in reply to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StanzaError {
    /// the `type` attribute, when the server sent a known one
    pub error_type: Option<ErrorType>,
    /// defined condition
    pub condition: DefinedCondition,
    /// human readable description
    pub text: Option<String>,
    /// application specific condition
    pub app_condition: Option<AppCondition>,
}

impl StanzaError {
    /// create an error with just a condition
    pub fn new(error_type: ErrorType, condition: DefinedCondition) -> Self {
        Self {
            error_type: Some(error_type),
            condition,
            text: None,
            app_condition: None,
        }
    }

    /// builder-style text setter
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// builder-style application condition setter
    pub fn with_app_condition(mut self, app_condition: AppCondition) -> Self {
        self.app_condition = Some(app_condition);
        self
    }

    /// extract the error from a stanza of `type='error'`. A stanza with no
    /// usable `<error/>` child is reported as `undefined-condition`.
    pub fn from_stanza(stanza: &Element) -> Self {
        match stanza.children().find(|child| child.local_name() == "error") {
            Some(error) => Self::from_error_element(error),
            None => Self::new(ErrorType::Cancel, DefinedCondition::UndefinedCondition)
                .with_text("error stanza without <error/> element"),
        }
    }

    fn from_error_element(error: &Element) -> Self {
        let error_type = error.attr("type").and_then(ErrorType::parse);
        let mut condition = None;
        let mut text = None;
        let mut app_condition = None;
        for child in error.children() {
            if child.ns() == Some(ns::STANZAS) {
                if child.local_name() == "text" {
                    text = Some(child.text());
                } else if condition.is_none() {
                    condition = DefinedCondition::from_name(child.local_name());
                }
            } else if app_condition.is_none() {
                app_condition = Some(AppCondition {
                    name: child.local_name().to_owned(),
                    ns: child.ns().map(str::to_owned),
                    feature: child.attr("feature").map(str::to_owned),
                });
            }
        }
        Self {
            error_type,
            condition: condition.unwrap_or(DefinedCondition::UndefinedCondition),
            text,
            app_condition,
        }
    }

    /// render as an `<error/>` element
    pub fn to_element(&self) -> Element {
        let mut error = Element::new("error");
        if let Some(error_type) = self.error_type {
            error.set_attr("type", error_type.as_str());
        }
        error.append_child(Element::with_ns(self.condition.as_str(), ns::STANZAS));
        if let Some(text) = &self.text {
            error.append_child(Element::with_ns("text", ns::STANZAS).with_text(text.as_str()));
        }
        if let Some(app) = &self.app_condition {
            let mut el = Element::new(app.name.as_str());
            if let Some(app_ns) = &app.ns {
                el = Element::with_ns(app.name.as_str(), app_ns.as_str());
            }
            if let Some(feature) = &app.feature {
                el.set_attr("feature", feature.as_str());
            }
            error.append_child(el);
        }
        error
    }
}

impl fmt::Display for StanzaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition)?;
        if let Some(text) = &self.text {
            write!(f, ": {text}")?;
        }
        if let Some(app) = &self.app_condition {
            write!(f, " ({app})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StanzaError {}
