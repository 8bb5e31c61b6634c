//! Minimal XMPP client stream.
//!
//! Just enough of RFC 6120 for a command line client: STARTTLS with an
//! explicit CA bundle, SASL PLAIN or EXTERNAL, resource binding, and `<iq/>`
//! request/response correlation over a split stream.
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod client;
pub mod codec;
pub mod element;
pub mod error;
pub mod jid;
pub mod ns;
pub mod sasl;
pub mod stanza;
pub mod tls;

pub use client::{ConnectConfig, DEFAULT_PORT, DEFAULT_TIMEOUT, XmppClient};
pub use element::Element;
pub use error::{AppCondition, DefinedCondition, Error, ErrorType, StanzaError};
pub use jid::{Jid, JidError};
pub use tls::{CertError, CertPaths};
