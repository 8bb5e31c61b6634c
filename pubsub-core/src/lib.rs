//! # pubsub-core
//!
//! Session lifecycle and action dispatch for a single-shot XEP-0060 client.
//! A run connects, fetches the roster, announces presence, executes exactly
//! one [`action::Action`] through the [`registry::Registry`], then
//! disconnects no matter how the action went.
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
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
pub use anyhow;
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
pub use xmpp_stream;

pub use crate::session::{Session, SessionBuilder};

pub mod action;
pub mod capability;
pub mod classify;
pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod model;
pub mod outcome;
pub mod prelude;
pub mod registry;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

/// Register a capability with the session being assembled
pub trait Register {
    /// add the capability to one of the builder's slots in the implementation
    /// of this method
    fn register(self, builder: &mut SessionBuilder);
}
