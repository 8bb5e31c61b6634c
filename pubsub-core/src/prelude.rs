//! pubsub-core prelude, for capability plugins

pub use crate::{
    Register, Session, SessionBuilder,
    anyhow::{self, Context, Result},
    async_trait,
    capability::{DiscoItems, Discovery, PageInfo, PubSub, ResultSetPaging},
    error::SessionError,
    model::{Affiliation, DiscoItem, Field, Form, Item, Role, Subscription, SubscriptionState},
    tokio,
    tracing::{self, debug, error, info, instrument, trace, warn},
    transport::Transport,
    xmpp_stream::{self, Element, Jid, ns, stanza},
};

pub use std::sync::Arc;
