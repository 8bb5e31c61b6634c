//! Opens sessions over the real XMPP stream

use std::sync::Arc;

use disco::Disco;
use pubsub::PubSubPlugin;
use pubsub_core::{
    Register, Session,
    async_trait,
    error::SessionError,
    lifecycle::Connect,
    tracing::{debug, instrument},
    transport::Transport,
};
use rsm::Rsm;
use xmpp_stream::{ConnectConfig, XmppClient};

/// [`Connect`] over TCP with STARTTLS
#[derive(Debug)]
pub struct XmppConnector {
    config: ConnectConfig,
}

impl XmppConnector {
    pub fn new(config: ConnectConfig) -> Self {
        Self { config }
    }
}

/// add every capability the handlers use to a session over `transport`
pub fn compose(transport: Arc<dyn Transport>) -> Result<Session, SessionError> {
    let mut builder = Session::builder(Arc::clone(&transport));
    Disco::new(Arc::clone(&transport)).register(&mut builder);
    Rsm.register(&mut builder);
    PubSubPlugin::new(transport).register(&mut builder);
    builder.build()
}

#[async_trait]
impl Connect for XmppConnector {
    #[instrument(level = "debug", skip(self), fields(host = %self.config.host(), port = self.config.port))]
    async fn connect(&self) -> Result<Session, SessionError> {
        let client = XmppClient::connect(&self.config)
            .await
            .map_err(SessionError::connecting)?;
        debug!(jid = %client.bound_jid(), "stream established");
        compose(Arc::new(client))
    }
}
