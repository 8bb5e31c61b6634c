#![allow(clippy::cognitive_complexity)]
use anyhow::Result;

mod connector;

use connector::XmppConnector;
use pubsub_core::{
    config::{
        ClientConfig,
        cli::{self, Parser},
        trace,
    },
    lifecycle::Controller,
    tokio::{self, runtime::Builder},
    tracing::*,
};
use xmpp_stream::CertPaths;

fn main() -> Result<()> {
    // .env first so its values are visible to the cli parser
    let dotenv = dotenv::dotenv();
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(config.log_level())?;
    debug!(?trace_config);
    if let Err(err) = dotenv {
        debug!(?err, ".env file not loaded");
    }
    let config = ClientConfig::try_from(config)?;
    debug!(?config);

    // a single action needs no more than one thread
    let rt = Builder::new_current_thread().enable_all().build()?;

    rt.block_on(async move {
        match tokio::spawn(async move { start(config).await }).await {
            Err(err) => error!(?err, "client task failed"),
            Ok(Err(err)) => error!(?err, "exited with error"),
            Ok(_) => debug!("exiting..."),
        }
    });

    Ok(())
}

async fn start(config: ClientConfig) -> Result<()> {
    let certs = match CertPaths::discover(&config.cert_dir) {
        Ok(certs) => certs,
        Err(err) => {
            error!(%err, cert_dir = %config.cert_dir.display(), "cannot connect without certificate material");
            return Ok(());
        }
    };
    debug!(?certs, client_identity = certs.has_client_identity());

    let connector = XmppConnector::new(config.connect_config(certs));
    let report = Controller::default()
        .run(&connector, &config.invocation())
        .await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
