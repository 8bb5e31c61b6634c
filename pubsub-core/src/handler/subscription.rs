use async_trait::async_trait;
use tracing::{info, warn};

use super::{Command, Context, failed, require_node};
use crate::{
    action::ActionKind,
    model::SubscriptionState,
    outcome::{FaultContext, Outcome, Rendered},
};

/// `subscribe` the session's bare JID
#[derive(Debug, Default, Clone, Copy)]
pub struct Subscribe;

#[async_trait]
impl Command for Subscribe {
    fn kind(&self) -> ActionKind {
        ActionKind::Subscribe
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let jid = ctx.bare_jid();
        let node = match require_node(ctx, &format!("could not subscribe {jid}")) {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().subscribe(ctx.service, node, &jid).await {
            Ok(subscription) => {
                info!(
                    jid = %subscription.jid,
                    node = %subscription.node,
                    subid = subscription.subid.as_deref(),
                    state = subscription.state.as_str(),
                    "subscribed {} to node {}",
                    subscription.jid,
                    subscription.node
                );
                if subscription.state != SubscriptionState::Subscribed {
                    warn!(
                        state = subscription.state.as_str(),
                        "subscription to node {} is not active yet", subscription.node
                    );
                }
                Outcome::Success(Rendered::Subscribed(subscription))
            }
            Err(err) => failed(
                format!("could not subscribe {jid} to node {node}"),
                err,
                FaultContext::node(node).with_jid(jid.to_string()),
            ),
        }
    }
}

/// `unsubscribe` the session's bare JID
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsubscribe;

#[async_trait]
impl Command for Unsubscribe {
    fn kind(&self) -> ActionKind {
        ActionKind::Unsubscribe
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let jid = ctx.bare_jid();
        let node = match require_node(ctx, &format!("could not unsubscribe {jid}")) {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().unsubscribe(ctx.service, node, &jid).await {
            Ok(()) => {
                info!(%jid, node, "unsubscribed {jid} from node {node}");
                Outcome::Success(Rendered::Unsubscribed {
                    jid: jid.to_string(),
                    node: node.into(),
                })
            }
            Err(err) => failed(
                format!("could not unsubscribe {jid} from node {node}"),
                err,
                FaultContext::node(node).with_jid(jid.to_string()),
            ),
        }
    }
}
