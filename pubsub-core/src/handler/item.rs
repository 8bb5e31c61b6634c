use async_trait::async_trait;
use tracing::{debug, info};
use xmpp_stream::Element;

use super::{Command, Context, failed, rejected, require_node};
use crate::{
    action::ActionKind,
    error::ValidationError,
    outcome::{FaultContext, Outcome, Rendered},
};

/// published when `publish` is given no data
pub const PLACEHOLDER_PAYLOAD: &str = "<test xmlns='test'>hello world</test>";

/// `publish`
#[derive(Debug, Default, Clone, Copy)]
pub struct Publish;

impl Publish {
    /// the element to publish: `data` parsed as XML, or the placeholder
    pub fn payload(data: &str) -> Result<Element, ValidationError> {
        let source = if data.is_empty() {
            PLACEHOLDER_PAYLOAD
        } else {
            data
        };
        source
            .parse::<Element>()
            .map_err(|err| ValidationError::InvalidPayload(err.to_string()))
    }
}

#[async_trait]
impl Command for Publish {
    fn kind(&self) -> ActionKind {
        ActionKind::Publish
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = match require_node(ctx, "could not publish") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        let payload = match Self::payload(ctx.action.data()) {
            Ok(payload) => payload,
            Err(err) => {
                return rejected(
                    format!("could not publish to {node}"),
                    err,
                    FaultContext::node(node),
                );
            }
        };
        debug!(node, %payload, "publishing");
        match ctx.session.pubsub().publish(ctx.service, node, payload).await {
            Ok(item_id) => {
                info!(
                    node,
                    item = item_id.as_deref(),
                    "published at item id: {}",
                    item_id.as_deref().unwrap_or("<none>")
                );
                Outcome::Success(Rendered::Published {
                    node: node.into(),
                    item_id,
                })
            }
            Err(err) => failed(
                format!("could not publish to {node}"),
                err,
                FaultContext::node(node),
            ),
        }
    }
}

/// `get-item`. The data argument is passed through as the item id; an empty
/// one is still sent, and most services answer it with every item.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetItem;

#[async_trait]
impl Command for GetItem {
    fn kind(&self) -> ActionKind {
        ActionKind::GetItem
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let item_id = ctx.action.data();
        let node = match require_node(ctx, "could not retrieve item") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().items(ctx.service, node, item_id).await {
            Ok(items) => {
                for item in &items {
                    info!(
                        node,
                        item = %item.id,
                        "retrieved item {}: {}",
                        item.id,
                        item.payload_text()
                    );
                }
                Outcome::Success(Rendered::Items {
                    node: node.into(),
                    items,
                })
            }
            Err(err) => failed(
                format!("could not retrieve item {item_id} from node {node}"),
                err,
                FaultContext::node(node).with_item(item_id),
            ),
        }
    }
}

/// `retract`
#[derive(Debug, Default, Clone, Copy)]
pub struct Retract;

#[async_trait]
impl Command for Retract {
    fn kind(&self) -> ActionKind {
        ActionKind::Retract
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let item_id = ctx.action.data();
        let node = match require_node(ctx, "could not retract item") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().retract(ctx.service, node, item_id).await {
            Ok(()) => {
                info!(node, item = item_id, "retracted item {item_id} from node {node}");
                Outcome::Success(Rendered::Retracted {
                    node: node.into(),
                    item_id: item_id.into(),
                })
            }
            Err(err) => failed(
                format!("could not retract item {item_id} from node {node}"),
                err,
                FaultContext::node(node).with_item(item_id),
            ),
        }
    }
}
