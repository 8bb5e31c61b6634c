use async_trait::async_trait;
use tracing::info;

use super::{Command, Context, failed, require_node};
use crate::{
    action::ActionKind,
    outcome::{FaultContext, Outcome, Rendered},
};

/// `create`
#[derive(Debug, Default, Clone, Copy)]
pub struct Create;

#[async_trait]
impl Command for Create {
    fn kind(&self) -> ActionKind {
        ActionKind::Create
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = match require_node(ctx, "could not create node") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().create_node(ctx.service, node).await {
            Ok(()) => {
                info!(node, "created node {node}");
                Outcome::Success(Rendered::Node { node: node.into() })
            }
            Err(err) => failed(
                format!("could not create node {node}"),
                err,
                FaultContext::node(node),
            ),
        }
    }
}

/// `delete`
#[derive(Debug, Default, Clone, Copy)]
pub struct Delete;

#[async_trait]
impl Command for Delete {
    fn kind(&self) -> ActionKind {
        ActionKind::Delete
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = match require_node(ctx, "could not delete node") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().delete_node(ctx.service, node).await {
            Ok(()) => {
                info!(node, "deleted node {node}");
                Outcome::Success(Rendered::Node { node: node.into() })
            }
            Err(err) => failed(
                format!("could not delete node {node}"),
                err,
                FaultContext::node(node),
            ),
        }
    }
}

/// `get-configuration`
#[derive(Debug, Default, Clone, Copy)]
pub struct GetConfiguration;

#[async_trait]
impl Command for GetConfiguration {
    fn kind(&self) -> ActionKind {
        ActionKind::GetConfiguration
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = match require_node(ctx, "could not retrieve configure form") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().node_config(ctx.service, node).await {
            Ok(form) => {
                info!(
                    node,
                    fields = form.fields.len(),
                    "configure form received from node {node}: {form}"
                );
                Outcome::Success(Rendered::Configuration {
                    node: node.into(),
                    form,
                })
            }
            Err(err) => failed(
                format!("could not retrieve configure form from node {node}"),
                err,
                FaultContext::node(node),
            ),
        }
    }
}

/// `purge`. Purging a node that is already empty succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct Purge;

#[async_trait]
impl Command for Purge {
    fn kind(&self) -> ActionKind {
        ActionKind::Purge
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = match require_node(ctx, "could not purge items") {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().purge(ctx.service, node).await {
            Ok(()) => {
                info!(node, "purged all items from node {node}");
                Outcome::Success(Rendered::Node { node: node.into() })
            }
            Err(err) => failed(
                format!("could not purge items from node {node}"),
                err,
                FaultContext::node(node),
            ),
        }
    }
}
