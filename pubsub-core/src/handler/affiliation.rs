use async_trait::async_trait;
use tracing::info;

use super::{Command, Context, failed, require_node};
use crate::{
    action::ActionKind,
    model::Affiliation,
    outcome::{FaultContext, Outcome, Rendered},
};

/// `get-affiliations` of the session's own JID with a node
#[derive(Debug, Default, Clone, Copy)]
pub struct GetAffiliations;

#[async_trait]
impl Command for GetAffiliations {
    fn kind(&self) -> ActionKind {
        ActionKind::GetAffiliations
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let jid = ctx.bare_jid();
        let node = match require_node(ctx, &format!("could not get affiliations for {jid}")) {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        match ctx.session.pubsub().affiliations(ctx.service, node).await {
            Ok(affiliations) => {
                info!(
                    %jid,
                    node,
                    count = affiliations.len(),
                    "affiliations for {jid} on node {node}: [{}]",
                    join(&affiliations)
                );
                Outcome::Success(Rendered::Affiliations {
                    node: node.into(),
                    affiliations,
                })
            }
            Err(err) => failed(
                format!("could not get affiliations for {jid} on node {node}"),
                err,
                FaultContext::node(node).with_jid(jid.to_string()),
            ),
        }
    }
}

/// `set-owner-affiliation`: the data argument is a comma separated list of
/// JIDs, each made an owner of the node in one batch request
#[derive(Debug, Default, Clone, Copy)]
pub struct SetOwnerAffiliation;

impl SetOwnerAffiliation {
    /// one owner entry per non-empty comma separated JID, in order
    pub fn entries(data: &str) -> Vec<Affiliation> {
        data.split(',')
            .map(str::trim)
            .filter(|jid| !jid.is_empty())
            .map(Affiliation::owner)
            .collect()
    }
}

#[async_trait]
impl Command for SetOwnerAffiliation {
    fn kind(&self) -> ActionKind {
        ActionKind::SetOwnerAffiliation
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let jid = ctx.bare_jid();
        let node = match require_node(ctx, &format!("could not set affiliations for {jid}")) {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        let entries = Self::entries(ctx.action.data());
        match ctx
            .session
            .pubsub()
            .modify_affiliations(ctx.service, node, &entries)
            .await
        {
            Ok(response) => {
                info!(
                    %jid,
                    node,
                    count = entries.len(),
                    "affiliations for {jid} on node {node} updated: {response}"
                );
                Outcome::Success(Rendered::AffiliationsModified {
                    node: node.into(),
                    submitted: entries,
                    response: response.to_string(),
                })
            }
            Err(err) => failed(
                format!(
                    "could not set owners [{}] on node {node} as {jid}",
                    join(&entries)
                ),
                err,
                FaultContext::node(node).with_jid(jid.to_string()),
            ),
        }
    }
}

fn join(affiliations: &[Affiliation]) -> String {
    affiliations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn owners_in_order() {
        let entries = SetOwnerAffiliation::entries("a@x,b@x");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].jid.as_deref(), Some("a@x"));
        assert_eq!(entries[1].jid.as_deref(), Some("b@x"));
        assert!(entries.iter().all(|a| a.role == Role::Owner));
    }

    #[test]
    fn empty_data_is_an_empty_batch() {
        assert!(SetOwnerAffiliation::entries("").is_empty());
        assert!(SetOwnerAffiliation::entries(" , ,").is_empty());
    }

    #[test]
    fn whitespace_is_trimmed() {
        let entries = SetOwnerAffiliation::entries(" a@x , b@x/res ");
        let jids: Vec<_> = entries.iter().filter_map(|a| a.jid.as_deref()).collect();
        assert_eq!(jids, ["a@x", "b@x/res"]);
    }
}
