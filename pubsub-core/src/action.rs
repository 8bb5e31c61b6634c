//! The fixed set of actions a run can perform
use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{UnsupportedAction, ValidationError};

/// One of the twelve operations the client knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// list nodes on the service, or the children of a collection node
    Nodes,
    /// create a node
    Create,
    /// delete a node
    Delete,
    /// fetch a node's configuration form
    #[value(alias = "get_configure")]
    GetConfiguration,
    /// publish an item
    Publish,
    /// fetch an item, or all items
    #[value(alias = "get")]
    GetItem,
    /// delete an item
    Retract,
    /// delete every item of a node
    Purge,
    /// subscribe the session's own JID
    Subscribe,
    /// unsubscribe the session's own JID
    Unsubscribe,
    /// list the session's affiliations with a node
    #[value(alias = "get_affiliation")]
    GetAffiliations,
    /// make a list of JIDs owners of a node
    #[value(alias = "add_owner")]
    SetOwnerAffiliation,
}

impl ActionKind {
    /// every action, in registry order
    pub const ALL: [ActionKind; 12] = [
        Self::Nodes,
        Self::Create,
        Self::Delete,
        Self::GetConfiguration,
        Self::Publish,
        Self::GetItem,
        Self::Retract,
        Self::Purge,
        Self::Subscribe,
        Self::Unsubscribe,
        Self::GetAffiliations,
        Self::SetOwnerAffiliation,
    ];

    /// command line name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::GetConfiguration => "get-configuration",
            Self::Publish => "publish",
            Self::GetItem => "get-item",
            Self::Retract => "retract",
            Self::Purge => "purge",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::GetAffiliations => "get-affiliations",
            Self::SetOwnerAffiliation => "set-owner-affiliation",
        }
    }

    /// does this action target a node?
    pub fn requires_node(self) -> bool {
        !matches!(self, Self::Nodes)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnsupportedAction;

    /// accepts the command line names and their aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, false).map_err(|_| UnsupportedAction(s.to_owned()))
    }
}

/// An action with its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    /// which operation
    pub kind: ActionKind,
    /// target node, required by everything except `nodes`
    pub node: Option<String>,
    /// operation specific argument: payload, item id or owner list
    pub data: Option<String>,
}

impl Action {
    /// bundle an action with its arguments
    pub fn new(kind: ActionKind, node: Option<String>, data: Option<String>) -> Self {
        Self { kind, node, data }
    }

    /// check the node invariant
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.kind.requires_node() {
            self.node()?;
        }
        Ok(())
    }

    /// the target node; absent or empty is a [`ValidationError`]
    pub fn node(&self) -> Result<&str, ValidationError> {
        self.node
            .as_deref()
            .filter(|node| !node.is_empty())
            .ok_or(ValidationError::NodeRequired(self.kind))
    }

    /// the data argument, empty when none was given
    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("nodes".parse::<ActionKind>().unwrap(), ActionKind::Nodes);
        assert_eq!(
            "get-configuration".parse::<ActionKind>().unwrap(),
            ActionKind::GetConfiguration
        );
        assert_eq!(
            "get_configure".parse::<ActionKind>().unwrap(),
            ActionKind::GetConfiguration
        );
        assert_eq!("get".parse::<ActionKind>().unwrap(), ActionKind::GetItem);
        assert_eq!(
            "add_owner".parse::<ActionKind>().unwrap(),
            ActionKind::SetOwnerAffiliation
        );
        assert_eq!(
            "get_affiliation".parse::<ActionKind>().unwrap(),
            ActionKind::GetAffiliations
        );
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "frobnicate".parse::<ActionKind>(),
            Err(UnsupportedAction("frobnicate".into()))
        );
    }

    #[test]
    fn names_are_consistent() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.as_str());
        }
    }

    #[test]
    fn node_required_except_for_nodes() {
        assert!(Action::new(ActionKind::Nodes, None, None).validate().is_ok());
        assert_eq!(
            Action::new(ActionKind::Create, None, None).validate(),
            Err(ValidationError::NodeRequired(ActionKind::Create))
        );
        assert_eq!(
            Action::new(ActionKind::Purge, Some(String::new()), None).node(),
            Err(ValidationError::NodeRequired(ActionKind::Purge))
        );
        let action = Action::new(ActionKind::GetItem, Some("n1".into()), None);
        assert_eq!(action.node(), Ok("n1"));
        assert_eq!(action.data(), "");
    }
}
