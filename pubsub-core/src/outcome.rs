//! What a handler produces: a rendered result or a classified failure
use std::fmt;

use serde::Serialize;
use tracing::error;
use xmpp_stream::{AppCondition, DefinedCondition, ErrorType};

use crate::model::{Affiliation, DiscoItem, Form, Item, Subscription};

/// Result of running one action. Handlers never return errors, every
/// failure ends up here.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// the action completed
    Success(Rendered),
    /// the action failed; the failure has already been logged
    Failure(Failure),
}

impl Outcome {
    /// did the action complete?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// the failure, if any
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            Self::Success(_) => None,
        }
    }
}

/// A successful result, per action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rendered {
    /// discovered items in the order received
    Nodes {
        /// collection node that was listed, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<String>,
        /// the items
        items: Vec<DiscoItem>,
    },
    /// a node was created, deleted or purged
    Node {
        /// the node
        node: String,
    },
    /// a node's configuration form
    Configuration {
        /// the node
        node: String,
        /// the form
        form: Form,
    },
    /// an item was published
    Published {
        /// the node
        node: String,
        /// id assigned by the service
        item_id: Option<String>,
    },
    /// items retrieved from a node
    Items {
        /// the node
        node: String,
        /// `(id, payload)` pairs
        items: Vec<Item>,
    },
    /// an item was retracted
    Retracted {
        /// the node
        node: String,
        /// the item
        item_id: String,
    },
    /// a subscription was created
    Subscribed(Subscription),
    /// a subscription was removed
    Unsubscribed {
        /// the subscriber
        jid: String,
        /// the node
        node: String,
    },
    /// affiliations with a node
    Affiliations {
        /// the node
        node: String,
        /// the affiliations
        affiliations: Vec<Affiliation>,
    },
    /// a batch of affiliation changes was accepted
    AffiliationsModified {
        /// the node
        node: String,
        /// entries submitted
        submitted: Vec<Affiliation>,
        /// the service's response, serialized
        response: String,
    },
}

/// What a failure was about, so the logged line stands on its own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaultContext {
    /// node the request targeted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// item the request targeted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// entity the request acted for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
}

impl FaultContext {
    /// context naming a node
    pub fn node(node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            ..Self::default()
        }
    }

    /// add the item
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// add the entity
    pub fn with_jid(mut self, jid: impl Into<String>) -> Self {
        self.jid = Some(jid.into());
        self
    }
}

/// Classification of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// the server returned an error stanza
    Fault {
        /// defined condition
        condition: DefinedCondition,
        /// error type, if the server sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        error_type: Option<ErrorType>,
        /// descriptive text, if the server sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// application condition, e.g. from pubsub#errors
        #[serde(skip_serializing_if = "Option::is_none")]
        app_condition: Option<AppCondition>,
    },
    /// the request could not be built from the arguments
    Invalid {
        /// why
        reason: String,
    },
    /// the exchange failed locally or on the stream
    Transport {
        /// why
        reason: String,
    },
    /// the handler itself broke; not an expected protocol failure
    Aborted {
        /// panic message
        reason: String,
    },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault {
                condition,
                text,
                app_condition,
                ..
            } => {
                write!(f, "{condition}")?;
                if let Some(text) = text {
                    write!(f, ": {text}")?;
                }
                if let Some(app) = app_condition {
                    write!(f, " ({app})")?;
                }
                Ok(())
            }
            Self::Invalid { reason } | Self::Transport { reason } | Self::Aborted { reason } => {
                f.write_str(reason)
            }
        }
    }
}

/// A classified failure with the context of the request that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// what was being attempted, e.g. `could not create node news`
    pub summary: String,
    /// classification
    #[serde(flatten)]
    pub kind: FailureKind,
    /// subject of the request
    pub context: FaultContext,
}

impl Failure {
    /// emit the single error line for this failure
    pub fn log(&self) {
        let ctx = &self.context;
        match &self.kind {
            FailureKind::Fault { condition, .. } => error!(
                node = ctx.node.as_deref(),
                item = ctx.item.as_deref(),
                jid = ctx.jid.as_deref(),
                condition = condition.as_str(),
                "{self}"
            ),
            _ => error!(
                node = ctx.node.as_deref(),
                item = ctx.item.as_deref(),
                jid = ctx.jid.as_deref(),
                "{self}"
            ),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn conflict() -> Failure {
        Failure {
            summary: "could not create node mynode".into(),
            kind: FailureKind::Fault {
                condition: DefinedCondition::Conflict,
                error_type: Some(ErrorType::Cancel),
                text: Some("node exists".into()),
                app_condition: None,
            },
            context: FaultContext::node("mynode"),
        }
    }

    #[test]
    fn failure_line_is_self_describing() {
        assert_eq!(
            conflict().to_string(),
            "could not create node mynode: conflict: node exists"
        );
    }

    #[test]
    #[traced_test]
    fn failure_logs_once_with_node() {
        conflict().log();
        logs_assert(|lines: &[&str]| {
            let failures: Vec<_> = lines.iter().filter(|l| l.contains("ERROR")).collect();
            match failures.as_slice() {
                [line] if line.contains("mynode") && line.contains("node exists") => Ok(()),
                other => Err(format!("expected one failure line, got {other:?}")),
            }
        });
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::Failure(conflict())).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["detail"]["type"], "fault");
        assert_eq!(json["detail"]["condition"], "conflict");
        assert_eq!(json["detail"]["context"]["node"], "mynode");

        let json = serde_json::to_value(Outcome::Success(Rendered::Node {
            node: "mynode".into(),
        }))
        .unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["detail"]["kind"], "node");
    }
}
