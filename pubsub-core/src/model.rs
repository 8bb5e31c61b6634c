//! Values exchanged with the pub/sub service. None of them outlive a run.
use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use xmpp_stream::Element;

use crate::error::SessionError;

/// one entry of a disco#items result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoItem {
    /// entity address
    pub jid: String,
    /// node at that address, for pub/sub services the node id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// human readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for DiscoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.jid)?;
        if let Some(node) = &self.node {
            write!(f, " node={node}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " name={name:?}")?;
        }
        Ok(())
    }
}

/// A published item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// item id, unique within its node
    pub id: String,
    /// the item's payload element, if the service returned one
    #[serde(serialize_with = "payload_text")]
    pub payload: Option<Element>,
}

impl Item {
    /// payload serialized to XML text, empty when there is none
    pub fn payload_text(&self) -> String {
        self.payload
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

fn payload_text<S: Serializer>(payload: &Option<Element>, s: S) -> Result<S::Ok, S::Error> {
    match payload {
        Some(payload) => s.collect_str(payload),
        None => s.serialize_str(""),
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
        }

        impl $name {
            /// wire name
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)*
                }
            }
        }

        impl FromStr for $name {
            type Err = SessionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)*
                    other => Err(SessionError::Malformed(format!(
                        concat!("unknown ", stringify!($name), " {:?}"),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// state of a subscription (XEP-0060 section 4.2)
    SubscriptionState {
        /// notifications will be delivered
        Subscribed => "subscribed",
        /// awaiting approval by a node owner
        Pending => "pending",
        /// the node requires subscription options to be configured
        Unconfigured => "unconfigured",
        /// no subscription
        None => "none",
    }
}

wire_enum! {
    /// an affiliation role (XEP-0060 section 4.1)
    Role {
        /// full control of the node
        Owner => "owner",
        /// may publish and purge
        Publisher => "publisher",
        /// may publish only
        PublishOnly => "publish-only",
        /// may subscribe and retrieve items
        Member => "member",
        /// no affiliation
        None => "none",
        /// banned from the node
        Outcast => "outcast",
    }
}

/// A subscription of an entity to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    /// subscriber
    pub jid: String,
    /// node subscribed to
    pub node: String,
    /// subscription id, when the service issues one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subid: Option<String>,
    /// current state
    pub state: SubscriptionState,
}

/// A role an entity holds on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affiliation {
    /// the affiliated entity; absent in the user's own affiliation listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
    /// node the role applies to; implied by the request in owner use cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// the role
    pub role: Role,
}

impl Affiliation {
    /// an owner entry for `jid`
    pub fn owner(jid: impl Into<String>) -> Self {
        Self {
            jid: Some(jid.into()),
            node: None,
            role: Role::Owner,
        }
    }
}

impl fmt::Display for Affiliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.jid, &self.node) {
            (Some(jid), Some(node)) => write!(f, "{jid} on {node}: {}", self.role),
            (Some(jid), None) => write!(f, "{jid}: {}", self.role),
            (None, Some(node)) => write!(f, "{node}: {}", self.role),
            (None, None) => write!(f, "{}", self.role),
        }
    }
}

/// A XEP-0004 data form, as used for node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Form {
    /// the form's `type` attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// value of the hidden `FORM_TYPE` field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_type: Option<String>,
    /// form title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// every field except `FORM_TYPE`
    pub fields: Vec<Field>,
}

/// one field of a [`Form`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Field {
    /// variable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    /// field type, e.g. `boolean`, `list-single`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// human readable label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// current values
    pub values: Vec<String>,
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(
                f,
                "{}={}",
                field.var.as_deref().unwrap_or("?"),
                field.values.join("|")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_wire_names() {
        assert_eq!("publish-only".parse::<Role>().unwrap(), Role::PublishOnly);
        assert_eq!(Role::Outcast.to_string(), "outcast");
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(SessionError::Malformed(msg)) if msg.contains("admin")
        ));
    }

    #[test]
    fn item_serializes_payload_as_text() {
        let item = Item {
            id: "item42".into(),
            payload: Some(Element::with_ns("test", "test").with_text("hello world")),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "item42");
        assert_eq!(json["payload"], r#"<test xmlns="test">hello world</test>"#);

        let empty = Item {
            id: "x".into(),
            payload: None,
        };
        assert_eq!(empty.payload_text(), "");
    }

    #[test]
    fn form_lists_fields() {
        let form = Form {
            fields: vec![
                Field {
                    var: Some("pubsub#title".into()),
                    values: vec!["news".into()],
                    ..Field::default()
                },
                Field {
                    var: Some("pubsub#max_items".into()),
                    values: vec!["10".into()],
                    ..Field::default()
                },
            ],
            ..Form::default()
        };
        assert_eq!(form.to_string(), "pubsub#title=news, pubsub#max_items=10");
    }
}
