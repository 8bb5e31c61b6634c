//! Builders for the stanzas the client sends
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::{element::Element, jid::Jid, ns};

/// `type` of an `<iq/>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqType {
    /// request for information
    Get,
    /// request to change state
    Set,
    /// successful response
    Result,
    /// error response
    Error,
}

impl IqType {
    /// wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }
}

/// build an `<iq/>` carrying `payload`, addressed to `to` if given. The id is
/// filled in when the request is sent.
pub fn iq(kind: IqType, to: Option<&Jid>, payload: Element) -> Element {
    let mut iq = Element::new("iq").with_attr("type", kind.as_str());
    if let Some(to) = to {
        iq.set_attr("to", to.to_string());
    }
    iq.with_child(payload)
}

/// `<iq type='get'/>` to `to`
pub fn get(to: &Jid, payload: Element) -> Element {
    iq(IqType::Get, Some(to), payload)
}

/// `<iq type='set'/>` to `to`
pub fn set(to: &Jid, payload: Element) -> Element {
    iq(IqType::Set, Some(to), payload)
}

/// initial available presence
pub fn presence() -> Element {
    Element::new("presence")
}

/// roster request for the connected account
pub fn roster_get() -> Element {
    iq(IqType::Get, None, Element::with_ns("query", ns::ROSTER))
}

/// the `type` attribute of a received iq
pub fn iq_type(stanza: &Element) -> Option<IqType> {
    Some(match stanza.attr("type")? {
        "get" => IqType::Get,
        "set" => IqType::Set,
        "result" => IqType::Result,
        "error" => IqType::Error,
        _ => return None,
    })
}

/// Generates ids unique for the lifetime of a stream
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(format!("{:08x}", rand::thread_rng().r#gen::<u32>()))
    }
}

impl IdGenerator {
    /// ids of the form `{prefix}-{n}`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// next unused id
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_iq() {
        let to: Jid = "pubsub.example.org".parse().unwrap();
        let iq = get(&to, Element::with_ns("query", ns::DISCO_ITEMS));
        assert_eq!(
            iq.to_string(),
            r#"<iq type="get" to="pubsub.example.org"><query xmlns="http://jabber.org/protocol/disco#items"/></iq>"#
        );
        assert_eq!(iq_type(&iq), Some(IqType::Get));
    }

    #[test]
    fn ids_are_unique() {
        let ids = IdGenerator::new("t");
        assert_eq!(ids.next_id(), "t-1");
        assert_eq!(ids.next_id(), "t-2");
        assert_ne!(IdGenerator::default().next_id(), ids.next_id());
    }
}
