//! XML namespaces used on the client stream

/// default namespace of a client-to-server stream
pub const CLIENT: &str = "jabber:client";
/// stream framing, bound to the `stream:` prefix
pub const STREAM: &str = "http://etherx.jabber.org/streams";
/// STARTTLS negotiation
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";
/// SASL negotiation
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
/// resource binding
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
/// legacy session establishment (RFC 3921)
pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";
/// stanza error conditions
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
/// stream error conditions
pub const STREAMS: &str = "urn:ietf:params:xml:ns:xmpp-streams";
/// roster management
pub const ROSTER: &str = "jabber:iq:roster";
/// XEP-0030 item discovery
pub const DISCO_ITEMS: &str = "http://jabber.org/protocol/disco#items";
/// XEP-0059 result set management
pub const RSM: &str = "http://jabber.org/protocol/rsm";
/// XEP-0060 publish-subscribe
pub const PUBSUB: &str = "http://jabber.org/protocol/pubsub";
/// XEP-0060 owner use cases
pub const PUBSUB_OWNER: &str = "http://jabber.org/protocol/pubsub#owner";
/// XEP-0060 application error conditions
pub const PUBSUB_ERRORS: &str = "http://jabber.org/protocol/pubsub#errors";
/// XEP-0004 data forms
pub const DATA_FORMS: &str = "jabber:x:data";
