//! Capability interfaces composed into a [`Session`](crate::Session).
//!
//! Each protocol extension the handlers rely on is a trait here, implemented
//! by a plugin crate and registered when the session is assembled.
use async_trait::async_trait;
use xmpp_stream::{Element, Jid};

use crate::{
    error::SessionError,
    model::{Affiliation, DiscoItem, Form, Item, Subscription},
};

/// a disco#items response: the parsed items plus the raw `<query/>` so paging
/// metadata can be read from it
#[derive(Debug, Clone)]
pub struct DiscoItems {
    /// items in the order the server returned them
    pub items: Vec<DiscoItem>,
    /// the `<query/>` element of the response
    pub query: Element,
}

/// XEP-0030 item discovery
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// list the items of `jid`, optionally of one of its nodes. `rsm` is a
    /// `<set/>` element to attach to the query.
    async fn items(
        &self,
        jid: &Jid,
        node: Option<&str>,
        rsm: Option<Element>,
    ) -> Result<DiscoItems, SessionError>;
}

/// paging metadata returned with a result set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// id of the first item in this page
    pub first: Option<String>,
    /// id of the last item in this page, the `after` of the next request
    pub last: Option<String>,
    /// total size of the result set, if the server knows it
    pub count: Option<usize>,
}

/// XEP-0059 result set management
pub trait ResultSetPaging: Send + Sync + 'static {
    /// a `<set/>` requesting at most `max` items following `after`
    fn request(&self, max: usize, after: Option<&str>) -> Element;

    /// paging metadata attached to a response payload, if any
    fn page(&self, payload: &Element) -> Option<PageInfo>;
}

/// XEP-0060 publish-subscribe, user and owner use cases
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    /// create `node` on `service`
    async fn create_node(&self, service: &Jid, node: &str) -> Result<(), SessionError>;

    /// delete `node` and all of its items
    async fn delete_node(&self, service: &Jid, node: &str) -> Result<(), SessionError>;

    /// fetch the owner configuration form
    async fn node_config(&self, service: &Jid, node: &str) -> Result<Form, SessionError>;

    /// publish `payload` as a new item, returning the id the service assigned
    async fn publish(
        &self,
        service: &Jid,
        node: &str,
        payload: Element,
    ) -> Result<Option<String>, SessionError>;

    /// fetch the item `item_id`. The id is sent as given, so what an empty
    /// one returns is up to the service.
    async fn items(
        &self,
        service: &Jid,
        node: &str,
        item_id: &str,
    ) -> Result<Vec<Item>, SessionError>;

    /// delete the item `item_id`
    async fn retract(&self, service: &Jid, node: &str, item_id: &str)
    -> Result<(), SessionError>;

    /// delete every item of `node`
    async fn purge(&self, service: &Jid, node: &str) -> Result<(), SessionError>;

    /// subscribe `jid` to `node`
    async fn subscribe(
        &self,
        service: &Jid,
        node: &str,
        jid: &Jid,
    ) -> Result<Subscription, SessionError>;

    /// remove the subscription of `jid` to `node`
    async fn unsubscribe(&self, service: &Jid, node: &str, jid: &Jid)
    -> Result<(), SessionError>;

    /// the session's own affiliations, restricted to `node`
    async fn affiliations(
        &self,
        service: &Jid,
        node: &str,
    ) -> Result<Vec<Affiliation>, SessionError>;

    /// submit a batch of affiliation changes as one owner request and return
    /// the service's response
    async fn modify_affiliations(
        &self,
        service: &Jid,
        node: &str,
        affiliations: &[Affiliation],
    ) -> Result<Element, SessionError>;
}
