#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]
//! # pubsub
//!
//! XEP-0060 requests: the user use cases go out in the `pubsub` namespace,
//! node deletion, configuration, purge and affiliation management in
//! `pubsub#owner`.

use pubsub_core::prelude::*;

mod form;

pub use form::parse_form;

/// XEP-0060 client
#[derive(Debug)]
pub struct PubSubPlugin {
    transport: Arc<dyn Transport>,
}

impl PubSubPlugin {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn get(&self, service: &Jid, ns: &str, op: Element) -> Result<Element, SessionError> {
        let payload = Element::with_ns("pubsub", ns).with_child(op);
        self.transport.request(stanza::get(service, payload)).await
    }

    async fn set(&self, service: &Jid, ns: &str, op: Element) -> Result<Element, SessionError> {
        let payload = Element::with_ns("pubsub", ns).with_child(op);
        self.transport.request(stanza::set(service, payload)).await
    }
}

impl Register for PubSubPlugin {
    fn register(self, builder: &mut SessionBuilder) {
        builder.pubsub(self);
    }
}

fn node_op(name: &str, node: &str) -> Element {
    Element::new(name).with_attr("node", node)
}

/// `<pubsub/>` payload of a response, with its `name` child
fn result_child<'a>(resp: &'a Element, ns: &str, name: &str) -> Option<&'a Element> {
    resp.get_child("pubsub", ns)?.get_child(name, ns)
}

#[async_trait]
impl PubSub for PubSubPlugin {
    #[instrument(level = "debug", skip(self))]
    async fn create_node(&self, service: &Jid, node: &str) -> Result<(), SessionError> {
        self.set(service, ns::PUBSUB, node_op("create", node)).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_node(&self, service: &Jid, node: &str) -> Result<(), SessionError> {
        self.set(service, ns::PUBSUB_OWNER, node_op("delete", node))
            .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn node_config(&self, service: &Jid, node: &str) -> Result<Form, SessionError> {
        let resp = self
            .get(service, ns::PUBSUB_OWNER, node_op("configure", node))
            .await?;
        let form = result_child(&resp, ns::PUBSUB_OWNER, "configure")
            .and_then(|configure| configure.get_child("x", ns::DATA_FORMS))
            .ok_or_else(|| SessionError::Malformed("configure result without a form".into()))?;
        Ok(parse_form(form))
    }

    #[instrument(level = "debug", skip(self, payload))]
    async fn publish(
        &self,
        service: &Jid,
        node: &str,
        payload: Element,
    ) -> Result<Option<String>, SessionError> {
        let op = node_op("publish", node).with_child(Element::new("item").with_child(payload));
        let resp = self.set(service, ns::PUBSUB, op).await?;
        // the service may omit the id when the publisher didn't ask for one
        Ok(result_child(&resp, ns::PUBSUB, "publish")
            .and_then(|publish| publish.get_child("item", ns::PUBSUB))
            .and_then(|item| item.attr("id"))
            .map(str::to_owned))
    }

    #[instrument(level = "debug", skip(self))]
    async fn items(
        &self,
        service: &Jid,
        node: &str,
        item_id: &str,
    ) -> Result<Vec<Item>, SessionError> {
        let op = node_op("items", node).with_child(Element::new("item").with_attr("id", item_id));
        let resp = self.get(service, ns::PUBSUB, op).await?;
        let items = result_child(&resp, ns::PUBSUB, "items")
            .ok_or_else(|| SessionError::Malformed("items result without <items/>".into()))?;
        Ok(items
            .children_named("item", ns::PUBSUB)
            .map(|item| Item {
                id: item.attr("id").unwrap_or_default().to_owned(),
                payload: item.children().next().cloned(),
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn retract(&self, service: &Jid, node: &str, item_id: &str) -> Result<(), SessionError> {
        let op = node_op("retract", node).with_child(Element::new("item").with_attr("id", item_id));
        self.set(service, ns::PUBSUB, op).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn purge(&self, service: &Jid, node: &str) -> Result<(), SessionError> {
        self.set(service, ns::PUBSUB_OWNER, node_op("purge", node))
            .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn subscribe(
        &self,
        service: &Jid,
        node: &str,
        jid: &Jid,
    ) -> Result<Subscription, SessionError> {
        let op = node_op("subscribe", node).with_attr("jid", jid.to_string());
        let resp = self.set(service, ns::PUBSUB, op).await?;
        match result_child(&resp, ns::PUBSUB, "subscription") {
            Some(sub) => Ok(Subscription {
                jid: sub.attr("jid").map_or_else(|| jid.to_string(), str::to_owned),
                node: sub.attr("node").unwrap_or(node).to_owned(),
                subid: sub.attr("subid").map(str::to_owned),
                state: sub
                    .attr("subscription")
                    .map(str::parse::<SubscriptionState>)
                    .transpose()?
                    .unwrap_or(SubscriptionState::Subscribed),
            }),
            None => {
                debug!(node, %jid, "empty subscribe result, assuming subscribed");
                Ok(Subscription {
                    jid: jid.to_string(),
                    node: node.to_owned(),
                    subid: None,
                    state: SubscriptionState::Subscribed,
                })
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn unsubscribe(&self, service: &Jid, node: &str, jid: &Jid) -> Result<(), SessionError> {
        let op = node_op("unsubscribe", node).with_attr("jid", jid.to_string());
        self.set(service, ns::PUBSUB, op).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn affiliations(
        &self,
        service: &Jid,
        node: &str,
    ) -> Result<Vec<Affiliation>, SessionError> {
        let resp = self
            .get(service, ns::PUBSUB, node_op("affiliations", node))
            .await?;
        let Some(listing) = result_child(&resp, ns::PUBSUB, "affiliations") else {
            return Ok(Vec::new());
        };
        listing
            .children_named("affiliation", ns::PUBSUB)
            .map(|aff| {
                let role = aff
                    .attr("affiliation")
                    .ok_or_else(|| SessionError::Malformed("affiliation without a role".into()))?
                    .parse()?;
                Ok::<_, SessionError>(Affiliation {
                    jid: aff.attr("jid").map(str::to_owned),
                    node: aff.attr("node").map(str::to_owned),
                    role,
                })
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self, affiliations), fields(count = affiliations.len()))]
    async fn modify_affiliations(
        &self,
        service: &Jid,
        node: &str,
        affiliations: &[Affiliation],
    ) -> Result<Element, SessionError> {
        let op = node_op("affiliations", node).with_children(affiliations.iter().map(|aff| {
            let mut entry = Element::new("affiliation").with_attr("affiliation", aff.role.as_str());
            if let Some(jid) = &aff.jid {
                entry.set_attr("jid", jid.as_str());
            }
            entry
        }));
        self.set(service, ns::PUBSUB_OWNER, op).await
    }
}

#[cfg(test)]
mod tests {
    use pubsub_core::{
        testing::MockTransport,
        xmpp_stream::{DefinedCondition, ErrorType, StanzaError},
    };
    use tracing_test::traced_test;

    use super::*;

    fn service() -> Jid {
        "pubsub.example.org".parse().unwrap()
    }

    fn setup() -> (Arc<MockTransport>, PubSubPlugin) {
        let transport = Arc::new(MockTransport::default());
        let plugin = PubSubPlugin::new(transport.clone());
        (transport, plugin)
    }

    fn xml(s: &str) -> Element {
        s.parse().unwrap()
    }

    /// the operation element of the only request sent
    fn sent_op(transport: &MockTransport, ns: &str) -> (String, Element) {
        let requests = transport.action_requests();
        assert_eq!(requests.len(), 1);
        let iq = &requests[0];
        let op = iq
            .get_child("pubsub", ns)
            .and_then(|p| p.children().next())
            .cloned()
            .unwrap();
        (iq.attr("type").unwrap().to_owned(), op)
    }

    #[tokio::test]
    async fn create_uses_user_namespace() {
        let (transport, plugin) = setup();
        plugin.create_node(&service(), "news").await.unwrap();
        let (kind, op) = sent_op(&transport, ns::PUBSUB);
        assert_eq!(kind, "set");
        assert!(op.is("create", ns::PUBSUB));
        assert_eq!(op.attr("node"), Some("news"));
    }

    #[tokio::test]
    async fn owner_operations_use_owner_namespace() {
        for name in ["delete", "purge"] {
            let (transport, plugin) = setup();
            match name {
                "delete" => plugin.delete_node(&service(), "news").await.unwrap(),
                _ => plugin.purge(&service(), "news").await.unwrap(),
            }
            let (kind, op) = sent_op(&transport, ns::PUBSUB_OWNER);
            assert_eq!(kind, "set");
            assert!(op.is(name, ns::PUBSUB_OWNER));
        }
    }

    #[tokio::test]
    async fn publish_returns_assigned_id() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <publish node='news'><item id='ae890ac52d0df67ed7cfdf51b644e901'/></publish>\
             </pubsub>",
        ));
        let payload = xml("<test xmlns='test'>hello world</test>");
        let id = plugin
            .publish(&service(), "news", payload.clone())
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("ae890ac52d0df67ed7cfdf51b644e901"));

        let (_, op) = sent_op(&transport, ns::PUBSUB);
        let item = op.get_child("item", ns::PUBSUB).unwrap();
        assert_eq!(item.children().next(), Some(&payload));
    }

    #[tokio::test]
    async fn publish_without_id_in_response() {
        let (_, plugin) = setup();
        let id = plugin
            .publish(&service(), "news", xml("<test xmlns='test'/>"))
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn single_item_is_requested_by_id() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <items node='news'><item id='a1'><entry xmlns='urn:x'>hi</entry></item></items>\
             </pubsub>",
        ));
        let items = plugin.items(&service(), "news", "a1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a1");
        assert_eq!(items[0].payload.as_ref().unwrap().text(), "hi");

        let (kind, op) = sent_op(&transport, ns::PUBSUB);
        assert_eq!(kind, "get");
        assert_eq!(
            op.get_child("item", ns::PUBSUB).and_then(|i| i.attr("id")),
            Some("a1")
        );
    }

    #[tokio::test]
    async fn empty_item_id_is_passed_through() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <items node='news'><item id='a'/><item id='b'/></items>\
             </pubsub>",
        ));
        let items = plugin.items(&service(), "news", "").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        let (_, op) = sent_op(&transport, ns::PUBSUB);
        let requested: Vec<_> = op
            .children_named("item", ns::PUBSUB)
            .map(|i| i.attr("id"))
            .collect();
        assert_eq!(requested, [Some("")]);
    }

    #[tokio::test]
    async fn retract_names_the_item() {
        let (transport, plugin) = setup();
        plugin.retract(&service(), "news", "a1").await.unwrap();
        let (kind, op) = sent_op(&transport, ns::PUBSUB);
        assert_eq!(kind, "set");
        assert!(op.is("retract", ns::PUBSUB));
        assert_eq!(
            op.get_child("item", ns::PUBSUB).and_then(|i| i.attr("id")),
            Some("a1")
        );
    }

    #[tokio::test]
    async fn subscribe_reads_state() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <subscription node='news' jid='tester@example.org' subid='s1' subscription='pending'/>\
             </pubsub>",
        ));
        let jid: Jid = "tester@example.org".parse().unwrap();
        let sub = plugin.subscribe(&service(), "news", &jid).await.unwrap();
        assert_eq!(sub.state, SubscriptionState::Pending);
        assert_eq!(sub.subid.as_deref(), Some("s1"));

        let (_, op) = sent_op(&transport, ns::PUBSUB);
        assert!(op.is("subscribe", ns::PUBSUB));
        assert_eq!(op.attr("jid"), Some("tester@example.org"));
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_subscribe_result_is_subscribed() {
        let (_, plugin) = setup();
        let jid: Jid = "tester@example.org".parse().unwrap();
        let sub = plugin.subscribe(&service(), "news", &jid).await.unwrap();
        assert_eq!(sub.state, SubscriptionState::Subscribed);
        assert_eq!(sub.node, "news");
        assert!(logs_contain("empty subscribe result, assuming subscribed"));
    }

    #[tokio::test]
    async fn unsubscribe_names_the_jid() {
        let (transport, plugin) = setup();
        let jid: Jid = "tester@example.org".parse().unwrap();
        plugin.unsubscribe(&service(), "news", &jid).await.unwrap();
        let (_, op) = sent_op(&transport, ns::PUBSUB);
        assert!(op.is("unsubscribe", ns::PUBSUB));
        assert_eq!(op.attr("jid"), Some("tester@example.org"));
    }

    #[tokio::test]
    async fn own_affiliations() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <affiliations><affiliation node='news' affiliation='owner'/>\
               <affiliation node='news' affiliation='publisher'/></affiliations>\
             </pubsub>",
        ));
        let affs = plugin.affiliations(&service(), "news").await.unwrap();
        let roles: Vec<_> = affs.iter().map(|a| a.role).collect();
        assert_eq!(roles, [Role::Owner, Role::Publisher]);
    }

    #[tokio::test]
    async fn unknown_role_is_malformed() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
               <affiliations><affiliation node='news' affiliation='emperor'/></affiliations>\
             </pubsub>",
        ));
        let err = plugin.affiliations(&service(), "news").await.unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[tokio::test]
    async fn owner_batch_is_one_request() {
        let (transport, plugin) = setup();
        let batch = [Affiliation::owner("a@x"), Affiliation::owner("b@x")];
        plugin
            .modify_affiliations(&service(), "news", &batch)
            .await
            .unwrap();
        let (kind, op) = sent_op(&transport, ns::PUBSUB_OWNER);
        assert_eq!(kind, "set");
        let entries: Vec<_> = op
            .children_named("affiliation", ns::PUBSUB_OWNER)
            .map(|a| (a.attr("jid").unwrap(), a.attr("affiliation").unwrap()))
            .collect();
        assert_eq!(entries, [("a@x", "owner"), ("b@x", "owner")]);
    }

    #[tokio::test]
    async fn configuration_form() {
        let (transport, plugin) = setup();
        transport.push_result(xml(
            "<pubsub xmlns='http://jabber.org/protocol/pubsub#owner'>\
               <configure node='news'><x xmlns='jabber:x:data' type='form'>\
                 <field var='FORM_TYPE' type='hidden'>\
                   <value>http://jabber.org/protocol/pubsub#node_config</value></field>\
                 <field var='pubsub#max_items' type='text-single'><value>10</value></field>\
               </x></configure>\
             </pubsub>",
        ));
        let form = plugin.node_config(&service(), "news").await.unwrap();
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.to_string(), "pubsub#max_items=10");
        let (kind, _) = sent_op(&transport, ns::PUBSUB_OWNER);
        assert_eq!(kind, "get");
    }

    #[tokio::test]
    async fn fault_is_returned_as_is() {
        let (transport, plugin) = setup();
        transport.push_fault(StanzaError::new(
            ErrorType::Cancel,
            DefinedCondition::Conflict,
        ));
        let err = plugin.create_node(&service(), "news").await.unwrap_err();
        assert!(err.is_fault());
    }
}
