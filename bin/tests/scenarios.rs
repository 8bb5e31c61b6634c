//! whole runs through the lifecycle with the real capability plugins over a
//! scripted transport

use std::sync::Arc;

use disco::Disco;
use pubsub::PubSubPlugin;
use pubsub_core::{
    Register,
    action::{Action, ActionKind},
    handler::PLACEHOLDER_PAYLOAD,
    lifecycle::{Controller, Invocation, RunReport, SessionState},
    outcome::{FailureKind, Outcome, Rendered},
    testing::{MockConnector, MockTransport},
    transport::Transport,
    xmpp_stream::{DefinedCondition, Element, ErrorType, StanzaError, ns},
};
use rsm::Rsm;
use tracing_test::traced_test;

fn connector(transport: &Arc<MockTransport>) -> MockConnector {
    MockConnector::new(Arc::clone(transport), |builder| {
        let transport: Arc<dyn Transport> = Arc::clone(builder.transport());
        Disco::new(Arc::clone(&transport)).register(builder);
        Rsm.register(builder);
        PubSubPlugin::new(transport).register(builder);
    })
}

fn invocation(kind: ActionKind, node: Option<&str>, data: Option<&str>) -> Invocation {
    Invocation {
        service: "pubsub.example.org".parse().unwrap(),
        action: Action::new(kind, node.map(Into::into), data.map(Into::into)),
        page_size: None,
    }
}

async fn run(transport: &Arc<MockTransport>, invocation: Invocation) -> RunReport {
    Controller::default()
        .run(&connector(transport), &invocation)
        .await
        .unwrap()
}

fn xml(s: &str) -> Element {
    s.parse().unwrap()
}

/// the first child of the `<pubsub/>` in the only action request
fn pubsub_op(transport: &MockTransport, ns: &str) -> Element {
    let requests = transport.action_requests();
    assert_eq!(requests.len(), 1, "{requests:?}");
    requests[0]
        .get_child("pubsub", ns)
        .and_then(|p| p.children().next())
        .cloned()
        .unwrap()
}

#[tokio::test]
#[traced_test]
async fn every_fault_is_one_failure_line_and_one_disconnect() {
    for (run_no, kind) in ActionKind::ALL.into_iter().enumerate() {
        let transport = Arc::new(MockTransport::default());
        // fail whatever the action sends
        transport.push_fault(
            StanzaError::new(ErrorType::Cancel, DefinedCondition::ItemNotFound)
                .with_text("no such thing"),
        );
        let data = match kind {
            ActionKind::Publish => None,
            ActionKind::SetOwnerAffiliation => Some("a@x"),
            _ => Some("x"),
        };
        let report = run(&transport, invocation(kind, Some("n1"), data)).await;
        assert_eq!(report.action, kind);
        assert_eq!(report.state, SessionState::Closed);
        assert!(
            matches!(
                report.outcome.failure().map(|f| &f.kind),
                Some(FailureKind::Fault { .. })
            ),
            "{kind}: {:?}",
            report.outcome
        );
        assert_eq!(transport.action_requests().len(), 1, "{kind}");
        assert_eq!(transport.close_count(), 1, "{kind}");

        // logs accumulate across the loop: this run adds exactly one line
        let names_item = matches!(kind, ActionKind::GetItem | ActionKind::Retract);
        logs_assert(|lines: &[&str]| {
            let failures: Vec<_> = lines.iter().filter(|l| l.contains("ERROR")).collect();
            if failures.len() != run_no + 1 {
                return Err(format!(
                    "{kind}: expected {} failure lines, got {failures:?}",
                    run_no + 1
                ));
            }
            let line = failures[run_no];
            if !line.contains("n1") || !line.contains("no such thing") {
                return Err(format!("{kind}: failure line lacks node or text: {line}"));
            }
            if names_item && !line.contains("item x") {
                return Err(format!("{kind}: failure line lacks item id: {line}"));
            }
            Ok(())
        });
    }
}

#[tokio::test]
#[traced_test]
async fn nodes_are_logged_in_order() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(xml(
        "<query xmlns='http://jabber.org/protocol/disco#items'>\
           <item jid='pubsub.example.org' node='alpha'/>\
           <item jid='pubsub.example.org' node='beta'/>\
           <item jid='pubsub.example.org' node='gamma'/>\
         </query>",
    ));
    let report = run(&transport, invocation(ActionKind::Nodes, None, None)).await;

    let requests = transport.action_requests();
    assert_eq!(requests.len(), 1);
    let query = requests[0].get_child("query", ns::DISCO_ITEMS).unwrap();
    assert_eq!(query.attr("node"), None);
    assert_eq!(requests[0].attr("to"), Some("pubsub.example.org"));

    let Outcome::Success(Rendered::Nodes { items, .. }) = report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    let nodes: Vec<_> = items.iter().filter_map(|i| i.node.as_deref()).collect();
    assert_eq!(nodes, ["alpha", "beta", "gamma"]);

    logs_assert(|lines: &[&str]| {
        let order: Vec<_> = lines
            .iter()
            .filter(|line| line.contains("  - pubsub.example.org"))
            .map(|line| {
                ["alpha", "beta", "gamma"]
                    .into_iter()
                    .find(|node| line.contains(&format!("node={node}")))
                    .unwrap_or("?")
            })
            .collect();
        if order == ["alpha", "beta", "gamma"] {
            Ok(())
        } else {
            Err(format!("nodes logged as {order:?}"))
        }
    });
}

/// a disco#items page holding `nodes`, with an RSM `<last/>` if given
fn page(nodes: &[&str], last: Option<&str>) -> Element {
    let items: String = nodes
        .iter()
        .map(|node| format!("<item jid='pubsub.example.org' node='{node}'/>"))
        .collect();
    let set = last
        .map(|last| {
            format!(
                "<set xmlns='http://jabber.org/protocol/rsm'><last>{last}</last></set>"
            )
        })
        .unwrap_or_default();
    xml(&format!(
        "<query xmlns='http://jabber.org/protocol/disco#items'>{items}{set}</query>"
    ))
}

async fn run_paged(transport: &Arc<MockTransport>) -> Vec<String> {
    let mut paged = invocation(ActionKind::Nodes, None, None);
    paged.page_size = Some(2);
    let report = run(transport, paged).await;
    assert_eq!(transport.close_count(), 1);
    let Outcome::Success(Rendered::Nodes { items, .. }) = report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    items.into_iter().filter_map(|i| i.node).collect()
}

/// `(max, after)` of every disco#items request, in order
fn paging_requests(transport: &MockTransport) -> Vec<(String, Option<String>)> {
    transport
        .action_requests()
        .iter()
        .map(|iq| {
            let set = iq
                .get_child("query", ns::DISCO_ITEMS)
                .and_then(|q| q.get_child("set", ns::RSM))
                .unwrap();
            (
                set.get_child("max", ns::RSM).unwrap().text(),
                set.get_child("after", ns::RSM).map(|a| a.text()),
            )
        })
        .collect()
}

#[tokio::test]
#[traced_test]
async fn paged_nodes_continue_after_last_until_empty_page() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(page(&["a", "b"], Some("b")));
    transport.push_result(page(&["c", "d"], Some("d")));
    transport.push_result(page(&[], None));

    let nodes = run_paged(&transport).await;

    assert_eq!(nodes, ["a", "b", "c", "d"]);
    assert_eq!(
        paging_requests(&transport),
        [
            ("2".to_owned(), None),
            ("2".to_owned(), Some("b".to_owned())),
            ("2".to_owned(), Some("d".to_owned())),
        ]
    );
}

#[tokio::test]
#[traced_test]
async fn paged_nodes_stop_without_last() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(page(&["a", "b"], Some("b")));
    transport.push_result(page(&["c"], None));
    // never requested
    transport.push_result(page(&["z"], Some("z")));

    let nodes = run_paged(&transport).await;

    assert_eq!(nodes, ["a", "b", "c"]);
    assert_eq!(transport.action_requests().len(), 2);
}

#[tokio::test]
#[traced_test]
async fn paged_nodes_stop_on_repeated_last() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(page(&["a", "b"], Some("b")));
    transport.push_result(page(&["c"], Some("b")));
    // never requested
    transport.push_result(page(&["z"], Some("z")));

    let nodes = run_paged(&transport).await;

    assert_eq!(nodes, ["a", "b", "c"]);
    assert_eq!(
        paging_requests(&transport),
        [("2".to_owned(), None), ("2".to_owned(), Some("b".to_owned()))]
    );
}

#[tokio::test]
#[traced_test]
async fn paged_nodes_stop_on_empty_first_page() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(page(&[], Some("b")));

    let nodes = run_paged(&transport).await;

    assert!(nodes.is_empty());
    assert_eq!(transport.action_requests().len(), 1);
}

#[tokio::test]
#[traced_test]
async fn create_conflict_is_one_failure_line() {
    let transport = Arc::new(MockTransport::default());
    transport.push_fault(
        StanzaError::new(ErrorType::Cancel, DefinedCondition::Conflict)
            .with_text("node already exists"),
    );
    let report = run(&transport, invocation(ActionKind::Create, Some("mynode"), None)).await;

    let failure = report.outcome.failure().unwrap();
    assert_eq!(failure.context.node.as_deref(), Some("mynode"));
    assert!(matches!(
        failure.kind,
        FailureKind::Fault {
            condition: DefinedCondition::Conflict,
            ..
        }
    ));
    assert_eq!(transport.close_count(), 1);

    logs_assert(|lines: &[&str]| {
        let failures = lines
            .iter()
            .filter(|line| line.contains("ERROR"))
            .collect::<Vec<_>>();
        match failures.as_slice() {
            [line] if line.contains("mynode") && line.contains("node already exists") => Ok(()),
            other => Err(format!("expected one failure line, got {other:?}")),
        }
    });
}

#[tokio::test]
#[traced_test]
async fn get_item_by_id() {
    let transport = Arc::new(MockTransport::default());
    transport.push_result(xml(
        "<pubsub xmlns='http://jabber.org/protocol/pubsub'>\
           <items node='n1'><item id='item42'><test xmlns='test'>hello</test></item></items>\
         </pubsub>",
    ));
    let report = run(
        &transport,
        invocation(ActionKind::GetItem, Some("n1"), Some("item42")),
    )
    .await;

    let op = pubsub_op(&transport, ns::PUBSUB);
    assert_eq!(op.attr("node"), Some("n1"));
    assert_eq!(
        op.get_child("item", ns::PUBSUB).and_then(|i| i.attr("id")),
        Some("item42")
    );

    let Outcome::Success(Rendered::Items { items, .. }) = report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "item42");
    assert!(logs_contain("retrieved item item42"));
}

#[tokio::test]
#[traced_test]
async fn publish_without_data_sends_placeholder() {
    let transport = Arc::new(MockTransport::default());
    run(&transport, invocation(ActionKind::Publish, Some("n1"), None)).await;

    let op = pubsub_op(&transport, ns::PUBSUB);
    let payload = op
        .get_child("item", ns::PUBSUB)
        .and_then(|item| item.children().next())
        .unwrap();
    assert_eq!(payload, &xml(PLACEHOLDER_PAYLOAD));
}

#[tokio::test]
#[traced_test]
async fn publish_sends_data_verbatim() {
    let transport = Arc::new(MockTransport::default());
    let data = "<entry xmlns='urn:example'><title>t</title></entry>";
    run(&transport, invocation(ActionKind::Publish, Some("n1"), Some(data))).await;

    let op = pubsub_op(&transport, ns::PUBSUB);
    let payload = op
        .get_child("item", ns::PUBSUB)
        .and_then(|item| item.children().next())
        .unwrap();
    assert_eq!(payload, &xml(data));
}

#[tokio::test]
#[traced_test]
async fn owners_are_one_batch() {
    let transport = Arc::new(MockTransport::default());
    run(
        &transport,
        invocation(ActionKind::SetOwnerAffiliation, Some("n1"), Some("a@x,b@x")),
    )
    .await;

    let op = pubsub_op(&transport, ns::PUBSUB_OWNER);
    let entries: Vec<_> = op
        .children_named("affiliation", ns::PUBSUB_OWNER)
        .map(|a| (a.attr("jid").unwrap(), a.attr("affiliation").unwrap()))
        .collect();
    assert_eq!(entries, [("a@x", "owner"), ("b@x", "owner")]);
}

#[tokio::test]
#[traced_test]
async fn empty_owner_list_is_an_empty_batch() {
    let transport = Arc::new(MockTransport::default());
    let report = run(
        &transport,
        invocation(ActionKind::SetOwnerAffiliation, Some("n1"), None),
    )
    .await;
    assert!(report.outcome.is_success());

    let op = pubsub_op(&transport, ns::PUBSUB_OWNER);
    assert!(op.is("affiliations", ns::PUBSUB_OWNER));
    assert_eq!(op.children().count(), 0);
}

#[tokio::test]
#[traced_test]
async fn missing_node_never_reaches_the_wire() {
    let transport = Arc::new(MockTransport::default());
    let report = run(&transport, invocation(ActionKind::Purge, None, None)).await;

    assert!(matches!(
        report.outcome.failure().map(|f| &f.kind),
        Some(FailureKind::Invalid { .. })
    ));
    assert!(transport.action_requests().is_empty());
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
#[traced_test]
async fn subscribe_uses_bare_jid() {
    let transport = Arc::new(MockTransport::default());
    let report = run(&transport, invocation(ActionKind::Subscribe, Some("n1"), None)).await;
    assert!(report.outcome.is_success());

    let op = pubsub_op(&transport, ns::PUBSUB);
    assert!(op.is("subscribe", ns::PUBSUB));
    assert_eq!(op.attr("jid"), Some("tester@example.org"));
}
