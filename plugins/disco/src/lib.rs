#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]
//! disco#items over the session transport

use pubsub_core::prelude::*;

/// XEP-0030 item discovery
#[derive(Debug)]
pub struct Disco {
    transport: Arc<dyn Transport>,
}

impl Disco {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Register for Disco {
    fn register(self, builder: &mut SessionBuilder) {
        builder.discovery(self);
    }
}

#[async_trait]
impl Discovery for Disco {
    #[instrument(level = "debug", skip(self, rsm))]
    async fn items(
        &self,
        jid: &Jid,
        node: Option<&str>,
        rsm: Option<Element>,
    ) -> Result<DiscoItems, SessionError> {
        let mut query = Element::with_ns("query", ns::DISCO_ITEMS);
        if let Some(node) = node {
            query.set_attr("node", node);
        }
        if let Some(rsm) = rsm {
            query.append_child(rsm);
        }
        let resp = self.transport.request(stanza::get(jid, query)).await?;
        let query = resp
            .get_child("query", ns::DISCO_ITEMS)
            .cloned()
            .ok_or_else(|| SessionError::Malformed("disco#items result without <query/>".into()))?;
        let items = parse_items(&query)?;
        trace!(count = items.len(), "parsed disco items");
        Ok(DiscoItems { items, query })
    }
}

fn parse_items(query: &Element) -> Result<Vec<DiscoItem>, SessionError> {
    query
        .children_named("item", ns::DISCO_ITEMS)
        .map(|item| {
            let jid = item
                .attr("jid")
                .ok_or_else(|| SessionError::Malformed("disco item without jid".into()))?;
            Ok::<_, SessionError>(DiscoItem {
                jid: jid.to_owned(),
                node: item.attr("node").map(str::to_owned),
                name: item.attr("name").map(str::to_owned),
            })
        })
        .collect()
}
