#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]
//! result set management `<set/>` building and parsing

use pubsub_core::prelude::*;

/// XEP-0059 paging; holds no state
#[derive(Debug, Default, Clone, Copy)]
pub struct Rsm;

impl Register for Rsm {
    fn register(self, builder: &mut SessionBuilder) {
        builder.paging(self);
    }
}

impl ResultSetPaging for Rsm {
    fn request(&self, max: usize, after: Option<&str>) -> Element {
        let mut set = Element::with_ns("set", ns::RSM)
            .with_child(Element::new("max").with_text(max.to_string()));
        if let Some(after) = after {
            set.append_child(Element::new("after").with_text(after));
        }
        set
    }

    fn page(&self, payload: &Element) -> Option<PageInfo> {
        let set = payload.get_child("set", ns::RSM)?;
        let text = |name: &str| {
            set.get_child(name, ns::RSM)
                .map(|el| el.text().trim().to_owned())
                .filter(|s| !s.is_empty())
        };
        Some(PageInfo {
            first: text("first"),
            last: text("last"),
            count: text("count").and_then(|c| c.parse().ok()),
        })
    }
}
