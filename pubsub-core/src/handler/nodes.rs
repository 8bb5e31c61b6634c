use std::pin::pin;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt, stream};
use tracing::{debug, info};

use super::{Command, Context, failed};
use crate::{
    action::ActionKind,
    error::SessionError,
    model::DiscoItem,
    outcome::{FaultContext, Outcome, Rendered},
};

/// `nodes`: list the service root, or a collection node when one is given
#[derive(Debug, Default, Clone, Copy)]
pub struct Nodes;

enum Cursor {
    Start,
    After(String),
    Done,
}

/// Discovered items as a lazy sequence. Without a page size a single request
/// is made; with one, pages are requested until the server stops returning a
/// `last` marker, repeats it, or sends an empty page.
fn discovered<'a>(
    ctx: &'a Context<'a>,
    node: Option<&'a str>,
) -> impl Stream<Item = Result<DiscoItem, SessionError>> + Send + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let after = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::After(after) => Some(after),
        };
        let rsm = ctx
            .page_size
            .map(|max| ctx.session.paging().request(max, after.as_deref()));
        let page = ctx
            .session
            .discovery()
            .items(ctx.service, node, rsm)
            .await?;

        let next = match ctx.page_size {
            None => Cursor::Done,
            Some(_) if page.items.is_empty() => Cursor::Done,
            Some(_) => match ctx.session.paging().page(&page.query) {
                Some(info) => match info.last {
                    Some(last) if after.as_deref() != Some(last.as_str()) => {
                        debug!(%last, count = info.count, "requesting next page");
                        Cursor::After(last)
                    }
                    _ => Cursor::Done,
                },
                None => Cursor::Done,
            },
        };
        Ok::<_, SessionError>(Some((stream::iter(page.items.into_iter().map(Ok::<_, SessionError>)), next)))
    })
    .try_flatten()
}

#[async_trait]
impl Command for Nodes {
    fn kind(&self) -> ActionKind {
        ActionKind::Nodes
    }

    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let node = ctx.action.node.as_deref().filter(|node| !node.is_empty());
        let mut items = pin!(discovered(ctx, node));
        let mut seen = Vec::new();
        loop {
            match items.try_next().await {
                Ok(Some(item)) => {
                    info!(jid = %item.jid, node = item.node.as_deref(), "  - {item}");
                    seen.push(item);
                }
                Ok(None) => break,
                Err(err) => {
                    let context = node.map(FaultContext::node).unwrap_or_default();
                    return failed("could not retrieve node list".into(), err, context);
                }
            }
        }
        Outcome::Success(Rendered::Nodes {
            node: node.map(str::to_owned),
            items: seen,
        })
    }
}
