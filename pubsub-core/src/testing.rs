//! Scripted transport and connector for tests.
//!
//! [`MockTransport`] records every request and sent stanza and answers
//! requests from a queue. Roster requests are answered separately so a test
//! only scripts the exchange of the action under test.
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use xmpp_stream::{Element, Jid, StanzaError, ns};

use crate::{
    error::SessionError, lifecycle::Connect, session::Session, session::SessionBuilder,
    transport::Transport,
};

/// JID a default [`MockTransport`] is bound to
pub const MOCK_JID: &str = "tester@example.org/test";

/// A transport that never touches the network
#[derive(Debug)]
pub struct MockTransport {
    jid: Jid,
    responses: Mutex<VecDeque<Result<Element, SessionError>>>,
    roster_error: Mutex<Option<SessionError>>,
    requests: Mutex<Vec<Element>>,
    sent: Mutex<Vec<Element>>,
    closes: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        match MOCK_JID.parse() {
            Ok(jid) => Self::new(jid),
            Err(err) => panic!("invalid mock jid: {err}"),
        }
    }
}

impl MockTransport {
    /// transport bound to `jid`
    pub fn new(jid: Jid) -> Self {
        Self {
            jid,
            responses: Mutex::new(VecDeque::new()),
            roster_error: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    /// queue a successful response. When the queue is empty requests get an
    /// empty `type='result'` response.
    pub fn push_response(&self, response: Element) {
        lock(&self.responses).push_back(Ok(response));
    }

    /// queue a response carrying the payload `payload`
    pub fn push_result(&self, payload: Element) {
        self.push_response(result_iq().with_child(payload));
    }

    /// queue a server fault
    pub fn push_fault(&self, fault: StanzaError) {
        lock(&self.responses).push_back(Err(SessionError::Fault(fault)));
    }

    /// queue any error
    pub fn push_error(&self, err: SessionError) {
        lock(&self.responses).push_back(Err(err));
    }

    /// make the roster request fail with `err`
    pub fn fail_roster(&self, err: SessionError) {
        *lock(&self.roster_error) = Some(err);
    }

    /// every request seen, roster included, in order
    pub fn requests(&self) -> Vec<Element> {
        lock(&self.requests).clone()
    }

    /// requests other than the roster fetch
    pub fn action_requests(&self) -> Vec<Element> {
        self.requests()
            .into_iter()
            .filter(|iq| iq.get_child("query", ns::ROSTER).is_none())
            .collect()
    }

    /// stanzas sent without expecting a response
    pub fn sent(&self) -> Vec<Element> {
        lock(&self.sent).clone()
    }

    /// how many times `close` was called
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// an empty `<iq type='result'/>`
pub fn result_iq() -> Element {
    Element::new("iq").with_attr("type", "result")
}

#[async_trait]
impl Transport for MockTransport {
    fn bound_jid(&self) -> &Jid {
        &self.jid
    }

    async fn request(&self, iq: Element) -> Result<Element, SessionError> {
        let is_roster = iq.get_child("query", ns::ROSTER).is_some();
        let id = iq.attr("id").map(str::to_owned);
        lock(&self.requests).push(iq);
        let response = if is_roster {
            match lock(&self.roster_error).take() {
                Some(err) => Err(err),
                None => Ok(result_iq().with_child(Element::with_ns("query", ns::ROSTER))),
            }
        } else {
            lock(&self.responses)
                .pop_front()
                .unwrap_or_else(|| Ok(result_iq()))
        };
        response.map(|resp| match id {
            Some(id) => resp.with_attr("id", id),
            None => resp,
        })
    }

    async fn send(&self, stanza: Element) -> Result<(), SessionError> {
        lock(&self.sent).push(stanza);
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type Compose = Box<dyn Fn(&mut SessionBuilder) + Send + Sync>;

/// A [`Connect`] handing out sessions over a [`MockTransport`]
pub struct MockConnector {
    transport: Option<Arc<MockTransport>>,
    compose: Compose,
    error: Mutex<Option<SessionError>>,
}

impl fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnector")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl MockConnector {
    /// connector over `transport`; `compose` registers the capabilities
    pub fn new<F>(transport: Arc<MockTransport>, compose: F) -> Self
    where
        F: Fn(&mut SessionBuilder) + Send + Sync + 'static,
    {
        Self {
            transport: Some(transport),
            compose: Box::new(compose),
            error: Mutex::new(None),
        }
    }

    /// connector whose connect attempt fails with `err`
    pub fn failing(err: SessionError) -> Self {
        Self {
            transport: None,
            compose: Box::new(|_| {}),
            error: Mutex::new(Some(err)),
        }
    }
}

#[async_trait]
impl Connect for MockConnector {
    async fn connect(&self) -> Result<Session, SessionError> {
        if let Some(err) = lock(&self.error).take() {
            return Err(err);
        }
        let transport = self
            .transport
            .clone()
            .ok_or_else(|| SessionError::Connection("connector already failed".into()))?;
        let mut builder = Session::builder(transport);
        (self.compose)(&mut builder);
        builder.build()
    }
}
