//! Client connection: negotiation and request/response correlation.
//!
//! [`XmppClient::connect`] runs the whole client handshake: TCP, STARTTLS,
//! SASL, resource binding. Once bound, the stream is split. A reader task
//! routes `iq` responses to whoever is waiting on that id, while requests are
//! written through a shared [`FramedWrite`].
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use rustls_pki_types::ServerName;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{Mutex, oneshot},
    task::{AbortHandle, JoinHandle},
};
use tokio_rustls::TlsConnector;
use tokio_util::codec::{Framed, FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::{
    codec::{Packet, XmppCodec},
    element::Element,
    error::{Error, StanzaError},
    jid::Jid,
    ns,
    sasl::{self, Mechanism},
    stanza::{self, IdGenerator, IqType},
    tls::{self, CertPaths},
};

/// default client-to-server port
pub const DEFAULT_PORT: u16 = 5222;
/// default time to wait for an iq response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// how long `close` waits for the server to close its side
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Any bidirectional byte stream the client can run over
pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadWrite for T {}

/// boxed stream so the plain and TLS phases share one type
pub type BoxedIo = Box<dyn AsyncReadWrite>;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Element>>>>;

/// Everything needed to open a session
#[derive(Clone)]
pub struct ConnectConfig {
    /// account to authenticate as
    pub jid: Jid,
    /// password for PLAIN; EXTERNAL is used without one
    pub password: Option<String>,
    /// host to connect to, the jid's domain if unset
    pub host: Option<String>,
    /// port to connect to
    pub port: u16,
    /// resource to request when binding
    pub resource: Option<String>,
    /// TLS material
    pub certs: CertPaths,
    /// how long to wait for each iq response
    pub timeout: Duration,
}

impl fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("jid", &self.jid)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("resource", &self.resource)
            .field("certs", &self.certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectConfig {
    /// host actually dialed
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or_else(|| self.jid.domain())
    }
}

/// An authenticated, bound client stream
pub struct XmppClient {
    writer: Mutex<FramedWrite<WriteHalf<BoxedIo>, XmppCodec>>,
    pending: PendingMap,
    reader: Mutex<Option<JoinHandle<()>>>,
    abort: AbortHandle,
    ids: IdGenerator,
    bound: Jid,
    timeout: Duration,
    closed: AtomicBool,
}

impl fmt::Debug for XmppClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmppClient")
            .field("bound", &self.bound)
            .field("timeout", &self.timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl XmppClient {
    /// Connect, secure, authenticate and bind.
    ///
    /// Failures before SASL are [`Error::Connection`], [`Error::Tls`],
    /// [`Error::Cert`] or [`Error::Io`]; a SASL failure is
    /// [`Error::Authentication`].
    pub async fn connect(config: &ConnectConfig) -> Result<Self, Error> {
        let host = config.host();
        let domain = config.jid.domain();
        info!(%host, port = config.port, jid = %config.jid, "connecting");

        let tcp = TcpStream::connect((host, config.port))
            .await
            .map_err(|err| {
                Error::Connection(format!("failed to connect to {host}:{}: {err}", config.port))
            })?;
        let mut framed = Framed::new(Box::new(tcp) as BoxedIo, XmppCodec::default());

        let features = open_stream(&mut framed, domain).await?;
        if features.get_child("starttls", ns::TLS).is_none() {
            return Err(Error::Connection("server does not offer STARTTLS".into()));
        }
        framed
            .send(Packet::Stanza(Element::with_ns("starttls", ns::TLS)))
            .await?;
        let reply = next_stanza(&mut framed).await?;
        if !reply.is("proceed", ns::TLS) {
            return Err(Error::Connection(format!(
                "STARTTLS refused: <{}/>",
                reply.name()
            )));
        }

        let tls_config = tls::client_config(&config.certs)?;
        let server_name =
            ServerName::try_from(domain.to_owned()).map_err(|err| Error::Tls(err.to_string()))?;
        let tls = TlsConnector::from(Arc::new(tls_config))
            .connect(server_name, framed.into_inner())
            .await
            .map_err(|err| Error::Tls(err.to_string()))?;
        debug!("TLS established");

        Self::negotiate(Box::new(tls), config, IdGenerator::default()).await
    }

    /// Run SASL and resource binding over an already secured stream.
    pub(crate) async fn negotiate(
        io: BoxedIo,
        config: &ConnectConfig,
        ids: IdGenerator,
    ) -> Result<Self, Error> {
        let domain = config.jid.domain();
        let mut framed = Framed::new(io, XmppCodec::default());

        let features = open_stream(&mut framed, domain).await?;
        authenticate(&mut framed, &features, config).await?;
        info!(jid = %config.jid.bare(), "authenticated");

        let features = open_stream(&mut framed, domain).await?;
        let bound = bind(&mut framed, &features, config, &ids).await?;
        if session_required(&features) {
            let session = stanza::iq(IqType::Set, None, Element::with_ns("session", ns::SESSION))
                .with_attr("id", ids.next_id());
            request(&mut framed, session).await?;
        }
        info!(%bound, "resource bound");

        Ok(Self::spawn(framed, bound, ids, config.timeout))
    }

    fn spawn(framed: Framed<BoxedIo, XmppCodec>, bound: Jid, ids: IdGenerator, timeout: Duration) -> Self {
        let parts = framed.into_parts();
        let (read_half, write_half) = tokio::io::split(parts.io);
        let mut reader = FramedRead::new(read_half, parts.codec);
        reader.read_buffer_mut().extend_from_slice(&parts.read_buf);
        let writer = FramedWrite::new(write_half, parts.codec);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let handle = spawn_reader(reader, Arc::clone(&pending));
        let abort = handle.abort_handle();

        Self {
            writer: Mutex::new(writer),
            pending,
            reader: Mutex::new(Some(handle)),
            abort,
            ids,
            bound,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// full JID the server bound this stream to
    pub fn bound_jid(&self) -> &Jid {
        &self.bound
    }

    /// Send an `<iq/>` and wait for the response with the same id.
    ///
    /// An id is assigned if the stanza has none. A `type='error'` response is
    /// returned as [`Error::Stanza`].
    pub async fn exchange(&self, mut iq: Element) -> Result<Element, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StreamClosed);
        }
        let id = match iq.attr("id") {
            Some(id) => id.to_owned(),
            None => {
                let id = self.ids.next_id();
                iq.set_attr("id", id.as_str());
                id
            }
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.contains_key(&id) {
                return Err(Error::IdCollision(id));
            }
            pending.insert(id.clone(), tx);
        }

        if let Err(err) = self.writer.lock().await.send(Packet::Stanza(iq)).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => match stanza::iq_type(&resp) {
                Some(IqType::Error) => Err(Error::Stanza(StanzaError::from_stanza(&resp))),
                _ => Ok(resp),
            },
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                Err(Error::StreamClosed)
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Timeout(self.timeout))
            }
        }
    }

    /// send a stanza that expects no response
    pub async fn send(&self, stanza: Element) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StreamClosed);
        }
        self.writer.lock().await.send(Packet::Stanza(stanza)).await
    }

    /// Close the stream and stop the reader. Calling this more than once is a
    /// no-op.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let sent = {
            let mut writer = self.writer.lock().await;
            let sent = writer.send(Packet::StreamEnd).await;
            match writer.get_mut().shutdown().await {
                Ok(()) => sent,
                Err(err) => sent.and(Err(Error::Io(err))),
            }
        };

        if let Some(mut handle) = self.reader.lock().await.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                debug!("server did not close its side, stopping reader");
                handle.abort();
            }
        }
        info!(jid = %self.bound, "disconnected");
        sent
    }
}

impl Drop for XmppClient {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

fn stream_header(domain: &str) -> Element {
    Element::with_ns("stream:stream", ns::CLIENT)
        .with_attr("xmlns:stream", ns::STREAM)
        .with_attr("to", domain)
        .with_attr("version", "1.0")
}

/// send a stream header and return the features the server announces
async fn open_stream(
    framed: &mut Framed<BoxedIo, XmppCodec>,
    domain: &str,
) -> Result<Element, Error> {
    framed.send(Packet::StreamStart(stream_header(domain))).await?;
    match framed.next().await {
        Some(Ok(Packet::StreamStart(header))) => {
            trace!(id = ?header.attr("id"), "stream opened");
        }
        Some(Ok(other)) => {
            return Err(Error::Connection(format!(
                "expected stream header, got {other:?}"
            )));
        }
        Some(Err(err)) => return Err(err),
        None => return Err(Error::StreamClosed),
    }
    let features = next_stanza(framed).await?;
    if features.local_name() != "features" {
        return Err(Error::Connection(format!(
            "expected stream features, got <{}/>",
            features.name()
        )));
    }
    Ok(features)
}

/// next stanza during negotiation, turning stream errors into [`Error::Connection`]
async fn next_stanza(framed: &mut Framed<BoxedIo, XmppCodec>) -> Result<Element, Error> {
    match framed.next().await {
        Some(Ok(Packet::Stanza(stanza))) if stanza.name() == "stream:error" => {
            let condition = stanza
                .children()
                .find(|child| child.ns() == Some(ns::STREAMS) && child.local_name() != "text")
                .map(|child| child.local_name().to_owned())
                .unwrap_or_else(|| "undefined-condition".to_owned());
            Err(Error::Connection(format!("stream error: {condition}")))
        }
        Some(Ok(Packet::Stanza(stanza))) => Ok(stanza),
        Some(Ok(Packet::StreamEnd)) | None => Err(Error::StreamClosed),
        Some(Ok(Packet::StreamStart(_))) => {
            Err(Error::Connection("unexpected stream restart".into()))
        }
        Some(Err(err)) => Err(err),
    }
}

async fn authenticate(
    framed: &mut Framed<BoxedIo, XmppCodec>,
    features: &Element,
    config: &ConnectConfig,
) -> Result<(), Error> {
    let offered = sasl::offered_mechanisms(features);
    let mechanism = Mechanism::select(
        &offered,
        config.jid.local(),
        config.password.as_deref(),
        config.certs.has_client_identity(),
    )?;
    debug!(mechanism = mechanism.name(), ?offered, "starting SASL");
    framed.send(Packet::Stanza(mechanism.auth_element())).await?;

    let reply = next_stanza(framed).await?;
    match reply.local_name() {
        "success" => Ok(()),
        "failure" => Err(Error::Authentication(sasl::failure_reason(&reply))),
        other => Err(Error::Authentication(format!("unexpected <{other}/> during SASL"))),
    }
}

async fn bind(
    framed: &mut Framed<BoxedIo, XmppCodec>,
    features: &Element,
    config: &ConnectConfig,
    ids: &IdGenerator,
) -> Result<Jid, Error> {
    if features.get_child("bind", ns::BIND).is_none() {
        return Err(Error::Connection("server does not offer resource binding".into()));
    }
    let mut payload = Element::with_ns("bind", ns::BIND);
    if let Some(resource) = &config.resource {
        payload.append_child(Element::new("resource").with_text(resource.as_str()));
    }
    let iq = stanza::iq(IqType::Set, None, payload).with_attr("id", ids.next_id());
    let resp = request(framed, iq).await?;
    let jid = resp
        .get_child("bind", ns::BIND)
        .and_then(|bind| bind.get_child("jid", ns::BIND))
        .map(|jid| jid.text())
        .ok_or_else(|| Error::Connection("bind result carried no jid".into()))?;
    jid.trim()
        .parse()
        .map_err(|err| Error::Connection(format!("server bound an invalid jid {jid}: {err}")))
}

/// RFC 3921 session establishment, skipped when marked optional (RFC 6121)
fn session_required(features: &Element) -> bool {
    features
        .get_child("session", ns::SESSION)
        .is_some_and(|session| session.get_child("optional", ns::SESSION).is_none())
}

/// iq round trip during negotiation, before the reader task exists
async fn request(framed: &mut Framed<BoxedIo, XmppCodec>, iq: Element) -> Result<Element, Error> {
    let id = iq.attr("id").map(str::to_owned);
    framed.send(Packet::Stanza(iq)).await?;
    loop {
        let stanza = next_stanza(framed).await?;
        if stanza.name() != "iq" || stanza.attr("id").map(str::to_owned) != id {
            trace!(name = stanza.name(), "skipping stanza during negotiation");
            continue;
        }
        return match stanza::iq_type(&stanza) {
            Some(IqType::Error) => Err(Error::Connection(format!(
                "negotiation request failed: {}",
                StanzaError::from_stanza(&stanza)
            ))),
            _ => Ok(stanza),
        };
    }
}

fn spawn_reader(
    mut reader: FramedRead<ReadHalf<BoxedIo>, XmppCodec>,
    pending: PendingMap,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = reader.next().await {
            match packet {
                Ok(Packet::Stanza(stanza)) if stanza.name() == "iq" => {
                    match (stanza::iq_type(&stanza), stanza.attr("id")) {
                        (Some(IqType::Result | IqType::Error), Some(id)) => {
                            let id = id.to_owned();
                            let tx = pending.lock().await.remove(&id);
                            match tx {
                                Some(tx) => {
                                    let _ = tx.send(stanza);
                                }
                                None => debug!(%id, "response to unknown iq"),
                            }
                        }
                        _ => trace!(%stanza, "ignoring inbound iq request"),
                    }
                }
                Ok(Packet::Stanza(stanza)) => trace!(name = stanza.name(), "ignoring stanza"),
                Ok(Packet::StreamEnd) => {
                    debug!("server closed the stream");
                    break;
                }
                Ok(Packet::StreamStart(_)) => warn!("unexpected stream header"),
                Err(err) => {
                    warn!(?err, "stream read failed");
                    break;
                }
            }
        }
        // wake anyone still waiting; their receivers see the sender dropped
        pending.lock().await.clear();
    })
}
