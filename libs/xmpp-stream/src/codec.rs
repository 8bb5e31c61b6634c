//! Framing for an XMPP stream.
//!
//! An XMPP session is one long XML document. The codec splits it into the
//! stream header, complete top-level stanzas, and the closing tag, and hands
//! each complete stanza to [`Element::parse`].
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::{element::Element, error::Error};

/// stanzas larger than this are refused
pub const DEFAULT_MAX_STANZA: usize = 1024 * 1024;

const STREAM_OPEN: &[u8] = b"<stream:stream";
const STREAM_CLOSE: &str = "</stream:stream>";

/// A unit of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `<stream:stream ...>` opening tag
    StreamStart(Element),
    /// a complete top-level element
    Stanza(Element),
    /// `</stream:stream>`
    StreamEnd,
}

/// `tokio_util` codec for [`Packet`]s
#[derive(Debug, Clone, Copy)]
pub struct XmppCodec {
    max_stanza: usize,
}

impl Default for XmppCodec {
    fn default() -> Self {
        Self {
            max_stanza: DEFAULT_MAX_STANZA,
        }
    }
}

impl XmppCodec {
    /// codec refusing stanzas over `max_stanza` bytes
    pub fn with_max_stanza(max_stanza: usize) -> Self {
        Self { max_stanza }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// bytes to discard: whitespace keepalives, declarations, comments
    Skip(usize),
    Header(usize),
    Stanza(usize),
    Close(usize),
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// index just past the `>` closing the tag that starts at `start`,
/// ignoring any `>` inside quoted attribute values
fn tag_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut quote = None;
    for (i, &b) in buf.iter().enumerate().skip(start + 1) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// find the end of the element starting at `start`
fn element_end(buf: &[u8], start: usize) -> Result<Option<usize>, Error> {
    let mut depth = 0usize;
    let mut i = start;
    while i < buf.len() {
        if buf[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &buf[i..];
        if rest.starts_with(b"<!--") {
            match find(buf, i, b"-->") {
                Some(end) => i = end + 3,
                None => return Ok(None),
            }
            continue;
        }
        if rest.starts_with(b"<![CDATA[") {
            match find(buf, i, b"]]>") {
                Some(end) => i = end + 3,
                None => return Ok(None),
            }
            continue;
        }
        if rest.len() < 2 {
            return Ok(None);
        }
        let Some(end) = tag_end(buf, i) else {
            return Ok(None);
        };
        if rest[1] == b'/' {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| Error::Xml("unexpected closing tag".into()))?;
            if depth == 0 {
                return Ok(Some(end));
            }
        } else if buf[end - 2] == b'/' {
            if depth == 0 {
                return Ok(Some(end));
            }
        } else {
            depth += 1;
        }
        i = end;
    }
    Ok(None)
}

fn next_frame(buf: &[u8]) -> Result<Option<Frame>, Error> {
    let Some(start) = buf.iter().position(|b| !b.is_ascii_whitespace()) else {
        return Ok((!buf.is_empty()).then_some(Frame::Skip(buf.len())));
    };
    if start > 0 {
        return Ok(Some(Frame::Skip(start)));
    }
    if buf[0] != b'<' {
        return Err(Error::Xml("unexpected character data at stream level".into()));
    }
    if buf.starts_with(b"<?") {
        return Ok(find(buf, 0, b"?>").map(|end| Frame::Skip(end + 2)));
    }
    if buf.starts_with(b"<!--") {
        return Ok(find(buf, 0, b"-->").map(|end| Frame::Skip(end + 3)));
    }
    if buf.starts_with(b"</") {
        return Ok(tag_end(buf, 0).map(Frame::Close));
    }
    if buf.len() < STREAM_OPEN.len() && STREAM_OPEN.starts_with(buf) {
        return Ok(None);
    }
    if buf.starts_with(STREAM_OPEN) {
        return Ok(tag_end(buf, 0).map(Frame::Header));
    }
    Ok(element_end(buf, 0)?.map(Frame::Stanza))
}

impl Decoder for XmppCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Error> {
        loop {
            let Some(frame) = next_frame(src)? else {
                if src.len() > self.max_stanza {
                    return Err(Error::Xml(format!(
                        "stanza exceeds {} bytes",
                        self.max_stanza
                    )));
                }
                return Ok(None);
            };
            match frame {
                Frame::Skip(n) => src.advance(n),
                Frame::Header(n) => {
                    let raw = src.split_to(n);
                    return Element::parse_open_tag(&raw).map(|el| Some(Packet::StreamStart(el)));
                }
                Frame::Stanza(n) => {
                    let raw = src.split_to(n);
                    trace!(stanza = %String::from_utf8_lossy(&raw), "recv");
                    return Element::parse(&raw).map(|el| Some(Packet::Stanza(el)));
                }
                Frame::Close(n) => {
                    src.advance(n);
                    return Ok(Some(Packet::StreamEnd));
                }
            }
        }
    }
}

impl Encoder<Packet> for XmppCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Error> {
        let out = match item {
            Packet::StreamStart(header) => format!("<?xml version='1.0'?>{}", header.open_tag()),
            Packet::Stanza(stanza) => stanza.to_string(),
            Packet::StreamEnd => STREAM_CLOSE.to_owned(),
        };
        trace!(%out, "send");
        dst.reserve(out.len());
        dst.put_slice(out.as_bytes());
        Ok(())
    }
}
