//! Protocol sniffing over the leading bytes of a connection.
//!
//! # Responsibilities
//! - Peek a connection's preface without consuming it
//! - Classify HTTP/1.x request lines and the HTTP/2 client preface
//!
//! # Design Decisions
//! - Uses OS-level `MSG_PEEK` (`TcpStream::peek`), so the claiming handler
//!   always receives the stream with every byte intact
//! - A connection is classified only once `MIN_DECISIVE_LEN` bytes are visible,
//!   so a trailing catch-all cannot claim ahead of an earlier matcher that
//!   needed a longer prefix

use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// The HTTP/2 client connection preface.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Peek window; the full HTTP/2 preface is the longest pattern we look at.
pub const MAX_PREFACE_LEN: usize = HTTP2_PREFACE.len();

/// Bytes required before match predicates are evaluated.
///
/// Eight bytes cover the longest HTTP/1 method token plus its trailing space
/// (`CONNECT `) and an unambiguous prefix of the HTTP/2 preface (`PRI * HT`).
pub const MIN_DECISIVE_LEN: usize = 8;

/// `MSG_PEEK` returns whatever is buffered without waiting for more, so an
/// undersized preface is re-polled on a short delay until the sniff deadline.
const PEEK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// HTTP/1.x method tokens, each with the mandatory trailing space.
/// `PRI ` is deliberately absent: it is the HTTP/2 preface pseudo-method.
const HTTP1_METHODS: &[&[u8]] = &[
    b"GET ",
    b"HEAD ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

/// Does the preface start an HTTP/1.x request line?
pub fn is_http1_request(preface: &[u8]) -> bool {
    HTTP1_METHODS.iter().any(|m| preface.starts_with(m))
}

/// Is the preface a (prefix of the) HTTP/2 client connection preface?
///
/// gRPC runs exclusively over HTTP/2, so the gRPC variant keys on this.
pub fn is_http2_preface(preface: &[u8]) -> bool {
    if preface.len() < MIN_DECISIVE_LEN {
        return false;
    }
    let n = preface.len().min(HTTP2_PREFACE.len());
    preface[..n] == HTTP2_PREFACE[..n]
}

/// Peek the leading bytes of a connection until a decisive preface is visible.
///
/// Returns `Ok(None)` if the peer closed before sending enough bytes. The
/// caller is expected to bound this with the sniff timeout.
pub(crate) async fn peek_preface(stream: &TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; MAX_PREFACE_LEN];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if n >= MIN_DECISIVE_LEN {
            return Ok(Some(buf[..n].to_vec()));
        }
        tokio::time::sleep(PEEK_RETRY_DELAY).await;
    }
}
