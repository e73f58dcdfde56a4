//! Line-oriented framing over a [`TcpStream`].
//!
//! The framer owns a single byte accumulator. Multiple lines arriving in one
//! `read` are emitted one per [`Framer::readline`] call, in order, the way
//! the teacher's `Connection` buffers a `BytesMut` across `read_frame`
//! calls. Encoding is UTF-8; malformed bytes never panic the framer — they
//! are lossily decoded, which typically produces a line that fails
//! `Action::is_valid`.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::Error;

/// Lines are capped well above the "≥ 4 KiB" floor from the spec; a peer
/// that never completes a line within this bound is protocol-hostile.
const MAX_LINE_LEN: usize = 8 * 1024;

const READ_CHUNK: usize = 1024;

/// The result of a timed [`Framer::readline`] call.
#[derive(Debug)]
pub enum ReadOutcome {
    Line(String),
    /// No complete line arrived within the requested timeout.
    Timeout,
}

pub struct Framer {
    stream: TcpStream,
    buf: BytesMut,
}

impl Framer {
    pub fn new(stream: TcpStream) -> Framer {
        Framer {
            stream,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Appends `\n` and writes the whole line, looping until the write
    /// completes (handled internally by `write_all`).
    pub async fn send(&mut self, line: &str) -> Result<(), Error> {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
        self.stream.write_all(&out).await?;
        Ok(())
    }

    /// Reads the next newline-terminated line.
    ///
    /// With `timeout = None`, blocks until a line arrives or the peer
    /// disconnects. With `timeout = Some(d)`, waits up to `d` and returns
    /// [`ReadOutcome::Timeout`] if nothing completed in that window.
    pub async fn readline(&mut self, timeout: Option<Duration>) -> Result<ReadOutcome, Error> {
        if let Some(line) = self.take_buffered_line()? {
            return Ok(ReadOutcome::Line(line));
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match timeout {
                None => self.stream.read(&mut chunk).await?,
                Some(d) => match tokio::time::timeout(d, self.stream.read(&mut chunk)).await {
                    Ok(result) => result?,
                    Err(_elapsed) => return Ok(ReadOutcome::Timeout),
                },
            };

            if n == 0 {
                return Err(Error::PeerDisconnected);
            }

            self.buf.extend_from_slice(&chunk[..n]);

            if let Some(line) = self.take_buffered_line()? {
                return Ok(ReadOutcome::Line(line));
            }
        }
    }

    /// A 1-second-bounded single-byte read used purely to detect whether the
    /// peer has gone away. A timeout is inconclusive and returns `Ok(())`;
    /// any bytes read are kept for the next `readline`.
    pub async fn check_connection(&mut self) -> Result<(), Error> {
        let mut byte = [0u8; 1];
        match tokio::time::timeout(Duration::from_secs(1), self.stream.read(&mut byte)).await {
            Err(_elapsed) => Ok(()),
            Ok(Ok(0)) => Err(Error::PeerDisconnected),
            Ok(Ok(n)) => {
                self.buf.extend_from_slice(&byte[..n]);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }

    fn take_buffered_line(&mut self) -> Result<Option<String>, Error> {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) if pos <= MAX_LINE_LEN => {
                let mut raw = self.buf.split_to(pos + 1);
                raw.truncate(pos);
                Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
            }
            // The line itself (ignoring anything that follows) is already
            // too long — no point waiting for the rest of it.
            Some(_) => Err(Error::InvalidRequest),
            None => {
                if self.buf.len() > MAX_LINE_LEN {
                    Err(Error::InvalidRequest)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn connected_pair() -> (Framer, Framer) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Framer::new(server), Framer::new(client))
    }

    #[tokio::test]
    async fn send_then_readline_blocking() {
        let (mut server, mut client) = connected_pair().await;
        client.send("hello").await.unwrap();
        match server.readline(None).await.unwrap() {
            ReadOutcome::Line(line) => assert_eq!(line, "hello"),
            ReadOutcome::Timeout => panic!("unexpected timeout"),
        }
    }

    #[tokio::test]
    async fn multiple_lines_in_one_write_are_emitted_in_order() {
        let (mut server, mut client) = connected_pair().await;
        client.send("one").await.unwrap();
        client.send("two").await.unwrap();

        let first = match server.readline(None).await.unwrap() {
            ReadOutcome::Line(l) => l,
            _ => panic!("expected line"),
        };
        let second = match server.readline(None).await.unwrap() {
            ReadOutcome::Line(l) => l,
            _ => panic!("expected line"),
        };
        assert_eq!(first, "one");
        assert_eq!(second, "two");
    }

    #[tokio::test]
    async fn timeout_returns_without_a_line() {
        let (mut server, _client) = connected_pair().await;
        match server
            .readline(Some(Duration::from_millis(50)))
            .await
            .unwrap()
        {
            ReadOutcome::Timeout => {}
            ReadOutcome::Line(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn peer_close_is_detected_as_disconnect() {
        let (mut server, client) = connected_pair().await;
        drop(client);
        let err = server.readline(None).await.unwrap_err();
        assert!(matches!(err, Error::PeerDisconnected));
    }

    #[tokio::test]
    async fn check_connection_detects_disconnect() {
        let (mut server, client) = connected_pair().await;
        drop(client);
        let err = server.check_connection().await.unwrap_err();
        assert!(matches!(err, Error::PeerDisconnected));
    }

    #[tokio::test]
    async fn check_connection_timeout_is_inconclusive() {
        let (mut server, _client) = connected_pair().await;
        assert!(server.check_connection().await.is_ok());
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let (mut server, mut client) = connected_pair().await;
        let huge = "x".repeat(MAX_LINE_LEN + 1);
        client.send(&huge).await.unwrap();
        let err = server.readline(None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest));
    }
}
