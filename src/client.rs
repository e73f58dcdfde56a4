//! A thin client for the lock service wire protocol.
//!
//! Grounded in `original_source/tcpnetlock/client/client.py`'s `LockClient`
//! and `client/action.py`'s per-action classes: each method sends one action
//! line and validates the response against that action's allowed set,
//! raising on anything else. The Python `assert response in ALLOWED` becomes
//! [`Error::ProtocolMismatch`] here rather than a panic.

use tokio::net::TcpStream;

use crate::constants::*;
use crate::error::Error;
use crate::framer::{Framer, ReadOutcome};

/// A connected client holding (at most) one outstanding lease at a time.
pub struct LockClient {
    framer: Framer,
    client_id: String,
}

impl LockClient {
    /// Connects to `host:port`. `client_id` must satisfy
    /// `^[A-Za-z0-9_-]+$`, the same identifier rule the server enforces on
    /// lock names.
    pub async fn connect(host: &str, port: u16, client_id: &str) -> Result<LockClient, Error> {
        if !is_valid_identifier(client_id) {
            return Err(Error::InvalidIdentifier(client_id.to_string()));
        }

        let stream = TcpStream::connect((host, port)).await?;
        Ok(LockClient {
            framer: Framer::new(stream),
            client_id: client_id.to_string(),
        })
    }

    /// Wraps an already-connected stream, skipping the identifier check
    /// (used by tests that dial a loopback listener directly).
    pub fn from_stream(stream: TcpStream, client_id: String) -> LockClient {
        LockClient {
            framer: Framer::new(stream),
            client_id,
        }
    }

    /// Requests the named lock. Returns `true` if granted, `false` if
    /// another holder already has it.
    pub async fn lock(&mut self, name: &str) -> Result<bool, Error> {
        if !is_valid_identifier(name) {
            return Err(Error::InvalidIdentifier(name.to_string()));
        }

        let line = format!("{},name:{},client-id:{}", ACTION_LOCK, name, self.client_id);
        self.framer.send(&line).await?;

        let response = self.read_line().await?;
        match response.as_str() {
            RESPONSE_OK => Ok(true),
            RESPONSE_LOCK_NOT_GRANTED => Ok(false),
            RESPONSE_ERR_INVALID_LOCK_NAME => Err(Error::InvalidLockName),
            other => Err(protocol_mismatch(
                &[RESPONSE_OK, RESPONSE_LOCK_NOT_GRANTED, RESPONSE_ERR_INVALID_LOCK_NAME],
                other,
            )),
        }
    }

    /// Releases a held lock. Must only be called after a successful
    /// [`LockClient::lock`].
    pub async fn release(&mut self) -> Result<(), Error> {
        self.framer.send(ACTION_RELEASE).await?;
        self.expect_one(RESPONSE_RELEASED).await
    }

    /// Sends a keepalive on the inner loop of a held lock.
    pub async fn keepalive(&mut self) -> Result<(), Error> {
        self.framer.send(ACTION_KEEPALIVE).await?;
        self.expect_one(RESPONSE_STILL_ALIVE).await
    }

    /// Pings the server outside of any held lock.
    pub async fn ping(&mut self) -> Result<(), Error> {
        self.framer.send(ACTION_PING).await?;
        self.expect_one(RESPONSE_PONG).await
    }

    /// Requests the `.stats` JSON payload, returning the raw JSON text after
    /// the `stats-coming,` prefix.
    pub async fn stats(&mut self) -> Result<String, Error> {
        self.framer.send(ACTION_STATS).await?;
        let response = self.read_line().await?;
        match response.strip_prefix(&format!("{},", RESPONSE_STATS_PREFIX)) {
            Some(json) => Ok(json.to_string()),
            None => Err(protocol_mismatch(&[RESPONSE_STATS_PREFIX], &response)),
        }
    }

    /// Requests server shutdown. Only honored by the server when this
    /// client is connected from a loopback address.
    pub async fn server_shutdown(&mut self) -> Result<(), Error> {
        self.framer.send(ACTION_SERVER_SHUTDOWN).await?;
        self.expect_one(RESPONSE_SHUTTING_DOWN).await
    }

    /// Polls for peer liveness without consuming a protocol action. Used by
    /// the holding-client CLI's non-keepalive loop.
    pub async fn check_connection(&mut self) -> Result<(), Error> {
        self.framer.check_connection().await
    }

    /// Drops the connection, implicitly releasing any held lease.
    pub fn close(self) {
        drop(self);
    }

    async fn read_line(&mut self) -> Result<String, Error> {
        match self.framer.readline(None).await? {
            ReadOutcome::Line(line) => Ok(line),
            ReadOutcome::Timeout => unreachable!("blocking readline never times out"),
        }
    }

    async fn expect_one(&mut self, expected: &'static str) -> Result<(), Error> {
        let response = self.read_line().await?;
        if response == expected {
            Ok(())
        } else {
            Err(protocol_mismatch(&[expected], &response))
        }
    }
}

fn protocol_mismatch(expected: &[&'static str], actual: &str) -> Error {
    Error::ProtocolMismatch {
        expected: expected.to_vec(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn rejects_invalid_client_id_without_connecting() {
        let err = LockClient::connect("127.0.0.1", 1, "has space")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn lock_then_release_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framer = Framer::new(stream);
            match framer.readline(None).await.unwrap() {
                ReadOutcome::Line(line) => assert!(line.starts_with("lock,name:alpha")),
                _ => panic!("expected a line"),
            }
            framer.send(RESPONSE_OK).await.unwrap();
            match framer.readline(None).await.unwrap() {
                ReadOutcome::Line(line) => assert_eq!(line, ACTION_RELEASE),
                _ => panic!("expected a line"),
            }
            framer.send(RESPONSE_RELEASED).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = LockClient::from_stream(stream, "tester".to_string());
        assert!(client.lock("alpha").await.unwrap());
        client.release().await.unwrap();

        server.await.unwrap();
    }

    #[tokio::test]
    async fn unexpected_response_is_a_protocol_mismatch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framer = Framer::new(stream);
            let _ = framer.readline(None).await.unwrap();
            framer.send("nonsense").await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = LockClient::from_stream(stream, "tester".to_string());
        let err = client.lock("alpha").await.unwrap_err();
        assert!(matches!(err, Error::ProtocolMismatch { .. }));

        server.await.unwrap();
    }
}
