// src/session/tcp.rs

//! Default line-oriented TCP session.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::errors::{RelayError, Result};
use crate::session::{SessionBackend, SessionFactory};
use crate::types::Token;

/// Default connect timeout; per-command deadlines are enforced by the
/// dispatch loop, this only bounds the TCP handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Factory producing [`TcpSession`]s.
pub struct TcpSessionFactory {
    connect_timeout: Duration,
}

impl TcpSessionFactory {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for TcpSessionFactory {
    fn connect(
        &mut self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SessionBackend>>> + Send + '_>> {
        let addr = token.address();
        let timeout = self.connect_timeout;

        Box::pin(async move {
            debug!(addr = %addr, "connecting session");

            let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| {
                    RelayError::Session(format!("connect to {addr} timed out"))
                })?
                .map_err(|e| RelayError::Session(format!("connect to {addr}: {e}")))?;

            let (read, write) = stream.into_split();
            info!(addr = %addr, "session connected");

            Ok(Box::new(TcpSession {
                addr,
                reader: BufReader::new(read),
                writer: write,
            }) as Box<dyn SessionBackend>)
        })
    }
}

/// One open line-oriented connection.
///
/// Each `send` writes the command terminated by CRLF and reads a single
/// response line. Anything richer (prompts, multi-line replies) belongs in
/// a deployment-specific backend.
pub struct TcpSession {
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SessionBackend for TcpSession {
    fn send(
        &mut self,
        command: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let line = format!("{command}\r\n");

        Box::pin(async move {
            self.writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| RelayError::Session(format!("write to {}: {e}", self.addr)))?;
            self.writer
                .flush()
                .await
                .map_err(|e| RelayError::Session(format!("flush to {}: {e}", self.addr)))?;

            let mut response = String::new();
            let n = self
                .reader
                .read_line(&mut response)
                .await
                .map_err(|e| RelayError::Session(format!("read from {}: {e}", self.addr)))?;

            if n == 0 {
                return Err(RelayError::Session(format!(
                    "connection to {} closed by peer",
                    self.addr
                )));
            }

            Ok(response.trim_end_matches(['\r', '\n']).to_string())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            debug!(addr = %self.addr, "disconnecting session");
            let _ = self.writer.shutdown().await;
        })
    }
}
