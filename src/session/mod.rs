// src/session/mod.rs

//! Pluggable session abstraction.
//!
//! The dispatch loop talks to a [`SessionBackend`] instead of a raw socket.
//! This makes it easy to swap in a fake session in tests while keeping the
//! production transport in [`tcp`].
//!
//! - [`tcp::TcpSessionFactory`] is the default implementation: a thin
//!   line-oriented request/response client over TCP.
//! - Tests provide their own factory that scripts responses, failures and
//!   hangs without opening any sockets.
//!
//! Authentication and encryption of the wire protocol are out of scope;
//! a deployment that needs them supplies its own backend.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::Token;

pub mod tcp;

pub use tcp::TcpSessionFactory;

/// A stateful line-oriented connection to one token endpoint.
///
/// Ownership is exclusive to the dispatch task while a command is in
/// flight; the endpoint cannot parse interleaved request/response pairs.
pub trait SessionBackend: Send {
    /// Send one command and read its response.
    fn send(
        &mut self,
        command: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Tear the connection down. Errors are not interesting to callers.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Creates sessions for resolved tokens.
pub trait SessionFactory: Send {
    /// Open a connection to the token's endpoint.
    fn connect(
        &mut self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SessionBackend>>> + Send + '_>>;
}
