//! Transport seam between the core and the console connection.
//!
//! Delivery is best-effort: the console never acknowledges these commands, so
//! a successful send only means the bytes were handed to the OS.

use std::fmt;
use std::future::Future;
use std::io;

use thiserror::Error;

use crate::command::Command;

/// Default TCP port of the console control protocol.
pub const DEFAULT_CONSOLE_PORT: u16 = 51326;

/// Network address of the console.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsoleAddress {
    pub host: String,
    pub port: u16,
}

impl ConsoleAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into().trim().to_string(), port }
    }
}

impl fmt::Display for ConsoleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Stage of a send at which a deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    Connect,
    Write,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Write => "write",
        })
    }
}

/// Failure to deliver a command to the console.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("dial {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("write {addr}: {source}")]
    Write {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage} {addr}: timed out")]
    Timeout { addr: String, stage: SendStage },
}

/// Something that can deliver a command to the console.
pub trait Transport: Send + Sync + 'static {
    /// Deliver one command to `addr`.
    fn send(
        &self,
        addr: &ConsoleAddress,
        command: Command,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Transport that keeps commands in memory instead of sending them.
///
/// Used for dry runs and as a test double. Can be told to fail a given send.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: parking_lot::Mutex<Vec<Command>>,
    fail_at: Option<usize>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `index`-th send (0-based) fails with a write error.
    #[must_use]
    pub fn failing_at(index: usize) -> Self {
        Self { sent: parking_lot::Mutex::default(), fail_at: Some(index) }
    }

    /// Commands accepted so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, addr: &ConsoleAddress, command: Command) -> Result<(), TransportError> {
        let mut sent = self.sent.lock();
        if self.fail_at == Some(sent.len()) {
            return Err(TransportError::Write {
                addr: addr.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            });
        }
        sent.push(command);
        Ok(())
    }
}
