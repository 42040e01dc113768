//! One-shot TCP transport.

use std::future::Future;
use std::io;
use std::time::Duration;

use futures::SinkExt;
use sqbridge_core::transport::SendStage;
use sqbridge_core::{Command, ConsoleAddress, Transport, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::codec::CommandCodec;

/// Default deadline for connecting and for writing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Opens a fresh connection per command, writes it, and closes.
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with the given connect/write deadline.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for TcpTransport {
    async fn send(&self, addr: &ConsoleAddress, command: Command) -> Result<(), TransportError> {
        let target = addr.to_string();

        let connect = TcpStream::connect((addr.host.as_str(), addr.port));
        let stream = within(self.timeout, SendStage::Connect, &target, connect).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(addr = %target, error = %e, "Could not disable Nagle");
        }

        let mut sink = FramedWrite::new(stream, CommandCodec);
        within(self.timeout, SendStage::Write, &target, sink.send(command)).await?;
        debug!(addr = %target, %command, "TX");

        // The stream is closed on drop regardless; a clean FIN is best-effort.
        let mut stream = sink.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!(addr = %target, error = %e, "Shutdown after write failed");
        }
        Ok(())
    }
}

/// Run one I/O stage under `deadline`, tagging failures with the stage and address.
async fn within<T>(
    deadline: Duration,
    stage: SendStage,
    addr: &str,
    stage_io: impl Future<Output = io::Result<T>>,
) -> Result<T, TransportError> {
    let addr = addr.to_string();
    match timeout(deadline, stage_io).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(match stage {
            SendStage::Connect => TransportError::Connect { addr, source },
            SendStage::Write => TransportError::Write { addr, source },
        }),
        Err(_) => Err(TransportError::Timeout { addr, stage }),
    }
}
