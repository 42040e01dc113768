//! sqbridge net - TCP delivery of console commands.
//!
//! Each command goes out on its own short-lived connection. The console never
//! answers, so nothing is read back.

pub mod codec;
pub mod tcp;

pub use codec::CommandCodec;
pub use tcp::{DEFAULT_TIMEOUT, TcpTransport};
