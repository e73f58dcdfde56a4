//! A minimal network advisory lock service.
//!
//! The server grants named, mutually exclusive leases to connected clients
//! over TCP; a lease lives exactly as long as the connection that holds it.
//! This library exposes both halves of the wire protocol:
//!
//! - [`server`]: the listener, accept loop, and per-connection dispatch.
//! - [`client`]: a thin counterpart for issuing actions and validating
//!   responses.
//!
//! The remaining modules are the correctness-critical kernel the server is
//! built from: [`framer`] (line-oriented I/O), [`action`] (request
//! parsing), [`lock`] and [`registry`] (the mutual-exclusion primitive and
//! its name-keyed map), [`reaper`] (idle-entry garbage collection), and
//! [`stats`] (request counters and the `.stats` payload).

pub mod action;
pub mod client;
pub mod constants;
pub mod error;
pub mod framer;
pub mod handlers;
pub mod lock;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod stats;

/// The default port the server listens on absent an explicit `--port`.
pub const DEFAULT_PORT: u16 = constants::DEFAULT_PORT;

/// Catch-all error for binary entry points and anything outside the typed
/// protocol errors in [`error::Error`].
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias mirroring the teacher's own `Result`.
pub type Result<T> = std::result::Result<T, Error>;
