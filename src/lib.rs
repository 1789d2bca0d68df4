//! A GDB/LLDB Machine Interface (MI) protocol engine: a grammar-driven
//! parser, a request/response correlator, a typed event dispatcher, a
//! command encoder, and a session façade with one method per MI operation.
//!
//! Spawning the debugger process, a CLI around this library, and loading
//! its own configuration from files are a consuming application's job —
//! see [`transport::ProcessTransport`] for the one concrete transport this
//! crate ships, and [`config::Config`] for the env-var surface it reads.

pub mod command;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod parser;
pub mod reader;
pub mod record;
pub mod session;
pub mod transport;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use session::{Session, SessionState};
