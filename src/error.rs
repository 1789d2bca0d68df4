//! Error taxonomy (§7).

use thiserror::Error;

/// Errors the protocol engine can raise.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The underlying stream failed. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The grammar rejected a record; the bad line is logged and processing
    /// continues.
    #[error("protocol parse error at offset {offset}: {line:?}")]
    ProtocolParse { offset: usize, line: String },

    /// A required field was absent from an otherwise well-formed record.
    #[error("protocol shape error: command {command:?} missing field {field:?}")]
    ProtocolShape {
        command: &'static str,
        field: &'static str,
    },

    /// A `^error` result record.
    #[error("debugger error: {msg}")]
    Debugger { msg: String, code: Option<String> },

    /// A result record carried a token with no matching pending command.
    #[error("unexpected result for token {token}")]
    UnexpectedResult { token: u64 },

    /// `^exit` was received; the session is now terminal.
    #[error("session ended")]
    SessionEnded,

    /// The session was ended locally while a command was outstanding.
    #[error("session closed")]
    SessionClosed,

    /// No result arrived for a command within its configured timeout.
    #[error("command timed out after {0}s")]
    Timeout(u64),

    /// Invalid arguments were supplied to a façade operation; never reaches
    /// the wire.
    #[error("encoder error: {0}")]
    Encoder(String),
}

pub type Result<T> = std::result::Result<T, Error>;
