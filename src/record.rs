//! Typed MI records (§3 "MI Record"), produced by the parser driver.

use crate::value::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultClass::Done => "done",
            ResultClass::Running => "running",
            ResultClass::Connected => "connected",
            ResultClass::Error => "error",
            ResultClass::Exit => "exit",
        }
    }
}

/// `*` (exec), `+` (status), `=` (notify) — the spec keeps these as three
/// sibling record shapes (`AsyncExec`/`AsyncStatus`/`AsyncNotify`); we fold
/// them into one `Record::Async` carrying a `kind` tag instead of
/// triplicating the variant, recorded as an Open Question decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AsyncKind {
    Exec,
    Status,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StreamKind {
    Console,
    Target,
    Log,
}

/// One parsed line of MI output.
#[derive(Debug, Clone, serde::Serialize)]
pub enum Record {
    Result {
        token: Option<u64>,
        class: ResultClass,
        data: Tuple,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        data: Tuple,
    },
    Stream {
        kind: StreamKind,
        data: String,
    },
    /// The `(gdb)` line: terminates a batch, carries no data.
    Prompt,
}

impl Record {
    pub fn token(&self) -> Option<u64> {
        match self {
            Record::Result { token, .. } => *token,
            Record::Async { token, .. } => *token,
            Record::Stream { .. } | Record::Prompt => None,
        }
    }
}
