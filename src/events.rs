//! Typed events the dispatcher hands to subscribers (§3 "Typed Event", §6
//! "Event names").
//!
//! The source layers `TargetStoppedNotify` → `BreakpointHitNotify` / ... by
//! inheritance; here that's one sum type keyed by stop reason, with a
//! shared envelope plus a reason-specific payload (§9).

use crate::types::StackFrame;
use crate::value::Tuple;

/// Stable identifiers for event names — not UI strings (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum EventName {
    ThreadGroupAdded,
    ThreadGroupRemoved,
    ThreadGroupStarted,
    ThreadGroupExited,
    ThreadCreated,
    ThreadExited,
    ThreadSelected,
    LibraryLoaded,
    LibraryUnloaded,
    ConsoleOutput,
    TargetOutput,
    LogOutput,
    TargetRunning,
    TargetStopped,
    BreakpointHit,
    StepFinished,
    StepOutFinished,
    SignalReceived,
    ExceptionReceived,
    /// Catch-all for async/notify classes the dispatcher doesn't recognize.
    Other,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::ThreadGroupAdded => "thdgrpadd",
            EventName::ThreadGroupRemoved => "thdgrprem",
            EventName::ThreadGroupStarted => "thdgrpstart",
            EventName::ThreadGroupExited => "thdgrpexit",
            EventName::ThreadCreated => "thdcreate",
            EventName::ThreadExited => "thdexit",
            EventName::ThreadSelected => "thdselect",
            EventName::LibraryLoaded => "libload",
            EventName::LibraryUnloaded => "libunload",
            EventName::ConsoleOutput => "conout",
            EventName::TargetOutput => "targetout",
            EventName::LogOutput => "dbgout",
            EventName::TargetRunning => "targetrun",
            EventName::TargetStopped => "targetstop",
            EventName::BreakpointHit => "brkpthit",
            EventName::StepFinished => "endstep",
            EventName::StepOutFinished => "endfunc",
            EventName::SignalReceived => "signal",
            EventName::ExceptionReceived => "exception",
            EventName::Other => "other",
        }
    }
}

/// Why the target stopped. Unrecognized reasons map to `Unrecognized` —
/// `TargetStopped` still fires, but no specialized event is emitted for
/// them (§4.5).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum StopReason {
    BreakpointHit,
    WatchpointTrigger,
    ReadWatchpointTrigger,
    AccessWatchpointTrigger,
    FunctionFinished,
    LocationReached,
    WatchpointScope,
    EndSteppingRange,
    ExitedSignalled,
    Exited,
    ExitedNormally,
    SignalReceived,
    SolibEvent,
    Fork,
    Vfork,
    SyscallEntry,
    SyscallReturn,
    Exec,
    NoHistory,
    ExceptionReceived,
    Unrecognized(String),
}

impl StopReason {
    pub fn parse(s: &str) -> Self {
        match s {
            "breakpoint-hit" => StopReason::BreakpointHit,
            "watchpoint-trigger" => StopReason::WatchpointTrigger,
            "read-watchpoint-trigger" => StopReason::ReadWatchpointTrigger,
            "access-watchpoint-trigger" => StopReason::AccessWatchpointTrigger,
            "function-finished" => StopReason::FunctionFinished,
            "location-reached" => StopReason::LocationReached,
            "watchpoint-scope" => StopReason::WatchpointScope,
            "end-stepping-range" => StopReason::EndSteppingRange,
            "exited-signalled" => StopReason::ExitedSignalled,
            "exited" => StopReason::Exited,
            "exited-normally" => StopReason::ExitedNormally,
            "signal-received" => StopReason::SignalReceived,
            "solib-event" => StopReason::SolibEvent,
            "fork" => StopReason::Fork,
            "vfork" => StopReason::Vfork,
            "syscall-entry" => StopReason::SyscallEntry,
            "syscall-return" => StopReason::SyscallReturn,
            "exec" => StopReason::Exec,
            "no-history" => StopReason::NoHistory,
            "exception-received" => StopReason::ExceptionReceived,
            other => StopReason::Unrecognized(other.to_string()),
        }
    }
}

/// The envelope shared by every stop-derived event (§9).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoppedEnvelope {
    pub reason: StopReason,
    pub thread_id: Option<u64>,
    /// "all", a single thread id, or a parsed list of ids — see Open
    /// Questions in DESIGN.md for the ambiguous-format handling.
    pub stopped_threads: StoppedThreads,
    pub processor_core: Option<String>,
    pub frame: Option<StackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum StoppedThreads {
    All,
    Ids(Vec<u64>),
    Unknown(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub enum EventPayload {
    ThreadGroupAdded { id: String },
    ThreadGroupRemoved { id: String },
    ThreadGroupStarted { id: String, pid: Option<String> },
    ThreadGroupExited { id: String, exit_code: Option<String> },
    ThreadCreated { id: u64, group_id: String },
    ThreadExited { id: u64, group_id: String },
    ThreadSelected { id: u64 },
    LibraryLoaded { id: String, target_name: Option<String>, host_name: Option<String> },
    LibraryUnloaded { id: String, target_name: Option<String> },
    ConsoleOutput(String),
    TargetOutput(String),
    LogOutput(String),
    TargetRunning { thread_id: Option<String> },
    TargetStopped(StoppedEnvelope),
    BreakpointHit { breakpoint_id: Option<u64>, envelope: StoppedEnvelope },
    StepFinished { envelope: StoppedEnvelope },
    StepOutFinished { envelope: StoppedEnvelope },
    SignalReceived { signal_name: Option<String>, signal_meaning: Option<String>, envelope: StoppedEnvelope },
    ExceptionReceived { exception: Option<String>, envelope: StoppedEnvelope },
    /// An async/notify record whose class the dispatcher didn't recognize;
    /// the façade decides whether to surface or log it (§4.1).
    Other { class: String, data: Tuple },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Event {
    pub name: EventName,
    pub payload: EventPayload,
}
