//! The event dispatcher (§4.5): turns async/stream records into typed
//! [`Event`]s and fans them out to subscribers in registration order.
//!
//! Grounded in katori's `GdbEventHandler` (a `Vec` of boxed callbacks invoked
//! in order); generalized to per-[`EventName`] subscriber lists and to the
//! stop-reason fan-out of §9 (one `TargetStopped` plus a specialized event
//! for recognized reasons).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use tracing::{error, warn};

use crate::events::{Event, EventName, EventPayload, StopReason, StoppedEnvelope, StoppedThreads};
use crate::record::{AsyncKind, Record, StreamKind};
use crate::types::StackFrame;
use crate::value::Tuple;

pub type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// Owns the subscriber table and turns records into events.
///
/// Subscription and dispatch both take `&self`: the table is behind a
/// [`Mutex`] so a session can be shared across the reader task and façade
/// callers without requiring `&mut` everywhere (§4.5).
#[derive(Default)]
pub struct Dispatcher {
    subscribers: Mutex<HashMap<EventName, Vec<Subscriber>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `name`. Subscribers for one name run in the
    /// order they were registered (§4.5).
    pub fn subscribe(&self, name: EventName, callback: Subscriber) {
        self.subscribers.lock().unwrap().entry(name).or_default().push(callback);
    }

    fn dispatch(&self, event: Event) {
        let subscribers = self.subscribers.lock().unwrap();
        let Some(list) = subscribers.get(&event.name) else {
            return;
        };
        for callback in list {
            // One subscriber panicking must not stop delivery to the rest
            // (§4.5: "a subscriber failure MUST NOT prevent delivery to
            // other subscribers").
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                error!(event = event.name.as_str(), "event subscriber panicked");
            }
        }
    }

    /// Feeds one parsed record through the dispatcher. Result records never
    /// produce events — those are the correlator's job — so only
    /// `Async`/`Stream` records do anything here.
    pub fn on_record(&self, record: &Record) {
        match record {
            Record::Async { kind, class, data, .. } => self.on_async(*kind, class, data),
            Record::Stream { kind, data } => self.on_stream(*kind, data),
            Record::Result { .. } | Record::Prompt => {}
        }
    }

    fn on_stream(&self, kind: StreamKind, data: &str) {
        let (name, payload) = match kind {
            StreamKind::Console => (EventName::ConsoleOutput, EventPayload::ConsoleOutput(data.to_string())),
            StreamKind::Target => (EventName::TargetOutput, EventPayload::TargetOutput(data.to_string())),
            StreamKind::Log => (EventName::LogOutput, EventPayload::LogOutput(data.to_string())),
        };
        self.dispatch(Event { name, payload });
    }

    fn on_async(&self, kind: AsyncKind, class: &str, data: &Tuple) {
        match (kind, class) {
            (_, "thread-group-added") => self.simple_id(EventName::ThreadGroupAdded, data, |id| {
                EventPayload::ThreadGroupAdded { id }
            }),
            (_, "thread-group-removed") => self.simple_id(EventName::ThreadGroupRemoved, data, |id| {
                EventPayload::ThreadGroupRemoved { id }
            }),
            (_, "thread-group-started") => {
                let id = str_field(data, "id");
                let pid = str_field_opt(data, "pid");
                self.dispatch(Event {
                    name: EventName::ThreadGroupStarted,
                    payload: EventPayload::ThreadGroupStarted { id, pid },
                });
            }
            (_, "thread-group-exited") => {
                let id = str_field(data, "id");
                let exit_code = str_field_opt(data, "exit-code");
                self.dispatch(Event {
                    name: EventName::ThreadGroupExited,
                    payload: EventPayload::ThreadGroupExited { id, exit_code },
                });
            }
            (_, "thread-created") => self.thread_event(EventName::ThreadCreated, data, |id, group_id| {
                EventPayload::ThreadCreated { id, group_id }
            }),
            (_, "thread-exited") => self.thread_event(EventName::ThreadExited, data, |id, group_id| {
                EventPayload::ThreadExited { id, group_id }
            }),
            (_, "thread-selected") => {
                if let Some(id) = u64_field(data, "id") {
                    self.dispatch(Event {
                        name: EventName::ThreadSelected,
                        payload: EventPayload::ThreadSelected { id },
                    });
                } else {
                    warn!("thread-selected notification missing id");
                }
            }
            (_, "library-loaded") => {
                let id = str_field(data, "id");
                let target_name = str_field_opt(data, "target-name");
                let host_name = str_field_opt(data, "host-name");
                self.dispatch(Event {
                    name: EventName::LibraryLoaded,
                    payload: EventPayload::LibraryLoaded { id, target_name, host_name },
                });
            }
            (_, "library-unloaded") => {
                let id = str_field(data, "id");
                let target_name = str_field_opt(data, "target-name");
                self.dispatch(Event {
                    name: EventName::LibraryUnloaded,
                    payload: EventPayload::LibraryUnloaded { id, target_name },
                });
            }
            (_, "running") => {
                let thread_id = str_field_opt(data, "thread-id");
                self.dispatch(Event {
                    name: EventName::TargetRunning,
                    payload: EventPayload::TargetRunning { thread_id },
                });
            }
            (_, "stopped") => self.on_stopped(data),
            (_, other) => {
                self.dispatch(Event {
                    name: EventName::Other,
                    payload: EventPayload::Other {
                        class: other.to_string(),
                        data: data.clone(),
                    },
                });
            }
        }
    }

    fn simple_id(&self, name: EventName, data: &Tuple, make: impl Fn(String) -> EventPayload) {
        self.dispatch(Event {
            name,
            payload: make(str_field(data, "id")),
        });
    }

    fn thread_event(&self, name: EventName, data: &Tuple, make: impl Fn(u64, String) -> EventPayload) {
        let Some(id) = u64_field(data, "id") else {
            warn!(event = name.as_str(), "thread event missing numeric id");
            return;
        };
        let group_id = str_field(data, "group-id");
        self.dispatch(Event {
            name,
            payload: make(id, group_id),
        });
    }

    /// Builds the shared [`StoppedEnvelope`] and fans it out as
    /// `TargetStopped` plus, for a recognized reason, one specialized event
    /// (§9's testable scenario: a breakpoint hit fires both).
    fn on_stopped(&self, data: &Tuple) {
        let reason = data
            .get("reason")
            .and_then(|v| v.as_const())
            .map(StopReason::parse)
            .unwrap_or(StopReason::Unrecognized(String::new()));
        let thread_id = u64_field(data, "thread-id");
        let stopped_threads = match data.get("stopped-threads").and_then(|v| v.as_const()) {
            Some("all") => StoppedThreads::All,
            Some(other) => other
                .parse::<u64>()
                .map(|id| StoppedThreads::Ids(vec![id]))
                .unwrap_or_else(|_| StoppedThreads::Unknown(other.to_string())),
            None => StoppedThreads::Unknown(String::new()),
        };
        let processor_core = str_field_opt(data, "core");
        let frame = data
            .opt_tuple("frame")
            .and_then(|t| StackFrame::from_tuple("exec-continue", t).ok());

        let envelope = StoppedEnvelope {
            reason: reason.clone(),
            thread_id,
            stopped_threads,
            processor_core,
            frame,
        };

        self.dispatch(Event {
            name: EventName::TargetStopped,
            payload: EventPayload::TargetStopped(envelope.clone()),
        });

        match reason {
            StopReason::BreakpointHit => {
                let breakpoint_id = u64_field(data, "bkptno");
                self.dispatch(Event {
                    name: EventName::BreakpointHit,
                    payload: EventPayload::BreakpointHit { breakpoint_id, envelope },
                });
            }
            StopReason::EndSteppingRange | StopReason::LocationReached => {
                self.dispatch(Event {
                    name: EventName::StepFinished,
                    payload: EventPayload::StepFinished { envelope },
                });
            }
            StopReason::FunctionFinished => {
                self.dispatch(Event {
                    name: EventName::StepOutFinished,
                    payload: EventPayload::StepOutFinished { envelope },
                });
            }
            StopReason::SignalReceived => {
                let signal_name = str_field_opt(data, "signal-name");
                let signal_meaning = str_field_opt(data, "signal-meaning");
                self.dispatch(Event {
                    name: EventName::SignalReceived,
                    payload: EventPayload::SignalReceived {
                        signal_name,
                        signal_meaning,
                        envelope,
                    },
                });
            }
            StopReason::ExceptionReceived => {
                let exception = str_field_opt(data, "exception");
                self.dispatch(Event {
                    name: EventName::ExceptionReceived,
                    payload: EventPayload::ExceptionReceived { exception, envelope },
                });
            }
            _ => {}
        }
    }
}

fn str_field(data: &Tuple, field: &str) -> String {
    data.get(field).and_then(|v| v.as_const()).unwrap_or_default().to_string()
}

fn str_field_opt(data: &Tuple, field: &str) -> Option<String> {
    data.get(field).and_then(|v| v.as_const()).map(str::to_string)
}

fn u64_field(data: &Tuple, field: &str) -> Option<u64> {
    data.get(field).and_then(|v| v.as_const()).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stopped_record(extra: Vec<(&str, &str)>) -> Record {
        let mut data = Tuple::new();
        for (k, v) in extra {
            data.push(k, Value::Const(v.to_string()));
        }
        Record::Async {
            token: None,
            kind: AsyncKind::Exec,
            class: "stopped".to_string(),
            data,
        }
    }

    #[test]
    fn breakpoint_hit_fires_both_generic_and_specific_events() {
        let dispatcher = Dispatcher::new();
        let stopped_count = Arc::new(AtomicUsize::new(0));
        let hit_count = Arc::new(AtomicUsize::new(0));
        {
            let c = stopped_count.clone();
            dispatcher.subscribe(
                EventName::TargetStopped,
                Box::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        {
            let c = hit_count.clone();
            dispatcher.subscribe(
                EventName::BreakpointHit,
                Box::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        let record = stopped_record(vec![
            ("reason", "breakpoint-hit"),
            ("bkptno", "3"),
            ("thread-id", "1"),
            ("stopped-threads", "all"),
        ]);
        dispatcher.on_record(&record);

        assert_eq!(stopped_count.load(Ordering::SeqCst), 1);
        assert_eq!(hit_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_panic_does_not_block_remaining_subscribers() {
        let dispatcher = Dispatcher::new();
        let ran = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(
            EventName::ConsoleOutput,
            Box::new(|_| panic!("boom")),
        );
        {
            let ran = ran.clone();
            dispatcher.subscribe(
                EventName::ConsoleOutput,
                Box::new(move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        let record = Record::Stream {
            kind: StreamKind::Console,
            data: "hello".to_string(),
        };
        dispatcher.on_record(&record);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unrecognized_stop_reason_only_fires_target_stopped() {
        let dispatcher = Dispatcher::new();
        let specific = Arc::new(AtomicUsize::new(0));
        {
            let c = specific.clone();
            dispatcher.subscribe(EventName::SignalReceived, Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let record = stopped_record(vec![("reason", "some-future-reason")]);
        dispatcher.on_record(&record);
        assert_eq!(specific.load(Ordering::SeqCst), 0);
    }
}
