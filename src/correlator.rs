//! The request/response correlator (§4.4): assigns each outgoing command a
//! token and resolves it exactly once against the matching result record.
//!
//! Grounded in the teacher's `GDB::execute` (single in-flight command,
//! blocking on the next result) but reworked per §9's redesign note into a
//! genuine concurrent token→handle map, following the pending-request
//! pattern in the pack's DAP client (`AtomicU64` counter + a channel per
//! outstanding request instead of one shared slot).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::error::Error;
use crate::record::{Record, ResultClass};
use crate::value::Tuple;

/// The outcome of a command: the debugger's own verdict plus its payload.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub class: ResultClass,
    pub data: Tuple,
}

type Pending = oneshot::Sender<Result<CommandResult, Error>>;

/// Tracks outstanding commands by token and resolves each exactly once.
pub struct Correlator {
    next_token: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Correlator {
            next_token: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves the next token, monotonically increasing and unique for the
    /// lifetime of the session (§3 "Token").
    pub fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers `token` as outstanding and returns the receiving half; the
    /// caller sends the encoded command only after this returns, so a
    /// result racing the write can never arrive unmatched.
    pub async fn issue(self: &Arc<Self>, token: u64) -> oneshot::Receiver<Result<CommandResult, Error>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(token, tx);
        rx
    }

    /// Feeds one parsed result record to the correlator. Returns `Ok(true)`
    /// if the token matched a pending command (now resolved), `Ok(false)` if
    /// the record wasn't a result at all, and `Err(UnexpectedResult)` if it
    /// was a result whose token had no pending entry (§8: "a result record
    /// with an unknown token is reported, not silently dropped").
    pub async fn on_result(&self, record: &Record) -> Result<bool, Error> {
        let Record::Result { token, class, data } = record else {
            return Ok(false);
        };
        let Some(token) = token else {
            // A result record with no token can't be correlated to anything;
            // the dispatcher surfaces it as an event rather than a reply.
            return Ok(false);
        };
        let sender = self.pending.lock().await.remove(token);
        let Some(sender) = sender else {
            return Err(Error::UnexpectedResult { token: *token });
        };
        let outcome = match class {
            ResultClass::Error => {
                let msg = data
                    .get("msg")
                    .and_then(|v| v.as_const())
                    .unwrap_or("unknown debugger error")
                    .to_string();
                let code = data.get("code").and_then(|v| v.as_const()).map(str::to_string);
                Err(Error::Debugger { msg, code })
            }
            _ => Ok(CommandResult {
                class: *class,
                data: data.clone(),
            }),
        };
        // A dropped receiver (the caller gave up waiting) is not our problem.
        let _ = sender.send(outcome);
        Ok(true)
    }

    /// Resolves every pending command with `err` — called when the
    /// transport drops or `^exit` arrives, so no waiter hangs forever
    /// (§8: "no command receiver stays unresolved past session end").
    pub async fn on_disconnect(&self, err: Error) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(err.clone()));
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tuple;

    #[tokio::test]
    async fn resolves_matching_token_exactly_once() {
        let correlator = Arc::new(Correlator::new());
        let token = correlator.next_token();
        let rx = correlator.issue(token).await;

        let record = Record::Result {
            token: Some(token),
            class: ResultClass::Done,
            data: Tuple::new(),
        };
        assert!(correlator.on_result(&record).await.unwrap());
        let outcome = rx.await.unwrap().unwrap();
        assert_eq!(outcome.class, ResultClass::Done);
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_token_is_an_error_not_silently_dropped() {
        let correlator = Correlator::new();
        let record = Record::Result {
            token: Some(99),
            class: ResultClass::Done,
            data: Tuple::new(),
        };
        match correlator.on_result(&record).await {
            Err(Error::UnexpectedResult { token }) => assert_eq!(token, 99),
            other => panic!("expected UnexpectedResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_result_surfaces_as_debugger_error() {
        let correlator = Arc::new(Correlator::new());
        let token = correlator.next_token();
        let rx = correlator.issue(token).await;
        let mut data = Tuple::new();
        data.push("msg", crate::value::Value::Const("Undefined command".into()));
        let record = Record::Result {
            token: Some(token),
            class: ResultClass::Error,
            data,
        };
        correlator.on_result(&record).await.unwrap();
        match rx.await.unwrap() {
            Err(Error::Debugger { msg, .. }) => assert_eq!(msg, "Undefined command"),
            other => panic!("expected Debugger error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn interleaved_tokens_each_resolve_to_their_own_receiver() {
        let correlator = Arc::new(Correlator::new());
        let t1 = correlator.next_token();
        let t2 = correlator.next_token();
        let rx1 = correlator.issue(t1).await;
        let rx2 = correlator.issue(t2).await;

        // second command's result arrives first
        correlator
            .on_result(&Record::Result {
                token: Some(t2),
                class: ResultClass::Done,
                data: Tuple::new(),
            })
            .await
            .unwrap();
        correlator
            .on_result(&Record::Result {
                token: Some(t1),
                class: ResultClass::Done,
                data: Tuple::new(),
            })
            .await
            .unwrap();

        assert!(rx1.await.unwrap().is_ok());
        assert!(rx2.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn disconnect_resolves_all_pending_with_error() {
        let correlator = Arc::new(Correlator::new());
        let token = correlator.next_token();
        let rx = correlator.issue(token).await;
        correlator.on_disconnect(Error::SessionClosed).await;
        match rx.await.unwrap() {
            Err(Error::SessionClosed) => {}
            other => panic!("expected SessionClosed, got {other:?}"),
        }
    }
}
