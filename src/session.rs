//! The session façade (§4.7): one async method per MI operation, each
//! following validate → encode → issue → map into a domain type.
//!
//! Grounded in the teacher's `GDB` (owns the child process, a reader task,
//! and `execute()`), reworked so the reader task feeds both the correlator
//! and the dispatcher concurrently instead of blocking on a single
//! in-flight command (§9).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::command::{BreakpointLocation, Command, DisassembleMode, WatchMode};
use crate::config::Config;
use crate::correlator::{CommandResult, Correlator};
use crate::dispatcher::{Dispatcher, Subscriber};
use crate::error::Error;
use crate::events::EventName;
use crate::parser::parse_record;
use crate::reader::LineReader;
use crate::record::{Record, ResultClass};
use crate::transport::{ProcessHandle, ProcessTransport};
use crate::types::{Breakpoint, DetailLevel, Register, StackFrame, Thread, Variable, Watch, WatchFormat};
use crate::value::Tuple;

/// Where the session is in its lifecycle (§5). Transitions are driven by
/// the reader task observing `TargetRunning`/`TargetStopped` events and
/// `^exit`/disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Fresh = 0,
    Attached = 1,
    Running = 2,
    Stopped = 3,
    Exited = 4,
    Ended = 5,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Fresh,
            1 => SessionState::Attached,
            2 => SessionState::Running,
            3 => SessionState::Stopped,
            4 => SessionState::Exited,
            _ => SessionState::Ended,
        }
    }
}

struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        SharedState(AtomicU8::new(SessionState::Fresh as u8))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, s: SessionState) {
        self.0.store(s as u8, Ordering::Release);
    }
}

/// Drives the MI protocol over one debugger connection. Not `Clone`;
/// subscribe and issue operations through shared references — every
/// façade method takes `&self`.
pub struct Session {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    correlator: Arc<Correlator>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<SharedState>,
    command_timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl Session {
    /// Attaches to an already-open MI stream. `Session` only ever names
    /// `AsyncRead + AsyncWrite` here — concrete transports (like
    /// [`ProcessTransport`]) are the caller's concern.
    pub fn attach<R, W>(reader: R, writer: W, config: Config) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let correlator = Arc::new(Correlator::new());
        let dispatcher = Arc::new(Dispatcher::new());
        let state = Arc::new(SharedState::new());

        let reader_task = tokio::spawn(read_loop(
            LineReader::new(BufReader::new(reader)),
            correlator.clone(),
            dispatcher.clone(),
            state.clone(),
        ));

        Session {
            writer: Mutex::new(Box::new(writer)),
            correlator,
            dispatcher,
            state,
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            reader_task,
        }
    }

    /// Spawns the configured debugger and attaches to its stdio.
    pub async fn spawn(config: Config) -> Result<(Self, ProcessHandle), Error> {
        let transport = ProcessTransport::spawn(&config).await?;
        let (reader, writer, handle) = transport.into_parts();
        Ok((Session::attach(reader, writer, config), handle))
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn subscribe(&self, name: EventName, callback: Subscriber) {
        self.dispatcher.subscribe(name, callback);
    }

    async fn execute(&self, command: Command) -> Result<CommandResult, Error> {
        if matches!(self.state.get(), SessionState::Exited | SessionState::Ended) {
            return Err(Error::SessionClosed);
        }
        let token = self.correlator.next_token();
        let rx = self.correlator.issue(token).await;
        let line = command.encode(token);
        trace!(token, command = %line.trim_end(), "writing command");
        {
            let mut writer = self.writer.lock().await;
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            writer.flush().await.map_err(|e| Error::Transport(e.to_string()))?;
        }
        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => Err(Error::Timeout(self.command_timeout.as_secs())),
        }
    }

    pub async fn set_executable_file(&self, file: &str) -> Result<(), Error> {
        self.execute(Command::file_exec_and_symbols(file)).await?;
        self.state.set(SessionState::Attached);
        Ok(())
    }

    pub async fn add_breakpoint(
        &self,
        location: BreakpointLocation<'_>,
        temporary: bool,
    ) -> Result<Breakpoint, Error> {
        let result = self.execute(Command::break_insert(location, temporary)).await?;
        let bkpt = result.data.require(command_name::BREAK_INSERT, "bkpt")?.as_tuple().ok_or(
            Error::ProtocolShape {
                command: command_name::BREAK_INSERT,
                field: "bkpt",
            },
        )?;
        Breakpoint::from_tuple(command_name::BREAK_INSERT, bkpt)
    }

    pub async fn add_watchpoint(&self, expression: &str, mode: WatchMode) -> Result<Breakpoint, Error> {
        let result = self.execute(Command::break_watch(expression, mode)).await?;
        let bkpt = result
            .data
            .require(command_name::BREAK_WATCH, "wpt")?
            .as_tuple()
            .ok_or(Error::ProtocolShape {
                command: command_name::BREAK_WATCH,
                field: "wpt",
            })?;
        Breakpoint::from_tuple(command_name::BREAK_WATCH, bkpt)
    }

    pub async fn remove_breakpoint(&self, number: &str) -> Result<(), Error> {
        self.execute(Command::break_delete(&[number.to_string()])?).await?;
        Ok(())
    }

    pub async fn enable_breakpoint(&self, number: &str) -> Result<(), Error> {
        self.execute(Command::break_enable(&[number.to_string()])).await?;
        Ok(())
    }

    pub async fn disable_breakpoint(&self, number: &str) -> Result<(), Error> {
        self.execute(Command::break_disable(&[number.to_string()])).await?;
        Ok(())
    }

    pub async fn set_breakpoint_condition(&self, number: &str, condition: &str) -> Result<(), Error> {
        self.execute(Command::break_condition(number, condition)).await?;
        Ok(())
    }

    pub async fn set_breakpoint_ignore_count(&self, number: &str, count: u32) -> Result<(), Error> {
        self.execute(Command::break_after(number, count)).await?;
        Ok(())
    }

    pub async fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, Error> {
        let result = self.execute(Command::break_list()).await?;
        let table = result
            .data
            .opt_tuple("BreakpointTable")
            .ok_or(Error::ProtocolShape {
                command: command_name::BREAK_LIST,
                field: "BreakpointTable",
            })?;
        let body = table.get("body").and_then(|v| v.as_list());
        let Some(body) = body else { return Ok(Vec::new()) };
        let items: Vec<&Tuple> = match body.positional() {
            Some(values) => values.iter().filter_map(|v| v.as_tuple()).collect(),
            None => body.values_for("bkpt").filter_map(|v| v.as_tuple()).collect(),
        };
        items
            .into_iter()
            .map(|t| Breakpoint::from_tuple(command_name::BREAK_LIST, t))
            .collect()
    }

    pub async fn start_inferior(&self) -> Result<(), Error> {
        self.execute(Command::exec_run()).await?;
        Ok(())
    }

    pub async fn step_over_line(&self, thread: Option<u64>) -> Result<(), Error> {
        self.execute(Command::exec_next(thread)).await?;
        Ok(())
    }

    pub async fn step_into_line(&self, thread: Option<u64>) -> Result<(), Error> {
        self.execute(Command::exec_step(thread)).await?;
        Ok(())
    }

    pub async fn step_out_of_frame(&self, thread: Option<u64>) -> Result<(), Error> {
        self.execute(Command::exec_finish(thread)).await?;
        Ok(())
    }

    pub async fn finish_frame(&self, thread: Option<u64>) -> Result<(), Error> {
        self.step_out_of_frame(thread).await
    }

    pub async fn continue_all(&self, thread: Option<u64>) -> Result<(), Error> {
        self.execute(Command::exec_continue(thread)).await?;
        Ok(())
    }

    /// Signals the inferior directly; unlike the other exec operations this
    /// bypasses the correlator, since `SIGINT` has no MI result of its own.
    /// Only meaningful for a [`ProcessHandle`]-backed session — a caller
    /// using a custom transport handles interruption on its own side.
    pub fn interrupt_inferior(&self, process: &ProcessHandle) -> Result<(), Error> {
        process.interrupt()
    }

    pub async fn until_location(&self, location: Option<&str>) -> Result<(), Error> {
        self.execute(Command::exec_until(location)).await?;
        Ok(())
    }

    pub async fn set_exec_arguments(&self, args: &[String]) -> Result<(), Error> {
        self.execute(Command::exec_arguments(args)).await?;
        Ok(())
    }

    pub async fn add_watch(
        &self,
        name: Option<&str>,
        expression: &str,
        frame_addr: Option<u64>,
    ) -> Result<Watch, Error> {
        let result = self.execute(Command::var_create(name, expression, frame_addr)).await?;
        Watch::from_tuple(command_name::VAR_CREATE, expression, &result.data, frame_addr.is_none())
    }

    pub async fn remove_watch(&self, name: &str) -> Result<(), Error> {
        self.execute(Command::var_delete(name)).await?;
        Ok(())
    }

    pub async fn update_watch(&self, name: &str) -> Result<Tuple, Error> {
        Ok(self.execute(Command::var_update(name)).await?.data)
    }

    pub async fn get_watch_children(&self, name: &str, detail: DetailLevel) -> Result<Vec<Variable>, Error> {
        let result = self.execute(Command::var_list_children(name, detail)).await?;
        let children = result.data.get("children").and_then(|v| v.as_list());
        let Some(children) = children else { return Ok(Vec::new()) };
        Ok(children
            .values_for("child")
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| Variable::from_tuple(command_name::VAR_LIST_CHILDREN, t).ok())
            .collect())
    }

    pub async fn get_watch_value(&self, name: &str) -> Result<String, Error> {
        let result = self.execute(Command::var_evaluate_expression(name)).await?;
        Ok(result
            .data
            .require_str(command_name::VAR_EVALUATE_EXPRESSION, "value")?
            .to_string())
    }

    pub async fn set_watch_value(&self, name: &str, value: &str) -> Result<(), Error> {
        self.execute(Command::var_assign(name, value)).await?;
        Ok(())
    }

    pub async fn set_watch_value_format(&self, name: &str, format: WatchFormat) -> Result<(), Error> {
        self.execute(Command::var_set_format(name, format)).await?;
        Ok(())
    }

    pub async fn get_watch_attributes(&self, name: &str) -> Result<String, Error> {
        let result = self.execute(Command::var_show_attributes(name)).await?;
        Ok(result
            .data
            .require_str(command_name::VAR_SHOW_ATTRIBUTES, "attr")?
            .to_string())
    }

    pub async fn get_watch_expression(&self, name: &str) -> Result<String, Error> {
        let result = self.execute(Command::var_info_expression(name)).await?;
        Ok(result
            .data
            .require_str(command_name::VAR_INFO_EXPRESSION, "exp")?
            .to_string())
    }

    pub async fn read_memory(&self, address: &str, offset: i64, count: usize) -> Result<Vec<u8>, Error> {
        let result = self.execute(Command::data_read_memory_bytes(address, offset, count)).await?;
        let memory = result.data.get("memory").and_then(|v| v.as_list());
        let Some(memory) = memory else { return Ok(Vec::new()) };
        let chunk = memory.positional().and_then(|v| v.first()).and_then(|v| v.as_tuple());
        let Some(chunk) = chunk else { return Ok(Vec::new()) };
        let contents = chunk.require_str(command_name::DATA_READ_MEMORY_BYTES, "contents")?;
        decode_hex(contents)
    }

    pub async fn disassemble(&self, start: u64, end: u64, mode: DisassembleMode) -> Result<Tuple, Error> {
        Ok(self.execute(Command::data_disassemble_address(start, end, mode)).await?.data)
    }

    pub async fn get_stack_frame(&self) -> Result<StackFrame, Error> {
        let result = self.execute(Command::stack_info_frame()).await?;
        let frame = result
            .data
            .require(command_name::STACK_INFO_FRAME, "frame")?
            .as_tuple()
            .ok_or(Error::ProtocolShape {
                command: command_name::STACK_INFO_FRAME,
                field: "frame",
            })?;
        StackFrame::from_tuple(command_name::STACK_INFO_FRAME, frame)
    }

    pub async fn get_stack_frames(&self, low: Option<usize>, high: Option<usize>) -> Result<Vec<StackFrame>, Error> {
        let result = self.execute(Command::stack_list_frames(low, high)).await?;
        let stack = result.data.get("stack").and_then(|v| v.as_list());
        let Some(stack) = stack else { return Ok(Vec::new()) };
        Ok(stack
            .values_for("frame")
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| StackFrame::from_tuple(command_name::STACK_LIST_FRAMES, t).ok())
            .collect())
    }

    pub async fn get_stack_depth(&self) -> Result<u32, Error> {
        let result = self.execute(Command::stack_info_depth()).await?;
        result
            .data
            .require_str(command_name::STACK_INFO_DEPTH, "depth")?
            .parse()
            .map_err(|_| Error::ProtocolShape {
                command: command_name::STACK_INFO_DEPTH,
                field: "depth",
            })
    }

    pub async fn get_stack_frame_args(
        &self,
        detail: DetailLevel,
        low: Option<usize>,
        high: Option<usize>,
    ) -> Result<Vec<StackFrame>, Error> {
        let result = self.execute(Command::stack_list_arguments(detail, low, high)).await?;
        let frames = result.data.get("stack-args").and_then(|v| v.as_list());
        let Some(frames) = frames else { return Ok(Vec::new()) };
        Ok(frames
            .values_for("frame")
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| StackFrame::from_tuple(command_name::STACK_LIST_ARGUMENTS, t).ok())
            .collect())
    }

    pub async fn get_stack_frame_variables(
        &self,
        thread: Option<u64>,
        frame: Option<u64>,
        detail: DetailLevel,
    ) -> Result<Vec<Variable>, Error> {
        let result = self.execute(Command::stack_list_variables(thread, frame, detail)).await?;
        let variables = result.data.get("variables").and_then(|v| v.as_list());
        let Some(variables) = variables else { return Ok(Vec::new()) };
        Ok(variables
            .values_for("variable")
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| Variable::from_tuple(command_name::STACK_LIST_VARIABLES, t).ok())
            .collect())
    }

    pub async fn get_register_names(&self, registers: &[u32]) -> Result<Vec<String>, Error> {
        let result = self.execute(Command::data_list_register_names(registers)).await?;
        let names = result.data.get("register-names").and_then(|v| v.as_list());
        let Some(names) = names else { return Ok(Vec::new()) };
        Ok(names
            .positional()
            .unwrap_or(&[])
            .iter()
            .filter_map(|v| v.as_const().map(str::to_string))
            .collect())
    }

    pub async fn get_register_values(&self, format: &str, registers: &[u32]) -> Result<Vec<Register>, Error> {
        let result = self.execute(Command::data_list_register_values(format, registers)).await?;
        let values = result.data.get("register-values").and_then(|v| v.as_list());
        let Some(values) = values else { return Ok(Vec::new()) };
        Ok(values
            .positional()
            .unwrap_or(&[])
            .iter()
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| Register::from_tuple(command_name::DATA_LIST_REGISTER_VALUES, t).ok())
            .collect())
    }

    pub async fn list_threads(&self) -> Result<Vec<Thread>, Error> {
        let result = self.execute(Command::thread_info(None)).await?;
        let threads = result.data.get("threads").and_then(|v| v.as_list());
        let Some(threads) = threads else { return Ok(Vec::new()) };
        Ok(threads
            .positional()
            .unwrap_or(&[])
            .iter()
            .filter_map(|v| v.as_tuple())
            .filter_map(|t| Thread::from_tuple(command_name::THREAD_INFO, t).ok())
            .collect())
    }

    pub async fn select_thread(&self, thread_id: u64) -> Result<(), Error> {
        self.execute(Command::thread_select(thread_id)).await?;
        Ok(())
    }

    pub async fn select_frame(&self, frame: u64) -> Result<(), Error> {
        self.execute(Command::stack_select_frame(frame)).await?;
        Ok(())
    }

    pub async fn evaluate_expression(&self, expression: &str) -> Result<String, Error> {
        let result = self.execute(Command::data_evaluate_expression(expression)).await?;
        Ok(result
            .data
            .require_str(command_name::DATA_EVALUATE_EXPRESSION, "value")?
            .to_string())
    }

    pub async fn console_exec(&self, raw_command: &str) -> Result<(), Error> {
        self.execute(Command::console_exec(raw_command)).await?;
        Ok(())
    }

    /// Ends the session: issues `-gdb-exit`, drains pending commands, and
    /// stops the reader task. Idempotent only in the sense that a second
    /// call sees `SessionClosed` from `execute`.
    pub async fn end(&self) -> Result<(), Error> {
        let outcome = self.execute(Command::gdb_exit()).await;
        self.state.set(SessionState::Ended);
        self.correlator.on_disconnect(Error::SessionEnded).await;
        match outcome {
            Ok(_) | Err(Error::SessionEnded) | Err(Error::SessionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, Error> {
    if s.len() % 2 != 0 {
        return Err(Error::ProtocolShape {
            command: command_name::DATA_READ_MEMORY_BYTES,
            field: "contents",
        });
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| Error::ProtocolShape {
                command: command_name::DATA_READ_MEMORY_BYTES,
                field: "contents",
            })
        })
        .collect()
}

/// Reads lines off the transport until EOF, routing each parsed record to
/// the correlator (result records) and the dispatcher (everything else),
/// and updating session state from the stream it observes (§5, §9).
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: LineReader<BufReader<R>>,
    correlator: Arc<Correlator>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<SharedState>,
) {
    loop {
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("transport reached EOF");
                break;
            }
            Err(e) => {
                warn!(error = %e, "transport read failed");
                break;
            }
        };

        let record = match parse_record(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, line = %line, "dropping malformed record");
                continue;
            }
        };

        match &record {
            Record::Result {
                class: ResultClass::Exit, ..
            } => {
                state.set(SessionState::Exited);
                let _ = correlator.on_result(&record).await;
                correlator.on_disconnect(Error::SessionEnded).await;
                continue;
            }
            Record::Async { class, .. } if class == "running" => {
                state.set(SessionState::Running);
            }
            Record::Async { class, .. } if class == "stopped" => {
                state.set(SessionState::Stopped);
            }
            _ => {}
        }

        if let Err(e) = correlator.on_result(&record).await {
            warn!(error = %e, "result record had no pending command");
        }
        dispatcher.on_record(&record);
    }

    correlator.on_disconnect(Error::Transport("transport closed".to_string())).await;
    state.set(SessionState::Ended);
}

mod command_name {
    pub const BREAK_INSERT: &str = "break-insert";
    pub const BREAK_WATCH: &str = "break-watch";
    pub const BREAK_LIST: &str = "break-list";
    pub const VAR_CREATE: &str = "var-create";
    pub const VAR_LIST_CHILDREN: &str = "var-list-children";
    pub const VAR_EVALUATE_EXPRESSION: &str = "var-evaluate-expression";
    pub const VAR_SHOW_ATTRIBUTES: &str = "var-show-attributes";
    pub const VAR_INFO_EXPRESSION: &str = "var-info-expression";
    pub const DATA_READ_MEMORY_BYTES: &str = "data-read-memory-bytes";
    pub const STACK_INFO_FRAME: &str = "stack-info-frame";
    pub const STACK_LIST_FRAMES: &str = "stack-list-frames";
    pub const STACK_INFO_DEPTH: &str = "stack-info-depth";
    pub const STACK_LIST_ARGUMENTS: &str = "stack-list-arguments";
    pub const STACK_LIST_VARIABLES: &str = "stack-list-variables";
    pub const DATA_LIST_REGISTER_VALUES: &str = "data-list-register-values";
    pub const THREAD_INFO: &str = "thread-info";
    pub const DATA_EVALUATE_EXPRESSION: &str = "data-evaluate-expression";
}
