//! The command encoder (§4.6): builds one well-formed MI command line per
//! invocation, with quoting. Grounded in the teacher's `mi::commands`
//! (`MiCommand`, `escape_command`, per-operation builders), generalized to
//! the full façade operation set and to explicit thread/frame/format/detail
//! options instead of ad hoc option vectors.

use std::fmt::Write as _;

use crate::error::Error;
use crate::types::DetailLevel;

/// True if `s` needs C-string quoting: any character outside
/// `[A-Za-z0-9_./-]` forces quoting (§4.6).
fn needs_quoting(s: &str) -> bool {
    !s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.'))
}

/// Quotes `s` as a C-string, escaping `\` and `"`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Quotes `s` only if it contains characters that require it; otherwise
/// passes it through unquoted (§4.6's "missing optional arguments MUST be
/// omitted rather than sent as empty strings" sibling rule: don't quote
/// what doesn't need it).
pub fn quote_if_needed(s: &str) -> String {
    if needs_quoting(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

/// A fully-built MI command, ready to be prefixed with a token and
/// written to the wire.
#[derive(Debug, Clone, Default)]
pub struct Command {
    operation: &'static str,
    options: Vec<String>,
    positional: Vec<String>,
}

impl Command {
    pub fn new(operation: &'static str) -> Self {
        Command {
            operation,
            options: Vec::new(),
            positional: Vec::new(),
        }
    }

    pub fn option(mut self, flag: &'static str) -> Self {
        self.options.push(flag.to_string());
        self
    }

    pub fn option_value(mut self, flag: &'static str, value: impl Into<String>) -> Self {
        self.options.push(flag.to_string());
        self.options.push(value.into());
        self
    }

    pub fn opt_option_value(self, flag: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.option_value(flag, v),
            None => self,
        }
    }

    pub fn positional(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn thread_frame(self, thread: Option<u64>, frame: Option<u64>) -> Self {
        self.opt_option_value("--thread", thread.map(|t| t.to_string()))
            .opt_option_value("--frame", frame.map(|f| f.to_string()))
    }

    pub fn detail_level(self, detail: Option<DetailLevel>) -> Self {
        match detail {
            Some(d) => self.option(d.as_flag()),
            None => self,
        }
    }

    /// Render the wire line, e.g. `1-break-insert main\n`. `token` is the
    /// correlator-assigned id; an empty operation (`console_exec`'s
    /// underlying `interpreter-exec`) still gets prefixed like any other.
    pub fn encode(&self, token: u64) -> String {
        let mut line = String::new();
        let _ = write!(line, "{}-{}", token, self.operation);
        for opt in &self.options {
            line.push(' ');
            line.push_str(opt);
        }
        if !self.positional.is_empty() {
            line.push_str(" --");
            for p in &self.positional {
                line.push(' ');
                line.push_str(p);
            }
        }
        line.push('\n');
        line
    }
}

pub enum DisassembleMode {
    DisassemblyOnly,
    DisassemblyWithRawOpcodes,
    MixedSourceAndDisassembly,
    MixedSourceAndDisassemblyWithRawOpcodes,
}

impl DisassembleMode {
    fn as_code(&self) -> &'static str {
        match self {
            DisassembleMode::DisassemblyOnly => "0",
            DisassembleMode::MixedSourceAndDisassembly => "1",
            DisassembleMode::DisassemblyWithRawOpcodes => "2",
            DisassembleMode::MixedSourceAndDisassemblyWithRawOpcodes => "3",
        }
    }
}

pub enum WatchMode {
    Read,
    Write,
    Access,
}

pub enum BreakpointLocation<'a> {
    Address(u64),
    Function { file: &'a str, function: &'a str },
    Line { file: &'a str, line: u32 },
}

/// Builders for every façade operation's command line (§4.7). Each method
/// is the encoder's canonical encoding for that operation; arguments it
/// doesn't recognize are a compile error, not a silently dropped option.
impl Command {
    pub fn file_exec_and_symbols(file: &str) -> Self {
        Command::new("file-exec-and-symbols").positional(quote_if_needed(file))
    }

    pub fn break_insert(location: BreakpointLocation<'_>, temporary: bool) -> Self {
        let mut cmd = Command::new("break-insert");
        if temporary {
            cmd = cmd.option("-t");
        }
        let loc = match location {
            BreakpointLocation::Address(addr) => format!("*0x{addr:x}"),
            BreakpointLocation::Function { file, function } => format!("{file}:{function}"),
            BreakpointLocation::Line { file, line } => format!("{file}:{line}"),
        };
        cmd.positional(loc)
    }

    pub fn break_watch(expression: &str, mode: WatchMode) -> Self {
        let cmd = match mode {
            WatchMode::Write => Command::new("break-watch"),
            WatchMode::Read => Command::new("break-watch").option("-r"),
            WatchMode::Access => Command::new("break-watch").option("-a"),
        };
        cmd.positional(quote_if_needed(expression))
    }

    pub fn break_delete(numbers: &[String]) -> Result<Self, Error> {
        if numbers.is_empty() {
            return Err(Error::Encoder("break-delete requires at least one breakpoint number".into()));
        }
        let mut cmd = Command::new("break-delete");
        for n in numbers {
            cmd = cmd.positional(n.clone());
        }
        Ok(cmd)
    }

    pub fn break_enable(numbers: &[String]) -> Self {
        numbers.iter().fold(Command::new("break-enable"), |c, n| c.positional(n.clone()))
    }

    pub fn break_disable(numbers: &[String]) -> Self {
        numbers.iter().fold(Command::new("break-disable"), |c, n| c.positional(n.clone()))
    }

    pub fn break_condition(number: &str, condition: &str) -> Self {
        Command::new("break-condition")
            .positional(number.to_string())
            .positional(quote_if_needed(condition))
    }

    pub fn break_after(number: &str, ignore_count: u32) -> Self {
        Command::new("break-after")
            .positional(number.to_string())
            .positional(ignore_count.to_string())
    }

    pub fn break_list() -> Self {
        Command::new("break-list")
    }

    pub fn exec_run() -> Self {
        Command::new("exec-run")
    }

    pub fn exec_next(thread: Option<u64>) -> Self {
        Command::new("exec-next").thread_frame(thread, None)
    }

    pub fn exec_step(thread: Option<u64>) -> Self {
        Command::new("exec-step").thread_frame(thread, None)
    }

    pub fn exec_finish(thread: Option<u64>) -> Self {
        Command::new("exec-finish").thread_frame(thread, None)
    }

    pub fn exec_continue(thread: Option<u64>) -> Self {
        Command::new("exec-continue").thread_frame(thread, None)
    }

    pub fn exec_interrupt() -> Self {
        Command::new("exec-interrupt")
    }

    pub fn exec_until(location: Option<&str>) -> Self {
        match location {
            Some(loc) => Command::new("exec-until").positional(quote_if_needed(loc)),
            None => Command::new("exec-until"),
        }
    }

    pub fn exec_arguments(args: &[String]) -> Self {
        args.iter()
            .fold(Command::new("exec-arguments"), |c, a| c.positional(quote_if_needed(a)))
    }

    pub fn var_create(name: Option<&str>, expression: &str, frame_addr: Option<u64>) -> Self {
        Command::new("var-create")
            .positional(name.unwrap_or("-").to_string())
            .positional(match frame_addr {
                Some(addr) => format!("0x{addr:x}"),
                None => "*".to_string(),
            })
            .positional(quote_if_needed(expression))
    }

    pub fn var_delete(name: &str) -> Self {
        Command::new("var-delete").positional(name.to_string())
    }

    pub fn var_update(name: &str) -> Self {
        Command::new("var-update").positional(name.to_string())
    }

    pub fn var_list_children(name: &str, detail: DetailLevel) -> Self {
        Command::new("var-list-children")
            .option(detail.as_flag())
            .positional(name.to_string())
    }

    pub fn var_evaluate_expression(name: &str) -> Self {
        Command::new("var-evaluate-expression").positional(name.to_string())
    }

    pub fn var_assign(name: &str, value: &str) -> Self {
        Command::new("var-assign")
            .positional(name.to_string())
            .positional(quote_if_needed(value))
    }

    pub fn var_set_format(name: &str, format: crate::types::WatchFormat) -> Self {
        Command::new("var-set-format")
            .positional(name.to_string())
            .positional(format.as_str().to_string())
    }

    pub fn var_show_attributes(name: &str) -> Self {
        Command::new("var-show-attributes").positional(name.to_string())
    }

    pub fn var_info_expression(name: &str) -> Self {
        Command::new("var-info-expression").positional(name.to_string())
    }

    pub fn data_read_memory_bytes(address: &str, offset: i64, count: usize) -> Self {
        Command::new("data-read-memory-bytes")
            .opt_option_value("-o", if offset != 0 { Some(offset.to_string()) } else { None })
            .positional(address.to_string())
            .positional(count.to_string())
    }

    pub fn data_disassemble_address(start: u64, end: u64, mode: DisassembleMode) -> Self {
        Command::new("data-disassemble")
            .option_value("-s", format!("0x{start:x}"))
            .option_value("-e", format!("0x{end:x}"))
            .positional(mode.as_code().to_string())
    }

    /// `-stack-info-frame` reports the currently selected frame; select it
    /// first with [`Command::stack_select_frame`] or the `--frame` option on
    /// another command.
    pub fn stack_info_frame() -> Self {
        Command::new("stack-info-frame")
    }

    pub fn stack_list_frames(low: Option<usize>, high: Option<usize>) -> Self {
        let mut cmd = Command::new("stack-list-frames");
        if let (Some(low), Some(high)) = (low, high) {
            let (lo, hi) = if low > high { (high, low) } else { (low, high) };
            cmd = cmd.positional(lo.to_string()).positional(hi.to_string());
        }
        cmd
    }

    pub fn stack_info_depth() -> Self {
        Command::new("stack-info-depth")
    }

    pub fn stack_list_arguments(detail: DetailLevel, low: Option<usize>, high: Option<usize>) -> Self {
        let mut cmd = Command::new("stack-list-arguments").positional(detail.as_flag().to_string());
        if let (Some(low), Some(high)) = (low, high) {
            cmd = cmd.positional(low.to_string()).positional(high.to_string());
        }
        cmd
    }

    pub fn stack_list_variables(thread: Option<u64>, frame: Option<u64>, detail: DetailLevel) -> Self {
        Command::new("stack-list-variables")
            .thread_frame(thread, frame)
            .positional(detail.as_flag().to_string())
    }

    pub fn data_list_register_names(registers: &[u32]) -> Self {
        registers
            .iter()
            .fold(Command::new("data-list-register-names"), |c, r| c.positional(r.to_string()))
    }

    pub fn data_list_register_values(format: &str, registers: &[u32]) -> Self {
        registers
            .iter()
            .fold(Command::new("data-list-register-values").positional(format.to_string()), |c, r| {
                c.positional(r.to_string())
            })
    }

    pub fn thread_info(thread_id: Option<u64>) -> Self {
        match thread_id {
            Some(id) => Command::new("thread-info").positional(id.to_string()),
            None => Command::new("thread-info"),
        }
    }

    pub fn thread_select(thread_id: u64) -> Self {
        Command::new("thread-select").positional(thread_id.to_string())
    }

    pub fn stack_select_frame(frame: u64) -> Self {
        Command::new("stack-select-frame").positional(frame.to_string())
    }

    pub fn data_evaluate_expression(expression: &str) -> Self {
        Command::new("data-evaluate-expression").positional(quote_if_needed(expression))
    }

    pub fn console_exec(raw_command: &str) -> Self {
        Command::new("interpreter-exec")
            .positional("console".to_string())
            .positional(quote(raw_command))
    }

    pub fn gdb_exit() -> Self {
        Command::new("gdb-exit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote_if_needed("main.c"), "main.c");
        assert_eq!(quote_if_needed("a b"), "\"a b\"");
    }

    #[test]
    fn encodes_token_and_positional_with_double_dash() {
        let line = Command::file_exec_and_symbols("a.out").encode(1);
        assert_eq!(line, "1-file-exec-and-symbols -- a.out\n");
    }

    #[test]
    fn omits_absent_optional_thread_frame() {
        let line = Command::exec_next(None).encode(3);
        assert_eq!(line, "3-exec-next\n");
    }

    #[test]
    fn includes_thread_option_when_present() {
        let line = Command::exec_next(Some(2)).encode(4);
        assert_eq!(line, "4-exec-next --thread 2\n");
    }

    #[test]
    fn break_insert_formats_file_line_location() {
        let line = Command::break_insert(BreakpointLocation::Line { file: "a.c", line: 12 }, false).encode(1);
        assert_eq!(line, "1-break-insert -- a.c:12\n");
    }

    #[test]
    fn break_delete_rejects_empty_list() {
        assert!(Command::break_delete(&[]).is_err());
    }
}
