//! Domain types the façade maps parsed [`Tuple`]s into (§4.7's result
//! mapper). Grounded in the teacher's `models.rs` newtypes (`Address`,
//! `Enabled`, breakpoint/frame/register shapes), reworked to parse from our
//! own [`Value`]/[`Tuple`] via a per-command field schema instead of serde,
//! per §9's redesign note.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::value::Tuple;

/// A hex-formatted address of a given width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Address<T>(pub T);

pub type Address32 = Address<u32>;
pub type Address64 = Address<u64>;

impl<T: fmt::LowerHex> fmt::Display for Address<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Address64 {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        u64::from_str_radix(s, 16).ok().map(Address)
    }
}

/// Parses GDB's `"y"`/`"n"` enabled flag.
pub fn parse_enabled(s: &str) -> bool {
    s == "y"
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, serde::Serialize)]
pub struct BreakpointNumber {
    pub major: usize,
    pub minor: Option<usize>,
}

impl FromStr for BreakpointNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_usize = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| Error::Encoder(format!("invalid breakpoint number: {s}")))
        };
        match s.split_once('.') {
            Some((major, minor)) => Ok(BreakpointNumber {
                major: parse_usize(major)?,
                minor: Some(parse_usize(minor)?),
            }),
            None => Ok(BreakpointNumber {
                major: parse_usize(s)?,
                minor: None,
            }),
        }
    }
}

impl fmt::Display for BreakpointNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

/// A source position, as reported inline on breakpoints and frames.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SrcPosition {
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Breakpoint {
    pub number: BreakpointNumber,
    pub kind: String,
    pub disposition: String,
    pub enabled: bool,
    pub address: Option<Address64>,
    pub function: Option<String>,
    pub src: SrcPosition,
    pub thread_groups: Vec<String>,
    pub times: u32,
    pub condition: Option<String>,
    pub ignore_count: Option<u32>,
}

impl Breakpoint {
    pub fn from_tuple(command: &'static str, t: &Tuple) -> Result<Self, Error> {
        let number = t.require_str(command, "number")?.parse()?;
        let kind = t.require_str(command, "type")?.to_string();
        let disposition = t.require_str(command, "disp")?.to_string();
        let enabled = parse_enabled(t.require_str(command, "enabled")?);
        let address = t.opt_str(command, "addr")?.and_then(Address64::parse);
        let function = t.opt_str(command, "func")?.map(str::to_string);
        let file = t.opt_str(command, "file")?.map(str::to_string);
        let fullname = t.opt_str(command, "fullname")?.map(str::to_string);
        let line = t
            .opt_str(command, "line")?
            .map(|s| s.parse::<u32>().unwrap_or_default());
        let thread_groups = t
            .get("thread-groups")
            .and_then(|v| v.as_list())
            .and_then(|list| list.positional())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_const().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let times = t
            .opt_str(command, "times")?
            .map(|s| s.parse::<u32>().unwrap_or_default())
            .unwrap_or_default();
        let condition = t.opt_str(command, "cond")?.map(str::to_string);
        let ignore_count = t
            .opt_str(command, "ignore")?
            .map(|s| s.parse::<u32>().unwrap_or_default());
        Ok(Breakpoint {
            number,
            kind,
            disposition,
            enabled,
            address,
            function,
            src: SrcPosition {
                file,
                fullname,
                line,
            },
            thread_groups,
            times,
            condition,
            ignore_count,
        })
    }
}

/// A stack frame. `args` is only populated by operations that request it
/// (`get_stack_frame_args`); it is an empty list otherwise.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StackFrame {
    pub level: u32,
    pub function: String,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
    pub address: Option<Address64>,
    pub arch: Option<String>,
    pub args: Vec<Variable>,
}

impl StackFrame {
    pub fn from_tuple(command: &'static str, t: &Tuple) -> Result<Self, Error> {
        let level = t
            .opt_str(command, "level")?
            .map(|s| s.parse::<u32>().unwrap_or_default())
            .unwrap_or_default();
        let function = t
            .opt_str(command, "func")?
            .unwrap_or_default()
            .to_string();
        let file = t.opt_str(command, "file")?.map(str::to_string);
        let fullname = t.opt_str(command, "fullname")?.map(str::to_string);
        let line = t
            .opt_str(command, "line")?
            .map(|s| s.parse::<u32>().unwrap_or_default());
        let address = t.opt_str(command, "addr")?.and_then(Address64::parse);
        let arch = t.opt_str(command, "arch")?.map(str::to_string);
        let args = match t.get("args").and_then(|v| v.as_list()) {
            Some(list) => list
                .positional()
                .unwrap_or(&[])
                .iter()
                .filter_map(|v| v.as_tuple())
                .filter_map(|vt| Variable::from_tuple(command, vt).ok())
                .collect(),
            None => Vec::new(),
        };
        Ok(StackFrame {
            level,
            function,
            file,
            fullname,
            line,
            address,
            arch,
            args,
        })
    }
}

/// A local/argument variable (`stack-list-variables`/`-args`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Variable {
    pub name: String,
    pub kind: Option<String>,
    pub value: Option<String>,
}

impl Variable {
    pub fn from_tuple(command: &'static str, t: &Tuple) -> Result<Self, Error> {
        Ok(Variable {
            name: t.require_str(command, "name")?.to_string(),
            kind: t.opt_str(command, "type")?.map(str::to_string),
            value: t.opt_str(command, "value")?.map(str::to_string),
        })
    }
}

/// A thread, as reported by `-thread-info`/`-list-thread-groups`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Thread {
    pub id: u64,
    pub target_id: Option<String>,
    pub state: Option<String>,
    pub frame: Option<StackFrame>,
}

impl Thread {
    pub fn from_tuple(command: &'static str, t: &Tuple) -> Result<Self, Error> {
        let id = t.require_str(command, "id")?.parse().map_err(|_| Error::ProtocolShape {
            command,
            field: "id",
        })?;
        let target_id = t.opt_str(command, "target-id")?.map(str::to_string);
        let state = t.opt_str(command, "state")?.map(str::to_string);
        let frame = t
            .opt_tuple("frame")
            .map(|ft| StackFrame::from_tuple(command, ft))
            .transpose()?;
        Ok(Thread {
            id,
            target_id,
            state,
            frame,
        })
    }
}

/// Detail level for watch/variable-object queries (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DetailLevel {
    NoValues,
    AllValues,
    SimpleValues,
}

impl DetailLevel {
    pub fn as_flag(self) -> &'static str {
        match self {
            DetailLevel::NoValues => "--no-values",
            DetailLevel::AllValues => "--all-values",
            DetailLevel::SimpleValues => "--simple-values",
        }
    }
}

/// Numeric display format for watch values (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum WatchFormat {
    Natural,
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
}

impl WatchFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchFormat::Natural => "natural",
            WatchFormat::Binary => "binary",
            WatchFormat::Decimal => "decimal",
            WatchFormat::Hexadecimal => "hexadecimal",
            WatchFormat::Octal => "octal",
        }
    }
}

/// A variable object ("watch"). `floating` tracks whether the watch was
/// created against a fixed frame or re-evaluates at the current frame on
/// every query (glossary: "floating watch" vs "fixed watch").
#[derive(Debug, Clone, serde::Serialize)]
pub struct Watch {
    pub name: String,
    pub expression: String,
    pub numchild: u32,
    pub kind: Option<String>,
    pub value: Option<String>,
    pub floating: bool,
}

impl Watch {
    pub fn from_tuple(command: &'static str, expression: &str, t: &Tuple, floating: bool) -> Result<Self, Error> {
        Ok(Watch {
            name: t.require_str(command, "name")?.to_string(),
            expression: expression.to_string(),
            numchild: t
                .opt_str(command, "numchild")?
                .map(|s| s.parse::<u32>().unwrap_or_default())
                .unwrap_or_default(),
            kind: t.opt_str(command, "type")?.map(str::to_string),
            value: t.opt_str(command, "value")?.map(str::to_string),
            floating,
        })
    }
}

/// A single CPU register's current value (`-data-list-register-values`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Register {
    pub number: usize,
    pub name: Option<String>,
    pub value: Option<String>,
}

impl Register {
    pub fn from_tuple(command: &'static str, t: &Tuple) -> Result<Self, Error> {
        Ok(Register {
            number: t
                .require_str(command, "number")?
                .parse()
                .map_err(|_| Error::ProtocolShape { command, field: "number" })?,
            name: None,
            value: t.opt_str(command, "value")?.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_number_parses_major_minor() {
        let n: BreakpointNumber = "3.2".parse().unwrap();
        assert_eq!(n.major, 3);
        assert_eq!(n.minor, Some(2));
        assert_eq!(n.to_string(), "3.2");

        let n: BreakpointNumber = "3".parse().unwrap();
        assert_eq!(n.minor, None);
        assert_eq!(n.to_string(), "3");
    }

    #[test]
    fn address_formats_as_lowercase_hex() {
        let a = Address64::parse("0x1a").unwrap();
        assert_eq!(a.to_string(), "0x1a");
    }
}
