//! The MI output grammar's value type (§3 "MI Value").
//!
//! Unlike `serde_json::Value`, a keyed [`List`] here is an ordered sequence
//! of pairs, not a map: GDB/MI legitimately emits the same key more than
//! once in one list (repeated `frame=` entries being the canonical case),
//! and collapsing those into a map would silently drop entries.

use std::fmt;

use crate::error::Error;

/// One parsed MI value: a quoted C-string, a tuple, or a list.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Const(String),
    Tuple(Tuple),
    List(List),
}

/// `{k=v,...}` — keys are unique identifiers, order is not semantically
/// significant but is preserved for deterministic output.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
#[serde(transparent)]
pub struct Tuple(pub(crate) Vec<(String, Value)>);

/// `[v,...]` (positional) or `[k=v,...]` (keyed, duplicate keys allowed).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum List {
    Values(Vec<Value>),
    Pairs(Vec<(String, Value)>),
}

impl Tuple {
    pub fn new() -> Self {
        Tuple(Vec::new())
    }

    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Tuple(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.0.push((key.into(), value));
    }

    /// A named, required field — the per-command schema mapping of §9's
    /// "dynamic dispatch on MI records" redesign note. Missing ⇒
    /// `ProtocolShape`.
    pub fn require(&self, command: &'static str, field: &'static str) -> Result<&Value, Error> {
        self.get(field)
            .ok_or(Error::ProtocolShape { command, field })
    }

    pub fn require_str(&self, command: &'static str, field: &'static str) -> Result<&str, Error> {
        self.require(command, field)?
            .as_const()
            .ok_or(Error::ProtocolShape { command, field })
    }

    /// A named, optional field — absent is `Ok(None)`, present-but-wrong-shape
    /// is a `ProtocolShape` error rather than silently dropping data.
    pub fn opt_str(&self, command: &'static str, field: &'static str) -> Result<Option<&str>, Error> {
        match self.get(field) {
            None => Ok(None),
            Some(v) => v
                .as_const()
                .map(Some)
                .ok_or(Error::ProtocolShape { command, field }),
        }
    }

    pub fn opt_tuple(&self, field: &str) -> Option<&Tuple> {
        self.get(field).and_then(Value::as_tuple)
    }
}

impl List {
    pub fn is_empty(&self) -> bool {
        match self {
            List::Values(v) => v.is_empty(),
            List::Pairs(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            List::Values(v) => v.len(),
            List::Pairs(v) => v.len(),
        }
    }

    /// All values under `key` in a keyed list, in order. Empty for a
    /// positional list.
    pub fn values_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        let pairs: &[(String, Value)] = match self {
            List::Pairs(v) => v.as_slice(),
            List::Values(_) => &[],
        };
        pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn positional(&self) -> Option<&[Value]> {
        match self {
            List::Values(v) => Some(v),
            List::Pairs(_) => None,
        }
    }
}

impl Value {
    pub fn as_const(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(s) => write!(f, "\"{}\"", s),
            Value::Tuple(t) => {
                write!(f, "{{")?;
                for (i, (k, v)) in t.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::List(List::Values(items)) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::List(List::Pairs(pairs)) => {
                write!(f, "[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "]")
            }
        }
    }
}
