//! The MI output grammar (§4.1): parses one complete MI record per
//! invocation into a [`Record`].
//!
//! Grounded in the teacher's `nom`-based grammar (string escaping, the
//! `key=value` fold, the `result`/`async`/`stream`/`prompt` alternation) but
//! reworked to build our own [`Value`] instead of `serde_json::Value`, so
//! that keyed lists with repeated keys survive parsing instead of
//! collapsing into a deduplicating map (§4.1's "MUST NOT collapse into a
//! map").

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while_m_n};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_opt, map_res, opt, value, verify};
use nom::error::{FromExternalError, ParseError};
use nom::multi::{fold, many0, separated_list0};
use nom::sequence::{delimited, preceded, separated_pair};
use nom::{IResult, Parser};

use crate::error::Error;
use crate::record::{AsyncKind, Record, ResultClass, StreamKind};
use crate::value::{List, Tuple, Value};

/// Parse one complete MI record out of `line`, which must already have its
/// trailing newline stripped by the line reader.
pub fn parse_record(line: &str) -> Result<Record, Error> {
    match record(line) {
        Ok((rest, rec)) if rest.is_empty() => Ok(rec),
        Ok((rest, _)) => Err(Error::ProtocolParse {
            offset: line.len() - rest.len(),
            line: line.to_string(),
        }),
        Err(e) => {
            let offset = match &e {
                nom::Err::Error(err) | nom::Err::Failure(err) => line.len() - err.input.len(),
                nom::Err::Incomplete(_) => line.len(),
            };
            Err(Error::ProtocolParse {
                offset,
                line: line.to_string(),
            })
        }
    }
}

fn result_class(input: &str) -> IResult<&str, ResultClass> {
    alt((
        value(ResultClass::Done, tag("done")),
        value(ResultClass::Running, tag("running")),
        value(ResultClass::Connected, tag("connected")),
        value(ResultClass::Error, tag("error")),
        value(ResultClass::Exit, tag("exit")),
    ))
    .parse(input)
}

fn unicode<'a, E>(input: &'a str) -> IResult<&'a str, char, E>
where
    E: ParseError<&'a str> + FromExternalError<&'a str, std::num::ParseIntError>,
{
    let parse_hex = take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit());
    let parse_delimited_hex = preceded(char('u'), delimited(char('{'), parse_hex, char('}')));
    let parse_u32 = map_res(parse_delimited_hex, move |hex| u32::from_str_radix(hex, 16));
    map_opt(parse_u32, std::char::from_u32).parse(input)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            unicode,
            value('\n', char('n')),
            value('\r', char('r')),
            value('\t', char('t')),
            value('\u{08}', char('b')),
            value('\u{0C}', char('f')),
            value('\\', char('\\')),
            value('/', char('/')),
            value('"', char('"')),
        )),
    )
    .parse(input)
}

fn escaped_whitespace(input: &str) -> IResult<&str, &str> {
    preceded(char('\\'), nom::character::complete::multispace1).parse(input)
}

fn literal(input: &str) -> IResult<&str, &str> {
    verify(is_not("\"\\"), |s: &str| !s.is_empty()).parse(input)
}

#[derive(Debug, PartialEq, Eq, Clone)]
enum StringFragment<'a> {
    Literal(&'a str),
    EscapedChar(char),
    EscapedWS,
}

fn parse_fragment(input: &str) -> IResult<&str, StringFragment<'_>> {
    alt((
        map(literal, StringFragment::Literal),
        map(escaped_char, StringFragment::EscapedChar),
        value(StringFragment::EscapedWS, escaped_whitespace),
    ))
    .parse(input)
}

/// A C-string with its escapes unescaped, per §4.1.
fn c_string(input: &str) -> IResult<&str, String> {
    let build_string = fold(0.., parse_fragment, String::new, |mut s, fragment| {
        match fragment {
            StringFragment::Literal(lit) => s.push_str(lit),
            StringFragment::EscapedChar(c) => s.push(c),
            StringFragment::EscapedWS => {}
        }
        s
    });
    delimited(char('"'), build_string, char('"')).parse(input)
}

fn mi_value(input: &str) -> IResult<&str, Value> {
    alt((
        map(c_string, Value::Const),
        map(
            delimited(char('{'), separated_list0(char(','), key_value), char('}')),
            |pairs| Value::Tuple(Tuple::from_pairs(pairs)),
        ),
        map(
            delimited(char('['), separated_list0(char(','), mi_value), char(']')),
            |values| Value::List(List::Values(values)),
        ),
        map(
            delimited(char('['), separated_list0(char(','), key_value), char(']')),
            |pairs| Value::List(List::Pairs(pairs)),
        ),
    ))
    .parse(input)
}

fn key_value(input: &str) -> IResult<&str, (String, Value)> {
    map(
        separated_pair(is_not("={}[],"), char('='), mi_value),
        |(k, v): (&str, Value)| (k.to_string(), v),
    )
    .parse(input)
}

fn token(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>()).parse(input)
}

fn tuple_of(input: &str) -> IResult<&str, Tuple> {
    map(many0(preceded(char(','), key_value)), Tuple::from_pairs).parse(input)
}

fn result_record(input: &str) -> IResult<&str, Record> {
    map(
        (opt(token), char('^'), result_class, tuple_of),
        |(t, _, class, data)| Record::Result {
            token: t,
            class,
            data,
        },
    )
    .parse(input)
}

fn async_kind(input: &str) -> IResult<&str, AsyncKind> {
    alt((
        value(AsyncKind::Exec, tag("*")),
        value(AsyncKind::Status, tag("+")),
        value(AsyncKind::Notify, tag("=")),
    ))
    .parse(input)
}

fn async_class(input: &str) -> IResult<&str, String> {
    map(is_not(",\n\r"), |s: &str| s.to_string()).parse(input)
}

fn async_record(input: &str) -> IResult<&str, Record> {
    map(
        (opt(token), async_kind, async_class, tuple_of),
        |(t, kind, class, data)| Record::Async {
            token: t,
            kind,
            class,
            data,
        },
    )
    .parse(input)
}

fn stream_kind(input: &str) -> IResult<&str, StreamKind> {
    alt((
        value(StreamKind::Console, tag("~")),
        value(StreamKind::Target, tag("@")),
        value(StreamKind::Log, tag("&")),
    ))
    .parse(input)
}

fn stream_record(input: &str) -> IResult<&str, Record> {
    map((stream_kind, c_string), |(kind, data)| Record::Stream {
        kind,
        data,
    })
    .parse(input)
}

fn prompt(input: &str) -> IResult<&str, Record> {
    value(Record::Prompt, tag("(gdb)")).parse(input)
}

fn record(input: &str) -> IResult<&str, Record> {
    alt((result_record, stream_record, async_record, prompt)).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AsyncKind;

    #[test]
    fn parses_result_with_token_and_nested_tuple() {
        let rec = parse_record(
            r#"42^done,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x0040113c",func="main",file="a.c",fullname="/p/a.c",line="6",times="0"}"#,
        )
        .unwrap();
        match rec {
            Record::Result { token, class, data } => {
                assert_eq!(token, Some(42));
                assert_eq!(class, ResultClass::Done);
                let bkpt = data.get("bkpt").unwrap().as_tuple().unwrap();
                assert_eq!(bkpt.get("number").unwrap().as_const(), Some("1"));
                assert_eq!(bkpt.get("line").unwrap().as_const(), Some("6"));
            }
            _ => panic!("expected result record"),
        }
    }

    #[test]
    fn keyed_list_preserves_duplicate_keys_in_order() {
        let rec = parse_record(r#"^done,frame={level="0",func="f"},frame={level="1",func="g"}"#)
            .unwrap();
        match rec {
            Record::Result { data, .. } => {
                let frames: Vec<&Value> = data.iter().filter(|(k, _)| *k == "frame").map(|(_, v)| v).collect();
                assert_eq!(frames.len(), 2);
                assert_eq!(
                    frames[0].as_tuple().unwrap().get("level").unwrap().as_const(),
                    Some("0")
                );
                assert_eq!(
                    frames[1].as_tuple().unwrap().get("level").unwrap().as_const(),
                    Some("1")
                );
            }
            _ => panic!("expected result record"),
        }
    }

    #[test]
    fn parses_async_stopped_with_breakpoint_hit() {
        let rec = parse_record(
            r#"*stopped,reason="breakpoint-hit",bkptno="3",thread-id="1",stopped-threads="all",frame={addr="0x4011f0",func="main",file="a.c",line="12"}"#,
        )
        .unwrap();
        match rec {
            Record::Async { kind, class, data, token } => {
                assert_eq!(kind, AsyncKind::Exec);
                assert_eq!(class, "stopped");
                assert_eq!(token, None);
                assert_eq!(data.get("reason").unwrap().as_const(), Some("breakpoint-hit"));
                assert_eq!(data.get("bkptno").unwrap().as_const(), Some("3"));
            }
            _ => panic!("expected async record"),
        }
    }

    #[test]
    fn parses_empty_list_and_tuple_distinctly() {
        let rec = parse_record(r#"=library-loaded,ranges=[{}]"#).unwrap();
        match rec {
            Record::Async { data, .. } => {
                let ranges = data.get("ranges").unwrap().as_list().unwrap();
                assert_eq!(ranges.len(), 1);
            }
            _ => panic!("expected async record"),
        }
    }

    #[test]
    fn unescapes_stream_payload() {
        let rec = parse_record("~\"a\\nb\\tc\\\"d\\\"\"").unwrap();
        match rec {
            Record::Stream { kind, data } => {
                assert_eq!(kind, StreamKind::Console);
                assert_eq!(data, "a\nb\tc\"d\"");
            }
            _ => panic!("expected stream record"),
        }
    }

    #[test]
    fn recognizes_prompt() {
        match parse_record("(gdb)").unwrap() {
            Record::Prompt => {}
            _ => panic!("expected prompt"),
        }
    }

    #[test]
    fn malformed_record_is_a_parse_error() {
        let err = parse_record("not a valid record at all {{{").unwrap_err();
        match err {
            Error::ProtocolParse { .. } => {}
            _ => panic!("expected ProtocolParse error"),
        }
    }

    #[test]
    fn error_result_carries_msg_and_code() {
        let rec = parse_record(r#"7^error,msg="Undefined command",code="undefined-command""#)
            .unwrap();
        match rec {
            Record::Result { token, class, data } => {
                assert_eq!(token, Some(7));
                assert_eq!(class, ResultClass::Error);
                assert_eq!(data.get("msg").unwrap().as_const(), Some("Undefined command"));
            }
            _ => panic!("expected result record"),
        }
    }
}
