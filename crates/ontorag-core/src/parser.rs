//! Literal-only parser for the model's triplet output.
//!
//! Accepts a nested list of quoted strings (single or double quotes, with
//! backslash escapes), bare tokens such as numbers or `None`, and
//! parenthesized tuples. Nothing is ever evaluated.
//!
//! ```text
//! list    := '[' ws (item (ws ',' ws item)* ws ','?)? ws ']'
//! tuple   := '(' ... ')'                       same shape as list
//! item    := string | list | tuple | bare
//! string  := '"' (escape | [^"\\])* '"' | '\'' (escape | [^'\\])* '\''
//! bare    := run of chars other than , [ ] ( ) " '
//! ```

use nom::branch::alt;
use nom::bytes::complete::take_till1;
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, map, opt, verify};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::separated_list0;
use nom::sequence::{delimited, preceded, terminated, tuple};
use nom::{Err as NomErr, IResult};

/// Nesting deeper than this is rejected instead of recursing further.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Bare(String),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty model output")]
    Empty,
    #[error("model output is not a list literal near {0:?}")]
    Syntax(String),
}

/// Remove code fences and line breaks the model tends to wrap output in.
pub fn clean_raw(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```", "")
        .replace(['\n', '\r'], "")
        .trim()
        .to_string()
}

/// Parse cleaned model output; the top level must be a list.
pub fn parse_list_literal(input: &str) -> Result<Vec<Literal>, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    match all_consuming(delimited(multispace0, |i| list(i, 0), multispace0))(input) {
        Ok((_, items)) => Ok(items),
        Err(NomErr::Error(e)) | Err(NomErr::Failure(e)) => {
            Err(ParseError::Syntax(e.input.chars().take(40).collect()))
        }
        Err(NomErr::Incomplete(_)) => Err(ParseError::Syntax(String::new())),
    }
}

fn list(input: &str, depth: usize) -> IResult<&str, Vec<Literal>> {
    sequence(input, depth, '[', ']')
}

fn sequence(input: &str, depth: usize, open: char, close: char) -> IResult<&str, Vec<Literal>> {
    if depth >= MAX_DEPTH {
        return Err(NomErr::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }
    let sep = tuple((multispace0, char(','), multispace0));
    delimited(
        terminated(char(open), multispace0),
        terminated(
            separated_list0(sep, |i| item(i, depth + 1)),
            opt(preceded(multispace0, char(','))),
        ),
        preceded(multispace0, char(close)),
    )(input)
}

fn item(input: &str, depth: usize) -> IResult<&str, Literal> {
    alt((
        map(|i| quoted(i, '"'), Literal::Str),
        map(|i| quoted(i, '\''), Literal::Str),
        map(|i| list(i, depth), Literal::List),
        map(|i| sequence(i, depth, '(', ')'), Literal::Tuple),
        map(bare, |s: &str| Literal::Bare(s.trim_end().to_string())),
    ))(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    verify(take_till1(|c: char| ",[]()\"'".contains(c)), |s: &str| {
        !s.trim().is_empty()
    })(input)
}

/// A quoted string with backslash escapes. Unknown escapes keep the
/// backslash.
fn quoted(input: &str, quote: char) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c == quote => {}
        _ => return Err(NomErr::Error(NomError::new(input, ErrorKind::Char))),
    }
    let mut out = String::new();
    while let Some((idx, c)) = chars.next() {
        if c == quote {
            return Ok((&input[idx + c.len_utf8()..], out));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => out.push('\n'),
            Some((_, 't')) => out.push('\t'),
            Some((_, 'r')) => out.push('\r'),
            Some((_, e @ ('\\' | '\'' | '"'))) => out.push(e),
            Some((_, other)) => {
                out.push('\\');
                out.push(other);
            }
            None => break,
        }
    }
    Err(NomErr::Error(NomError::new(input, ErrorKind::Escaped)))
}
