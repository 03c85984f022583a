//! Reader for KIF game descriptions.
//!
//! Syntax:
//! - `(head args...)` - list
//! - `?name` - variable
//! - `name` - atom (any run of characters other than whitespace, parens and `;`)
//! - `; ...` - comment to end of line
//!
//! The reader only builds s-expressions; [`crate::ruleset`] gives them meaning.

use std::fmt;

/// One s-expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sexpr {
    Atom(String),
    Var(String),
    List(Vec<Sexpr>),
}

impl Sexpr {
    pub fn atom(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// The head atom of a list, or the atom itself.
    pub fn head(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(a) => Some(a),
            Sexpr::List(items) => items.first().and_then(Sexpr::atom),
            Sexpr::Var(_) => None,
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Atom(a) => write!(f, "{a}"),
            Sexpr::Var(v) => write!(f, "?{v}"),
            Sexpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse every top-level s-expression in `input`.
pub fn parse_kif(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut out = Vec::new();
    loop {
        skip_whitespace(bytes, &mut pos);
        if pos >= bytes.len() {
            return Ok(out);
        }
        out.push(parse_sexpr(input, &mut pos)?);
    }
}

/// Parse exactly one s-expression.
pub fn parse_one(input: &str) -> Result<Sexpr, ParseError> {
    let mut pos = 0;
    let expr = parse_sexpr(input, &mut pos)?;
    skip_whitespace(input.as_bytes(), &mut pos);
    if pos < input.len() {
        return Err(ParseError {
            message: "Unexpected characters after expression".to_string(),
            position: pos,
        });
    }
    Ok(expr)
}

fn parse_sexpr(input: &str, pos: &mut usize) -> Result<Sexpr, ParseError> {
    let bytes = input.as_bytes();
    skip_whitespace(bytes, pos);
    match bytes.get(*pos) {
        None => Err(ParseError {
            message: "Unexpected end of input".to_string(),
            position: *pos,
        }),
        Some(b'(') => {
            let open = *pos;
            *pos += 1;
            let mut items = Vec::new();
            loop {
                skip_whitespace(bytes, pos);
                match bytes.get(*pos) {
                    None => {
                        return Err(ParseError {
                            message: "Unclosed parenthesis".to_string(),
                            position: open,
                        })
                    }
                    Some(b')') => {
                        *pos += 1;
                        return Ok(Sexpr::List(items));
                    }
                    Some(_) => items.push(parse_sexpr(input, pos)?),
                }
            }
        }
        Some(b')') => Err(ParseError {
            message: "Unexpected ')'".to_string(),
            position: *pos,
        }),
        Some(b'?') => {
            *pos += 1;
            let name = parse_identifier(input, pos)?;
            Ok(Sexpr::Var(name))
        }
        Some(_) => Ok(Sexpr::Atom(parse_identifier(input, pos)?)),
    }
}

/// Skip whitespace and `;` comments.
fn skip_whitespace(bytes: &[u8], pos: &mut usize) {
    while let Some(&b) = bytes.get(*pos) {
        if b.is_ascii_whitespace() {
            *pos += 1;
        } else if b == b';' {
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
        } else {
            break;
        }
    }
}

/// Parse an atom or variable name.
fn parse_identifier(input: &str, pos: &mut usize) -> Result<String, ParseError> {
    let bytes = input.as_bytes();
    let start = *pos;
    while let Some(&b) = bytes.get(*pos) {
        if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b';') {
            break;
        }
        *pos += 1;
    }
    if *pos == start {
        return Err(ParseError {
            message: "Expected identifier".to_string(),
            position: *pos,
        });
    }
    Ok(input[start..*pos].to_string())
}

#[cfg(test)]
#[path = "tests/parser.rs"]
mod tests;
