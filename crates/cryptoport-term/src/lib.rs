//! Host term construction helpers.
//!
//! Replies and diagnostics cross back to the host as terms in its own value
//! domain: atoms, integers, binaries, and tuples. These helpers build the
//! common shapes (`{ok, Value}`, `{error, Reason}`) and render them in host
//! syntax for transports and logs that carry text.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Atom(String),
    Int(i64),
    Binary(Vec<u8>),
    Tuple(Vec<Term>),
}

pub fn atom(name: &str) -> Term {
    Term::Atom(name.to_string())
}

pub fn int(value: i64) -> Term {
    Term::Int(value)
}

pub fn binary(bytes: &[u8]) -> Term {
    Term::Binary(bytes.to_vec())
}

pub fn tuple(elements: Vec<Term>) -> Term {
    Term::Tuple(elements)
}

/// `{ok, Value}`
pub fn ok(value: Term) -> Term {
    tuple(vec![atom("ok"), value])
}

/// `{error, Reason}` with an atom reason.
pub fn error(reason: &str) -> Term {
    tuple(vec![atom("error"), atom(reason)])
}

/// `{error, Message}` with a free-form text binary.
pub fn error_message(message: &str) -> Term {
    tuple(vec![atom("error"), binary(message.as_bytes())])
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) => f.write_str(name),
            Term::Int(value) => write!(f, "{value}"),
            Term::Binary(bytes) => {
                // Printable binaries render as text, the way the host shell
                // would show them.
                let printable =
                    |b: &u8| (0x20..0x7f).contains(b) && *b != b'"' && *b != b'\\';
                if !bytes.is_empty() && bytes.iter().all(printable) {
                    write!(f, "<<\"{}\">>", String::from_utf8_lossy(bytes))
                } else {
                    f.write_str("<<")?;
                    for (i, b) in bytes.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{b}")?;
                    }
                    f.write_str(">>")
                }
            }
            Term::Tuple(elements) => {
                f.write_str("{")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("}")
            }
        }
    }
}
