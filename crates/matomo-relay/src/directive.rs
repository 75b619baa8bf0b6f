//! Directive tokens and the block syntax they are written in.
//!
//! A configuration block looks like:
//!
//! ```text
//! matomo {
//!     url     https://stats.example.com/matomo.php
//!     token   0123abcd
//!     site    3
//!     exclude ^/health
//!     exclude "\.(css|js)$"
//!     nobots
//! }
//! ```
//!
//! Tokens are separated by whitespace, a `"..."` token may contain spaces
//! (`\"` and `\\` are the only escapes), and `#` comments run to the end of
//! the line. Each directive is the first token on a line followed by the
//! remaining tokens on that line as its arguments.

use crate::error::{ConfigError, Result};

/// Name of the configuration block.
pub const BLOCK_NAME: &str = "matomo";

/// A single directive: a name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Directive name, e.g. `url`
    pub name: String,
    /// Arguments following the name
    pub args: Vec<String>,
    /// Source line (1-based); 0 when built programmatically
    pub line: usize,
}

impl Directive {
    /// Create a directive that did not come from parsed text
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            line: 0,
        }
    }

    /// Create a directive without arguments
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, std::iter::empty::<String>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    line: usize,
    quoted: bool,
}

impl Token {
    /// Quoted braces are plain arguments
    fn is_brace(&self, brace: &str) -> bool {
        !self.quoted && self.text == brace
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                chars.next();
                let start_line = line;
                let mut text = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                text.push(escaped);
                            }
                        }
                        '\n' => {
                            line += 1;
                            text.push(c);
                        }
                        _ => text.push(c),
                    }
                }
                if !closed {
                    return Err(ConfigError::UnexpectedEof("unterminated quoted string"));
                }
                tokens.push(Token {
                    text,
                    line: start_line,
                    quoted: true,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    text,
                    line,
                    quoted: false,
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse one or more `matomo { ... }` blocks into a flat directive list.
///
/// Only the block structure is checked here; directive names and arity are
/// validated by [`TrackerConfig::from_directives`](crate::TrackerConfig::from_directives).
pub fn parse_block(input: &str) -> Result<Vec<Directive>> {
    let tokens = tokenize(input)?;
    let mut directives = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(name) = iter.next() {
        if name.text != BLOCK_NAME {
            return Err(ConfigError::ExpectedBlockName {
                expected: BLOCK_NAME,
                found: name.text,
                line: name.line,
            });
        }

        match iter.next() {
            Some(open) if open.is_brace("{") => {}
            Some(other) => {
                return Err(ConfigError::ExpectedOpenBrace {
                    found: other.text,
                    line: other.line,
                })
            }
            None => return Err(ConfigError::UnexpectedEof("expecting braces")),
        }

        let mut closed = false;
        while let Some(token) = iter.next() {
            if token.is_brace("}") {
                closed = true;
                break;
            }

            let mut args = Vec::new();
            while let Some(next) = iter.peek() {
                if next.line != token.line || next.is_brace("}") {
                    break;
                }
                if let Some(arg) = iter.next() {
                    args.push(arg.text);
                }
            }

            directives.push(Directive {
                name: token.text,
                args,
                line: token.line,
            });
        }

        if !closed {
            return Err(ConfigError::UnexpectedEof("unterminated matomo block"));
        }
    }

    Ok(directives)
}
