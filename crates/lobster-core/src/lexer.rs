//! Lexer for tracing policy files
//!
//! Produces a forward-only stream of tokens. Whitespace and `#` comments are
//! skipped; strings are double-quoted with no escapes. The first unrecognized
//! character ends the stream with a lex error.

use crate::error::Error;
use crate::location::{FileLocation, Location};
use std::fmt;
use std::iter::Peekable;
use std::num::NonZeroU32;
use std::str::Chars;

/// Reserved words of the policy language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Requirements,
    Implementation,
    Activity,
    Source,
    With,
    Prefix,
    Kind,
    ValidStatus,
    Trace,
    To,
    From,
    Or,
}

impl Keyword {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requirements" => Some(Keyword::Requirements),
            "implementation" => Some(Keyword::Implementation),
            "activity" => Some(Keyword::Activity),
            "source" => Some(Keyword::Source),
            "with" => Some(Keyword::With),
            "prefix" => Some(Keyword::Prefix),
            "kind" => Some(Keyword::Kind),
            "valid_status" => Some(Keyword::ValidStatus),
            "trace" => Some(Keyword::Trace),
            "to" => Some(Keyword::To),
            "from" => Some(Keyword::From),
            "or" => Some(Keyword::Or),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Requirements => "requirements",
            Keyword::Implementation => "implementation",
            Keyword::Activity => "activity",
            Keyword::Source => "source",
            Keyword::With => "with",
            Keyword::Prefix => "prefix",
            Keyword::Kind => "kind",
            Keyword::ValidStatus => "valid_status",
            Keyword::Trace => "trace",
            Keyword::To => "to",
            Keyword::From => "from",
            Keyword::Or => "or",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// A word that is not reserved; only ever legal as an error subject.
    Identifier(String),
    /// String literal, without the quotes.
    String(String),
    Colon,
    Semi,
    Comma,
    OpenBrace,
    CloseBrace,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "keyword {k}"),
            TokenKind::Identifier(s) => write!(f, "identifier {s}"),
            TokenKind::String(s) => write!(f, "string \"{s}\""),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Semi => f.write_str("';'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::OpenBrace => f.write_str("'{'"),
            TokenKind::CloseBrace => f.write_str("'}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

pub struct Lexer<'a> {
    file_name: &'a str,
    chars: Peekable<Chars<'a>>,
    line: NonZeroU32,
    column: NonZeroU32,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(file_name: &'a str, text: &'a str) -> Self {
        Self {
            file_name,
            chars: text.chars().peekable(),
            line: NonZeroU32::MIN,
            column: NonZeroU32::MIN,
            failed: false,
        }
    }

    /// Location of the next unread character.
    pub fn location(&self) -> Location {
        FileLocation::at(self.file_name, self.line, Some(self.column)).into()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line = self.line.saturating_add(1);
            self.column = NonZeroU32::MIN;
        } else {
            self.column = self.column.saturating_add(1);
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn error(&mut self, location: Location, message: String) -> Error {
        self.failed = true;
        Error::Lex { location, message }
    }

    fn next_token(&mut self) -> Option<Result<Token, Error>> {
        self.skip_trivia();
        let location = self.location();
        let ch = self.bump()?;

        let kind = match ch {
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '"' => {
                let mut value = String::new();
                loop {
                    match self.chars.peek() {
                        None | Some('\n') => {
                            let here = self.location();
                            return Some(Err(self.error(here, "unterminated string".into())));
                        }
                        Some('"') => {
                            self.bump();
                            break;
                        }
                        Some(&c) => {
                            value.push(c);
                            self.bump();
                        }
                    }
                }
                TokenKind::String(value)
            }
            c if c.is_alphabetic() => {
                let mut word = String::new();
                word.push(c);
                while let Some(&c) = self.chars.peek() {
                    if c.is_alphabetic() || c == '_' {
                        word.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                match Keyword::parse(&word) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Identifier(word),
                }
            }
            other => {
                return Some(Err(
                    self.error(location, format!("unexpected character: '{other}'"))
                ));
            }
        };

        Some(Ok(Token { kind, location }))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token()
    }
}
