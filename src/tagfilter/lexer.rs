//! Tokenizer for tag-filter text.

use super::parser::ParseError;

/// Lexer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token<'a> {
    /// A bare word: tag name, operator, keyword, number or boolean.
    Word(&'a str),
    /// A quoted string with escapes resolved.
    Quoted(String),
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SpannedToken<'a> {
    pub token: Token<'a>,
    pub position: usize,
}

pub(super) struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    pub fn lex(mut self) -> Result<Vec<SpannedToken<'a>>, ParseError> {
        let mut tokens = Vec::new();
        let input = self.input;
        let bytes = input.as_bytes();

        while self.offset < bytes.len() {
            let ch = bytes[self.offset];
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                },
                b'(' => {
                    tokens.push(self.simple(Token::LParen));
                    self.offset += 1;
                },
                b')' => {
                    tokens.push(self.simple(Token::RParen));
                    self.offset += 1;
                },
                b'\'' | b'"' => {
                    let start = self.offset;
                    let value = self.quoted(ch)?;
                    tokens.push(SpannedToken {
                        token: Token::Quoted(value),
                        position: start,
                    });
                },
                _ => {
                    let start = self.offset;
                    while let Some(&b) = bytes.get(self.offset) {
                        if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'\'' | b'"') {
                            break;
                        }
                        self.offset += 1;
                    }
                    tokens.push(SpannedToken {
                        token: Token::Word(&input[start..self.offset]),
                        position: start,
                    });
                },
            }
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    fn simple(&self, token: Token<'a>) -> SpannedToken<'a> {
        SpannedToken {
            token,
            position: self.offset,
        }
    }

    /// Read a quoted string starting at the opening quote; `\` escapes the
    /// next character.
    fn quoted(&mut self, quote: u8) -> Result<String, ParseError> {
        let start = self.offset;
        self.offset += 1;
        let mut value = String::new();
        let mut chars = self.input[self.offset..].char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                c if c as u32 == quote as u32 => {
                    self.offset += i + 1;
                    return Ok(value);
                },
                c => value.push(c),
            }
        }

        Err(ParseError::new(
            self.input,
            start,
            "unterminated string literal",
        ))
    }
}
