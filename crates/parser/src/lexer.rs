// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Tokenizer for the MXVM program text described in spec §6:
//!
//! ```text
//! program    ::= "program" IDENT "{" section* "}"
//! section    ::= "section" ("module" | "data" | "code") "{" sbody "}"
//! ```
//!
//! `#` and `//` start a line comment; whitespace and newlines are
//! otherwise insignificant.

use mxvm_types::MxvmError;

use crate::peekable_iterator::PeekableIterator;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Equals,
    /// a bare word: a keyword, an opcode, a variable or label name, or a
    /// dotted `object.name` reference (the dot is kept as part of the
    /// token; `mxvm_types::Operand::variable` splits it back apart).
    Identifier(String),
    /// `%rax`, `%xmm3`, the leading `%` is kept.
    Register(String),
    /// raw literal text, not yet parsed into an `i64`/`f64` (decimal, `0x`
    /// hex, or floating point with `.`/exponent).
    Number(String),
    Str(String),
}

pub fn lex(iter: &mut PeekableIterator<char>) -> Result<Vec<Token>, MxvmError> {
    let mut tokens = Vec::new();

    while let Some(&c) = iter.peek(0) {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                iter.next();
            }
            '#' => skip_line_comment(iter),
            '/' if iter.peek(1) == Some(&'/') => skip_line_comment(iter),
            '{' => {
                iter.next();
                tokens.push(Token::LeftBrace);
            }
            '}' => {
                iter.next();
                tokens.push(Token::RightBrace);
            }
            ',' => {
                iter.next();
                tokens.push(Token::Comma);
            }
            ':' => {
                iter.next();
                tokens.push(Token::Colon);
            }
            '=' => {
                iter.next();
                tokens.push(Token::Equals);
            }
            '"' => tokens.push(lex_string(iter)?),
            '%' => tokens.push(lex_register(iter)?),
            c if c.is_ascii_digit() => tokens.push(lex_number(iter)),
            '-' if matches!(iter.peek(1), Some(c) if c.is_ascii_digit()) => {
                tokens.push(lex_number(iter))
            }
            c if is_identifier_start(c) => tokens.push(lex_identifier(iter)),
            other => {
                return Err(MxvmError::syntax(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }

    Ok(tokens)
}

fn skip_line_comment(iter: &mut PeekableIterator<char>) {
    while let Some(&c) = iter.peek(0) {
        iter.next();
        if c == '\n' {
            break;
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn lex_identifier(iter: &mut PeekableIterator<char>) -> Token {
    let mut text = String::new();
    while let Some(&c) = iter.peek(0) {
        if is_identifier_continue(c) {
            text.push(c);
            iter.next();
        } else {
            break;
        }
    }
    Token::Identifier(text)
}

fn lex_register(iter: &mut PeekableIterator<char>) -> Result<Token, MxvmError> {
    let mut text = String::new();
    text.push(iter.next().unwrap()); // '%'
    while let Some(&c) = iter.peek(0) {
        if c.is_ascii_alphanumeric() {
            text.push(c);
            iter.next();
        } else {
            break;
        }
    }
    if text.len() == 1 {
        return Err(MxvmError::syntax("'%' not followed by a register name"));
    }
    Ok(Token::Register(text))
}

fn lex_number(iter: &mut PeekableIterator<char>) -> Token {
    let mut text = String::new();
    if iter.peek(0) == Some(&'-') {
        text.push(iter.next().unwrap());
    }
    if iter.peek(0) == Some(&'0') && matches!(iter.peek(1), Some('x') | Some('X')) {
        text.push(iter.next().unwrap());
        text.push(iter.next().unwrap());
        while let Some(&c) = iter.peek(0) {
            if c.is_ascii_hexdigit() {
                text.push(c);
                iter.next();
            } else {
                break;
            }
        }
        return Token::Number(text);
    }
    while let Some(&c) = iter.peek(0) {
        if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
            if c == 'e' || c == 'E' {
                text.push(c);
                iter.next();
                if matches!(iter.peek(0), Some('+') | Some('-')) {
                    text.push(iter.next().unwrap());
                }
                continue;
            }
            text.push(c);
            iter.next();
        } else {
            break;
        }
    }
    Token::Number(text)
}

fn lex_string(iter: &mut PeekableIterator<char>) -> Result<Token, MxvmError> {
    iter.next(); // opening quote
    let mut text = String::new();
    loop {
        match iter.next() {
            Some('"') => break,
            Some('\\') => {
                text.push('\\');
                if let Some(escaped) = iter.next() {
                    text.push(escaped);
                }
            }
            Some(c) => text.push(c),
            None => return Err(MxvmError::syntax("unterminated string literal")),
        }
    }
    Ok(Token::Str(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_str(s: &str) -> Vec<Token> {
        let mut chars = s.chars();
        let mut iter = PeekableIterator::new(&mut chars, 2);
        lex(&mut iter).unwrap()
    }

    #[test]
    fn lexes_braces_and_identifiers() {
        assert_eq!(
            lex_str("program main { }"),
            vec![
                Token::Identifier("program".into()),
                Token::Identifier("main".into()),
                Token::LeftBrace,
                Token::RightBrace,
            ]
        );
    }

    #[test]
    fn lexes_dotted_identifiers_and_registers() {
        assert_eq!(
            lex_str("mov worker.counter, %rax"),
            vec![
                Token::Identifier("mov".into()),
                Token::Identifier("worker.counter".into()),
                Token::Comma,
                Token::Register("%rax".into()),
            ]
        );
    }

    #[test]
    fn lexes_numbers_including_hex_and_float() {
        assert_eq!(
            lex_str("0x1F 3.14 -7"),
            vec![
                Token::Number("0x1F".into()),
                Token::Number("3.14".into()),
                Token::Number("-7".into()),
            ]
        );
    }

    #[test]
    fn lexes_string_with_escape() {
        assert_eq!(
            lex_str(r#""hello\n""#),
            vec![Token::Str("hello\\n".into())]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            lex_str("mov a, 1 # trailing\n// another\nadd a, 1"),
            vec![
                Token::Identifier("mov".into()),
                Token::Identifier("a".into()),
                Token::Comma,
                Token::Number("1".into()),
                Token::Identifier("add".into()),
                Token::Identifier("a".into()),
                Token::Comma,
                Token::Number("1".into()),
            ]
        );
    }
}
