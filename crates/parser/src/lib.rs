// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Lexer and recursive-descent parser turning MXVM program text (spec §6)
//! into a `mxvm_program::Program` object tree.

pub mod lexer;
pub mod parser;
pub mod peekable_iterator;

use mxvm_types::MxvmError;
use mxvm_program::Program;

use peekable_iterator::PeekableIterator;

/// Lexes and parses a complete MXVM source file.
pub fn parse_source(source: &str) -> Result<Program, MxvmError> {
    let mut chars = source.chars();
    let mut char_iter = PeekableIterator::new(&mut chars, 2);
    let tokens = lexer::lex(&mut char_iter)?;

    let mut token_iter_src = tokens.into_iter();
    let mut token_iter = PeekableIterator::new(&mut token_iter_src, 2);
    parser::parse(&mut token_iter)
}
