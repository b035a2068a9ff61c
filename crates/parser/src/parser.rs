// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Recursive-descent parser for MXVM program text (spec §6), folding in
//! the validation spec §4.2 requires (unknown opcodes, malformed literals,
//! section structure) rather than running a separate validation pass.
//!
//! The grammar in spec §6 does not spell out nested-object syntax even
//! though §3/§4.3 require it; this parser extends `section` with an
//! `object IDENT { ... }` block reusing the same body grammar, which is
//! the natural textual counterpart of `Program::objects` (see DESIGN.md).

use mxvm_types::{Instruction, MxvmError, Opcode, Operand, VarType, Value};
use mxvm_program::{Program, Variable};

use crate::lexer::Token;
use crate::peekable_iterator::PeekableIterator;

pub fn parse(iter: &mut PeekableIterator<Token>) -> Result<Program, MxvmError> {
    expect_keyword(iter, "program")?;
    let name = expect_identifier(iter, "program name")?;
    consume(iter, Token::LeftBrace)?;

    let mut program = Program::new(name);
    while !matches!(iter.peek(0), Some(Token::RightBrace) | None) {
        parse_block(iter, &mut program)?;
    }
    consume(iter, Token::RightBrace)?;

    Ok(program)
}

fn parse_block(iter: &mut PeekableIterator<Token>, program: &mut Program) -> Result<(), MxvmError> {
    match iter.next() {
        Some(Token::Identifier(kw)) if kw == "object" => {
            let name = expect_identifier(iter, "object name")?;
            consume(iter, Token::LeftBrace)?;
            let mut object = Program::new(name);
            while !matches!(iter.peek(0), Some(Token::RightBrace) | None) {
                parse_block(iter, &mut object)?;
            }
            consume(iter, Token::RightBrace)?;
            program.add_object(object);
            Ok(())
        }
        Some(Token::Identifier(kw)) if kw == "section" => {
            let kind = expect_identifier(iter, "section kind")?;
            consume(iter, Token::LeftBrace)?;
            match kind.as_str() {
                "module" => parse_module_section(iter, program)?,
                "data" => parse_data_section(iter, program)?,
                "code" => parse_code_section(iter, program)?,
                other => {
                    return Err(MxvmError::syntax(format!(
                        "unknown section kind '{other}'"
                    )))
                }
            }
            consume(iter, Token::RightBrace)?;
            Ok(())
        }
        Some(other) => Err(MxvmError::syntax(format!(
            "expected 'object' or 'section', found {other:?}"
        ))),
        None => Err(MxvmError::syntax("unexpected end of input")),
    }
}

fn parse_module_section(
    iter: &mut PeekableIterator<Token>,
    program: &mut Program,
) -> Result<(), MxvmError> {
    while !matches!(iter.peek(0), Some(Token::RightBrace) | None) {
        let name = expect_identifier(iter, "external function name")?;
        program.external_functions.register(name);
        if matches!(iter.peek(0), Some(Token::Comma)) {
            iter.next();
        }
    }
    Ok(())
}

fn parse_data_section(
    iter: &mut PeekableIterator<Token>,
    program: &mut Program,
) -> Result<(), MxvmError> {
    while !matches!(iter.peek(0), Some(Token::RightBrace) | None) {
        let type_name = expect_identifier(iter, "variable type")?;
        let var_name = expect_identifier(iter, "variable name")?;

        let (tag, value) = match type_name.as_str() {
            "int" => {
                consume(iter, Token::Equals)?;
                let text = expect_number(iter, "integer literal")?;
                (VarType::Integer, Value::from_literal(VarType::Integer, &text)?)
            }
            "byte" => {
                consume(iter, Token::Equals)?;
                let text = expect_number(iter, "byte literal")?;
                (VarType::Byte, Value::from_literal(VarType::Byte, &text)?)
            }
            "float" => {
                consume(iter, Token::Equals)?;
                let text = expect_number(iter, "float literal")?;
                (VarType::Float, Value::from_literal(VarType::Float, &text)?)
            }
            "string" => match iter.next() {
                Some(Token::Equals) => {
                    let text = expect_string(iter, "string literal")?;
                    (VarType::String, Value::from_literal(VarType::String, &text)?)
                }
                Some(Token::Comma) => {
                    let text = expect_number(iter, "string buffer capacity")?;
                    let capacity = mxvm_types::value::parse_int_literal(&text)? as u64;
                    (VarType::String, Value::buffered_string(capacity))
                }
                other => {
                    return Err(MxvmError::syntax(format!(
                        "expected '=' or ',' after 'string {var_name}', found {other:?}"
                    )))
                }
            },
            "ptr" => {
                consume(iter, Token::Equals)?;
                expect_keyword(iter, "null")?;
                (VarType::Pointer, Value::null_pointer())
            }
            other => {
                return Err(MxvmError::syntax(format!(
                    "unknown variable type '{other}'"
                )))
            }
        };

        program.add_variable(Variable::new(var_name, tag, value).global());
    }
    Ok(())
}

fn parse_code_section(
    iter: &mut PeekableIterator<Token>,
    program: &mut Program,
) -> Result<(), MxvmError> {
    while !matches!(iter.peek(0), Some(Token::RightBrace) | None) {
        if matches!(iter.peek(0), Some(Token::Identifier(kw)) if kw == "function") {
            iter.next();
            let name = expect_identifier(iter, "function label name")?;
            consume(iter, Token::Colon)?;
            program.add_label(name, program.instructions.len(), true);
            continue;
        }

        if matches!(iter.peek(0), Some(Token::Identifier(_)))
            && matches!(iter.peek(1), Some(Token::Colon))
        {
            let name = expect_identifier(iter, "label name")?;
            consume(iter, Token::Colon)?;
            program.add_label(name, program.instructions.len(), false);
            continue;
        }

        program.add_instruction(parse_instruction(iter)?);
    }
    Ok(())
}

fn parse_instruction(iter: &mut PeekableIterator<Token>) -> Result<Instruction, MxvmError> {
    let opcode_name = expect_identifier(iter, "opcode")?;
    let opcode = Opcode::from_name(&opcode_name)
        .ok_or_else(|| MxvmError::syntax(format!("unknown instruction '{opcode_name}'")))?;

    let mut instruction = Instruction::new(opcode);
    if opcode.takes_no_operands() {
        return Ok(instruction);
    }

    let mut operands = vec![parse_operand(iter)?];
    while matches!(iter.peek(0), Some(Token::Comma)) {
        iter.next();
        operands.push(parse_operand(iter)?);
    }

    let mut slots = operands.drain(..);
    instruction.op1 = slots.next().unwrap_or_else(Operand::empty);
    instruction.op2 = slots.next().unwrap_or_else(Operand::empty);
    instruction.op3 = slots.next().unwrap_or_else(Operand::empty);
    instruction.extra = slots.collect();

    Ok(instruction)
}

fn parse_operand(iter: &mut PeekableIterator<Token>) -> Result<Operand, MxvmError> {
    match iter.next() {
        Some(Token::Identifier(name)) => Ok(Operand::variable(name)),
        Some(Token::Register(name)) => Ok(Operand::variable(name)),
        Some(Token::Number(text)) => Ok(Operand::constant(text)),
        Some(Token::Str(text)) => Ok(Operand::constant(mxvm_types::value::unescape(&text))),
        Some(other) => Err(MxvmError::syntax(format!("expected an operand, found {other:?}"))),
        None => Err(MxvmError::syntax("expected an operand, found end of input")),
    }
}

fn consume(iter: &mut PeekableIterator<Token>, expected: Token) -> Result<(), MxvmError> {
    match iter.next() {
        Some(token) if token == expected => Ok(()),
        Some(token) => Err(MxvmError::syntax(format!(
            "expected {expected:?}, found {token:?}"
        ))),
        None => Err(MxvmError::syntax(format!(
            "expected {expected:?}, found end of input"
        ))),
    }
}

fn expect_keyword(iter: &mut PeekableIterator<Token>, keyword: &str) -> Result<(), MxvmError> {
    match iter.next() {
        Some(Token::Identifier(s)) if s == keyword => Ok(()),
        Some(other) => Err(MxvmError::syntax(format!(
            "expected '{keyword}', found {other:?}"
        ))),
        None => Err(MxvmError::syntax(format!(
            "expected '{keyword}', found end of input"
        ))),
    }
}

fn expect_identifier(iter: &mut PeekableIterator<Token>, for_what: &str) -> Result<String, MxvmError> {
    match iter.next() {
        Some(Token::Identifier(s)) => Ok(s),
        Some(other) => Err(MxvmError::syntax(format!(
            "expected an identifier for {for_what}, found {other:?}"
        ))),
        None => Err(MxvmError::syntax(format!(
            "expected an identifier for {for_what}, found end of input"
        ))),
    }
}

fn expect_number(iter: &mut PeekableIterator<Token>, for_what: &str) -> Result<String, MxvmError> {
    match iter.next() {
        Some(Token::Number(s)) => Ok(s),
        Some(other) => Err(MxvmError::syntax(format!(
            "expected a number for {for_what}, found {other:?}"
        ))),
        None => Err(MxvmError::syntax(format!(
            "expected a number for {for_what}, found end of input"
        ))),
    }
}

fn expect_string(iter: &mut PeekableIterator<Token>, for_what: &str) -> Result<String, MxvmError> {
    match iter.next() {
        Some(Token::Str(s)) => Ok(s),
        Some(other) => Err(MxvmError::syntax(format!(
            "expected a string for {for_what}, found {other:?}"
        ))),
        None => Err(MxvmError::syntax(format!(
            "expected a string for {for_what}, found end of input"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::lexer::lex;

    use super::*;

    fn parse_from_str(s: &str) -> Result<Program, MxvmError> {
        let mut chars = s.chars();
        let mut char_iter = PeekableIterator::new(&mut chars, 2);
        let tokens = lex(&mut char_iter)?;
        let mut token_iter_src = tokens.into_iter();
        let mut token_iter = PeekableIterator::new(&mut token_iter_src, 2);
        parse(&mut token_iter)
    }

    #[test]
    fn parses_hello_world() {
        let program = parse_from_str(
            r#"
            program hello {
                section data {
                    string msg = "hello\n"
                }
                section code {
                    print msg
                    done
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(program.name, "hello");
        assert_eq!(program.variables["msg"].value.str_value, "hello\n");
        assert_eq!(program.instructions.len(), 2);
        assert_eq!(program.instructions[0].opcode, Opcode::print);
        assert_eq!(program.instructions[1].opcode, Opcode::done);
    }

    #[test]
    fn parses_labels_and_jumps() {
        let program = parse_from_str(
            r#"
            program loop {
                section data { int i = 0 }
                section code {
                    L:
                    cmp i, 10
                    jge E
                    add i, i, 1
                    jmp L
                    E:
                    done
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(program.labels["L"], (0, false));
        assert_eq!(program.labels["E"], (4, false));
        assert_eq!(program.instructions.len(), 5);
    }

    #[test]
    fn parses_function_labels_and_module_section() {
        let program = parse_from_str(
            r#"
            program caller {
                section module { string.concat }
                section code {
                    function F:
                    ret
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(program.labels["F"], (0, true));
        assert!(program.external_functions.contains("string.concat"));
    }

    #[test]
    fn parses_nested_objects() {
        let program = parse_from_str(
            r#"
            program root {
                object worker {
                    section data { int counter = 0 }
                    section code { done }
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(program.objects.len(), 1);
        assert_eq!(program.objects[0].name, "worker");
        assert!(program.objects[0].variables.contains_key("counter"));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = parse_from_str(
            r#"
            program bad {
                section code { frobnicate a, b }
            }
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Syntax);
    }

    #[test]
    fn rejects_malformed_float_literal() {
        let err = parse_from_str(
            r#"
            program bad {
                section data { float x = not_a_number }
            }
            "#,
        );
        assert!(err.is_err());
    }
}
