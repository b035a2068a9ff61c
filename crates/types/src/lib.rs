// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Core value, operand and instruction types shared by every MXVM crate.
//!
//! This crate has no dependency on how a program is parsed, interpreted or
//! compiled: it only defines the vocabulary the other crates speak.

pub mod error;
pub mod opcode;
pub mod value;

pub use error::{ErrorKind, MxvmError};
pub use opcode::Opcode;
pub use value::{Value, VarType};

/// A single argument to an instruction: either a literal or a variable
/// reference. The textual form and the parsed integer value of a constant
/// are both retained, since some contexts (e.g. `push`) want the integer
/// and others (e.g. a string literal argument to `print`) want the text.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Constant,
    Variable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// the raw token text as written in the source, e.g. `"42"`, `"foo"`,
    /// `"object.name"`, `"%rax"`.
    pub text: String,
    /// populated only for `OperandKind::Constant`: the parsed integer value,
    /// when the literal parses as an integer (used by `push`, `stack_load`
    /// index arguments, etc).
    pub int_value: i64,
    pub kind: OperandKind,
    /// the owning object name, when the operand was written as
    /// `object.name`, or resolved to one during flattening.
    pub object: Option<String>,
}

impl Operand {
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        let int_value = value::parse_int_literal(&text).unwrap_or(0);
        Operand {
            text,
            int_value,
            kind: OperandKind::Constant,
            object: None,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        let text = name.into();
        let object = text
            .find('.')
            .map(|idx| text[..idx].to_string())
            .filter(|o| !o.is_empty());
        Operand {
            text,
            int_value: 0,
            kind: OperandKind::Variable,
            object,
        }
    }

    pub fn empty() -> Self {
        Operand {
            text: String::new(),
            int_value: 0,
            kind: OperandKind::Constant,
            object: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, OperandKind::Variable)
    }
}

/// Opcode + up to three principal operands + a variadic tail, as described
/// in spec §3 "Instruction". `label` records a label attached to this
/// instruction by the parser (used only for diagnostics; the authoritative
/// label→address mapping lives in the program's label table).
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub op1: Operand,
    pub op2: Operand,
    pub op3: Operand,
    pub extra: Vec<Operand>,
    pub label: Option<String>,
    pub line: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            op1: Operand::empty(),
            op2: Operand::empty(),
            op3: Operand::empty(),
            extra: Vec::new(),
            label: None,
            line: 0,
        }
    }
}
