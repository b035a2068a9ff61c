// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `Program`: one node of the object tree described in spec §3 "Object
//! tree" — an ordered instruction list, a label table, a local variable
//! table, external-function declarations, and nested object programs.

use std::collections::HashMap;

use mxvm_types::Instruction;

use crate::external_function::ExternalFunctionTable;
use crate::variable::Variable;

#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// label name -> (instruction index, is_function).
    pub labels: HashMap<String, (usize, bool)>,
    /// variables declared directly in this program, keyed by their bare
    /// (unqualified) name.
    pub variables: HashMap<String, Variable>,
    pub external_functions: ExternalFunctionTable,
    pub objects: Vec<Program>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Program {
            name: name.into(),
            instructions: Vec::new(),
            labels: HashMap::new(),
            variables: HashMap::new(),
            external_functions: ExternalFunctionTable::new(),
            objects: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Program::new("")
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    pub fn add_label(&mut self, name: impl Into<String>, address: usize, is_function: bool) {
        self.labels.insert(name.into(), (address, is_function));
    }

    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn add_object(&mut self, object: Program) {
        self.objects.push(object);
    }

    /// True for a bare name declared in this program's own variable table,
    /// or for one of the implicit machine-like aliases every program
    /// exposes (spec §4.2, Glossary "Variable slot"): `%rax`, `%xmm0..9`,
    /// `argN`. Cross-object resolution is handled by `ProgramRegistry`.
    pub fn is_local_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name) || Program::is_register_alias(name)
    }

    pub fn is_register_alias(name: &str) -> bool {
        if name == "%rax" {
            return true;
        }
        if let Some(digits) = name.strip_prefix("%xmm") {
            return matches!(digits.parse::<u32>(), Ok(0..=9));
        }
        if let Some(digits) = name.strip_prefix("arg") {
            return !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_register_aliases() {
        assert!(Program::is_register_alias("%rax"));
        assert!(Program::is_register_alias("%xmm0"));
        assert!(Program::is_register_alias("%xmm9"));
        assert!(!Program::is_register_alias("%xmm10"));
        assert!(Program::is_register_alias("arg0"));
        assert!(Program::is_register_alias("arg12"));
        assert!(!Program::is_register_alias("argument"));
        assert!(!Program::is_register_alias("counter"));
    }
}
