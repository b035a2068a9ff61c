// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The host side of `invoke` (spec §4.5). `mxvm-modules` populates a
//! `ModuleRegistry` two ways — real `dlopen`'d libraries and an in-process
//! builtin set — and hands it to the interpreter, which only ever sees
//! this one indirection.

use std::collections::HashMap;

use mxvm_types::{MxvmError, Operand, Value};

use crate::interpreter::Interpreter;

/// A registered external function: given the interpreter and the raw
/// argument operands (not pre-resolved), in the same shape the reference
/// implementation hands to its `extern "C"` module functions
/// (`Program*, vector<Operand>&`). Taking operands rather than values lets
/// a function such as `strcpy` resolve one operand as a destination
/// variable and mutate it in place, the same way the original does via
/// `program->getVariable(...)`. The return value is written into
/// `%rax`/`%xmm0` (spec §4.5).
pub type ExternFn =
    Box<dyn Fn(&mut Interpreter, &[Operand]) -> Result<Value, MxvmError> + Send + Sync>;

#[derive(Default)]
pub struct ModuleRegistry {
    functions: HashMap<String, ExternFn>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: ExternFn) {
        self.functions.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&ExternFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn merge(&mut self, other: ModuleRegistry) {
        self.functions.extend(other.functions);
    }
}
