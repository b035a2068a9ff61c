// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The value stack (spec §3, §9 "Stack values"): a two-variant sum type
//! rather than a tagged `Value`, since `push`/`pop`/`call`/`ret` only ever
//! deal in raw integers or pointers.

use mxvm_types::{MxvmError, VarType, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackVal {
    I64(i64),
    Ptr(usize),
}

impl StackVal {
    pub fn matches_type(&self, tag: VarType) -> bool {
        match (self, tag) {
            (StackVal::I64(_), VarType::Integer | VarType::Byte) => true,
            (StackVal::Ptr(_), VarType::Pointer) => true,
            _ => false,
        }
    }

    pub fn to_value(self, tag: VarType) -> Value {
        match self {
            StackVal::I64(v) if tag == VarType::Byte => Value::byte(v as u8),
            StackVal::I64(v) => Value::int(v),
            StackVal::Ptr(addr) => Value {
                tag: VarType::Pointer,
                ptr_addr: addr,
                ..Value::default()
            },
        }
    }

    pub fn from_value(value: &Value) -> Result<StackVal, MxvmError> {
        match value.tag {
            VarType::Integer | VarType::Byte => Ok(StackVal::I64(value.int_value)),
            VarType::Pointer => Ok(StackVal::Ptr(value.ptr_addr)),
            other => Err(MxvmError::ty(format!(
                "only integers and pointers can be pushed on the stack, found {other}"
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct ValueStack {
    entries: Vec<StackVal>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: StackVal) {
        self.entries.push(value);
    }

    pub fn pop(&mut self) -> Result<StackVal, MxvmError> {
        self.entries
            .pop()
            .ok_or_else(|| MxvmError::control("stack underflow"))
    }

    pub fn pop_n(&mut self, n: usize) -> Result<(), MxvmError> {
        if self.entries.len() < n {
            return Err(MxvmError::control("stack underflow"));
        }
        self.entries.truncate(self.entries.len() - n);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Result<StackVal, MxvmError> {
        self.entries
            .get(index)
            .copied()
            .ok_or_else(|| MxvmError::control(format!("stack index {index} out of range")))
    }

    pub fn set(&mut self, index: usize, value: StackVal) -> Result<(), MxvmError> {
        let slot = self
            .entries
            .get_mut(index)
            .ok_or_else(|| MxvmError::control(format!("stack index {index} out of range")))?;
        *slot = value;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
