// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Named, typed storage (spec §3 "Variable").

use mxvm_types::{VarType, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// the object that declared this variable, `None` for the root program.
    pub object: Option<String>,
    pub is_global: bool,
    /// the type fixed at parse time; `value.tag` may drift from this via
    /// `mov`/coercion, matching the reference implementation's `VarType`
    /// vs `Variable_Value::type` split.
    pub declared_type: VarType,
    pub value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, declared_type: VarType, value: Value) -> Self {
        Variable {
            name: name.into(),
            object: None,
            is_global: false,
            declared_type,
            value,
        }
    }

    pub fn in_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    /// the name this variable is stored/looked-up under once flattened:
    /// `<object>.<name>` for nested variables, bare `name` for root ones.
    pub fn qualified_name(&self) -> String {
        match &self.object {
            Some(object) => format!("{object}.{}", self.name),
            None => self.name.clone(),
        }
    }
}
