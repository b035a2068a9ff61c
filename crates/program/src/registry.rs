// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Cross-object variable resolution (spec §4.2, §9 "Object tree / nesting").
//!
//! The reference implementation resolves an unqualified name by scanning
//! every sibling object through a process-wide registry. This crate keeps
//! the same lookup order but replaces the global with an explicit
//! `ProgramRegistry` borrowing the object tree, and replaces hash-map
//! iteration (whose order the spec itself flags as non-deterministic,
//! §9 Open Questions) with a depth-first walk over `Program::objects`,
//! which is a `Vec` and therefore has a fixed, reproducible order.

use mxvm_types::MxvmError;

use crate::program::Program;
use crate::variable::Variable;

pub struct ProgramRegistry<'a> {
    root: &'a Program,
}

impl<'a> ProgramRegistry<'a> {
    pub fn new(root: &'a Program) -> Self {
        ProgramRegistry { root }
    }

    /// Resolves `name` as seen from `current`:
    ///   1. if qualified (`object.var`), look up `object` anywhere in the
    ///      tree and then `var` in its local table;
    ///   2. else try `current`'s own table;
    ///   3. else try the root's table;
    ///   4. else scan every other object in the tree, first match wins.
    pub fn get_variable(&self, current: &'a Program, name: &str) -> Result<&'a Variable, MxvmError> {
        if let Some((object_name, var_name)) = name.split_once('.') {
            let object = self
                .find_object(object_name)
                .ok_or_else(|| MxvmError::semantic(format!("unknown object '{object_name}'")))?;
            return object
                .variables
                .get(var_name)
                .ok_or_else(|| MxvmError::semantic(format!("undefined variable '{name}'")));
        }

        if let Some(v) = current.variables.get(name) {
            return Ok(v);
        }
        if let Some(v) = self.root.variables.get(name) {
            return Ok(v);
        }
        for object in self.all_objects() {
            if std::ptr::eq(object, current) {
                continue;
            }
            if let Some(v) = object.variables.get(name) {
                return Ok(v);
            }
        }

        Err(MxvmError::semantic(format!("undefined variable '{name}'")))
    }

    /// Same resolution order as `get_variable`, but also recognizes the
    /// implicit register aliases and never errors.
    pub fn is_variable(&self, current: &'a Program, name: &str) -> bool {
        if Program::is_register_alias(name) {
            return true;
        }
        self.get_variable(current, name).is_ok()
    }

    fn find_object(&self, name: &str) -> Option<&'a Program> {
        fn walk<'a>(program: &'a Program, name: &str) -> Option<&'a Program> {
            if program.name == name {
                return Some(program);
            }
            program.objects.iter().find_map(|child| walk(child, name))
        }
        walk(self.root, name)
    }

    fn all_objects(&self) -> Vec<&'a Program> {
        fn walk<'a>(program: &'a Program, out: &mut Vec<&'a Program>) {
            out.push(program);
            for child in &program.objects {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_types::{VarType, Value};
    use crate::variable::Variable;

    fn leaf(name: &str, var: &str) -> Program {
        let mut p = Program::new(name);
        p.add_variable(Variable::new(var, VarType::Integer, Value::int(1)).in_object(name));
        p
    }

    #[test]
    fn resolves_bare_name_in_sibling_first_match() {
        let mut root = Program::root();
        root.add_object(leaf("a", "shared"));
        root.add_object(leaf("b", "shared"));

        let registry = ProgramRegistry::new(&root);
        let current = &root.objects[1]; // "b", which does not declare "shared"
        let resolved = registry.get_variable(current, "shared").unwrap();
        assert_eq!(resolved.object.as_deref(), Some("a"));
    }

    #[test]
    fn resolves_qualified_name_anywhere_in_tree() {
        let mut root = Program::root();
        root.add_object(leaf("a", "shared"));

        let registry = ProgramRegistry::new(&root);
        let resolved = registry.get_variable(&root, "a.shared").unwrap();
        assert_eq!(resolved.name, "shared");
    }

    #[test]
    fn register_aliases_are_always_variables() {
        let root = Program::root();
        let registry = ProgramRegistry::new(&root);
        assert!(registry.is_variable(&root, "%rax"));
        assert!(registry.is_variable(&root, "%xmm3"));
        assert!(registry.is_variable(&root, "arg0"));
        assert!(!registry.is_variable(&root, "nonexistent"));
    }
}
