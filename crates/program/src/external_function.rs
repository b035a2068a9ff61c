// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Declarations of external functions a program has asked to `invoke`
//! (spec §4.5). This crate only tracks *which names are known*; the
//! actual loading and calling convention live in `mxvm-modules`, which
//! depends on this crate rather than the other way around.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFunctionDecl {
    /// the lookup key as written in `invoke`: either `<function>` or
    /// `<module>.<function>`.
    pub qualified_name: String,
    pub module: Option<String>,
}

impl ExternalFunctionDecl {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let module = qualified_name
            .find('.')
            .map(|idx| qualified_name[..idx].to_string());
        ExternalFunctionDecl {
            qualified_name,
            module,
        }
    }
}

/// Registry of external-function declarations, keyed by their lookup name.
/// Merging two tables during flattening is first-registration-wins (spec
/// §4.3).
#[derive(Debug, Clone, Default)]
pub struct ExternalFunctionTable {
    decls: HashMap<String, ExternalFunctionDecl>,
}

impl ExternalFunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>) {
        let decl = ExternalFunctionDecl::new(name);
        self.decls.entry(decl.qualified_name.clone()).or_insert(decl);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ExternalFunctionDecl> {
        self.decls.get(name)
    }

    /// Merge `other` into `self`, keeping `self`'s entry on any name
    /// collision (spec §4.3: "first-registration-wins").
    pub fn merge_from(&mut self, other: &ExternalFunctionTable) {
        for (name, decl) in &other.decls {
            self.decls.entry(name.clone()).or_insert_with(|| decl.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalFunctionDecl> {
        self.decls.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins_on_merge() {
        let mut root = ExternalFunctionTable::new();
        root.register("string.concat");

        let mut child = ExternalFunctionTable::new();
        child.register("string.concat");
        child.register("io.print_line");

        root.merge_from(&child);

        assert!(root.contains("string.concat"));
        assert!(root.contains("io.print_line"));
        assert_eq!(root.iter().count(), 2);
    }
}
