// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Ambient run configuration, grounded in the teacher's
//! `program_settings.rs`: a plain struct built once by the CLI and threaded
//! down into the parser, interpreter and code generator.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    SysV,
    Win64,
    /// SysV plus the Darwin peephole pass (spec §4.8b).
    Darwin,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Target::SysV => "linux",
            Target::Win64 => "windows",
            Target::Darwin => "macos",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Target::SysV),
            "windows" => Ok(Target::Win64),
            "macos" => Ok(Target::Darwin),
            other => Err(format!("unknown target '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramSettings {
    pub source_path: String,
    pub target: Target,
    pub optimize: bool,
    pub trace: bool,
    pub module_search_paths: Vec<String>,
}

impl ProgramSettings {
    pub fn new(source_path: &str, target: Target) -> Self {
        Self {
            source_path: source_path.to_owned(),
            target,
            optimize: true,
            trace: false,
            module_search_paths: Vec::new(),
        }
    }
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            source_path: String::new(),
            target: Target::SysV,
            optimize: true,
            trace: false,
            module_search_paths: Vec::new(),
        }
    }
}
