// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The always-available builtin module set (spec §4.5, §7 "Modules" option
//! (b)): `string`, `io` and `math`, grounded in the reference
//! implementation's `modules/string`, `modules/io` and `modules/std`
//! but narrowed to the functions this toolchain actually needs.

pub mod io;
pub mod math;
pub mod string;

use mxvm_runtime::ModuleRegistry;

pub fn register_builtins(registry: &mut ModuleRegistry) {
    string::register(registry);
    io::register(registry);
    math::register(registry);
}
