// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The host side of `invoke` (spec §4.5): loading external modules and
//! handing the interpreter a populated [`mxvm_runtime::ModuleRegistry`].
//!
//! Two sources feed the same registry:
//! - [`builtin`]: an in-process `string`/`io`/`math` module set, always
//!   available.
//! - [`dynamic`]: `dlopen`/`dlsym` loading of a user-built shared object
//!   that exports the `mxvm_module_*` convention documented there.
//!
//! note: to load a library and get a symbol (function or 'global
//! variable'):
//! - linux:   dlopen/dlsym/dlerror/dlclose
//! - windows: LoadLibraryW(LoadLibraryExW, GetModuleHandleExW)/GetProcAddress/FreeLibrary

mod platform;

pub mod builtin;
pub mod dynamic;

use std::{
    ffi::{c_char, CString, OsString},
    os::raw::c_void,
};

#[cfg(target_family = "unix")]
pub use platform::linux::*;

pub use dynamic::load_external_module;

pub fn str_to_osstring(s: &str) -> OsString {
    let oss: OsString = OsString::from(s);
    oss
}

pub fn str_to_cstring(s: &str) -> CString {
    CString::new(s).unwrap()
}

#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub fn cstr_pointer_to_str(cstr_ptr: *const c_char) -> &'static str {
    unsafe { std::ffi::CStr::from_ptr(cstr_ptr).to_str().unwrap() }
}

pub fn transmute_symbol_to<T>(ptr: *mut c_void) -> T {
    unsafe { std::mem::transmute_copy::<*mut c_void, T>(&ptr) }
}

/// Builds the registry the interpreter is handed at startup: builtins
/// always present, plus one `dlopen`'d module per `--module-path`
/// argument (spec §4.5, §7 "Modules").
pub fn load_registry(module_paths: &[String]) -> Result<mxvm_runtime::ModuleRegistry, mxvm_types::MxvmError> {
    let mut registry = mxvm_runtime::ModuleRegistry::new();
    builtin::register_builtins(&mut registry);
    for path in module_paths {
        let (name, loaded) = dynamic::load_external_module(path)?;
        tracing::debug!(module = %name, path, "loaded external module");
        registry.merge(loaded);
    }
    Ok(registry)
}
