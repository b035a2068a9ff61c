// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `dlopen`-based module loading (spec §4.5, §7 "Modules" option (a)).
//!
//! A user shared object exports three C symbols:
//!
//! - `mxvm_module_name() -> *const c_char` — the module's qualifier, e.g.
//!   `"geometry"`, used to register `geometry.<function>`.
//! - `mxvm_module_functions() -> *const *const c_char` — a NUL-terminated
//!   array of the function names the module provides.
//! - `mxvm_<function>(args: *const MxvmArg, arg_count: usize, out: *mut MxvmArg) -> i32`
//!   for every name listed above, returning `0` on success and writing the
//!   result into `*out`; any other value aborts the call as a host error.
//!
//! This is the same shape as the reference VM's statically-linked
//! `RuntimeFunction` table (`program->external_functions`), generalized to
//! a C ABI so it can cross a `dlopen` boundary.

use std::ffi::{c_char, CStr};

use mxvm_runtime::ModuleRegistry;
use mxvm_types::{MxvmError, Operand, VarType, Value};

use crate::{cstr_pointer_to_str, load_library, load_symbol, str_to_cstring, transmute_symbol_to};

/// Tag values for [`MxvmArg::tag`], mirroring [`VarType`] but frozen to a
/// stable numeric ABI independent of the enum's in-process layout.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxvmArgTag {
    Null = 0,
    Integer = 1,
    Float = 2,
    String = 3,
    Pointer = 4,
}

/// A tagged value crossing the `dlopen` boundary. `str_ptr` is only valid
/// for the duration of the call it's passed into; a module that needs to
/// keep a string must copy it.
#[repr(C)]
pub struct MxvmArg {
    pub tag: u8,
    pub int_value: i64,
    pub float_value: f64,
    pub str_ptr: *const c_char,
    pub ptr_value: usize,
}

impl MxvmArg {
    fn null() -> Self {
        MxvmArg {
            tag: MxvmArgTag::Null as u8,
            int_value: 0,
            float_value: 0.0,
            str_ptr: std::ptr::null(),
            ptr_value: 0,
        }
    }

    fn from_value(value: &Value, owned: &mut Vec<std::ffi::CString>) -> Self {
        match value.tag {
            VarType::Integer | VarType::Byte => MxvmArg {
                tag: MxvmArgTag::Integer as u8,
                int_value: value.int_value,
                ..MxvmArg::null()
            },
            VarType::Float => MxvmArg {
                tag: MxvmArgTag::Float as u8,
                float_value: value.float_value,
                ..MxvmArg::null()
            },
            VarType::Pointer => MxvmArg {
                tag: MxvmArgTag::Pointer as u8,
                ptr_value: value.ptr_addr,
                ..MxvmArg::null()
            },
            VarType::String => {
                let c = str_to_cstring(&value.str_value);
                let ptr = c.as_ptr();
                owned.push(c);
                MxvmArg {
                    tag: MxvmArgTag::String as u8,
                    str_ptr: ptr,
                    ..MxvmArg::null()
                }
            }
            _ => MxvmArg::null(),
        }
    }

    fn to_value(&self) -> Result<Value, MxvmError> {
        match self.tag {
            t if t == MxvmArgTag::Null as u8 => Ok(Value::default()),
            t if t == MxvmArgTag::Integer as u8 => Ok(Value::int(self.int_value)),
            t if t == MxvmArgTag::Float as u8 => Ok(Value::float(self.float_value)),
            t if t == MxvmArgTag::Pointer as u8 => Ok(Value {
                tag: VarType::Pointer,
                ptr_addr: self.ptr_value,
                ..Value::default()
            }),
            t if t == MxvmArgTag::String as u8 => {
                if self.str_ptr.is_null() {
                    return Err(MxvmError::host("module returned a null string pointer"));
                }
                let s = unsafe { CStr::from_ptr(self.str_ptr) }
                    .to_string_lossy()
                    .into_owned();
                Ok(Value::string(s))
            }
            other => Err(MxvmError::host(format!("module returned an unknown tag {other}"))),
        }
    }
}

type RawModuleFn = unsafe extern "C" fn(*const MxvmArg, usize, *mut MxvmArg) -> i32;
type NameFn = unsafe extern "C" fn() -> *const c_char;
type FunctionsFn = unsafe extern "C" fn() -> *const *const c_char;

/// `dlopen`s `path`, reads its function manifest, and returns a registry
/// namespaced under the module's declared name.
pub fn load_external_module(path: &str) -> Result<(String, ModuleRegistry), MxvmError> {
    let library = load_library(path).map_err(|e| MxvmError::host(format!("{path}: {e}")))?;

    let name_fn: NameFn = transmute_symbol_to(
        load_symbol(library, "mxvm_module_name")
            .map_err(|e| MxvmError::host(format!("{path}: {e}")))?,
    );
    let module_name = unsafe { cstr_pointer_to_str(name_fn()) }.to_string();

    let functions_fn: FunctionsFn = transmute_symbol_to(
        load_symbol(library, "mxvm_module_functions")
            .map_err(|e| MxvmError::host(format!("{path}: {e}")))?,
    );

    let mut registry = ModuleRegistry::new();
    let mut cursor = unsafe { functions_fn() };
    loop {
        let entry = unsafe { *cursor };
        if entry.is_null() {
            break;
        }
        let function_name = unsafe { cstr_pointer_to_str(entry) }.to_string();
        let symbol_name = format!("mxvm_{function_name}");
        let raw: RawModuleFn = transmute_symbol_to(
            load_symbol(library, &symbol_name)
                .map_err(|e| MxvmError::host(format!("{path}: {symbol_name}: {e}")))?,
        );
        let qualified = format!("{module_name}.{function_name}");
        registry.register(qualified, Box::new(move |interp, operands| call_raw(raw, interp, operands)));
        cursor = unsafe { cursor.add(1) };
    }

    Ok((module_name, registry))
}

fn call_raw(
    raw: RawModuleFn,
    interp: &mut mxvm_runtime::Interpreter,
    operands: &[Operand],
) -> Result<Value, MxvmError> {
    let mut owned_strings = Vec::new();
    let mut args = Vec::with_capacity(operands.len());
    for op in operands {
        let value = interp.resolve(op)?;
        args.push(MxvmArg::from_value(&value, &mut owned_strings));
    }

    let mut out = MxvmArg::null();
    let status = unsafe { raw(args.as_ptr(), args.len(), &mut out as *mut MxvmArg) };
    drop(owned_strings);
    if status != 0 {
        return Err(MxvmError::host(format!(
            "external module function returned non-zero status {status}"
        )));
    }
    out.to_value()
}
