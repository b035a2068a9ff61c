// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `io.print_line`/`file_open`/`file_write`/`file_read_line`/`file_close`,
//! grounded in `modules/io/io.cpp`'s convention of wrapping a real libc
//! `FILE*` as a variable's pointer payload. Here the handle is tagged
//! `EXTERN` rather than `POINTER`, since it is host-owned and must never
//! be read or written through `load`/`store` like a VM heap address.

use std::ffi::CString;
use std::io::Write;

use libc::{c_char, fclose, fgets, fopen, fwrite, FILE};
use mxvm_runtime::{Interpreter, ModuleRegistry};
use mxvm_types::{MxvmError, Operand, VarType, Value};

const READ_LINE_BUFFER: usize = 4096;

pub fn register(registry: &mut ModuleRegistry) {
    registry.register("io.print_line", Box::new(print_line));
    registry.register("io.file_open", Box::new(file_open));
    registry.register("io.file_write", Box::new(file_write));
    registry.register("io.file_read_line", Box::new(file_read_line));
    registry.register("io.file_close", Box::new(file_close));
}

fn arg_string(interp: &mut Interpreter, op: &Operand) -> Result<String, MxvmError> {
    let value = interp.resolve(op)?;
    match value.tag {
        VarType::String => Ok(value.str_value),
        other => Err(MxvmError::ty(format!("expected a STRING argument, found {other}"))),
    }
}

fn arg_handle(interp: &mut Interpreter, op: &Operand) -> Result<*mut FILE, MxvmError> {
    let value = interp.resolve(op)?;
    if value.tag != VarType::Extern {
        return Err(MxvmError::ty(format!(
            "expected an EXTERN file handle, found {}",
            value.tag
        )));
    }
    if value.ptr_addr == 0 {
        return Err(MxvmError::host("use of a closed or null file handle"));
    }
    Ok(value.ptr_addr as *mut FILE)
}

fn print_line(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("io.print_line requires one argument"))?;
    let line = arg_string(interp, op)?;
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{line}").map_err(|e| MxvmError::host(format!("write to stdout failed: {e}")))?;
    stdout
        .flush()
        .map_err(|e| MxvmError::host(format!("failed to flush stdout: {e}")))?;
    Ok(Value::int((line.len() + 1) as i64))
}

fn file_open(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("io.file_open requires (path, mode)"));
    }
    let path = arg_string(interp, &args[0])?;
    let mode = arg_string(interp, &args[1])?;
    let path_c = CString::new(path).map_err(|_| MxvmError::host("path contains a NUL byte"))?;
    let mode_c = CString::new(mode).map_err(|_| MxvmError::host("mode contains a NUL byte"))?;
    let handle = unsafe { fopen(path_c.as_ptr(), mode_c.as_ptr()) };
    Ok(Value {
        tag: VarType::Extern,
        ptr_addr: handle as usize,
        ..Value::default()
    })
}

fn file_write(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("io.file_write requires (handle, text)"));
    }
    let handle = arg_handle(interp, &args[0])?;
    let text = arg_string(interp, &args[1])?;
    let written = unsafe {
        fwrite(
            text.as_ptr() as *const libc::c_void,
            1,
            text.len(),
            handle,
        )
    };
    Ok(Value::int(written as i64))
}

fn file_read_line(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("io.file_read_line requires one argument"))?;
    let handle = arg_handle(interp, op)?;
    let mut buffer = vec![0u8; READ_LINE_BUFFER];
    let result = unsafe {
        fgets(
            buffer.as_mut_ptr() as *mut c_char,
            buffer.len() as i32,
            handle,
        )
    };
    if result.is_null() {
        // end of file: spec treats an exhausted read the same as an empty line.
        return Ok(Value::string(String::new()));
    }
    let len = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    buffer.truncate(len);
    let mut line = String::from_utf8_lossy(&buffer).into_owned();
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::string(line))
}

fn file_close(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("io.file_close requires one argument"))?;
    let handle_name = Interpreter::require_variable_name(op)?.to_string();
    let handle = arg_handle(interp, op)?;
    let status = unsafe { fclose(handle) };
    // null out the handle so a later use is caught by `arg_handle` rather
    // than re-closing a dangling FILE*.
    interp.set_variable_value(
        &handle_name,
        Value {
            tag: VarType::Extern,
            ptr_addr: 0,
            ..Value::default()
        },
    )?;
    Ok(Value::int(status as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings};

    #[test]
    fn print_line_reports_bytes_written() {
        let mut interp = Interpreter::new(Program::root(), ProgramSettings::default());
        let result = print_line(&mut interp, &[Operand::constant("hello")]).unwrap();
        assert_eq!(result.int_value, 6);
    }

    #[test]
    fn a_null_handle_is_a_host_error() {
        let mut interp = Interpreter::new(Program::root(), ProgramSettings::default());
        program_set(&mut interp, "f", Value { tag: VarType::Extern, ..Value::default() });
        let err = file_write(&mut interp, &[Operand::variable("f"), Operand::constant("x")]).unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Host);
    }

    fn program_set(interp: &mut Interpreter, name: &str, value: Value) {
        interp
            .program
            .add_variable(mxvm_program::Variable::new(name, VarType::Extern, value));
    }
}
