// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `string.strlen`/`strcpy`/`strcat`/`concat`, grounded in
//! `modules/string/string.cpp`'s buffer-size-checked helpers.

use mxvm_runtime::{Interpreter, ModuleRegistry};
use mxvm_types::{MxvmError, Operand, VarType, Value};

pub fn register(registry: &mut ModuleRegistry) {
    registry.register("string.strlen", Box::new(strlen));
    registry.register("string.strcpy", Box::new(strcpy));
    registry.register("string.strcat", Box::new(strcat));
    registry.register("string.concat", Box::new(concat));
}

fn arg_string(interp: &mut Interpreter, op: &Operand) -> Result<String, MxvmError> {
    let value = interp.resolve(op)?;
    match value.tag {
        VarType::String => Ok(value.str_value),
        other => Err(MxvmError::ty(format!("expected a STRING argument, found {other}"))),
    }
}

/// `truncates to `dst`'s `buffer_size` when it declares one, the same way
/// the reference VM rejects writes past a fixed STRING buffer.
fn fit_to_buffer(dst: &Value, text: String) -> String {
    if dst.buffer_size > 0 && (text.len() as u64) >= dst.buffer_size {
        text.chars().take(dst.buffer_size as usize - 1).collect()
    } else {
        text
    }
}

fn strlen(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("string.strlen requires one argument"))?;
    let s = arg_string(interp, op)?;
    Ok(Value::int(s.len() as i64))
}

fn strcpy(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("string.strcpy requires (dst, src)"));
    }
    let dst_name = Interpreter::require_variable_name(&args[0])?.to_string();
    let src = arg_string(interp, &args[1])?;
    let dst_value = interp.get_variable_value(&dst_name)?;
    if dst_value.tag != VarType::String {
        return Err(MxvmError::ty("string.strcpy requires a STRING destination"));
    }
    let copied = fit_to_buffer(&dst_value, src);
    let result = Value {
        tag: VarType::String,
        str_value: copied,
        buffer_size: dst_value.buffer_size,
        ..Value::default()
    };
    interp.set_variable_value(&dst_name, result.clone())?;
    Ok(result)
}

fn strcat(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("string.strcat requires (dst, src)"));
    }
    let dst_name = Interpreter::require_variable_name(&args[0])?.to_string();
    let src = arg_string(interp, &args[1])?;
    let dst_value = interp.get_variable_value(&dst_name)?;
    if dst_value.tag != VarType::String {
        return Err(MxvmError::ty("string.strcat requires a STRING destination"));
    }
    let mut joined = dst_value.str_value.clone();
    joined.push_str(&src);
    let joined = fit_to_buffer(&dst_value, joined);
    let result = Value {
        tag: VarType::String,
        str_value: joined,
        buffer_size: dst_value.buffer_size,
        ..Value::default()
    };
    interp.set_variable_value(&dst_name, result.clone())?;
    Ok(result)
}

/// Unlike `strcat`, `concat` does not mutate either argument: it allocates
/// and returns a fresh STRING, matching `string.cpp`'s `snprintf`-backed
/// helper of building a new buffer rather than writing through one of the
/// inputs.
fn concat(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("string.concat requires (a, b)"));
    }
    let a = arg_string(interp, &args[0])?;
    let b = arg_string(interp, &args[1])?;
    Ok(Value::string(a + &b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings, Variable};
    use mxvm_types::{Operand, VarType};

    fn interp_with(name: &str, value: Value) -> Interpreter {
        let mut program = Program::root();
        program.add_variable(Variable::new(name, VarType::String, value));
        Interpreter::new(program, ProgramSettings::default())
    }

    #[test]
    fn strlen_counts_bytes() {
        let mut interp = interp_with("s", Value::string("hello"));
        let result = strlen(&mut interp, &[Operand::variable("s")]).unwrap();
        assert_eq!(result.int_value, 5);
    }

    #[test]
    fn strcpy_overwrites_destination() {
        let mut interp = interp_with("dst", Value::string("old"));
        let result = strcpy(
            &mut interp,
            &[Operand::variable("dst"), Operand::constant("new")],
        )
        .unwrap();
        assert_eq!(result.str_value, "new");
        assert_eq!(interp.get_variable_value("dst").unwrap().str_value, "new");
    }

    #[test]
    fn strcat_appends_in_place() {
        let mut interp = interp_with("dst", Value::string("foo"));
        let result = strcat(
            &mut interp,
            &[Operand::variable("dst"), Operand::constant("bar")],
        )
        .unwrap();
        assert_eq!(result.str_value, "foobar");
    }

    #[test]
    fn concat_does_not_mutate_either_argument() {
        let mut interp = interp_with("a", Value::string("foo"));
        interp
            .program
            .add_variable(Variable::new("b", VarType::String, Value::string("bar")));
        let result = concat(&mut interp, &[Operand::variable("a"), Operand::variable("b")]).unwrap();
        assert_eq!(result.str_value, "foobar");
        assert_eq!(interp.get_variable_value("a").unwrap().str_value, "foo");
        assert_eq!(interp.get_variable_value("b").unwrap().str_value, "bar");
    }
}
