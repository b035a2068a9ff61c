// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `math.pow`/`sqrt`/`abs`, grounded in `modules/std/std.cpp`'s
//! `mxvm_std_pow`/`sqrt`/`abs`/`fabs`.

use mxvm_runtime::{Interpreter, ModuleRegistry};
use mxvm_types::{MxvmError, Operand, VarType, Value};

pub fn register(registry: &mut ModuleRegistry) {
    registry.register("math.pow", Box::new(pow));
    registry.register("math.sqrt", Box::new(sqrt));
    registry.register("math.abs", Box::new(abs));
}

fn arg_float(interp: &mut Interpreter, op: &Operand) -> Result<f64, MxvmError> {
    let value = interp.resolve(op)?;
    match value.tag {
        VarType::Float => Ok(value.float_value),
        VarType::Integer | VarType::Byte => Ok(value.int_value as f64),
        other => Err(MxvmError::ty(format!("expected a numeric argument, found {other}"))),
    }
}

fn pow(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    if args.len() != 2 {
        return Err(MxvmError::semantic("math.pow requires (base, exponent)"));
    }
    let base = arg_float(interp, &args[0])?;
    let exp = arg_float(interp, &args[1])?;
    Ok(Value::float(base.powf(exp)))
}

fn sqrt(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("math.sqrt requires one argument"))?;
    let x = arg_float(interp, op)?;
    if x < 0.0 {
        return Err(MxvmError::host("math.sqrt of a negative number"));
    }
    Ok(Value::float(x.sqrt()))
}

/// Unlike the reference implementation's separate `mxvm_std_abs` (integer)
/// and `mxvm_std_fabs` (float) entry points, one `abs` here dispatches on
/// the argument's dynamic tag, since MXVM values carry their own type.
fn abs(interp: &mut Interpreter, args: &[Operand]) -> Result<Value, MxvmError> {
    let op = args
        .first()
        .ok_or_else(|| MxvmError::semantic("math.abs requires one argument"))?;
    let value = interp.resolve(op)?;
    match value.tag {
        VarType::Integer | VarType::Byte => Ok(Value::int(value.int_value.abs())),
        VarType::Float => Ok(Value::float(value.float_value.abs())),
        other => Err(MxvmError::ty(format!("math.abs requires a numeric argument, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings};

    fn interp() -> Interpreter {
        Interpreter::new(Program::root(), ProgramSettings::default())
    }

    #[test]
    fn pow_raises_to_the_exponent() {
        let mut interp = interp();
        let result = pow(&mut interp, &[Operand::constant("2"), Operand::constant("10")]).unwrap();
        assert_eq!(result.float_value, 1024.0);
    }

    #[test]
    fn sqrt_of_a_negative_number_is_a_host_error() {
        let mut interp = interp();
        let err = sqrt(&mut interp, &[Operand::constant("-4")]).unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Host);
    }

    #[test]
    fn abs_dispatches_on_dynamic_type() {
        let mut interp = interp();
        let int_result = abs(&mut interp, &[Operand::constant("-7")]).unwrap();
        assert_eq!(int_result.int_value, 7);
        let float_result = abs(&mut interp, &[Operand::constant("-1.5")]).unwrap();
        assert_eq!(float_result.float_value, 1.5);
    }
}
