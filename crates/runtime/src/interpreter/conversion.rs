// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `to_int` / `to_float` (spec §4.1 type coercion).

use mxvm_types::{MxvmError, VarType};

use super::{Interpreter, Step};

pub fn to_int(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    if interp.get_variable(&dst)?.declared_type != VarType::Integer {
        return Err(MxvmError::ty("to_int requires an INTEGER destination"));
    }
    let src = interp.resolve(&instr.op2)?;
    let result = src.to_int()?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}

pub fn to_float(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    if interp.get_variable(&dst)?.declared_type != VarType::Float {
        return Err(MxvmError::ty("to_float requires a FLOAT destination"));
    }
    let src = interp.resolve(&instr.op2)?;
    let result = src.to_float()?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}
