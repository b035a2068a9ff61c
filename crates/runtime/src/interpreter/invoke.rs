// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `invoke`/`return` (spec §4.5): calls out to a registered `ExternFn`
//! and stashes the result where `return` can later copy it from.

use mxvm_types::{MxvmError, Operand, VarType};

use super::{Interpreter, Step};

pub fn invoke(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let name = instr.op1.text.clone();

    let args: Vec<Operand> = std::iter::once(instr.op2.clone())
        .chain(std::iter::once(instr.op3.clone()))
        .chain(instr.extra.iter().cloned())
        .filter(|op| !op.is_empty())
        .collect();

    if !interp.program.external_functions.contains(&name) && !interp.modules.contains(&name) {
        return Err(MxvmError::semantic(format!(
            "call to undeclared external function '{name}'"
        )));
    }

    // `ExternFn` needs `&mut Interpreter` to recurse into `invoke` itself,
    // so the registry can't stay borrowed from `interp` while it's called;
    // swap it out for the duration of the call instead.
    let modules = std::mem::take(&mut interp.modules);
    let outcome = match modules.get(&name) {
        Some(f) => f(interp, &args),
        None => Err(MxvmError::host(format!(
            "no module provides external function '{name}'"
        ))),
    };
    interp.modules = modules;
    let result = outcome?;

    let register = if result.tag == VarType::Float { "%xmm0" } else { "%rax" };
    interp.last_result = register.to_string();
    interp.set_variable_value(register, result)?;
    Ok(Step::Continue)
}

pub fn r#return(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.declared_type;
    let result_register = interp.last_result.clone();
    let result = interp.get_variable_value(&result_register)?;
    if result.tag != dest_tag {
        return Err(MxvmError::ty(format!(
            "return: last invoke result was {}, destination '{dst}' expects {dest_tag}",
            result.tag
        )));
    }
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}
