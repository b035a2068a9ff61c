// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `push`/`pop`/`stack_load`/`stack_store`/`stack_sub` (spec §4.4.1, §9
//! "Stack values": only integers and pointers ever live on the stack).

use mxvm_types::MxvmError;

use crate::value_stack::StackVal;

use super::{Interpreter, Step};

pub fn push(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let value = interp.resolve(&instr.op1)?;
    let stack_val = if instr.op1.is_variable() {
        StackVal::from_value(&value)?
    } else {
        // constants are always pushed as integers (spec §9).
        StackVal::I64(value.to_int()?.int_value)
    };
    interp.stack.push(stack_val);
    Ok(Step::Continue)
}

pub fn pop(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.declared_type;
    let stack_val = interp.stack.pop()?;
    if !stack_val.matches_type(dest_tag) {
        return Err(MxvmError::ty(format!(
            "pop: stack value does not match destination type {dest_tag}"
        )));
    }
    interp.set_variable_value(&dst, stack_val.to_value(dest_tag))?;
    Ok(Step::Continue)
}

pub fn stack_load(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.declared_type;
    let index = interp.resolve(&instr.op2)?.to_int()?.int_value as usize;
    let stack_val = interp.stack.get(index)?;
    if !stack_val.matches_type(dest_tag) {
        return Err(MxvmError::ty(format!(
            "stack_load: stack value does not match destination type {dest_tag}"
        )));
    }
    interp.set_variable_value(&dst, stack_val.to_value(dest_tag))?;
    Ok(Step::Continue)
}

pub fn stack_store(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let value = interp.resolve(&instr.op1)?;
    let index = interp.resolve(&instr.op2)?.to_int()?.int_value as usize;
    let stack_val = if instr.op1.is_variable() {
        StackVal::from_value(&value)?
    } else {
        StackVal::I64(value.to_int()?.int_value)
    };
    interp.stack.set(index, stack_val)?;
    Ok(Step::Continue)
}

pub fn stack_sub(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let n = interp.resolve(&instr.op1)?.to_int()?.int_value;
    interp.stack.pop_n(n.max(0) as usize)?;
    Ok(Step::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings, Variable};
    use mxvm_types::{Instruction, Opcode, Operand, VarType, Value};

    #[test]
    fn push_pop_round_trip() {
        let mut program = Program::root();
        program.add_variable(Variable::new("x", VarType::Integer, Value::int(0)));
        let mut push_instr = Instruction::new(Opcode::push);
        push_instr.op1 = Operand::constant("42");
        program.add_instruction(push_instr);
        let mut pop_instr = Instruction::new(Opcode::pop);
        pop_instr.op1 = Operand::variable("x");
        program.add_instruction(pop_instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        interp.pc = 0;
        push(&mut interp).unwrap();
        interp.pc = 1;
        pop(&mut interp).unwrap();
        assert_eq!(interp.get_variable_value("x").unwrap().int_value, 42);
    }

    #[test]
    fn pop_type_mismatch_is_rejected() {
        let mut program = Program::root();
        program.add_variable(Variable::new("p", VarType::Pointer, Value::null_pointer()));
        let mut push_instr = Instruction::new(Opcode::push);
        push_instr.op1 = Operand::constant("1");
        program.add_instruction(push_instr);
        let mut pop_instr = Instruction::new(Opcode::pop);
        pop_instr.op1 = Operand::variable("p");
        program.add_instruction(pop_instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        interp.pc = 0;
        push(&mut interp).unwrap();
        interp.pc = 1;
        let err = pop(&mut interp).unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Type);
    }
}
