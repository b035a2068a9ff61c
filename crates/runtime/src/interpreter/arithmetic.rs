// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `mov` and the two/three-operand arithmetic and bitwise family (spec
//! §4.1, §4.4.1).

use mxvm_types::value::{ArithOp, BitOp};
use mxvm_types::MxvmError;

use super::{Interpreter, Step};

pub fn mov(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.declared_type;
    let value = interp.resolve_as(&instr.op2, dest_tag)?;
    interp.set_variable_value(&dst, value)?;
    Ok(Step::Continue)
}

/// Resolves the `(a, b)` operand pair for a two- or three-operand
/// arithmetic/bitwise instruction: `op dst, src` updates `dst` in place
/// (`a = dst, b = src`); `op dst, a, b` assigns `dst <- a OP b`.
fn operand_pair(interp: &mut Interpreter, dst: &str) -> Result<(mxvm_types::Value, mxvm_types::Value), MxvmError> {
    let instr = interp.current_instruction();
    if instr.op3.is_empty() {
        let a = interp.get_variable_value(dst)?;
        let b = interp.resolve(&instr.op2)?;
        Ok((a, b))
    } else {
        let a = interp.resolve(&instr.op2)?;
        let b = interp.resolve(&instr.op3)?;
        Ok((a, b))
    }
}

fn arith_op(interp: &mut Interpreter, op: ArithOp) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.value.tag;
    let (a, b) = operand_pair(interp, &dst)?;
    let result = mxvm_types::Value::arith(dest_tag, op, &a, &b)?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}

pub fn add(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    arith_op(interp, ArithOp::Add)
}

pub fn sub(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    arith_op(interp, ArithOp::Sub)
}

pub fn mul(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    arith_op(interp, ArithOp::Mul)
}

pub fn div(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    arith_op(interp, ArithOp::Div)
}

pub fn modulo(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    arith_op(interp, ArithOp::Mod)
}

pub fn neg(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let value = interp.get_variable_value(&dst)?;
    let result = value.negate()?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}

pub fn not(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let value = interp.get_variable_value(&dst)?;
    let result = value.logical_not()?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}

fn bitwise_op(interp: &mut Interpreter, op: BitOp) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let (a, b) = operand_pair(interp, &dst)?;
    let result = a.bitwise(op, &b)?;
    interp.set_variable_value(&dst, result)?;
    Ok(Step::Continue)
}

pub fn and(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    bitwise_op(interp, BitOp::And)
}

pub fn or(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    bitwise_op(interp, BitOp::Or)
}

pub fn xor(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    bitwise_op(interp, BitOp::Xor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings, Variable};
    use mxvm_types::{Instruction, Opcode, Operand, VarType, Value};

    fn interp_with(mut program: Program) -> Interpreter {
        program.add_variable(Variable::new("x", VarType::Integer, Value::int(10)));
        Interpreter::new(program, ProgramSettings::default())
    }

    #[test]
    fn two_operand_add_updates_in_place() {
        let mut program = Program::root();
        let mut instr = Instruction::new(Opcode::add);
        instr.op1 = Operand::variable("x");
        instr.op2 = Operand::constant("5");
        program.add_instruction(instr);
        let mut interp = interp_with(program);
        add(&mut interp).unwrap();
        assert_eq!(interp.get_variable_value("x").unwrap().int_value, 15);
    }

    #[test]
    fn three_operand_sub_assigns_dst() {
        let mut program = Program::root();
        let mut instr = Instruction::new(Opcode::sub);
        instr.op1 = Operand::variable("x");
        instr.op2 = Operand::constant("9");
        instr.op3 = Operand::constant("4");
        program.add_instruction(instr);
        let mut interp = interp_with(program);
        sub(&mut interp).unwrap();
        assert_eq!(interp.get_variable_value("x").unwrap().int_value, 5);
    }

    #[test]
    fn div_by_zero_yields_zero_not_a_trap() {
        let mut program = Program::root();
        let mut instr = Instruction::new(Opcode::div);
        instr.op1 = Operand::variable("x");
        instr.op2 = Operand::constant("0");
        program.add_instruction(instr);
        let mut interp = interp_with(program);
        div(&mut interp).unwrap();
        assert_eq!(interp.get_variable_value("x").unwrap().int_value, 0);
    }
}
