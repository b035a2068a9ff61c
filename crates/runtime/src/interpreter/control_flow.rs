// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `call`/`ret`/`done`/`exit` (spec §4.4.1).

use mxvm_types::MxvmError;

use crate::value_stack::StackVal;

use super::{Interpreter, Step};

/// Pushes the return address and jumps. Unlike the reference C++ loop
/// (which stores `target - 1` because its dispatch loop unconditionally
/// increments `pc` every iteration, jumps included), this interpreter's
/// `Step::Jump` sets `pc` to the exact target, so the return address
/// pushed here is simply the instruction after `call`.
pub fn call(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let target = interp.label_address(&instr.op1.text)?;
    interp.stack.push(StackVal::I64((interp.pc + 1) as i64));
    Ok(Step::Jump(target))
}

pub fn ret(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    match interp.stack.pop()? {
        StackVal::I64(address) => Ok(Step::Jump(address as usize)),
        StackVal::Ptr(_) => Err(MxvmError::control(
            "ret found a pointer on top of the stack, expected a return address",
        )),
    }
}

pub fn done(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    interp.exit_code = 0;
    Ok(Step::Halt)
}

pub fn exit(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let code = interp.resolve(&instr.op1)?;
    interp.exit_code = code.to_int()?.int_value;
    Ok(Step::Halt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings};
    use mxvm_types::{Instruction, Opcode, Operand};

    #[test]
    fn call_then_ret_round_trips_to_the_next_instruction() {
        let mut program = Program::root();
        let mut call_instr = Instruction::new(Opcode::call);
        call_instr.op1 = Operand::variable("callee");
        program.add_instruction(call_instr); // index 0
        program.add_instruction(Instruction::new(Opcode::nop)); // index 1, return target
        program.add_label("callee", 5, true);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        let step = call(&mut interp).unwrap();
        assert!(matches!(step, Step::Jump(5)));

        let step = ret(&mut interp).unwrap();
        assert!(matches!(step, Step::Jump(1)));
    }

    #[test]
    fn exit_sets_the_exit_code_and_halts() {
        let mut program = Program::root();
        let mut instr = Instruction::new(Opcode::exit);
        instr.op1 = Operand::constant("7");
        program.add_instruction(instr);
        let mut interp = Interpreter::new(program, ProgramSettings::default());
        let step = exit(&mut interp).unwrap();
        assert!(matches!(step, Step::Halt));
        assert_eq!(interp.exit_code, 7);
    }
}
