// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `cmp`/`fcmp` and the jump family (spec §4.1, §4.4.1, §9 Open Questions
//! for the parity/overflow/sign jumps).

use mxvm_types::{value, MxvmError, Opcode};

use super::{Interpreter, Step};

pub fn cmp(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let a = interp.resolve(&instr.op1)?;
    let b = interp.resolve(&instr.op2)?;
    interp.flags = value::compare(&a, &b)?;
    Ok(Step::Continue)
}

pub fn fcmp(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let a = interp.resolve(&instr.op1)?;
    let b = interp.resolve(&instr.op2)?;
    interp.flags = value::fcompare(&a, &b)?;
    Ok(Step::Continue)
}

fn conditional(interp: &mut Interpreter, taken: bool) -> Result<Step, MxvmError> {
    if !taken {
        return Ok(Step::Continue);
    }
    let instr = interp.current_instruction();
    let target = interp.label_address(&instr.op1.text)?;
    Ok(Step::Jump(target))
}

pub fn jmp(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, true)
}

pub fn je(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.zero)
}

pub fn jne(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, !interp.flags.zero)
}

pub fn jl(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.less)
}

pub fn jle(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.less || interp.flags.zero)
}

pub fn jg(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.greater)
}

pub fn jge(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.greater || interp.flags.zero)
}

pub fn jz(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    je(interp)
}

pub fn jnz(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    jne(interp)
}

pub fn ja(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    jg(interp)
}

pub fn jb(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    jl(interp)
}

pub fn jae(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, !interp.flags.less)
}

pub fn jbe(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    jle(interp)
}

pub fn jc(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, interp.flags.carry)
}

pub fn jnc(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    conditional(interp, !interp.flags.carry)
}

fn unconditional_policy(interp: &mut Interpreter, opcode: Opcode) -> Result<Step, MxvmError> {
    let taken = opcode.unconditional_jump_policy().unwrap_or(false);
    conditional(interp, taken)
}

pub fn jp(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::jp)
}

pub fn jnp(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::jnp)
}

pub fn jo(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::jo)
}

pub fn jno(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::jno)
}

pub fn js(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::js)
}

pub fn jns(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    unconditional_policy(interp, Opcode::jns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings};
    use mxvm_types::{Instruction, Operand};

    fn interp() -> Interpreter {
        Interpreter::new(Program::root(), ProgramSettings::default())
    }

    #[test]
    fn je_jumps_only_when_zero_flag_set() {
        let mut interp = interp();
        let mut instr = Instruction::new(Opcode::je);
        instr.op1 = Operand::variable("loop_top");
        interp.program.add_instruction(instr);
        interp.program.add_label("loop_top", 3, false);

        interp.flags.zero = false;
        assert!(matches!(je(&mut interp).unwrap(), Step::Continue));

        interp.flags.zero = true;
        assert!(matches!(je(&mut interp).unwrap(), Step::Jump(3)));
    }

    #[test]
    fn jp_never_taken_jnp_always_taken() {
        let mut interp = interp();
        let mut instr = Instruction::new(Opcode::jp);
        instr.op1 = Operand::variable("target");
        interp.program.add_instruction(instr);
        interp.program.add_label("target", 7, false);

        assert!(matches!(jp(&mut interp).unwrap(), Step::Continue));
        assert!(matches!(jnp(&mut interp).unwrap(), Step::Jump(7)));
    }
}
