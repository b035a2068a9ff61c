// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `alloc`/`free`/`load`/`store` (spec §4.4.1), delegating the actual
//! bytes to `crate::heap::Heap`.

use mxvm_types::{MxvmError, Operand, Value, VarType};

use super::{Interpreter, Step};

fn resolve_int(interp: &mut Interpreter, operand: &Operand) -> Result<i64, MxvmError> {
    Ok(interp.resolve(operand)?.to_int()?.int_value)
}

pub fn alloc(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let elem_size = resolve_int(interp, &instr.op2)? as u64;
    let elem_count = resolve_int(interp, &instr.op3)? as u64;
    let addr = interp.heap.alloc(elem_size, elem_count)?;
    interp.set_variable_value(
        &dst,
        Value {
            tag: VarType::Pointer,
            ptr_addr: addr,
            ptr_elem_size: elem_size,
            ptr_elem_count: elem_count,
            owns: true,
            ..Value::default()
        },
    )?;
    Ok(Step::Continue)
}

pub fn free(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let addr = interp.get_variable_value(&dst)?.ptr_addr;
    interp.heap.free(addr);
    interp.set_variable_value(&dst, Value::null_pointer())?;
    Ok(Step::Continue)
}

pub fn load(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let dst = Interpreter::require_variable_name(&instr.op1)?.to_string();
    let dest_tag = interp.get_variable(&dst)?.declared_type;
    let base = interp.resolve(&instr.op2)?.ptr_addr;
    let index = resolve_int(interp, &instr.op3)?;
    let stride = resolve_int(interp, instr.extra.first().unwrap_or(&Operand::constant("1")))?;
    let value = interp.heap.load(base, index, stride, dest_tag)?;
    interp.set_variable_value(&dst, value)?;
    Ok(Step::Continue)
}

pub fn store(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let instr = interp.current_instruction();
    let src = interp.resolve(&instr.op1)?;
    let base = interp.resolve(&instr.op2)?.ptr_addr;
    let index = resolve_int(interp, &instr.op3)?;
    let stride = resolve_int(interp, instr.extra.first().unwrap_or(&Operand::constant("1")))?;
    interp.heap.store(base, index, stride, &src)?;
    Ok(Step::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings, Variable};
    use mxvm_types::{Instruction, Opcode};

    #[test]
    fn alloc_store_load_round_trip() {
        let mut program = Program::root();
        program.add_variable(Variable::new("p", VarType::Pointer, Value::null_pointer()));
        program.add_variable(Variable::new("v", VarType::Integer, Value::int(0)));

        let mut alloc_instr = Instruction::new(Opcode::alloc);
        alloc_instr.op1 = Operand::variable("p");
        alloc_instr.op2 = Operand::constant("8");
        alloc_instr.op3 = Operand::constant("4");
        program.add_instruction(alloc_instr);

        let mut store_instr = Instruction::new(Opcode::store);
        store_instr.op1 = Operand::constant("99");
        store_instr.op2 = Operand::variable("p");
        store_instr.op3 = Operand::constant("1");
        store_instr.extra.push(Operand::constant("8"));
        program.add_instruction(store_instr);

        let mut load_instr = Instruction::new(Opcode::load);
        load_instr.op1 = Operand::variable("v");
        load_instr.op2 = Operand::variable("p");
        load_instr.op3 = Operand::constant("1");
        load_instr.extra.push(Operand::constant("8"));
        program.add_instruction(load_instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        interp.pc = 0;
        alloc(&mut interp).unwrap();
        interp.pc = 1;
        store(&mut interp).unwrap();
        interp.pc = 2;
        load(&mut interp).unwrap();

        assert_eq!(interp.get_variable_value("v").unwrap().int_value, 99);
    }

    #[test]
    fn free_then_load_is_a_memory_error() {
        let mut program = Program::root();
        program.add_variable(Variable::new("p", VarType::Pointer, Value::null_pointer()));
        let mut alloc_instr = Instruction::new(Opcode::alloc);
        alloc_instr.op1 = Operand::variable("p");
        alloc_instr.op2 = Operand::constant("8");
        alloc_instr.op3 = Operand::constant("1");
        program.add_instruction(alloc_instr);
        let mut free_instr = Instruction::new(Opcode::free);
        free_instr.op1 = Operand::variable("p");
        program.add_instruction(free_instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        interp.pc = 0;
        alloc(&mut interp).unwrap();
        interp.pc = 1;
        free(&mut interp).unwrap();
        assert_eq!(interp.get_variable_value("p").unwrap().ptr_addr, 0);
    }
}
