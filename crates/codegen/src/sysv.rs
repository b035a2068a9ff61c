// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! SysV (Linux) assembly generation (spec §4.6): System V AMD64 calling
//! convention, `main` as the entry label, PLT-indirect libc calls.

use std::fmt::Write as _;

use mxvm_program::Program;

use crate::lowering::lower_instruction;
use crate::shared::{emit_variable_storage, labels_by_address, mangle, Sections, SYSV_CC};

pub fn generate(program: &Program) -> String {
    let mut sections = Sections::default();
    emit_variable_storage(program, &mut sections);
    emit_preamble(&mut sections);
    emit_text(program, &mut sections);
    sections.render()
}

fn emit_preamble(sections: &mut Sections) {
    let _ = writeln!(sections.text, "\t.globl main");
}

fn emit_text(program: &Program, sections: &mut Sections) {
    let labels = labels_by_address(program);
    for (index, instr) in program.instructions.iter().enumerate() {
        if let Some(names) = labels.get(&index) {
            for (name, is_function) in names {
                let symbol = mangle(name);
                let _ = writeln!(sections.text, "{symbol}:");
                if *is_function {
                    let _ = writeln!(sections.text, "\tpushq %rbp");
                    let _ = writeln!(sections.text, "\tmovq %rsp, %rbp");
                }
            }
        }
        lower_instruction(program, instr, &SYSV_CC, &mut sections.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::Variable;
    use mxvm_types::{Instruction, Opcode, Operand, VarType, Value};

    #[test]
    fn main_label_gets_a_prologue_and_globl_directive() {
        let mut program = Program::root();
        program.add_variable(Variable::new("count", VarType::Integer, Value::int(0)));
        program.add_label("main", 0, true);
        let mut instr = Instruction::new(Opcode::done);
        instr.line = 1;
        program.add_instruction(instr);
        let asm = generate(&program);
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("main:\n\tpushq %rbp"));
        assert!(asm.contains("leave"));
    }
}
