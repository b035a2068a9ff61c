// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Win64 assembly generation (spec §4.7): Microsoft x64 calling convention
//! (`rcx`/`rdx`/`r8`/`r9`, 32-byte shadow space, no `%al` XMM-count
//! convention), bare (non-underscore-prefixed) external symbols.

use std::fmt::Write as _;

use mxvm_program::Program;

use crate::lowering::lower_instruction;
use crate::shared::{emit_variable_storage, labels_by_address, mangle, Sections, WIN64_CC};

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
        lower_instruction(program, instr, &WIN64_CC, &mut sections.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::Variable;
    use mxvm_types::{Instruction, Opcode, Operand, VarType, Value};

    #[test]
    fn invoke_reserves_shadow_space_around_the_call() {
        let mut program = Program::root();
        program.add_variable(Variable::new("greeting", VarType::String, Value::string("hi")));
        program.external_functions.register("puts");
        let mut instr = Instruction::new(Opcode::invoke);
        instr.op1 = Operand::variable("puts");
        instr.op2 = Operand::variable("greeting");
        instr.line = 1;
        program.add_instruction(instr);
        let mut sections = Sections::default();
        emit_text(&program, &mut sections);
        assert!(sections.text.contains("subq $32, %rsp"));
        assert!(sections.text.contains("call puts@PLT"));
        assert!(sections.text.contains("addq $32, %rsp"));
    }
}
