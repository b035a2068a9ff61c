// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Assembly code generation (spec §4.6, §4.7, §4.8): lowers a flattened
//! [`Program`] to SysV or Win64 AT&T-syntax assembly text, then runs it
//! through the peephole optimizer unless the caller disabled it.
//!
//! This crate never touches an assembler or linker — `generate` returns
//! text, and it is the caller's job (the `mxvm-cli` `--emit-asm` path) to
//! hand that text to `as`/`ld` or a cross-toolchain equivalent.

pub mod lowering;
pub mod optimizer;
pub mod shared;
pub mod sysv;
pub mod win64;

use mxvm_program::{Program, Target};

/// Generates assembly for `program` targeting `target`, applying the
/// peephole optimizer passes spec §4.8 attaches to each target unless
/// `optimize` is false.
pub fn generate(program: &Program, target: Target, optimize: bool) -> String {
    let mut asm = match target {
        Target::SysV | Target::Darwin => sysv::generate(program),
        Target::Win64 => win64::generate(program),
    };

    if optimize {
        asm = optimizer::core_pass(&asm);
    }

    match target {
        Target::Darwin => {
            let user_symbols = user_defined_symbols(program);
            asm = optimizer::darwin_pass(&asm, &user_symbols);
        }
        Target::Win64 => {
            if optimize {
                asm = optimizer::win64_pass(&asm);
            }
        }
        Target::SysV => {}
    }

    asm
}

fn user_defined_symbols(program: &Program) -> Vec<String> {
    let mut names: Vec<String> = program.labels.keys().map(|n| shared::mangle(n)).collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::Variable;
    use mxvm_types::{Instruction, Opcode, VarType, Value};

    fn sample_program() -> Program {
        let mut program = Program::root();
        program.add_variable(Variable::new("count", VarType::Integer, Value::int(0)));
        program.add_label("main", 0, true);
        let mut instr = Instruction::new(Opcode::done);
        instr.line = 1;
        program.add_instruction(instr);
        program
    }

    #[test]
    fn sysv_target_emits_plain_main() {
        let asm = generate(&sample_program(), Target::SysV, true);
        assert!(asm.contains(".globl main"));
        assert!(!asm.contains("_main"));
    }

    #[test]
    fn darwin_target_underscore_prefixes_main() {
        let asm = generate(&sample_program(), Target::Darwin, true);
        assert!(asm.contains("_main:"));
    }

    #[test]
    fn win64_target_uses_shared_lowering() {
        let asm = generate(&sample_program(), Target::Win64, true);
        assert!(asm.contains(".globl main"));
    }
}
