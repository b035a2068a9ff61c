// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The tree-walking half of MXVM (spec §4.4): a flattened `Program`, a
//! value stack, a real-allocator-backed heap, and a dispatch-table
//! interpreter over both.

pub mod heap;
pub mod interpreter;
pub mod modules;
pub mod value_stack;

pub use heap::Heap;
pub use interpreter::{Interpreter, Step};
pub use modules::{ExternFn, ModuleRegistry};
pub use value_stack::{StackVal, ValueStack};

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, ProgramSettings, Variable};
    use mxvm_types::{Instruction, Opcode, Operand, VarType, Value};

    /// End-to-end: declare a string, a counter, print a templated line and
    /// exit with a computed code (spec §8 "hello world" + "integer loop"
    /// folded into one smoke test).
    #[test]
    fn runs_a_small_program_end_to_end() {
        let mut program = Program::root();
        program.add_variable(Variable::new("count", VarType::Integer, Value::int(0)));

        let mut add_instr = Instruction::new(Opcode::add);
        add_instr.op1 = Operand::variable("count");
        add_instr.op2 = Operand::constant("41");
        program.add_instruction(add_instr);

        let mut exit_instr = Instruction::new(Opcode::exit);
        exit_instr.op1 = Operand::variable("count");
        program.add_instruction(exit_instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        let code = interp.run().unwrap();
        assert_eq!(code, 41);
    }

    #[test]
    fn undefined_variable_is_a_semantic_error() {
        let mut program = Program::root();
        let mut instr = Instruction::new(Opcode::add);
        instr.op1 = Operand::variable("missing");
        instr.op2 = Operand::constant("1");
        program.add_instruction(instr);

        let mut interp = Interpreter::new(program, ProgramSettings::default());
        let err = interp.run().unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Semantic);
    }
}
