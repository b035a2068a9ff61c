// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The tree-walking interpreter (spec §4.4): a dispatch loop over
//! `program.instructions[pc]`, grounded in the teacher's
//! `runtime::interpreter::INTERPRETERS` function-pointer table, adapted
//! from Wasm opcodes to the opcode set in `mxvm_types::Opcode`.

use mxvm_types::{Instruction, MxvmError, Opcode, Operand, VarType, Value, value::Flags};
use mxvm_program::{Program, ProgramSettings, Variable};

use crate::heap::Heap;
use crate::modules::ModuleRegistry;
use crate::value_stack::ValueStack;

pub mod arithmetic;
pub mod comparison;
pub mod control_flow;
pub mod conversion;
pub mod invoke;
pub mod io;
pub mod memory;
pub mod stack;

/// What the dispatch loop should do after an instruction ran.
#[derive(Debug)]
pub enum Step {
    Continue,
    Jump(usize),
    Halt,
}

type InterpretFn = fn(&mut Interpreter) -> Result<Step, MxvmError>;

fn unreachable_op(interp: &mut Interpreter) -> Result<Step, MxvmError> {
    let opcode = interp.current_instruction().opcode;
    Err(MxvmError::semantic(format!(
        "opcode '{opcode}' has no interpreter binding"
    )))
}

static mut INTERPRETERS: [InterpretFn; mxvm_types::opcode::OPCODE_COUNT] =
    [unreachable_op; mxvm_types::opcode::OPCODE_COUNT];

pub fn init_interpreters() {
    let table = unsafe { &mut INTERPRETERS };

    if table[Opcode::mov as usize] == (arithmetic::mov as InterpretFn) {
        // already initialized
        return;
    }

    table[Opcode::mov as usize] = arithmetic::mov;
    table[Opcode::add as usize] = arithmetic::add;
    table[Opcode::sub as usize] = arithmetic::sub;
    table[Opcode::mul as usize] = arithmetic::mul;
    table[Opcode::div as usize] = arithmetic::div;
    table[Opcode::r#mod as usize] = arithmetic::modulo;
    table[Opcode::neg as usize] = arithmetic::neg;
    table[Opcode::not as usize] = arithmetic::not;
    table[Opcode::and as usize] = arithmetic::and;
    table[Opcode::or as usize] = arithmetic::or;
    table[Opcode::xor as usize] = arithmetic::xor;

    table[Opcode::to_int as usize] = conversion::to_int;
    table[Opcode::to_float as usize] = conversion::to_float;

    table[Opcode::cmp as usize] = comparison::cmp;
    table[Opcode::fcmp as usize] = comparison::fcmp;
    table[Opcode::jmp as usize] = comparison::jmp;
    table[Opcode::je as usize] = comparison::je;
    table[Opcode::jne as usize] = comparison::jne;
    table[Opcode::jl as usize] = comparison::jl;
    table[Opcode::jle as usize] = comparison::jle;
    table[Opcode::jg as usize] = comparison::jg;
    table[Opcode::jge as usize] = comparison::jge;
    table[Opcode::jz as usize] = comparison::jz;
    table[Opcode::jnz as usize] = comparison::jnz;
    table[Opcode::ja as usize] = comparison::ja;
    table[Opcode::jb as usize] = comparison::jb;
    table[Opcode::jae as usize] = comparison::jae;
    table[Opcode::jbe as usize] = comparison::jbe;
    table[Opcode::jc as usize] = comparison::jc;
    table[Opcode::jnc as usize] = comparison::jnc;
    table[Opcode::jp as usize] = comparison::jp;
    table[Opcode::jnp as usize] = comparison::jnp;
    table[Opcode::jo as usize] = comparison::jo;
    table[Opcode::jno as usize] = comparison::jno;
    table[Opcode::js as usize] = comparison::js;
    table[Opcode::jns as usize] = comparison::jns;

    table[Opcode::call as usize] = control_flow::call;
    table[Opcode::ret as usize] = control_flow::ret;
    table[Opcode::done as usize] = control_flow::done;
    table[Opcode::exit as usize] = control_flow::exit;

    table[Opcode::alloc as usize] = memory::alloc;
    table[Opcode::free as usize] = memory::free;
    table[Opcode::load as usize] = memory::load;
    table[Opcode::store as usize] = memory::store;

    table[Opcode::push as usize] = stack::push;
    table[Opcode::pop as usize] = stack::pop;
    table[Opcode::stack_load as usize] = stack::stack_load;
    table[Opcode::stack_store as usize] = stack::stack_store;
    table[Opcode::stack_sub as usize] = stack::stack_sub;

    table[Opcode::print as usize] = io::print;
    table[Opcode::string_print as usize] = io::string_print;
    table[Opcode::getline as usize] = io::getline;

    table[Opcode::invoke as usize] = invoke::invoke;
    table[Opcode::r#return as usize] = invoke::r#return;
}

pub struct Interpreter {
    pub program: Program,
    pub settings: ProgramSettings,
    pub pc: usize,
    pub flags: Flags,
    pub stack: ValueStack,
    pub heap: Heap,
    pub modules: ModuleRegistry,
    pub last_result: String,
    pub exit_code: i64,
}

impl Interpreter {
    pub fn new(program: Program, settings: ProgramSettings) -> Self {
        init_interpreters();
        Interpreter {
            program,
            settings,
            pc: 0,
            flags: Flags::default(),
            stack: ValueStack::new(),
            heap: Heap::new(),
            modules: ModuleRegistry::new(),
            last_result: "%rax".to_string(),
            exit_code: 0,
        }
    }

    pub fn current_instruction(&self) -> Instruction {
        self.program.instructions[self.pc].clone()
    }

    pub fn get_variable(&self, name: &str) -> Result<&Variable, MxvmError> {
        self.program
            .variables
            .get(name)
            .ok_or_else(|| MxvmError::semantic(format!("undefined variable '{name}'")))
    }

    /// Register aliases (`%rax`, `%xmm0..9`, `argN`) are created lazily on
    /// first reference rather than pre-populated (spec Glossary "Variable
    /// slot").
    pub fn get_variable_mut(&mut self, name: &str) -> Result<&mut Variable, MxvmError> {
        if !self.program.variables.contains_key(name) {
            if !mxvm_program::Program::is_register_alias(name) {
                return Err(MxvmError::semantic(format!("undefined variable '{name}'")));
            }
            let tag = if name.starts_with("%xmm") {
                VarType::Float
            } else {
                VarType::Integer
            };
            let value = if tag == VarType::Float {
                Value::float(0.0)
            } else {
                Value::int(0)
            };
            self.program
                .variables
                .insert(name.to_string(), Variable::new(name, tag, value));
        }
        Ok(self.program.variables.get_mut(name).unwrap())
    }

    pub fn get_variable_value(&self, name: &str) -> Result<Value, MxvmError> {
        Ok(self.get_variable(name)?.value.clone())
    }

    pub fn set_variable_value(&mut self, name: &str, value: Value) -> Result<(), MxvmError> {
        self.get_variable_mut(name)?.value = value;
        Ok(())
    }

    /// Resolves an operand without a destination type context: a variable
    /// operand returns its current value; a constant is parsed by
    /// guessing its type from its literal shape (used by variadic
    /// argument lists like `print`, `invoke`, `push`).
    pub fn resolve(&mut self, operand: &Operand) -> Result<Value, MxvmError> {
        if operand.is_variable() {
            self.get_variable_value(&operand.text)
        } else {
            Ok(guess_constant(&operand.text))
        }
    }

    /// Resolves an operand the way `mov` does: a variable must already
    /// hold exactly `dest_tag`; a constant is parsed directly into
    /// `dest_tag` (spec §4.1 "if src is constant, parsed into dst's
    /// declared type").
    pub fn resolve_as(&mut self, operand: &Operand, dest_tag: VarType) -> Result<Value, MxvmError> {
        if operand.is_variable() {
            let value = self.get_variable_value(&operand.text)?;
            if value.tag != dest_tag {
                return Err(MxvmError::ty(format!(
                    "expected a {dest_tag} value in '{}', found {}",
                    operand.text, value.tag
                )));
            }
            Ok(value)
        } else {
            Value::from_literal(dest_tag, &operand.text)
        }
    }

    pub fn require_variable_name<'i>(operand: &'i Operand) -> Result<&'i str, MxvmError> {
        if operand.is_variable() {
            Ok(&operand.text)
        } else {
            Err(MxvmError::semantic("this instruction requires a variable destination"))
        }
    }

    pub fn label_address(&self, name: &str) -> Result<usize, MxvmError> {
        self.program
            .labels
            .get(name)
            .map(|(address, _)| *address)
            .ok_or_else(|| MxvmError::control(format!("jump to unknown label '{name}'")))
    }

    /// Executes instructions until `done`/`exit`/end-of-program, returning
    /// the final exit code (spec §5 "Cancellation": fatal errors propagate
    /// to the caller of `exec`).
    pub fn run(&mut self) -> Result<i64, MxvmError> {
        while self.pc < self.program.instructions.len() {
            let opcode = self.program.instructions[self.pc].opcode;
            if self.settings.trace {
                tracing::trace!(pc = self.pc, %opcode, "dispatch");
            }
            let f = unsafe { INTERPRETERS[opcode as usize] };
            match f(self)? {
                Step::Continue => self.pc += 1,
                Step::Jump(target) => self.pc = target,
                Step::Halt => break,
            }
        }
        Ok(self.exit_code)
    }
}

fn guess_constant(text: &str) -> Value {
    if text == "null" {
        return Value::null_pointer();
    }
    if let Ok(i) = mxvm_types::value::parse_int_literal(text) {
        return Value::int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::float(f);
    }
    Value::string(mxvm_types::value::unescape(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::Program;

    #[test]
    fn register_aliases_are_created_lazily_as_zero() {
        let mut interp = Interpreter::new(Program::root(), ProgramSettings::default());
        let value = interp.get_variable_value("%rax").unwrap();
        assert_eq!(value.int_value, 0);
    }
}
