// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Pieces both SysV and Win64 lowering share (spec §4.6 "illustrative"
//! rules apply to both targets except where §4.7 names a difference):
//! `.data`/`.bss` emission, a symbol-to-register calling convention table,
//! and the small arithmetic/comparison/memory opcode lowering that is
//! identical on both ABIs.

use std::collections::HashMap;
use std::fmt::Write as _;

use mxvm_program::{Program, Variable};
use mxvm_types::{Instruction, Opcode, Operand, VarType};

/// Integer/float argument registers and the frame bookkeeping an `invoke`
/// or library call needs, the one piece of the ABI that genuinely differs
/// between SysV and Win64 (spec §4.6, §4.7).
pub struct CallingConvention {
    pub int_args: &'static [&'static str],
    pub float_args: &'static [&'static str],
    /// bytes of shadow space a call site must reserve before spilling
    /// stack arguments (32 on Win64, 0 on SysV).
    pub shadow_space: u64,
    /// SysV's variadic convention sets `%al` to the XMM argument count;
    /// Win64 has no such convention.
    pub uses_al_xmm_count: bool,
}

pub const SYSV_CC: CallingConvention = CallingConvention {
    int_args: &["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"],
    float_args: &["%xmm0", "%xmm1", "%xmm2", "%xmm3", "%xmm4", "%xmm5", "%xmm6", "%xmm7"],
    shadow_space: 0,
    uses_al_xmm_count: true,
};

pub const WIN64_CC: CallingConvention = CallingConvention {
    int_args: &["%rcx", "%rdx", "%r8", "%r9"],
    float_args: &["%xmm0", "%xmm1", "%xmm2", "%xmm3"],
    shadow_space: 32,
    uses_al_xmm_count: false,
};

/// Accumulates `.data`/`.bss`/`.text` independently so they can be
/// concatenated in the fixed section order GNU `as` expects.
#[derive(Default)]
pub struct Sections {
    pub data: String,
    pub bss: String,
    pub text: String,
}

impl Sections {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.data.is_empty() {
            let _ = writeln!(out, ".data");
            out.push_str(&self.data);
        }
        if !self.bss.is_empty() {
            let _ = writeln!(out, ".bss");
            out.push_str(&self.bss);
        }
        let _ = writeln!(out, ".text");
        out.push_str(&self.text);
        out
    }
}

/// Emits the `.data`/`.bss` reservation for every flattened variable
/// (spec §4.6: "initialized variables" vs "comm'd pointers and string
/// buffers"). Register aliases (`%rax`, `%xmmN`, `argN`) are not real
/// symbols and are skipped.
pub fn emit_variable_storage(program: &Program, sections: &mut Sections) {
    let mut names: Vec<&String> = program.variables.keys().collect();
    names.sort();
    for name in names {
        let var = &program.variables[name];
        emit_one_variable(name, var, sections);
    }
}

fn emit_one_variable(name: &str, var: &Variable, sections: &mut Sections) {
    let symbol = mangle(name);
    match var.declared_type {
        VarType::Integer => {
            let _ = writeln!(sections.data, "{symbol}:\n\t.quad {}", var.value.int_value);
        }
        VarType::Byte => {
            let _ = writeln!(sections.data, "{symbol}:\n\t.byte {}", var.value.int_value as u8);
        }
        VarType::Float => {
            let _ = writeln!(sections.data, "{symbol}:\n\t.double {:?}", var.value.float_value);
        }
        VarType::Pointer | VarType::Extern => {
            let _ = writeln!(sections.bss, "\t.comm {symbol}, 8, 8");
        }
        VarType::String => {
            if var.value.buffer_size > 0 {
                let _ = writeln!(sections.bss, "\t.comm {symbol}, {}, 8", var.value.buffer_size);
            } else {
                let _ = writeln!(
                    sections.data,
                    "{symbol}:\n\t.asciz \"{}\"",
                    escape_asm_string(&var.value.str_value)
                );
            }
        }
        VarType::Array => {
            let _ = writeln!(
                sections.bss,
                "\t.comm {symbol}, {}, 8",
                (var.value.ptr_elem_size * var.value.ptr_elem_count).max(8)
            );
        }
        VarType::Null | VarType::Label => {}
    }
}

/// Symbols can't start with `%`; register aliases always resolve through
/// [`is_register`] instead of ever reaching the data section.
pub fn mangle(name: &str) -> String {
    name.replace('.', "_")
}

pub fn escape_asm_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

pub fn is_register(name: &str) -> bool {
    mxvm_program::Program::is_register_alias(name)
}

/// Resolves where an operand lives: a real memory symbol (`name(%rip)`)
/// for a declared variable, the literal register name for `%rax`/`%xmmN`,
/// or `None` for a constant (the caller loads constants directly).
pub fn operand_location(op: &Operand) -> Option<String> {
    if !op.is_variable() {
        return None;
    }
    if is_register(&op.text) {
        return Some(op.text.clone());
    }
    Some(format!("{}(%rip)", mangle(&op.text)))
}

pub fn declared_type(program: &Program, name: &str) -> VarType {
    if name == "%rax" || name.starts_with("arg") {
        return VarType::Integer;
    }
    if name.starts_with("%xmm") {
        return VarType::Float;
    }
    program
        .variables
        .get(name)
        .map(|v| v.declared_type)
        .unwrap_or(VarType::Integer)
}

/// Inverted label table: instruction index -> every label name attached to
/// it, so the text emitter can print `name:` immediately before the
/// instruction at that address.
pub fn labels_by_address(program: &Program) -> HashMap<usize, Vec<(&str, bool)>> {
    let mut map: HashMap<usize, Vec<(&str, bool)>> = HashMap::new();
    for (name, (address, is_function)) in &program.labels {
        map.entry(*address).or_default().push((name.as_str(), *is_function));
    }
    for labels in map.values_mut() {
        labels.sort();
    }
    map
}

/// True for the handful of opcodes the code generator resolves statically
/// from [`Opcode::unconditional_jump_policy`] rather than emitting a real
/// conditional branch (spec §9 Open Questions).
pub fn static_jump_target(instr: &Instruction) -> Option<bool> {
    instr.opcode.unconditional_jump_policy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::Program;
    use mxvm_types::Value;

    #[test]
    fn integers_land_in_data_floats_get_a_double_directive() {
        let mut program = Program::root();
        program.add_variable(Variable::new("count", VarType::Integer, Value::int(3)));
        program.add_variable(Variable::new("ratio", VarType::Float, Value::float(1.5)));
        let mut sections = Sections::default();
        emit_variable_storage(&program, &mut sections);
        assert!(sections.data.contains("count:\n\t.quad 3"));
        assert!(sections.data.contains("ratio:\n\t.double 1.5"));
    }

    #[test]
    fn buffered_strings_are_commed_not_initialized() {
        let mut program = Program::root();
        program.add_variable(Variable::new("line", VarType::String, Value::buffered_string(128)));
        let mut sections = Sections::default();
        emit_variable_storage(&program, &mut sections);
        assert!(sections.bss.contains(".comm line, 128, 8"));
    }
}
