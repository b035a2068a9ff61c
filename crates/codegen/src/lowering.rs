// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Per-instruction lowering (spec §4.6): one arm per opcode in §4.4.
//! Register allocation is operand-local and stateless — every instruction
//! loads its operands from memory into a fixed scratch register pair and
//! writes the result straight back through `name(%rip)` (spec §4.6
//! "Register allocation"), which is what lets this module stay identical
//! for SysV and Win64 except at `invoke`/`print`/`getline`, where the
//! calling convention actually differs.

use std::fmt::Write as _;

use mxvm_program::Program;
use mxvm_types::{Instruction, Opcode, Operand, VarType};

use crate::shared::{declared_type, mangle, operand_location, CallingConvention};

/// Loads `op` into `reg` (a GPR name like `%rax` or an XMM name like
/// `%xmm0`, matching `ty`), emitting the few extra lines a constant or a
/// float immediate needs.
fn load(program: &Program, op: &Operand, ty: VarType, reg: &str, out: &mut String) {
    match operand_location(op) {
        Some(loc) if loc == reg => {}
        Some(loc) => {
            let mnemonic = if ty == VarType::Float { "movsd" } else { "movq" };
            let _ = writeln!(out, "\t{mnemonic} {loc}, {reg}");
        }
        None => {
            // constant operand
            if ty == VarType::Float {
                let bits = op.text.parse::<f64>().unwrap_or(0.0).to_bits() as i64;
                let _ = writeln!(out, "\tmovabsq ${bits}, %rax");
                let _ = writeln!(out, "\tmovq %rax, {reg}");
            } else {
                let _ = writeln!(out, "\tmovq ${}, {reg}", op.int_value);
            }
        }
    }
    let _ = program;
}

fn store(op: &Operand, ty: VarType, reg: &str, out: &mut String) {
    let loc = operand_location(op).unwrap_or_else(|| reg.to_string());
    if loc == reg {
        return;
    }
    let mnemonic = if ty == VarType::Float { "movsd" } else { "movq" };
    let _ = writeln!(out, "\t{mnemonic} {reg}, {loc}");
}

fn int_or_float_reg(ty: VarType, int_reg: &str, float_reg: &str) -> String {
    if ty == VarType::Float {
        float_reg.to_string()
    } else {
        int_reg.to_string()
    }
}

/// `op dst, src` updates `dst` in place; `op dst, a, b` assigns
/// `dst <- a OP b` (spec §4.1, mirrored from the interpreter's
/// `arithmetic::arith_op`).
fn operand_pair<'i>(instr: &'i Instruction) -> (&'i Operand, &'i Operand) {
    if instr.op3.is_empty() {
        (&instr.op1, &instr.op2)
    } else {
        (&instr.op2, &instr.op3)
    }
}

fn arith(program: &Program, instr: &Instruction, int_op: &str, float_op: &str, out: &mut String) {
    let dest_ty = declared_type(program, &instr.op1.text);
    let (a, b) = operand_pair(instr);
    let (r0, r1) = if dest_ty == VarType::Float {
        ("%xmm0", "%xmm1")
    } else {
        ("%rax", "%rcx")
    };
    load(program, a, dest_ty, r0, out);
    load(program, b, dest_ty, r1, out);
    let mnemonic = if dest_ty == VarType::Float { float_op } else { int_op };
    let _ = writeln!(out, "\t{mnemonic} {r1}, {r0}");
    store(&instr.op1, dest_ty, r0, out);
}

fn div_or_mod(program: &Program, instr: &Instruction, want_remainder: bool, out: &mut String) {
    let dest_ty = declared_type(program, &instr.op1.text);
    let (a, b) = operand_pair(instr);
    if dest_ty == VarType::Float {
        load(program, a, dest_ty, "%xmm0", out);
        load(program, b, dest_ty, "%xmm1", out);
        let _ = writeln!(out, "\tdivsd %xmm1, %xmm0");
        store(&instr.op1, dest_ty, "%xmm0", out);
        return;
    }
    load(program, a, dest_ty, "%rax", out);
    load(program, b, dest_ty, "%rcx", out);
    let skip = format!(".Ldivzero{}", instr.line);
    let done = format!(".Ldivdone{}", instr.line);
    let _ = writeln!(out, "\ttestq %rcx, %rcx");
    let _ = writeln!(out, "\tjz {skip}");
    let _ = writeln!(out, "\tcqto");
    let _ = writeln!(out, "\tidivq %rcx");
    if want_remainder {
        let _ = writeln!(out, "\tmovq %rdx, %rax");
    }
    let _ = writeln!(out, "\tjmp {done}");
    let _ = writeln!(out, "{skip}:");
    let _ = writeln!(out, "\txorq %rax, %rax");
    let _ = writeln!(out, "{done}:");
    store(&instr.op1, dest_ty, "%rax", out);
}

fn jump_target(instr: &Instruction) -> String {
    mangle(&instr.op1.text)
}

fn lower_cmp(program: &Program, instr: &Instruction, float: bool, out: &mut String) {
    if float {
        load(program, &instr.op1, VarType::Float, "%xmm0", out);
        load(program, &instr.op2, VarType::Float, "%xmm1", out);
        let _ = writeln!(out, "\tucomisd %xmm1, %xmm0");
    } else {
        let ty = declared_type(program, &instr.op1.text);
        load(program, &instr.op1, ty, "%rax", out);
        load(program, &instr.op2, ty, "%rcx", out);
        let _ = writeln!(out, "\tcmpq %rcx, %rax");
    }
}

fn lower_jcc(instr: &Instruction, mnemonic: &str, out: &mut String) {
    let _ = writeln!(out, "\t{mnemonic} {}", jump_target(instr));
}

/// Lowers one instruction, appending assembly lines to `out`. `stack_mod`
/// tracks the current 16-byte stack-alignment residue across `push`/`pop`
/// for callers (Win64 needs this; SysV passes `None`).
pub fn lower_instruction(
    program: &Program,
    instr: &Instruction,
    cc: &CallingConvention,
    out: &mut String,
) {
    match instr.opcode {
        Opcode::nop => {}
        Opcode::mov => {
            let dest_ty = declared_type(program, &instr.op1.text);
            let reg = int_or_float_reg(dest_ty, "%rax", "%xmm0");
            load(program, &instr.op2, dest_ty, &reg, out);
            store(&instr.op1, dest_ty, &reg, out);
        }
        Opcode::add => arith(program, instr, "addq", "addsd", out),
        Opcode::sub => arith(program, instr, "subq", "subsd", out),
        Opcode::mul => arith(program, instr, "imulq", "mulsd", out),
        Opcode::div => div_or_mod(program, instr, false, out),
        Opcode::r#mod => div_or_mod(program, instr, true, out),
        Opcode::neg => {
            let ty = declared_type(program, &instr.op1.text);
            let reg = int_or_float_reg(ty, "%rax", "%xmm0");
            load(program, &instr.op1, ty, &reg, out);
            if ty == VarType::Float {
                let _ = writeln!(out, "\txorpd {reg}, {reg}");
                let _ = writeln!(out, "\tsubsd {reg}, {reg}");
            } else {
                let _ = writeln!(out, "\tnegq {reg}");
            }
            store(&instr.op1, ty, &reg, out);
        }
        Opcode::not => {
            load(program, &instr.op1, VarType::Integer, "%rax", out);
            let _ = writeln!(out, "\tcmpq $0, %rax");
            let _ = writeln!(out, "\tsete %al");
            let _ = writeln!(out, "\tmovzbq %al, %rax");
            store(&instr.op1, VarType::Integer, "%rax", out);
        }
        Opcode::and => arith(program, instr, "andq", "andq", out),
        Opcode::or => arith(program, instr, "orq", "orq", out),
        Opcode::xor => arith(program, instr, "xorq", "xorq", out),
        Opcode::to_int => {
            let src_ty = declared_type(program, &instr.op2.text);
            load(program, &instr.op2, src_ty, "%xmm0", out);
            if src_ty == VarType::Float {
                let _ = writeln!(out, "\tcvttsd2siq %xmm0, %rax");
            }
            store(&instr.op1, VarType::Integer, "%rax", out);
        }
        Opcode::to_float => {
            load(program, &instr.op2, VarType::Integer, "%rax", out);
            let _ = writeln!(out, "\tcvtsi2sdq %rax, %xmm0");
            store(&instr.op1, VarType::Float, "%xmm0", out);
        }
        Opcode::cmp => lower_cmp(program, instr, false, out),
        Opcode::fcmp => lower_cmp(program, instr, true, out),
        Opcode::jmp => lower_jcc(instr, "jmp", out),
        Opcode::je | Opcode::jz => lower_jcc(instr, "je", out),
        Opcode::jne | Opcode::jnz => lower_jcc(instr, "jne", out),
        Opcode::jl => lower_jcc(instr, "jl", out),
        Opcode::jle => lower_jcc(instr, "jle", out),
        Opcode::jg => lower_jcc(instr, "jg", out),
        Opcode::jge => lower_jcc(instr, "jge", out),
        Opcode::ja => lower_jcc(instr, "ja", out),
        Opcode::jb => lower_jcc(instr, "jb", out),
        Opcode::jae => lower_jcc(instr, "jae", out),
        Opcode::jbe => lower_jcc(instr, "jbe", out),
        Opcode::jc => lower_jcc(instr, "jb", out),
        Opcode::jnc => lower_jcc(instr, "jae", out),
        // jp/jo/js and jnp/jno/jns are resolved statically (spec §9 Open
        // Questions): this VM tracks no parity/overflow/sign flag, so the
        // generator either drops the branch or makes it unconditional.
        Opcode::jp | Opcode::jo | Opcode::js => {
            let _ = writeln!(out, "\t# {} never taken (no parity/overflow/sign flag)", instr.opcode);
        }
        Opcode::jnp | Opcode::jno | Opcode::jns => lower_jcc(instr, "jmp", out),
        Opcode::call => {
            let _ = writeln!(out, "\tcall {}", jump_target(instr));
        }
        Opcode::ret => {
            let _ = writeln!(out, "\tret");
        }
        Opcode::done => {
            let _ = writeln!(out, "\txorl %eax, %eax");
            let _ = writeln!(out, "\tleave");
            let _ = writeln!(out, "\tret");
        }
        Opcode::exit => {
            load(program, &instr.op1, VarType::Integer, "%rax", out);
            let _ = writeln!(out, "\tleave");
            let _ = writeln!(out, "\tret");
        }
        Opcode::alloc => {
            let size_ty = declared_type(program, &instr.op2.text);
            load(program, &instr.op2, size_ty, cc.int_args[0], out);
            load(program, &instr.op3, declared_type(program, &instr.op3.text), cc.int_args[1], out);
            let _ = writeln!(out, "\tcall calloc@PLT");
            store(&instr.op1, VarType::Pointer, "%rax", out);
        }
        Opcode::free => {
            load(program, &instr.op1, VarType::Pointer, cc.int_args[0], out);
            let _ = writeln!(out, "\tcall free@PLT");
        }
        Opcode::load => lower_load(program, instr, out),
        Opcode::store => lower_store(program, instr, out),
        Opcode::push => {
            load(program, &instr.op1, VarType::Integer, "%rax", out);
            let _ = writeln!(out, "\tpushq %rax");
        }
        Opcode::pop => {
            let _ = writeln!(out, "\tpopq %rax");
            store(&instr.op1, VarType::Integer, "%rax", out);
        }
        Opcode::stack_load => {
            let index = instr.op2.int_value;
            let _ = writeln!(out, "\tmovq {}(%rsp), %rax", index * 8);
            store(&instr.op1, VarType::Integer, "%rax", out);
        }
        Opcode::stack_store => {
            load(program, &instr.op1, VarType::Integer, "%rax", out);
            let index = instr.op2.int_value;
            let _ = writeln!(out, "\tmovq %rax, {}(%rsp)", index * 8);
        }
        Opcode::stack_sub => {
            let n = instr.op1.int_value.max(0);
            let _ = writeln!(out, "\taddq ${}, %rsp", n * 8);
        }
        Opcode::print => lower_print(program, instr, cc, out),
        Opcode::string_print => lower_print(program, instr, cc, out),
        Opcode::getline => lower_getline(program, instr, cc, out),
        Opcode::invoke => lower_invoke(program, instr, cc, out),
        Opcode::r#return => {
            let dest_ty = declared_type(program, &instr.op1.text);
            let reg = int_or_float_reg(dest_ty, "%rax", "%xmm0");
            store(&instr.op1, dest_ty, &reg, out);
        }
    }
}

/// `base + index*stride`, with a scaled-index addressing mode for the
/// strides x86 supports directly (spec §4.6 "load/store compute...").
fn lower_load(program: &Program, instr: &Instruction, out: &mut String) {
    let dest_ty = declared_type(program, &instr.op1.text);
    let stride = instr.extra.first().map(|o| o.int_value).unwrap_or(1);
    load(program, &instr.op2, VarType::Pointer, "%rax", out);
    load(program, &instr.op3, VarType::Integer, "%rcx", out);
    if matches!(stride, 1 | 2 | 4 | 8) {
        let _ = writeln!(out, "\tmovq (%rax,%rcx,{stride}), %rax");
    } else {
        let _ = writeln!(out, "\timulq ${stride}, %rcx");
        let _ = writeln!(out, "\tmovq (%rax,%rcx,1), %rax");
    }
    let reg = int_or_float_reg(dest_ty, "%rax", "%xmm0");
    if reg != "%rax" {
        let _ = writeln!(out, "\tmovq %rax, {reg}");
    }
    store(&instr.op1, dest_ty, &reg, out);
}

fn lower_store(program: &Program, instr: &Instruction, out: &mut String) {
    let src_ty = declared_type(program, &instr.op1.text);
    let stride = instr.extra.first().map(|o| o.int_value).unwrap_or(1);
    load(program, &instr.op1, src_ty, "%rdx", out);
    load(program, &instr.op2, VarType::Pointer, "%rax", out);
    load(program, &instr.op3, VarType::Integer, "%rcx", out);
    if matches!(stride, 1 | 2 | 4 | 8) {
        let _ = writeln!(out, "\tmovq %rdx, (%rax,%rcx,{stride})");
    } else {
        let _ = writeln!(out, "\timulq ${stride}, %rcx");
        let _ = writeln!(out, "\tmovq %rdx, (%rax,%rcx,1)");
    }
}

/// The variadic `printf` convention (spec §4.6): SysV counts XMM
/// arguments into `%al`; Win64 has no such step (spec §4.7).
fn lower_print(program: &Program, instr: &Instruction, cc: &CallingConvention, out: &mut String) {
    let args: Vec<&Operand> = std::iter::once(&instr.op2)
        .chain(std::iter::once(&instr.op3))
        .chain(instr.extra.iter())
        .filter(|o| !o.is_empty())
        .collect();
    let fmt_operand = &instr.op1;

    let mut int_used = 0usize;
    let mut float_used = 0usize;
    load(program, fmt_operand, VarType::String, cc.int_args[0], out);
    int_used += 1;
    for arg in args {
        let ty = if arg.is_variable() {
            declared_type(program, &arg.text)
        } else {
            guess_constant_type(&arg.text)
        };
        if ty == VarType::Float {
            if float_used < cc.float_args.len() {
                load(program, arg, VarType::Float, cc.float_args[float_used], out);
                float_used += 1;
            }
        } else if int_used < cc.int_args.len() {
            load(program, arg, VarType::Integer, cc.int_args[int_used], out);
            int_used += 1;
        }
    }
    if cc.uses_al_xmm_count {
        if float_used == 0 {
            let _ = writeln!(out, "\txorl %eax, %eax");
        } else {
            let _ = writeln!(out, "\tmovl ${float_used}, %eax");
        }
    }
    if cc.shadow_space > 0 {
        let _ = writeln!(out, "\tsubq ${}, %rsp", cc.shadow_space);
    }
    let _ = writeln!(out, "\tcall printf@PLT");
    if cc.shadow_space > 0 {
        let _ = writeln!(out, "\taddq ${}, %rsp", cc.shadow_space);
    }
    if instr.opcode == Opcode::string_print {
        // result text comes back in %rax as a heap-owned C string; move it
        // into the destination STRING variable's pointer slot.
        store(&instr.op1, VarType::String, "%rax", out);
    }
}

fn guess_constant_type(text: &str) -> VarType {
    if text.parse::<i64>().is_ok() {
        VarType::Integer
    } else if text.parse::<f64>().is_ok() {
        VarType::Float
    } else {
        VarType::String
    }
}

/// `fgets` followed by a `strlen`-based trailing-newline strip (spec
/// §4.6).
fn lower_getline(program: &Program, instr: &Instruction, cc: &CallingConvention, out: &mut String) {
    let dest = operand_location(&instr.op1).unwrap_or_default();
    let _ = writeln!(out, "\tleaq {dest}, {}", cc.int_args[0]);
    let _ = writeln!(out, "\tmovl $4096, {}", reg32(cc.int_args[1]));
    let _ = writeln!(out, "\tcall __stdin_stream@PLT"); // resolved per-target stdin accessor
    let _ = writeln!(out, "\tmovq %rax, {}", cc.int_args[2]);
    let _ = writeln!(out, "\tcall fgets@PLT");
    let _ = writeln!(out, "\tleaq {dest}, {}", cc.int_args[0]);
    let _ = writeln!(out, "\tcall strlen@PLT");
    let _ = writeln!(out, "\tleaq {dest}, %rdx");
    let _ = writeln!(out, "\tmovb $0, -1(%rdx,%rax)");
    let _ = program;
}

fn reg32(reg64: &str) -> String {
    match reg64 {
        "%rdi" => "%edi".to_string(),
        "%rsi" => "%esi".to_string(),
        "%rdx" => "%edx".to_string(),
        "%rcx" => "%ecx".to_string(),
        "%r8" => "%r8d".to_string(),
        "%r9" => "%r9d".to_string(),
        other => other.to_string(),
    }
}

/// `invoke fn, args...`: every resolved argument is assigned to the next
/// free register of its type, or spilled to the stack once both register
/// files are exhausted (spec §4.5/§4.6/§4.7).
fn lower_invoke(program: &Program, instr: &Instruction, cc: &CallingConvention, out: &mut String) {
    let args: Vec<&Operand> = std::iter::once(&instr.op2)
        .chain(std::iter::once(&instr.op3))
        .chain(instr.extra.iter())
        .filter(|o| !o.is_empty())
        .collect();

    let mut int_used = 0usize;
    let mut float_used = 0usize;
    let mut spilled = Vec::new();
    for arg in &args {
        let ty = if arg.is_variable() {
            declared_type(program, &arg.text)
        } else {
            guess_constant_type(&arg.text)
        };
        if ty == VarType::Float && float_used < cc.float_args.len() {
            load(program, arg, VarType::Float, cc.float_args[float_used], out);
            float_used += 1;
        } else if ty != VarType::Float && int_used < cc.int_args.len() {
            load(program, arg, VarType::Integer, cc.int_args[int_used], out);
            int_used += 1;
        } else {
            spilled.push((*arg, ty));
        }
    }

    let mut stack_bytes = spilled.len() as u64 * 8;
    if cc.shadow_space > 0 {
        stack_bytes += cc.shadow_space;
    }
    if stack_bytes % 16 != 0 {
        stack_bytes += 8;
        let _ = writeln!(out, "\tsubq $8, %rsp");
    }
    for (arg, ty) in spilled.iter().rev() {
        let reg = int_or_float_reg(*ty, "%rax", "%xmm0");
        load(program, arg, *ty, &reg, out);
        if *ty == VarType::Float {
            let _ = writeln!(out, "\tmovq %xmm0, %rax");
        }
        let _ = writeln!(out, "\tpushq %rax");
    }
    if cc.shadow_space > 0 {
        let _ = writeln!(out, "\tsubq ${}, %rsp", cc.shadow_space);
    }
    if cc.uses_al_xmm_count {
        let _ = writeln!(out, "\tmovl ${float_used}, %eax");
    }
    let _ = writeln!(out, "\tcall {}@PLT", mangle(&instr.op1.text));
    if cc.shadow_space > 0 {
        let _ = writeln!(out, "\taddq ${}, %rsp", cc.shadow_space);
    }
    if !spilled.is_empty() && stack_bytes > cc.shadow_space {
        let _ = writeln!(out, "\taddq ${}, %rsp", stack_bytes - cc.shadow_space);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_program::{Program, Variable};
    use mxvm_types::{Instruction, Value};
    use crate::shared::SYSV_CC;

    fn program_with(name: &str, ty: VarType, value: Value) -> Program {
        let mut program = Program::root();
        program.add_variable(Variable::new(name, ty, value));
        program
    }

    #[test]
    fn add_chooses_integer_mnemonic_from_destination_type() {
        let program = program_with("count", VarType::Integer, Value::int(0));
        let mut instr = Instruction::new(Opcode::add);
        instr.op1 = Operand::variable("count");
        instr.op2 = Operand::constant("41");
        let mut out = String::new();
        lower_instruction(&program, &instr, &SYSV_CC, &mut out);
        assert!(out.contains("addq %rcx, %rax"));
        assert!(out.contains("count(%rip)"));
    }

    #[test]
    fn add_chooses_float_mnemonic_for_a_float_destination() {
        let program = program_with("ratio", VarType::Float, Value::float(0.0));
        let mut instr = Instruction::new(Opcode::add);
        instr.op1 = Operand::variable("ratio");
        instr.op2 = Operand::constant("1.5");
        let mut out = String::new();
        lower_instruction(&program, &instr, &SYSV_CC, &mut out);
        assert!(out.contains("addsd %xmm1, %xmm0"));
    }

    #[test]
    fn div_guards_against_division_by_zero() {
        let program = program_with("q", VarType::Integer, Value::int(0));
        let mut instr = Instruction::new(Opcode::div);
        instr.op1 = Operand::variable("q");
        instr.op2 = Operand::constant("9");
        instr.line = 1;
        let mut out = String::new();
        lower_instruction(&program, &instr, &SYSV_CC, &mut out);
        assert!(out.contains("testq %rcx, %rcx"));
        assert!(out.contains("jz .Ldivzero1"));
    }

    #[test]
    fn jp_never_taken_jnp_always_taken() {
        let program = Program::root();
        let mut jp = Instruction::new(Opcode::jp);
        jp.op1 = Operand::variable("loop");
        let mut out = String::new();
        lower_instruction(&program, &jp, &SYSV_CC, &mut out);
        assert!(!out.contains("jmp"));

        let mut jnp = Instruction::new(Opcode::jnp);
        jnp.op1 = Operand::variable("loop");
        let mut out2 = String::new();
        lower_instruction(&program, &jnp, &SYSV_CC, &mut out2);
        assert!(out2.contains("jmp loop"));
    }
}
