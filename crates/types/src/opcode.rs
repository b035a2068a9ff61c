// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::fmt;

/// The MXVM instruction set.
///
/// `nop` (`NULL_INC` in the reference implementation) is reserved at index
/// zero and is never emitted by the parser; it exists so a freshly
/// allocated dispatch table has a well-defined "invalid opcode" slot.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    nop = 0,

    // data movement
    mov,

    // arithmetic
    add,
    sub,
    mul,
    div,
    r#mod,
    neg,

    // bitwise / logical
    not,
    and,
    or,
    xor,

    // type coercion
    to_int,
    to_float,

    // comparison, sets the zero/less/greater/carry flags
    cmp,
    fcmp,

    // control flow
    //
    // `jz`/`jnz` alias the zero flag the same way `je`/`jne` do; they are
    // kept distinct because generated assembly and hand-written MXVM both
    // use either spelling depending on whether the comparison that set the
    // flags was thought of as an equality test or a truth test.
    jmp,
    je,
    jne,
    jl,
    jle,
    jg,
    jge,
    jz,
    jnz,
    ja,
    jb,
    jae,
    jbe,
    jc,
    jnc,
    // parity/overflow/sign jumps have no dedicated flag in this VM; see
    // `Opcode::unconditional_jump_policy` for the fallthrough-or-always
    // policy documented in spec §9 Open Questions.
    jp,
    jnp,
    jo,
    jno,
    js,
    jns,

    call,
    ret,
    done,
    exit,

    // memory and aggregates
    alloc,
    free,
    load,
    store,

    // value stack
    push,
    pop,
    stack_load,
    stack_store,
    stack_sub,

    // I/O and formatting
    print,
    string_print,
    getline,

    // external calls
    invoke,
    r#return,
}

pub const OPCODE_COUNT: usize = Opcode::r#return as usize + 1;

impl Opcode {
    pub const ALL: &'static [Opcode] = &[
        Opcode::nop,
        Opcode::mov,
        Opcode::add,
        Opcode::sub,
        Opcode::mul,
        Opcode::div,
        Opcode::r#mod,
        Opcode::neg,
        Opcode::not,
        Opcode::and,
        Opcode::or,
        Opcode::xor,
        Opcode::to_int,
        Opcode::to_float,
        Opcode::cmp,
        Opcode::fcmp,
        Opcode::jmp,
        Opcode::je,
        Opcode::jne,
        Opcode::jl,
        Opcode::jle,
        Opcode::jg,
        Opcode::jge,
        Opcode::jz,
        Opcode::jnz,
        Opcode::ja,
        Opcode::jb,
        Opcode::jae,
        Opcode::jbe,
        Opcode::jc,
        Opcode::jnc,
        Opcode::jp,
        Opcode::jnp,
        Opcode::jo,
        Opcode::jno,
        Opcode::js,
        Opcode::jns,
        Opcode::call,
        Opcode::ret,
        Opcode::done,
        Opcode::exit,
        Opcode::alloc,
        Opcode::free,
        Opcode::load,
        Opcode::store,
        Opcode::push,
        Opcode::pop,
        Opcode::stack_load,
        Opcode::stack_store,
        Opcode::stack_sub,
        Opcode::print,
        Opcode::string_print,
        Opcode::getline,
        Opcode::invoke,
        Opcode::r#return,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::nop => "nop",
            Opcode::mov => "mov",
            Opcode::add => "add",
            Opcode::sub => "sub",
            Opcode::mul => "mul",
            Opcode::div => "div",
            Opcode::r#mod => "mod",
            Opcode::neg => "neg",
            Opcode::not => "not",
            Opcode::and => "and",
            Opcode::or => "or",
            Opcode::xor => "xor",
            Opcode::to_int => "to_int",
            Opcode::to_float => "to_float",
            Opcode::cmp => "cmp",
            Opcode::fcmp => "fcmp",
            Opcode::jmp => "jmp",
            Opcode::je => "je",
            Opcode::jne => "jne",
            Opcode::jl => "jl",
            Opcode::jle => "jle",
            Opcode::jg => "jg",
            Opcode::jge => "jge",
            Opcode::jz => "jz",
            Opcode::jnz => "jnz",
            Opcode::ja => "ja",
            Opcode::jb => "jb",
            Opcode::jae => "jae",
            Opcode::jbe => "jbe",
            Opcode::jc => "jc",
            Opcode::jnc => "jnc",
            Opcode::jp => "jp",
            Opcode::jnp => "jnp",
            Opcode::jo => "jo",
            Opcode::jno => "jno",
            Opcode::js => "js",
            Opcode::jns => "jns",
            Opcode::call => "call",
            Opcode::ret => "ret",
            Opcode::done => "done",
            Opcode::exit => "exit",
            Opcode::alloc => "alloc",
            Opcode::free => "free",
            Opcode::load => "load",
            Opcode::store => "store",
            Opcode::push => "push",
            Opcode::pop => "pop",
            Opcode::stack_load => "stack_load",
            Opcode::stack_store => "stack_store",
            Opcode::stack_sub => "stack_sub",
            Opcode::print => "print",
            Opcode::string_print => "string_print",
            Opcode::getline => "getline",
            Opcode::invoke => "invoke",
            Opcode::r#return => "return",
        }
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Is this one of the instructions whose first operand must name a
    /// label (used by the flattener to decide which operands to qualify).
    pub fn is_label_jump(&self) -> bool {
        matches!(
            self,
            Opcode::call
                | Opcode::jmp
                | Opcode::je
                | Opcode::jne
                | Opcode::jl
                | Opcode::jle
                | Opcode::jg
                | Opcode::jge
                | Opcode::jz
                | Opcode::jnz
                | Opcode::ja
                | Opcode::jb
                | Opcode::jae
                | Opcode::jbe
                | Opcode::jc
                | Opcode::jnc
                | Opcode::jp
                | Opcode::jnp
                | Opcode::jo
                | Opcode::jno
                | Opcode::js
                | Opcode::jns
        )
    }

    /// `jp`/`jo`/`js` are approximated as fallthrough and `jnp`/`jno`/`jns`
    /// as always-taken, per spec §9 Open Questions: this VM tracks no
    /// parity/overflow/sign bit, so these six opcodes are resolved
    /// statically rather than by consulting a flag.
    pub fn unconditional_jump_policy(&self) -> Option<bool> {
        match self {
            Opcode::jp | Opcode::jo | Opcode::js => Some(false),
            Opcode::jnp | Opcode::jno | Opcode::jns => Some(true),
            _ => None,
        }
    }

    /// The only opcodes the grammar allows with zero operands. Every other
    /// opcode requires at least one, which is what lets the parser tell a
    /// bare instruction apart from the next statement without a
    /// terminator token (spec §6's grammar has none).
    pub fn takes_no_operands(&self) -> bool {
        matches!(self, Opcode::nop | Opcode::ret | Opcode::done)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
