// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The tagged value model (spec §3, §4.1) and the comparison/arithmetic
//! rules that both the interpreter and the code generator must agree on.

use crate::error::MxvmError;
use std::fmt;

/// The dynamic tag of a variable or stack slot.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VarType {
    Null,
    Integer,
    Float,
    Byte,
    String,
    Pointer,
    Extern,
    Label,
    Array,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarType::Null => "null",
            VarType::Integer => "integer",
            VarType::Float => "float",
            VarType::Byte => "byte",
            VarType::String => "string",
            VarType::Pointer => "pointer",
            VarType::Extern => "extern",
            VarType::Label => "label",
            VarType::Array => "array",
        };
        write!(f, "{s}")
    }
}

/// A fully materialized value. Every field is always present (rather than
/// an enum-of-payloads) so that `mov`/coercion can overwrite the tag and
/// the relevant payload in place without reallocating the struct — this
/// mirrors the reference implementation's `Variable_Value` union, minus
/// the union (Rust has no safe tagged union with this shape, so the unused
/// fields are simply ignored per the active tag).
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub tag: VarType,
    pub int_value: i64,
    pub float_value: f64,
    pub str_value: String,
    pub label_value: String,
    /// address of an owned or borrowed allocation; 0 means null.
    pub ptr_addr: usize,
    pub ptr_elem_size: u64,
    pub ptr_elem_count: u64,
    pub owns: bool,
    /// non-zero for a buffered STRING variable (spec §3 Variable).
    pub buffer_size: u64,
}

impl Default for Value {
    fn default() -> Self {
        Value {
            tag: VarType::Null,
            int_value: 0,
            float_value: 0.0,
            str_value: String::new(),
            label_value: String::new(),
            ptr_addr: 0,
            ptr_elem_size: 0,
            ptr_elem_count: 0,
            owns: false,
            buffer_size: 0,
        }
    }
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value {
            tag: VarType::Integer,
            int_value: v,
            ..Default::default()
        }
    }

    pub fn byte(v: u8) -> Self {
        Value {
            tag: VarType::Byte,
            int_value: v as i64,
            ..Default::default()
        }
    }

    pub fn float(v: f64) -> Self {
        Value {
            tag: VarType::Float,
            float_value: v,
            ..Default::default()
        }
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value {
            tag: VarType::String,
            str_value: v.into(),
            ..Default::default()
        }
    }

    pub fn buffered_string(capacity: u64) -> Self {
        Value {
            tag: VarType::String,
            buffer_size: capacity,
            str_value: String::new(),
            ..Default::default()
        }
    }

    pub fn null_pointer() -> Self {
        Value {
            tag: VarType::Pointer,
            ..Default::default()
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Value {
            tag: VarType::Label,
            label_value: name.into(),
            ..Default::default()
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.tag, VarType::Integer | VarType::Byte | VarType::Float)
    }

    /// Parse a literal token into a freshly tagged value matching `tag`,
    /// used when `mov`/arithmetic receive a constant operand (spec §4.1:
    /// "if src is constant, parsed into dst's declared type").
    pub fn from_literal(tag: VarType, text: &str) -> Result<Value, MxvmError> {
        match tag {
            VarType::Integer => Ok(Value::int(parse_int_literal(text)?)),
            VarType::Byte => Ok(Value::byte(parse_int_literal(text)? as u8)),
            VarType::Float => text
                .parse::<f64>()
                .map(Value::float)
                .map_err(|_| MxvmError::ty(format!("'{text}' is not a valid float literal"))),
            VarType::String => Ok(Value::string(unescape(text))),
            VarType::Pointer => {
                if text == "null" {
                    Ok(Value::null_pointer())
                } else {
                    Err(MxvmError::ty(format!(
                        "'{text}' is not a valid pointer literal"
                    )))
                }
            }
            other => Err(MxvmError::ty(format!(
                "cannot construct a literal of type {other}"
            ))),
        }
    }

    fn as_f64(&self) -> Result<f64, MxvmError> {
        match self.tag {
            VarType::Float => Ok(self.float_value),
            VarType::Integer | VarType::Byte => Ok(self.int_value as f64),
            VarType::Pointer => Ok(self.ptr_addr as f64),
            other => Err(MxvmError::ty(format!(
                "cannot treat a {other} value as a number"
            ))),
        }
    }

    fn as_i64(&self) -> Result<i64, MxvmError> {
        match self.tag {
            VarType::Integer | VarType::Byte => Ok(self.int_value),
            VarType::Float => Ok(self.float_value as i64),
            VarType::Pointer => Ok(self.ptr_addr as i64),
            other => Err(MxvmError::ty(format!(
                "cannot treat a {other} value as an integer"
            ))),
        }
    }

    /// Implements the mixed-type arithmetic rules of spec §4.1: the
    /// destination's tag decides whether the computation happens in
    /// integer or floating point, and division/modulo by zero yield zero
    /// rather than trapping.
    pub fn arith(dest_tag: VarType, op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, MxvmError> {
        match dest_tag {
            VarType::Float => {
                let a = lhs.as_f64()?;
                let b = rhs.as_f64()?;
                let r = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => {
                        if b == 0.0 {
                            0.0
                        } else {
                            a / b
                        }
                    }
                    ArithOp::Mod => {
                        return Err(MxvmError::ty("mod requires an integer destination"))
                    }
                };
                Ok(Value::float(r))
            }
            VarType::Integer | VarType::Byte => {
                let a = lhs.as_i64()?;
                let b = rhs.as_i64()?;
                let r = match op {
                    ArithOp::Add => a.wrapping_add(b),
                    ArithOp::Sub => a.wrapping_sub(b),
                    ArithOp::Mul => a.wrapping_mul(b),
                    ArithOp::Div => {
                        if b == 0 {
                            0
                        } else {
                            a.wrapping_div(b)
                        }
                    }
                    ArithOp::Mod => {
                        if b == 0 {
                            0
                        } else {
                            a.wrapping_rem(b)
                        }
                    }
                };
                if dest_tag == VarType::Byte {
                    Ok(Value::byte(r as u8))
                } else {
                    Ok(Value::int(r))
                }
            }
            other => Err(MxvmError::ty(format!(
                "arithmetic destination must be numeric, found {other}"
            ))),
        }
    }

    pub fn negate(&self) -> Result<Value, MxvmError> {
        match self.tag {
            VarType::Integer => Ok(Value::int(-self.int_value)),
            VarType::Byte => Ok(Value::byte((-(self.int_value)) as u8)),
            VarType::Float => Ok(Value::float(-self.float_value)),
            other => Err(MxvmError::ty(format!("cannot negate a {other} value"))),
        }
    }

    pub fn logical_not(&self) -> Result<Value, MxvmError> {
        match self.tag {
            VarType::Integer | VarType::Byte => {
                Ok(Value::int(if self.int_value == 0 { 1 } else { 0 }))
            }
            other => Err(MxvmError::ty(format!(
                "'not' requires an integer operand, found {other}"
            ))),
        }
    }

    pub fn bitwise(&self, op: BitOp, rhs: &Value) -> Result<Value, MxvmError> {
        let a = self.as_i64()?;
        let b = rhs.as_i64()?;
        let r = match op {
            BitOp::And => a & b,
            BitOp::Or => a | b,
            BitOp::Xor => a ^ b,
        };
        Ok(Value::int(r))
    }

    pub fn to_int(&self) -> Result<Value, MxvmError> {
        match self.tag {
            VarType::String => self
                .str_value
                .trim()
                .parse::<i64>()
                .map(Value::int)
                .map_err(|_| {
                    MxvmError::ty(format!("cannot parse '{}' as an integer", self.str_value))
                }),
            VarType::Float => Ok(Value::int(self.float_value.trunc() as i64)),
            VarType::Integer | VarType::Byte => Ok(Value::int(self.int_value)),
            other => Err(MxvmError::ty(format!("cannot convert {other} to_int"))),
        }
    }

    /// `to_float` from a POINTER reinterprets the address as a double; this
    /// is implementation-defined per spec §9 Open Questions, kept only for
    /// parity with the reference VM and never relied on by generated code.
    pub fn to_float(&self) -> Result<Value, MxvmError> {
        match self.tag {
            VarType::String => self
                .str_value
                .trim()
                .parse::<f64>()
                .map(Value::float)
                .map_err(|_| {
                    MxvmError::ty(format!("cannot parse '{}' as a float", self.str_value))
                }),
            VarType::Integer | VarType::Byte => Ok(Value::float(self.int_value as f64)),
            VarType::Pointer => Ok(Value::float(self.ptr_addr as f64)),
            other => Err(MxvmError::ty(format!("cannot convert {other} to_float"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

/// Outcome of `cmp`/`fcmp`: exactly one of zero/less/greater is ever set
/// (spec §8 invariant), `carry` mirrors `less` for the unsigned-style
/// jumps (`jc`/`jb`) the way the reference code generator does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub less: bool,
    pub greater: bool,
    pub carry: bool,
}

impl Flags {
    pub fn from_ordering(ordering: std::cmp::Ordering) -> Flags {
        use std::cmp::Ordering::*;
        match ordering {
            Equal => Flags {
                zero: true,
                ..Default::default()
            },
            Less => Flags {
                less: true,
                carry: true,
                ..Default::default()
            },
            Greater => Flags {
                greater: true,
                ..Default::default()
            },
        }
    }
}

/// `cmp` supports every ordered combination named in spec §4.1.
pub fn compare(a: &Value, b: &Value) -> Result<Flags, MxvmError> {
    use VarType::*;
    let ordering = match (a.tag, b.tag) {
        (Integer | Byte, Integer | Byte) => a.int_value.cmp(&b.int_value),
        (Float, Float) => order_f64(a.float_value, b.float_value)?,
        (Float, Integer | Byte) => order_f64(a.float_value, b.int_value as f64)?,
        (Integer | Byte, Float) => order_f64(a.int_value as f64, b.float_value)?,
        (Pointer, Pointer) => a.ptr_addr.cmp(&b.ptr_addr),
        (Pointer, Integer | Byte) => a.ptr_addr.cmp(&(b.int_value as usize)),
        (Integer | Byte, Pointer) => (a.int_value as usize).cmp(&b.ptr_addr),
        (t1, t2) => {
            return Err(MxvmError::ty(format!(
                "cmp: unsupported type combination: {t1} vs {t2}"
            )))
        }
    };
    Ok(Flags::from_ordering(ordering))
}

/// `fcmp` forces both operands to double before comparing (spec §4.1).
pub fn fcompare(a: &Value, b: &Value) -> Result<Flags, MxvmError> {
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    Ok(Flags::from_ordering(order_f64(x, y)?))
}

fn order_f64(a: f64, b: f64) -> Result<std::cmp::Ordering, MxvmError> {
    a.partial_cmp(&b)
        .ok_or_else(|| MxvmError::ty("comparison against NaN is unordered"))
}

/// Accepts decimal, `0x`-prefixed hex, and `0b`-prefixed binary integer
/// literals (spec §4.2: "malformed hex/integer/float literals" must be
/// rejected).
pub fn parse_int_literal(text: &str) -> Result<i64, MxvmError> {
    let (neg, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        text.parse::<i64>()
    }
    .map_err(|_| MxvmError::syntax(format!("'{text}' is not a valid integer literal")))?;
    Ok(if neg { -value } else { value })
}

/// Re-escapes a source string literal's backslash escapes (`\n`, `\t`,
/// `\\`, `\"`) into their runtime characters.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
