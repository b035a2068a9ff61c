// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Merges a `Program`'s object tree into one flat program (spec §4.3),
//! grounded in the reference implementation's `Program::flatten`,
//! `flatten_inc`, `flatten_label` and `flatten_external` (see
//! `examples/original_source/src/icode_exec.cpp`).
//!
//! Once flattened, every variable and label is reachable by a single
//! direct lookup in the returned program's tables — the interpreter no
//! longer needs `ProgramRegistry`'s tree walk.

use mxvm_types::{Instruction, MxvmError, Operand};

use crate::program::Program;
use crate::registry::ProgramRegistry;

pub fn flatten(root: &Program) -> Result<Program, MxvmError> {
    let mut flat = Program::new(root.name.clone());
    let registry = ProgramRegistry::new(root);

    flatten_into(root, root, &registry, &mut flat)?;
    Ok(flat)
}

fn flatten_into(
    root: &Program,
    current: &Program,
    registry: &ProgramRegistry,
    flat: &mut Program,
) -> Result<(), MxvmError> {
    for variable in current.variables.values() {
        let mut variable = variable.clone();
        variable.name = variable.qualified_name();
        flat.variables.insert(variable.name.clone(), variable);
    }

    let base = flat.instructions.len();
    for (name, (address, is_function)) in &current.labels {
        let qualified = qualify_label(root, current, name);
        flat.add_label(qualified, base + address, *is_function);
    }

    for instruction in &current.instructions {
        let mut instruction = instruction.clone();
        qualify_operand(&mut instruction.op1, current, root, registry, instruction.opcode.is_label_jump());
        qualify_operand(&mut instruction.op2, current, root, registry, false);
        qualify_operand(&mut instruction.op3, current, root, registry, false);
        for operand in &mut instruction.extra {
            qualify_operand(operand, current, root, registry, false);
        }
        flat.add_instruction(instruction);
    }

    flat.external_functions.merge_from(&current.external_functions);

    for child in &current.objects {
        flatten_into(root, child, registry, flat)?;
    }

    Ok(())
}

fn qualify_operand(
    operand: &mut Operand,
    current: &Program,
    root: &Program,
    registry: &ProgramRegistry,
    is_label: bool,
) {
    if !operand.is_variable() || operand.text.contains('.') || Program::is_register_alias(&operand.text) {
        return;
    }

    if is_label {
        operand.text = qualify_label(root, current, &operand.text);
        return;
    }

    if let Ok(resolved) = registry.get_variable(current, &operand.text) {
        operand.object = resolved.object.clone();
        operand.text = resolved.qualified_name();
    }
}

/// Resolves a bare label name the same way `ProgramRegistry::get_variable`
/// resolves a bare variable name: current object first, then root, then
/// every other object in tree order. Falls back to leaving the name
/// untouched (e.g. a forward reference that the validator will reject).
fn qualify_label(root: &Program, current: &Program, name: &str) -> String {
    if current.labels.contains_key(name) {
        return if std::ptr::eq(current, root) {
            name.to_string()
        } else {
            format!("{}.{name}", current.name)
        };
    }
    if root.labels.contains_key(name) {
        return name.to_string();
    }

    fn walk<'a>(program: &'a Program, name: &str) -> Option<&'a Program> {
        if program.labels.contains_key(name) {
            return Some(program);
        }
        program.objects.iter().find_map(|child| walk(child, name))
    }
    match walk(root, name) {
        Some(object) if !std::ptr::eq(object, root) => format!("{}.{name}", object.name),
        _ => name.to_string(),
    }
}

/// Mangles a label according to its owning object, used by callers that
/// need to pre-compute the qualified name a label would receive once its
/// program is flattened (the code generator uses this for object-local
/// entry points).
pub fn qualified_label_name(object: &Program, root: &Program, name: &str) -> String {
    if std::ptr::eq(object, root) {
        name.to_string()
    } else {
        format!("{}.{name}", object.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxvm_types::{Opcode, VarType, Value};
    use crate::variable::Variable;

    #[test]
    fn preserves_instruction_order_and_shifts_label_addresses() {
        let mut root = Program::root();
        root.add_instruction(Instruction::new(Opcode::nop));
        root.add_label("root_label", 0, false);

        let mut child = Program::new("worker");
        child.add_variable(Variable::new("counter", VarType::Integer, Value::int(0)).in_object("worker"));
        let mut mov = Instruction::new(Opcode::mov);
        mov.op1 = Operand::variable("counter");
        mov.op2 = Operand::constant("1");
        child.add_instruction(mov);
        child.add_label("loop", 0, false);
        root.add_object(child);

        let flat = flatten(&root).unwrap();

        assert_eq!(flat.instructions.len(), 2);
        assert!(flat.variables.contains_key("worker.counter"));
        assert_eq!(flat.labels.get("root_label"), Some(&(0, false)));
        assert_eq!(flat.labels.get("worker.loop"), Some(&(1, false)));

        let mov = &flat.instructions[1];
        assert_eq!(mov.op1.text, "worker.counter");
    }

    #[test]
    fn merges_external_functions_first_registration_wins() {
        let mut root = Program::root();
        root.external_functions.register("string.concat");
        let mut child = Program::new("a");
        child.external_functions.register("io.print_line");
        root.add_object(child);

        let flat = flatten(&root).unwrap();
        assert!(flat.external_functions.contains("string.concat"));
        assert!(flat.external_functions.contains("io.print_line"));
    }
}
