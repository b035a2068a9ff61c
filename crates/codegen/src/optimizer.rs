// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The peephole optimizer (spec §4.8): three composed, line-oriented
//! passes over the generated assembly text. Operating on text rather than
//! on a second IR keeps this pass decoupled from `lowering` — it only
//! needs to recognize the fixed set of mnemonics that pass emits.

use std::collections::HashMap;

/// Tracks, per register/memory slot, the last value moved into it so a
/// redundant `mov` can be dropped or rewritten (spec §4.8 Core pass).
/// Invalidated wholesale at labels, calls, and anything that touches
/// `%rsp`, since none of those are modeled here.
struct ValueTracker {
    last_value: HashMap<String, String>,
}

impl ValueTracker {
    fn new() -> Self {
        ValueTracker { last_value: HashMap::new() }
    }

    fn invalidate_all(&mut self) {
        self.last_value.clear();
    }

    fn record(&mut self, dest: &str, value: &str) {
        self.last_value.insert(dest.to_string(), value.to_string());
    }

    fn alias_of(&self, value: &str) -> Option<&str> {
        self.last_value
            .iter()
            .find(|(_, v)| v.as_str() == value)
            .map(|(k, _)| k.as_str())
    }
}

fn touches_rsp(line: &str) -> bool {
    line.contains("%rsp")
}

fn is_label(line: &str) -> bool {
    line.ends_with(':')
}

fn is_call_or_jump(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("call ") || t.starts_with('j')
}

fn parse_mov(line: &str) -> Option<(&str, &str)> {
    let t = line.trim();
    let rest = t.strip_prefix("movq ").or_else(|| t.strip_prefix("movsd "))?;
    let (src, dst) = rest.split_once(", ")?;
    Some((src.trim(), dst.trim()))
}

/// Drops `mov r,r` no-ops and rewrites `mov mem,r` into a move from
/// whichever register already holds that memory value, when one is known
/// (spec §4.8 Core pass).
pub fn core_pass(asm: &str) -> String {
    let mut tracker = ValueTracker::new();
    let mut out = Vec::with_capacity(asm.lines().count());
    for line in asm.lines() {
        let trimmed = line.trim();
        if is_label(trimmed) || is_call_or_jump(trimmed) || touches_rsp(trimmed) {
            tracker.invalidate_all();
            out.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("add")
            || trimmed.starts_with("sub")
            || trimmed.starts_with("imul")
            || trimmed.starts_with("xor")
            || trimmed.starts_with("neg")
            || trimmed.starts_with("not")
        {
            tracker.invalidate_all();
            out.push(line.to_string());
            continue;
        }
        if let Some((src, dst)) = parse_mov(trimmed) {
            if src == dst {
                continue;
            }
            if let Some(alias) = tracker.alias_of(src) {
                if alias != dst {
                    let mnemonic = if trimmed.starts_with("movsd") { "movsd" } else { "movq" };
                    out.push(format!("\t{mnemonic} {alias}, {dst}"));
                    tracker.record(dst, src);
                    continue;
                }
            }
            tracker.record(dst, src);
        }
        out.push(line.to_string());
    }
    out.join("\n") + "\n"
}

/// Darwin-specific symbol rewriting (spec §4.8b): `main` becomes `_main`,
/// every user-defined global and call target gets an underscore prefix,
/// and stdio symbols become GOT-indirect loads the way `ld64` expects.
pub fn darwin_pass(asm: &str, user_symbols: &[String]) -> String {
    let mut out = String::with_capacity(asm.len());
    for line in asm.lines() {
        let mut rewritten = line.to_string();
        if rewritten.trim_start() == ".globl main" {
            rewritten = "\t.globl _main".to_string();
        } else if rewritten.trim_end() == "main:" {
            rewritten = "_main:".to_string();
        } else {
            for symbol in user_symbols {
                let underscored = format!("_{symbol}");
                rewritten = replace_word(&rewritten, symbol, &underscored);
            }
        }
        rewritten = rewritten.replace("@PLT", "@GOTPCREL(%rip)");
        out.push_str(&rewritten);
        out.push('\n');
    }
    out
}

fn replace_word(line: &str, from: &str, to: &str) -> String {
    if !line.contains(from) {
        return line.to_string();
    }
    let mut result = String::new();
    let mut rest = line;
    while let Some(pos) = rest.find(from) {
        let before_ok = pos == 0
            || !rest.as_bytes()[pos - 1].is_ascii_alphanumeric() && rest.as_bytes()[pos - 1] != b'_';
        let after = pos + from.len();
        let after_ok = after >= rest.len()
            || !rest.as_bytes()[after].is_ascii_alphanumeric() && rest.as_bytes()[after] != b'_';
        if before_ok && after_ok {
            result.push_str(&rest[..pos]);
            result.push_str(to);
            rest = &rest[after..];
        } else {
            result.push_str(&rest[..after]);
            rest = &rest[after..];
        }
    }
    result.push_str(rest);
    result
}

/// Collapses an immediately adjacent `sub $N, %rsp` / `add $N, %rsp` pair
/// into nothing, the Win64-only cleanup pass (spec §4.8c) for the shadow
/// space reservation `invoke`/`print` emit around a call that turns out
/// to need no spilled arguments.
pub fn win64_pass(asm: &str) -> String {
    let lines: Vec<&str> = asm.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if i + 1 < lines.len() {
            if let (Some(n1), Some(n2)) = (sub_rsp_amount(lines[i]), add_rsp_amount(lines[i + 1])) {
                if n1 == n2 {
                    i += 2;
                    continue;
                }
            }
        }
        out.push(lines[i]);
        i += 1;
    }
    out.join("\n") + "\n"
}

fn sub_rsp_amount(line: &str) -> Option<u64> {
    let t = line.trim().strip_prefix("subq $")?;
    let (n, rest) = t.split_once(", ")?;
    if rest.trim() == "%rsp" {
        n.parse().ok()
    } else {
        None
    }
}

fn add_rsp_amount(line: &str) -> Option<u64> {
    let t = line.trim().strip_prefix("addq $")?;
    let (n, rest) = t.split_once(", ")?;
    if rest.trim() == "%rsp" {
        n.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_pass_drops_a_self_move() {
        let asm = "\tmovq %rax, %rax\n\tret\n";
        let out = core_pass(asm);
        assert!(!out.contains("movq %rax, %rax"));
        assert!(out.contains("ret"));
    }

    #[test]
    fn core_pass_reuses_an_aliased_register_instead_of_reloading_memory() {
        let asm = "\tmovq count(%rip), %rax\n\tmovq count(%rip), %rcx\n";
        let out = core_pass(asm);
        assert!(out.contains("movq %rax, %rcx"));
    }

    #[test]
    fn core_pass_invalidates_tracking_at_a_call() {
        let asm = "\tmovq count(%rip), %rax\n\tcall foo@PLT\n\tmovq count(%rip), %rcx\n";
        let out = core_pass(asm);
        assert!(!out.contains("movq %rax, %rcx"));
    }

    #[test]
    fn darwin_pass_renames_main_and_underscores_user_symbols() {
        let asm = "\t.globl main\nmain:\n\tcall helper@PLT\n";
        let out = darwin_pass(asm, &["helper".to_string()]);
        assert!(out.contains(".globl _main"));
        assert!(out.contains("_main:"));
        assert!(out.contains("call _helper@GOTPCREL(%rip)"));
    }

    #[test]
    fn win64_pass_collapses_a_matching_shadow_space_pair() {
        let asm = "\tsubq $32, %rsp\n\taddq $32, %rsp\n\tret\n";
        let out = win64_pass(asm);
        assert!(!out.contains("%rsp"));
        assert!(out.contains("ret"));
    }

    #[test]
    fn win64_pass_keeps_a_mismatched_pair() {
        let asm = "\tsubq $32, %rsp\n\taddq $40, %rsp\n";
        let out = win64_pass(asm);
        assert!(out.contains("subq $32, %rsp"));
        assert!(out.contains("addq $40, %rsp"));
    }
}
