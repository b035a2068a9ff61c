// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Owned heap allocations for `alloc`/`free`/`load`/`store` (spec §4.4.1,
//! §8 invariants: a calloc'd, zero-initialized region; `free` nulls and is
//! idempotent). Addresses are real process addresses obtained from the
//! global allocator, matching the reference VM's use of raw `calloc`
//! pointers — there is no sandboxed address space to emulate.

use std::alloc::{self, Layout};
use std::collections::HashMap;

use mxvm_types::{MxvmError, VarType, Value};

struct Allocation {
    layout: Layout,
}

#[derive(Default)]
pub struct Heap {
    allocations: HashMap<usize, Allocation>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `elem_size * elem_count` zeroed bytes and returns the base
    /// address (spec §4.4.1 `alloc`, §8: "zero-initialized region of
    /// s*n bytes").
    pub fn alloc(&mut self, elem_size: u64, elem_count: u64) -> Result<usize, MxvmError> {
        let total = (elem_size.max(1) * elem_count.max(1)) as usize;
        let layout = Layout::from_size_align(total, 8)
            .map_err(|_| MxvmError::memory("invalid alloc size"))?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(MxvmError::memory("allocation failed"));
        }
        let addr = ptr as usize;
        self.allocations.insert(addr, Allocation { layout });
        Ok(addr)
    }

    /// `free` of a null or untracked pointer is a no-op (spec §7 Memory:
    /// "free of non-owned pointer is a no-op but tracked").
    pub fn free(&mut self, addr: usize) {
        if addr == 0 {
            return;
        }
        if let Some(allocation) = self.allocations.remove(&addr) {
            unsafe { alloc::dealloc(addr as *mut u8, allocation.layout) };
        } else {
            tracing::debug!(addr, "free of a pointer the heap did not allocate");
        }
    }

    fn address(&self, base: usize, index: i64, stride: i64) -> Result<usize, MxvmError> {
        if base == 0 {
            return Err(MxvmError::memory("null-pointer dereference"));
        }
        Ok((base as i64 + index * stride) as usize)
    }

    /// Reads one element at `base + index*stride`, interpreted per `tag`
    /// (spec §4.4.1 `load`). A STRING destination reads a pointer and
    /// copies its C-string contents.
    pub fn load(&self, base: usize, index: i64, stride: i64, tag: VarType) -> Result<Value, MxvmError> {
        let addr = self.address(base, index, stride)?;
        unsafe {
            match tag {
                VarType::Integer => Ok(Value::int(*(addr as *const i64))),
                VarType::Byte => Ok(Value::byte(*(addr as *const u8))),
                VarType::Float => Ok(Value::float(*(addr as *const f64))),
                VarType::Pointer => Ok(Value {
                    tag: VarType::Pointer,
                    ptr_addr: *(addr as *const usize),
                    ..Value::default()
                }),
                VarType::String => {
                    let str_ptr = *(addr as *const usize);
                    if str_ptr == 0 {
                        return Err(MxvmError::memory("null-pointer dereference"));
                    }
                    Ok(Value::string(read_c_string(str_ptr)))
                }
                other => Err(MxvmError::ty(format!("cannot load a {other} from memory"))),
            }
        }
    }

    /// Writes `value` at `base + index*stride` (spec §4.4.1 `store`).
    pub fn store(&self, base: usize, index: i64, stride: i64, value: &Value) -> Result<(), MxvmError> {
        let addr = self.address(base, index, stride)?;
        unsafe {
            match value.tag {
                VarType::Integer => *(addr as *mut i64) = value.int_value,
                VarType::Byte => *(addr as *mut u8) = value.int_value as u8,
                VarType::Float => *(addr as *mut f64) = value.float_value,
                VarType::Pointer => *(addr as *mut usize) = value.ptr_addr,
                other => {
                    return Err(MxvmError::ty(format!("cannot store a {other} to memory")))
                }
            }
        }
        Ok(())
    }
}

unsafe fn read_c_string(addr: usize) -> String {
    let mut bytes = Vec::new();
    let mut cursor = addr as *const u8;
    loop {
        let byte = *cursor;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        cursor = cursor.add(1);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

impl Drop for Heap {
    fn drop(&mut self) {
        for (addr, allocation) in self.allocations.drain() {
            unsafe { alloc::dealloc(addr as *mut u8, allocation.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_round_trips_through_store_load() {
        let mut heap = Heap::new();
        let addr = heap.alloc(8, 4).unwrap();

        let zero = heap.load(addr, 0, 8, VarType::Integer).unwrap();
        assert_eq!(zero.int_value, 0);

        heap.store(addr, 2, 8, &Value::int(42)).unwrap();
        let loaded = heap.load(addr, 2, 8, VarType::Integer).unwrap();
        assert_eq!(loaded.int_value, 42);

        heap.free(addr);
    }

    #[test]
    fn free_is_idempotent_on_null() {
        let mut heap = Heap::new();
        heap.free(0);
        heap.free(0);
    }

    #[test]
    fn load_from_null_is_a_memory_error() {
        let heap = Heap::new();
        let err = heap.load(0, 0, 8, VarType::Integer).unwrap_err();
        assert_eq!(err.kind, mxvm_types::ErrorKind::Memory);
    }
}
