//! Per-activation execution state.
//!
//! Each guest call gets a [`Frame`] holding its instruction pointer and a
//! fixed 256-slot register file, stored inline so the hot accessors never
//! chase a second pointer.

use std::sync::Arc;

use molten_bytecode::{CodeObject, Instruction};
use molten_core::{InternedString, Value};

/// Maximum call depth before a `RecursionError` is raised.
///
/// Covers interpreted and template-executed activations uniformly.
pub const MAX_RECURSION_DEPTH: usize = 1000;

/// Number of registers per frame.
pub const REGISTER_COUNT: usize = 256;

/// A call frame for one activation of a code unit.
///
/// Holds the full register file inline so register access never
/// indirects through a separate allocation.
#[repr(C)]
pub struct Frame {
    /// Code unit being executed.
    pub code: Arc<CodeObject>,
    /// Instruction pointer (index of the next instruction).
    pub ip: u32,
    /// Register file.
    pub registers: [Value; REGISTER_COUNT],
}

impl Frame {
    /// Create a frame for a code unit. Every register starts out as `None`.
    pub fn new(code: Arc<CodeObject>) -> Self {
        Self {
            code,
            ip: 0,
            registers: [Value::none(); REGISTER_COUNT],
        }
    }

    /// Read a register.
    #[inline(always)]
    pub fn get_reg(&self, reg: u8) -> Value {
        // Safety: every u8 indexes within the 256-slot file.
        unsafe { *self.registers.get_unchecked(reg as usize) }
    }

    /// Write a register.
    #[inline(always)]
    pub fn set_reg(&mut self, reg: u8, value: Value) {
        // Safety: every u8 indexes within the 256-slot file.
        unsafe {
            *self.registers.get_unchecked_mut(reg as usize) = value;
        }
    }

    /// Read two registers at once.
    #[inline(always)]
    pub fn get_regs2(&self, a: u8, b: u8) -> (Value, Value) {
        (self.get_reg(a), self.get_reg(b))
    }

    /// Fetch the next instruction and advance the instruction pointer.
    #[inline(always)]
    pub fn fetch(&mut self) -> Instruction {
        let at = self.ip as usize;
        self.ip += 1;
        // Safety: the dispatch loop checks is_done() before every fetch.
        unsafe { *self.code.instructions.get_unchecked(at) }
    }

    /// Whether the instruction pointer has run past the last instruction.
    #[inline(always)]
    pub fn is_done(&self) -> bool {
        self.ip as usize >= self.code.instructions.len()
    }

    /// Read a constant from the code unit's pool.
    #[inline(always)]
    pub fn get_const(&self, idx: u16) -> Value {
        self.code.constants[idx as usize]
    }

    /// Read a name from the code unit's names table.
    #[inline(always)]
    pub fn get_name(&self, idx: u16) -> &InternedString {
        &self.code.names[idx as usize]
    }
}
