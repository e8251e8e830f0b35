//! Code objects: the compilable unit of guest code.

use crate::instruction::Instruction;
use bitflags::bitflags;
use molten_core::{InternedString, Value};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Properties of a code unit recorded at build time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CodeFlags: u16 {
        /// Contains nested code units in its constant pool.
        const DEFINES_FUNCTIONS = 1 << 0;
    }
}

/// A compiled unit of guest code.
///
/// Code objects are immutable once built and shared as `Arc<CodeObject>`.
/// The `Arc` pointer is the unit's identity: every function object created
/// from the same `Arc` resolves to the same cache entry, and a rebuilt unit
/// is a new identity.
#[derive(Debug)]
pub struct CodeObject {
    /// Short name, used in error messages.
    pub name: InternedString,
    /// Dotted name including enclosing scopes.
    pub qualname: InternedString,
    /// Packed instruction stream.
    pub instructions: Box<[Instruction]>,
    /// Constant pool referenced by `LoadConst` and `MakeFunction`.
    pub constants: Box<[Value]>,
    /// Names referenced by `LoadGlobal`/`StoreGlobal`.
    pub names: Box<[InternedString]>,
    /// Declared positional parameter count. Arguments bind to `r0..r{n-1}`.
    pub arg_count: u16,
    /// Registers the unit needs, parameters included.
    pub register_count: u16,
    /// Build-time properties.
    pub flags: CodeFlags,
    /// Nested code units kept alive for `MakeFunction` constants.
    pub nested: Box<[Arc<CodeObject>]>,
}

impl CodeObject {
    /// Render the instruction stream, one instruction per line.
    #[must_use]
    pub fn disassemble(&self) -> String {
        use fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} (args={}, registers={})",
            self.qualname, self.arg_count, self.register_count
        );
        for (idx, inst) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{idx:04}  {inst}");
        }
        out
    }
}

impl fmt::Display for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<code {}>", self.qualname)
    }
}
