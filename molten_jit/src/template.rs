//! Pre-decoded executable form of a code unit.
//!
//! A [`CompiledUnit`] is the artifact the backend produces: the packed
//! instruction stream re-expressed as [`TemplateOp`]s with constants
//! inlined, global names resolved to interned handles, and jump targets
//! rewritten to absolute op indices. The template engine executes the
//! stream directly with no fetch/decode work per step.

use std::mem;

use molten_core::{InternedString, Value};

// =============================================================================
// Template Ops
// =============================================================================

/// One pre-decoded operation of a compiled unit.
///
/// Maps 1:1 to a bytecode instruction, but with every pool lookup done
/// at compile time. Register operands index the unit's register file;
/// jump targets are absolute op indices.
#[derive(Debug, Clone)]
pub enum TemplateOp {
    // Value loading
    /// dst = an inlined constant (never an object reference).
    LoadConst {
        /// Destination register.
        dst: u8,
        /// The constant, decoded from the pool at compile time.
        value: Value,
    },
    /// dst = None.
    LoadNone {
        /// Destination register.
        dst: u8,
    },
    /// dst = an inlined boolean.
    LoadBool {
        /// Destination register.
        dst: u8,
        /// The boolean.
        value: bool,
    },
    /// dst = src.
    Move {
        /// Destination register.
        dst: u8,
        /// Source register.
        src: u8,
    },

    // Globals
    /// dst = globals\[name\].
    LoadGlobal {
        /// Destination register.
        dst: u8,
        /// Global name, resolved from the names table at compile time.
        name: InternedString,
    },
    /// globals\[name\] = src.
    StoreGlobal {
        /// Source register.
        src: u8,
        /// Global name, resolved from the names table at compile time.
        name: InternedString,
    },

    // Arithmetic
    /// dst = lhs + rhs.
    Add {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs - rhs.
    Sub {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs * rhs.
    Mul {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs // rhs.
    FloorDiv {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs % rhs.
    Mod {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = -src.
    Neg {
        /// Destination register.
        dst: u8,
        /// Source register.
        src: u8,
    },

    // Comparisons
    /// dst = lhs < rhs.
    Lt {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs <= rhs.
    Le {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs == rhs.
    Eq {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs != rhs.
    Ne {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs > rhs.
    Gt {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = lhs >= rhs.
    Ge {
        /// Destination register.
        dst: u8,
        /// Left operand register.
        lhs: u8,
        /// Right operand register.
        rhs: u8,
    },
    /// dst = not src (truthiness inverted).
    Not {
        /// Destination register.
        dst: u8,
        /// Source register.
        src: u8,
    },

    // Control flow
    /// Jump to an absolute op index.
    Jump {
        /// Absolute op index.
        target: u32,
    },
    /// Jump to an absolute op index if cond is falsy.
    JumpIfFalse {
        /// Condition register.
        cond: u8,
        /// Absolute op index.
        target: u32,
    },
    /// Jump to an absolute op index if cond is truthy.
    JumpIfTrue {
        /// Condition register.
        cond: u8,
        /// Absolute op index.
        target: u32,
    },

    // Containers
    /// dst = \[r(start)..r(start+count)\].
    BuildList {
        /// Destination register.
        dst: u8,
        /// First element register.
        start: u8,
        /// Number of elements.
        count: u8,
    },
    /// list.append(item).
    ListAppend {
        /// Register holding the list.
        list: u8,
        /// Register holding the appended value.
        item: u8,
    },
    /// dst = len(src).
    Len {
        /// Destination register.
        dst: u8,
        /// Source register.
        src: u8,
    },

    // Calls
    /// dst = func(r(dst+1)..r(dst+argc)); re-enters the VM call adapter.
    Call {
        /// Destination register; arguments follow it contiguously.
        dst: u8,
        /// Register holding the callee.
        func: u8,
        /// Argument count.
        argc: u8,
    },

    /// Return the value in src.
    Return {
        /// Source register.
        src: u8,
    },
    /// Return None.
    ReturnNone,
}

// =============================================================================
// Unit Flags
// =============================================================================

bitflags::bitflags! {
    /// Static facts about a compiled unit, derived from its op stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UnitFlags: u8 {
        /// The unit re-enters the call adapter (calls other functions
        /// or itself).
        const HAS_CALLS = 1 << 0;
        /// The unit contains a backward jump.
        const HAS_LOOPS = 1 << 1;
        /// The unit writes at least one global.
        const WRITES_GLOBALS = 1 << 2;
        /// The unit allocates heap objects.
        const ALLOCATES = 1 << 3;
    }
}

impl UnitFlags {
    /// Derive flags by scanning an op stream.
    pub fn scan(ops: &[TemplateOp]) -> Self {
        let mut flags = UnitFlags::empty();
        for (idx, op) in ops.iter().enumerate() {
            match op {
                TemplateOp::Call { .. } => flags |= UnitFlags::HAS_CALLS,
                TemplateOp::StoreGlobal { .. } => flags |= UnitFlags::WRITES_GLOBALS,
                TemplateOp::BuildList { .. } => flags |= UnitFlags::ALLOCATES,
                TemplateOp::Jump { target }
                | TemplateOp::JumpIfFalse { target, .. }
                | TemplateOp::JumpIfTrue { target, .. } => {
                    if *target as usize <= idx {
                        flags |= UnitFlags::HAS_LOOPS;
                    }
                }
                _ => {}
            }
        }
        flags
    }
}

// =============================================================================
// Compiled Unit
// =============================================================================

/// The executable artifact produced for one code unit.
///
/// Immutable after construction and shared behind an `Arc` by the code
/// cache. Holds no heap object references (the emitter rejects object
/// constants), so a unit is safe to share across threads and outlives
/// any particular VM.
#[derive(Debug)]
pub struct CompiledUnit {
    /// Identity of the code unit this was compiled from.
    pub code_id: u64,
    /// Function name, for reports and diagnostics.
    pub name: InternedString,
    /// The pre-decoded op stream.
    pub ops: Box<[TemplateOp]>,
    /// Declared parameter count. Always equals the source code unit's.
    pub arg_count: u16,
    /// Registers the unit needs.
    pub register_count: u16,
    /// Facts derived from the op stream.
    pub flags: UnitFlags,
    /// Estimated memory footprint, used for cache accounting.
    pub size_bytes: usize,
    /// Cache insertion stamp; 0 until the unit is committed.
    pub generation: u64,
}

impl CompiledUnit {
    /// Build a unit from a lowered op stream.
    ///
    /// Flags and the size estimate are derived here; the generation is
    /// stamped by the cache at commit time.
    pub fn new(
        code_id: u64,
        name: InternedString,
        ops: Vec<TemplateOp>,
        arg_count: u16,
        register_count: u16,
    ) -> Self {
        let flags = UnitFlags::scan(&ops);
        let size_bytes = mem::size_of::<Self>() + ops.len() * mem::size_of::<TemplateOp>();
        Self {
            code_id,
            name,
            ops: ops.into_boxed_slice(),
            arg_count,
            register_count,
            flags,
            size_bytes,
            generation: 0,
        }
    }

    /// Number of ops in the unit.
    #[inline]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }
}
