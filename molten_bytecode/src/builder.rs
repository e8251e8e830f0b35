//! Programmatic assembler for code objects.
//!
//! `FunctionBuilder` is the construction surface for guest functions:
//! embedders, tests and benchmarks emit instructions through it and get an
//! immutable [`CodeObject`] back. It handles register allocation, constant
//! and name pool deduplication, and label resolution for jumps.

use crate::code::{CodeFlags, CodeObject};
use crate::instruction::{ConstIndex, Instruction, Opcode, Register};
use molten_core::intern::intern;
use molten_core::{CoreError, CoreResult, InternedString, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A jump target handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// A jump emitted before its label was bound.
#[derive(Debug)]
struct PendingJump {
    at: usize,
    label: Label,
}

/// Deduplication key for constant pool entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    None,
    Bool(bool),
    Int(i64),
    /// Float bit pattern, for exact comparison.
    Float(u64),
    /// Interned handle; equal content always yields the same handle.
    Str(InternedString),
    /// Code unit identity.
    Code(usize),
}

impl ConstKey {
    /// Key for an immediate value. Reference kinds are keyed by the
    /// specialized add methods or not at all.
    fn of(value: Value) -> Option<Self> {
        if value.is_none() {
            return Some(ConstKey::None);
        }
        if let Some(b) = value.as_bool() {
            return Some(ConstKey::Bool(b));
        }
        if let Some(i) = value.as_int() {
            return Some(ConstKey::Int(i));
        }
        value.as_float().map(|f| ConstKey::Float(f.to_bits()))
    }
}

/// Builder for one code object.
///
/// ```ignore
/// let mut b = FunctionBuilder::new("add");
/// b.set_arg_count(2);
/// b.reserve_parameters(2);
/// let sum = b.alloc_register();
/// b.emit_add(sum, Register(0), Register(1));
/// b.emit_return(sum);
/// let code = Arc::new(b.finish());
/// ```
pub struct FunctionBuilder {
    name: InternedString,
    qualname: InternedString,

    instructions: Vec<Instruction>,

    constants: Vec<Value>,
    const_keys: FxHashMap<ConstKey, ConstIndex>,

    names: Vec<InternedString>,
    name_map: FxHashMap<InternedString, u16>,

    arg_count: u16,
    flags: CodeFlags,

    free_reg: u8,
    peak_reg: u8,

    label_count: u32,
    bound_labels: FxHashMap<Label, usize>,
    pending_jumps: Vec<PendingJump>,

    nested: Vec<Arc<CodeObject>>,
}

impl FunctionBuilder {
    /// Create a builder for a function with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = intern(name);
        Self {
            qualname: name.clone(),
            name,
            instructions: Vec::new(),
            constants: Vec::new(),
            const_keys: FxHashMap::default(),
            names: Vec::new(),
            name_map: FxHashMap::default(),
            arg_count: 0,
            flags: CodeFlags::empty(),
            free_reg: 0,
            peak_reg: 0,
            label_count: 0,
            bound_labels: FxHashMap::default(),
            pending_jumps: Vec::new(),
            nested: Vec::new(),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Set the dotted qualified name.
    pub fn set_qualname(&mut self, qualname: &str) {
        self.qualname = intern(qualname);
    }

    /// Declare the positional parameter count.
    pub fn set_arg_count(&mut self, count: u16) {
        self.arg_count = count;
    }

    /// Add a code flag.
    pub fn add_flag(&mut self, flag: CodeFlags) {
        self.flags |= flag;
    }

    // =========================================================================
    // Registers
    // =========================================================================

    /// Allocate the next free register.
    #[inline]
    pub fn alloc_register(&mut self) -> Register {
        self.alloc_register_block(1)
    }

    /// Allocate `count` consecutive registers, returning the base.
    ///
    /// Call sites need the result and argument registers contiguous:
    /// `[dst, arg0, arg1, ...]`.
    #[inline]
    pub fn alloc_register_block(&mut self, count: u8) -> Register {
        let base = Register(self.free_reg);
        self.free_reg = self.free_reg.checked_add(count).expect("register overflow");
        self.peak_reg = self.peak_reg.max(self.free_reg);
        base
    }

    /// Reserve the parameter registers `r0..r{count-1}`.
    ///
    /// Arguments bind positionally to the lowest registers, so this must
    /// run before any other allocation.
    pub fn reserve_parameters(&mut self, count: u16) {
        for _ in 0..count {
            self.alloc_register();
        }
    }

    // =========================================================================
    // Constant pool
    // =========================================================================

    fn push_constant(&mut self, value: Value, key: Option<ConstKey>) -> ConstIndex {
        let idx = ConstIndex::new(
            u16::try_from(self.constants.len()).expect("constant pool overflow"),
        );
        self.constants.push(value);
        if let Some(key) = key {
            self.const_keys.insert(key, idx);
        }
        idx
    }

    /// Add a value to the constant pool, deduplicating simple values.
    pub fn add_constant(&mut self, value: Value) -> ConstIndex {
        match ConstKey::of(value) {
            Some(key) => {
                if let Some(&idx) = self.const_keys.get(&key) {
                    return idx;
                }
                self.push_constant(value, Some(key))
            }
            None => self.push_constant(value, None),
        }
    }

    /// Add an integer constant.
    ///
    /// Fails when the integer does not fit the immediate value range.
    pub fn add_int(&mut self, value: i64) -> CoreResult<ConstIndex> {
        let boxed = Value::int(value).ok_or(CoreError::IntOutOfRange { value })?;
        Ok(self.add_constant(boxed))
    }

    /// Add a float constant.
    pub fn add_float(&mut self, value: f64) -> ConstIndex {
        self.add_constant(Value::float(value))
    }

    /// Add an interned string constant.
    pub fn add_string(&mut self, s: &str) -> ConstIndex {
        let interned = intern(s);
        let key = ConstKey::Str(interned.clone());
        if let Some(&idx) = self.const_keys.get(&key) {
            return idx;
        }
        let value = Value::string(&interned);
        self.push_constant(value, Some(key))
    }

    /// Add a nested code object constant for `MakeFunction`.
    ///
    /// The constant pool stores the unit as an object pointer; the builder
    /// keeps a strong reference in `nested` so the pointer stays valid for
    /// the produced code object's lifetime.
    pub fn add_code(&mut self, code: Arc<CodeObject>) -> ConstIndex {
        let key = ConstKey::Code(Arc::as_ptr(&code) as usize);
        if let Some(&idx) = self.const_keys.get(&key) {
            return idx;
        }

        // Leak one strong count so the stored pointer satisfies the
        // from_raw contract when the VM materializes the function.
        let ptr = Arc::into_raw(Arc::clone(&code)) as *const ();
        let idx = self.push_constant(Value::object_ptr(ptr), Some(key));
        self.nested.push(code);
        self.flags |= CodeFlags::DEFINES_FUNCTIONS;
        idx
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Add a global name, returning its index in the names table.
    pub fn add_name(&mut self, name: &str) -> u16 {
        let name = intern(name);
        if let Some(&idx) = self.name_map.get(&name) {
            return idx;
        }
        let idx = u16::try_from(self.names.len()).expect("name table overflow");
        self.name_map.insert(name.clone(), idx);
        self.names.push(name);
        idx
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Create a fresh jump target.
    pub fn create_label(&mut self) -> Label {
        let label = Label(self.label_count);
        self.label_count += 1;
        label
    }

    /// Bind a label to the next emitted instruction.
    pub fn bind_label(&mut self, label: Label) {
        self.bound_labels.insert(label, self.instructions.len());
    }

    /// Index of the next emitted instruction.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Emit a raw instruction.
    #[inline]
    pub fn emit(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    /// dst = consts\[idx\].
    pub fn emit_load_const(&mut self, dst: Register, idx: ConstIndex) {
        self.emit(Instruction::op_di(Opcode::LoadConst, dst, idx.0));
    }

    /// dst = None.
    pub fn emit_load_none(&mut self, dst: Register) {
        self.emit(Instruction::op_d(Opcode::LoadNone, dst));
    }

    /// dst = True.
    pub fn emit_load_true(&mut self, dst: Register) {
        self.emit(Instruction::op_d(Opcode::LoadTrue, dst));
    }

    /// dst = False.
    pub fn emit_load_false(&mut self, dst: Register) {
        self.emit(Instruction::op_d(Opcode::LoadFalse, dst));
    }

    /// dst = src. Elided when the registers coincide.
    pub fn emit_move(&mut self, dst: Register, src: Register) {
        if dst != src {
            self.emit(Instruction::op_ds(Opcode::Move, dst, src));
        }
    }

    /// dst = globals\[names\[name_idx\]\].
    pub fn emit_load_global(&mut self, dst: Register, name_idx: u16) {
        self.emit(Instruction::op_di(Opcode::LoadGlobal, dst, name_idx));
    }

    /// globals\[names\[name_idx\]\] = src.
    pub fn emit_store_global(&mut self, name_idx: u16, src: Register) {
        self.emit(Instruction::op_di(Opcode::StoreGlobal, src, name_idx));
    }

    /// dst = src1 + src2.
    pub fn emit_add(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Add, dst, src1, src2));
    }

    /// dst = src1 - src2.
    pub fn emit_sub(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Sub, dst, src1, src2));
    }

    /// dst = src1 * src2.
    pub fn emit_mul(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Mul, dst, src1, src2));
    }

    /// dst = src1 // src2.
    pub fn emit_floor_div(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::FloorDiv, dst, src1, src2));
    }

    /// dst = src1 % src2.
    pub fn emit_mod(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Mod, dst, src1, src2));
    }

    /// dst = -src.
    pub fn emit_neg(&mut self, dst: Register, src: Register) {
        self.emit(Instruction::op_ds(Opcode::Neg, dst, src));
    }

    /// dst = src1 < src2.
    pub fn emit_lt(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Lt, dst, src1, src2));
    }

    /// dst = src1 <= src2.
    pub fn emit_le(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Le, dst, src1, src2));
    }

    /// dst = src1 == src2.
    pub fn emit_eq(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Eq, dst, src1, src2));
    }

    /// dst = src1 != src2.
    pub fn emit_ne(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Ne, dst, src1, src2));
    }

    /// dst = src1 > src2.
    pub fn emit_gt(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Gt, dst, src1, src2));
    }

    /// dst = src1 >= src2.
    pub fn emit_ge(&mut self, dst: Register, src1: Register, src2: Register) {
        self.emit(Instruction::op_dss(Opcode::Ge, dst, src1, src2));
    }

    /// dst = not src.
    pub fn emit_not(&mut self, dst: Register, src: Register) {
        self.emit(Instruction::op_ds(Opcode::Not, dst, src));
    }

    /// dst = len(src).
    pub fn emit_len(&mut self, dst: Register, src: Register) {
        self.emit(Instruction::op_ds(Opcode::Len, dst, src));
    }

    /// Return the value in src.
    pub fn emit_return(&mut self, src: Register) {
        self.emit(Instruction::op_d(Opcode::Return, src));
    }

    /// Return None.
    pub fn emit_return_none(&mut self) {
        self.emit(Instruction::op(Opcode::ReturnNone));
    }

    /// Unconditional jump to a label.
    pub fn emit_jump(&mut self, label: Label) {
        let at = self.instructions.len();
        self.emit(Instruction::op(Opcode::Jump));
        self.pending_jumps.push(PendingJump { at, label });
    }

    /// Jump to a label when src is falsy.
    pub fn emit_jump_if_false(&mut self, src: Register, label: Label) {
        let at = self.instructions.len();
        self.emit(Instruction::op_d(Opcode::JumpIfFalse, src));
        self.pending_jumps.push(PendingJump { at, label });
    }

    /// Jump to a label when src is truthy.
    pub fn emit_jump_if_true(&mut self, src: Register, label: Label) {
        let at = self.instructions.len();
        self.emit(Instruction::op_d(Opcode::JumpIfTrue, src));
        self.pending_jumps.push(PendingJump { at, label });
    }

    /// dst = func(args...). Arguments live in `r(dst+1)..r(dst+argc)`.
    pub fn emit_call(&mut self, dst: Register, func: Register, argc: u8) {
        self.emit(Instruction::new(Opcode::Call, dst.0, func.0, argc));
    }

    /// dst = function object for the code constant at `code_idx`.
    pub fn emit_make_function(&mut self, dst: Register, code_idx: ConstIndex) {
        self.emit(Instruction::op_di(Opcode::MakeFunction, dst, code_idx.0));
    }

    /// dst = list of `r(start)..r(start+count)`.
    pub fn emit_build_list(&mut self, dst: Register, start: Register, count: u8) {
        self.emit(Instruction::new(Opcode::BuildList, dst.0, start.0, count));
    }

    /// list.append(item).
    pub fn emit_list_append(&mut self, list: Register, item: Register) {
        self.emit(Instruction::new(Opcode::ListAppend, 0, list.0, item.0));
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Resolve labels and produce the immutable code object.
    ///
    /// Panics on an unbound label; emitting a jump to a label that is never
    /// bound is a bug in the embedder.
    #[must_use]
    pub fn finish(mut self) -> CodeObject {
        for jump in self.pending_jumps {
            let target = self.bound_labels.get(&jump.label).expect("unbound label");
            let offset = (*target as i32) - (jump.at as i32) - 1;
            debug_assert!(
                offset >= i16::MIN as i32 && offset <= i16::MAX as i32,
                "jump offset exceeds 16-bit range"
            );

            let placeholder = self.instructions[jump.at];
            let opcode = match Opcode::from_u8(placeholder.opcode()) {
                Some(op) => op,
                None => unreachable!("builder emitted invalid opcode"),
            };
            self.instructions[jump.at] =
                Instruction::op_di(opcode, placeholder.dst(), offset as i16 as u16);
        }

        CodeObject {
            name: self.name,
            qualname: self.qualname,
            instructions: self.instructions.into_boxed_slice(),
            constants: self.constants.into_boxed_slice(),
            names: self.names.into_boxed_slice(),
            arg_count: self.arg_count,
            register_count: self.peak_reg as u16,
            flags: self.flags,
            nested: self.nested.into_boxed_slice(),
        }
    }
}
