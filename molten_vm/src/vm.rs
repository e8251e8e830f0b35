//! The virtual machine: execution state, interpreter loop, and the call
//! adapter that routes guest calls to the interpreter or to a compiled
//! unit.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use molten_bytecode::CodeObject;
use molten_core::intern::intern;
use molten_core::{InternedString, Value};
use molten_jit::JitError;
use molten_runtime::{type_id_of, CallKind, FunctionObject, Heap, ListObject, TypeId};

use crate::dispatch::{self, ControlFlow};
use crate::error::{RuntimeError, VmResult};
use crate::frame::{Frame, MAX_RECURSION_DEPTH};
use crate::jit_bridge;
use crate::jit_context::{JitConfig, JitContext};
use crate::jit_executor;
use crate::ops;
use crate::profiler::{CodeId, Profiler};

/// A register-based bytecode interpreter with an optional compilation
/// tier.
///
/// Guest calls are host-recursive: each activation runs to completion
/// inside [`VirtualMachine::call_function`], whether interpreted or
/// template-executed, and unwinds through ordinary `Result` returns.
pub struct VirtualMachine {
    pub(crate) heap: Heap,
    pub(crate) globals: FxHashMap<InternedString, Value>,
    pub(crate) frames: Vec<Frame>,
    /// Live guest activations, interpreted and compiled alike. The
    /// template executor pushes no frame, so `frames.len()` undercounts.
    pub(crate) call_depth: usize,
    pub(crate) profiler: Profiler,
    pub(crate) jit: Option<JitContext>,
}

impl VirtualMachine {
    /// A plain interpreter with no compilation tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: Heap::new(),
            globals: FxHashMap::default(),
            frames: Vec::new(),
            call_depth: 0,
            profiler: Profiler::new(),
            jit: None,
        }
    }

    /// A VM with a fresh compilation tier built from `config`.
    #[must_use]
    pub fn with_jit_config(config: JitConfig) -> Self {
        Self::with_jit(JitContext::new(config))
    }

    /// A VM attached to an existing compilation tier.
    ///
    /// Contexts share state through clones, so several VMs can feed one
    /// cache and each other's compiled units.
    #[must_use]
    pub fn with_jit(jit: JitContext) -> Self {
        let mut vm = Self::new();
        vm.jit = Some(jit);
        vm
    }

    /// The attached compilation context, when one exists.
    #[must_use]
    pub fn jit(&self) -> Option<&JitContext> {
        self.jit.as_ref()
    }

    // =========================================================================
    // Execution state
    // =========================================================================

    /// The innermost frame. Only the dispatch loop and its handlers may
    /// assume one exists.
    #[inline(always)]
    pub(crate) fn current_frame(&self) -> &Frame {
        let idx = self.frames.len() - 1;
        &self.frames[idx]
    }

    #[inline(always)]
    pub(crate) fn current_frame_mut(&mut self) -> &mut Frame {
        let idx = self.frames.len() - 1;
        &mut self.frames[idx]
    }

    /// Define or overwrite a global binding.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(intern(name), value);
    }

    /// Read a global binding.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(&intern(name)).copied()
    }

    // =========================================================================
    // Object construction
    // =========================================================================

    /// Materialize a function object for `code`.
    pub fn make_function(&mut self, code: Arc<CodeObject>) -> Value {
        self.heap.alloc_function_value(FunctionObject::new(code))
    }

    /// Materialize a bound method. The receiver is injected ahead of the
    /// caller's arguments on every call.
    pub fn make_bound_method(&mut self, code: Arc<CodeObject>, receiver: Value) -> Value {
        self.heap
            .alloc_function_value(FunctionObject::bound_method(code, receiver))
    }

    /// Allocate a list value holding `items`.
    pub fn alloc_list(&mut self, items: &[Value]) -> Value {
        self.heap.alloc_list_value(ListObject::from_slice(items))
    }

    /// Copy out the items of a list value.
    #[must_use]
    pub fn list_items(&self, value: Value) -> Option<Vec<Value>> {
        let ptr = value.as_object_ptr()?;
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        if unsafe { type_id_of(ptr) } != TypeId::LIST {
            return None;
        }
        // Safety: the type id was just checked.
        let list = unsafe { &*(ptr as *const ListObject) };
        Some(list.as_slice().to_vec())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run a code object as a top-level script.
    ///
    /// The entry frame is not a guest call: it does not count against
    /// the recursion limit and is never compiled. Functions it calls go
    /// through the adapter and get both.
    pub fn execute(&mut self, code: Arc<CodeObject>) -> VmResult<Value> {
        self.frames.push(Frame::new(code));
        let result = self.run_loop();
        self.frames.pop();
        result
    }

    /// Call a guest callable with positional arguments.
    ///
    /// Every guest call funnels through here: interpreter `Call`
    /// instructions, template `Call` ops, and embedder invocations. The
    /// callable is resolved once, the bound receiver injected, arity
    /// checked against the visible parameter count, and the recursion
    /// depth charged before the activation runs.
    pub fn call_function(&mut self, callee: Value, args: &[Value]) -> VmResult<Value> {
        let Some(ptr) = callee.as_object_ptr() else {
            return Err(RuntimeError::not_callable(ops::dynamic_type_name(callee)));
        };
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        let type_id = unsafe { type_id_of(ptr) };
        if type_id != TypeId::FUNCTION {
            return Err(RuntimeError::not_callable(type_id.name()));
        }
        // Safety: the type id was just checked.
        let func = unsafe { &*(ptr as *const FunctionObject) };

        if args.len() != func.visible_arg_count() as usize {
            return Err(JitError::arity_mismatch(
                func.name(),
                func.visible_arg_count(),
                args.len(),
            )
            .into());
        }
        if self.call_depth >= MAX_RECURSION_DEPTH {
            return Err(RuntimeError::recursion_error(self.call_depth));
        }

        // A bound method receives its receiver as a hidden first
        // argument; the callee's code sees arity one higher than the
        // caller supplied.
        let mut effective: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len() + 1);
        if let CallKind::BoundMethod { receiver } = func.kind {
            effective.push(receiver);
        }
        effective.extend_from_slice(args);

        let code = Arc::clone(&func.code);
        self.call_depth += 1;
        let result = self.invoke(code, &effective);
        self.call_depth -= 1;
        result
    }

    /// Route one charged activation to a compiled unit or a frame.
    fn invoke(&mut self, code: Arc<CodeObject>, args: &[Value]) -> VmResult<Value> {
        let call_count = self
            .profiler
            .record_call(CodeId::from_ptr(Arc::as_ptr(&code) as *const ()));

        if let Some(jit) = self.jit.clone() {
            if let Some(unit) = jit_bridge::unit_for_call(&jit, &code, call_count) {
                jit.record_compiled_call();
                return jit_executor::execute(self, &unit, args);
            }
            jit.record_interpreted_call();
        }

        let mut frame = Frame::new(code);
        for (i, arg) in args.iter().enumerate() {
            frame.set_reg(i as u8, *arg);
        }
        self.frames.push(frame);
        let result = self.run_loop();
        self.frames.pop();
        result
    }

    /// Interpret the current frame until it returns or fails.
    ///
    /// Kept out of line so the call adapter stays small enough to
    /// inline into both executors.
    #[inline(never)]
    fn run_loop(&mut self) -> VmResult<Value> {
        loop {
            let frame = self.current_frame_mut();
            if frame.is_done() {
                // Falling off the end returns None.
                return Ok(Value::none());
            }
            let inst = frame.fetch();

            let handler = dispatch::get_handler(inst.opcode());
            match handler(self, inst) {
                ControlFlow::Continue => {}
                ControlFlow::Jump(offset) => {
                    let frame = self.current_frame_mut();
                    frame.ip = ((frame.ip as i32) + offset as i32).max(0) as u32;
                }
                ControlFlow::Return(value) => return Ok(value),
                ControlFlow::Error(err) => return Err(err),
            }
        }
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}
