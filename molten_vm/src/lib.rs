//! The Molten virtual machine.
//!
//! Executes bytecode from `molten_bytecode` over the `molten_runtime`
//! heap, with two execution engines behind one call adapter:
//!
//! - the interpreter, a table-dispatched loop over stack frames, always
//!   available and always correct;
//! - the template engine, which runs [`molten_jit`] compiled units for
//!   hot functions when a [`JitContext`] is attached.
//!
//! Guest calls are host-recursive: every activation runs to completion
//! inside [`VirtualMachine::call_function`] and unwinds through ordinary
//! `Result` returns, so interpreted and compiled activations nest freely
//! and share one recursion limit.
//!
//! # Key Types
//!
//! - [`VirtualMachine`] - execution state and the call adapter
//! - [`JitContext`] / [`JitConfig`] - the optional compilation tier
//! - [`RuntimeError`] - guest-visible failures

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod frame;
mod jit_bridge;
pub mod jit_context;
mod jit_executor;
mod lowering;
pub mod ops;
pub mod profiler;
pub mod vm;

// Re-export main types
pub use dispatch::ControlFlow;
pub use error::{RuntimeError, RuntimeErrorKind, VmResult};
pub use frame::{Frame, MAX_RECURSION_DEPTH, REGISTER_COUNT};
pub use jit_context::{CodeUnitReport, JitConfig, JitContext, JitStatsSnapshot};
pub use profiler::{CodeId, Profiler};
pub use vm::VirtualMachine;
