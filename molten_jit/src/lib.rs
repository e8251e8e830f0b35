//! Compilation backend for the Molten virtual machine.
//!
//! Produces and caches [`CompiledUnit`]s: pre-decoded template programs
//! executed by the VM's template engine instead of the interpreter loop.
//! The cache enforces the per-identity compilation state machine:
//!
//! ```text
//! Uncompiled ── claim/fill ──► Compiled ── invalidate ──► Uncompiled
//!     │
//!     └── claim/fail_permanent ──► PermanentFallback (terminal)
//! ```
//!
//! Compilation is an optimization, never a correctness requirement: every
//! failure path leaves the code unit runnable by the interpreter.
//!
//! # Key Types
//!
//! - [`TemplateOp`] / [`CompiledUnit`] - the executable artifact
//! - [`CodeCache`] / [`Claim`] - keyed storage with single-compiler claims
//! - [`JitError`] - the failure taxonomy

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod code_cache;
pub mod error;
pub mod template;

// Re-export main types
pub use code_cache::{CacheStats, Claim, CodeCache, UnitState};
pub use error::{JitError, JitResult};
pub use template::{CompiledUnit, TemplateOp, UnitFlags};
