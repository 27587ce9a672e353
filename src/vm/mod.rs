//! Bytecode VM for Vesper: executes compiled modules on a value stack.
//!
//! Each [`Vm`] owns its heap, globals and configuration; independent
//! instances never share state.

pub mod natives;
#[allow(clippy::module_inception)]
pub mod vm;
pub mod vm_calls;
pub mod vm_collections;

pub use vm::{CallFrame, Resolver, Vm};
