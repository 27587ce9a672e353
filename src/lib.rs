//! Vesper: a single-pass bytecode compiler and stack-based virtual machine.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! - **Compile**: an [`ast::Program`] is lowered in one pass to a
//!   self-describing bytecode module (constant folding included).
//! - **Execute**: a [`vm::Vm`] validates the module header and runs it on a
//!   value stack backed by a mark-sweep [`object::Heap`].

#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod collections;
pub mod config;
pub mod error;
pub mod object;
pub mod span;
pub mod vm;

use ast::Program;
use error::VesperError;
use object::Value;

/// Compile a program to bytecode.
pub fn compile(program: Program) -> Result<Vec<u8>, VesperError> {
    Ok(bytecode::compile_program(program)?)
}

/// Compile a program and run it on a fresh VM.
///
/// Returns the VM (for inspecting globals and the heap) with the module's result.
pub fn compile_and_run(program: Program) -> Result<(vm::Vm, Value), VesperError> {
    compile_and_run_with_config(program, config::VmConfig::default())
}

/// Compile a program and run it on a fresh VM built from `config`.
pub fn compile_and_run_with_config(
    program: Program,
    config: config::VmConfig,
) -> Result<(vm::Vm, Value), VesperError> {
    let bytes = compile(program)?;
    let mut machine = vm::Vm::with_config(config)?;
    let value = machine.run(&bytes)?;
    Ok((machine, value))
}
