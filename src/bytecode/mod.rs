//! Bytecode format and compiler.
//!
//! # Architecture
//!
//! - `instruction`: opcode set and the shared instruction decoder/encoder
//! - `chunk`: instruction emitter with backpatched jumps
//! - `module`: container header and whole-module decoding
//! - `fold`: compile-time evaluation of constant expressions
//! - `scope`: compile-time scopes and declaration rules
//! - `compiler`: transforms AST into bytecode
//! - `disassembler`: debug output for bytecode inspection

pub mod chunk;
pub mod compiler;
mod compiler_exprs;
mod compiler_stmts;
pub mod disassembler;
pub mod fold;
pub mod instruction;
pub mod module;
pub mod scope;

pub use chunk::{Chunk, EmitError, PatchHandle};
pub use compiler::{compile_program, Compiler};
pub use disassembler::disassemble;
pub use fold::Constant;
pub use instruction::{FunctionProto, Instruction, OpCode};
pub use module::{decode_module, BytecodeModule, MAGIC, VERSION};
