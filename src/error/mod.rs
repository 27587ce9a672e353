//! Error types for compilation, bytecode decoding, and execution.
//!
//! Failed arithmetic is deliberately absent here: division by zero and
//! operand type mismatches produce an Error-kind [`Value`](crate::object::Value)
//! that flows through the program like any other value.

use crate::span::Span;
use thiserror::Error;

/// Bytecode compilation errors. All of them abort compilation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("{file}: '{keyword}' declaration is not allowed in {scope} scope at {span}")]
    MisplacedDeclaration {
        keyword: &'static str,
        scope: &'static str,
        file: String,
        span: Span,
    },

    #[error("{file}: '{name}' is already declared in this scope at {span}")]
    Redeclaration {
        name: String,
        file: String,
        span: Span,
    },

    #[error("{file}: 'return' outside of a function at {span}")]
    ReturnOutsideFunction { file: String, span: Span },

    #[error("{file}: invalid assignment target at {span}")]
    InvalidAssignmentTarget { file: String, span: Span },

    #[error("{file}: cannot assign to constant '{name}' at {span}")]
    ConstAssignment {
        name: String,
        file: String,
        span: Span,
    },

    #[error("{file}: missing operand at {span}")]
    MissingOperand { file: String, span: Span },

    #[error("{file}: {message} at {span}")]
    General {
        message: String,
        file: String,
        span: Span,
    },
}

impl CompileError {
    pub fn new(message: impl Into<String>, file: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            file: file.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::MisplacedDeclaration { span, .. } => *span,
            Self::Redeclaration { span, .. } => *span,
            Self::ReturnOutsideFunction { span, .. } => *span,
            Self::InvalidAssignmentTarget { span, .. } => *span,
            Self::ConstAssignment { span, .. } => *span,
            Self::MissingOperand { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }

    pub fn file(&self) -> &str {
        match self {
            Self::MisplacedDeclaration { file, .. }
            | Self::Redeclaration { file, .. }
            | Self::ReturnOutsideFunction { file, .. }
            | Self::InvalidAssignmentTarget { file, .. }
            | Self::ConstAssignment { file, .. }
            | Self::MissingOperand { file, .. }
            | Self::General { file, .. } => file,
        }
    }
}

/// Malformed or corrupted bytecode.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BytecodeError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("declared module size is zero")]
    ZeroSize,

    #[error("declared module size {declared} does not match buffer length {actual}")]
    SizeMismatch { declared: u64, actual: usize },

    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("truncated operand at offset {0}")]
    Truncated(usize),

    #[error("unterminated string operand at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid UTF-8 in string operand at offset {0}")]
    InvalidUtf8(usize),

    #[error("jump from offset {from} lands outside the code at {target}")]
    JumpOutOfBounds { from: usize, target: i64 },
}

/// Heap allocation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeapError {
    #[error("heap exhausted: object limit of {limit} reached")]
    Exhausted { limit: usize },
}

/// Fatal runtime errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("undefined name '{0}'")]
    UndefinedName(String),

    #[error("stack overflow: capacity of {0} slots exceeded")]
    StackOverflow(usize),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("call depth limit of {0} frames exceeded")]
    FrameOverflow(usize),

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("wrong number of arguments to '{name}': expected {expected}, got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("dangling heap handle")]
    InvalidHandle,

    #[error("type error: {0}")]
    TypeError(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}

impl RuntimeError {
    pub fn undefined_name(name: impl Into<String>) -> Self {
        Self::UndefinedName(name.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn wrong_arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::WrongArity {
            name: name.into(),
            expected,
            got,
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum VesperError {
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Allocation failure: {0}")]
    Heap(#[from] HeapError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}
