//! Abstract Syntax Tree consumed by the bytecode compiler.
//!
//! Trees normally come from the external parser; the constructor helpers on
//! [`Expr`] and [`Stmt`] let hosts and tests build them directly.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
pub use stmt::{DeclKind, FunctionDecl, Program, Stmt, StmtKind};
