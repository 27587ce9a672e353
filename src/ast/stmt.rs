//! Statement AST nodes.

use crate::ast::expr::Expr;
use crate::span::Span;

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Declaration keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `var`: global binding.
    Var,
    /// `local`: function or block binding.
    Local,
    /// `const`: immutable binding, global or local.
    Const,
}

impl DeclKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Local => "local",
            DeclKind::Const => "const",
        }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: expr;
    Expression(Expr),

    /// Variable declaration: var x = expr; local y; const z = 1;
    Declaration {
        kind: DeclKind,
        name: String,
        initializer: Option<Expr>,
    },

    /// Block: { statements }
    Block(Vec<Stmt>),

    /// If statement: if (cond) stmt else stmt
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// While loop: while (cond) stmt
    While { condition: Expr, body: Box<Stmt> },

    /// For loop: for (x in iter) stmt, for (k, v in iter) stmt
    ForIn {
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Box<Stmt>,
    },

    /// Return statement: return expr;
    Return(Option<Expr>),

    /// Named function declaration: function name(a, b) { ... }
    Function(FunctionDecl),
}

/// A function literal or declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for anonymous functions.
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: Option<&str>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            name: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: false,
            span: Span::default(),
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

/// A complete program (the root node).
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Path of the source file, recorded in the bytecode header.
    pub path: String,
    /// Module name, recorded in the bytecode header.
    pub name: String,
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(path: impl Into<String>, name: impl Into<String>, statements: Vec<Stmt>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            statements,
        }
    }
}

// Constructor helpers for hosts that build trees without a parser.
impl Stmt {
    fn bare(kind: StmtKind) -> Self {
        Self::new(kind, Span::default())
    }

    pub fn expr(expr: Expr) -> Self {
        Self::bare(StmtKind::Expression(expr))
    }

    pub fn declare(kind: DeclKind, name: impl Into<String>, initializer: Option<Expr>) -> Self {
        Self::bare(StmtKind::Declaration {
            kind,
            name: name.into(),
            initializer,
        })
    }

    pub fn var(name: impl Into<String>, initializer: Expr) -> Self {
        Self::declare(DeclKind::Var, name, Some(initializer))
    }

    pub fn local(name: impl Into<String>, initializer: Expr) -> Self {
        Self::declare(DeclKind::Local, name, Some(initializer))
    }

    pub fn constant(name: impl Into<String>, initializer: Expr) -> Self {
        Self::declare(DeclKind::Const, name, Some(initializer))
    }

    pub fn block(statements: Vec<Stmt>) -> Self {
        Self::bare(StmtKind::Block(statements))
    }

    pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::bare(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_loop(condition: Expr, body: Stmt) -> Self {
        Self::bare(StmtKind::While {
            condition,
            body: Box::new(body),
        })
    }

    pub fn for_in(key: Option<&str>, value: &str, iterable: Expr, body: Stmt) -> Self {
        Self::bare(StmtKind::ForIn {
            key: key.map(str::to_string),
            value: value.to_string(),
            iterable,
            body: Box::new(body),
        })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::bare(StmtKind::Return(value))
    }

    pub fn function(decl: FunctionDecl) -> Self {
        Self::bare(StmtKind::Function(decl))
    }
}
