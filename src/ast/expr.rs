//! Expression AST nodes.

use crate::ast::stmt::FunctionDecl;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Null literal
    Null,
    /// Boolean literal: true, false
    Bool(bool),
    /// 32-bit integer literal: 42
    Int(i32),
    /// 64-bit integer literal: 4294967296
    Int64(i64),
    /// Single-precision float literal: 1.5f
    Float(f32),
    /// Double-precision float literal: 3.14
    Double(f64),
    /// String literal: "hello"
    Str(String),

    /// Name reference: foo
    Name(String),

    /// Unary operation: -x, !x
    Unary { operator: UnaryOp, operand: Box<Expr> },

    /// Binary arithmetic or comparison: a + b, a < b
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Short-circuit logical operation: a && b, a || b
    Logical {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
    },

    /// Assignment expression: x = 5
    Assign { target: Box<Expr>, value: Box<Expr> },

    /// Function call: foo(a, b)
    Call { callee: Box<Expr>, arguments: Vec<Expr> },

    /// Member access: obj.field
    Member { object: Box<Expr>, name: String },

    /// Index access: arr[index]
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Map literal: { "key": value, ... }
    Map(Vec<(Expr, Expr)>),

    /// Range: start..end or start..end step n
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
    },

    /// Anonymous function: function (a, b) { ... }
    Function(Box<FunctionDecl>),

    /// Placeholder a recovering parser leaves where an operand was missing.
    Missing,
}

impl ExprKind {
    /// Human-readable node name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Null
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Int64(_)
            | ExprKind::Float(_)
            | ExprKind::Double(_)
            | ExprKind::Str(_) => "literal",
            ExprKind::Name(_) => "name",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Logical { .. } => "logical expression",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Call { .. } => "call",
            ExprKind::Member { .. } => "member access",
            ExprKind::Index { .. } => "index access",
            ExprKind::Array(_) => "array literal",
            ExprKind::Map(_) => "map literal",
            ExprKind::Range { .. } => "range",
            ExprKind::Function(_) => "function expression",
            ExprKind::Missing => "missing expression",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Short-circuit logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

// Constructor helpers for hosts that build trees without a parser.
impl Expr {
    fn bare(kind: ExprKind) -> Self {
        Self::new(kind, Span::default())
    }

    pub fn null() -> Self {
        Self::bare(ExprKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::bare(ExprKind::Bool(value))
    }

    pub fn int(value: i32) -> Self {
        Self::bare(ExprKind::Int(value))
    }

    pub fn int64(value: i64) -> Self {
        Self::bare(ExprKind::Int64(value))
    }

    pub fn float(value: f32) -> Self {
        Self::bare(ExprKind::Float(value))
    }

    pub fn double(value: f64) -> Self {
        Self::bare(ExprKind::Double(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::bare(ExprKind::Str(value.into()))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::bare(ExprKind::Name(name.into()))
    }

    pub fn unary(operator: UnaryOp, operand: Expr) -> Self {
        Self::bare(ExprKind::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Self {
        Self::bare(ExprKind::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn logical(left: Expr, operator: LogicalOp, right: Expr) -> Self {
        Self::bare(ExprKind::Logical {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::logical(left, LogicalOp::And, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::logical(left, LogicalOp::Or, right)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::bare(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(callee: Expr, arguments: Vec<Expr>) -> Self {
        Self::bare(ExprKind::Call {
            callee: Box::new(callee),
            arguments,
        })
    }

    pub fn member(object: Expr, name: impl Into<String>) -> Self {
        Self::bare(ExprKind::Member {
            object: Box::new(object),
            name: name.into(),
        })
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        Self::bare(ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::bare(ExprKind::Array(elements))
    }

    pub fn map(pairs: Vec<(Expr, Expr)>) -> Self {
        Self::bare(ExprKind::Map(pairs))
    }

    pub fn range(start: Expr, end: Expr, step: Option<Expr>) -> Self {
        Self::bare(ExprKind::Range {
            start: Box::new(start),
            end: Box::new(end),
            step: step.map(Box::new),
        })
    }

    pub fn function(decl: FunctionDecl) -> Self {
        Self::bare(ExprKind::Function(Box::new(decl)))
    }

    pub fn missing() -> Self {
        Self::bare(ExprKind::Missing)
    }
}
