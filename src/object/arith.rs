//! Operator semantics shared by the constant folder and the VM.
//!
//! Operands are viewed through [`Operand`], which borrows string contents
//! from wherever they live (a heap slot at run time, an AST literal at
//! compile time). Results come back as an [`Outcome`]; the caller turns it
//! into its own representation, allocating strings and errors if needed.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};

use super::Handle;

/// A numeric operand or result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Int64(n) => n as f64,
            Num::Float(n) => n as f64,
            Num::Double(n) => n,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            Num::Int(n) => Some(n as i64),
            Num::Int64(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    /// Widening order: Int < Int64 < Float < Double.
    fn rank(self) -> u8 {
        match self {
            Num::Int(_) => 0,
            Num::Int64(_) => 1,
            Num::Float(_) => 2,
            Num::Double(_) => 3,
        }
    }

    /// Integral values that fit in 32 bits become `Int`, everything else `Double`.
    pub fn narrow(n: f64) -> Num {
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Num::Int(n as i32)
        } else {
            Num::Double(n)
        }
    }
}

/// Borrowed view of a value for operator evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand<'a> {
    Num(Num),
    Str(&'a str),
    Bool(bool),
    Null,
    /// An Error value, with its message.
    Error(&'a str),
    /// Any other heap object; compared by identity.
    Ref {
        handle: Handle,
        type_name: &'static str,
        empty: bool,
    },
}

impl Operand<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Num(Num::Int(_)) => "Int",
            Operand::Num(Num::Int64(_)) => "Int64",
            Operand::Num(Num::Float(_)) => "Float",
            Operand::Num(Num::Double(_)) => "Double",
            Operand::Str(_) => "String",
            Operand::Bool(_) => "Bool",
            Operand::Null => "Null",
            Operand::Error(_) => "Error",
            Operand::Ref { type_name, .. } => type_name,
        }
    }

    /// The numeric value of a number or a numeric-looking string.
    fn coerce(&self) -> Option<f64> {
        match self {
            Operand::Num(n) => Some(n.as_f64()),
            Operand::Str(s) => parse_numeric(s),
            _ => None,
        }
    }
}

/// Which operand an [`Outcome::Forward`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Result of applying an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Num(Num),
    Bool(bool),
    Str(String),
    /// A fresh Error value with this message.
    Error(String),
    /// Pass one of the operands through unchanged (error propagation).
    Forward(Side),
}

/// Parse a string that looks like a number.
pub fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Apply a binary operator.
pub fn binary(op: BinaryOp, left: Operand<'_>, right: Operand<'_>) -> Outcome {
    match op {
        BinaryOp::Equal => Outcome::Bool(equal(&left, &right)),
        BinaryOp::NotEqual => Outcome::Bool(!equal(&left, &right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            compare(op, left, right)
        }
        _ => arithmetic(op, left, right),
    }
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, operand: Operand<'_>) -> Outcome {
    match op {
        UnaryOp::Not => Outcome::Bool(!truthy(&operand)),
        UnaryOp::Negate => negate(operand),
    }
}

fn arithmetic(op: BinaryOp, left: Operand<'_>, right: Operand<'_>) -> Outcome {
    if let Operand::Error(_) = left {
        return Outcome::Forward(Side::Left);
    }
    if let Operand::Error(_) = right {
        return Outcome::Forward(Side::Right);
    }

    match (left, right) {
        (Operand::Num(a), Operand::Num(b)) => numeric(op, a, b),
        (Operand::Str(a), Operand::Str(b)) if op == BinaryOp::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Outcome::Str(joined)
        }
        (Operand::Str(_), _) | (_, Operand::Str(_)) if op == BinaryOp::Add => Outcome::Error(
            format!("cannot add {} and {}", left.type_name(), right.type_name()),
        ),
        (Operand::Str(_), _) | (_, Operand::Str(_)) => match (left.coerce(), right.coerce()) {
            (Some(a), Some(b)) => coerced(op, a, b),
            _ => mismatch(op, &left, &right),
        },
        _ => mismatch(op, &left, &right),
    }
}

fn mismatch(op: BinaryOp, left: &Operand<'_>, right: &Operand<'_>) -> Outcome {
    Outcome::Error(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn zero_divisor(op: BinaryOp) -> Outcome {
    match op {
        BinaryOp::Modulo => Outcome::Error("modulo by zero".to_string()),
        _ => Outcome::Error("division by zero".to_string()),
    }
}

fn numeric(op: BinaryOp, a: Num, b: Num) -> Outcome {
    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && b.is_zero() {
        return zero_divisor(op);
    }

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => match int32(op, x, y) {
            Some(n) => Outcome::Num(Num::Int(n)),
            None => int64(op, x as i64, y as i64),
        },
        _ if a.rank().max(b.rank()) == 1 => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => int64(op, x, y),
            _ => Outcome::Num(Num::Double(float64(op, a.as_f64(), b.as_f64()))),
        },
        _ if a.rank().max(b.rank()) == 2 => {
            Outcome::Num(Num::Float(float32(op, a.as_f64() as f32, b.as_f64() as f32)))
        }
        _ => Outcome::Num(Num::Double(float64(op, a.as_f64(), b.as_f64()))),
    }
}

fn coerced(op: BinaryOp, a: f64, b: f64) -> Outcome {
    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && b == 0.0 {
        return zero_divisor(op);
    }
    Outcome::Num(Num::narrow(float64(op, a, b)))
}

fn int32(op: BinaryOp, x: i32, y: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Subtract => x.checked_sub(y),
        BinaryOp::Multiply => x.checked_mul(y),
        BinaryOp::Divide => x.checked_div(y),
        BinaryOp::Modulo => x.checked_rem(y),
        _ => None,
    }
}

// 64-bit overflow falls back to double arithmetic.
fn int64(op: BinaryOp, x: i64, y: i64) -> Outcome {
    let checked = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Subtract => x.checked_sub(y),
        BinaryOp::Multiply => x.checked_mul(y),
        BinaryOp::Divide => x.checked_div(y),
        BinaryOp::Modulo => x.checked_rem(y),
        _ => None,
    };
    match checked {
        Some(n) => Outcome::Num(Num::Int64(n)),
        None => Outcome::Num(Num::Double(float64(op, x as f64, y as f64))),
    }
}

fn float32(op: BinaryOp, x: f32, y: f32) -> f32 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide => x / y,
        _ => x % y,
    }
}

fn float64(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide => x / y,
        _ => x % y,
    }
}

fn negate(operand: Operand<'_>) -> Outcome {
    match operand {
        Operand::Num(Num::Int(n)) => Outcome::Num(match n.checked_neg() {
            Some(n) => Num::Int(n),
            None => Num::Int64(-(n as i64)),
        }),
        Operand::Num(Num::Int64(n)) => Outcome::Num(match n.checked_neg() {
            Some(n) => Num::Int64(n),
            None => Num::Double(-(n as f64)),
        }),
        Operand::Num(Num::Float(n)) => Outcome::Num(Num::Float(-n)),
        Operand::Num(Num::Double(n)) => Outcome::Num(Num::Double(-n)),
        Operand::Error(_) => Outcome::Forward(Side::Left),
        Operand::Str(s) => match parse_numeric(s) {
            Some(n) => Outcome::Num(Num::narrow(-n)),
            None => Outcome::Error("cannot negate a non-numeric String".to_string()),
        },
        other => Outcome::Error(format!("cannot negate {}", other.type_name())),
    }
}

fn compare(op: BinaryOp, left: Operand<'_>, right: Operand<'_>) -> Outcome {
    if let Operand::Error(_) = left {
        return Outcome::Forward(Side::Left);
    }
    if let Operand::Error(_) = right {
        return Outcome::Forward(Side::Right);
    }

    let ordering = match (left, right) {
        (Operand::Num(a), Operand::Num(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        },
        (Operand::Str(a), Operand::Str(b)) => Some(a.cmp(b)),
        _ => return mismatch(op, &left, &right),
    };

    // NaN compares false under every ordering.
    let result = match ordering {
        None => false,
        Some(ordering) => match op {
            BinaryOp::Less => ordering == Ordering::Less,
            BinaryOp::LessEqual => ordering != Ordering::Greater,
            BinaryOp::Greater => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        },
    };
    Outcome::Bool(result)
}

/// Structural equality of scalars and strings; other objects by identity.
pub fn equal(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match (left, right) {
        (Operand::Num(a), Operand::Num(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            (Some(x), None) => int_equals_float(x, b.as_f64()),
            (None, Some(y)) => int_equals_float(y, a.as_f64()),
            (None, None) => a.as_f64() == b.as_f64(),
        },
        (Operand::Str(a), Operand::Str(b)) => a == b,
        (Operand::Bool(a), Operand::Bool(b)) => a == b,
        (Operand::Null, Operand::Null) => true,
        (Operand::Error(a), Operand::Error(b)) => a == b,
        (Operand::Ref { handle: a, .. }, Operand::Ref { handle: b, .. }) => a == b,
        _ => false,
    }
}

/// Exact comparison: `2^53 + 1` is not equal to the double `2^53`.
fn int_equals_float(int: i64, float: f64) -> bool {
    float.fract() == 0.0
        && float >= i64::MIN as f64
        && float < i64::MAX as f64
        && float as i64 == int
}

/// False, null, numeric zero, empty containers and errors are falsy.
pub fn truthy(operand: &Operand<'_>) -> bool {
    match operand {
        Operand::Num(n) => !n.is_zero(),
        Operand::Str(s) => !s.is_empty(),
        Operand::Bool(b) => *b,
        Operand::Null | Operand::Error(_) => false,
        Operand::Ref { empty, .. } => !empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(n: i32) -> Operand<'static> {
        Operand::Num(Num::Int(n))
    }

    fn num(outcome: Outcome) -> Num {
        match outcome {
            Outcome::Num(n) => n,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_int32_overflow_promotes_to_int64() {
        let sum = binary(BinaryOp::Add, int(i32::MAX), int(1));
        assert_eq!(num(sum), Num::Int64(2_147_483_648));

        let product = binary(BinaryOp::Multiply, int(i32::MIN), int(-1));
        assert_eq!(num(product), Num::Int64(2_147_483_648));
    }

    #[test]
    fn test_int64_overflow_promotes_to_double() {
        let sum = binary(BinaryOp::Add, Operand::Num(Num::Int64(i64::MAX)), int(1));
        assert_eq!(num(sum), Num::Double(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_widening() {
        assert_eq!(
            num(binary(BinaryOp::Add, int(2), Operand::Num(Num::Double(3.14)))),
            Num::Double(2.0 + 3.14)
        );
        assert_eq!(
            num(binary(BinaryOp::Multiply, int(2), Operand::Num(Num::Float(1.5)))),
            Num::Float(3.0)
        );
        assert_eq!(
            num(binary(
                BinaryOp::Add,
                Operand::Num(Num::Float(1.5)),
                Operand::Num(Num::Double(1.0))
            )),
            Num::Double(2.5)
        );
    }

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(num(binary(BinaryOp::Divide, int(7), int(2))), Num::Int(3));
        assert_eq!(num(binary(BinaryOp::Divide, int(-7), int(2))), Num::Int(-3));
        assert_eq!(num(binary(BinaryOp::Modulo, int(-7), int(2))), Num::Int(-1));
    }

    #[test]
    fn test_division_by_zero_is_an_error_value() {
        assert_eq!(
            binary(BinaryOp::Divide, int(1), int(0)),
            Outcome::Error("division by zero".to_string())
        );
        assert_eq!(
            binary(BinaryOp::Modulo, Operand::Num(Num::Double(1.0)), int(0)),
            Outcome::Error("modulo by zero".to_string())
        );
        assert_eq!(
            binary(BinaryOp::Divide, Operand::Num(Num::Float(1.0)), Operand::Num(Num::Float(0.0))),
            Outcome::Error("division by zero".to_string())
        );
    }

    #[test]
    fn test_string_rules() {
        assert_eq!(
            binary(BinaryOp::Add, Operand::Str("foo"), Operand::Str("bar")),
            Outcome::Str("foobar".to_string())
        );
        assert_eq!(
            binary(BinaryOp::Add, Operand::Str("1"), int(1)),
            Outcome::Error("cannot add String and Int".to_string())
        );
        assert_eq!(num(binary(BinaryOp::Multiply, Operand::Str("4"), int(3))), Num::Int(12));
        assert_eq!(
            num(binary(BinaryOp::Divide, Operand::Str("1"), Operand::Str("4"))),
            Num::Double(0.25)
        );
        assert!(matches!(
            binary(BinaryOp::Subtract, Operand::Str("abc"), int(1)),
            Outcome::Error(_)
        ));
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        assert_eq!(
            binary(BinaryOp::Add, Operand::Error("boom"), int(1)),
            Outcome::Forward(Side::Left)
        );
        assert_eq!(
            binary(BinaryOp::Less, int(1), Operand::Error("boom")),
            Outcome::Forward(Side::Right)
        );
        assert_eq!(
            unary(UnaryOp::Negate, Operand::Error("boom")),
            Outcome::Forward(Side::Left)
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOp::Less, int(1), Operand::Num(Num::Double(1.5))), Outcome::Bool(true));
        assert_eq!(
            binary(BinaryOp::GreaterEqual, Operand::Str("b"), Operand::Str("a")),
            Outcome::Bool(true)
        );
        assert!(matches!(
            binary(BinaryOp::Less, Operand::Bool(true), int(1)),
            Outcome::Error(_)
        ));
    }

    #[test]
    fn test_equality_is_structural_and_never_errors() {
        assert_eq!(binary(BinaryOp::Equal, int(1), Operand::Num(Num::Double(1.0))), Outcome::Bool(true));
        assert_eq!(binary(BinaryOp::Equal, Operand::Str("a"), Operand::Str("a")), Outcome::Bool(true));
        assert_eq!(binary(BinaryOp::Equal, Operand::Null, int(0)), Outcome::Bool(false));
        assert_eq!(binary(BinaryOp::NotEqual, Operand::Bool(true), Operand::Null), Outcome::Bool(true));
    }

    #[test]
    fn test_int_float_equality_is_exact() {
        let big = Operand::Num(Num::Int64((1 << 53) + 1));
        let rounded = Operand::Num(Num::Double((1u64 << 53) as f64));
        assert!(!equal(&big, &rounded));
        assert!(!equal(&rounded, &big));
        assert!(equal(&Operand::Num(Num::Int64(1 << 53)), &rounded));
        assert!(equal(&int(-3), &Operand::Num(Num::Float(-3.0))));
        assert!(!equal(&int(3), &Operand::Num(Num::Double(3.5))));
        assert!(!equal(&Operand::Num(Num::Int64(i64::MAX)), &Operand::Num(Num::Double(i64::MAX as f64))));
    }

    #[test]
    fn test_negate_mirrors_promotion() {
        assert_eq!(num(unary(UnaryOp::Negate, int(i32::MIN))), Num::Int64(2_147_483_648));
        assert_eq!(num(unary(UnaryOp::Negate, int(5))), Num::Int(-5));
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&int(0)));
        assert!(!truthy(&Operand::Str("")));
        assert!(!truthy(&Operand::Null));
        assert!(!truthy(&Operand::Error("x")));
        assert!(truthy(&Operand::Str("0")));
        assert_eq!(unary(UnaryOp::Not, Operand::Bool(false)), Outcome::Bool(true));
    }
}
