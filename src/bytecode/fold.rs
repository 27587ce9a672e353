//! Compile-time evaluation of constant expressions.
//!
//! A subtree folds when every node in it is a literal or an operator over
//! foldable subtrees. Evaluation goes through [`crate::object::arith`], so a
//! folded result is exactly what the VM would have computed.

use crate::ast::{Expr, ExprKind, LogicalOp};
use crate::bytecode::instruction::Instruction;
use crate::object::arith::{self, Num, Operand, Outcome, Side};

/// The value of a folded expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A computation that failed; loads as an Error value.
    Error(String),
}

impl Constant {
    /// Evaluate `expr` if it is constant.
    pub fn fold(expr: &Expr) -> Option<Constant> {
        match &expr.kind {
            ExprKind::Null => Some(Constant::Null),
            ExprKind::Bool(b) => Some(Constant::Bool(*b)),
            ExprKind::Int(n) => Some(Constant::Int(*n)),
            ExprKind::Int64(n) => Some(Constant::Int64(*n)),
            ExprKind::Float(n) => Some(Constant::Float(*n)),
            ExprKind::Double(n) => Some(Constant::Double(*n)),
            ExprKind::Str(s) => Some(Constant::Str(s.clone())),
            ExprKind::Unary { operator, operand } => {
                let operand = Constant::fold(operand)?;
                let outcome = arith::unary(*operator, operand.operand());
                Some(Constant::from_outcome(outcome, &operand, &operand))
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = Constant::fold(left)?;
                let right = Constant::fold(right)?;
                let outcome = arith::binary(*operator, left.operand(), right.operand());
                Some(Constant::from_outcome(outcome, &left, &right))
            }
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left = Constant::fold(left)?.truthy();
                let right = Constant::fold(right)?.truthy();
                Some(Constant::Bool(match operator {
                    LogicalOp::And => left && right,
                    LogicalOp::Or => left || right,
                }))
            }
            _ => None,
        }
    }

    fn operand(&self) -> Operand<'_> {
        match self {
            Constant::Null => Operand::Null,
            Constant::Bool(b) => Operand::Bool(*b),
            Constant::Int(n) => Operand::Num(Num::Int(*n)),
            Constant::Int64(n) => Operand::Num(Num::Int64(*n)),
            Constant::Float(n) => Operand::Num(Num::Float(*n)),
            Constant::Double(n) => Operand::Num(Num::Double(*n)),
            Constant::Str(s) => Operand::Str(s),
            Constant::Error(message) => Operand::Error(message),
        }
    }

    fn from_outcome(outcome: Outcome, left: &Constant, right: &Constant) -> Constant {
        match outcome {
            Outcome::Num(Num::Int(n)) => Constant::Int(n),
            Outcome::Num(Num::Int64(n)) => Constant::Int64(n),
            Outcome::Num(Num::Float(n)) => Constant::Float(n),
            Outcome::Num(Num::Double(n)) => Constant::Double(n),
            Outcome::Bool(b) => Constant::Bool(b),
            Outcome::Str(s) => Constant::Str(s),
            Outcome::Error(message) => Constant::Error(message),
            Outcome::Forward(Side::Left) => left.clone(),
            Outcome::Forward(Side::Right) => right.clone(),
        }
    }

    pub fn truthy(&self) -> bool {
        arith::truthy(&self.operand())
    }

    /// The single instruction that loads this constant.
    pub fn load(&self) -> Instruction<'_> {
        match self {
            Constant::Null => Instruction::LoadNull,
            Constant::Bool(true) => Instruction::LoadTrue,
            Constant::Bool(false) => Instruction::LoadFalse,
            Constant::Int(n) => Instruction::LoadInt(*n),
            Constant::Int64(n) => Instruction::LoadInt64(*n),
            Constant::Float(n) => Instruction::LoadFloat(*n),
            Constant::Double(n) => Instruction::LoadDouble(*n),
            Constant::Str(s) => Instruction::LoadString(s),
            Constant::Error(message) => Instruction::LoadError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literals_fold_to_themselves() {
        assert_eq!(Constant::fold(&Expr::int(4)), Some(Constant::Int(4)));
        assert_eq!(Constant::fold(&Expr::string("hi")), Some(Constant::Str("hi".into())));
    }

    #[test]
    fn test_arithmetic_folds() {
        let sum = Expr::binary(Expr::int(2), BinaryOp::Add, Expr::int(2));
        assert_eq!(Constant::fold(&sum), Some(Constant::Int(4)));

        let mixed = Expr::binary(Expr::int(2), BinaryOp::Add, Expr::double(3.14));
        assert_eq!(Constant::fold(&mixed), Some(Constant::Double(2.0 + 3.14)));

        let nested = Expr::unary(
            UnaryOp::Negate,
            Expr::binary(Expr::int(i32::MAX), BinaryOp::Add, Expr::int(1)),
        );
        assert_eq!(Constant::fold(&nested), Some(Constant::Int64(-2_147_483_648)));
    }

    #[test]
    fn test_failed_computation_folds_to_error() {
        let div = Expr::binary(Expr::int(1), BinaryOp::Divide, Expr::int(0));
        assert_eq!(
            Constant::fold(&div),
            Some(Constant::Error("division by zero".into()))
        );

        let chained = Expr::binary(div, BinaryOp::Add, Expr::int(1));
        assert_eq!(
            Constant::fold(&chained),
            Some(Constant::Error("division by zero".into()))
        );
    }

    #[test]
    fn test_logical_folds_to_bool() {
        let and = Expr::and(Expr::bool(true), Expr::bool(false));
        assert_eq!(Constant::fold(&and), Some(Constant::Bool(false)));

        let or = Expr::or(Expr::int(0), Expr::string("x"));
        assert_eq!(Constant::fold(&or), Some(Constant::Bool(true)));
    }

    #[test]
    fn test_names_do_not_fold() {
        let expr = Expr::binary(Expr::name("x"), BinaryOp::Add, Expr::int(1));
        assert_eq!(Constant::fold(&expr), None);
    }
}
