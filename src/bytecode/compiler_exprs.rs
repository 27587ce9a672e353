//! Expression compilation: AST expressions to bytecode.

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::error::CompileError;
use crate::span::Span;

use super::chunk::PatchHandle;
use super::compiler::{CompileResult, Compiler};
use super::fold::Constant;
use super::instruction::{Instruction, OpCode};

impl Compiler {
    /// Compile an expression; the result is left on the stack.
    pub fn compile_expression(&mut self, expr: Expr) -> CompileResult<()> {
        if let Some(constant) = Constant::fold(&expr) {
            return self.emit(&constant.load(), expr.span);
        }

        let span = expr.span;
        match expr.kind {
            ExprKind::Name(name) => {
                self.resolve(&name);
                self.emit(&Instruction::LoadName(&name), span)?;
            }
            ExprKind::Unary { operator, operand } => {
                self.compile_expression(*operand)?;
                let instruction = match operator {
                    UnaryOp::Negate => Instruction::Negate,
                    UnaryOp::Not => Instruction::Not,
                };
                self.emit(&instruction, span)?;
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expression(*left)?;
                self.compile_expression(*right)?;
                self.emit(&binary_instruction(operator), span)?;
            }
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                // Materialise the outcome of the jump lowering as a Bool.
                let logical = Expr::new(
                    ExprKind::Logical {
                        left,
                        operator,
                        right,
                    },
                    span,
                );
                let falsy = self.jump_if(logical, false)?;
                self.emit(&Instruction::LoadTrue, span)?;
                let end = self.emit_jump(OpCode::JumpForward);
                self.patch_all(falsy, span)?;
                self.emit(&Instruction::LoadFalse, span)?;
                self.patch_jump(end, span)?;
            }
            ExprKind::Assign { target, value } => {
                self.compile_assign(*target, *value, span)?;
            }
            ExprKind::Call { callee, arguments } => {
                let argc = self.checked_count("call arguments", arguments.len(), u8::MAX as usize, span)?;
                self.compile_expression(*callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(&Instruction::Call(argc as u8), span)?;
            }
            ExprKind::Member { object, name } => {
                self.compile_expression(*object)?;
                self.emit(&Instruction::GetMember(&name), span)?;
            }
            ExprKind::Index { object, index } => {
                self.compile_expression(*object)?;
                self.compile_expression(*index)?;
                self.emit(&Instruction::Index, span)?;
            }
            ExprKind::Array(elements) => {
                let count = self.checked_count("array elements", elements.len(), u32::MAX as usize, span)?;
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(&Instruction::BuildArray(count as u32), span)?;
            }
            ExprKind::Map(pairs) => {
                let count = self.checked_count("map entries", pairs.len(), u32::MAX as usize, span)?;
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(&Instruction::BuildMap(count as u32), span)?;
            }
            ExprKind::Range { start, end, step } => {
                self.compile_expression(*start)?;
                self.compile_expression(*end)?;
                match step {
                    Some(step) => self.compile_expression(*step)?,
                    None => self.emit(&Instruction::LoadInt(1), span)?,
                }
                self.emit(&Instruction::BuildRange, span)?;
            }
            ExprKind::Function(decl) => {
                self.compile_function(*decl)?;
            }
            ExprKind::Missing => {
                return Err(CompileError::MissingOperand {
                    file: self.file.clone(),
                    span,
                });
            }
            // Literals always fold.
            ExprKind::Null
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Int64(_)
            | ExprKind::Float(_)
            | ExprKind::Double(_)
            | ExprKind::Str(_) => unreachable!("literal escaped constant folding"),
        }
        Ok(())
    }

    fn compile_assign(&mut self, target: Expr, value: Expr, span: Span) -> CompileResult<()> {
        let ExprKind::Name(name) = target.kind else {
            return Err(CompileError::InvalidAssignmentTarget {
                file: self.file.clone(),
                span: target.span,
            });
        };
        if let Some(symbol) = self.resolve(&name) {
            if symbol.is_const {
                return Err(CompileError::ConstAssignment {
                    name,
                    file: self.file.clone(),
                    span,
                });
            }
        }
        self.compile_expression(value)?;
        self.emit(&Instruction::SetName(&name), span)
    }

    fn checked_count(&self, what: &str, count: usize, limit: usize, span: Span) -> CompileResult<usize> {
        if count > limit {
            return Err(self.error(format!("too many {}: {} exceeds {}", what, count, limit), span));
        }
        Ok(count)
    }

    /// Emit code that jumps when the truthiness of `expr` equals `sense` and
    /// falls through otherwise. Returns the jumps still to be patched.
    ///
    /// `&&`, `||` and `!` become control flow; no Bool is pushed for them.
    pub(crate) fn jump_if(&mut self, expr: Expr, sense: bool) -> CompileResult<Vec<PatchHandle>> {
        if let Some(constant) = Constant::fold(&expr) {
            return Ok(if constant.truthy() == sense {
                vec![self.emit_jump(OpCode::JumpForward)]
            } else {
                Vec::new()
            });
        }

        let span = expr.span;
        match expr.kind {
            ExprKind::Unary {
                operator: UnaryOp::Not,
                operand,
            } => self.jump_if(*operand, !sense),
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                // `a && b` is false if either side is; `a || b` is true if either side is.
                let short_circuits = match operator {
                    LogicalOp::And => !sense,
                    LogicalOp::Or => sense,
                };
                if short_circuits {
                    let mut jumps = self.jump_if(*left, sense)?;
                    jumps.extend(self.jump_if(*right, sense)?);
                    Ok(jumps)
                } else {
                    let skip = self.jump_if(*left, !sense)?;
                    let jumps = self.jump_if(*right, sense)?;
                    self.patch_all(skip, span)?;
                    Ok(jumps)
                }
            }
            kind => {
                self.compile_expression(Expr::new(kind, span))?;
                let op = if sense {
                    OpCode::PopJumpIfTrue
                } else {
                    OpCode::PopJumpIfFalse
                };
                Ok(vec![self.emit_jump(op)])
            }
        }
    }
}

fn binary_instruction(operator: BinaryOp) -> Instruction<'static> {
    match operator {
        BinaryOp::Add => Instruction::Add,
        BinaryOp::Subtract => Instruction::Subtract,
        BinaryOp::Multiply => Instruction::Multiply,
        BinaryOp::Divide => Instruction::Divide,
        BinaryOp::Modulo => Instruction::Modulo,
        BinaryOp::Equal => Instruction::Equal,
        BinaryOp::NotEqual => Instruction::NotEqual,
        BinaryOp::Less => Instruction::Less,
        BinaryOp::LessEqual => Instruction::LessEqual,
        BinaryOp::Greater => Instruction::Greater,
        BinaryOp::GreaterEqual => Instruction::GreaterEqual,
    }
}
