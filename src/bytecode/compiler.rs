//! AST-to-bytecode compiler.
//!
//! Single-pass compilation: walks the AST once, emitting instructions into a
//! [`Chunk`]. Names stay names in the bytecode; the compiler only tracks
//! scopes to enforce declaration rules and to record what nested functions
//! capture.

use crate::ast::{DeclKind, Program};
use crate::error::CompileError;
use crate::span::Span;

use super::chunk::{Chunk, EmitError, LoopLabel, PatchHandle};
use super::instruction::{Instruction, OpCode};
use super::module::{patch_size, write_header};
use super::scope::{Scope, ScopeKind, Symbol};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compile a program into a complete bytecode module.
pub fn compile_program(program: Program) -> CompileResult<Vec<u8>> {
    Compiler::compile(program)
}

/// The compiler: transforms AST into bytecode.
pub struct Compiler {
    /// Source file, reported in errors.
    pub(crate) file: String,
    /// Instructions of the function currently being compiled.
    pub(crate) chunk: Chunk,
    /// Innermost scope last.
    pub(crate) scopes: Vec<Scope>,
}

impl Compiler {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            chunk: Chunk::new(),
            scopes: vec![Scope::new(ScopeKind::Global)],
        }
    }

    /// Compile a full program.
    pub fn compile(program: Program) -> CompileResult<Vec<u8>> {
        let Program {
            path,
            name,
            statements,
        } = program;

        let mut compiler = Compiler::new(path.as_str());
        write_header(&mut compiler.chunk, &path, &name)
            .map_err(|e| compiler.emit_error(e, Span::default()))?;

        let count = statements.len();
        for stmt in statements {
            compiler.compile_statement(stmt)?;
        }
        // Implicit return null for the module
        compiler.emit(&Instruction::LoadNull, Span::default())?;
        compiler.emit(&Instruction::Return, Span::default())?;

        patch_size(&mut compiler.chunk);
        log::debug!(
            "compiled {} ({} statements, {} bytes)",
            path,
            count,
            compiler.chunk.len()
        );
        Ok(compiler.chunk.into_bytes())
    }

    // --- Chunk helpers ---

    pub(crate) fn emit(&mut self, instruction: &Instruction<'_>, span: Span) -> CompileResult<()> {
        self.chunk
            .emit(instruction)
            .map_err(|e| self.emit_error(e, span))
    }

    pub(crate) fn emit_jump(&mut self, op: OpCode) -> PatchHandle {
        self.chunk.emit_jump(op)
    }

    pub(crate) fn patch_jump(&mut self, handle: PatchHandle, span: Span) -> CompileResult<()> {
        self.chunk.patch(handle).map_err(|e| self.emit_error(e, span))
    }

    pub(crate) fn patch_all(&mut self, handles: Vec<PatchHandle>, span: Span) -> CompileResult<()> {
        for handle in handles {
            self.patch_jump(handle, span)?;
        }
        Ok(())
    }

    pub(crate) fn emit_loop(&mut self, label: LoopLabel, span: Span) -> CompileResult<()> {
        self.chunk
            .emit_loop(label)
            .map_err(|e| self.emit_error(e, span))
    }

    fn emit_error(&self, error: EmitError, span: Span) -> CompileError {
        CompileError::new(error.to_string(), self.file.as_str(), span)
    }

    pub(crate) fn error(&self, message: impl Into<String>, span: Span) -> CompileError {
        CompileError::new(message, self.file.as_str(), span)
    }

    // --- Scopes ---

    pub(crate) fn begin_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub(crate) fn end_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    pub(crate) fn current_scope(&self) -> ScopeKind {
        self.scopes
            .last()
            .map(|scope| scope.kind)
            .unwrap_or(ScopeKind::Global)
    }

    fn innermost_function(&self) -> Option<usize> {
        self.scopes
            .iter()
            .rposition(|scope| scope.kind == ScopeKind::Function)
    }

    /// Check that a `keyword` declaration of `name` is legal here and record it.
    pub(crate) fn declare(
        &mut self,
        kind: Option<DeclKind>,
        name: &str,
        span: Span,
    ) -> CompileResult<()> {
        let scope_kind = self.current_scope();
        let allowed = match kind {
            Some(decl) => scope_kind.allows(decl),
            // function declarations
            None => scope_kind != ScopeKind::Single,
        };
        if !allowed {
            return Err(CompileError::MisplacedDeclaration {
                keyword: kind.map(DeclKind::keyword).unwrap_or("function"),
                scope: scope_kind.describe(),
                file: self.file.clone(),
                span,
            });
        }

        let symbol = Symbol {
            name: name.to_string(),
            is_const: kind == Some(DeclKind::Const),
            is_global: scope_kind == ScopeKind::Global,
            span,
        };
        let declared = match self.scopes.last_mut() {
            Some(scope) => scope.declare(symbol),
            None => false,
        };
        if !declared {
            return Err(CompileError::Redeclaration {
                name: name.to_string(),
                file: self.file.clone(),
                span,
            });
        }
        Ok(())
    }

    /// Find the symbol `name` resolves to, recording captures on the way.
    ///
    /// Unknown names resolve to `None`; they may be defined at run time.
    pub(crate) fn resolve(&mut self, name: &str) -> Option<Symbol> {
        let (depth, symbol) = self
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.lookup(name).map(|s| (depth, s.clone())))?;

        if !symbol.is_global && self.scopes[depth].kind != ScopeKind::Global {
            if let Some(function) = self.innermost_function() {
                if depth < function {
                    for scope in &mut self.scopes[depth + 1..] {
                        if scope.kind == ScopeKind::Function {
                            scope.add_capture(name);
                        }
                    }
                }
            }
        }
        Some(symbol)
    }

    /// Flag the enclosing function as returning.
    pub(crate) fn mark_returned(&mut self, span: Span) -> CompileResult<()> {
        let Some(function) = self.innermost_function() else {
            return Err(CompileError::ReturnOutsideFunction {
                file: self.file.clone(),
                span,
            });
        };
        self.scopes[function].returned = true;
        Ok(())
    }
}
