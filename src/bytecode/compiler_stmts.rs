//! Statement compilation: AST statements to bytecode.

use crate::ast::{DeclKind, Expr, FunctionDecl, Stmt, StmtKind};
use crate::error::CompileError;
use crate::span::Span;

use super::chunk::Chunk;
use super::compiler::{CompileResult, Compiler};
use super::instruction::{FunctionProto, Instruction, OpCode};
use super::scope::ScopeKind;

impl Compiler {
    /// Compile a statement.
    pub fn compile_statement(&mut self, stmt: Stmt) -> CompileResult<()> {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(&Instruction::Pop, span)?;
            }
            StmtKind::Declaration {
                kind,
                name,
                initializer,
            } => {
                self.compile_declaration(kind, &name, initializer, span)?;
            }
            StmtKind::Block(statements) => {
                self.emit(&Instruction::EnterScope, span)?;
                self.begin_scope(ScopeKind::Block);
                self.compile_body(statements)?;
                self.end_scope();
                self.emit(&Instruction::ExitScope, span)?;
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_if(condition, *then_branch, else_branch.map(|b| *b), span)?;
            }
            StmtKind::While { condition, body } => {
                self.compile_while(condition, *body, span)?;
            }
            StmtKind::ForIn {
                key,
                value,
                iterable,
                body,
            } => {
                self.compile_for_in(key, value, iterable, *body, span)?;
            }
            StmtKind::Return(value) => {
                self.mark_returned(span)?;
                match value {
                    Some(expr) => self.compile_expression(expr)?,
                    None => self.emit(&Instruction::LoadNull, span)?,
                }
                self.emit(&Instruction::Return, span)?;
            }
            StmtKind::Function(decl) => {
                let Some(name) = decl.name.clone() else {
                    return Err(self.error("function declaration needs a name", span));
                };
                // Declared before the body so the function can call itself.
                self.declare(None, &name, span)?;
                self.compile_function(decl)?;
                self.emit(&Instruction::StoreName(&name), span)?;
            }
        }
        Ok(())
    }

    fn compile_body(&mut self, statements: Vec<Stmt>) -> CompileResult<()> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_declaration(
        &mut self,
        kind: DeclKind,
        name: &str,
        initializer: Option<Expr>,
        span: Span,
    ) -> CompileResult<()> {
        match initializer {
            Some(init) => self.compile_expression(init)?,
            None if kind == DeclKind::Const => {
                return Err(self.error(format!("constant '{}' needs an initializer", name), span));
            }
            None => self.emit(&Instruction::LoadNull, span)?,
        }
        // The initializer is compiled first, so `local x = x` reads the outer `x`.
        self.declare(Some(kind), name, span)?;
        self.emit(&Instruction::StoreName(name), span)
    }

    /// Compile a branch or loop body: braced bodies get a runtime scope of
    /// `kind`; a lone statement is compiled in a `Single` scope.
    fn compile_branch(&mut self, body: Stmt, kind: ScopeKind) -> CompileResult<()> {
        let span = body.span;
        match body.kind {
            StmtKind::Block(statements) => {
                self.emit(&Instruction::EnterScope, span)?;
                self.begin_scope(kind);
                self.compile_body(statements)?;
                self.end_scope();
                self.emit(&Instruction::ExitScope, span)
            }
            other => {
                self.begin_scope(ScopeKind::Single);
                self.compile_statement(Stmt::new(other, span))?;
                self.end_scope();
                Ok(())
            }
        }
    }

    fn compile_if(
        &mut self,
        condition: Expr,
        then_branch: Stmt,
        else_branch: Option<Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        let else_jumps = self.jump_if(condition, false)?;
        self.compile_branch(then_branch, ScopeKind::Block)?;

        match else_branch {
            Some(else_branch) => {
                let end = self.emit_jump(OpCode::JumpForward);
                self.patch_all(else_jumps, span)?;
                self.compile_branch(else_branch, ScopeKind::Block)?;
                self.patch_jump(end, span)
            }
            None => self.patch_all(else_jumps, span),
        }
    }

    fn compile_while(&mut self, condition: Expr, body: Stmt, span: Span) -> CompileResult<()> {
        let head = self.chunk.label();
        let exits = self.jump_if(condition, false)?;

        self.emit(&Instruction::EnterScope, span)?;
        self.begin_scope(ScopeKind::Loop);
        self.compile_loop_body(body)?;
        self.end_scope();
        self.emit(&Instruction::ExitScope, span)?;

        self.emit_loop(head, span)?;
        self.patch_all(exits, span)
    }

    /// Statements of a braced loop body go straight into the current loop
    /// scope; a lone statement gets a `Single` scope, as an `if` arm does.
    fn compile_loop_body(&mut self, body: Stmt) -> CompileResult<()> {
        match body.kind {
            StmtKind::Block(statements) => self.compile_body(statements),
            other => {
                self.begin_scope(ScopeKind::Single);
                self.compile_statement(Stmt::new(other, body.span))?;
                self.end_scope();
                Ok(())
            }
        }
    }

    fn compile_for_in(
        &mut self,
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Stmt,
        span: Span,
    ) -> CompileResult<()> {
        self.compile_expression(iterable)?;
        self.emit(&Instruction::GetIter, span)?;

        let head = self.chunk.label();
        let arity = if key.is_some() { 2 } else { 1 };
        let exit = self.chunk.emit_iter_next(arity);

        self.emit(&Instruction::EnterScope, span)?;
        self.begin_scope(ScopeKind::Loop);
        // IterNext pushes the key below the value.
        self.declare(Some(DeclKind::Local), &value, span)?;
        self.emit(&Instruction::StoreName(&value), span)?;
        if let Some(key) = &key {
            self.declare(Some(DeclKind::Local), key, span)?;
            self.emit(&Instruction::StoreName(key), span)?;
        }
        self.compile_loop_body(body)?;
        self.end_scope();
        self.emit(&Instruction::ExitScope, span)?;

        self.emit_loop(head, span)?;
        self.patch_jump(exit, span)
    }

    /// Compile a function body into its own chunk and emit `MakeFunction`.
    pub(crate) fn compile_function(&mut self, decl: FunctionDecl) -> CompileResult<()> {
        let FunctionDecl {
            name,
            params,
            body,
            is_async,
            span,
        } = decl;
        let name = name.unwrap_or_else(|| "<anonymous>".to_string());

        let enclosing = std::mem::replace(&mut self.chunk, Chunk::new());
        self.begin_scope(ScopeKind::Function);

        let compiled = self.compile_function_body(&params, body, span);
        let scope = self.end_scope();
        let body_chunk = std::mem::replace(&mut self.chunk, enclosing);
        compiled?;

        let (captures, returned) = scope
            .map(|s| (s.captures, s.returned))
            .unwrap_or_default();
        log::debug!(
            "compiled function {} ({} captures, {})",
            name,
            captures.len(),
            if returned { "with return" } else { "without return" }
        );
        let proto = FunctionProto {
            name: &name,
            params: params.iter().map(String::as_str).collect(),
            captures: captures.iter().map(String::as_str).collect(),
            is_async,
            body: body_chunk.as_bytes(),
        };
        self.emit(&Instruction::MakeFunction(proto), span)
    }

    fn compile_function_body(
        &mut self,
        params: &[String],
        body: Vec<Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        for param in params {
            self.declare(Some(DeclKind::Local), param, span)
                .map_err(|err| match err {
                    CompileError::Redeclaration { name, file, span } => CompileError::General {
                        message: format!("duplicate parameter '{}'", name),
                        file,
                        span,
                    },
                    other => other,
                })?;
        }

        let ends_with_return = matches!(body.last(), Some(Stmt { kind: StmtKind::Return(_), .. }));
        self.compile_body(body)?;
        if !ends_with_return {
            self.emit(&Instruction::LoadNull, span)?;
            self.emit(&Instruction::Return, span)?;
        }
        Ok(())
    }
}
