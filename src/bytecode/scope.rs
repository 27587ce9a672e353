//! Compile-time scopes and symbol tables.

use crate::ast::DeclKind;
use crate::collections::HashTable;
use crate::span::Span;

/// Lexical context a statement is compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Module top level.
    Global,
    /// A function body.
    Function,
    /// A braced block.
    Block,
    /// A loop body.
    Loop,
    /// An unbraced single-statement branch; declares nothing.
    Single,
}

impl ScopeKind {
    pub fn describe(self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Function => "function",
            ScopeKind::Block => "block",
            ScopeKind::Loop => "loop",
            ScopeKind::Single => "single-statement",
        }
    }

    /// Whether a declaration of `kind` may appear directly in this scope.
    pub fn allows(self, kind: DeclKind) -> bool {
        let var = self == ScopeKind::Global;
        let local = matches!(self, ScopeKind::Function | ScopeKind::Block | ScopeKind::Loop);
        match kind {
            DeclKind::Var => var,
            DeclKind::Local => local,
            DeclKind::Const => var || local,
        }
    }
}

/// A declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub is_const: bool,
    pub is_global: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    symbols: HashTable<String, Symbol>,
    /// Names read from enclosing non-global scopes (function scopes only).
    pub captures: Vec<String>,
    /// Set once a `return` is compiled anywhere in this function scope.
    pub returned: bool,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            symbols: HashTable::new(),
            captures: Vec::new(),
            returned: false,
        }
    }

    /// Declare `symbol`; returns `false` if the name already exists here.
    pub fn declare(&mut self, symbol: Symbol) -> bool {
        if self.symbols.contains_key(symbol.name.as_str()) {
            return false;
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn add_capture(&mut self, name: &str) {
        if !self.captures.iter().any(|c| c == name) {
            self.captures.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            is_const: false,
            is_global: false,
            span: Span::default(),
        }
    }

    #[test]
    fn test_declaration_placement() {
        assert!(ScopeKind::Global.allows(DeclKind::Var));
        assert!(!ScopeKind::Global.allows(DeclKind::Local));
        assert!(ScopeKind::Global.allows(DeclKind::Const));

        for kind in [ScopeKind::Function, ScopeKind::Block, ScopeKind::Loop] {
            assert!(!kind.allows(DeclKind::Var));
            assert!(kind.allows(DeclKind::Local));
            assert!(kind.allows(DeclKind::Const));
        }

        for decl in [DeclKind::Var, DeclKind::Local, DeclKind::Const] {
            assert!(!ScopeKind::Single.allows(decl));
        }
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let mut scope = Scope::new(ScopeKind::Block);
        assert!(scope.declare(symbol("x")));
        assert!(!scope.declare(symbol("x")));
        assert!(scope.lookup("x").is_some());
        assert!(scope.lookup("y").is_none());
    }

    #[test]
    fn test_many_symbols_grow_the_table() {
        let mut scope = Scope::new(ScopeKind::Function);
        let initial = scope.symbols.bucket_count();
        for i in 0..100 {
            assert!(scope.declare(symbol(&format!("s{}", i))));
        }
        assert_eq!(scope.symbols.len(), 100);
        assert!(scope.symbols.bucket_count() > initial);
        for i in 0..100 {
            let name = format!("s{}", i);
            assert_eq!(scope.lookup(&name).map(|s| s.name.as_str()), Some(name.as_str()));
        }
        assert!(!scope.declare(symbol("s42")));
    }

    #[test]
    fn test_captures_are_deduplicated() {
        let mut scope = Scope::new(ScopeKind::Function);
        scope.add_capture("a");
        scope.add_capture("b");
        scope.add_capture("a");
        assert_eq!(scope.captures, vec!["a".to_string(), "b".to_string()]);
    }
}
