//! Compiled code objects, closures, and native functions.

use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Handle, Heap, Value};

/// An immutable compiled function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    /// Source file the function was compiled from.
    pub file: String,
    /// Function name (`<module>` for the top level, `<anonymous>` for literals).
    pub name: String,
    /// Parameter names, in call order.
    pub params: Vec<String>,
    /// Names read from enclosing non-global scopes.
    pub captures: Vec<String>,
    pub is_async: bool,
    /// Owned instruction stream.
    pub instructions: Vec<u8>,
}

impl Code {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A function value: compiled code plus the environment it closed over.
#[derive(Debug, Clone)]
pub struct Function {
    pub code: Rc<Code>,
    pub env: Handle,
}

/// Signature of host functions callable from scripts.
pub type NativeFn = fn(&mut Heap, &[Value]) -> Result<Value, RuntimeError>;

/// A host function registered with the VM.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    /// `None` for variadic functions.
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, arity: Option<usize>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
