//! Runtime lexical environments.
//!
//! Each module, function, and block activation gets its own environment on
//! the heap. Environments form a parent chain that name lookup walks
//! outward; they are released by the collector once no frame, closure, or
//! child environment refers to them.

use crate::collections::HashTable;
use crate::error::RuntimeError;

use super::{Handle, Heap, Object, Value};

/// A name→value binding table with an optional parent.
#[derive(Debug, Default)]
pub struct Environment {
    pub bindings: HashTable<String, Value>,
    pub parent: Option<Handle>,
}

impl Environment {
    pub fn new(parent: Option<Handle>) -> Self {
        Self {
            bindings: HashTable::new(),
            parent,
        }
    }
}

impl Heap {
    /// Allocate a new environment chained to `parent`.
    pub fn alloc_environment(&mut self, parent: Option<Handle>) -> Result<Handle, crate::error::HeapError> {
        self.alloc(Object::Environment(Environment::new(parent)))
    }

    pub fn env(&self, handle: Handle) -> Result<&Environment, RuntimeError> {
        match self.get(handle) {
            Some(Object::Environment(env)) => Ok(env),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn env_mut(&mut self, handle: Handle) -> Result<&mut Environment, RuntimeError> {
        match self.get_mut(handle) {
            Some(Object::Environment(env)) => Ok(env),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    /// Bind `name` in `env` itself, shadowing any outer binding.
    pub fn define(&mut self, env: Handle, name: &str, value: Value) -> Result<(), RuntimeError> {
        let env = self.env_mut(env)?;
        if let Some(slot) = env.bindings.get_mut(name) {
            *slot = value;
        } else {
            env.bindings.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Look `name` up along the parent chain starting at `env`.
    pub fn lookup(&self, env: Handle, name: &str) -> Result<Option<Value>, RuntimeError> {
        let mut current = Some(env);
        while let Some(handle) = current {
            let env = self.env(handle)?;
            if let Some(value) = env.bindings.get(name) {
                return Ok(Some(*value));
            }
            current = env.parent;
        }
        Ok(None)
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, env: Handle, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut current = Some(env);
        while let Some(handle) = current {
            let env = self.env_mut(handle)?;
            if let Some(slot) = env.bindings.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            current = env.parent;
        }
        Err(RuntimeError::undefined_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut heap = Heap::new();
        let global = heap.alloc_environment(None).unwrap();
        let inner = heap.alloc_environment(Some(global)).unwrap();
        heap.define(global, "x", Value::Int(1)).unwrap();
        heap.define(inner, "y", Value::Int(2)).unwrap();

        assert_eq!(heap.lookup(inner, "x").unwrap(), Some(Value::Int(1)));
        assert_eq!(heap.lookup(inner, "y").unwrap(), Some(Value::Int(2)));
        assert_eq!(heap.lookup(global, "y").unwrap(), None);
    }

    #[test]
    fn test_define_shadows_outer_binding() {
        let mut heap = Heap::new();
        let global = heap.alloc_environment(None).unwrap();
        let inner = heap.alloc_environment(Some(global)).unwrap();
        heap.define(global, "x", Value::Int(1)).unwrap();
        heap.define(inner, "x", Value::Int(9)).unwrap();

        assert_eq!(heap.lookup(inner, "x").unwrap(), Some(Value::Int(9)));
        assert_eq!(heap.lookup(global, "x").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut heap = Heap::new();
        let global = heap.alloc_environment(None).unwrap();
        let inner = heap.alloc_environment(Some(global)).unwrap();
        heap.define(global, "count", Value::Int(0)).unwrap();

        heap.assign(inner, "count", Value::Int(5)).unwrap();
        assert_eq!(heap.lookup(global, "count").unwrap(), Some(Value::Int(5)));
        assert!(heap.env(inner).unwrap().bindings.is_empty());
    }

    #[test]
    fn test_assign_to_unknown_name_fails() {
        let mut heap = Heap::new();
        let global = heap.alloc_environment(None).unwrap();
        assert_eq!(
            heap.assign(global, "nope", Value::Null),
            Err(RuntimeError::undefined_name("nope"))
        );
    }

    #[test]
    fn test_many_bindings_grow_the_table() {
        let mut heap = Heap::new();
        let global = heap.alloc_environment(None).unwrap();
        let inner = heap.alloc_environment(Some(global)).unwrap();
        let initial = heap.env(inner).unwrap().bindings.bucket_count();
        for i in 0..100 {
            heap.define(inner, &format!("v{}", i), Value::Int(i)).unwrap();
        }

        let bindings = &heap.env(inner).unwrap().bindings;
        assert_eq!(bindings.len(), 100);
        assert!(bindings.bucket_count() > initial);
        for i in 0..100 {
            assert_eq!(heap.lookup(inner, &format!("v{}", i)).unwrap(), Some(Value::Int(i)));
        }
        heap.assign(inner, "v57", Value::Int(-1)).unwrap();
        assert_eq!(heap.lookup(inner, "v57").unwrap(), Some(Value::Int(-1)));
    }
}
