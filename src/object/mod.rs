//! Runtime values and the garbage-collected object heap.
//!
//! Scalars (numbers, booleans, null) are stored inline in [`Value`]. Every
//! other kind refers to an [`Object`] living in a [`Heap`] slot through a
//! generational [`Handle`]. The heap is the single registry of allocations;
//! the mark-sweep collector frees whatever the VM's roots no longer reach.

pub mod arith;
pub mod environment;
pub mod function;
pub mod heap;

use std::fmt;

use crate::collections::{HashTable, IterState, Range};

pub use environment::Environment;
pub use function::{Code, Function, NativeFn, NativeFunction};
pub use heap::{GcStats, Heap};

/// Generational index of a heap slot.
///
/// A handle only resolves while its slot still holds the object it was
/// issued for; once the slot is swept and reused the generation differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Handle {
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Null,
    String(Handle),
    Array(Handle),
    Map(Handle),
    Function(Handle),
    NativeFunction(Handle),
    Range(Handle),
    Iterator(Handle),
    Error(Handle),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Int64(_) => "Int64",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Bool(_) => "Bool",
            Value::Null => "Null",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Function(_) => "Function",
            Value::NativeFunction(_) => "NativeFunction",
            Value::Range(_) => "Range",
            Value::Iterator(_) => "Iterator",
            Value::Error(_) => "Error",
        }
    }

    /// The heap handle behind this value, if it is not a scalar.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Value::String(h)
            | Value::Array(h)
            | Value::Map(h)
            | Value::Function(h)
            | Value::NativeFunction(h)
            | Value::Range(h)
            | Value::Iterator(h)
            | Value::Error(h) => Some(*h),
            _ => None,
        }
    }

    /// Narrowest integer value holding `n`.
    pub fn from_i64(n: i64) -> Value {
        match i32::try_from(n) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Int64(n),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n as i64),
            Value::Int64(n) => Some(n),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Structural key of a map entry.
///
/// Two values that compare equal produce the same key. Numbers compare by
/// numeric value (so `1`, `1L` and `1.0` are the same key), strings and
/// errors by content, arrays element-wise, ranges by bounds. Maps,
/// functions and iterators are keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Error(String),
    Array(Vec<MapKey>),
    Range(i64, i64, i64),
    Ref(Handle),
}

impl MapKey {
    pub(crate) fn from_f64(n: f64) -> MapKey {
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            MapKey::Int(n as i64)
        } else if n.is_nan() {
            MapKey::Float(f64::NAN.to_bits())
        } else {
            MapKey::Float(n.to_bits())
        }
    }
}

/// A map entry keeps the original key value for key/value iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

/// Payload of an Error value.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub message: String,
    pub payload: Option<Value>,
}

/// A heap-resident object.
pub enum Object {
    String(String),
    Array(Vec<Value>),
    Map(HashTable<MapKey, MapEntry>),
    Function(Function),
    Native(NativeFunction),
    Range(Range),
    Iterator(IterState),
    Error(ErrorObject),
    Environment(Environment),
}

impl Object {
    /// Push the handle of every object this one keeps alive.
    pub(crate) fn trace(&self, out: &mut Vec<Handle>) {
        match self {
            Object::String(_) | Object::Native(_) | Object::Range(_) => {}
            Object::Array(items) => out.extend(items.iter().filter_map(Value::handle)),
            Object::Map(table) => {
                for entry in table.values() {
                    out.extend(entry.key.handle());
                    out.extend(entry.value.handle());
                }
            }
            Object::Function(function) => out.push(function.env),
            Object::Iterator(state) => out.push(state.target()),
            Object::Error(error) => out.extend(error.payload.and_then(|p| p.handle())),
            Object::Environment(env) => {
                out.extend(env.bindings.values().filter_map(Value::handle));
                out.extend(env.parent);
            }
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::String(s) => write!(f, "String({:?})", s),
            Object::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Object::Map(table) => f.debug_tuple("Map").field(table).finish(),
            Object::Function(function) => write!(f, "Function({})", function.code.name),
            Object::Native(native) => write!(f, "Native({})", native.name),
            Object::Range(range) => f.debug_tuple("Range").field(range).finish(),
            Object::Iterator(state) => f.debug_tuple("Iterator").field(state).finish(),
            Object::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Object::Environment(env) => f.debug_tuple("Environment").field(env).finish(),
        }
    }
}
