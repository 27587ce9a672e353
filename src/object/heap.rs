//! Generational object arena with a mark-sweep collector.
//!
//! Every heap object lives in exactly one slot. A slot freed by the sweep
//! has its generation bumped before it goes back on the free list, so
//! handles to the old object stop resolving instead of aliasing whatever
//! is allocated there next.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::collections::{HashTable, Range};
use crate::config::VmConfig;
use crate::error::{HeapError, RuntimeError};

use super::arith::{self, Num, Operand, Outcome, Side};
use super::{
    Code, ErrorObject, Function, Handle, MapEntry, MapKey, NativeFunction, Object, Value,
};

struct Slot {
    generation: u32,
    marked: bool,
    object: Option<Object>,
}

/// Statistics from one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects reached from the roots.
    pub marked: usize,
    /// Objects released by the sweep.
    pub freed: usize,
    /// Objects alive after the cycle.
    pub live: usize,
    /// Collections run so far, including this one.
    pub collections: usize,
}

/// The object arena.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    allocs_since_gc: usize,
    threshold: usize,
    limit: Option<usize>,
    last: GcStats,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_config(&VmConfig::default())
    }

    pub fn with_config(config: &VmConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            allocs_since_gc: 0,
            threshold: config.gc_threshold,
            limit: config.max_heap_objects,
            last: GcStats::default(),
        }
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn last_stats(&self) -> GcStats {
        self.last
    }

    /// Whether a cycle is due: the allocation threshold was reached, or the
    /// object limit is full and something was allocated since the last cycle.
    pub fn should_collect(&self) -> bool {
        if self.threshold > 0 && self.allocs_since_gc >= self.threshold {
            return true;
        }
        self.at_limit() && self.allocs_since_gc > 0
    }

    /// Whether the next allocation would exceed the configured object limit.
    pub fn at_limit(&self) -> bool {
        self.limit.is_some_and(|limit| self.live >= limit)
    }

    /// Store `object` in a free slot, reusing swept slots first.
    pub fn alloc(&mut self, object: Object) -> Result<Handle, HeapError> {
        if let Some(limit) = self.limit {
            if self.live >= limit {
                return Err(HeapError::Exhausted { limit });
            }
        }

        self.live += 1;
        self.allocs_since_gc += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.marked = false;
            return Ok(Handle {
                index,
                generation: slot.generation,
            });
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marked: false,
            object: Some(object),
        });
        Ok(Handle {
            index,
            generation: 0,
        })
    }

    pub fn get(&self, handle: Handle) -> Option<&Object> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    /// Whether `handle` still refers to the object it was issued for.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    // ----- allocation helpers -----

    pub fn alloc_string(&mut self, s: impl Into<String>) -> Result<Value, HeapError> {
        Ok(Value::String(self.alloc(Object::String(s.into()))?))
    }

    pub fn alloc_array(&mut self, items: Vec<Value>) -> Result<Value, HeapError> {
        Ok(Value::Array(self.alloc(Object::Array(items))?))
    }

    /// Build a map from key/value pairs; later duplicates overwrite earlier ones.
    pub fn alloc_map(&mut self, pairs: Vec<(Value, Value)>) -> Result<Value, RuntimeError> {
        let mut table = HashTable::with_buckets(pairs.len().max(4) * 2);
        for (key, value) in pairs {
            table.insert(self.map_key(key)?, MapEntry { key, value });
        }
        Ok(Value::Map(self.alloc(Object::Map(table))?))
    }

    pub fn alloc_range(&mut self, start: i64, end: i64, step: i64) -> Result<Value, RuntimeError> {
        let range = Range::new(start, end, step).map_err(RuntimeError::type_error)?;
        Ok(Value::Range(self.alloc(Object::Range(range))?))
    }

    pub fn alloc_error(
        &mut self,
        message: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<Value, HeapError> {
        let error = ErrorObject {
            message: message.into(),
            payload,
        };
        Ok(Value::Error(self.alloc(Object::Error(error))?))
    }

    pub fn alloc_function(&mut self, code: Rc<Code>, env: Handle) -> Result<Value, HeapError> {
        Ok(Value::Function(
            self.alloc(Object::Function(Function { code, env }))?,
        ))
    }

    pub fn alloc_native(&mut self, native: NativeFunction) -> Result<Value, HeapError> {
        Ok(Value::NativeFunction(self.alloc(Object::Native(native))?))
    }

    // ----- typed access -----

    pub fn string(&self, handle: Handle) -> Result<&str, RuntimeError> {
        match self.get(handle) {
            Some(Object::String(s)) => Ok(s),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn array(&self, handle: Handle) -> Result<&Vec<Value>, RuntimeError> {
        match self.get(handle) {
            Some(Object::Array(items)) => Ok(items),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn array_mut(&mut self, handle: Handle) -> Result<&mut Vec<Value>, RuntimeError> {
        match self.get_mut(handle) {
            Some(Object::Array(items)) => Ok(items),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn map(&self, handle: Handle) -> Result<&HashTable<MapKey, MapEntry>, RuntimeError> {
        match self.get(handle) {
            Some(Object::Map(table)) => Ok(table),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn map_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut HashTable<MapKey, MapEntry>, RuntimeError> {
        match self.get_mut(handle) {
            Some(Object::Map(table)) => Ok(table),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn range(&self, handle: Handle) -> Result<Range, RuntimeError> {
        match self.get(handle) {
            Some(Object::Range(range)) => Ok(*range),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn function(&self, handle: Handle) -> Result<&Function, RuntimeError> {
        match self.get(handle) {
            Some(Object::Function(function)) => Ok(function),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn native(&self, handle: Handle) -> Result<&NativeFunction, RuntimeError> {
        match self.get(handle) {
            Some(Object::Native(native)) => Ok(native),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn error(&self, handle: Handle) -> Result<&ErrorObject, RuntimeError> {
        match self.get(handle) {
            Some(Object::Error(error)) => Ok(error),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    // ----- maps -----

    /// Structural key for `value`.
    pub fn map_key(&self, value: Value) -> Result<MapKey, RuntimeError> {
        Ok(match value {
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(b),
            Value::Int(n) => MapKey::Int(n as i64),
            Value::Int64(n) => MapKey::Int(n),
            Value::Float(n) => MapKey::from_f64(n as f64),
            Value::Double(n) => MapKey::from_f64(n),
            Value::String(h) => MapKey::Str(self.string(h)?.to_string()),
            Value::Error(h) => MapKey::Error(self.error(h)?.message.clone()),
            Value::Array(h) => MapKey::Array(
                self.array(h)?
                    .iter()
                    .map(|item| self.map_key(*item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Range(h) => {
                let range = self.range(h)?;
                MapKey::Range(range.start, range.end, range.step)
            }
            other => match other.handle() {
                Some(handle) => MapKey::Ref(handle),
                None => return Err(RuntimeError::InvalidHandle),
            },
        })
    }

    pub fn map_get(&self, map: Handle, key: Value) -> Result<Option<Value>, RuntimeError> {
        let key = self.map_key(key)?;
        Ok(self.map(map)?.get(&key).map(|entry| entry.value))
    }

    pub fn map_insert(&mut self, map: Handle, key: Value, value: Value) -> Result<(), RuntimeError> {
        let map_key = self.map_key(key)?;
        self.map_mut(map)?.insert(map_key, MapEntry { key, value });
        Ok(())
    }

    // ----- value semantics -----

    /// View `value` as an arithmetic operand.
    pub fn operand(&self, value: Value) -> Result<Operand<'_>, RuntimeError> {
        Ok(match value {
            Value::Int(n) => Operand::Num(Num::Int(n)),
            Value::Int64(n) => Operand::Num(Num::Int64(n)),
            Value::Float(n) => Operand::Num(Num::Float(n)),
            Value::Double(n) => Operand::Num(Num::Double(n)),
            Value::Bool(b) => Operand::Bool(b),
            Value::Null => Operand::Null,
            Value::String(h) => Operand::Str(self.string(h)?),
            Value::Error(h) => Operand::Error(&self.error(h)?.message),
            Value::Array(h) => Operand::Ref {
                handle: h,
                type_name: "Array",
                empty: self.array(h)?.is_empty(),
            },
            Value::Map(h) => Operand::Ref {
                handle: h,
                type_name: "Map",
                empty: self.map(h)?.is_empty(),
            },
            Value::Range(h) => Operand::Ref {
                handle: h,
                type_name: "Range",
                empty: self.range(h)?.is_empty(),
            },
            Value::Function(h) | Value::NativeFunction(h) | Value::Iterator(h) => Operand::Ref {
                handle: h,
                type_name: value.type_name(),
                empty: false,
            },
        })
    }

    /// Turn an operator outcome into a value, allocating strings and errors.
    pub fn materialize(
        &mut self,
        outcome: Outcome,
        left: Value,
        right: Value,
    ) -> Result<Value, HeapError> {
        Ok(match outcome {
            Outcome::Num(Num::Int(n)) => Value::Int(n),
            Outcome::Num(Num::Int64(n)) => Value::Int64(n),
            Outcome::Num(Num::Float(n)) => Value::Float(n),
            Outcome::Num(Num::Double(n)) => Value::Double(n),
            Outcome::Bool(b) => Value::Bool(b),
            Outcome::Str(s) => self.alloc_string(s)?,
            Outcome::Error(message) => self.alloc_error(message, None)?,
            Outcome::Forward(Side::Left) => left,
            Outcome::Forward(Side::Right) => right,
        })
    }

    pub fn truthy(&self, value: Value) -> Result<bool, RuntimeError> {
        Ok(arith::truthy(&self.operand(value)?))
    }

    /// Structural equality: arrays compare element-wise, ranges by bounds,
    /// everything else through [`arith::equal`].
    pub fn values_equal(&self, left: Value, right: Value) -> Result<bool, RuntimeError> {
        match (left, right) {
            (Value::Array(a), Value::Array(b)) => {
                if a == b {
                    return Ok(true);
                }
                let (xs, ys) = (self.array(a)?, self.array(b)?);
                if xs.len() != ys.len() {
                    return Ok(false);
                }
                for (x, y) in xs.iter().zip(ys.iter()) {
                    if !self.values_equal(*x, *y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Range(a), Value::Range(b)) => Ok(self.range(a)? == self.range(b)?),
            _ => Ok(arith::equal(&self.operand(left)?, &self.operand(right)?)),
        }
    }

    /// Display form of a value.
    pub fn describe(&self, value: Value) -> String {
        let mut out = String::new();
        self.describe_into(value, &mut out, false);
        out
    }

    fn describe_into(&self, value: Value, out: &mut String, quoted: bool) {
        let _ = match value {
            Value::Int(n) => write!(out, "{}", n),
            Value::Int64(n) => write!(out, "{}", n),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(out, "{:.1}", n),
            Value::Float(n) => write!(out, "{}", n),
            Value::Double(n) => write_float(out, n),
            Value::Bool(b) => write!(out, "{}", b),
            Value::Null => write!(out, "null"),
            Value::String(h) => match self.string(h) {
                Ok(s) if quoted => write!(out, "{:?}", s),
                Ok(s) => write!(out, "{}", s),
                Err(_) => write!(out, "<freed>"),
            },
            Value::Array(h) => match self.array(h) {
                Ok(items) => {
                    out.push('[');
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.describe_into(*item, out, true);
                    }
                    out.push(']');
                    Ok(())
                }
                Err(_) => write!(out, "<freed>"),
            },
            Value::Map(h) => match self.map(h) {
                Ok(table) => {
                    out.push('{');
                    for (i, entry) in table.values().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.describe_into(entry.key, out, true);
                        out.push_str(": ");
                        self.describe_into(entry.value, out, true);
                    }
                    out.push('}');
                    Ok(())
                }
                Err(_) => write!(out, "<freed>"),
            },
            Value::Function(h) => match self.function(h) {
                Ok(function) => write!(out, "<function {}>", function.code.name),
                Err(_) => write!(out, "<freed>"),
            },
            Value::NativeFunction(h) => match self.native(h) {
                Ok(native) => write!(out, "<native {}>", native.name),
                Err(_) => write!(out, "<freed>"),
            },
            Value::Range(h) => match self.range(h) {
                Ok(r) if r.step == 1 => write!(out, "{}..{}", r.start, r.end),
                Ok(r) => write!(out, "{}..{} step {}", r.start, r.end, r.step),
                Err(_) => write!(out, "<freed>"),
            },
            Value::Iterator(_) => write!(out, "<iterator>"),
            Value::Error(h) => match self.error(h) {
                Ok(error) => write!(out, "Error: {}", error.message),
                Err(_) => write!(out, "<freed>"),
            },
        };
    }

    // ----- collection -----

    /// Mark everything reachable from `roots`, then sweep the rest.
    pub fn collect<I>(&mut self, roots: I) -> GcStats
    where
        I: IntoIterator<Item = Handle>,
    {
        let marked = self.mark(roots);
        let freed = self.sweep();

        self.allocs_since_gc = 0;
        self.last = GcStats {
            marked,
            freed,
            live: self.live,
            collections: self.last.collections + 1,
        };
        log::debug!(
            "gc #{}: marked {}, freed {}, live {}",
            self.last.collections,
            marked,
            freed,
            self.live
        );
        self.last
    }

    fn mark<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = Handle>,
    {
        let mut worklist: Vec<Handle> = roots.into_iter().collect();
        let mut marked = 0;

        while let Some(handle) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(handle.index()) else {
                continue;
            };
            if slot.marked || slot.generation != handle.generation {
                continue;
            }
            let Some(object) = slot.object.as_ref() else {
                continue;
            };
            slot.marked = true;
            marked += 1;
            object.trace(&mut worklist);
        }
        marked
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
                continue;
            }
            if slot.object.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn write_float(out: &mut String, n: f64) -> std::fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(out, "{:.1}", n)
    } else {
        write!(out, "{}", n)
    }
}
