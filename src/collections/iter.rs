//! One-pass iteration over arrays, ranges, and maps.

use crate::error::RuntimeError;
use crate::object::{Handle, Heap, Object, Value};

use super::TableCursor;

/// Position of an in-progress `for-in` traversal.
///
/// The state only names the iterated object; the object itself stays on the
/// heap and is kept alive through the iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    Array { array: Handle, index: usize },
    Range { range: Handle, index: usize },
    Map { map: Handle, cursor: TableCursor },
}

/// What one step of an iterator produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Yield {
    One(Value),
    /// Index or key, then value.
    Two(Value, Value),
}

impl IterState {
    /// Start a traversal of `value`, if it is iterable.
    pub fn begin(value: Value) -> Option<Self> {
        match value {
            Value::Array(array) => Some(IterState::Array { array, index: 0 }),
            Value::Range(range) => Some(IterState::Range { range, index: 0 }),
            Value::Map(map) => Some(IterState::Map {
                map,
                cursor: TableCursor::default(),
            }),
            _ => None,
        }
    }

    /// The object being traversed.
    pub fn target(&self) -> Handle {
        match *self {
            IterState::Array { array, .. } => array,
            IterState::Range { range, .. } => range,
            IterState::Map { map, .. } => map,
        }
    }

    pub fn has_next(&self, heap: &Heap) -> Result<bool, RuntimeError> {
        Ok(match *self {
            IterState::Array { array, index } => index < heap.array(array)?.len(),
            IterState::Range { range, index } => index < heap.range(range)?.len(),
            IterState::Map { map, cursor } => heap.map(map)?.has_entry_at(cursor),
        })
    }

    /// Advance and produce the next element.
    ///
    /// With `arity` 2 arrays and ranges yield `(index, element)` and maps
    /// yield `(key, value)`; otherwise only the element or value is produced.
    pub fn next(&mut self, heap: &Heap, arity: u8) -> Result<Option<Yield>, RuntimeError> {
        let (key, value) = match self {
            IterState::Array { array, index } => {
                let items = heap.array(*array)?;
                let Some(item) = items.get(*index) else {
                    return Ok(None);
                };
                let pair = (Value::from_i64(*index as i64), *item);
                *index += 1;
                pair
            }
            IterState::Range { range, index } => {
                let Some(item) = heap.range(*range)?.get(*index) else {
                    return Ok(None);
                };
                let pair = (Value::from_i64(*index as i64), Value::from_i64(item));
                *index += 1;
                pair
            }
            IterState::Map { map, cursor } => {
                let table = heap.map(*map)?;
                let Some((_, entry)) = table.next_entry(cursor) else {
                    return Ok(None);
                };
                (entry.key, entry.value)
            }
        };

        Ok(Some(if arity >= 2 {
            Yield::Two(key, value)
        } else {
            Yield::One(value)
        }))
    }
}

impl Heap {
    /// Allocate an iterator over `value`, or `None` if it is not iterable.
    pub fn alloc_iterator(&mut self, value: Value) -> Result<Option<Value>, RuntimeError> {
        match IterState::begin(value) {
            Some(state) => Ok(Some(Value::Iterator(self.alloc(Object::Iterator(state))?))),
            None => Ok(None),
        }
    }

    pub fn iter_state(&self, handle: Handle) -> Result<IterState, RuntimeError> {
        match self.get(handle) {
            Some(Object::Iterator(state)) => Ok(*state),
            _ => Err(RuntimeError::InvalidHandle),
        }
    }

    pub fn set_iter_state(&mut self, handle: Handle, state: IterState) -> Result<(), RuntimeError> {
        match self.get_mut(handle) {
            Some(Object::Iterator(slot)) => {
                *slot = state;
                Ok(())
            }
            _ => Err(RuntimeError::InvalidHandle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(heap: &Heap, mut state: IterState, arity: u8) -> Vec<Yield> {
        let mut out = Vec::new();
        while state.has_next(heap).unwrap() {
            out.push(state.next(heap, arity).unwrap().unwrap());
        }
        assert_eq!(state.next(heap, arity).unwrap(), None);
        out
    }

    #[test]
    fn test_array_yields_in_index_order() {
        let mut heap = Heap::new();
        let array = heap
            .alloc_array(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
            .unwrap();
        let state = IterState::begin(array).unwrap();

        assert_eq!(
            drain(&heap, state, 1),
            vec![
                Yield::One(Value::Int(10)),
                Yield::One(Value::Int(20)),
                Yield::One(Value::Int(30)),
            ]
        );
        assert_eq!(
            drain(&heap, state, 2)[1],
            Yield::Two(Value::Int(1), Value::Int(20))
        );
    }

    #[test]
    fn test_range_yields_lazily() {
        let mut heap = Heap::new();
        let range = heap.alloc_range(0, 6, 2).unwrap();
        let state = IterState::begin(range).unwrap();
        assert_eq!(
            drain(&heap, state, 1),
            vec![
                Yield::One(Value::Int(0)),
                Yield::One(Value::Int(2)),
                Yield::One(Value::Int(4)),
            ]
        );
    }

    #[test]
    fn test_map_yields_every_entry_once() {
        let mut heap = Heap::new();
        let a = heap.alloc_string("a").unwrap();
        let b = heap.alloc_string("b").unwrap();
        let map = heap
            .alloc_map(vec![(a, Value::Int(1)), (b, Value::Int(2))])
            .unwrap();
        let state = IterState::begin(map).unwrap();

        let mut values: Vec<i64> = drain(&heap, state, 1)
            .into_iter()
            .map(|y| match y {
                Yield::One(v) => v.as_i64().unwrap(),
                Yield::Two(..) => panic!("expected single yield"),
            })
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);

        let pairs = drain(&heap, state, 2);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|y| matches!(y, Yield::Two(Value::String(_), _))));
    }

    #[test]
    fn test_scalars_are_not_iterable() {
        assert_eq!(IterState::begin(Value::Int(3)), None);
        assert_eq!(IterState::begin(Value::Null), None);
    }
}
