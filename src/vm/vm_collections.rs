//! Indexing, member access and range construction.
//!
//! Out-of-range indices and unknown members produce Error values rather than
//! aborting; an Error operand passes through untouched.

use crate::error::RuntimeError;
use crate::object::{arith, MapKey, Value};

use super::vm::Vm;

impl Vm {
    pub(crate) fn index(&mut self, object: Value, index: Value) -> Result<Value, RuntimeError> {
        if object.is_error() {
            return Ok(object);
        }
        if index.is_error() {
            return Ok(index);
        }

        match object {
            Value::Map(handle) => match self.heap.map_get(handle, index)? {
                Some(value) => Ok(value),
                None => {
                    let key = self.heap.describe(index);
                    self.error_value(format!("key {} not found", key))
                }
            },
            Value::Array(handle) => {
                let len = self.heap.array(handle)?.len();
                match self.position(index, len)? {
                    Ok(i) => Ok(self.heap.array(handle)?[i]),
                    Err(message) => self.error_value(message),
                }
            }
            Value::String(handle) => {
                let chars: Vec<char> = self.heap.string(handle)?.chars().collect();
                match self.position(index, chars.len())? {
                    Ok(i) => Ok(self.heap.alloc_string(chars[i].to_string())?),
                    Err(message) => self.error_value(message),
                }
            }
            Value::Range(handle) => {
                let range = self.heap.range(handle)?;
                match self.position(index, range.len())? {
                    Ok(i) => Ok(range.get(i).map(Value::from_i64).unwrap_or(Value::Null)),
                    Err(message) => self.error_value(message),
                }
            }
            other => self.error_value(format!("cannot index {}", other.type_name())),
        }
    }

    /// Resolve an integer index against `len`; negative indices count from the end.
    fn position(&self, index: Value, len: usize) -> Result<Result<usize, String>, RuntimeError> {
        let Some(i) = index.as_i64() else {
            return Ok(Err(format!("index must be an integer, got {}", index.type_name())));
        };
        let resolved = if i < 0 { i + len as i64 } else { i };
        if resolved < 0 || resolved >= len as i64 {
            return Ok(Err(format!("index {} out of bounds for length {}", i, len)));
        }
        Ok(Ok(resolved as usize))
    }

    pub(crate) fn member(&mut self, object: Value, name: &str) -> Result<Value, RuntimeError> {
        let found = match (object, name) {
            (Value::Error(handle), "message") => {
                let message = self.heap.error(handle)?.message.clone();
                Some(self.heap.alloc_string(message)?)
            }
            (Value::Error(handle), "payload") => {
                Some(self.heap.error(handle)?.payload.unwrap_or(Value::Null))
            }
            (Value::Error(_), _) => return Ok(object),

            (Value::String(handle), "length") => {
                Some(Value::from_i64(self.heap.string(handle)?.chars().count() as i64))
            }
            (Value::Array(handle), "length") => {
                Some(Value::from_i64(self.heap.array(handle)?.len() as i64))
            }
            (Value::Range(handle), _) => {
                let range = self.heap.range(handle)?;
                match name {
                    "length" => Some(Value::from_i64(range.len() as i64)),
                    "start" => Some(Value::from_i64(range.start)),
                    "end" => Some(Value::from_i64(range.end)),
                    "step" => Some(Value::from_i64(range.step)),
                    _ => None,
                }
            }
            (Value::Map(handle), _) => {
                let table = self.heap.map(handle)?;
                match table.get(&MapKey::Str(name.to_string())) {
                    Some(entry) => Some(entry.value),
                    None if name == "length" => Some(Value::from_i64(table.len() as i64)),
                    None => None,
                }
            }
            (Value::Function(handle), "name") => {
                let name = self.heap.function(handle)?.code.name.clone();
                Some(self.heap.alloc_string(name)?)
            }
            (Value::Function(handle), "arity") => {
                Some(Value::from_i64(self.heap.function(handle)?.code.arity() as i64))
            }
            (Value::NativeFunction(handle), "name") => {
                let name = self.heap.native(handle)?.name.clone();
                Some(self.heap.alloc_string(name)?)
            }
            _ => None,
        };

        match found {
            Some(value) => Ok(value),
            None => self.error_value(format!(
                "{} has no member '{}'",
                object.type_name(),
                name
            )),
        }
    }

    /// `start..end step s`. Non-integer bounds or a zero step yield an Error value.
    pub(crate) fn build_range(
        &mut self,
        start: Value,
        end: Value,
        step: Value,
    ) -> Result<Value, RuntimeError> {
        for bound in [start, end, step] {
            if bound.is_error() {
                return Ok(bound);
            }
        }
        let bounds = (
            self.integral(start)?,
            self.integral(end)?,
            self.integral(step)?,
        );
        match bounds {
            (Some(_), Some(_), Some(0)) => self.error_value("range step cannot be zero"),
            (Some(s), Some(e), Some(st)) => self.heap.alloc_range(s, e, st),
            _ => self.error_value(format!(
                "range bounds must be integers, got {}, {} and {}",
                start.type_name(),
                end.type_name(),
                step.type_name()
            )),
        }
    }

    /// Integer view of a range bound; numeric strings coerce like arithmetic does.
    fn integral(&self, value: Value) -> Result<Option<i64>, RuntimeError> {
        if let Some(n) = value.as_i64() {
            return Ok(Some(n));
        }
        let n = match value {
            Value::Float(n) => n as f64,
            Value::Double(n) => n,
            Value::String(handle) => match arith::parse_numeric(self.heap.string(handle)?) {
                Some(n) => n,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            Ok(Some(n as i64))
        } else {
            Ok(None)
        }
    }

    fn error_value(&mut self, message: impl Into<String>) -> Result<Value, RuntimeError> {
        Ok(self.heap.alloc_error(message, None)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Program, Stmt};
    use crate::bytecode::compile_program;
    use crate::object::Value;
    use crate::vm::Vm;
    use pretty_assertions::assert_eq;

    fn eval(expr: Expr) -> (Vm, Value) {
        let program = Program::new("c.vsp", "c", vec![Stmt::var("r", expr)]);
        let bytes = compile_program(program).unwrap();
        let mut vm = Vm::new().unwrap();
        vm.run(&bytes).unwrap();
        let value = vm.global("r").unwrap();
        (vm, value)
    }

    fn describe(expr: Expr) -> String {
        let (vm, value) = eval(expr);
        vm.heap().describe(value)
    }

    fn numbers() -> Expr {
        Expr::array(vec![Expr::int(10), Expr::int(20), Expr::int(30)])
    }

    #[test]
    fn test_array_index() {
        assert_eq!(eval(Expr::index(numbers(), Expr::int(1))).1, Value::Int(20));
        assert_eq!(eval(Expr::index(numbers(), Expr::int(-1))).1, Value::Int(30));
        assert_eq!(
            describe(Expr::index(numbers(), Expr::int(3))),
            "Error: index 3 out of bounds for length 3"
        );
    }

    #[test]
    fn test_array_literal_as_map_key() {
        // var m = {[1]: "a"}; var r = m[[1]];
        let map = Expr::map(vec![(Expr::array(vec![Expr::int(1)]), Expr::string("a"))]);
        assert_eq!(
            describe(Expr::index(map.clone(), Expr::array(vec![Expr::double(1.0)]))),
            "a"
        );
        assert_eq!(
            describe(Expr::index(map, Expr::array(vec![Expr::int(2)]))),
            "Error: key [2] not found"
        );
    }

    #[test]
    fn test_map_index_and_member() {
        let map = || {
            Expr::map(vec![
                (Expr::string("a"), Expr::int(1)),
                (Expr::int(2), Expr::string("two")),
            ])
        };
        assert_eq!(eval(Expr::index(map(), Expr::string("a"))).1, Value::Int(1));
        assert_eq!(describe(Expr::index(map(), Expr::double(2.0))), "two");
        assert_eq!(eval(Expr::member(map(), "a")).1, Value::Int(1));
        assert_eq!(eval(Expr::member(map(), "length")).1, Value::Int(2));
        assert_eq!(describe(Expr::index(map(), Expr::string("z"))), "Error: key z not found");
    }

    #[test]
    fn test_string_index_and_length() {
        assert_eq!(describe(Expr::index(Expr::string("héllo"), Expr::int(1))), "é");
        assert_eq!(eval(Expr::member(Expr::string("héllo"), "length")).1, Value::Int(5));
    }

    #[test]
    fn test_range_members() {
        let range = || Expr::range(Expr::int(0), Expr::int(10), Some(Expr::int(3)));
        assert_eq!(eval(Expr::member(range(), "length")).1, Value::Int(4));
        assert_eq!(eval(Expr::member(range(), "step")).1, Value::Int(3));
        assert_eq!(eval(Expr::index(range(), Expr::int(2))).1, Value::Int(6));
        assert_eq!(describe(range()), "0..10 step 3");
    }

    #[test]
    fn test_bad_range_is_an_error_value() {
        assert_eq!(
            describe(Expr::range(Expr::int(0), Expr::int(3), Some(Expr::int(0)))),
            "Error: range step cannot be zero"
        );
        assert!(describe(Expr::range(Expr::double(0.5), Expr::int(3), None))
            .starts_with("Error: range bounds must be integers"));
    }

    #[test]
    fn test_unknown_member_and_error_propagation() {
        assert_eq!(
            describe(Expr::member(Expr::int(3), "foo")),
            "Error: Int has no member 'foo'"
        );
        let failed = Expr::binary(Expr::int(1), crate::ast::BinaryOp::Divide, Expr::int(0));
        assert_eq!(
            describe(Expr::member(failed.clone(), "message")),
            "division by zero"
        );
        assert_eq!(
            describe(Expr::index(failed, Expr::int(0))),
            "Error: division by zero"
        );
    }
}
