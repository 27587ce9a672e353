//! Built-in native functions available to every VM.

use crate::collections::Range;
use crate::error::{RuntimeError, VesperError};
use crate::object::{NativeFn, NativeFunction, Value};

use super::vm::Vm;

impl Vm {
    /// Bind a host function in the global environment.
    pub fn define_native(
        &mut self,
        name: &str,
        arity: Option<usize>,
        func: NativeFn,
    ) -> Result<(), VesperError> {
        let native = self.heap.alloc_native(NativeFunction::new(name, arity, func))?;
        self.heap.define(self.globals, name, native)?;
        Ok(())
    }

    pub(crate) fn install_natives(&mut self) -> Result<(), VesperError> {
        // len(value) - Length of a string, array, map or range
        self.define_native("len", Some(1), |heap, args| {
            let len = match args[0] {
                Value::String(h) => heap.string(h)?.chars().count(),
                Value::Array(h) => heap.array(h)?.len(),
                Value::Map(h) => heap.map(h)?.len(),
                Value::Range(h) => heap.range(h)?.len(),
                Value::Error(_) => return Ok(args[0]),
                other => {
                    let message = format!("len() expects a collection, got {}", other.type_name());
                    return Ok(heap.alloc_error(message, None)?);
                }
            };
            Ok(Value::from_i64(len as i64))
        })?;

        // type_of(value) - Name of the value's type
        self.define_native("type_of", Some(1), |heap, args| {
            Ok(heap.alloc_string(args[0].type_name())?)
        })?;

        // str(value) - Display form of any value
        self.define_native("str", Some(1), |heap, args| {
            if let Value::String(_) = args[0] {
                return Ok(args[0]);
            }
            let text = heap.describe(args[0]);
            Ok(heap.alloc_string(text)?)
        })?;

        // range(end) / range(start, end) / range(start, end, step) - Array of integers
        self.define_native("range", None, |heap, args| {
            let mut bounds = Vec::with_capacity(args.len());
            for arg in args {
                match arg.as_i64() {
                    Some(n) => bounds.push(n),
                    None if arg.is_error() => return Ok(*arg),
                    None => {
                        let message =
                            format!("range() expects integers, got {}", arg.type_name());
                        return Ok(heap.alloc_error(message, None)?);
                    }
                }
            }
            let (start, end, step) = match bounds[..] {
                [end] => (0, end, 1),
                [start, end] => (start, end, 1),
                [start, end, step] => (start, end, step),
                _ => {
                    return Err(RuntimeError::type_error(format!(
                        "range() takes 1 to 3 arguments, got {}",
                        args.len()
                    )))
                }
            };
            match Range::new(start, end, step) {
                Ok(range) => {
                    let items = range.iter().map(Value::from_i64).collect();
                    Ok(heap.alloc_array(items)?)
                }
                Err(message) => Ok(heap.alloc_error(message, None)?),
            }
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Program, Stmt};
    use crate::bytecode::compile_program;
    use crate::error::{RuntimeError, VesperError};
    use crate::object::Value;
    use crate::vm::Vm;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Expr>) -> Result<String, VesperError> {
        let program = Program::new(
            "n.vsp",
            "n",
            vec![Stmt::var("r", Expr::call(Expr::name(name), args))],
        );
        let bytes = compile_program(program).unwrap();
        let mut vm = Vm::new().unwrap();
        vm.run(&bytes)?;
        let value = vm.global("r").unwrap();
        Ok(vm.heap().describe(value))
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", vec![Expr::string("abc")]).unwrap(), "3");
        assert_eq!(
            call("len", vec![Expr::range(Expr::int(0), Expr::int(10), Some(Expr::int(2)))]).unwrap(),
            "5"
        );
        assert_eq!(
            call("len", vec![Expr::int(1)]).unwrap(),
            "Error: len() expects a collection, got Int"
        );
    }

    #[test]
    fn test_type_of_and_str() {
        assert_eq!(call("type_of", vec![Expr::double(1.5)]).unwrap(), "Double");
        assert_eq!(call("type_of", vec![Expr::int64(1)]).unwrap(), "Int64");
        assert_eq!(
            call("str", vec![Expr::array(vec![Expr::int(1), Expr::string("a")])]).unwrap(),
            "[1, \"a\"]"
        );
    }

    #[test]
    fn test_range_native_builds_arrays() {
        assert_eq!(call("range", vec![Expr::int(3)]).unwrap(), "[0, 1, 2]");
        assert_eq!(
            call("range", vec![Expr::int(5), Expr::int(0), Expr::int(-2)]).unwrap(),
            "[5, 3, 1]"
        );
        assert_eq!(
            call("range", vec![Expr::int(0), Expr::int(3), Expr::int(0)]).unwrap(),
            "Error: range step cannot be zero"
        );
        assert!(matches!(
            call("range", vec![]),
            Err(VesperError::Runtime(RuntimeError::TypeError(_)))
        ));
    }

    #[test]
    fn test_host_natives_can_be_added() {
        let mut vm = Vm::new().unwrap();
        vm.define_native("answer", Some(0), |_, _| Ok(Value::Int(42)))
            .unwrap();
        let program = Program::new(
            "n.vsp",
            "n",
            vec![Stmt::var("r", Expr::call(Expr::name("answer"), vec![]))],
        );
        vm.run(&compile_program(program).unwrap()).unwrap();
        assert_eq!(vm.global("r"), Some(Value::Int(42)));
    }
}
