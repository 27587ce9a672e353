//! Function call dispatch for the VM.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::object::{Code, Handle, NativeFunction, Value};

use super::vm::{CallFrame, Vm};

impl Vm {
    /// Call a value with the given number of argument slots on the stack.
    /// The callee is below the arguments on the stack.
    pub(crate) fn call_value(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee_idx = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(RuntimeError::StackUnderflow)?;

        match self.stack[callee_idx] {
            Value::Function(handle) => {
                let function = self.heap.function(handle)?;
                let (code, env) = (Rc::clone(&function.code), function.env);
                self.call_function(code, env, callee_idx, argc)
            }
            Value::NativeFunction(handle) => {
                let native = self.heap.native(handle)?.clone();
                self.call_native(&native, callee_idx, argc)
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_function(
        &mut self,
        code: Rc<Code>,
        closure_env: Handle,
        callee_idx: usize,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        if code.is_async {
            return Err(RuntimeError::Unsupported(format!(
                "async function '{}' cannot be called",
                code.name
            )));
        }
        if argc != code.arity() {
            return Err(RuntimeError::wrong_arity(&code.name, code.arity(), argc));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(RuntimeError::FrameOverflow(self.config.max_frames));
        }

        // Parameters live in a fresh environment chained to the closure's.
        let env = self.heap.alloc_environment(Some(closure_env))?;
        for (param, arg) in code.params.iter().zip(&self.stack[callee_idx + 1..]) {
            self.heap.define(env, param, *arg)?;
        }
        self.stack.truncate(callee_idx + 1);

        log::trace!("call {}({} args), depth {}", code.name, argc, self.frames.len() + 1);
        self.frames.push(CallFrame {
            code,
            ip: 0,
            env,
            stack_base: callee_idx,
        });
        Ok(())
    }

    fn call_native(
        &mut self,
        native: &NativeFunction,
        callee_idx: usize,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        if let Some(expected) = native.arity {
            if argc != expected {
                return Err(RuntimeError::wrong_arity(&native.name, expected, argc));
            }
        }

        let args = self.stack.split_off(callee_idx + 1);
        let result = (native.func)(&mut self.heap, &args)?;
        self.stack.truncate(callee_idx);
        self.push(result)
    }

    /// Unwind the current frame. Returns the result once the outermost
    /// frame has returned.
    pub(crate) fn return_from_frame(&mut self, result: Value) -> Result<Option<Value>, RuntimeError> {
        let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
        self.stack.truncate(frame.stack_base);
        if self.frames.is_empty() {
            return Ok(Some(result));
        }
        self.push(result)?;
        Ok(None)
    }
}
