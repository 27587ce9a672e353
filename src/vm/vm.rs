//! The bytecode virtual machine: stack-based execution engine.

use std::rc::Rc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::bytecode::instruction::Instruction;
use crate::bytecode::module::BytecodeModule;
use crate::collections::Yield;
use crate::config::VmConfig;
use crate::error::{BytecodeError, RuntimeError, VesperError};
use crate::object::{arith, Code, GcStats, Handle, Heap, Value};

/// Name lookup hook: `(heap, current environment, name)`.
pub type Resolver = Box<dyn Fn(&Heap, Handle, &str) -> Option<Value>>;

/// A call frame on the VM call stack.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// The code being executed.
    pub code: Rc<Code>,
    /// Instruction pointer (offset into `code.instructions`).
    pub ip: usize,
    /// Innermost environment of this activation.
    pub env: Handle,
    /// Stack index of the callee slot; everything from here up belongs to the frame.
    pub stack_base: usize,
}

/// The bytecode VM.
pub struct Vm {
    /// Value stack.
    pub(crate) stack: Vec<Value>,
    /// Call frame stack.
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) heap: Heap,
    /// Module-level environment; natives live here too.
    pub(crate) globals: Handle,
    resolver: Option<Resolver>,
    /// Value most recently discarded by `Pop`.
    last_popped: Value,
    pub(crate) config: VmConfig,
}

impl Vm {
    /// A VM with the default configuration and the default natives.
    pub fn new() -> Result<Self, VesperError> {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Result<Self, VesperError> {
        let mut heap = Heap::with_config(&config);
        let globals = heap.alloc_environment(None)?;
        let mut vm = Self {
            stack: Vec::with_capacity(config.stack_capacity.min(256)),
            frames: Vec::with_capacity(config.max_frames.min(64)),
            heap,
            globals,
            resolver: None,
            last_popped: Value::Null,
            config,
        };
        vm.install_natives()?;
        Ok(vm)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn globals(&self) -> Handle {
        self.globals
    }

    /// Value of a global binding.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.heap.lookup(self.globals, name).ok().flatten()
    }

    /// The value most recently discarded by an expression statement.
    pub fn last_popped(&self) -> Value {
        self.last_popped
    }

    /// Replace the name lookup used by `LoadName`.
    pub fn set_resolver(&mut self, resolver: Resolver) {
        self.resolver = Some(resolver);
    }

    /// Restore the default lookup (walk the environment chain).
    pub fn clear_resolver(&mut self) {
        self.resolver = None;
    }

    /// Validate and execute a bytecode module; returns the module's result.
    pub fn run(&mut self, bytes: &[u8]) -> Result<Value, VesperError> {
        let module = BytecodeModule::parse(bytes)?;
        let code = Rc::new(Code {
            file: module.path.to_string(),
            name: module.name.to_string(),
            params: Vec::new(),
            captures: Vec::new(),
            is_async: false,
            instructions: module.code.to_vec(),
        });

        self.stack.clear();
        self.frames.clear();
        self.frames.push(CallFrame {
            code,
            ip: 0,
            env: self.globals,
            stack_base: 0,
        });

        match self.execute() {
            Ok(value) => Ok(value),
            Err(err) => {
                log::warn!("{}: execution aborted: {}", module.path, err);
                self.frames.clear();
                self.stack.clear();
                Err(err.into())
            }
        }
    }

    /// Run a mark-sweep cycle over everything the VM can still reach.
    pub fn collect_garbage(&mut self) -> GcStats {
        let roots: Vec<Handle> = self
            .stack
            .iter()
            .filter_map(Value::handle)
            .chain(self.frames.iter().map(|frame| frame.env))
            .chain(std::iter::once(self.globals))
            .chain(self.last_popped.handle())
            .collect();
        self.heap.collect(roots)
    }

    // --- Stack helpers ---

    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.stack_capacity {
            return Err(RuntimeError::StackOverflow(self.config.stack_capacity));
        }
        self.stack.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    pub(crate) fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .map(|index| self.stack[index])
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop the top `count` values, oldest first.
    pub(crate) fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    pub(crate) fn frame(&self) -> Result<&CallFrame, RuntimeError> {
        self.frames.last().ok_or(RuntimeError::StackUnderflow)
    }

    pub(crate) fn frame_mut(&mut self) -> Result<&mut CallFrame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    fn jump(&mut self, from: usize, offset: i32, len: usize) -> Result<(), RuntimeError> {
        let target = from as i64 + offset as i64;
        if target < 0 || target > len as i64 {
            return Err(BytecodeError::JumpOutOfBounds { from, target }.into());
        }
        self.frame_mut()?.ip = target as usize;
        Ok(())
    }

    // --- Dispatch ---

    /// Run the dispatch loop until the outermost frame returns.
    fn execute(&mut self) -> Result<Value, RuntimeError> {
        loop {
            // Roots are complete here, and no instruction allocates more than one object.
            if self.heap.should_collect() {
                self.collect_garbage();
            }

            let frame = self.frame()?;
            let code = Rc::clone(&frame.code);
            let ip = frame.ip;
            let env = frame.env;

            if ip >= code.instructions.len() {
                return Err(BytecodeError::Truncated(ip).into());
            }
            let (instruction, width) = Instruction::decode(&code.instructions, ip)?;
            log::trace!("{}:{:04} {}", code.name, ip, instruction);

            let next = ip + width;
            let len = code.instructions.len();
            self.frame_mut()?.ip = next;

            match instruction {
                Instruction::LoadNull => self.push(Value::Null)?,
                Instruction::LoadTrue => self.push(Value::Bool(true))?,
                Instruction::LoadFalse => self.push(Value::Bool(false))?,
                Instruction::LoadInt(n) => self.push(Value::Int(n))?,
                Instruction::LoadInt64(n) => self.push(Value::Int64(n))?,
                Instruction::LoadFloat(n) => self.push(Value::Float(n))?,
                Instruction::LoadDouble(n) => self.push(Value::Double(n))?,
                Instruction::LoadString(s) => {
                    let value = self.heap.alloc_string(s)?;
                    self.push(value)?;
                }
                Instruction::LoadError(message) => {
                    let value = self.heap.alloc_error(message, None)?;
                    self.push(value)?;
                }

                Instruction::LoadName(name) => {
                    let found = match &self.resolver {
                        Some(resolver) => resolver(&self.heap, env, name),
                        None => self.heap.lookup(env, name)?,
                    };
                    let value = found.ok_or_else(|| RuntimeError::undefined_name(name))?;
                    self.push(value)?;
                }
                Instruction::StoreName(name) => {
                    let value = self.pop()?;
                    self.heap.define(env, name, value)?;
                }
                Instruction::SetName(name) => {
                    let value = self.peek(0)?;
                    self.heap.assign(env, name, value)?;
                }

                Instruction::Pop => {
                    self.last_popped = self.pop()?;
                }

                Instruction::Add => self.binary(BinaryOp::Add)?,
                Instruction::Subtract => self.binary(BinaryOp::Subtract)?,
                Instruction::Multiply => self.binary(BinaryOp::Multiply)?,
                Instruction::Divide => self.binary(BinaryOp::Divide)?,
                Instruction::Modulo => self.binary(BinaryOp::Modulo)?,
                Instruction::Equal => self.binary(BinaryOp::Equal)?,
                Instruction::NotEqual => self.binary(BinaryOp::NotEqual)?,
                Instruction::Less => self.binary(BinaryOp::Less)?,
                Instruction::LessEqual => self.binary(BinaryOp::LessEqual)?,
                Instruction::Greater => self.binary(BinaryOp::Greater)?,
                Instruction::GreaterEqual => self.binary(BinaryOp::GreaterEqual)?,
                Instruction::Negate => self.unary(UnaryOp::Negate)?,
                Instruction::Not => self.unary(UnaryOp::Not)?,

                Instruction::JumpForward(offset) | Instruction::Loop(offset) => {
                    self.jump(next, offset, len)?;
                }
                Instruction::PopJumpIfFalse(offset) => {
                    let condition = self.pop()?;
                    if !self.heap.truthy(condition)? {
                        self.jump(next, offset, len)?;
                    }
                }
                Instruction::PopJumpIfTrue(offset) => {
                    let condition = self.pop()?;
                    if self.heap.truthy(condition)? {
                        self.jump(next, offset, len)?;
                    }
                }

                Instruction::EnterScope => {
                    let scope = self.heap.alloc_environment(Some(env))?;
                    self.frame_mut()?.env = scope;
                }
                Instruction::ExitScope => {
                    let parent = self
                        .heap
                        .env(env)?
                        .parent
                        .ok_or_else(|| RuntimeError::type_error("exit from the outermost scope"))?;
                    self.frame_mut()?.env = parent;
                }

                Instruction::BuildArray(count) => {
                    let items = self.pop_n(count as usize)?;
                    let value = self.heap.alloc_array(items)?;
                    self.push(value)?;
                }
                Instruction::BuildMap(count) => {
                    let flat = self.pop_n(count as usize * 2)?;
                    let pairs = flat.chunks_exact(2).map(|kv| (kv[0], kv[1])).collect();
                    let value = self.heap.alloc_map(pairs)?;
                    self.push(value)?;
                }
                Instruction::BuildRange => {
                    let step = self.pop()?;
                    let end = self.pop()?;
                    let start = self.pop()?;
                    let value = self.build_range(start, end, step)?;
                    self.push(value)?;
                }
                Instruction::Index => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let value = self.index(object, index)?;
                    self.push(value)?;
                }
                Instruction::GetMember(name) => {
                    let object = self.pop()?;
                    let value = self.member(object, name)?;
                    self.push(value)?;
                }

                Instruction::GetIter => {
                    let iterable = self.pop()?;
                    let iterator = self.heap.alloc_iterator(iterable)?.ok_or_else(|| {
                        RuntimeError::type_error(format!(
                            "value of type {} is not iterable",
                            iterable.type_name()
                        ))
                    })?;
                    self.push(iterator)?;
                }
                Instruction::IterNext { arity, offset } => {
                    let Value::Iterator(handle) = self.peek(0)? else {
                        return Err(RuntimeError::type_error("IterNext without an iterator"));
                    };
                    let mut state = self.heap.iter_state(handle)?;
                    match state.next(&self.heap, arity)? {
                        Some(step) => {
                            self.heap.set_iter_state(handle, state)?;
                            match step {
                                Yield::One(value) => self.push(value)?,
                                Yield::Two(key, value) => {
                                    self.push(key)?;
                                    self.push(value)?;
                                }
                            }
                        }
                        None => {
                            self.pop()?;
                            self.jump(next, offset, len)?;
                        }
                    }
                }

                Instruction::Call(argc) => self.call_value(argc as usize)?,
                Instruction::MakeFunction(proto) => {
                    let function = Rc::new(Code {
                        file: code.file.clone(),
                        name: proto.name.to_string(),
                        params: proto.params.iter().map(|p| p.to_string()).collect(),
                        captures: proto.captures.iter().map(|c| c.to_string()).collect(),
                        is_async: proto.is_async,
                        instructions: proto.body.to_vec(),
                    });
                    let value = self.heap.alloc_function(function, env)?;
                    self.push(value)?;
                }
                Instruction::Return => {
                    let result = self.pop()?;
                    if let Some(done) = self.return_from_frame(result)? {
                        return Ok(done);
                    }
                }
            }
        }
    }

    fn binary(&mut self, op: BinaryOp) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        let value = match op {
            BinaryOp::Equal => Value::Bool(self.heap.values_equal(left, right)?),
            BinaryOp::NotEqual => Value::Bool(!self.heap.values_equal(left, right)?),
            _ => {
                let outcome = arith::binary(op, self.heap.operand(left)?, self.heap.operand(right)?);
                self.heap.materialize(outcome, left, right)?
            }
        };
        self.push(value)
    }

    fn unary(&mut self, op: UnaryOp) -> Result<(), RuntimeError> {
        let operand = self.pop()?;
        let outcome = arith::unary(op, self.heap.operand(operand)?);
        let value = self.heap.materialize(outcome, operand, operand)?;
        self.push(value)
    }
}
