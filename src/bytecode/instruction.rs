//! Opcode set, instruction decoding, and instruction encoding.
//!
//! Every instruction is one opcode byte followed by operands whose layout is
//! determined by the opcode alone. Multi-byte integers and floats are
//! little-endian, strings are UTF-8 terminated by a NUL byte, and jump
//! offsets are signed 32-bit distances measured from the byte that follows
//! the offset field.

use std::fmt;

use crate::error::BytecodeError;

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $byte:literal,)*) => {
        /// Opcodes for the bytecode virtual machine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum OpCode {
            $($(#[$doc])* $name = $byte,)*
        }

        impl OpCode {
            /// Convert from u8 to OpCode.
            pub fn from_u8(byte: u8) -> Option<OpCode> {
                match byte {
                    $($byte => Some(OpCode::$name),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    // ============ Literals ============
    LoadNull = 0,
    LoadTrue = 1,
    LoadFalse = 2,
    /// LOAD_INT <i32>
    LoadInt = 3,
    /// LOAD_INT64 <i64>
    LoadInt64 = 4,
    /// LOAD_FLOAT <f32>
    LoadFloat = 5,
    /// LOAD_DOUBLE <f64>
    LoadDouble = 6,
    /// LOAD_STRING <str>
    LoadString = 7,
    /// LOAD_ERROR <message:str>
    LoadError = 8,

    // ============ Names ============
    /// Push the value bound to a name: LOAD_NAME <str>
    LoadName = 9,
    /// Pop and bind in the current environment: STORE_NAME <str>
    StoreName = 10,
    /// Assign the nearest binding, leaving the value: SET_NAME <str>
    SetName = 11,

    // ============ Stack ============
    Pop = 12,

    // ============ Arithmetic ============
    Add = 13,
    Subtract = 14,
    Multiply = 15,
    Divide = 16,
    Modulo = 17,
    Negate = 18,
    Not = 19,

    // ============ Comparison ============
    Equal = 20,
    NotEqual = 21,
    Less = 22,
    LessEqual = 23,
    Greater = 24,
    GreaterEqual = 25,

    // ============ Control Flow ============
    /// JUMP_FORWARD <offset:i32>
    JumpForward = 26,
    /// Pop, jump if falsy: POP_JUMP_IF_FALSE <offset:i32>
    PopJumpIfFalse = 27,
    /// Pop, jump if truthy: POP_JUMP_IF_TRUE <offset:i32>
    PopJumpIfTrue = 28,
    /// Backward jump: LOOP <offset:i32>
    Loop = 29,

    // ============ Scopes ============
    EnterScope = 30,
    ExitScope = 31,

    // ============ Collections ============
    /// BUILD_ARRAY <count:u32>
    BuildArray = 32,
    /// BUILD_MAP <pairs:u32>
    BuildMap = 33,
    /// Pops step, end, start
    BuildRange = 34,
    Index = 35,
    /// GET_MEMBER <name:str>
    GetMember = 36,

    // ============ Iteration ============
    GetIter = 37,
    /// ITER_NEXT <arity:u8> <exit:i32>
    IterNext = 38,

    // ============ Functions ============
    /// CALL <argc:u8>
    Call = 39,
    /// MAKE_FUNCTION <name:str> <nparams:u8> <params:str...> <ncaptures:u32>
    /// <captures:str...> <async:u8> <body_len:u32> <body>
    MakeFunction = 40,
    Return = 41,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// Operands of a `MakeFunction` instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionProto<'a> {
    pub name: &'a str,
    pub params: Vec<&'a str>,
    pub captures: Vec<&'a str>,
    pub is_async: bool,
    /// The function's own instruction stream.
    pub body: &'a [u8],
}

/// A decoded instruction borrowing its string operands from the code buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction<'a> {
    LoadNull,
    LoadTrue,
    LoadFalse,
    LoadInt(i32),
    LoadInt64(i64),
    LoadFloat(f32),
    LoadDouble(f64),
    LoadString(&'a str),
    LoadError(&'a str),
    LoadName(&'a str),
    StoreName(&'a str),
    SetName(&'a str),
    Pop,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    JumpForward(i32),
    PopJumpIfFalse(i32),
    PopJumpIfTrue(i32),
    Loop(i32),
    EnterScope,
    ExitScope,
    BuildArray(u32),
    BuildMap(u32),
    BuildRange,
    Index,
    GetMember(&'a str),
    GetIter,
    IterNext { arity: u8, offset: i32 },
    Call(u8),
    MakeFunction(FunctionProto<'a>),
    Return,
}

impl<'a> Instruction<'a> {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::LoadNull => OpCode::LoadNull,
            Instruction::LoadTrue => OpCode::LoadTrue,
            Instruction::LoadFalse => OpCode::LoadFalse,
            Instruction::LoadInt(_) => OpCode::LoadInt,
            Instruction::LoadInt64(_) => OpCode::LoadInt64,
            Instruction::LoadFloat(_) => OpCode::LoadFloat,
            Instruction::LoadDouble(_) => OpCode::LoadDouble,
            Instruction::LoadString(_) => OpCode::LoadString,
            Instruction::LoadError(_) => OpCode::LoadError,
            Instruction::LoadName(_) => OpCode::LoadName,
            Instruction::StoreName(_) => OpCode::StoreName,
            Instruction::SetName(_) => OpCode::SetName,
            Instruction::Pop => OpCode::Pop,
            Instruction::Add => OpCode::Add,
            Instruction::Subtract => OpCode::Subtract,
            Instruction::Multiply => OpCode::Multiply,
            Instruction::Divide => OpCode::Divide,
            Instruction::Modulo => OpCode::Modulo,
            Instruction::Negate => OpCode::Negate,
            Instruction::Not => OpCode::Not,
            Instruction::Equal => OpCode::Equal,
            Instruction::NotEqual => OpCode::NotEqual,
            Instruction::Less => OpCode::Less,
            Instruction::LessEqual => OpCode::LessEqual,
            Instruction::Greater => OpCode::Greater,
            Instruction::GreaterEqual => OpCode::GreaterEqual,
            Instruction::JumpForward(_) => OpCode::JumpForward,
            Instruction::PopJumpIfFalse(_) => OpCode::PopJumpIfFalse,
            Instruction::PopJumpIfTrue(_) => OpCode::PopJumpIfTrue,
            Instruction::Loop(_) => OpCode::Loop,
            Instruction::EnterScope => OpCode::EnterScope,
            Instruction::ExitScope => OpCode::ExitScope,
            Instruction::BuildArray(_) => OpCode::BuildArray,
            Instruction::BuildMap(_) => OpCode::BuildMap,
            Instruction::BuildRange => OpCode::BuildRange,
            Instruction::Index => OpCode::Index,
            Instruction::GetMember(_) => OpCode::GetMember,
            Instruction::GetIter => OpCode::GetIter,
            Instruction::IterNext { .. } => OpCode::IterNext,
            Instruction::Call(_) => OpCode::Call,
            Instruction::MakeFunction(_) => OpCode::MakeFunction,
            Instruction::Return => OpCode::Return,
        }
    }

    /// Decode the instruction starting at `offset`.
    ///
    /// Returns the instruction and its total width in bytes.
    pub fn decode(code: &'a [u8], offset: usize) -> Result<(Instruction<'a>, usize), BytecodeError> {
        let mut reader = Reader::new(code, offset);
        let byte = reader.u8()?;
        let op = OpCode::from_u8(byte).ok_or(BytecodeError::UnknownOpcode { byte, offset })?;

        let instruction = match op {
            OpCode::LoadNull => Instruction::LoadNull,
            OpCode::LoadTrue => Instruction::LoadTrue,
            OpCode::LoadFalse => Instruction::LoadFalse,
            OpCode::LoadInt => Instruction::LoadInt(reader.i32()?),
            OpCode::LoadInt64 => Instruction::LoadInt64(reader.i64()?),
            OpCode::LoadFloat => Instruction::LoadFloat(reader.f32()?),
            OpCode::LoadDouble => Instruction::LoadDouble(reader.f64()?),
            OpCode::LoadString => Instruction::LoadString(reader.str()?),
            OpCode::LoadError => Instruction::LoadError(reader.str()?),
            OpCode::LoadName => Instruction::LoadName(reader.str()?),
            OpCode::StoreName => Instruction::StoreName(reader.str()?),
            OpCode::SetName => Instruction::SetName(reader.str()?),
            OpCode::Pop => Instruction::Pop,
            OpCode::Add => Instruction::Add,
            OpCode::Subtract => Instruction::Subtract,
            OpCode::Multiply => Instruction::Multiply,
            OpCode::Divide => Instruction::Divide,
            OpCode::Modulo => Instruction::Modulo,
            OpCode::Negate => Instruction::Negate,
            OpCode::Not => Instruction::Not,
            OpCode::Equal => Instruction::Equal,
            OpCode::NotEqual => Instruction::NotEqual,
            OpCode::Less => Instruction::Less,
            OpCode::LessEqual => Instruction::LessEqual,
            OpCode::Greater => Instruction::Greater,
            OpCode::GreaterEqual => Instruction::GreaterEqual,
            OpCode::JumpForward => Instruction::JumpForward(reader.i32()?),
            OpCode::PopJumpIfFalse => Instruction::PopJumpIfFalse(reader.i32()?),
            OpCode::PopJumpIfTrue => Instruction::PopJumpIfTrue(reader.i32()?),
            OpCode::Loop => Instruction::Loop(reader.i32()?),
            OpCode::EnterScope => Instruction::EnterScope,
            OpCode::ExitScope => Instruction::ExitScope,
            OpCode::BuildArray => Instruction::BuildArray(reader.u32()?),
            OpCode::BuildMap => Instruction::BuildMap(reader.u32()?),
            OpCode::BuildRange => Instruction::BuildRange,
            OpCode::Index => Instruction::Index,
            OpCode::GetMember => Instruction::GetMember(reader.str()?),
            OpCode::GetIter => Instruction::GetIter,
            OpCode::IterNext => Instruction::IterNext {
                arity: reader.u8()?,
                offset: reader.i32()?,
            },
            OpCode::Call => Instruction::Call(reader.u8()?),
            OpCode::MakeFunction => {
                let name = reader.str()?;
                let param_count = reader.u8()?;
                let params = (0..param_count)
                    .map(|_| reader.str())
                    .collect::<Result<Vec<_>, _>>()?;
                let capture_count = reader.u32()?;
                let captures = (0..capture_count)
                    .map(|_| reader.str())
                    .collect::<Result<Vec<_>, _>>()?;
                let is_async = reader.u8()? != 0;
                let body_len = reader.u32()? as usize;
                let body = reader.bytes(body_len)?;
                Instruction::MakeFunction(FunctionProto {
                    name,
                    params,
                    captures,
                    is_async,
                    body,
                })
            }
            OpCode::Return => Instruction::Return,
        };

        Ok((instruction, reader.pos - offset))
    }

    /// Append the encoded instruction to `out`.
    ///
    /// String operands must not contain NUL bytes; the emitter checks this
    /// before encoding.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().into());
        match self {
            Instruction::LoadInt(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::LoadInt64(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::LoadFloat(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::LoadDouble(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::LoadString(s)
            | Instruction::LoadError(s)
            | Instruction::LoadName(s)
            | Instruction::StoreName(s)
            | Instruction::SetName(s)
            | Instruction::GetMember(s) => write_str(out, s),
            Instruction::JumpForward(offset)
            | Instruction::PopJumpIfFalse(offset)
            | Instruction::PopJumpIfTrue(offset)
            | Instruction::Loop(offset) => out.extend_from_slice(&offset.to_le_bytes()),
            Instruction::BuildArray(n) | Instruction::BuildMap(n) => {
                out.extend_from_slice(&n.to_le_bytes())
            }
            Instruction::IterNext { arity, offset } => {
                out.push(*arity);
                out.extend_from_slice(&offset.to_le_bytes());
            }
            Instruction::Call(argc) => out.push(*argc),
            Instruction::MakeFunction(proto) => {
                write_str(out, proto.name);
                out.push(proto.params.len() as u8);
                for param in &proto.params {
                    write_str(out, param);
                }
                out.extend_from_slice(&(proto.captures.len() as u32).to_le_bytes());
                for capture in &proto.captures {
                    write_str(out, capture);
                }
                out.push(proto.is_async as u8);
                out.extend_from_slice(&(proto.body.len() as u32).to_le_bytes());
                out.extend_from_slice(proto.body);
            }
            _ => {}
        }
    }

    /// Every string operand, for NUL validation.
    pub fn strings(&self) -> Vec<&'a str> {
        match self {
            Instruction::LoadString(s)
            | Instruction::LoadError(s)
            | Instruction::LoadName(s)
            | Instruction::StoreName(s)
            | Instruction::SetName(s)
            | Instruction::GetMember(s) => vec![*s],
            Instruction::MakeFunction(proto) => std::iter::once(proto.name)
                .chain(proto.params.iter().copied())
                .chain(proto.captures.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Relative jump distance, for jumping instructions.
    pub fn jump_offset(&self) -> Option<i32> {
        match self {
            Instruction::JumpForward(offset)
            | Instruction::PopJumpIfFalse(offset)
            | Instruction::PopJumpIfTrue(offset)
            | Instruction::Loop(offset)
            | Instruction::IterNext { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match self {
            Instruction::LoadInt(n) => write!(f, "{} {}", name, n),
            Instruction::LoadInt64(n) => write!(f, "{} {}", name, n),
            Instruction::LoadFloat(n) => write!(f, "{} {}", name, n),
            Instruction::LoadDouble(n) => write!(f, "{} {}", name, n),
            Instruction::LoadString(s) | Instruction::LoadError(s) => write!(f, "{} {:?}", name, s),
            Instruction::LoadName(s)
            | Instruction::StoreName(s)
            | Instruction::SetName(s)
            | Instruction::GetMember(s) => write!(f, "{} {}", name, s),
            Instruction::JumpForward(offset)
            | Instruction::PopJumpIfFalse(offset)
            | Instruction::PopJumpIfTrue(offset)
            | Instruction::Loop(offset) => write!(f, "{} {:+}", name, offset),
            Instruction::BuildArray(n) | Instruction::BuildMap(n) => write!(f, "{} {}", name, n),
            Instruction::IterNext { arity, offset } => write!(f, "{} {} {:+}", name, arity, offset),
            Instruction::Call(argc) => write!(f, "{} {}", name, argc),
            Instruction::MakeFunction(proto) => {
                write!(f, "{} {}({})", name, proto.name, proto.params.join(", "))?;
                if !proto.captures.is_empty() {
                    write!(f, " captures [{}]", proto.captures.join(", "))?;
                }
                if proto.is_async {
                    write!(f, " async")?;
                }
                write!(f, " <{} bytes>", proto.body.len())
            }
            _ => write!(f, "{}", name),
        }
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Little-endian cursor over a byte buffer.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pub pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], BytecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(BytecodeError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BytecodeError> {
        let start = self.pos;
        self.bytes(N)?
            .try_into()
            .map_err(|_| BytecodeError::Truncated(start))
    }

    pub fn u8(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, BytecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, BytecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, BytecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, BytecodeError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, BytecodeError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, BytecodeError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Read a NUL-terminated UTF-8 string.
    pub fn str(&mut self) -> Result<&'a str, BytecodeError> {
        let start = self.pos;
        let rest = self.bytes.get(start..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(BytecodeError::UnterminatedString(start))?;
        let s = std::str::from_utf8(&rest[..len]).map_err(|_| BytecodeError::InvalidUtf8(start))?;
        self.pos = start + len + 1;
        Ok(s)
    }
}
