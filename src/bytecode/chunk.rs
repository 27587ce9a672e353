//! Instruction emitter with backpatched jumps.

use thiserror::Error;

use crate::bytecode::instruction::{Instruction, OpCode};

/// Reasons an instruction cannot be encoded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmitError {
    #[error("string operand {0:?} contains a NUL byte")]
    NulInString(String),

    #[error("too many {what}: {count} exceeds the limit of {limit}")]
    TooMany {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("jump distance {0} does not fit in 32 bits")]
    JumpTooFar(i64),
}

/// A reserved jump offset field awaiting its target.
///
/// Handles must be handed back to [`Chunk::patch`]; dropping one leaves a
/// zero offset in the code.
#[must_use = "an unpatched jump falls through to the next instruction"]
#[derive(Debug, PartialEq, Eq)]
pub struct PatchHandle {
    field: usize,
}

/// A backward jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLabel(usize);

/// A growable instruction buffer.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: Vec<u8>,
}

impl Chunk {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    /// Append raw bytes (header fields).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Append a NUL-terminated string.
    pub fn write_str(&mut self, s: &str) -> Result<(), EmitError> {
        check_str(s)?;
        self.code.extend_from_slice(s.as_bytes());
        self.code.push(0);
        Ok(())
    }

    /// Overwrite eight bytes at `at` with `value`.
    pub fn patch_u64(&mut self, at: usize, value: u64) {
        self.code[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Encode one instruction.
    pub fn emit(&mut self, instruction: &Instruction<'_>) -> Result<(), EmitError> {
        for s in instruction.strings() {
            check_str(s)?;
        }
        if let Instruction::MakeFunction(proto) = instruction {
            check_count("parameters", proto.params.len(), u8::MAX as usize)?;
            check_count("captures", proto.captures.len(), u32::MAX as usize)?;
            check_count("function body bytes", proto.body.len(), u32::MAX as usize)?;
        }
        instruction.encode(&mut self.code);
        Ok(())
    }

    /// Emit a forward jump (`JumpForward`, `PopJumpIfFalse`, `PopJumpIfTrue`)
    /// with a placeholder offset.
    pub fn emit_jump(&mut self, op: OpCode) -> PatchHandle {
        debug_assert!(matches!(
            op,
            OpCode::JumpForward | OpCode::PopJumpIfFalse | OpCode::PopJumpIfTrue
        ));
        self.code.push(op.into());
        self.reserve_offset()
    }

    /// Emit `IterNext` with a placeholder exit offset.
    pub fn emit_iter_next(&mut self, arity: u8) -> PatchHandle {
        self.code.push(OpCode::IterNext.into());
        self.code.push(arity);
        self.reserve_offset()
    }

    fn reserve_offset(&mut self) -> PatchHandle {
        let field = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        PatchHandle { field }
    }

    /// Point a reserved jump at the current end of the code.
    pub fn patch(&mut self, handle: PatchHandle) -> Result<(), EmitError> {
        let distance = self.code.len() as i64 - (handle.field as i64 + 4);
        let offset = i32::try_from(distance).map_err(|_| EmitError::JumpTooFar(distance))?;
        self.code[handle.field..handle.field + 4].copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    /// Mark the current position as a loop head.
    pub fn label(&self) -> LoopLabel {
        LoopLabel(self.code.len())
    }

    /// Emit a backward jump to `label`.
    pub fn emit_loop(&mut self, label: LoopLabel) -> Result<(), EmitError> {
        let after = self.code.len() as i64 + 5;
        let distance = label.0 as i64 - after;
        let offset = i32::try_from(distance).map_err(|_| EmitError::JumpTooFar(distance))?;
        self.emit(&Instruction::Loop(offset))
    }
}

fn check_str(s: &str) -> Result<(), EmitError> {
    if s.as_bytes().contains(&0) {
        return Err(EmitError::NulInString(s.to_string()));
    }
    Ok(())
}

fn check_count(what: &'static str, count: usize, limit: usize) -> Result<(), EmitError> {
    if count > limit {
        return Err(EmitError::TooMany { what, count, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forward_jump_is_relative_to_field_end() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::JumpForward);
        chunk.emit(&Instruction::LoadNull).unwrap();
        chunk.emit(&Instruction::Pop).unwrap();
        chunk.patch(jump).unwrap();

        let (instruction, width) = Instruction::decode(chunk.as_bytes(), 0).unwrap();
        assert_eq!(instruction, Instruction::JumpForward(2));
        assert_eq!(width + 2, chunk.len());
    }

    #[test]
    fn test_loop_jumps_back_to_label() {
        let mut chunk = Chunk::new();
        chunk.emit(&Instruction::LoadTrue).unwrap();
        let head = chunk.label();
        chunk.emit(&Instruction::Pop).unwrap();
        chunk.emit_loop(head).unwrap();

        let (instruction, _) = Instruction::decode(chunk.as_bytes(), 2).unwrap();
        let Instruction::Loop(offset) = instruction else {
            panic!("expected Loop, got {:?}", instruction);
        };
        assert_eq!(chunk.len() as i64 + offset as i64, 1);
    }

    #[test]
    fn test_iter_next_patch() {
        let mut chunk = Chunk::new();
        let exit = chunk.emit_iter_next(2);
        chunk.emit(&Instruction::Pop).unwrap();
        chunk.patch(exit).unwrap();
        assert_eq!(
            Instruction::decode(chunk.as_bytes(), 0).unwrap().0,
            Instruction::IterNext { arity: 2, offset: 1 }
        );
    }

    #[test]
    fn test_nul_in_string_rejected() {
        let mut chunk = Chunk::new();
        assert_eq!(
            chunk.emit(&Instruction::LoadString("a\0b")),
            Err(EmitError::NulInString("a\0b".to_string()))
        );
        assert!(chunk.is_empty());
    }
}
