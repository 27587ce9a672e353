//! Bytecode container: header layout, validation, and whole-module decoding.
//!
//! ```text
//! offset 0   magic      u32  "VSPR"
//! offset 4   version    u32
//! offset 8   total size u64  (equals the buffer length)
//! offset 16  source path     NUL-terminated
//!            module name     NUL-terminated
//!            instructions...
//! ```

use crate::bytecode::chunk::{Chunk, EmitError};
use crate::bytecode::instruction::{Instruction, Reader};
use crate::error::BytecodeError;

/// Module magic number; the bytes spell `VSPR` on disk.
pub const MAGIC: u32 = 0x5250_5356;
/// Current container version.
pub const VERSION: u32 = 1;

const SIZE_FIELD: usize = 8;

/// A validated view over a bytecode buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeModule<'a> {
    pub version: u32,
    pub size: u64,
    pub path: &'a str,
    pub name: &'a str,
    /// Instruction stream of the module body.
    pub code: &'a [u8],
}

impl<'a> BytecodeModule<'a> {
    /// Validate the header and locate the instruction stream.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BytecodeError> {
        let mut reader = Reader::new(bytes, 0);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(BytecodeError::BadMagic(magic));
        }
        let version = reader.u32()?;
        let size = reader.u64()?;
        if size == 0 {
            return Err(BytecodeError::ZeroSize);
        }
        if size != bytes.len() as u64 {
            return Err(BytecodeError::SizeMismatch {
                declared: size,
                actual: bytes.len(),
            });
        }
        if version != VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }

        let path = reader.str()?;
        let name = reader.str()?;
        Ok(Self {
            version,
            size,
            path,
            name,
            code: &bytes[reader.pos..],
        })
    }

    /// Decode the module body into `(offset, instruction)` pairs.
    pub fn instructions(&self) -> Result<Vec<(usize, Instruction<'a>)>, BytecodeError> {
        decode_stream(self.code)
    }
}

/// Decode a whole instruction stream, checking that every jump lands inside it.
pub fn decode_stream(code: &[u8]) -> Result<Vec<(usize, Instruction<'_>)>, BytecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let (instruction, width) = Instruction::decode(code, offset)?;
        if let Some(jump) = instruction.jump_offset() {
            let target = (offset + width) as i64 + jump as i64;
            if target < 0 || target > code.len() as i64 {
                return Err(BytecodeError::JumpOutOfBounds {
                    from: offset,
                    target,
                });
            }
        }
        out.push((offset, instruction));
        offset += width;
    }
    Ok(out)
}

/// Validate `bytes` and decode the top-level instruction sequence.
pub fn decode_module(bytes: &[u8]) -> Result<Vec<Instruction<'_>>, BytecodeError> {
    let module = BytecodeModule::parse(bytes)?;
    Ok(module
        .instructions()?
        .into_iter()
        .map(|(_, instruction)| instruction)
        .collect())
}

/// Write a header with a zero size placeholder.
pub(crate) fn write_header(chunk: &mut Chunk, path: &str, name: &str) -> Result<(), EmitError> {
    chunk.write_bytes(&MAGIC.to_le_bytes());
    chunk.write_bytes(&VERSION.to_le_bytes());
    chunk.write_bytes(&0u64.to_le_bytes());
    chunk.write_str(path)?;
    chunk.write_str(name)
}

/// Record the final buffer length in the header.
pub(crate) fn patch_size(chunk: &mut Chunk) {
    let size = chunk.len() as u64;
    chunk.patch_u64(SIZE_FIELD, size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module(body: &[Instruction<'_>]) -> Vec<u8> {
        let mut chunk = Chunk::new();
        write_header(&mut chunk, "main.vsp", "main").unwrap();
        for instruction in body {
            chunk.emit(instruction).unwrap();
        }
        patch_size(&mut chunk);
        chunk.into_bytes()
    }

    #[test]
    fn test_header_roundtrip() {
        let bytes = module(&[Instruction::LoadNull, Instruction::Return]);
        assert_eq!(&bytes[..4], b"VSPR");

        let parsed = BytecodeModule::parse(&bytes).unwrap();
        assert_eq!(parsed.version, VERSION);
        assert_eq!(parsed.size, bytes.len() as u64);
        assert_eq!(parsed.path, "main.vsp");
        assert_eq!(parsed.name, "main");
        assert_eq!(
            decode_module(&bytes).unwrap(),
            vec![Instruction::LoadNull, Instruction::Return]
        );
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = module(&[Instruction::Return]);
        bytes[0] = b'X';
        assert!(matches!(
            BytecodeModule::parse(&bytes),
            Err(BytecodeError::BadMagic(_))
        ));
    }

    #[test]
    fn test_rejects_zero_and_mismatched_size() {
        let mut bytes = module(&[Instruction::Return]);
        bytes[8..16].copy_from_slice(&0u64.to_le_bytes());
        assert_eq!(BytecodeModule::parse(&bytes), Err(BytecodeError::ZeroSize));

        let mut bytes = module(&[Instruction::Return]);
        bytes.push(0);
        assert!(matches!(
            BytecodeModule::parse(&bytes),
            Err(BytecodeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = module(&[Instruction::Return]);
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(
            BytecodeModule::parse(&bytes),
            Err(BytecodeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_jump_out_of_bounds_detected() {
        let bytes = module(&[Instruction::JumpForward(100), Instruction::Return]);
        assert!(matches!(
            decode_module(&bytes),
            Err(BytecodeError::JumpOutOfBounds { from: 0, .. })
        ));
    }
}
