//! Bytecode disassembler for debugging.

use crate::bytecode::instruction::Instruction;
use crate::bytecode::module::{decode_stream, BytecodeModule};
use crate::error::BytecodeError;

/// Disassemble a complete module into human-readable output.
///
/// Nested function bodies are listed after the instruction that creates
/// them, indented one level deeper.
pub fn disassemble(bytes: &[u8]) -> Result<String, BytecodeError> {
    let module = BytecodeModule::parse(bytes)?;
    let mut output = format!(
        "== {} ({}, v{}, {} bytes) ==\n",
        module.name, module.path, module.version, module.size
    );
    disassemble_code(module.code, 0, &mut output)?;
    Ok(output)
}

/// Disassemble one instruction stream.
pub fn disassemble_code(code: &[u8], depth: usize, output: &mut String) -> Result<(), BytecodeError> {
    let indent = "    ".repeat(depth);
    for (offset, instruction) in decode_stream(code)? {
        output.push_str(&format!("{}{:04} {}", indent, offset, instruction));
        if let Some(jump) = instruction.jump_offset() {
            let width = encoded_width(&instruction);
            let target = (offset + width) as i64 + jump as i64;
            output.push_str(&format!(" (-> {:04})", target));
        }
        output.push('\n');

        if let Instruction::MakeFunction(proto) = &instruction {
            output.push_str(&format!("{}    == {} ==\n", indent, proto.name));
            disassemble_code(proto.body, depth + 1, output)?;
        }
    }
    Ok(())
}

fn encoded_width(instruction: &Instruction<'_>) -> usize {
    let mut scratch = Vec::new();
    instruction.encode(&mut scratch);
    scratch.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr, FunctionDecl, Program, Stmt};
    use crate::bytecode::compile_program;

    #[test]
    fn test_listing_shows_header_and_jump_targets() {
        let program = Program::new(
            "loop.vsp",
            "loop",
            vec![
                Stmt::var("i", Expr::int(0)),
                Stmt::while_loop(
                    Expr::binary(Expr::name("i"), BinaryOp::Less, Expr::int(3)),
                    Stmt::expr(Expr::assign(
                        Expr::name("i"),
                        Expr::binary(Expr::name("i"), BinaryOp::Add, Expr::int(1)),
                    )),
                ),
            ],
        );
        let bytes = compile_program(program).unwrap();
        let listing = disassemble(&bytes).unwrap();

        assert!(listing.starts_with("== loop (loop.vsp, v1, "), "{}", listing);
        assert!(listing.contains("StoreName i"));
        assert!(listing.contains("PopJumpIfFalse"));
        assert!(listing.contains("Loop -"));
        assert!(listing.contains(" (-> "));
    }

    #[test]
    fn test_nested_function_bodies_are_indented() {
        let decl = FunctionDecl::new(Some("id"), &["x"], vec![Stmt::ret(Some(Expr::name("x")))]);
        let bytes = compile_program(Program::new("f.vsp", "f", vec![Stmt::function(decl)])).unwrap();
        let listing = disassemble(&bytes).unwrap();

        assert!(listing.contains("MakeFunction id(x)"));
        assert!(listing.contains("    == id =="));
        assert!(listing.contains("    0000 LoadName x"));
    }

    #[test]
    fn test_corrupt_module_is_reported() {
        assert!(matches!(
            disassemble(b"nope"),
            Err(BytecodeError::BadMagic(_))
        ));
    }
}
