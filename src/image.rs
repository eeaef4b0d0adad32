//! The parsed, immutable bytecode image an [`crate::interpreter::Interpreter`]
//! loads and executes.
//!
//! An [`Image`] is cheap to share read-only across multiple interpreter
//! instances once parsed — it owns no per-execution state, only the header,
//! the instruction array and the constant pool produced by one emission
//! session.

use tracing::debug;

use crate::error::DecodeError;
use crate::opcode::Instruction;
use crate::stream::ByteSource;

/// A parsed bytecode image: header, instruction array, constant pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub stack_size: u32,
    pub instructions: Vec<Instruction>,
    pub constants: Vec<u32>,
}

impl Image {
    /// Parse a bytecode image from `source`, per the layout in §6: header,
    /// instruction count, instructions, constant count, constants.
    #[tracing::instrument(skip(source))]
    pub fn parse(source: &mut impl ByteSource) -> Result<Self, DecodeError> {
        let stack_size = source.read_u32()?;

        let instr_count = source.read_u32()? as usize;
        let mut instructions = Vec::with_capacity(instr_count);
        for _ in 0..instr_count {
            let mut bytes = [0u8; Instruction::LEN];
            source.read_bytes(&mut bytes)?;
            instructions.push(Instruction::from_bytes(bytes));
        }

        let const_count = source.read_u32()? as usize;
        let mut constants = Vec::with_capacity(const_count);
        for _ in 0..const_count {
            constants.push(source.read_u32()?);
        }

        debug!(
            stack_size,
            instr_count,
            const_count,
            "parsed bytecode image"
        );

        Ok(Image {
            stack_size,
            instructions,
            constants,
        })
    }

    /// The number of 32-bit words the interpreter's private stack must hold:
    /// `ceil(stack_size / 4)`.
    pub fn stack_words(&self) -> usize {
        (self.stack_size as usize + 3) / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Emitter;
    use crate::ir::Statement;
    use crate::ir::SymbolRef;
    use crate::opcode::Opcode;

    #[test]
    fn empty_image_parses_with_no_instructions_or_constants() {
        let bytes = Emitter::emit_to_vec(&[], 0).unwrap();
        let image = Image::parse(&mut bytes.as_slice()).unwrap();
        assert!(image.instructions.is_empty());
        assert!(image.constants.is_empty());
        assert_eq!(image.stack_words(), 0);
    }

    #[test]
    fn stack_words_rounds_up() {
        let bytes = Emitter::emit_to_vec(&[], 13).unwrap();
        let image = Image::parse(&mut bytes.as_slice()).unwrap();
        assert_eq!(image.stack_words(), 4);
    }

    #[test]
    fn truncated_stream_is_a_decode_error() {
        let statements = vec![Statement::binary(
            Opcode::Add,
            SymbolRef::rel(0),
            SymbolRef::rel(4),
            SymbolRef::rel(8),
        )];
        let bytes = Emitter::emit_to_vec(&statements, 0).unwrap();
        let truncated = &bytes[..bytes.len() - 4];
        assert!(Image::parse(&mut &truncated[..]).is_err());
    }
}
