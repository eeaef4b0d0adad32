//! Control-flow opcode handlers: `JMP`, `CONDJMP`, `EXTERNJMP`.
//!
//! `dst` on a `JMP`/`CONDJMP` instruction is already a resolved instruction
//! index (the emitter's label-fixup pass put it there), not a tagged
//! operand — these handlers never run it through [`crate::opcode::decode_offset`].

use crate::error::PanicReason;
use crate::image::Image;
use crate::opcode::{Cond, Instruction, Opcode, SymbolTag};

use super::memory::{read32, read_ptr};
use super::Step;

pub(super) fn jmp(instr: &Instruction) -> Step {
    Step::JumpTo(instr.dst as usize)
}

/// `CONDJMP` supports exactly two operand-tag forms: a 32-bit comparison
/// between a `REL`/`TMP` value and a `CST`, and a null-pointer test between a
/// `TMP_REF` value and the constant zero.
pub(super) fn cond_jmp(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<Step, PanicReason> {
    let cond = instr
        .cond(index)
        .unwrap_or_else(|e| panic!("instruction {index}: condition decode should be infallible post-parse: {e}"));
    let src1_tag = Instruction::operand_tag(instr.src1, index)
        .unwrap_or_else(|e| panic!("instruction {index}: operand decode should be infallible post-parse: {e}"));
    let src2_tag = Instruction::operand_tag(instr.src2, index)
        .unwrap_or_else(|e| panic!("instruction {index}: operand decode should be infallible post-parse: {e}"));

    let taken = match (src1_tag, src2_tag) {
        (SymbolTag::TmpRef, SymbolTag::Cst) => {
            let ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::CondJmp)?;
            let comparand = read32(image, stack, context, instr.src2, index, Opcode::CondJmp)?;
            if comparand != 0 {
                return Err(PanicReason::NonZeroPointerComparand { index, value: comparand });
            }
            match cond {
                Cond::Eq => ptr == 0,
                _ => return Err(PanicReason::UnsupportedCondition { index, opcode: Opcode::CondJmp, cond }),
            }
        }
        (SymbolTag::Rel, SymbolTag::Cst) | (SymbolTag::Tmp, SymbolTag::Cst) => {
            let a = read32(image, stack, context, instr.src1, index, Opcode::CondJmp)?;
            let b = read32(image, stack, context, instr.src2, index, Opcode::CondJmp)?;
            match cond {
                Cond::Eq => a == b,
                Cond::Ne => a != b,
                Cond::Gt => (a as i32) > (b as i32),
                _ => return Err(PanicReason::UnsupportedCondition { index, opcode: Opcode::CondJmp, cond }),
            }
        }
        (src1, src2) => return Err(PanicReason::UnsupportedCondJmpForm { index, src1, src2 }),
    };

    Ok(if taken { Step::JumpTo(instr.dst as usize) } else { Step::Continue })
}

/// `EXTERNJMP`: tail-calls a native function with the context pointer and
/// ends execution immediately. Never returns control to the bytecode.
pub(super) fn extern_jmp(
    image: &Image,
    stack: &[u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<Step, PanicReason> {
    let target = read_ptr(image, stack, context, instr.src1, index, Opcode::ExternJmp)?;
    let ctx_ptr = context.as_mut_ptr();
    // SAFETY: `target` is a function pointer the IR computed; the ABI
    // (`extern "C" fn(*mut u8)`) is the contract CALL/EXTERNJMP share with
    // the foreign side.
    let f: extern "C" fn(*mut u8) = unsafe { std::mem::transmute(target) };
    f(ctx_ptr);
    Ok(Step::Halt)
}
