//! `PARAM`/`CALL`: the variadic foreign-function call boundary.
//!
//! `PARAM` pushes the raw operand reference onto a queue; it does not resolve
//! a value. `CALL` later drains up to three queued operands, resolving each
//! one to a value only now, and dispatches to one of a small closed set of
//! native call shapes chosen by the queued operands' tags and the presence
//! and width of the result.
//!
//! The exact numeric signature values here are this crate's own — see the
//! design notes on call dispatch for why they aren't meant to be bit-for-bit
//! portable with any other implementation of this contract. What's load
//! bearing is the set of dispatchable shapes and their argument marshalling.

use crate::error::PanicReason;
use crate::image::Image;
use crate::opcode::{Instruction, Opcode, Operand, SymbolTag, NULL_OPERAND};

use super::memory::{read32, read64, read_ptr, write32, write64};

pub(super) fn param(instr: &Instruction, params: &mut Vec<Operand>) {
    params.push(instr.src1);
}

fn signature_byte(tag: Option<SymbolTag>) -> u8 {
    match tag {
        Some(t) => 0x80 | ((t as u16) & 0x7F) as u8,
        None => 0,
    }
}

fn build_signature(dst_tag: Option<SymbolTag>, param_tags: &[SymbolTag]) -> u32 {
    let mut sig = signature_byte(dst_tag) as u32;
    for (slot, tag) in param_tags.iter().enumerate() {
        sig |= (signature_byte(Some(*tag)) as u32) << (8 * (slot + 1));
    }
    sig
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    W32,
    W64,
}

fn width_of(tag: SymbolTag, index: usize, opcode: Opcode) -> Result<Width, PanicReason> {
    match tag.width_bits() {
        32 => Ok(Width::W32),
        64 => Ok(Width::W64),
        width => Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width }),
    }
}

pub(super) fn call(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
    params: &mut Vec<Operand>,
) -> Result<(), PanicReason> {
    let fn_ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::Call)?;
    let n = read32(image, stack, context, instr.src2, index, Opcode::Call)?;

    if n > 3 {
        return Err(PanicReason::TooManyParams { index, requested: n });
    }
    if n as usize > params.len() {
        return Err(PanicReason::ParamUnderflow { index, requested: n, available: params.len() });
    }

    let taken: Vec<Operand> = params[..n as usize].to_vec();
    let dst_tag = if instr.dst != NULL_OPERAND {
        Some(Instruction::operand_tag(instr.dst, index).unwrap_or_else(|e| {
            panic!("instruction {index}: operand decode should be infallible post-parse: {e}")
        }))
    } else {
        None
    };
    let param_tags: Vec<SymbolTag> = taken
        .iter()
        .map(|&op| {
            Instruction::operand_tag(op, index)
                .unwrap_or_else(|e| panic!("instruction {index}: operand decode should be infallible post-parse: {e}"))
        })
        .collect();

    let signature = build_signature(dst_tag, &param_tags);
    let ctx_ptr = context.as_mut_ptr();

    match (n, dst_tag.map(|t| width_of(t, index, Opcode::Call)).transpose()?) {
        // (void*) -> u32: no queued params, just the context pointer.
        (0, Some(Width::W32)) => {
            // SAFETY: `fn_ptr` is a function pointer the IR computed; the ABI
            // is fixed by this call shape.
            let f: extern "C" fn(*mut u8) -> u32 = unsafe { std::mem::transmute(fn_ptr) };
            let result = f(ctx_ptr);
            write32(stack, context, instr.dst, index, Opcode::Call, result)?;
        }

        // One queued param, 32-bit result. A constant-tagged argument means
        // the call is context-free; anything else takes the context pointer
        // as its first native argument.
        (1, Some(Width::W32)) if matches!(param_tags[0], SymbolTag::Cst | SymbolTag::Cst64 | SymbolTag::CstPtr) => {
            let arg = read32(image, stack, context, taken[0], index, Opcode::Call)?;
            let f: extern "C" fn(u32) -> u32 = unsafe { std::mem::transmute(fn_ptr) };
            let result = f(arg);
            write32(stack, context, instr.dst, index, Opcode::Call, result)?;
        }
        (1, Some(Width::W32)) => {
            let arg = read32(image, stack, context, taken[0], index, Opcode::Call)?;
            let f: extern "C" fn(*mut u8, u32) -> u32 = unsafe { std::mem::transmute(fn_ptr) };
            let result = f(ctx_ptr, arg);
            write32(stack, context, instr.dst, index, Opcode::Call, result)?;
        }

        // One queued param, 64-bit result: always context-taking.
        (1, Some(Width::W64)) => {
            let arg = read32(image, stack, context, taken[0], index, Opcode::Call)?;
            let f: extern "C" fn(*mut u8, u32) -> u64 = unsafe { std::mem::transmute(fn_ptr) };
            let result = f(ctx_ptr, arg);
            write64(stack, context, instr.dst, index, Opcode::Call, result)?;
        }

        // Two queued params, void result: native args are (context,
        // params[1], params[0]) — reverse queue order — widened to 64-bit
        // when the second queued param's tag calls for it.
        (2, None) => {
            if width_of(param_tags[1], index, Opcode::Call)? == Width::W64 {
                let a1 = read64(image, stack, context, taken[1], index, Opcode::Call)?;
                let a0 = read32(image, stack, context, taken[0], index, Opcode::Call)?;
                let f: extern "C" fn(*mut u8, u64, u32) = unsafe { std::mem::transmute(fn_ptr) };
                f(ctx_ptr, a1, a0);
            } else {
                let a1 = read32(image, stack, context, taken[1], index, Opcode::Call)?;
                let a0 = read32(image, stack, context, taken[0], index, Opcode::Call)?;
                let f: extern "C" fn(*mut u8, u32, u32) = unsafe { std::mem::transmute(fn_ptr) };
                f(ctx_ptr, a1, a0);
            }
        }

        _ => return Err(PanicReason::UnknownCallSignature { index, signature }),
    }

    params.drain(..n as usize);
    Ok(())
}
