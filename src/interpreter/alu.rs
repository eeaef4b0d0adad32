//! Arithmetic, bitwise and comparison opcode handlers.
//!
//! Each function reads its source operands, computes the result, and writes
//! it back through [`super::memory`]. Widths follow the opcode name: plain
//! mnemonics (`ADD`, `AND`, ...) are 32-bit, `64`-suffixed mnemonics read and
//! write 64-bit operands built from two adjacent words.

use crate::error::PanicReason;
use crate::image::Image;
use crate::opcode::{Cond, Instruction, Opcode};

use super::memory::{read32, read64, write32, write64};

fn cond_of(instr: &Instruction, index: usize) -> Cond {
    instr
        .cond(index)
        .unwrap_or_else(|e| panic!("instruction {index}: condition decode should be infallible post-parse: {e}"))
}

pub(super) fn add(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Add)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Add)?;
    write32(stack, context, instr.dst, index, Opcode::Add, a.wrapping_add(b))
}

pub(super) fn sub(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Sub)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Sub)?;
    write32(stack, context, instr.dst, index, Opcode::Sub, a.wrapping_sub(b))
}

/// `MUL`: unsigned 32x32 -> 64, written through the 64-bit accessor.
pub(super) fn mul(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Mul)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Mul)?;
    write64(stack, context, instr.dst, index, Opcode::Mul, u64::from(a) * u64::from(b))
}

/// `MULS`: signed 32x32 -> 64.
pub(super) fn muls(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::MulS)? as i32;
    let b = read32(image, stack, context, instr.src2, index, Opcode::MulS)? as i32;
    let result = i64::from(a) * i64::from(b);
    write64(stack, context, instr.dst, index, Opcode::MulS, result as u64)
}

/// `DIV`: unsigned 32/32, quotient in the low word, remainder in the high
/// word. Division by zero is not caught here; it panics with host integer
/// division semantics, matching the contract's "undefined" behavior for
/// this case.
pub(super) fn div(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Div)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Div)?;
    let (q, r) = (a / b, a % b);
    let packed = u64::from(q) | (u64::from(r) << 32);
    write64(stack, context, instr.dst, index, Opcode::Div, packed)
}

/// `DIVS`: signed 32/32, same packing as `DIV`. Division by zero panics with
/// host semantics, as `DIV` does.
pub(super) fn divs(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::DivS)? as i32;
    let b = read32(image, stack, context, instr.src2, index, Opcode::DivS)? as i32;
    let (q, r) = (a / b, a % b);
    let packed = u64::from(q as u32) | (u64::from(r as u32) << 32);
    write64(stack, context, instr.dst, index, Opcode::DivS, packed)
}

pub(super) fn and(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::And)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::And)?;
    write32(stack, context, instr.dst, index, Opcode::And, a & b)
}

pub(super) fn or(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Or)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Or)?;
    write32(stack, context, instr.dst, index, Opcode::Or, a | b)
}

pub(super) fn xor(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Xor)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Xor)?;
    write32(stack, context, instr.dst, index, Opcode::Xor, a ^ b)
}

/// `NOT`: unary, reads only `src1`.
pub(super) fn not(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Not)?;
    write32(stack, context, instr.dst, index, Opcode::Not, !a)
}

pub(super) fn and64(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read64(image, stack, context, instr.src1, index, Opcode::And64)?;
    let b = read64(image, stack, context, instr.src2, index, Opcode::And64)?;
    write64(stack, context, instr.dst, index, Opcode::And64, a & b)
}

pub(super) fn sll(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Sll)?;
    let shift = read32(image, stack, context, instr.src2, index, Opcode::Sll)? & 31;
    write32(stack, context, instr.dst, index, Opcode::Sll, a << shift)
}

pub(super) fn srl(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Srl)?;
    let shift = read32(image, stack, context, instr.src2, index, Opcode::Srl)? & 31;
    write32(stack, context, instr.dst, index, Opcode::Srl, a >> shift)
}

pub(super) fn sra(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let a = read32(image, stack, context, instr.src1, index, Opcode::Sra)? as i32;
    let shift = read32(image, stack, context, instr.src2, index, Opcode::Sra)? & 31;
    write32(stack, context, instr.dst, index, Opcode::Sra, (a >> shift) as u32)
}

/// `EXTLOW64`: low 32 bits of a 64-bit source.
pub(super) fn ext_low64(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let v = read64(image, stack, context, instr.src1, index, Opcode::ExtLow64)?;
    write32(stack, context, instr.dst, index, Opcode::ExtLow64, v as u32)
}

/// `EXTHIGH64`: high 32 bits of a 64-bit source.
pub(super) fn ext_high64(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let v = read64(image, stack, context, instr.src1, index, Opcode::ExtHigh64)?;
    write32(stack, context, instr.dst, index, Opcode::ExtHigh64, (v >> 32) as u32)
}

/// `MOV`: width follows `src1`'s tag; `dst` must accept the same width.
pub(super) fn mov(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let src_tag = Instruction::operand_tag(instr.src1, index)
        .unwrap_or_else(|e| panic!("instruction {index}: operand decode should be infallible post-parse: {e}"));
    match src_tag.width_bits() {
        32 => {
            let v = read32(image, stack, context, instr.src1, index, Opcode::Mov)?;
            write32(stack, context, instr.dst, index, Opcode::Mov, v)
        }
        64 => {
            let v = read64(image, stack, context, instr.src1, index, Opcode::Mov)?;
            write64(stack, context, instr.dst, index, Opcode::Mov, v)
        }
        width => Err(PanicReason::IllegalOperandWidth { index, opcode: Opcode::Mov, tag: src_tag, width }),
    }
}

/// `ADDREF`: pointer + unsigned byte offset, written to a `TMP_REF` slot.
pub(super) fn add_ref(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let base = super::memory::read_ptr(image, stack, context, instr.src1, index, Opcode::AddRef)?;
    let offset = read32(image, stack, context, instr.src2, index, Opcode::AddRef)?;
    super::memory::write_ptr(stack, instr.dst, index, Opcode::AddRef, base.wrapping_add(offset as usize))
}

/// `CMP`: 32-bit comparison. Supports `NE`, `LT` (signed). Other conditions
/// are fatal.
pub(super) fn cmp(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let cond = cond_of(instr, index);
    let a = read32(image, stack, context, instr.src1, index, Opcode::Cmp)?;
    let b = read32(image, stack, context, instr.src2, index, Opcode::Cmp)?;
    let result = match cond {
        Cond::Ne => a != b,
        Cond::Lt => (a as i32) < (b as i32),
        _ => return Err(PanicReason::UnsupportedCondition { index, opcode: Opcode::Cmp, cond }),
    };
    write32(stack, context, instr.dst, index, Opcode::Cmp, result as u32)
}

/// `CMP64`: 64-bit comparison. Supports `NE`, `BL` (unsigned), `LT` (signed).
pub(super) fn cmp64(image: &Image, stack: &mut [u32], context: &mut [u8], instr: &Instruction, index: usize) -> Result<(), PanicReason> {
    let cond = cond_of(instr, index);
    let a = read64(image, stack, context, instr.src1, index, Opcode::Cmp64)?;
    let b = read64(image, stack, context, instr.src2, index, Opcode::Cmp64)?;
    let result = match cond {
        Cond::Ne => a != b,
        Cond::Bl => a < b,
        Cond::Lt => (a as i64) < (b as i64),
        _ => return Err(PanicReason::UnsupportedCondition { index, opcode: Opcode::Cmp64, cond }),
    };
    write32(stack, context, instr.dst, index, Opcode::Cmp64, result as u32)
}
