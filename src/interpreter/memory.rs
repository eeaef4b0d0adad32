//! Tagged operand access: resolves an encoded operand to a region (context,
//! private stack, constant pool) and a width, then reads or writes the word(s)
//! at its offset.
//!
//! Two access styles live here. Most opcodes go through the bounds-checked,
//! region-typed accessors (`read32`, `write64`, ...): the tag picks the
//! region, the offset picks a word index, out-of-range offsets are a
//! [`PanicReason`] rather than undefined behaviour. `LOADFROMREF` and
//! `STOREATREF` are different — their address is a pointer *value* the IR
//! computed, not an offset into a region this crate owns, so they go through
//! the raw, unsafe `deref_*`/`store_*` functions at the bottom of the file.

use crate::error::PanicReason;
use crate::image::Image;
use crate::opcode::{Instruction, Opcode, Operand, SymbolTag};

fn tag_of(operand: Operand, index: usize) -> SymbolTag {
    // Decode failures here are bugs: operands reaching the interpreter were
    // already validated when the image was parsed.
    Instruction::operand_tag(operand, index)
        .unwrap_or_else(|e| panic!("instruction {index}: operand decode should be infallible post-parse: {e}"))
}

fn word_index(operand: Operand) -> usize {
    crate::opcode::decode_offset(operand) as usize / 4
}

pub(crate) fn read32(
    image: &Image,
    stack: &[u32],
    context: &[u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
) -> Result<u32, PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    match tag {
        SymbolTag::Rel => {
            let start = offset as usize;
            let bytes = context
                .get(start..start + 4)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            Ok(u32::from_ne_bytes(bytes.try_into().unwrap()))
        }
        SymbolTag::Tmp => stack
            .get(word_index(operand))
            .copied()
            .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset }),
        SymbolTag::Cst => image
            .constants
            .get(word_index(operand))
            .copied()
            .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset }),
        _ => Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 32 }),
    }
}

pub(crate) fn write32(
    stack: &mut [u32],
    context: &mut [u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
    value: u32,
) -> Result<(), PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    match tag {
        SymbolTag::Rel => {
            let start = offset as usize;
            let slot = context
                .get_mut(start..start + 4)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            slot.copy_from_slice(&value.to_ne_bytes());
            Ok(())
        }
        SymbolTag::Tmp => {
            let slot = stack
                .get_mut(word_index(operand))
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            *slot = value;
            Ok(())
        }
        _ => Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 32 }),
    }
}

pub(crate) fn read64(
    image: &Image,
    stack: &[u32],
    context: &[u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
) -> Result<u64, PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    let words: [u32; 2] = match tag {
        SymbolTag::Rel64 => {
            let start = offset as usize;
            let bytes = context
                .get(start..start + 8)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            [
                u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
                u32::from_ne_bytes(bytes[4..8].try_into().unwrap()),
            ]
        }
        SymbolTag::Tmp64 => {
            let i = word_index(operand);
            let lo = *stack.get(i).ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            let hi = *stack.get(i + 1).ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            [lo, hi]
        }
        SymbolTag::Cst64 => {
            let i = word_index(operand);
            let lo = *image
                .constants
                .get(i)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            let hi = *image
                .constants
                .get(i + 1)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            [lo, hi]
        }
        _ => return Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 64 }),
    };
    Ok(u64::from(words[0]) | (u64::from(words[1]) << 32))
}

pub(crate) fn write64(
    stack: &mut [u32],
    context: &mut [u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
    value: u64,
) -> Result<(), PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    let lo = value as u32;
    let hi = (value >> 32) as u32;
    match tag {
        SymbolTag::Rel64 => {
            let start = offset as usize;
            let slot = context
                .get_mut(start..start + 8)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            slot[0..4].copy_from_slice(&lo.to_ne_bytes());
            slot[4..8].copy_from_slice(&hi.to_ne_bytes());
            Ok(())
        }
        SymbolTag::Tmp64 => {
            let i = word_index(operand);
            if i + 1 >= stack.len() {
                return Err(PanicReason::OperandOutOfBounds { index, opcode, tag, offset });
            }
            stack[i] = lo;
            stack[i + 1] = hi;
            Ok(())
        }
        _ => Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 64 }),
    }
}

pub(crate) fn read128(
    context: &[u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
) -> Result<u128, PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    if tag != SymbolTag::Rel128 {
        return Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 128 });
    }
    let start = offset as usize;
    let bytes = context
        .get(start..start + 16)
        .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
    Ok(u128::from_ne_bytes(bytes.try_into().unwrap()))
}

pub(crate) fn write128(
    context: &mut [u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
    value: u128,
) -> Result<(), PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    if tag != SymbolTag::Rel128 {
        return Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 128 });
    }
    let start = offset as usize;
    let slot = context
        .get_mut(start..start + 16)
        .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
    slot.copy_from_slice(&value.to_ne_bytes());
    Ok(())
}

/// Reads a pointer-sized value out of one of the three tags that can hold
/// one: `REL_REF` (context, read-only), `TMP_REF` (stack, read-write) or
/// `CSTPTR` (constant pool, read-only).
pub(crate) fn read_ptr(
    image: &Image,
    stack: &[u32],
    context: &[u8],
    operand: Operand,
    index: usize,
    opcode: Opcode,
) -> Result<usize, PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    const PTR_BYTES: usize = std::mem::size_of::<usize>();
    match tag {
        SymbolTag::RelRef => {
            let start = offset as usize;
            let bytes = context
                .get(start..start + PTR_BYTES)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            let mut buf = [0u8; PTR_BYTES];
            buf.copy_from_slice(bytes);
            Ok(usize::from_ne_bytes(buf))
        }
        SymbolTag::TmpRef => {
            let i = word_index(operand);
            let lo = *stack.get(i).ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            let hi = *stack.get(i + 1).ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            return Ok((u64::from(lo) | (u64::from(hi) << 32)) as usize);
        }
        SymbolTag::CstPtr => {
            let i = word_index(operand);
            let lo = *image
                .constants
                .get(i)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            let hi = *image
                .constants
                .get(i + 1)
                .ok_or(PanicReason::OperandOutOfBounds { index, opcode, tag, offset })?;
            return Ok((u64::from(lo) | (u64::from(hi) << 32)) as usize);
        }
        _ => Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 64 }),
    }
}

/// Writes a pointer-sized value. Only `TMP_REF` is writable; `REL_REF` and
/// `CSTPTR` are read-only by contract.
pub(crate) fn write_ptr(
    stack: &mut [u32],
    operand: Operand,
    index: usize,
    opcode: Opcode,
    value: usize,
) -> Result<(), PanicReason> {
    let tag = tag_of(operand, index);
    let offset = crate::opcode::decode_offset(operand);
    if tag != SymbolTag::TmpRef {
        return Err(PanicReason::IllegalOperandWidth { index, opcode, tag, width: 64 });
    }
    let i = word_index(operand);
    if i + 1 >= stack.len() {
        return Err(PanicReason::OperandOutOfBounds { index, opcode, tag, offset });
    }
    let value = value as u64;
    stack[i] = value as u32;
    stack[i + 1] = (value >> 32) as u32;
    Ok(())
}

// --- Raw pointer dereference -------------------------------------------
//
// `LOADFROMREF`/`STOREATREF` follow a pointer the IR computed at runtime; it
// may point anywhere, including outside this crate's own context/stack
// buffers. Using unaligned read/write keeps a misaligned-but-otherwise-valid
// address from being undefined behaviour on top of already being an
// intentionally raw access.

pub(crate) unsafe fn deref_u16(ptr: usize) -> u16 {
    std::ptr::read_unaligned(ptr as *const u16)
}

pub(crate) unsafe fn deref_u32(ptr: usize) -> u32 {
    std::ptr::read_unaligned(ptr as *const u32)
}

pub(crate) unsafe fn deref_usize(ptr: usize) -> usize {
    std::ptr::read_unaligned(ptr as *const usize)
}

pub(crate) unsafe fn store_u16(ptr: usize, value: u16) {
    std::ptr::write_unaligned(ptr as *mut u16, value);
}

pub(crate) unsafe fn store_u32(ptr: usize, value: u32) {
    std::ptr::write_unaligned(ptr as *mut u32, value);
}

pub(crate) unsafe fn store_u64(ptr: usize, value: u64) {
    std::ptr::write_unaligned(ptr as *mut u64, value);
}

pub(crate) unsafe fn store_u128(ptr: usize, value: u128) {
    std::ptr::write_unaligned(ptr as *mut u128, value);
}

/// `LOADFROMREF`: dereference the pointer in `src1`, width chosen by `dst`'s
/// tag (32-bit for `REL`/`TMP`, pointer-sized for `TMP_REF`).
pub(crate) fn load_from_ref(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<(), PanicReason> {
    let ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::LoadFromRef)?;
    let dst_tag = tag_of(instr.dst, index);
    match dst_tag {
        SymbolTag::Rel | SymbolTag::Tmp => {
            // SAFETY: `ptr` is an address the IR computed at runtime.
            let value = unsafe { deref_u32(ptr) };
            write32(stack, context, instr.dst, index, Opcode::LoadFromRef, value)
        }
        SymbolTag::TmpRef => {
            let value = unsafe { deref_usize(ptr) };
            write_ptr(stack, instr.dst, index, Opcode::LoadFromRef, value)
        }
        tag => Err(PanicReason::UnsupportedStoreTag { index, tag }),
    }
}

/// `LOAD16FROMREF`: dereference the pointer in `src1` as an unsigned 16-bit
/// word, zero-extended into a 32-bit `dst`.
pub(crate) fn load16_from_ref(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<(), PanicReason> {
    let ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::Load16FromRef)?;
    // SAFETY: `ptr` is an address the IR computed at runtime.
    let value = unsafe { deref_u16(ptr) };
    write32(stack, context, instr.dst, index, Opcode::Load16FromRef, u32::from(value))
}

/// `STOREATREF`: dereference the pointer in `src1` and write `src2` through
/// it; width chosen by `src2`'s tag.
pub(crate) fn store_at_ref(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<(), PanicReason> {
    let ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::StoreAtRef)?;
    let src_tag = tag_of(instr.src2, index);
    match src_tag {
        SymbolTag::Rel | SymbolTag::Tmp | SymbolTag::Cst => {
            let value = read32(image, stack, context, instr.src2, index, Opcode::StoreAtRef)?;
            // SAFETY: `ptr` is an address the IR computed at runtime.
            unsafe { store_u32(ptr, value) };
            Ok(())
        }
        SymbolTag::Rel64 | SymbolTag::Tmp64 | SymbolTag::Cst64 => {
            let value = read64(image, stack, context, instr.src2, index, Opcode::StoreAtRef)?;
            unsafe { store_u64(ptr, value) };
            Ok(())
        }
        SymbolTag::Rel128 => {
            let value = read128(context, instr.src2, index, Opcode::StoreAtRef)?;
            unsafe { store_u128(ptr, value) };
            Ok(())
        }
        tag => Err(PanicReason::UnsupportedStoreTag { index, tag }),
    }
}

/// `STORE16ATREF`: dereference the pointer in `src1` and write the low 16
/// bits of a 32-bit `src2` through it.
pub(crate) fn store16_at_ref(
    image: &Image,
    stack: &mut [u32],
    context: &mut [u8],
    instr: &Instruction,
    index: usize,
) -> Result<(), PanicReason> {
    let ptr = read_ptr(image, stack, context, instr.src1, index, Opcode::Store16AtRef)?;
    let value = read32(image, stack, context, instr.src2, index, Opcode::Store16AtRef)?;
    // SAFETY: `ptr` is an address the IR computed at runtime.
    unsafe { store_u16(ptr, value as u16) };
    Ok(())
}
