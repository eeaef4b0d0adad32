//! The high-level IR statement model the [`crate::emitter::Emitter`] consumes.
//!
//! This is the external-collaborator contract made concrete: in the
//! surrounding JIT, an IR builder produces a [`Vec<Statement>`] and hands it
//! to the emitter. This crate does not implement that builder — it only
//! defines the shape of its output, so the emitter can be exercised and
//! tested without a separate front end.

use crate::opcode::{Cond, Opcode, SymbolTag};

/// A block identifier used to correlate `LABEL` definitions with `JMP`/`CONDJMP`
/// references to them.
pub type BlockId = u32;

/// The statement-level operation set: every runtime [`Opcode`] plus the two
/// emitter-only synthetic operations that never reach an encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtOp {
    /// A real opcode, encoded as-is.
    Op(Opcode),
    /// Defines a jump target at the current position; emits nothing.
    Label,
    /// Assigns a destination operand to the immediately preceding `CALL`;
    /// emits nothing new.
    RetVal,
}

impl From<Opcode> for StmtOp {
    fn from(op: Opcode) -> Self {
        StmtOp::Op(op)
    }
}

/// A symbol reference: names a symbol of some type and carries the value(s)
/// needed to encode an operand for it. The statement's producer owns the
/// backing storage this was derived from; the emitter only reads these
/// fields once, at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolRef {
    pub tag: Option<SymbolTag>,
    /// Low 32 bits of a constant, or the context/register byte offset.
    pub value_low: u32,
    /// High 32 bits of a 64-bit or pointer-sized constant.
    pub value_high: u32,
    /// Byte offset on the private stack, for `TMP`/`TMP64`/`TMP_REF`.
    pub stack_location: u32,
}

impl SymbolRef {
    /// No symbol reference — used for an absent `dst`/`src1`/`src2`.
    pub const NONE: SymbolRef = SymbolRef {
        tag: None,
        value_low: 0,
        value_high: 0,
        stack_location: 0,
    };

    pub const fn rel(offset: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Rel),
            value_low: offset,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn rel64(offset: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Rel64),
            value_low: offset,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn rel128(offset: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Rel128),
            value_low: offset,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn rel_ref(offset: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::RelRef),
            value_low: offset,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn tmp(stack_location: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Tmp),
            value_low: 0,
            value_high: 0,
            stack_location,
        }
    }

    pub const fn tmp64(stack_location: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Tmp64),
            value_low: 0,
            value_high: 0,
            stack_location,
        }
    }

    pub const fn tmp_ref(stack_location: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::TmpRef),
            value_low: 0,
            value_high: 0,
            stack_location,
        }
    }

    pub const fn cst(value: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Cst),
            value_low: value,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn cst64(low: u32, high: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Cst64),
            value_low: low,
            value_high: high,
            stack_location: 0,
        }
    }

    pub const fn cst_ptr(low: u32, high: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::CstPtr),
            value_low: low,
            value_high: high,
            stack_location: 0,
        }
    }

    pub const fn context() -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Context),
            value_low: 0,
            value_high: 0,
            stack_location: 0,
        }
    }

    pub const fn register(id: u32) -> Self {
        SymbolRef {
            tag: Some(SymbolTag::Register),
            value_low: id,
            value_high: 0,
            stack_location: 0,
        }
    }
}

/// One entry of the high-level statement stream the emitter consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statement {
    pub op: StmtOp,
    pub dst: SymbolRef,
    pub src1: SymbolRef,
    pub src2: SymbolRef,
    pub jmp_condition: Option<Cond>,
    pub jmp_block: BlockId,
}

impl Statement {
    /// A three-operand statement with no jump metadata.
    pub fn new(op: impl Into<StmtOp>, dst: SymbolRef, src1: SymbolRef, src2: SymbolRef) -> Self {
        Statement {
            op: op.into(),
            dst,
            src1,
            src2,
            jmp_condition: None,
            jmp_block: 0,
        }
    }

    /// `LABEL <block>`.
    pub fn label(block: BlockId) -> Self {
        Statement {
            op: StmtOp::Label,
            dst: SymbolRef::NONE,
            src1: SymbolRef::NONE,
            src2: SymbolRef::NONE,
            jmp_condition: None,
            jmp_block: block,
        }
    }

    /// `JMP <block>`.
    pub fn jmp(block: BlockId) -> Self {
        Statement {
            op: StmtOp::Op(Opcode::Jmp),
            dst: SymbolRef::NONE,
            src1: SymbolRef::NONE,
            src2: SymbolRef::NONE,
            jmp_condition: None,
            jmp_block: block,
        }
    }

    /// `CONDJMP <cond>, src1, src2, <block>`.
    pub fn cond_jmp(cond: Cond, src1: SymbolRef, src2: SymbolRef, block: BlockId) -> Self {
        Statement {
            op: StmtOp::Op(Opcode::CondJmp),
            dst: SymbolRef::NONE,
            src1,
            src2,
            jmp_condition: Some(cond),
            jmp_block: block,
        }
    }

    /// `RETVAL dst` — assigns the preceding `CALL`'s result operand.
    pub fn ret_val(dst: SymbolRef) -> Self {
        Statement {
            op: StmtOp::RetVal,
            dst,
            src1: SymbolRef::NONE,
            src2: SymbolRef::NONE,
            jmp_condition: None,
            jmp_block: 0,
        }
    }

    /// A binary arithmetic/comparison statement: `op dst, src1, src2`.
    pub fn binary(op: Opcode, dst: SymbolRef, src1: SymbolRef, src2: SymbolRef) -> Self {
        Statement::new(op, dst, src1, src2)
    }

    /// `op dst, src1, src2` with an explicit condition code (`CMP`/`CMP64`).
    pub fn compare(op: Opcode, cond: Cond, dst: SymbolRef, src1: SymbolRef, src2: SymbolRef) -> Self {
        Statement {
            op: StmtOp::Op(op),
            dst,
            src1,
            src2,
            jmp_condition: Some(cond),
            jmp_block: 0,
        }
    }

    /// `PARAM src1`.
    pub fn param(src1: SymbolRef) -> Self {
        Statement::new(Opcode::Param, SymbolRef::NONE, src1, SymbolRef::NONE)
    }

    /// `CALL dst, fn_ptr, count`.
    pub fn call(dst: SymbolRef, fn_ptr: SymbolRef, count: u32) -> Self {
        Statement::new(Opcode::Call, dst, fn_ptr, SymbolRef::cst(count))
    }
}
