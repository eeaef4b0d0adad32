//! Error taxonomy for emission, image decoding and execution.
//!
//! Emission and decode errors are ordinary, recoverable [`Result`] values: the
//! statement stream or the bytecode image may come from an upstream producer
//! this crate does not control. Execution errors ([`PanicReason`]) are a
//! different story — by the time bytecode is running, every operand tag and
//! opcode has already been validated by construction, so hitting one of these
//! means the emitter (or the caller wiring up an [`crate::Image`] by hand) has
//! a bug. [`crate::interpreter::Interpreter::execute`] turns them into a panic
//! rather than propagating them.

use thiserror::Error;

use crate::opcode::{Opcode, SymbolTag};

/// Failures that can occur while serialising a statement list into bytecode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// A `JMP`/`CONDJMP` referenced a block that no `LABEL` statement ever defined.
    #[error("jump references undefined label block {0}")]
    UndefinedLabel(u32),
    /// `RETVAL` appeared without an immediately preceding `CALL` instruction.
    #[error("RETVAL statement at index {0} is not preceded by a CALL")]
    DanglingRetval(usize),
    /// The label fixup pass found a `JMP`/`CONDJMP` whose `dst` was already
    /// nonzero before patching — this indicates a bug in the emitter itself,
    /// not in the input statement list, but it is still surfaced rather than
    /// silently overwritten.
    #[error("instruction {0} already had a resolved jump target before fixup")]
    AlreadyPatched(usize),
    /// A symbol reference named a tag the emitter does not know how to encode.
    #[error("unknown symbol type tag {0:#x}")]
    UnknownSymbolType(u32),
    /// An I/O error from the underlying [`crate::stream::ByteSink`].
    #[error("I/O error writing bytecode image: {0}")]
    Io(String),
}

impl From<std::io::Error> for EmitError {
    fn from(err: std::io::Error) -> Self {
        EmitError::Io(err.to_string())
    }
}

/// Failures that can occur while parsing a serialized bytecode image.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The byte stream ended before the expected field could be read.
    #[error("unexpected end of stream while reading {0}")]
    Truncated(&'static str),
    /// The raw opcode value in an instruction word does not name a known opcode.
    #[error("unknown opcode {0:#06x} at instruction {1}")]
    UnknownOpcode(u16, usize),
    /// The raw tag value in an operand's upper 16 bits does not name a known symbol tag.
    #[error("unknown symbol tag {0:#06x} at instruction {1}")]
    UnknownSymbolTag(u16, usize),
    /// The raw condition-code value does not name a known condition.
    #[error("unknown condition code {0:#x} at instruction {1}")]
    UnknownCondition(u8, usize),
    /// An I/O error from the underlying [`crate::stream::ByteSource`].
    #[error("I/O error reading bytecode image: {0}")]
    Io(#[from] std::io::Error),
}

/// The reason an instruction caused the interpreter to abort.
///
/// These are "bug class" failures per the crate's error handling policy: the
/// interpreter never attempts to recover from one, it surfaces a diagnostic
/// naming the opcode, instruction index and offending operand and aborts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PanicReason {
    /// An operand's symbol tag cannot supply the width the opcode requires.
    #[error("instruction {index}: opcode {opcode:?} cannot read a {width}-bit value through tag {tag:?}")]
    IllegalOperandWidth {
        index: usize,
        opcode: Opcode,
        tag: SymbolTag,
        width: u32,
    },
    /// `STOREATREF`'s `src2` tag does not select a supported store width.
    #[error("instruction {index}: STOREATREF cannot store through source tag {tag:?}")]
    UnsupportedStoreTag { index: usize, tag: SymbolTag },
    /// `CONDJMP`'s operand tag combination does not match any supported form.
    #[error("instruction {index}: CONDJMP has no supported form for src1={src1:?}, src2={src2:?}")]
    UnsupportedCondJmpForm {
        index: usize,
        src1: SymbolTag,
        src2: SymbolTag,
    },
    /// A condition code was used with an opcode that does not support it.
    #[error("instruction {index}: opcode {opcode:?} does not support condition {cond:?}")]
    UnsupportedCondition {
        index: usize,
        opcode: Opcode,
        cond: crate::opcode::Cond,
    },
    /// `CALL`'s assembled signature does not match any dispatchable entry.
    #[error("instruction {index}: no foreign call matches signature {signature:#010x}")]
    UnknownCallSignature { index: usize, signature: u32 },
    /// `CALL` requested more trailing parameters than are queued.
    #[error("instruction {index}: CALL requested {requested} params but only {available} are queued")]
    ParamUnderflow {
        index: usize,
        requested: u32,
        available: usize,
    },
    /// `CALL` requested more than the maximum of three trailing parameters.
    #[error("instruction {index}: CALL requested {requested} params, maximum is 3")]
    TooManyParams { index: usize, requested: u32 },
    /// The program counter ran past the end of the instruction array without
    /// reaching a terminating opcode. Only reachable via a malformed jump
    /// target, since `execute`'s own loop condition otherwise stops cleanly.
    #[error("instruction pointer {0} is out of bounds ({1} instructions)")]
    ProgramCounterOutOfBounds(usize, usize),
    /// `CONDJMP` against a pointer compared the pointer to a nonzero constant;
    /// the contract requires the constant to be exactly zero.
    #[error("instruction {index}: CONDJMP pointer comparison requires constant 0, got {value}")]
    NonZeroPointerComparand { index: usize, value: u32 },
    /// An operand's offset fell outside the bounds of the region its tag selects.
    #[error("instruction {index}: opcode {opcode:?} operand tag {tag:?} offset {offset:#06x} is out of bounds")]
    OperandOutOfBounds {
        index: usize,
        opcode: Opcode,
        tag: SymbolTag,
        offset: u32,
    },
}
