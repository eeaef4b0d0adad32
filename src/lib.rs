//! Emitter and stack-machine interpreter for a JIT backend's intermediate
//! representation.
//!
//! A front end builds a [`Vec<ir::Statement>`](ir::Statement), hands it to
//! [`emitter::Emitter`] to produce a self-contained bytecode image, and an
//! [`interpreter::Interpreter`] executes that image against a caller-owned
//! context buffer. See [`prelude`] for the small set of types most callers
//! need.

pub mod disasm;
pub mod emitter;
pub mod error;
pub mod image;
pub mod interpreter;
pub mod ir;
pub mod opcode;
pub mod stream;

// Pointer-tagged operands (REL_REF/TMP_REF/CSTPTR) are packed and unpacked as
// two 32-bit halves, which only round-trips a pointer on a 64-bit host.
const _: () = assert!(std::mem::size_of::<usize>() == 8, "this crate requires a 64-bit host: pointer-tagged operands are packed as two 32-bit words");

/// Re-exports the types most callers need: build a statement list, emit it,
/// parse the image, run it.
pub mod prelude {
    pub use crate::disasm::Disassembly;
    pub use crate::emitter::Emitter;
    pub use crate::error::{DecodeError, EmitError, PanicReason};
    pub use crate::image::Image;
    pub use crate::interpreter::Interpreter;
    pub use crate::ir::{Statement, StmtOp, SymbolRef};
    pub use crate::opcode::{Cond, Opcode, SymbolTag};
}
