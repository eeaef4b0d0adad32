//! The stack-machine executor: walks an [`Image`]'s instructions against a
//! caller-supplied context buffer, one opcode at a time.
//!
//! Per-opcode semantics are split across sibling modules the way the teacher
//! crate splits its own interpreter: [`alu`] for arithmetic and bitwise ops
//! and comparisons, [`memory`] for tagged operand access and the raw
//! pointer dereferences `LOADFROMREF`/`STOREATREF` need, [`flow`] for jumps,
//! and [`call`] for the `PARAM`/`CALL` foreign boundary. This module owns
//! only the dispatch loop and per-instance state.

mod alu;
mod call;
mod flow;
mod memory;

use std::sync::Arc;

use tracing::trace;

use crate::error::PanicReason;
use crate::image::Image;
use crate::opcode::{Opcode, Operand};

/// What the dispatch loop does after one instruction: advance, jump to a
/// resolved instruction index, or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    JumpTo(usize),
    Halt,
}

/// One execution instance over a shared, immutable [`Image`].
///
/// The image may be shared (via [`Arc`]) across many interpreter instances;
/// the private stack and parameter queue are per-instance, mutable state.
pub struct Interpreter {
    image: Arc<Image>,
    stack: Vec<u32>,
    params: Vec<Operand>,
}

impl Interpreter {
    /// Builds an interpreter over `image`, with a zeroed private stack sized
    /// from the image's header.
    pub fn new(image: Arc<Image>) -> Self {
        let stack = vec![0u32; image.stack_words()];
        Interpreter { image, stack, params: Vec::new() }
    }

    /// Runs `context` to completion against this interpreter's image.
    ///
    /// Aborts the process with a descriptive panic if execution hits a
    /// [`PanicReason`] — per this crate's error handling policy, those are
    /// bug-class failures: the caller handed the interpreter a malformed
    /// image or context, not a recoverable runtime condition.
    #[tracing::instrument(skip(self, context))]
    pub fn execute(&mut self, context: &mut [u8]) {
        if let Err(reason) = self.run(context) {
            panic!("bytecode execution aborted: {reason}");
        }
    }

    fn run(&mut self, context: &mut [u8]) -> Result<(), PanicReason> {
        let instrs_len = self.image.instructions.len();
        let mut ip = 0usize;

        while ip < instrs_len {
            let instr = self.image.instructions[ip];
            let opcode = instr
                .opcode(ip)
                .unwrap_or_else(|e| panic!("instruction {ip}: opcode decode should be infallible post-parse: {e}"));
            trace!(ip, ?opcode, "dispatch");

            let step = match opcode {
                Opcode::Add => alu::add(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Sub => alu::sub(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Mul => alu::mul(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::MulS => alu::muls(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Div => alu::div(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::DivS => alu::divs(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::And => alu::and(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Or => alu::or(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Xor => alu::xor(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Not => alu::not(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::And64 => alu::and64(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Sll => alu::sll(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Srl => alu::srl(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Sra => alu::sra(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::ExtLow64 => alu::ext_low64(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::ExtHigh64 => alu::ext_high64(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Mov => alu::mov(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::AddRef => alu::add_ref(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Cmp => alu::cmp(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,
                Opcode::Cmp64 => alu::cmp64(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?,

                Opcode::LoadFromRef => {
                    memory::load_from_ref(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?
                }
                Opcode::Load16FromRef => {
                    memory::load16_from_ref(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?
                }
                Opcode::StoreAtRef => {
                    memory::store_at_ref(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?
                }
                Opcode::Store16AtRef => {
                    memory::store16_at_ref(&self.image, &mut self.stack, context, &instr, ip).map(|_| Step::Continue)?
                }

                Opcode::Jmp => flow::jmp(&instr),
                Opcode::CondJmp => flow::cond_jmp(&self.image, &mut self.stack, context, &instr, ip)?,
                Opcode::ExternJmp => flow::extern_jmp(&self.image, &self.stack, context, &instr, ip)?,

                Opcode::Param => {
                    call::param(&instr, &mut self.params);
                    Step::Continue
                }
                Opcode::Call => {
                    call::call(&self.image, &mut self.stack, context, &instr, ip, &mut self.params)?;
                    Step::Continue
                }
            };

            match step {
                Step::Continue => ip += 1,
                Step::JumpTo(target) => {
                    if target >= instrs_len {
                        return Err(PanicReason::ProgramCounterOutOfBounds(target, instrs_len));
                    }
                    ip = target;
                }
                Step::Halt => return Ok(()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Emitter;
    use crate::ir::{Statement, SymbolRef};
    use crate::opcode::Cond;

    fn run(statements: &[Statement], stack_size: u32, context: &mut [u8]) -> Interpreter {
        let bytes = Emitter::emit_to_vec(statements, stack_size).unwrap();
        let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
        let mut interp = Interpreter::new(image);
        interp.execute(context);
        interp
    }

    #[test]
    fn add_writes_sum_into_context() {
        let statements = vec![Statement::binary(
            Opcode::Add,
            SymbolRef::rel(8),
            SymbolRef::rel(0),
            SymbolRef::rel(4),
        )];
        let mut context = [0u8; 12];
        context[0..4].copy_from_slice(&7u32.to_ne_bytes());
        context[4..8].copy_from_slice(&35u32.to_ne_bytes());
        run(&statements, 0, &mut context);
        assert_eq!(u32::from_ne_bytes(context[8..12].try_into().unwrap()), 42);
    }

    #[test]
    fn unsigned_divide_packs_quotient_and_remainder() {
        // DIV dst(rel64), rel(a)=17, cst(b)=5 -> quotient 3, remainder 2
        let statements = vec![Statement::binary(
            Opcode::Div,
            SymbolRef::rel64(8),
            SymbolRef::rel(0),
            SymbolRef::cst(5),
        )];
        let mut context = [0u8; 16];
        context[0..4].copy_from_slice(&17u32.to_ne_bytes());
        run(&statements, 0, &mut context);
        let lo = u32::from_ne_bytes(context[8..12].try_into().unwrap());
        let hi = u32::from_ne_bytes(context[12..16].try_into().unwrap());
        assert_eq!(lo, 3);
        assert_eq!(hi, 2);
    }

    #[test]
    fn signed_divide_with_negative_dividend() {
        // DIVS dst(rel64), cst(-17), cst(5) -> quotient -3, remainder -2
        let statements = vec![Statement::binary(
            Opcode::DivS,
            SymbolRef::rel64(0),
            SymbolRef::cst((-17i32) as u32),
            SymbolRef::cst(5),
        )];
        let mut context = [0u8; 8];
        run(&statements, 0, &mut context);
        let lo = i32::from_ne_bytes(context[0..4].try_into().unwrap());
        let hi = i32::from_ne_bytes(context[4..8].try_into().unwrap());
        assert_eq!(lo, -3);
        assert_eq!(hi, -2);
    }

    #[test]
    fn cond_jmp_ne_boundary_is_not_taken_when_equal() {
        // CMP-free boundary: CONDJMP NE, rel(0), cst(5) -> skip ahead; values equal, not taken.
        let statements = vec![
            Statement::cond_jmp(Cond::Ne, SymbolRef::rel(0), SymbolRef::cst(5), 1),
            Statement::binary(Opcode::Mov, SymbolRef::rel(4), SymbolRef::cst(111), SymbolRef::NONE),
            Statement::label(1),
            Statement::binary(Opcode::Mov, SymbolRef::rel(8), SymbolRef::cst(222), SymbolRef::NONE),
        ];
        let mut context = [0u8; 12];
        context[0..4].copy_from_slice(&5u32.to_ne_bytes());
        run(&statements, 0, &mut context);
        assert_eq!(u32::from_ne_bytes(context[4..8].try_into().unwrap()), 111, "not taken: NE branch falls through");
        assert_eq!(u32::from_ne_bytes(context[8..12].try_into().unwrap()), 222);
    }

    #[test]
    fn cond_jmp_ne_boundary_is_taken_when_different() {
        let statements = vec![
            Statement::cond_jmp(Cond::Ne, SymbolRef::rel(0), SymbolRef::cst(5), 1),
            Statement::binary(Opcode::Mov, SymbolRef::rel(4), SymbolRef::cst(111), SymbolRef::NONE),
            Statement::label(1),
            Statement::binary(Opcode::Mov, SymbolRef::rel(8), SymbolRef::cst(222), SymbolRef::NONE),
        ];
        let mut context = [0u8; 12];
        context[0..4].copy_from_slice(&6u32.to_ne_bytes());
        run(&statements, 0, &mut context);
        assert_eq!(u32::from_ne_bytes(context[4..8].try_into().unwrap()), 0, "taken: the fallthrough write is skipped");
        assert_eq!(u32::from_ne_bytes(context[8..12].try_into().unwrap()), 222);
    }

    #[test]
    fn self_loop_reenters_block_zero() {
        let statements = vec![
            Statement::label(0),
            Statement::binary(Opcode::Add, SymbolRef::rel(0), SymbolRef::rel(0), SymbolRef::cst(1)),
            Statement::jmp(0),
        ];
        let bytes = Emitter::emit_to_vec(&statements, 0).unwrap();
        let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
        let mut interp = Interpreter::new(image);
        assert_eq!(interp.image.instructions[1].dst, 0);
        // Not executed to completion here (it's an infinite loop by
        // construction); the assertion above is enough to pin the jump
        // target behaviour this test exists to document.
        let _ = &mut interp;
    }
}
