//! Renders a parsed [`Image`] back into a human-readable instruction listing.
//!
//! Diagnostic-only: has no effect on emission or execution. Exists so
//! failures and `tracing` output are legible without a separate
//! disassembler tool, mirroring the teacher crate's `Display` impls on its
//! instruction and panic-reason types.

use std::fmt;

use crate::image::Image;
use crate::opcode::{decode_offset, Instruction};

/// A disassembled view over one [`Image`], implementing [`fmt::Display`].
pub struct Disassembly<'a>(pub &'a Image);

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ip, instr) in self.0.instructions.iter().enumerate() {
            writeln!(f, "{}", format_instruction(ip, instr))?;
        }
        Ok(())
    }
}

fn format_operand(operand: u32) -> String {
    if operand == 0 {
        return "-".to_string();
    }
    let tag = crate::opcode::decode_tag_raw(operand);
    format!("t{tag}:{:#06x}", decode_offset(operand))
}

fn format_instruction(ip: usize, instr: &Instruction) -> String {
    let opcode = instr
        .opcode(ip)
        .map(|op| format!("{op:?}"))
        .unwrap_or_else(|_| format!("<op {:#06x}>", instr.op & 0xFFFF));

    match instr.opcode(ip) {
        Ok(crate::opcode::Opcode::Jmp) | Ok(crate::opcode::Opcode::CondJmp) => format!(
            "{ip:>5}: {opcode:<12} -> {:#06x}  (src1={}, src2={})",
            instr.dst,
            format_operand(instr.src1),
            format_operand(instr.src2)
        ),
        _ => format!(
            "{ip:>5}: {opcode:<12} dst={}, src1={}, src2={}",
            format_operand(instr.dst),
            format_operand(instr.src1),
            format_operand(instr.src2)
        ),
    }
}
