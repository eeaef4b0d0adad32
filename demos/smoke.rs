//! Builds a small statement list by hand, emits it, disassembles the
//! result, then runs it against a scratch context and prints the outcome.
//!
//! Not part of the library surface — a standalone sanity check for anyone
//! poking at this crate from the command line.

use std::sync::Arc;

use anyhow::Context;
use irbc::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // context layout: [0..4) = a, [4..8) = b, [8..12) = result
    let statements = vec![
        Statement::binary(Opcode::Add, SymbolRef::rel(8), SymbolRef::rel(0), SymbolRef::rel(4)),
    ];

    let bytes = Emitter::emit_to_vec(&statements, 0).context("emitting bytecode")?;
    let image = Image::parse(&mut bytes.as_slice()).context("parsing bytecode image")?;

    println!("{}", Disassembly(&image));

    let mut context = [0u8; 12];
    context[0..4].copy_from_slice(&19u32.to_ne_bytes());
    context[4..8].copy_from_slice(&23u32.to_ne_bytes());

    let mut interpreter = Interpreter::new(Arc::new(image));
    interpreter.execute(&mut context);

    let result = u32::from_ne_bytes(context[8..12].try_into().unwrap());
    println!("19 + 23 = {result}");

    Ok(())
}
