//! A bounded counting loop exercising label definition, forward-patched
//! `JMP`/`CONDJMP` fixup, and many iterations of the dispatch loop.

use std::sync::Arc;

use irbc::prelude::*;

#[test]
fn counts_to_one_thousand_via_cond_jmp() {
    // context[0..4) = counter, starts at 0.
    // loop:
    //   ADD counter, counter, 1
    //   CONDJMP NE counter, 1000 -> loop
    let statements = vec![
        Statement::label(0),
        Statement::binary(Opcode::Add, SymbolRef::rel(0), SymbolRef::rel(0), SymbolRef::cst(1)),
        Statement::cond_jmp(Cond::Ne, SymbolRef::rel(0), SymbolRef::cst(1000), 0),
    ];
    let bytes = Emitter::emit_to_vec(&statements, 0).unwrap();
    let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
    let mut context = [0u8; 4];
    Interpreter::new(image).execute(&mut context);

    assert_eq!(u32::from_ne_bytes(context), 1000);
}
