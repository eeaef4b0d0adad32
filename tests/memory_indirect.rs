//! Integration coverage for indirect memory access: `ADDREF`,
//! `LOADFROMREF`/`LOAD16FROMREF`, `STOREATREF`/`STORE16ATREF`.
//!
//! These opcodes dereference pointers the IR computed at runtime, so the
//! tests build a real pointer into the context buffer itself before
//! running, rather than relying on any address the emitter could know
//! ahead of time.

use std::sync::Arc;

use irbc::prelude::*;

fn run(statements: &[Statement], stack_size: u32, context: &mut [u8]) {
    let bytes = Emitter::emit_to_vec(statements, stack_size).unwrap();
    let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
    Interpreter::new(image).execute(context);
}

#[test]
fn load_from_ref_dereferences_a_context_pointer() {
    // context[0..8) holds a pointer to context[16..20); LOADFROMREF reads
    // through it into context[20..24).
    let mut context = [0u8; 24];
    let target = context.as_ptr() as u64 + 16;
    context[0..8].copy_from_slice(&target.to_ne_bytes());
    context[16..20].copy_from_slice(&777u32.to_ne_bytes());

    let statements = vec![Statement::new(
        Opcode::LoadFromRef,
        SymbolRef::rel(20),
        SymbolRef::rel_ref(0),
        SymbolRef::NONE,
    )];
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[20..24].try_into().unwrap()), 777);
}

#[test]
fn store_at_ref_writes_through_a_context_pointer() {
    let mut context = [0u8; 20];
    let target = context.as_ptr() as u64 + 16;
    context[0..8].copy_from_slice(&target.to_ne_bytes());

    let statements = vec![Statement::new(
        Opcode::StoreAtRef,
        SymbolRef::NONE,
        SymbolRef::rel_ref(0),
        SymbolRef::cst(555),
    )];
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[16..20].try_into().unwrap()), 555);
}

#[test]
fn store16_at_ref_writes_only_the_low_half_word() {
    let mut context = [0xFFu8; 20];
    let target = context.as_ptr() as u64 + 16;
    context[0..8].copy_from_slice(&target.to_ne_bytes());
    context[16..20].copy_from_slice(&0u32.to_ne_bytes());

    let statements = vec![Statement::new(
        Opcode::Store16AtRef,
        SymbolRef::NONE,
        SymbolRef::rel_ref(0),
        SymbolRef::cst(0xBEEF),
    )];
    run(&statements, 0, &mut context);
    assert_eq!(u16::from_ne_bytes(context[16..18].try_into().unwrap()), 0xBEEF);
}

#[test]
fn add_ref_advances_a_pointer_stored_on_the_private_stack() {
    // rel_ref(0) points at context[16..); ADDREF advances it by 4 bytes
    // into a TMP_REF slot, then LOADFROMREF reads through that.
    let mut context = [0u8; 24];
    let target = context.as_ptr() as u64 + 16;
    context[0..8].copy_from_slice(&target.to_ne_bytes());
    context[20..24].copy_from_slice(&999u32.to_ne_bytes());

    let statements = vec![
        Statement::new(Opcode::AddRef, SymbolRef::tmp_ref(0), SymbolRef::rel_ref(0), SymbolRef::cst(4)),
        Statement::new(Opcode::LoadFromRef, SymbolRef::rel(12), SymbolRef::tmp_ref(0), SymbolRef::NONE),
    ];
    run(&statements, 8, &mut context);
    assert_eq!(u32::from_ne_bytes(context[12..16].try_into().unwrap()), 999);
}
