//! `EXTERNJMP` tail-calls a native function and ends execution immediately,
//! without returning control to any later bytecode.

use std::sync::Arc;

use irbc::prelude::*;

extern "C" fn native_finish(ctx: *mut u8) {
    unsafe { std::ptr::write_unaligned(ctx as *mut u32, 0xDEAD_BEEF) };
}

#[test]
fn externjmp_runs_the_native_function_and_skips_later_instructions() {
    let ptr_bits = native_finish as usize as u64;
    let fn_ptr = SymbolRef::cst_ptr(ptr_bits as u32, (ptr_bits >> 32) as u32);

    let statements = vec![
        Statement::new(Opcode::ExternJmp, SymbolRef::NONE, fn_ptr, SymbolRef::NONE),
        // Never reached: EXTERNJMP halts execution.
        Statement::binary(Opcode::Mov, SymbolRef::rel(4), SymbolRef::cst(1), SymbolRef::NONE),
    ];
    let bytes = Emitter::emit_to_vec(&statements, 0).unwrap();
    let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
    let mut context = [0u8; 8];
    Interpreter::new(image).execute(&mut context);

    assert_eq!(u32::from_ne_bytes(context[0..4].try_into().unwrap()), 0xDEAD_BEEF);
    assert_eq!(u32::from_ne_bytes(context[4..8].try_into().unwrap()), 0, "the MOV after EXTERNJMP never runs");
}
