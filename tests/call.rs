//! Integration coverage for the `PARAM`/`CALL` foreign-function boundary,
//! exercising each of the dispatchable call shapes against a real `extern
//! "C"` function pointer.

use std::sync::Arc;

use irbc::prelude::*;

fn ptr_operand(ptr: usize) -> SymbolRef {
    let bits = ptr as u64;
    SymbolRef::cst_ptr(bits as u32, (bits >> 32) as u32)
}

fn run(statements: &[Statement], stack_size: u32, context: &mut [u8]) {
    let bytes = Emitter::emit_to_vec(statements, stack_size).unwrap();
    let image = Arc::new(Image::parse(&mut bytes.as_slice()).unwrap());
    Interpreter::new(image).execute(context);
}

extern "C" fn native_increment(ctx: *mut u8) -> u32 {
    let value = unsafe { std::ptr::read_unaligned(ctx as *const u32) };
    value + 1
}

#[test]
fn call_void_ptr_to_u32_passes_context() {
    let statements = vec![Statement::call(SymbolRef::rel(4), ptr_operand(native_increment as usize), 0)];
    let mut context = [0u8; 8];
    context[0..4].copy_from_slice(&41u32.to_ne_bytes());
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[4..8].try_into().unwrap()), 42);
}

extern "C" fn native_square(x: u32) -> u32 {
    x * x
}

#[test]
fn call_u32_to_u32_with_constant_argument_skips_context() {
    let statements = vec![
        Statement::param(SymbolRef::cst(6)),
        Statement::call(SymbolRef::rel(0), ptr_operand(native_square as usize), 1),
    ];
    let mut context = [0u8; 4];
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[0..4].try_into().unwrap()), 36);
}

extern "C" fn native_add_with_context(ctx: *mut u8, x: u32) -> u32 {
    let base = unsafe { std::ptr::read_unaligned(ctx as *const u32) };
    base + x
}

#[test]
fn call_void_ptr_u32_to_u32_passes_context_and_live_argument() {
    let statements = vec![
        Statement::param(SymbolRef::rel(4)),
        Statement::call(SymbolRef::rel(8), ptr_operand(native_add_with_context as usize), 1),
    ];
    let mut context = [0u8; 12];
    context[0..4].copy_from_slice(&100u32.to_ne_bytes());
    context[4..8].copy_from_slice(&23u32.to_ne_bytes());
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[8..12].try_into().unwrap()), 123);
}

extern "C" fn native_store_sum(ctx: *mut u8, b: u32, a: u32) {
    unsafe { std::ptr::write_unaligned(ctx as *mut u32, a + b) };
}

#[test]
fn call_two_params_void_result_receives_reverse_queue_order() {
    // queued in order a, b; native receives (ctx, b, a) per this crate's
    // convention for the two-param void-result shape.
    let statements = vec![
        Statement::param(SymbolRef::rel(4)),
        Statement::param(SymbolRef::rel(8)),
        Statement::call(SymbolRef::NONE, ptr_operand(native_store_sum as usize), 2),
    ];
    let mut context = [0u8; 12];
    context[4..8].copy_from_slice(&10u32.to_ne_bytes());
    context[8..12].copy_from_slice(&32u32.to_ne_bytes());
    run(&statements, 0, &mut context);
    assert_eq!(u32::from_ne_bytes(context[0..4].try_into().unwrap()), 42);
}

#[test]
#[should_panic(expected = "CALL requested 2 params but only 1 are queued")]
fn call_requesting_more_params_than_queued_panics() {
    let statements = vec![
        Statement::param(SymbolRef::cst(1)),
        Statement::call(SymbolRef::rel(0), ptr_operand(native_square as usize), 2),
    ];
    let mut context = [0u8; 4];
    run(&statements, 0, &mut context);
}
