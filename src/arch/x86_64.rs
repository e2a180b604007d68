//! x86-64 System V port.

#![allow(dead_code)] // Context fields are only touched from the asm below

use std::arch::naked_asm;

/// Callee-saved CPU state.
///
/// The stack pointer is saved while it still points at the return address
/// the caller's `call` pushed, so restoring the context and executing `ret`
/// resumes right after the original call site.
///
/// ```text
/// struct Context {
///     rsp: u64,  [reg + 0x00]
///     r15: u64,  [reg + 0x08]
///     r14: u64,  [reg + 0x10]
///     r13: u64,  [reg + 0x18]
///     r12: u64,  [reg + 0x20]
///     rbx: u64,  [reg + 0x28]
///     rbp: u64,  [reg + 0x30]
/// }
/// ```
#[derive(Debug, Default)]
#[repr(C)]
pub(crate) struct Context {
    rsp: u64,
    r15: u64,
    r14: u64,
    r13: u64,
    r12: u64,
    rbx: u64,
    rbp: u64,
}

/// Park the current continuation in `save` and resume `load`.
///
/// Returns (on the original stack, registers restored) when some later
/// switch resumes `save`.
///
/// # Safety
///
/// `load` must hold a continuation parked by [`cswap`] or [`stack_call`]
/// whose stack is still intact, and it must not be resumed twice.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn cswap(save: *mut Context, load: *const Context) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], r15",
        "mov [rdi + 0x10], r14",
        "mov [rdi + 0x18], r13",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], rbx",
        "mov [rdi + 0x30], rbp",
        "mov rsp, [rsi + 0x00]",
        "mov r15, [rsi + 0x08]",
        "mov r14, [rsi + 0x10]",
        "mov r13, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov rbx, [rsi + 0x28]",
        "mov rbp, [rsi + 0x30]",
        "ret",
    )
}

/// Resume `load`, abandoning the current stack.
///
/// # Safety
///
/// As for [`cswap`]; additionally nothing on the abandoned stack may be
/// relied on again, so the caller must be past any state it cares about.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn cjump(load: *const Context) -> ! {
    naked_asm!(
        "mov rsp, [rdi + 0x00]",
        "mov r15, [rdi + 0x08]",
        "mov r14, [rdi + 0x10]",
        "mov r13, [rdi + 0x18]",
        "mov r12, [rdi + 0x20]",
        "mov rbx, [rdi + 0x28]",
        "mov rbp, [rdi + 0x30]",
        "ret",
    )
}

/// Park the current continuation in `save`, then call `entry(arg)` on the
/// fresh downward-growing stack ending at `stack_top`.
///
/// The stack pointer is aligned down to 16 and `entry` is entered by an
/// actual `call`, giving it the rsp % 16 == 8 entry state the ABI promises.
/// `entry` must never return; the trap instruction after the call documents
/// that.
///
/// # Safety
///
/// `stack_top` must be the one-past-the-end address of a mapped region big
/// enough for everything `entry` does.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn stack_call(
    save: *mut Context,
    entry: extern "C" fn(*mut ()) -> !,
    arg: *mut (),
    stack_top: *mut u8,
) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], r15",
        "mov [rdi + 0x10], r14",
        "mov [rdi + 0x18], r13",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], rbx",
        "mov [rdi + 0x30], rbp",
        "mov rsp, rcx",
        "and rsp, -16",
        "xor ebp, ebp",
        "mov rdi, rdx",
        "call rsi",
        "int3",
    )
}
