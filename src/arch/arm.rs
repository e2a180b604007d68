//! 32-bit ARM (AAPCS, ARMv7 hard-float) port. Saves r4-r11, lr and d8-d15;
//! soft-float targets are not supported by this port.

#![allow(dead_code)] // Context fields are only touched from the asm below

use std::arch::naked_asm;

/// Callee-saved CPU state. `lr` is the resume address; `bx lr` returns
/// through it once the block is reloaded.
///
/// ```text
/// struct Context {
///     sp: u32,       [reg + 0x00]
///     r4..r11,       [reg + 0x04 .. 0x20]
///     lr: u32,       [reg + 0x24]
///     d8..d15,       [reg + 0x28 .. 0x60]
/// }
/// ```
#[derive(Debug, Default)]
#[repr(C)]
pub(crate) struct Context {
    sp: u32,
    r: [u32; 8],
    lr: u32,
    d: [u64; 8],
}

/// Park the current continuation in `save` and resume `load`.
///
/// # Safety
///
/// `load` must hold a continuation parked by [`cswap`] or [`stack_call`]
/// whose stack is still intact, and it must not be resumed twice.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn cswap(save: *mut Context, load: *const Context) {
    naked_asm!(
        "mov r12, sp",
        "str r12, [r0, #0x00]",
        "str r4,  [r0, #0x04]",
        "str r5,  [r0, #0x08]",
        "str r6,  [r0, #0x0c]",
        "str r7,  [r0, #0x10]",
        "str r8,  [r0, #0x14]",
        "str r9,  [r0, #0x18]",
        "str r10, [r0, #0x1c]",
        "str r11, [r0, #0x20]",
        "str lr,  [r0, #0x24]",
        "add r12, r0, #0x28",
        "vstmia r12, {{d8-d15}}",
        "ldr r12, [r1, #0x00]",
        "mov sp, r12",
        "ldr r4,  [r1, #0x04]",
        "ldr r5,  [r1, #0x08]",
        "ldr r6,  [r1, #0x0c]",
        "ldr r7,  [r1, #0x10]",
        "ldr r8,  [r1, #0x14]",
        "ldr r9,  [r1, #0x18]",
        "ldr r10, [r1, #0x1c]",
        "ldr r11, [r1, #0x20]",
        "ldr lr,  [r1, #0x24]",
        "add r12, r1, #0x28",
        "vldmia r12, {{d8-d15}}",
        "bx lr",
    )
}

/// Resume `load`, abandoning the current stack.
///
/// # Safety
///
/// As for [`cswap`]; the abandoned stack must hold nothing the caller still
/// needs.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn cjump(load: *const Context) -> ! {
    naked_asm!(
        "ldr r12, [r0, #0x00]",
        "mov sp, r12",
        "ldr r4,  [r0, #0x04]",
        "ldr r5,  [r0, #0x08]",
        "ldr r6,  [r0, #0x0c]",
        "ldr r7,  [r0, #0x10]",
        "ldr r8,  [r0, #0x14]",
        "ldr r9,  [r0, #0x18]",
        "ldr r10, [r0, #0x1c]",
        "ldr r11, [r0, #0x20]",
        "ldr lr,  [r0, #0x24]",
        "add r12, r0, #0x28",
        "vldmia r12, {{d8-d15}}",
        "bx lr",
    )
}

/// Park the current continuation in `save`, then call `entry(arg)` on the
/// fresh stack ending at `stack_top` (aligned down to 8 per the ABI).
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
        "mov r12, sp",
        "str r12, [r0, #0x00]",
        "str r4,  [r0, #0x04]",
        "str r5,  [r0, #0x08]",
        "str r6,  [r0, #0x0c]",
        "str r7,  [r0, #0x10]",
        "str r8,  [r0, #0x14]",
        "str r9,  [r0, #0x18]",
        "str r10, [r0, #0x1c]",
        "str r11, [r0, #0x20]",
        "str lr,  [r0, #0x24]",
        "add r12, r0, #0x28",
        "vstmia r12, {{d8-d15}}",
        "bic r3, r3, #7",
        "mov sp, r3",
        "mov r0, r2",
        "blx r1",
        "udf #0",
    )
}
