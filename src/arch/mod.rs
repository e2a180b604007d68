//! Machine-specific context switching.
//!
//! A [`Context`] is the callee-saved register block of the target ABI plus
//! the stack pointer. That is everything a cooperative switch has to carry:
//! caller-saved registers are dead across any call by definition, and every
//! switch looks like a call to the code around it.
//!
//! Three primitives, all naked functions:
//!
//! - [`stack_call`] parks the running continuation in a context slot, then
//!   installs a fresh stack and enters the task trampoline on it. It never
//!   returns by falling through; it "returns" when somebody later resumes
//!   the parked context.
//! - [`cswap`] parks the running continuation and resumes another one.
//! - [`cjump`] resumes another continuation without parking anything; used
//!   on the way out of a finished task, whose own context is dead.
//!
//! Callers get setjmp-like two-phase control flow out of these by putting
//! "first entry" work before the call and "resumed" work after it.
//!
//! There is no portable way to install a stack pointer from high-level code,
//! so each supported CPU gets its own port module.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub(crate) use x86_64::{cjump, cswap, stack_call, Context};
    } else if #[cfg(target_arch = "x86")] {
        mod x86;
        pub(crate) use x86::{cjump, cswap, stack_call, Context};
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub(crate) use aarch64::{cjump, cswap, stack_call, Context};
    } else if #[cfg(target_arch = "arm")] {
        mod arm;
        pub(crate) use arm::{cjump, cswap, stack_call, Context};
    } else {
        compile_error!("no context-switch port for this target architecture");
    }
}
