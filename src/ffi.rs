//! Raw bindings for the memory-mapping syscalls the runtime needs, plus the
//! [`Stack`] wrapper the scheduler actually uses.
//!
//! Task stacks are private anonymous mappings rather than heap allocations:
//! the kernel hands back zeroed pages, the region is naturally page-aligned,
//! and a reaped stack goes straight back to the OS.

use std::ffi::{c_int, c_long, c_void};
use std::io;
use std::ptr;

/// Pages may be read.
pub const PROT_READ: c_int = 0x1;
/// Pages may be written.
pub const PROT_WRITE: c_int = 0x2;

/// Updates to the mapping are not visible to other processes.
pub const MAP_PRIVATE: c_int = 0x0002;
/// The mapping is not backed by any file; contents are zero-initialized.
#[cfg(target_os = "linux")]
pub const MAP_ANONYMOUS: c_int = 0x0020;
#[cfg(target_os = "macos")]
pub const MAP_ANONYMOUS: c_int = 0x1000;

/// mmap's error return; the errno is in `io::Error::last_os_error()`.
pub const MAP_FAILED: *mut c_void = usize::MAX as *mut c_void;

#[link(name = "c")]
extern "C" {
    /// map pages of memory
    ///
    /// https://man7.org/linux/man-pages/man2/mmap.2.html
    ///
    /// #include <sys/mman.h>
    ///
    /// void *mmap(void addr[.length], size_t length, int prot, int flags,
    ///            int fd, off_t offset);
    ///
    /// With MAP_ANONYMOUS|MAP_PRIVATE and fd = -1, returns a zero-filled
    /// region of at least `length` bytes, rounded up to whole pages. On
    /// error returns MAP_FAILED and sets errno.
    fn mmap(
        addr: *mut c_void,
        length: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: c_long,
    ) -> *mut c_void;

    /// unmap pages of memory
    ///
    /// https://man7.org/linux/man-pages/man2/munmap.2.html
    ///
    /// #include <sys/mman.h>
    ///
    /// int munmap(void addr[.length], size_t length);
    ///
    /// `length` must be the length the region was mapped with. Returns 0 on
    /// success, -1 on error with errno set.
    fn munmap(addr: *mut c_void, length: usize) -> c_int;
}

/// A task's machine stack: a zero-filled, read/write, private anonymous
/// mapping, owned exclusively by its task until reap and unmapped on drop.
pub(crate) struct Stack {
    base: *mut u8,
    size: usize,
}

impl Stack {
    /// Map a fresh stack of `size` bytes.
    ///
    /// Mapping failure is fatal: a task cannot exist without its stack and
    /// there is nobody sensible to hand the error to.
    pub(crate) fn map(size: usize) -> Self {
        let base = unsafe {
            mmap(
                ptr::null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_ANONYMOUS | MAP_PRIVATE,
                -1,
                0,
            )
        };

        if base == MAP_FAILED {
            panic!(
                "failed to map a {size} byte task stack: {}",
                io::Error::last_os_error()
            );
        }

        Stack {
            base: base as *mut u8,
            size,
        }
    }

    /// One past the end of the region. Stacks grow downward, so this is the
    /// initial stack pointer.
    pub(crate) fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.size) }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let res = unsafe { munmap(self.base as *mut c_void, self.size) };

        if res < 0 {
            let err = io::Error::last_os_error();
            log::error!("error unmapping a task stack: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_stack_is_zeroed_and_writable() {
        let stack = Stack::map(16 * 4096);
        unsafe {
            let word = stack.top().sub(8) as *mut u64;
            assert_eq!(*word, 0);
            *word = 0xdead_beef;
            assert_eq!(*word, 0xdead_beef);
        }
    }
}
