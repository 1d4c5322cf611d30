//! Direct system call wrappers for page reservation
//!
//! # Safety
//!
//! All functions in this module perform FFI calls to OS primitives:
//! - **Unix**: libc functions (mmap, munmap, sysconf)
//! - **Windows**: `WinAPI` functions (`VirtualAlloc`, `VirtualFree`, `GetSystemInfo`)
//! - **Fallback**: `std::alloc` for unsupported platforms
//!
//! ## Safety Contracts
//!
//! Callers must ensure:
//! 1. **Alignment**: Sizes are multiples of the page size
//! 2. **Lifecycle**: Every reservation is released exactly once, with the
//!    length it was reserved with
//! 3. **Access**: Released memory is never touched again

use std::io;
use std::ptr::NonNull;

/// Reserve `len` bytes of fresh, zeroed, read-write pages
///
/// `len` must be a non-zero multiple of [`page_size`](super::page_size).
/// The returned address is page aligned.
pub fn reserve_pages(len: usize) -> io::Result<NonNull<u8>> {
    if len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot reserve zero pages",
        ));
    }

    #[cfg(unix)]
    {
        use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap};

        // SAFETY: FFI call to libc mmap. We pass:
        // - addr: null (OS chooses the placement)
        // - len: non-zero (checked above)
        // - PROT_READ | PROT_WRITE, MAP_PRIVATE | MAP_ANONYMOUS: no file backing
        // - fd=-1, offset=0 as required for anonymous mappings
        // The OS validates all parameters and returns MAP_FAILED on error.
        let ptr = unsafe {
            mmap(
                core::ptr::null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned null"))
    }

    #[cfg(windows)]
    {
        use winapi::um::memoryapi::VirtualAlloc;
        use winapi::um::winnt::{MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

        // SAFETY: FFI call to VirtualAlloc with a null address, a non-zero
        // length and plain commit+reserve flags. Returns null on error.
        let ptr = unsafe {
            VirtualAlloc(
                core::ptr::null_mut(),
                len,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };

        NonNull::new(ptr.cast::<u8>()).ok_or_else(io::Error::last_os_error)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let layout = std::alloc::Layout::from_size_align(len, super::page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: layout has non-zero size (checked above).
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| {
            io::Error::new(io::ErrorKind::OutOfMemory, "page reservation failed")
        })
    }
}

/// Release pages obtained from [`reserve_pages`]
///
/// # Safety
///
/// - `ptr` must have been returned by `reserve_pages(len)` with the same `len`
/// - The range must not be accessed after this call
/// - Must not be called more than once for the same reservation
pub unsafe fn release_pages(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: FFI call to munmap. Caller guarantees ptr/len came from mmap.
        let result = unsafe { libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len) };
        if result == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::memoryapi::VirtualFree;
        use winapi::um::winnt::MEM_RELEASE;

        let _ = len; // MEM_RELEASE requires size 0 and frees the whole reservation

        // SAFETY: FFI call to VirtualFree. Caller guarantees ptr came from VirtualAlloc.
        let result = unsafe { VirtualFree(ptr.as_ptr().cast::<winapi::ctypes::c_void>(), 0, MEM_RELEASE) };
        if result == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let layout = std::alloc::Layout::from_size_align(len, super::page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: caller guarantees ptr/len match a prior reserve_pages call,
        // which used this exact layout.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
        Ok(())
    }
}

/// Ask the OS for its page size
pub(super) fn query_page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            super::DEFAULT_PAGE_SIZE
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

        // SAFETY: SYSTEM_INFO is plain old data; GetSystemInfo fully initializes it.
        let mut info: SYSTEM_INFO = unsafe { core::mem::zeroed() };
        unsafe { GetSystemInfo(&raw mut info) };
        info.dwPageSize as usize
    }

    #[cfg(not(any(unix, windows)))]
    {
        super::DEFAULT_PAGE_SIZE
    }
}
