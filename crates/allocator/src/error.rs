//! Standalone error types for nebula-allocator
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! Running out of space inside an extent is *not* an error: every strategy
//! reports exhaustion as `Ok(None)`. Errors are reserved for precondition
//! violations caught at the allocator boundary and for failures of the
//! operating system facilities the page allocator sits on.

use core::fmt;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Types
// ============================================================================

/// Memory allocation errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Argument Errors ---
    #[error("Invalid alignment: {alignment} (must be a power of two no greater than {max})")]
    InvalidAlignment { alignment: usize, max: usize },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment ({reason})")]
    AllocationFailed {
        size: usize,
        align: usize,
        reason: String,
    },

    // --- Configuration / State Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },
}

/// Coarse classification of a [`MemoryError`]
///
/// Callers that only need to decide *how* to react (fix the call site, retry
/// elsewhere, give up) match on this instead of the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A precondition of the call was violated by the caller
    InvalidArgument,
    /// Memory could not be obtained from the backing facility
    AllocationFailed,
    /// The allocator or its configuration is not usable
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::AllocationFailed => "allocation failed",
            Self::InvalidState => "invalid state",
        };
        f.write_str(name)
    }
}

impl MemoryError {
    /// Get the coarse error kind
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAlignment { .. }
            | Self::InvalidArgument { .. }
            | Self::SizeOverflow { .. } => ErrorKind::InvalidArgument,
            Self::AllocationFailed { .. } => ErrorKind::AllocationFailed,
            Self::InvalidConfig { .. } | Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAlignment { .. } => "MEM:ALLOC:ALIGN",
            Self::InvalidArgument { .. } => "MEM:ALLOC:ARGUMENT",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::InvalidState { .. } => "MEM:SYSTEM:STATE",
        }
    }

    /// Check if error is retryable
    ///
    /// Only failures of the backing facility may succeed on a later attempt;
    /// argument errors will fail identically every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create invalid alignment error
    pub fn invalid_alignment(alignment: usize, max: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(alignment, max, "rejected allocation with invalid alignment");

        Self::InvalidAlignment { alignment, max }
    }

    /// Create invalid argument error
    pub fn invalid_argument(reason: &str) -> Self {
        Self::InvalidArgument {
            reason: reason.to_string(),
        }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &str) -> Self {
        Self::SizeOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize, reason: &str) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, reason, "memory allocation failed");

        Self::AllocationFailed {
            size,
            align,
            reason: reason.to_string(),
        }
    }

    /// Create out of memory error (a caller turned exhaustion into a failure)
    #[must_use]
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        Self::AllocationFailed {
            size,
            align,
            reason: "allocator exhausted".to_string(),
        }
    }

    /// Create allocation failed error from an OS error
    pub fn os_failure(size: usize, align: usize, err: &std::io::Error) -> Self {
        Self::allocation_failed(size, align, &format!("os reservation failed: {err}"))
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create invalid state error
    pub fn invalid_state(reason: &str) -> Self {
        Self::InvalidState {
            reason: reason.to_string(),
        }
    }

    /// Check if this is an invalid alignment error
    #[must_use]
    pub fn is_invalid_alignment(&self) -> bool {
        matches!(self, Self::InvalidAlignment { .. })
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Generic result type alias
pub type Result<T> = MemoryResult<T>;

/// Type aliases used throughout the allocator module
pub type AllocError = MemoryError;
pub type AllocResult<T> = MemoryResult<T>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_error_creation() {
        let error = MemoryError::allocation_failed(1024, 8, "mmap");
        assert!(!error.to_string().is_empty());
        assert!(error.to_string().contains("1024"));
        assert!(error.to_string().contains("mmap"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MemoryError::invalid_alignment(3, 4096).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            MemoryError::size_overflow("extent").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            MemoryError::out_of_memory(64, 8).kind(),
            ErrorKind::AllocationFailed
        );
        assert_eq!(
            MemoryError::invalid_config("min_split").kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(MemoryError::out_of_memory(1024, 8).code(), "MEM:ALLOC:FAILED");
        assert_eq!(MemoryError::invalid_alignment(6, 64).code(), "MEM:ALLOC:ALIGN");
        assert_eq!(MemoryError::invalid_state("x").code(), "MEM:SYSTEM:STATE");
    }

    #[test]
    fn test_os_failure_keeps_os_message() {
        let os = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no pages left");
        let error = MemoryError::os_failure(8192, 4096, &os);
        assert_eq!(error.kind(), ErrorKind::AllocationFailed);
        assert!(error.to_string().contains("no pages left"));
    }

    #[test]
    fn test_retryable() {
        assert!(MemoryError::out_of_memory(64, 8).is_retryable());
        assert!(!MemoryError::invalid_alignment(8, 4).is_retryable());
        assert!(MemoryError::invalid_alignment(8, 4).is_invalid_alignment());
    }
}
