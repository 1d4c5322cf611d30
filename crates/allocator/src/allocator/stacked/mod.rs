//! A stacked allocator for LIFO (Last In, First Out) memory management.
//!
//! Supports markers for scoped deallocation.
//!
//! ## Modules
//! - `allocator` - Main `StackedAllocator` implementation with LIFO semantics
//! - `config` - Configuration variants (production, debug)
//! - `frame` - RAII helper for automatic rewinding
//! - `marker` - Position markers for scoped deallocation
pub mod allocator;
pub mod config;
pub mod frame;
pub mod marker;
pub use allocator::StackedAllocator;
pub use config::StackedConfig;
pub use frame::StackFrame;
pub use marker::StackMarker;
