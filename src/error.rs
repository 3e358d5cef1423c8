//! Error types for tilegemm operations.
//!
//! Every compute entry point reports failures through [`GemmError`] instead of
//! panicking, so a caller can tell a rejected configuration apart from a
//! missing backend or an exhausted allocator.

use thiserror::Error;

/// Errors that can occur while configuring or running a GEMM.
#[derive(Debug, Error)]
pub enum GemmError {
    /// A block configuration contained a zero tile size.
    #[error("Invalid block configuration: tile sizes must be positive (MB={mb}, NB={nb}, KB={kb})")]
    InvalidBlockConfig {
        /// Requested row-tile size.
        mb: usize,
        /// Requested column-tile size.
        nb: usize,
        /// Requested depth-tile size.
        kb: usize,
    },
    /// The dispatcher was given a name it does not know.
    #[error("Unknown implementation: {name}")]
    UnknownImplementation {
        /// The rejected implementation name.
        name: String,
    },
    /// The external backend cannot service the call.
    #[error("Backend unavailable: {backend} ({reason})")]
    BackendUnavailable {
        /// Name of the backend that was asked to run.
        backend: String,
        /// Human-readable reason.
        reason: String,
    },
    /// Memory allocation failed.
    #[error(
        "Memory allocation failed: {message} (requested {requested_size} bytes with {requested_alignment} byte alignment)"
    )]
    AllocationError {
        /// The size that was requested to be allocated.
        requested_size: usize,
        /// The alignment that was requested.
        requested_alignment: usize,
        /// Human-readable error message.
        message: String,
    },
    /// Invalid layout parameters were provided.
    #[error("Invalid memory layout: {message} (size: {size}, alignment: {alignment})")]
    LayoutError {
        /// The size parameter that caused the error.
        size: usize,
        /// The alignment parameter that caused the error.
        alignment: usize,
        /// Human-readable error message.
        message: String,
    },
    /// Input validation error (shapes, strides, buffer lengths, tolerances).
    #[error("Validation error: {message}")]
    ValidationError {
        /// Human-readable error message.
        message: String,
    },
    /// The benchmark thread pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Writing benchmark results failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tilegemm operations.
pub type Result<T> = std::result::Result<T, GemmError>;

/// Creates an allocation error.
pub fn allocation_error(size: usize, alignment: usize, message: impl Into<String>) -> GemmError {
    GemmError::AllocationError {
        requested_size: size,
        requested_alignment: alignment,
        message: message.into(),
    }
}

/// Creates a layout error.
pub fn layout_error(size: usize, alignment: usize, message: impl Into<String>) -> GemmError {
    GemmError::LayoutError {
        size,
        alignment,
        message: message.into(),
    }
}

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> GemmError {
    GemmError::ValidationError {
        message: message.into(),
    }
}

/// Creates a backend-unavailable error.
pub fn backend_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> GemmError {
    GemmError::BackendUnavailable {
        backend: backend.into(),
        reason: reason.into(),
    }
}
