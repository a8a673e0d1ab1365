use thiserror::Error;

use crate::backend::DeviceError;

/// Crate-wide error type.
///
/// Every variant is terminal for the operation that raised it: nothing in
/// this crate retries. Partial construction leaves no usable object — the
/// caller discards and, if desired, rebuilds from scratch.
#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable or malformed input: a bad ABI descriptor line, a numeric
    /// field that does not parse, a shader binary whose byte length is not
    /// a multiple of the 4-byte word size, or a caller-supplied value that
    /// is invalid before any device work starts (a zero workgroup
    /// dimension).
    #[error("malformed input: {0}")]
    Format(String),

    /// One or more structural inconsistencies in an ABI descriptor. The
    /// list is always the complete batch found in one validation pass,
    /// never truncated to the first violation.
    #[error("ABI validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// The requested entry point does not exist in the module's ABI.
    #[error("entry point '{0}' not found")]
    EntryPointNotFound(String),

    /// The OpenCL sampler flag combination has no valid representation in
    /// the target API (unnormalized coordinates with a wrapping address
    /// mode).
    #[error("OpenCL sampler flags {0:#06x} cannot be represented by the backend")]
    UnsupportedSampler(u32),

    /// `Module::load` was called on a module that is already loaded.
    #[error("module '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// An operation that needs GPU objects was attempted before
    /// `Module::load`.
    #[error("module '{0}' has not been loaded")]
    NotLoaded(String),

    /// A bound argument does not match the kind the ABI declares at the
    /// next ordinal, or more arguments were bound than the kernel takes.
    #[error("argument {ordinal}: ABI declares {expected}, caller bound {actual}")]
    ArgumentMismatch {
        ordinal: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// Any backend failure during layout, pipeline, descriptor, or command
    /// operations. The invocation (or kernel) that raised it is abandoned.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Dispatch(err.to_string())
    }
}
