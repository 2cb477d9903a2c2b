//! Error types for kernel invocation.

/// Errors that can occur while validating or executing an ATAX call.
#[derive(Debug, thiserror::Error)]
pub enum AtaxError {
    /// One of the matrix dimensions is zero.
    #[error("invalid dimensions: nx={nx}, ny={ny} (both must be positive)")]
    ZeroDimension { nx: usize, ny: usize },

    /// `nx * ny` does not fit in `usize`.
    #[error("dimension overflow: {nx} x {ny} elements")]
    DimensionOverflow { nx: usize, ny: usize },

    /// A caller-provided buffer has the wrong length for the configured shape.
    #[error("buffer `{buffer}` has length {got}, expected {expected}")]
    LengthMismatch {
        buffer: &'static str,
        expected: usize,
        got: usize,
    },

    /// Tile size must be at least one element.
    #[error("invalid tile size {0}")]
    InvalidTileSize(usize),

    /// Worker count must be at least one when given explicitly.
    #[error("invalid thread count {0}")]
    InvalidThreadCount(usize),

    /// The worker pool for the call could not be created.
    #[error("thread pool construction failed: {0}")]
    ThreadPool(String),

    /// No accelerator is available to run an offloaded kernel.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The accelerator cannot hold the requested buffers.
    #[error("device allocation of {requested} bytes failed ({available} bytes available)")]
    AllocationFailure { requested: usize, available: usize },

    /// An offloaded kernel did not complete.
    #[error("device kernel `{kernel}` failed: {reason}")]
    LaunchFailure { kernel: &'static str, reason: String },
}

/// Coarse classification of [`AtaxError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller violated the shape or configuration contract.
    InvalidArgument,
    /// The offload target is missing or failed while running.
    DeviceUnavailable,
    /// Device memory could not be reserved.
    AllocationFailure,
    /// Host-side execution resources could not be acquired.
    Execution,
}

impl AtaxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtaxError::ZeroDimension { .. }
            | AtaxError::DimensionOverflow { .. }
            | AtaxError::LengthMismatch { .. }
            | AtaxError::InvalidTileSize(_)
            | AtaxError::InvalidThreadCount(_) => ErrorKind::InvalidArgument,
            AtaxError::DeviceUnavailable(_) | AtaxError::LaunchFailure { .. } => {
                ErrorKind::DeviceUnavailable
            }
            AtaxError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            AtaxError::ThreadPool(_) => ErrorKind::Execution,
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, AtaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            AtaxError::ZeroDimension { nx: 0, ny: 3 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            AtaxError::LengthMismatch {
                buffer: "x",
                expected: 3,
                got: 2
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            AtaxError::AllocationFailure {
                requested: 10,
                available: 4
            }
            .kind(),
            ErrorKind::AllocationFailure
        );
        assert_eq!(
            AtaxError::LaunchFailure {
                kernel: "atax_y",
                reason: "lost".into()
            }
            .kind(),
            ErrorKind::DeviceUnavailable
        );
        assert_eq!(
            AtaxError::ThreadPool("no threads".into()).kind(),
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_display_messages() {
        let err = AtaxError::LengthMismatch {
            buffer: "tmp",
            expected: 4,
            got: 5,
        };
        assert_eq!(err.to_string(), "buffer `tmp` has length 5, expected 4");
        let err = AtaxError::ZeroDimension { nx: 0, ny: 0 };
        assert_eq!(
            err.to_string(),
            "invalid dimensions: nx=0, ny=0 (both must be positive)"
        );
    }
}
