use std::fmt;

/// Errors produced by the buffer layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An offset or length fell outside `[0, capacity]`.
    #[error("offset or length out of range: {0}")]
    OutOfRange(RangeError),

    /// A constituent was appended to a composite buffer that already contains
    /// a constituent with the same identity.
    #[error("constituent already present in composite buffer")]
    DuplicateConstituent,

    /// A constituent was appended, split, or compacted in a way that would
    /// create a write gap (an earlier constituent has no writable bytes left
    /// while a later one already does) or a read gap (the analogous
    /// condition for the read cursor).
    #[error("operation would violate composite buffer gap invariant")]
    StructuralViolation,

    /// Requested capacity would overflow `usize`.
    #[error("requested capacity overflows available address space")]
    CapacityOverflow,
}

/// Detail describing an out-of-range access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    /// The offset that was requested.
    pub requested: usize,
    /// The upper bound the offset was checked against.
    pub bound: usize,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requested {}, bound {}", self.requested, self.bound)
    }
}

impl Error {
    pub(crate) fn out_of_range(requested: usize, bound: usize) -> Self {
        Error::OutOfRange(RangeError { requested, bound })
    }
}

/// Convenience alias for buffer layer results.
pub type Result<T> = std::result::Result<T, Error>;
