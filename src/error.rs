//! Error kinds shared across the opcode engine, the part/memory model and
//! the paged-memory cache.

use core::fmt;

/// Failure kinds produced by this crate.
///
/// These map to the error kinds named in the core's error-handling design:
/// a configuration error is fatal and unrecoverable at the call site, a
/// transport error surfaces a negative return from a programmer call, a
/// verify error is a read-back mismatch after a write, and `NotSupported`
/// is returned by capability-gated operations a programmer didn't
/// implement. Readonly veto is deliberately not a variant here: it is a
/// value returned inside `Ok` (see [`crate::cache::WriteOutcome`]) so bulk
/// writers can skip and continue without matching on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Part/memory/cache geometry is inconsistent (bad offsets, a page
    /// size that isn't a power of two, an address outside a memory's
    /// declared size, ...). Not recoverable at the call site.
    Configuration,
    /// A programmer call returned failure.
    Transport,
    /// A read-back after a write did not match what was written.
    Verify,
    /// The operation requires a capability the programmer did not
    /// implement (paged I/O, page erase, ISP `cmd`).
    NotSupported,
    /// An address or field fell outside the bounds it was checked
    /// against.
    OutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Configuration => "inconsistent part/memory/cache configuration",
            Error::Transport => "programmer transport error",
            Error::Verify => "read-back verification failed",
            Error::NotSupported => "operation not supported by this programmer",
            Error::OutOfRange => "address or field out of range",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;
