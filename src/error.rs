use thiserror::Error;

use crate::{handle::Handle, value::Value};

/// An operation addressed a handle with no live entry.
///
/// This always signals a programming or integration defect: the handle was
/// never issued, was already released to zero, or the table was reset
/// underneath it. Operations fail fast rather than silently no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no live entry for handle {}", .handle.raw())]
pub struct LookupError {
    /// The handle that had no entry.
    pub handle: Handle,
}

/// Failure of a trampoline call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The foreign side flagged its result as a thrown value. The payload is
    /// the fully unmarshaled error value; its handle has already been
    /// released.
    #[error("foreign call threw: {0}")]
    Thrown(Value),
    /// Handle bookkeeping was corrupted mid-call.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}
