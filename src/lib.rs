//! Reference-counted handle registry and foreign-function trampoline.
//!
//! `natref` bridges a native API's manual-ownership value model onto a host
//! runtime with its own memory management. The host registers values in a
//! [`table::HandleTable`] and receives opaque integer handles; foreign code
//! holds, duplicates, and returns those handles across a fixed
//! [`boundary::CallBoundary`], and a [`trampoline::Trampoline`] marshals host
//! calls over it and back.
//!
//! # Ownership contract
//! Every live handle carries a refcount of at least one. `ref_value` creates
//! or reuses (by identity, NaN-aware), `acquire`/`release` pin and unpin, and
//! an entry is destroyed in the same step as the decrement that reaches zero,
//! firing any bound foreign finalizer exactly once. Handle ids are monotonic
//! and never reissued within a table instance; raw handle `0` always means
//! "none".
//!
//! Execution is single-threaded and synchronous. Reentrancy is ordinary
//! call-stack nesting: a foreign call may call back into the host before
//! returning, and each trampoline frame releases only the handles it pinned
//! itself.

pub mod boundary;
pub mod error;
pub mod handle;
pub mod table;
pub mod trampoline;
pub mod value;
