/// Identifier for a tracked entry in a [`crate::table::HandleTable`].
///
/// A `Handle` is a lightweight, copyable id referring to a reference-counted
/// entry owned by the table. Ids start at `1` and are never reissued within a
/// table instance's lifetime; the raw value `0` is reserved to mean "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) u64);

/// Wire representation of a handle crossing the call boundary.
pub type RawHandle = u64;

/// Raw handle value meaning "none/invalid" on the foreign side.
pub const NONE_HANDLE: RawHandle = 0;

impl Handle {
    /// Returns the raw id sent across the call boundary.
    pub fn raw(self) -> RawHandle {
        self.0
    }

    /// Rebuilds a handle from its wire form.
    ///
    /// Returns `None` for the reserved raw value `0`, which must never be
    /// dereferenced as a live handle.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        (raw != NONE_HANDLE).then_some(Self(raw))
    }

    #[cfg(test)]
    pub fn new_for_test(id: u64) -> Self {
        Self(id)
    }
}
