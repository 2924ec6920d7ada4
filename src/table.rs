use std::collections::HashMap;

use log::{debug, trace};

use crate::{
    boundary::{CallBoundary, NativePtr},
    error::LookupError,
    handle::Handle,
    value::{IdentityKey, Value},
};

const FIRST_HANDLE_ID: u64 = 1;

/// Foreign-owned pointer and the finalizer that releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBinding {
    pub ptr: NativePtr,
    pub finalizer: NativePtr,
}

struct Entry {
    value: Value,
    ref_count: u32,
    error_flag: bool,
    native: Option<NativeBinding>,
}

/// Reference-counted registry mapping opaque integer handles to host values.
///
/// The table owns one entry per live handle plus an identity-indexed reverse
/// map, so registering an already-tracked value reuses its handle in O(1)
/// instead of allocating a duplicate. Handle ids increase monotonically and
/// are never reissued for the lifetime of a table instance; `reset` restarts
/// the cursor for full re-initialization of the bridge.
///
/// Invariants:
/// - Every entry present has `ref_count >= 1`. The entry is removed in the
///   same step as the decrement that reaches zero.
/// - Raw handle `0` never indexes an entry.
/// - The identity map points only at live entries, one slot per entry.
pub struct HandleTable {
    entries: HashMap<Handle, Entry>,
    by_identity: HashMap<IdentityKey, Handle>,
    next_id: u64,
    total_allocated: u64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    /// Creates an empty table with the allocator cursor at its initial value.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_identity: HashMap::new(),
            next_id: FIRST_HANDLE_ID,
            total_allocated: 0,
        }
    }

    /// Creates an empty table with storage pre-sized for `capacity` live
    /// handles. Behavior is otherwise identical to [`Self::new`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            by_identity: HashMap::with_capacity(capacity),
            next_id: FIRST_HANDLE_ID,
            total_allocated: 0,
        }
    }

    /// Registers `value` and returns its handle.
    ///
    /// If the value already has a live handle (identity match, NaN-aware),
    /// its refcount is incremented and the same handle returned; otherwise
    /// the next unused id is allocated with `ref_count = 1`. Never fails.
    pub fn ref_value(&mut self, value: Value) -> Handle {
        let key = IdentityKey::of(&value);
        if let Some(&handle) = self.by_identity.get(&key)
            && let Some(entry) = self.entries.get_mut(&handle)
        {
            entry.ref_count += 1;
            trace!("reuse handle {} rc={}", handle.raw(), entry.ref_count);
            return handle;
        }

        let handle = Handle(self.next_id);
        self.next_id += 1;
        self.total_allocated += 1;
        self.entries.insert(
            handle,
            Entry {
                value,
                ref_count: 1,
                error_flag: false,
                native: None,
            },
        );
        self.by_identity.insert(key, handle);
        trace!("alloc handle {} live={}", handle.raw(), self.entries.len());
        handle
    }

    /// Returns the value stored under `handle`.
    pub fn get(&self, handle: Handle) -> Result<&Value, LookupError> {
        Ok(&self.entry(handle)?.value)
    }

    /// Increments the refcount of an existing entry and returns the same
    /// handle.
    pub fn acquire(&mut self, handle: Handle) -> Result<Handle, LookupError> {
        let entry = self.entry_mut(handle)?;
        entry.ref_count += 1;
        trace!("acquire handle {} rc={}", handle.raw(), entry.ref_count);
        Ok(handle)
    }

    /// Decrements the refcount of an existing entry.
    ///
    /// When the count reaches zero the bound finalizer (if any) is invoked
    /// through `boundary` first, then the entry and its identity slot are
    /// removed. The finalizer fires exactly once per entry and must not call
    /// back into this table. A freed id is never reissued.
    pub fn release(
        &mut self,
        handle: Handle,
        boundary: &dyn CallBoundary,
    ) -> Result<(), LookupError> {
        let entry = self.entry_mut(handle)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            trace!("release handle {} rc={}", handle.raw(), entry.ref_count);
            return Ok(());
        }

        if let Some(binding) = entry.native {
            trace!("finalize handle {} ptr={}", handle.raw(), binding.ptr);
            boundary.finalize(binding.finalizer, binding.ptr);
        }
        if let Some(entry) = self.entries.remove(&handle) {
            self.by_identity.remove(&IdentityKey::of(&entry.value));
        }
        trace!("free handle {} live={}", handle.raw(), self.entries.len());
        Ok(())
    }

    /// Marks or clears `handle` as representing a thrown error value. The
    /// flag is consumed by the trampoline when unmarshaling a call result.
    pub fn set_error(&mut self, handle: Handle, flag: bool) -> Result<(), LookupError> {
        self.entry_mut(handle)?.error_flag = flag;
        Ok(())
    }

    /// Reads the thrown-error flag of `handle`.
    pub fn error(&self, handle: Handle) -> Result<bool, LookupError> {
        Ok(self.entry(handle)?.error_flag)
    }

    /// Binds a foreign-owned pointer and its finalizer to `handle` for
    /// cleanup when the refcount reaches zero. Rebinding replaces the
    /// previous binding.
    pub fn set_native_handle(
        &mut self,
        handle: Handle,
        ptr: NativePtr,
        finalizer: NativePtr,
    ) -> Result<(), LookupError> {
        self.entry_mut(handle)?.native = Some(NativeBinding { ptr, finalizer });
        Ok(())
    }

    /// Reads the native binding of `handle`, if any.
    pub fn native_handle(&self, handle: Handle) -> Result<Option<NativeBinding>, LookupError> {
        Ok(self.entry(handle)?.native)
    }

    /// Returns `true` if `handle` has a live entry.
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Reads the current refcount of `handle`.
    pub fn ref_count(&self, handle: Handle) -> Result<u32, LookupError> {
        Ok(self.entry(handle)?.ref_count)
    }

    /// Number of live entries.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Total handles allocated over this table's lifetime, across resets.
    pub fn total_allocated(&self) -> u64 {
        self.total_allocated
    }

    /// Destroys all entries and restarts the allocator cursor, so the next
    /// `ref_value` yields id `1` again.
    ///
    /// Finalizers are not run: a reset models whole-engine teardown, where
    /// the foreign heap disappears together with the table. Never fails.
    pub fn reset(&mut self) {
        debug!("reset: dropping {} live handles", self.entries.len());
        self.entries.clear();
        self.by_identity.clear();
        self.next_id = FIRST_HANDLE_ID;
    }

    fn entry(&self, handle: Handle) -> Result<&Entry, LookupError> {
        self.entries.get(&handle).ok_or(LookupError { handle })
    }

    fn entry_mut(&mut self, handle: Handle) -> Result<&mut Entry, LookupError> {
        self.entries.get_mut(&handle).ok_or(LookupError { handle })
    }
}
