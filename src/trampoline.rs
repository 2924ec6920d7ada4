use std::{cell::RefCell, fmt, rc::Rc};

use log::trace;

use crate::{
    boundary::{CallBoundary, NativePtr},
    error::CallError,
    handle::{Handle, RawHandle},
    table::HandleTable,
    value::Value,
};

/// Foreign function pointer wrapped as a host-callable object.
///
/// Each call pins handles for the function's own identity, the receiver, and
/// every argument, marshals the argument handles into a flat buffer, invokes
/// the call boundary, and releases everything it pinned before unmarshaling
/// the result. Handle growth per completed call is net zero whether the call
/// returns a value or a thrown error; transient churn is bounded by the
/// argument count plus three.
///
/// The table is shared through `Rc<RefCell<_>>` because foreign code may call
/// back into the host mid-invoke; no borrow of the table is held across the
/// boundary call, so nested trampoline frames cannot interfere with an outer
/// frame's bookkeeping.
pub struct Trampoline<B: CallBoundary> {
    func: NativePtr,
    table: Rc<RefCell<HandleTable>>,
    boundary: Rc<B>,
}

impl<B: CallBoundary> fmt::Debug for Trampoline<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trampoline({})", self.func)
    }
}

impl<B: CallBoundary> Trampoline<B> {
    /// Wraps the foreign function at `func` over a shared table and boundary.
    pub fn new(func: NativePtr, table: Rc<RefCell<HandleTable>>, boundary: Rc<B>) -> Self {
        Self {
            func,
            table,
            boundary,
        }
    }

    /// Returns the foreign function pointer this trampoline dispatches to.
    pub fn func(&self) -> NativePtr {
        self.func
    }

    /// Calls the foreign function with receiver `this` and `args` in call
    /// order.
    ///
    /// Returns the unmarshaled result, or `CallError::Thrown` carrying the
    /// unmarshaled error value when the foreign side set the result's error
    /// flag.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, CallError> {
        // Pin the function identity, receiver, and arguments. The borrow
        // must end before the boundary call: foreign code may reenter.
        let (func_handle, this_handle, arg_handles, buffer) = {
            let mut table = self.table.borrow_mut();
            let func_handle = table.ref_value(Value::Extern(self.func));
            let this_handle = table.ref_value(this.clone());
            let mut arg_handles = Vec::with_capacity(args.len());
            for arg in args {
                arg_handles.push(table.ref_value(arg.clone()));
            }
            let buffer: Vec<RawHandle> = arg_handles.iter().map(|h| h.raw()).collect();
            (func_handle, this_handle, arg_handles, buffer)
        };

        trace!("call func={} argc={}", self.func, buffer.len());
        let raw_result =
            self.boundary
                .invoke(self.func, func_handle.raw(), this_handle.raw(), &buffer);
        drop(buffer);

        // Unpin before touching the result so the per-call handles stay
        // balanced on every exit path below.
        {
            let mut table = self.table.borrow_mut();
            for handle in arg_handles {
                table.release(handle, self.boundary.as_ref())?;
            }
            table.release(this_handle, self.boundary.as_ref())?;
            table.release(func_handle, self.boundary.as_ref())?;
        }

        let Some(result_handle) = Handle::from_raw(raw_result) else {
            // The foreign side returned the "none" handle: nothing to
            // unmarshal or release.
            return Ok(Value::None);
        };

        let mut table = self.table.borrow_mut();
        let value = table.get(result_handle)?.clone();
        let thrown = table.error(result_handle)?;
        table.release(result_handle, self.boundary.as_ref())?;

        if thrown {
            trace!("call func={} threw", self.func);
            Err(CallError::Thrown(value))
        } else {
            Ok(value)
        }
    }
}
