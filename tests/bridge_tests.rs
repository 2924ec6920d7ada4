use std::cell::RefCell;
use std::rc::Rc;

use natref::boundary::{CallBoundary, NativePtr};
use natref::error::CallError;
use natref::handle::{Handle, RawHandle};
use natref::table::HandleTable;
use natref::trampoline::Trampoline;
use natref::value::Value;

fn str_value(s: &str) -> Value {
    Value::String(s.to_string().into())
}

/// Boundary with no foreign behavior at all.
struct InertBoundary;

impl CallBoundary for InertBoundary {
    fn invoke(&self, _: NativePtr, _: RawHandle, _: RawHandle, _: &[RawHandle]) -> RawHandle {
        0
    }

    fn finalize(&self, _: NativePtr, _: NativePtr) {}
}

/// Counts finalizer invocations per (finalizer, ptr) pair.
struct CountingBoundary {
    finalized: RefCell<Vec<(NativePtr, NativePtr)>>,
}

impl CallBoundary for CountingBoundary {
    fn invoke(&self, _: NativePtr, _: RawHandle, _: RawHandle, _: &[RawHandle]) -> RawHandle {
        0
    }

    fn finalize(&self, finalizer: NativePtr, ptr: NativePtr) {
        self.finalized.borrow_mut().push((finalizer, ptr));
    }
}

#[test]
fn scenario_a_string_lifecycle() {
    let boundary = InertBoundary;
    let mut table = HandleTable::new();

    let h1 = table.ref_value(str_value("x"));
    assert_eq!(table.ref_count(h1).unwrap(), 1);

    let again = table.ref_value(str_value("x"));
    assert_eq!(again, h1);
    assert_eq!(table.ref_count(h1).unwrap(), 2);

    table.release(h1, &boundary).unwrap();
    assert_eq!(table.ref_count(h1).unwrap(), 1);
    assert_eq!(table.get(h1).unwrap(), &str_value("x"));

    table.release(h1, &boundary).unwrap();
    assert!(table.get(h1).is_err());
}

#[test]
fn scenario_b_reset_restarts_allocator() {
    let mut table = HandleTable::new();
    let handles: Vec<Handle> = (0..5).map(|i| table.ref_value(Value::Integer(i))).collect();
    assert_eq!(handles.last().unwrap().raw(), 5);

    table.reset();
    assert_eq!(table.live_count(), 0);

    let h = table.ref_value(str_value("y"));
    assert_eq!(h.raw(), 1);
}

#[test]
fn native_binding_finalized_exactly_once() {
    let boundary = CountingBoundary {
        finalized: RefCell::new(Vec::new()),
    };
    let mut table = HandleTable::new();

    let h = table.ref_value(str_value("buffer"));
    table
        .set_native_handle(h, NativePtr(0x100), NativePtr(0x200))
        .unwrap();
    table.acquire(h).unwrap();
    table.acquire(h).unwrap();

    table.release(h, &boundary).unwrap();
    table.release(h, &boundary).unwrap();
    assert!(boundary.finalized.borrow().is_empty());

    table.release(h, &boundary).unwrap();
    assert_eq!(
        *boundary.finalized.borrow(),
        vec![(NativePtr(0x200), NativePtr(0x100))]
    );
    assert!(!table.contains(h));
    assert!(table.release(h, &boundary).is_err());
}

/// Inner foreign side used by the nested call: echoes back a fixed value.
struct InnerBoundary {
    table: Rc<RefCell<HandleTable>>,
}

impl CallBoundary for InnerBoundary {
    fn invoke(&self, _: NativePtr, _: RawHandle, _: RawHandle, _: &[RawHandle]) -> RawHandle {
        self.table.borrow_mut().ref_value(str_value("inner")).raw()
    }

    fn finalize(&self, _: NativePtr, _: NativePtr) {}
}

/// Outer foreign side that reenters the host mid-invoke by calling a second
/// trampoline, then returns its own result.
struct ReentrantBoundary {
    table: Rc<RefCell<HandleTable>>,
    inner: Trampoline<InnerBoundary>,
    inner_result: RefCell<Option<Value>>,
}

impl CallBoundary for ReentrantBoundary {
    fn invoke(&self, _: NativePtr, _: RawHandle, _: RawHandle, _: &[RawHandle]) -> RawHandle {
        let nested = self
            .inner
            .call(&Value::None, &[Value::Integer(41)])
            .expect("nested call completes");
        *self.inner_result.borrow_mut() = Some(nested);
        self.table.borrow_mut().ref_value(str_value("outer")).raw()
    }

    fn finalize(&self, _: NativePtr, _: NativePtr) {}
}

#[test]
fn reentrant_call_keeps_both_frames_balanced() {
    let table = Rc::new(RefCell::new(HandleTable::new()));

    let inner_boundary = Rc::new(InnerBoundary {
        table: Rc::clone(&table),
    });
    let inner = Trampoline::new(NativePtr(0x10), Rc::clone(&table), inner_boundary);

    let outer_boundary = Rc::new(ReentrantBoundary {
        table: Rc::clone(&table),
        inner,
        inner_result: RefCell::new(None),
    });
    let outer = Trampoline::new(NativePtr(0x20), Rc::clone(&table), Rc::clone(&outer_boundary));

    let result = outer
        .call(&str_value("recv"), &[Value::Integer(1), Value::Integer(2)])
        .unwrap();
    assert_eq!(result, str_value("outer"));
    assert_eq!(
        *outer_boundary.inner_result.borrow(),
        Some(str_value("inner"))
    );

    // Both the outer and the nested frame released every handle they pinned.
    assert_eq!(table.borrow().live_count(), 0);
}

#[test]
fn thrown_error_carries_unmarshaled_value() {
    struct ThrowingBoundary {
        table: Rc<RefCell<HandleTable>>,
    }

    impl CallBoundary for ThrowingBoundary {
        fn invoke(&self, _: NativePtr, _: RawHandle, _: RawHandle, _: &[RawHandle]) -> RawHandle {
            let mut table = self.table.borrow_mut();
            let h = table.ref_value(str_value("TypeError: nope"));
            table.set_error(h, true).unwrap();
            h.raw()
        }

        fn finalize(&self, _: NativePtr, _: NativePtr) {}
    }

    let table = Rc::new(RefCell::new(HandleTable::new()));
    let boundary = Rc::new(ThrowingBoundary {
        table: Rc::clone(&table),
    });
    let trampoline = Trampoline::new(NativePtr(0x30), Rc::clone(&table), boundary);

    let err = trampoline.call(&Value::None, &[]).unwrap_err();
    assert_eq!(err, CallError::Thrown(str_value("TypeError: nope")));
    assert_eq!(table.borrow().live_count(), 0);
}

#[test]
fn session_reset_between_engine_runs() {
    let boundary = InertBoundary;
    let mut table = HandleTable::new();

    let kept = table.ref_value(str_value("kept"));
    let dropped = table.ref_value(str_value("dropped"));
    table.release(dropped, &boundary).unwrap();

    table.reset();
    assert!(table.get(kept).is_err());

    // A fresh session starts over from id 1 with the same reuse semantics.
    let h1 = table.ref_value(str_value("kept"));
    assert_eq!(h1.raw(), 1);
    assert_eq!(table.ref_value(str_value("kept")), h1);
}
