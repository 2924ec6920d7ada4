use std::{fmt, rc::Rc};

use crate::boundary::NativePtr;

/// Host value tracked by the handle table.
///
/// Primitives are unboxed; strings and arrays use `Rc` so cloning a value in
/// and out of the table is O(1) and never copies payload data. `Extern` wraps
/// a foreign function pointer and is how a trampoline's own identity is
/// registered.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of value.
    None,
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string value.
    String(Rc<str>),
    /// Ordered collection of values.
    Array(Rc<Vec<Value>>),
    /// Foreign function pointer.
    Extern(NativePtr),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Array(elements) => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Extern(ptr) => write!(f, "<extern {}>", ptr),
        }
    }
}

const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0000;

/// Lookup key giving each value the identity the handle-reuse contract
/// requires.
///
/// Strings are keyed by content and arrays by allocation, matching the host's
/// strict-equality semantics. Floats are keyed by bit pattern except that
/// every NaN collapses onto one slot (so repeated `ref_value(NaN)` reuses one
/// handle) and both zero signs share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IdentityKey {
    None,
    Boolean(bool),
    Integer(i64),
    FloatBits(u64),
    String(Rc<str>),
    Array(usize),
    Extern(usize),
}

impl IdentityKey {
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::None => IdentityKey::None,
            Value::Boolean(v) => IdentityKey::Boolean(*v),
            Value::Integer(v) => IdentityKey::Integer(*v),
            Value::Float(v) => {
                let bits = if v.is_nan() {
                    CANONICAL_NAN_BITS
                } else if *v == 0.0 {
                    // +0.0; the host does not distinguish zero signs.
                    0
                } else {
                    v.to_bits()
                };
                IdentityKey::FloatBits(bits)
            }
            Value::String(v) => IdentityKey::String(Rc::clone(v)),
            Value::Array(v) => IdentityKey::Array(Rc::as_ptr(v) as *const () as usize),
            Value::Extern(ptr) => IdentityKey::Extern(ptr.addr()),
        }
    }
}
