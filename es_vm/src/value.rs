// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `Value` type (C5): the tagged union every expression evaluates to.
//!
//! Object identity is `Arc<Mutex<ObjectData>>` rather than a heap-arena
//! index scheme (see DESIGN.md for the rationale). `Arc`/`Mutex`
//! rather than `Rc`/`RefCell` specifically so that a `Value` is `Send`:
//! the generator/async coroutine model (C5 concurrency) hands one running
//! thread control of the whole object graph at a time over a rendezvous
//! channel, which requires the graph to be safely movable across threads
//! even though at most one thread ever touches it concurrently.

use crate::object::JsObject;
use num_bigint::BigInt;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A `Symbol` primitive: reference-identity wrapper around an optional
/// description. Two symbols are only `===` when they're the same
/// allocation, which `Arc::ptr_eq` gives us for free.
#[derive(Debug, Clone)]
pub struct Symbol(pub Arc<SymbolData>);

#[derive(Debug)]
pub struct SymbolData {
    pub description: Option<Arc<str>>,
    id: u64,
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

impl Symbol {
    pub fn new(description: Option<Arc<str>>) -> Self {
        let id = NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed);
        Symbol(Arc::new(SymbolData { description, id }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

/// Well-known symbols, allocated once per [`crate::agent::Agent`].
#[derive(Debug, Clone)]
pub struct WellKnownSymbols {
    pub iterator: Symbol,
    pub async_iterator: Symbol,
    pub has_instance: Symbol,
    pub to_primitive: Symbol,
    pub to_string_tag: Symbol,
}

impl WellKnownSymbols {
    pub fn new() -> Self {
        WellKnownSymbols {
            iterator: Symbol::new(Some(Arc::from("Symbol.iterator"))),
            async_iterator: Symbol::new(Some(Arc::from("Symbol.asyncIterator"))),
            has_instance: Symbol::new(Some(Arc::from("Symbol.hasInstance"))),
            to_primitive: Symbol::new(Some(Arc::from("Symbol.toPrimitive"))),
            to_string_tag: Symbol::new(Some(Arc::from("Symbol.toStringTag"))),
        }
    }
}

impl Default for WellKnownSymbols {
    fn default() -> Self {
        Self::new()
    }
}

/// An object or array property key: either a string or a symbol. Integer
/// indices are represented as their canonical string form, matching
/// ordinary-object semantics without a separate index fast path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Arc<str>),
    Symbol(Symbol),
}

impl PropertyKey {
    pub fn from_str(s: &str) -> Self {
        PropertyKey::String(Arc::from(s))
    }

    pub fn from_index(i: usize) -> Self {
        PropertyKey::String(Arc::from(i.to_string()))
    }

    /// The property key is an array index per the spec's `CanonicalNumericIndexString`.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropertyKey::String(s) => s.parse::<usize>().ok().filter(|n| n.to_string() == **s),
            PropertyKey::Symbol(_) => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{s}"),
            PropertyKey::Symbol(s) => {
                write!(f, "Symbol({})", s.0.description.as_deref().unwrap_or(""))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(Arc<BigInt>),
    String(Arc<str>),
    Symbol(Symbol),
    Object(JsObject),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(o) if o.is_callable())
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(o) if o.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// `ToBoolean`.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(b) => !b.as_ref().eq(&BigInt::from(0)),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    /// `SameValueZero`, used by `===`, array `includes`, and `Map`/`Set`
    /// key comparison alike.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// A debug/console rendering; not `ToString` (which can throw and
    /// needs the agent to call `toString`/`Symbol.toPrimitive`).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(b) => format!("{b}n"),
            Value::String(s) => s.to_string(),
            Value::Symbol(s) => format!("Symbol({})", s.0.description.as_deref().unwrap_or("")),
            Value::Object(o) => o.debug_display(),
        }
    }
}

/// Renders an `f64` the way `Number.prototype.toString` would for the
/// common cases (integers, `NaN`, the infinities); true ECMA-262
/// `ToString(Number)` exponential-notation thresholds are approximated
/// via `ryu_js`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n == n.trunc() && n.abs() < 1e21 {
        return format!("{}", n as i64);
    }
    ryu_js::Buffer::new().format(n).to_string()
}
