// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordinary objects (C6): property storage plus the handful of exotic
//! internal-slot bundles (`Array`, `Function`, `Date`, ...) that change an
//! object's behavior without needing a distinct Rust type at every call
//! site -- callers match on [`ObjectKind`] to dispatch on an object's
//! internal representation.

use crate::function::FunctionData;
use crate::value::{PropertyKey, Value};
use ahash::AHashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor { value: Some(value), get: None, set: None, writable, enumerable, configurable }
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RegExpData {
    pub source: Arc<str>,
    pub flags: Arc<str>,
    pub compiled: Option<Arc<regex::Regex>>,
    pub last_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl TypedArrayKind {
    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 => 8,
        }
    }
}

#[derive(Debug)]
pub enum ObjectKind {
    Ordinary,
    Array,
    Arguments,
    Error,
    Boolean(bool),
    Number(f64),
    StringObject(Arc<str>),
    Function(FunctionData),
    Date(f64),
    RegExp(RegExpData),
    /// Insertion-ordered association list; small-N scripts don't need a
    /// hash index on top of the property map this sits beside.
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    WeakMap(Vec<(JsObject, Value)>),
    WeakSet(Vec<JsObject>),
    Promise(crate::promise::PromiseState),
    Proxy { target: JsObject, handler: JsObject },
    TypedArray { kind: TypedArrayKind, buffer: Arc<Mutex<Vec<u8>>>, byte_offset: usize, length: usize },
    ArrayBuffer(Arc<Mutex<Vec<u8>>>),
    /// A generator/async-generator instance; its coroutine handle lives
    /// here rather than on the function object, since each call to a
    /// generator function produces an independent generator.
    Generator(crate::generator::GeneratorState),
}

#[derive(Debug)]
pub struct ObjectData {
    pub prototype: Option<JsObject>,
    pub extensible: bool,
    pub properties: AHashMap<PropertyKey, PropertyDescriptor>,
    /// Preserves `for-in`/`Object.keys` enumeration order, which `AHashMap`
    /// does not guarantee on its own.
    pub key_order: Vec<PropertyKey>,
    pub kind: ObjectKind,
}

/// Reference-counted, mutex-guarded object identity. Cloning a `JsObject`
/// clones the handle, not the object -- this is what gives ECMAScript's
/// object-by-reference semantics in a tree of owned `Value`s. The mutex
/// is never actually contended (the coroutine model hands off exclusive
/// control of the whole heap at each suspension point); it exists so the
/// type is `Send` and can cross a generator's rendezvous channel.
#[derive(Debug, Clone)]
pub struct JsObject(pub Arc<Mutex<ObjectData>>);

impl JsObject {
    pub fn new(kind: ObjectKind, prototype: Option<JsObject>) -> Self {
        JsObject(Arc::new(Mutex::new(ObjectData {
            prototype,
            extensible: true,
            properties: AHashMap::new(),
            key_order: Vec::new(),
            kind,
        })))
    }

    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.0.lock().unwrap().kind, ObjectKind::Function(_))
    }

    pub fn prototype(&self) -> Option<JsObject> {
        self.0.lock().unwrap().prototype.clone()
    }

    pub fn set_prototype(&self, proto: Option<JsObject>) {
        self.0.lock().unwrap().prototype = proto;
    }

    /// `[[GetOwnProperty]]`.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.0.lock().unwrap().properties.get(key).cloned()
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.0.lock().unwrap().properties.contains_key(key)
    }

    /// Ordinary `[[Set]]`/`[[DefineOwnProperty]]` for a plain data
    /// property, bypassing existing accessors. Builtin setup and
    /// assignment to a fresh property both go through this.
    pub fn define_data_property(&self, key: PropertyKey, value: Value, writable: bool, enumerable: bool, configurable: bool) {
        let mut data = self.0.lock().unwrap();
        if !data.properties.contains_key(&key) {
            data.key_order.push(key.clone());
        }
        data.properties.insert(key, PropertyDescriptor::data(value, writable, enumerable, configurable));
    }

    pub fn define_property(&self, key: PropertyKey, desc: PropertyDescriptor) {
        let mut data = self.0.lock().unwrap();
        if !data.properties.contains_key(&key) {
            data.key_order.push(key.clone());
        }
        data.properties.insert(key, desc);
    }

    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut data = self.0.lock().unwrap();
        if let Some(desc) = data.properties.get(key) {
            if !desc.configurable {
                return false;
            }
        } else {
            return true;
        }
        data.properties.remove(key);
        data.key_order.retain(|k| k != key);
        true
    }

    pub fn is_extensible(&self) -> bool {
        self.0.lock().unwrap().extensible
    }

    pub fn prevent_extensions(&self) {
        self.0.lock().unwrap().extensible = false;
    }

    /// Ordinary `[[Get]]` for a data property only; accessor invocation
    /// needs the agent (to call the getter), so it lives on
    /// `interpreter`/abstract-operations instead.
    pub fn get_own_data(&self, key: &PropertyKey) -> Option<Value> {
        self.get_own_property(key).and_then(|d| d.value)
    }

    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.0.lock().unwrap().key_order.clone()
    }

    /// Convenience accessor for string-valued own properties, used by
    /// error formatting and other spots that don't want to route through
    /// the full `[[Get]]` abstract operation.
    pub fn get_own_string(&self, name: &str) -> Option<String> {
        let key = PropertyKey::from_str(name);
        match self.get_own_data(&key) {
            Some(Value::String(s)) => Some(s.to_string()),
            Some(Value::Number(n)) => Some(crate::value::format_number(n)),
            _ => None,
        }
    }

    pub fn debug_display(&self) -> String {
        let data = self.0.lock().unwrap();
        match &data.kind {
            ObjectKind::Function(f) => format!("[Function: {}]", f.name()),
            ObjectKind::Array => {
                let len = data
                    .properties
                    .get(&PropertyKey::from_str("length"))
                    .and_then(|d| d.value.as_ref())
                    .map(|v| v.to_display_string())
                    .unwrap_or_default();
                format!("[Array(len={len})]")
            }
            ObjectKind::Error => format!(
                "{}: {}",
                data.properties.get(&PropertyKey::from_str("name")).and_then(|d| d.value.clone()).map(|v| v.to_display_string()).unwrap_or_else(|| "Error".into()),
                data.properties.get(&PropertyKey::from_str("message")).and_then(|d| d.value.clone()).map(|v| v.to_display_string()).unwrap_or_default()
            ),
            ObjectKind::Date(t) => format!("[Date {t}]"),
            ObjectKind::RegExp(r) => format!("/{}/{}", r.source, r.flags),
            ObjectKind::Map(entries) => format!("[Map({})]", entries.len()),
            ObjectKind::Set(entries) => format!("[Set({})]", entries.len()),
            ObjectKind::Promise(_) => "[Promise]".to_string(),
            ObjectKind::Proxy { .. } => "[Proxy]".to_string(),
            ObjectKind::Generator(_) => "[Generator]".to_string(),
            _ => "[object Object]".to_string(),
        }
    }
}

impl fmt::Display for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.debug_display())
    }
}
