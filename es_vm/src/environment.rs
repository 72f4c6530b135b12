// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment Records (C7): the scope chain. Each function call, block,
//! and module pushes a [`Declarative`](EnvironmentKind::Declarative) or
//! [`Object`](EnvironmentKind::Object) record; `with` statements are the
//! only way user code creates an object environment directly.

use crate::error::{JsError, JsResult};
use crate::object::JsObject;
use crate::value::{PropertyKey, Value};
use ahash::AHashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Binding {
    value: Option<Value>,
    mutable: bool,
    /// `let`/`const`/class bindings exist but are in the temporal dead
    /// zone until their declaration executes.
    initialized: bool,
}

#[derive(Debug)]
enum EnvironmentKind {
    Declarative(AHashMap<Arc<str>, Binding>),
    /// Backs `with` statements and the global object: lookups/writes go
    /// through ordinary `[[Get]]`/`[[Set]]` on `bindings`.
    Object(JsObject),
}

#[derive(Debug)]
struct EnvironmentData {
    kind: EnvironmentKind,
    outer: Option<Environment>,
}

/// A scope; cheap to clone (reference semantics), matching how closures
/// capture their defining environment.
#[derive(Debug, Clone)]
pub struct Environment(Arc<Mutex<EnvironmentData>>);

impl Environment {
    pub fn new_declarative(outer: Option<Environment>) -> Self {
        Environment(Arc::new(Mutex::new(EnvironmentData {
            kind: EnvironmentKind::Declarative(AHashMap::new()),
            outer,
        })))
    }

    pub fn new_object(object: JsObject, outer: Option<Environment>) -> Self {
        Environment(Arc::new(Mutex::new(EnvironmentData {
            kind: EnvironmentKind::Object(object),
            outer,
        })))
    }

    pub fn outer(&self) -> Option<Environment> {
        self.0.lock().unwrap().outer.clone()
    }

    /// The global object backing the outermost `Object` environment, if
    /// this environment chain has one. Used for `globalThis`.
    pub fn global_object(&self) -> Option<JsObject> {
        match &self.0.lock().unwrap().kind {
            EnvironmentKind::Object(o) => Some(o.clone()),
            EnvironmentKind::Declarative(_) => self.outer().and_then(|o| o.global_object()),
        }
    }

    /// `CreateMutableBinding` + `InitializeBinding` in one step, used for
    /// `var`/function parameter bindings which are always initialized at
    /// creation.
    pub fn declare_var(&self, name: Arc<str>, value: Value) {
        let mut data = self.0.lock().unwrap();
        match &mut data.kind {
            EnvironmentKind::Declarative(map) => {
                map.insert(name, Binding { value: Some(value), mutable: true, initialized: true });
            }
            EnvironmentKind::Object(obj) => {
                obj.define_data_property(PropertyKey::String(name), value, true, true, false);
            }
        }
    }

    /// `let x;` / `const x;` -- creates the binding uninitialized (TDZ)
    /// when `value` is `None`.
    pub fn declare_lexical(&self, name: Arc<str>, mutable: bool, value: Option<Value>) {
        let mut data = self.0.lock().unwrap();
        if let EnvironmentKind::Declarative(map) = &mut data.kind {
            map.insert(name, Binding { initialized: value.is_some(), value, mutable });
        }
    }

    pub fn initialize_binding(&self, name: &str, value: Value) {
        let mut data = self.0.lock().unwrap();
        if let EnvironmentKind::Declarative(map) = &mut data.kind {
            if let Some(b) = map.get_mut(name) {
                b.value = Some(value);
                b.initialized = true;
            }
        }
    }

    pub fn has_binding(&self, name: &str) -> bool {
        match &self.0.lock().unwrap().kind {
            EnvironmentKind::Declarative(map) => map.contains_key(name),
            EnvironmentKind::Object(obj) => obj.has_own(&PropertyKey::from_str(name)),
        }
    }

    /// Resolves `name` by walking outward from this scope, returning the
    /// environment it was found in (needed so `set_mutable_binding` can
    /// write back into the right frame without re-walking).
    pub fn resolve(&self, name: &str) -> Option<Environment> {
        if self.has_binding(name) {
            Some(self.clone())
        } else {
            self.outer().and_then(|o| o.resolve(name))
        }
    }

    pub fn get_binding_value(&self, name: &str) -> JsResult<Option<Value>> {
        match &self.0.lock().unwrap().kind {
            EnvironmentKind::Declarative(map) => match map.get(name) {
                Some(b) if b.initialized => Ok(b.value.clone()),
                Some(_) => Err(JsError::new(Value::string(format!(
                    "cannot access '{name}' before initialization"
                )))),
                None => Ok(None),
            },
            EnvironmentKind::Object(obj) => Ok(obj.get_own_data(&PropertyKey::from_str(name))),
        }
    }

    pub fn set_mutable_binding(&self, name: &str, value: Value) -> JsResult<bool> {
        let mut data = self.0.lock().unwrap();
        match &mut data.kind {
            EnvironmentKind::Declarative(map) => match map.get_mut(name) {
                Some(b) if !b.initialized => Err(JsError::new(Value::string(format!(
                    "cannot access '{name}' before initialization"
                )))),
                Some(b) if !b.mutable => Err(JsError::new(Value::string(format!(
                    "Assignment to constant variable '{name}'."
                )))),
                Some(b) => {
                    b.value = Some(value);
                    Ok(true)
                }
                None => Ok(false),
            },
            EnvironmentKind::Object(obj) => {
                obj.define_data_property(PropertyKey::from_str(name), value, true, true, true);
                Ok(true)
            }
        }
    }
}
