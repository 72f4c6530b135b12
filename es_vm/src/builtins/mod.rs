// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The global object and intrinsic prototype catalogue (C11): everything
//! a freshly constructed [`crate::agent::Agent`] needs on `globalThis`
//! before user code runs. `create_realm` allocates the bare prototype
//! chain (no methods yet, since attaching a native function needs an
//! `Agent` to hang its `[[Prototype]]` off of); `install` is called right
//! after the agent exists to populate everything.

mod console;
mod date_regexp;
mod error_types;
mod object_array;
mod proxy_reflect;
mod string_math_json;
mod symbol_collections;
mod timers;
pub(crate) mod typed_array;

use crate::agent::{Agent, Realm};
use crate::environment::Environment;
use crate::error::JsResult;
use crate::function::{FunctionData, NativeFn, NativeFunction};
use crate::object::{JsObject, ObjectKind};
use crate::value::{PropertyKey, Value, WellKnownSymbols};
use std::sync::Arc;

pub fn create_realm() -> Realm {
    let object_prototype = JsObject::new(ObjectKind::Ordinary, None);
    let noop: NativeFn = Arc::new(|_, _, _| Ok(Value::Undefined));
    let function_prototype = JsObject::new(
        ObjectKind::Function(FunctionData::Native(NativeFunction { name: Arc::from(""), length: 0, func: noop })),
        Some(object_prototype.clone()),
    );
    let array_prototype = JsObject::new(ObjectKind::Array, Some(object_prototype.clone()));
    array_prototype.define_data_property(PropertyKey::from_str("length"), Value::Number(0.0), true, false, false);
    let string_prototype = JsObject::new(ObjectKind::StringObject(Arc::from("")), Some(object_prototype.clone()));
    let number_prototype = JsObject::new(ObjectKind::Number(0.0), Some(object_prototype.clone()));
    let boolean_prototype = JsObject::new(ObjectKind::Boolean(false), Some(object_prototype.clone()));
    let symbol_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let bigint_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let error_prototype = JsObject::new(ObjectKind::Error, Some(object_prototype.clone()));
    let type_error_prototype = JsObject::new(ObjectKind::Error, Some(error_prototype.clone()));
    let range_error_prototype = JsObject::new(ObjectKind::Error, Some(error_prototype.clone()));
    let reference_error_prototype = JsObject::new(ObjectKind::Error, Some(error_prototype.clone()));
    let syntax_error_prototype = JsObject::new(ObjectKind::Error, Some(error_prototype.clone()));
    let map_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let set_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let weak_map_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let weak_set_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let promise_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let regexp_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let date_prototype = JsObject::new(ObjectKind::Date(f64::NAN), Some(object_prototype.clone()));
    let generator_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let array_buffer_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let typed_array_prototype = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));

    let global_object = JsObject::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
    let global_env = Environment::new_object(global_object.clone(), None);

    Realm {
        global_env,
        global_object,
        object_prototype,
        function_prototype,
        array_prototype,
        string_prototype,
        number_prototype,
        boolean_prototype,
        symbol_prototype,
        bigint_prototype,
        error_prototype,
        type_error_prototype,
        range_error_prototype,
        reference_error_prototype,
        syntax_error_prototype,
        map_prototype,
        set_prototype,
        weak_map_prototype,
        weak_set_prototype,
        promise_prototype,
        regexp_prototype,
        date_prototype,
        generator_prototype,
        array_buffer_prototype,
        typed_array_prototype,
        well_known_symbols: WellKnownSymbols::new(),
    }
}

/// Populates every intrinsic prototype and `globalThis` binding. Called
/// once by `Agent::new`, after `self.realm` exists so `make_native` has
/// somewhere to hang `[[Prototype]]` off of.
pub fn install(agent: &mut Agent) {
    object_array::install(agent);
    string_math_json::install(agent);
    error_types::install(agent);
    date_regexp::install(agent);
    symbol_collections::install(agent);
    proxy_reflect::install(agent);
    typed_array::install(agent);
    timers::install(agent);
    console::install(agent);

    let global = agent.realm.global_object.clone();
    global.define_data_property(PropertyKey::from_str("undefined"), Value::Undefined, false, false, false);
    global.define_data_property(PropertyKey::from_str("NaN"), Value::Number(f64::NAN), false, false, false);
    global.define_data_property(PropertyKey::from_str("Infinity"), Value::Number(f64::INFINITY), false, false, false);
    global.define_data_property(PropertyKey::from_str("globalThis"), Value::Object(global.clone()), true, false, true);
}

/// Defines a non-enumerable writable-configurable native method, the
/// shape almost every prototype method on a built-in uses.
pub(crate) fn method(agent: &Agent, target: &JsObject, name: &str, length: u32, f: NativeFn) {
    let func = crate::interpreter::make_native(agent, name, length, f);
    target.define_data_property(PropertyKey::from_str(name), Value::Object(func), true, false, true);
}

pub(crate) fn value(target: &JsObject, name: &str, v: Value) {
    target.define_data_property(PropertyKey::from_str(name), v, true, false, true);
}

/// Builds a constructor function wired to `proto` in both directions
/// (`Ctor.prototype === proto`, `proto.constructor === Ctor`) and defines
/// it on `globalThis`.
pub(crate) fn constructor(agent: &Agent, name: &str, length: u32, proto: &JsObject, f: NativeFn) -> JsObject {
    let ctor = crate::interpreter::make_native(agent, name, length, f);
    ctor.define_data_property(PropertyKey::from_str("prototype"), Value::Object(proto.clone()), false, false, false);
    proto.define_data_property(PropertyKey::from_str("constructor"), Value::Object(ctor.clone()), true, false, true);
    agent.realm.global_object.define_data_property(PropertyKey::from_str(name), Value::Object(ctor.clone()), true, false, true);
    ctor
}

pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

pub(crate) type NativeResult = JsResult<Value>;
