// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Error` and its subclasses (`TypeError`, `RangeError`, `ReferenceError`,
//! `SyntaxError`).

use super::{arg, constructor, method};
use crate::agent::Agent;
use crate::interpreter::{self, unwind_to_js_error};
use crate::object::{JsObject, ObjectKind};
use crate::value::{PropertyKey, Value};
use std::sync::Arc;

fn error_ctor_fn(proto_field: fn(&Agent) -> JsObject) -> crate::function::NativeFn {
    Arc::new(move |agent, _, args| {
        let proto = proto_field(agent);
        let obj = JsObject::new(ObjectKind::Error, Some(proto));
        if !matches!(arg(args, 0), Value::Undefined) {
            let msg = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
            obj.define_data_property(PropertyKey::from_str("message"), Value::string(msg), true, false, true);
        }
        if let Value::Object(opts) = arg(args, 1) {
            if let Some(cause) = opts.get_own_data(&PropertyKey::from_str("cause")) {
                obj.define_data_property(PropertyKey::from_str("cause"), cause, true, false, true);
            }
        }
        let stack = obj.get_own_string("name").unwrap_or_else(|| "Error".to_string());
        obj.define_data_property(PropertyKey::from_str("stack"), Value::string(stack), true, false, true);
        Ok(Value::Object(obj))
    })
}

pub fn install(agent: &mut Agent) {
    let error_proto = agent.realm.error_prototype.clone();
    error_proto.define_data_property(PropertyKey::from_str("name"), Value::string("Error"), true, false, true);
    error_proto.define_data_property(PropertyKey::from_str("message"), Value::string(""), true, false, true);
    method(agent, &error_proto, "toString", 0, Arc::new(|_, this, _| {
        let Value::Object(obj) = this else { return Ok(Value::string("Error")) };
        let name = obj.get_own_string("name").unwrap_or_else(|| "Error".to_string());
        let message = obj.get_own_string("message").unwrap_or_default();
        Ok(Value::string(if message.is_empty() { name } else { format!("{name}: {message}") }))
    }));
    constructor(agent, "Error", 1, &error_proto, error_ctor_fn(|a| a.realm.error_prototype.clone()));

    for (name, proto_field): (&str, fn(&Agent) -> JsObject) in [
        ("TypeError", (|a: &Agent| a.realm.type_error_prototype.clone()) as fn(&Agent) -> JsObject),
        ("RangeError", |a| a.realm.range_error_prototype.clone()),
        ("ReferenceError", |a| a.realm.reference_error_prototype.clone()),
        ("SyntaxError", |a| a.realm.syntax_error_prototype.clone()),
    ] {
        let proto = proto_field(agent);
        proto.define_data_property(PropertyKey::from_str("name"), Value::string(name), true, false, true);
        constructor(agent, name, 1, &proto, error_ctor_fn(proto_field));
    }
}
