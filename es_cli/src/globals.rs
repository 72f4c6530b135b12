// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI-only globals (`print`, `readTextFile`) installed on top of the
//! engine's own builtins rather than baked into the engine itself.

use es_vm::object::{JsObject, ObjectKind};
use es_vm::value::Value;
use es_vm::Engine;
use std::sync::Arc;

fn native(name: &str, length: u32, f: impl Fn(&mut es_vm::Agent, Value, &[Value]) -> es_vm::JsResult<Value> + Send + Sync + 'static) -> Value {
    let data = es_vm::function::NativeFunction { name: Arc::from(name), length, func: Arc::new(f) };
    Value::Object(JsObject::new(ObjectKind::Function(es_vm::function::FunctionData::Native(data)), None))
}

pub fn install(engine: &mut Engine) {
    let print = native("print", 1, |_agent, _this, args| {
        match args.first() {
            Some(v) => println!("{}", v.to_display_string()),
            None => println!(),
        }
        Ok(Value::Undefined)
    });
    engine.set_global("print", print);

    let read_text_file = native("readTextFile", 1, |_agent, _this, args| {
        let Some(Value::String(path)) = args.first() else {
            return Err(es_vm::JsError::new(Value::string("readTextFile expects a string argument")));
        };
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Ok(Value::string(contents)),
            Err(err) => Err(es_vm::JsError::new(Value::string(err.to_string()))),
        }
    });
    engine.set_global("readTextFile", read_text_file);
}
