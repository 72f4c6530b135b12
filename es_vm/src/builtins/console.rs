// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `console` global. Writes straight to stdout/stderr the way a real
//! host's console does -- this is user-facing program output, not an
//! engine diagnostic, so it bypasses `tracing` (reserved for the
//! interpreter's own `tracing::error!` calls on microtask/uncaught-error
//! paths in `agent.rs`).

use super::method;
use crate::agent::Agent;
use crate::object::{JsObject, ObjectKind};
use crate::value::{PropertyKey, Value};
use std::sync::Arc;

fn render_args(args: &[Value]) -> String {
    args.iter().map(Value::to_display_string).collect::<Vec<_>>().join(" ")
}

pub fn install(agent: &mut Agent) {
    let console = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
    method(agent, &console, "log", 0, Arc::new(|_, _, args| {
        println!("{}", render_args(args));
        Ok(Value::Undefined)
    }));
    method(agent, &console, "info", 0, Arc::new(|_, _, args| {
        println!("{}", render_args(args));
        Ok(Value::Undefined)
    }));
    method(agent, &console, "debug", 0, Arc::new(|_, _, args| {
        println!("{}", render_args(args));
        Ok(Value::Undefined)
    }));
    method(agent, &console, "warn", 0, Arc::new(|_, _, args| {
        eprintln!("{}", render_args(args));
        Ok(Value::Undefined)
    }));
    method(agent, &console, "error", 0, Arc::new(|_, _, args| {
        eprintln!("{}", render_args(args));
        Ok(Value::Undefined)
    }));
    agent.realm.global_object.define_data_property(PropertyKey::from_str("console"), Value::Object(console), true, false, true);
}
