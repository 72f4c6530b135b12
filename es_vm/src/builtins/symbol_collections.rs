// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Symbol`, `Map`/`Set`, and `WeakMap`/`WeakSet`.

use super::{arg, constructor, method};
use crate::agent::Agent;
use crate::interpreter::{self, strict_equals, unwind_to_js_error};
use crate::object::{JsObject, ObjectKind};
use crate::value::{PropertyKey, Symbol, Value};
use std::sync::Arc;

fn type_error(agent: &Agent, msg: &str) -> crate::error::JsError {
    interpreter::make_error(agent, &agent.realm.type_error_prototype, msg.to_string())
}

pub fn install(agent: &mut Agent) {
    install_symbol(agent);
    #[cfg(feature = "set")]
    install_map_set(agent);
    #[cfg(feature = "weak-refs")]
    install_weak(agent);
}

fn install_symbol(agent: &mut Agent) {
    let proto = agent.realm.symbol_prototype.clone();
    method(agent, &proto, "toString", 0, Arc::new(|_, this, _| {
        let Value::Symbol(s) = this else { return Ok(Value::string("Symbol()")) };
        Ok(Value::string(format!("Symbol({})", s.0.description.as_deref().unwrap_or(""))))
    }));
    let ctor_obj = crate::interpreter::make_native(agent, "Symbol", 0, Arc::new(|agent, _, args| {
        let desc = match arg(args, 0) {
            Value::Undefined => None,
            v => Some(Arc::<str>::from(interpreter::to_js_string(agent, &v).map_err(unwind_to_js_error)?)),
        };
        Ok(Value::Symbol(Symbol::new(desc)))
    }));
    let wks = agent.realm.well_known_symbols.clone();
    ctor_obj.define_data_property(PropertyKey::from_str("iterator"), Value::Symbol(wks.iterator), true, false, false);
    ctor_obj.define_data_property(PropertyKey::from_str("asyncIterator"), Value::Symbol(wks.async_iterator), true, false, false);
    ctor_obj.define_data_property(PropertyKey::from_str("hasInstance"), Value::Symbol(wks.has_instance), true, false, false);
    ctor_obj.define_data_property(PropertyKey::from_str("toPrimitive"), Value::Symbol(wks.to_primitive), true, false, false);
    ctor_obj.define_data_property(PropertyKey::from_str("toStringTag"), Value::Symbol(wks.to_string_tag), true, false, false);
    ctor_obj.define_data_property(PropertyKey::from_str("prototype"), Value::Object(proto.clone()), false, false, false);
    proto.define_data_property(PropertyKey::from_str("constructor"), Value::Object(ctor_obj.clone()), true, false, true);
    agent.realm.global_object.define_data_property(PropertyKey::from_str("Symbol"), Value::Object(ctor_obj), true, false, true);
}

fn map_entries(obj: &JsObject) -> Vec<(Value, Value)> {
    match &obj.0.lock().unwrap().kind {
        ObjectKind::Map(entries) => entries.clone(),
        _ => Vec::new(),
    }
}

fn map_find(entries: &[(Value, Value)], key: &Value) -> Option<usize> {
    entries.iter().position(|(k, _)| strict_equals(k, key))
}

#[cfg(feature = "set")]
fn install_map_set(agent: &mut Agent) {
    let map_proto = agent.realm.map_prototype.clone();
    method(agent, &map_proto, "get", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Undefined) };
        let entries = map_entries(o);
        let key = arg(args, 0);
        Ok(map_find(&entries, &key).map(|i| entries[i].1.clone()).unwrap_or(Value::Undefined))
    }));
    method(agent, &map_proto, "has", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let entries = map_entries(o);
        Ok(Value::Boolean(map_find(&entries, &arg(args, 0)).is_some()))
    }));
    method(agent, &map_proto, "set", 2, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(this) };
        let key = arg(args, 0);
        let value = arg(args, 1);
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::Map(entries) = &mut data.kind {
            match entries.iter().position(|(k, _)| strict_equals(k, &key)) {
                Some(i) => entries[i].1 = value,
                None => entries.push((key, value)),
            }
        }
        drop(data);
        Ok(this)
    }));
    method(agent, &map_proto, "delete", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let key = arg(args, 0);
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::Map(entries) = &mut data.kind {
            if let Some(i) = entries.iter().position(|(k, _)| strict_equals(k, &key)) {
                entries.remove(i);
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }));
    method(agent, &map_proto, "clear", 0, Arc::new(|_, this, _| {
        if let Value::Object(o) = &this {
            if let ObjectKind::Map(entries) = &mut o.0.lock().unwrap().kind {
                entries.clear();
            }
        }
        Ok(Value::Undefined)
    }));
    method(agent, &map_proto, "forEach", 1, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Undefined) };
        let callback = arg(args, 0);
        for (k, v) in map_entries(o) {
            interpreter::call_function(agent, &callback, Value::Undefined, &[v, k, this.clone()])?;
        }
        Ok(Value::Undefined)
    }));
    method(agent, &map_proto, "size", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = &this else { return Ok(Value::Number(0.0)) };
        Ok(Value::Number(map_entries(o).len() as f64))
    }));

    constructor(agent, "Map", 0, &map_proto, Arc::new(|agent, _, args| {
        let obj = JsObject::new(ObjectKind::Map(Vec::new()), Some(agent.realm.map_prototype.clone()));
        if !matches!(arg(args, 0), Value::Undefined | Value::Null) {
            let iterable = arg(args, 0);
            let handle = interpreter::get_iterator(agent, iterable).map_err(unwind_to_js_error)?;
            while let Some(pair) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
                let Value::Object(pair_obj) = &pair else { return Err(type_error(agent, "iterator entry is not an object")) };
                let k = pair_obj.get_own_data(&PropertyKey::from_str("0")).unwrap_or(Value::Undefined);
                let v = pair_obj.get_own_data(&PropertyKey::from_str("1")).unwrap_or(Value::Undefined);
                if let ObjectKind::Map(entries) = &mut obj.0.lock().unwrap().kind {
                    entries.push((k, v));
                }
            }
        }
        Ok(Value::Object(obj))
    }));

    let set_proto = agent.realm.set_prototype.clone();
    method(agent, &set_proto, "has", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let key = arg(args, 0);
        let found = match &o.0.lock().unwrap().kind {
            ObjectKind::Set(vals) => vals.iter().any(|v| strict_equals(v, &key)),
            _ => false,
        };
        Ok(Value::Boolean(found))
    }));
    method(agent, &set_proto, "add", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(this) };
        let value = arg(args, 0);
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::Set(vals) = &mut data.kind {
            if !vals.iter().any(|v| strict_equals(v, &value)) {
                vals.push(value);
            }
        }
        drop(data);
        Ok(this)
    }));
    method(agent, &set_proto, "delete", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let key = arg(args, 0);
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::Set(vals) = &mut data.kind {
            if let Some(i) = vals.iter().position(|v| strict_equals(v, &key)) {
                vals.remove(i);
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }));
    method(agent, &set_proto, "clear", 0, Arc::new(|_, this, _| {
        if let Value::Object(o) = &this {
            if let ObjectKind::Set(vals) = &mut o.0.lock().unwrap().kind {
                vals.clear();
            }
        }
        Ok(Value::Undefined)
    }));
    method(agent, &set_proto, "forEach", 1, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Undefined) };
        let callback = arg(args, 0);
        let vals = match &o.0.lock().unwrap().kind { ObjectKind::Set(v) => v.clone(), _ => Vec::new() };
        for v in vals {
            interpreter::call_function(agent, &callback, Value::Undefined, &[v.clone(), v, this.clone()])?;
        }
        Ok(Value::Undefined)
    }));
    method(agent, &set_proto, "size", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = &this else { return Ok(Value::Number(0.0)) };
        let n = match &o.0.lock().unwrap().kind { ObjectKind::Set(v) => v.len(), _ => 0 };
        Ok(Value::Number(n as f64))
    }));

    constructor(agent, "Set", 0, &set_proto, Arc::new(|agent, _, args| {
        let obj = JsObject::new(ObjectKind::Set(Vec::new()), Some(agent.realm.set_prototype.clone()));
        if !matches!(arg(args, 0), Value::Undefined | Value::Null) {
            let iterable = arg(args, 0);
            let handle = interpreter::get_iterator(agent, iterable).map_err(unwind_to_js_error)?;
            while let Some(v) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
                if let ObjectKind::Set(vals) = &mut obj.0.lock().unwrap().kind {
                    if !vals.iter().any(|existing| strict_equals(existing, &v)) {
                        vals.push(v);
                    }
                }
            }
        }
        Ok(Value::Object(obj))
    }));
}

#[cfg(feature = "weak-refs")]
fn install_weak(agent: &mut Agent) {
    let wm_proto = agent.realm.weak_map_prototype.clone();
    method(agent, &wm_proto, "get", 1, Arc::new(|_, this, args| {
        let (Value::Object(o), Value::Object(key)) = (&this, arg(args, 0)) else { return Ok(Value::Undefined) };
        let data = o.0.lock().unwrap();
        match &data.kind {
            ObjectKind::WeakMap(entries) => Ok(entries.iter().find(|(k, _)| Arc::ptr_eq(&k.0, &key.0)).map(|(_, v)| v.clone()).unwrap_or(Value::Undefined)),
            _ => Ok(Value::Undefined),
        }
    }));
    method(agent, &wm_proto, "has", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let found = match (&o.0.lock().unwrap().kind, arg(args, 0)) {
            (ObjectKind::WeakMap(entries), Value::Object(key)) => entries.iter().any(|(k, _)| Arc::ptr_eq(&k.0, &key.0)),
            _ => false,
        };
        Ok(Value::Boolean(found))
    }));
    method(agent, &wm_proto, "set", 2, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(this) };
        let Value::Object(key) = arg(args, 0) else { return Err(type_error(agent, "WeakMap key must be an object")) };
        let value = arg(args, 1);
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::WeakMap(entries) = &mut data.kind {
            match entries.iter().position(|(k, _)| Arc::ptr_eq(&k.0, &key.0)) {
                Some(i) => entries[i].1 = value,
                None => entries.push((key, value)),
            }
        }
        drop(data);
        Ok(this)
    }));
    method(agent, &wm_proto, "delete", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let mut data = o.0.lock().unwrap();
        let removed = match (&mut data.kind, arg(args, 0)) {
            (ObjectKind::WeakMap(entries), Value::Object(key)) => {
                if let Some(i) = entries.iter().position(|(k, _)| Arc::ptr_eq(&k.0, &key.0)) {
                    entries.remove(i);
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        Ok(Value::Boolean(removed))
    }));
    constructor(agent, "WeakMap", 0, &wm_proto, Arc::new(|agent, _, args| {
        let obj = JsObject::new(ObjectKind::WeakMap(Vec::new()), Some(agent.realm.weak_map_prototype.clone()));
        if !matches!(arg(args, 0), Value::Undefined | Value::Null) {
            let iterable = arg(args, 0);
            let handle = interpreter::get_iterator(agent, iterable).map_err(unwind_to_js_error)?;
            while let Some(pair) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
                let Value::Object(pair_obj) = &pair else { return Err(type_error(agent, "iterator entry is not an object")) };
                let k = pair_obj.get_own_data(&PropertyKey::from_str("0")).unwrap_or(Value::Undefined);
                let v = pair_obj.get_own_data(&PropertyKey::from_str("1")).unwrap_or(Value::Undefined);
                if let (ObjectKind::WeakMap(entries), Value::Object(key)) = (&mut obj.0.lock().unwrap().kind, k) {
                    entries.push((key, v));
                }
            }
        }
        Ok(Value::Object(obj))
    }));

    let ws_proto = agent.realm.weak_set_prototype.clone();
    method(agent, &ws_proto, "has", 1, Arc::new(|_, this, args| {
        let found = match (&this, arg(args, 0)) {
            (Value::Object(o), Value::Object(key)) => match &o.0.lock().unwrap().kind {
                ObjectKind::WeakSet(vals) => vals.iter().any(|v| Arc::ptr_eq(&v.0, &key.0)),
                _ => false,
            },
            _ => false,
        };
        Ok(Value::Boolean(found))
    }));
    method(agent, &ws_proto, "add", 1, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(this) };
        let Value::Object(key) = arg(args, 0) else { return Err(type_error(agent, "WeakSet value must be an object")) };
        let mut data = o.0.lock().unwrap();
        if let ObjectKind::WeakSet(vals) = &mut data.kind {
            if !vals.iter().any(|v| Arc::ptr_eq(&v.0, &key.0)) {
                vals.push(key);
            }
        }
        drop(data);
        Ok(this)
    }));
    method(agent, &ws_proto, "delete", 1, Arc::new(|_, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let mut data = o.0.lock().unwrap();
        let removed = match (&mut data.kind, arg(args, 0)) {
            (ObjectKind::WeakSet(vals), Value::Object(key)) => {
                if let Some(i) = vals.iter().position(|v| Arc::ptr_eq(&v.0, &key.0)) {
                    vals.remove(i);
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        Ok(Value::Boolean(removed))
    }));
    constructor(agent, "WeakSet", 0, &ws_proto, Arc::new(|agent, _, args| {
        let obj = JsObject::new(ObjectKind::WeakSet(Vec::new()), Some(agent.realm.weak_set_prototype.clone()));
        if !matches!(arg(args, 0), Value::Undefined | Value::Null) {
            let iterable = arg(args, 0);
            let handle = interpreter::get_iterator(agent, iterable).map_err(unwind_to_js_error)?;
            while let Some(v) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
                if let (ObjectKind::WeakSet(vals), Value::Object(key)) = (&mut obj.0.lock().unwrap().kind, v) {
                    vals.push(key);
                }
            }
        }
        Ok(Value::Object(obj))
    }));
}
