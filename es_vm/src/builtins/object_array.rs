// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Object` and `Array` constructors and prototypes, trimmed to the
//! commonly used subset of the method catalogue.

use super::{arg, constructor, method, value as def_value};
use crate::agent::Agent;
use crate::error::JsError;
use crate::interpreter::{self, unwind_to_js_error};
use crate::object::{JsObject, ObjectKind, PropertyDescriptor};
use crate::value::{PropertyKey, Value};
use std::sync::Arc;

fn type_error(agent: &Agent, msg: impl Into<String>) -> JsError {
    interpreter::make_error(agent, &agent.realm.type_error_prototype, msg.into())
}

fn array_length(obj: &JsObject) -> usize {
    match obj.get_own_data(&PropertyKey::from_str("length")) {
        Some(Value::Number(n)) if n.is_finite() && n >= 0.0 => n as usize,
        _ => 0,
    }
}

fn set_length(obj: &JsObject, len: usize) {
    obj.define_data_property(PropertyKey::from_str("length"), Value::Number(len as f64), true, false, false);
}

pub(super) fn elements_of(obj: &JsObject) -> Vec<Value> {
    let len = array_length(obj);
    (0..len).map(|i| obj.get_own_data(&PropertyKey::from_index(i)).unwrap_or(Value::Undefined)).collect()
}

pub fn install(agent: &mut Agent) {
    install_object(agent);
    install_array(agent);
}

fn install_object(agent: &mut Agent) {
    let proto = agent.realm.object_prototype.clone();
    method(agent, &proto, "hasOwnProperty", 1, Arc::new(|agent, this, args| {
        let key = interpreter::to_property_key(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let obj = interpreter::to_object(agent, this).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(obj.has_own(&key)))
    }));
    method(agent, &proto, "isPrototypeOf", 1, Arc::new(|_, this, args| {
        let Value::Object(candidate) = arg(args, 0) else { return Ok(Value::Boolean(false)) };
        let Value::Object(target) = this else { return Ok(Value::Boolean(false)) };
        let mut cur = candidate.prototype();
        while let Some(p) = cur {
            if p.ptr_eq(&target) {
                return Ok(Value::Boolean(true));
            }
            cur = p.prototype();
        }
        Ok(Value::Boolean(false))
    }));
    method(agent, &proto, "toString", 0, Arc::new(|_, _, _| Ok(Value::string("[object Object]"))));
    method(agent, &proto, "valueOf", 0, Arc::new(|_, this, _| Ok(this)));

    let ctor = constructor(agent, "Object", 1, &proto, Arc::new(|agent, _, args| {
        match arg(args, 0) {
            Value::Undefined | Value::Null => Ok(Value::Object(JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone())))),
            other => Ok(Value::Object(interpreter::to_object(agent, other).map_err(unwind_to_js_error)?)),
        }
    }));

    method(agent, &ctor, "keys", 1, Arc::new(|agent, _, args| {
        let Value::Object(obj) = arg(args, 0) else { return Ok(interpreter::make_array(agent, vec![])) };
        let keys = obj.own_keys().into_iter().filter_map(|k| match k { PropertyKey::String(s) => Some(Value::string(s.as_ref().to_string())), _ => None }).collect();
        Ok(interpreter::make_array(agent, keys))
    }));
    method(agent, &ctor, "values", 1, Arc::new(|agent, _, args| {
        let Value::Object(obj) = arg(args, 0) else { return Ok(interpreter::make_array(agent, vec![])) };
        let vals = obj.own_keys().into_iter().filter_map(|k| obj.get_own_data(&k)).collect();
        Ok(interpreter::make_array(agent, vals))
    }));
    method(agent, &ctor, "entries", 1, Arc::new(|agent, _, args| {
        let Value::Object(obj) = arg(args, 0) else { return Ok(interpreter::make_array(agent, vec![])) };
        let pairs = obj
            .own_keys()
            .into_iter()
            .filter_map(|k| {
                let v = obj.get_own_data(&k)?;
                let key = match &k { PropertyKey::String(s) => Value::string(s.as_ref().to_string()), PropertyKey::Symbol(_) => return None };
                Some(interpreter::make_array(agent, vec![key, v]))
            })
            .collect();
        Ok(interpreter::make_array(agent, pairs))
    }));
    method(agent, &ctor, "assign", 2, Arc::new(|agent, _, args| {
        let Value::Object(target) = arg(args, 0) else { return Err(type_error(agent, "Object.assign target must be an object")) };
        for source in args.iter().skip(1) {
            if let Value::Object(src) = source {
                for k in src.own_keys() {
                    if let Some(v) = src.get_own_data(&k) {
                        target.define_data_property(k, v, true, true, true);
                    }
                }
            }
        }
        Ok(Value::Object(target))
    }));
    method(agent, &ctor, "freeze", 1, Arc::new(|_, _, args| {
        if let Value::Object(obj) = arg(args, 0) {
            obj.prevent_extensions();
            for k in obj.own_keys() {
                if let Some(mut d) = obj.get_own_property(&k) {
                    d.writable = false;
                    d.configurable = false;
                    obj.define_property(k, d);
                }
            }
            return Ok(Value::Object(obj));
        }
        Ok(arg(args, 0))
    }));
    method(agent, &ctor, "isFrozen", 1, Arc::new(|_, _, args| {
        let Value::Object(obj) = arg(args, 0) else { return Ok(Value::Boolean(true)) };
        let frozen = !obj.is_extensible() && obj.own_keys().iter().all(|k| obj.get_own_property(k).map(|d| !d.writable && !d.configurable).unwrap_or(true));
        Ok(Value::Boolean(frozen))
    }));
    method(agent, &ctor, "getPrototypeOf", 1, Arc::new(|agent, _, args| {
        let obj = interpreter::to_object(agent, arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(obj.prototype().map(Value::Object).unwrap_or(Value::Null))
    }));
    method(agent, &ctor, "setPrototypeOf", 2, Arc::new(|_, _, args| {
        if let Value::Object(obj) = arg(args, 0) {
            let proto = match arg(args, 1) { Value::Object(p) => Some(p), _ => None };
            obj.set_prototype(proto);
        }
        Ok(arg(args, 0))
    }));
    method(agent, &ctor, "defineProperty", 3, Arc::new(|agent, _, args| {
        let Value::Object(obj) = arg(args, 0) else { return Err(type_error(agent, "Object.defineProperty called on non-object")) };
        let key = interpreter::to_property_key(agent, &arg(args, 1)).map_err(unwind_to_js_error)?;
        let Value::Object(desc_obj) = arg(args, 2) else { return Err(type_error(agent, "property descriptor must be an object")) };
        let existing = obj.get_own_property(&key);
        let get = desc_obj.get_own_data(&PropertyKey::from_str("get"));
        let set = desc_obj.get_own_data(&PropertyKey::from_str("set"));
        let desc = PropertyDescriptor {
            value: desc_obj.get_own_data(&PropertyKey::from_str("value")).or_else(|| existing.as_ref().and_then(|d| d.value.clone())),
            get: get.or_else(|| existing.as_ref().and_then(|d| d.get.clone())),
            set: set.or_else(|| existing.as_ref().and_then(|d| d.set.clone())),
            writable: desc_obj.get_own_data(&PropertyKey::from_str("writable")).map(|v| v.to_boolean()).unwrap_or_else(|| existing.as_ref().map(|d| d.writable).unwrap_or(false)),
            enumerable: desc_obj.get_own_data(&PropertyKey::from_str("enumerable")).map(|v| v.to_boolean()).unwrap_or_else(|| existing.as_ref().map(|d| d.enumerable).unwrap_or(false)),
            configurable: desc_obj.get_own_data(&PropertyKey::from_str("configurable")).map(|v| v.to_boolean()).unwrap_or_else(|| existing.as_ref().map(|d| d.configurable).unwrap_or(false)),
        };
        obj.define_property(key, desc);
        Ok(Value::Object(obj))
    }));
    method(agent, &ctor, "fromEntries", 1, Arc::new(|agent, _, args| {
        let obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
        let handle = interpreter::get_iterator(agent, arg(args, 0)).map_err(unwind_to_js_error)?;
        while let Some(entry) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
            let k = interpreter::get_property_value(agent, &entry, &PropertyKey::from_index(0)).map_err(unwind_to_js_error)?;
            let v = interpreter::get_property_value(agent, &entry, &PropertyKey::from_index(1)).map_err(unwind_to_js_error)?;
            let key = interpreter::to_property_key(agent, &k).map_err(unwind_to_js_error)?;
            obj.define_data_property(key, v, true, true, true);
        }
        Ok(Value::Object(obj))
    }));
    def_value(&agent.realm.global_object, "Object", Value::Object(ctor));
}

fn install_array(agent: &mut Agent) {
    let proto = agent.realm.array_prototype.clone();

    method(agent, &proto, "push", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Err(type_error(agent, "Array.prototype.push called on non-array")) };
        let mut len = array_length(&obj);
        for v in args {
            obj.define_data_property(PropertyKey::from_index(len), v.clone(), true, true, true);
            len += 1;
        }
        set_length(&obj, len);
        Ok(Value::Number(len as f64))
    }));
    method(agent, &proto, "pop", 0, Arc::new(|_, this, _| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let len = array_length(&obj);
        if len == 0 {
            return Ok(Value::Undefined);
        }
        let key = PropertyKey::from_index(len - 1);
        let v = obj.get_own_data(&key).unwrap_or(Value::Undefined);
        obj.delete(&key);
        set_length(&obj, len - 1);
        Ok(v)
    }));
    method(agent, &proto, "shift", 0, Arc::new(|agent, this, _| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let mut elems = elements_of(&obj);
        if elems.is_empty() {
            return Ok(Value::Undefined);
        }
        let first = elems.remove(0);
        write_back(agent, &obj, elems);
        Ok(first)
    }));
    method(agent, &proto, "unshift", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Err(type_error(agent, "Array.prototype.unshift called on non-array")) };
        let mut elems = elements_of(&obj);
        for (i, v) in args.iter().enumerate() {
            elems.insert(i, v.clone());
        }
        let len = elems.len();
        write_back(agent, &obj, elems);
        Ok(Value::Number(len as f64))
    }));
    method(agent, &proto, "slice", 2, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let elems = elements_of(&obj);
        let len = elems.len() as i64;
        let start = norm_index(arg(args, 0), len, 0);
        let end = norm_index(arg(args, 1), len, len);
        let slice = if start < end { elems[start as usize..end as usize].to_vec() } else { vec![] };
        Ok(interpreter::make_array(agent, slice))
    }));
    method(agent, &proto, "splice", 2, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let mut elems = elements_of(&obj);
        let len = elems.len() as i64;
        let start = norm_index(arg(args, 0), len, 0) as usize;
        let delete_count = match args.get(1) {
            Some(v) => (interpreter::to_number(agent, v).map_err(unwind_to_js_error)? as i64).clamp(0, len - start as i64) as usize,
            None => elems.len() - start,
        };
        let removed: Vec<Value> = elems.splice(start..start + delete_count, args.iter().skip(2).cloned()).collect();
        write_back(agent, &obj, elems);
        Ok(interpreter::make_array(agent, removed))
    }));
    method(agent, &proto, "concat", 1, Arc::new(|agent, this, args| {
        let mut out = match &this { Value::Object(o) => elements_of(o), _ => vec![] };
        for a in args {
            match a {
                Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::Array) => out.extend(elements_of(o)),
                other => out.push(other.clone()),
            }
        }
        Ok(interpreter::make_array(agent, out))
    }));
    method(agent, &proto, "join", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::string("")) };
        let sep = match arg(args, 0) { Value::Undefined => ",".to_string(), v => interpreter::to_js_string(agent, &v).map_err(unwind_to_js_error)? };
        let parts: Result<Vec<String>, _> = elements_of(&obj)
            .into_iter()
            .map(|v| if v.is_nullish() { Ok(String::new()) } else { interpreter::to_js_string(agent, &v).map_err(unwind_to_js_error) })
            .collect();
        Ok(Value::string(parts?.join(&sep)))
    }));
    method(agent, &proto, "indexOf", 1, Arc::new(|_, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Number(-1.0)) };
        let needle = arg(args, 0);
        let idx = elements_of(&obj).iter().position(|v| interpreter::strict_equals(v, &needle));
        Ok(Value::Number(idx.map(|i| i as f64).unwrap_or(-1.0)))
    }));
    method(agent, &proto, "lastIndexOf", 1, Arc::new(|_, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Number(-1.0)) };
        let needle = arg(args, 0);
        let idx = elements_of(&obj).iter().rposition(|v| interpreter::strict_equals(v, &needle));
        Ok(Value::Number(idx.map(|i| i as f64).unwrap_or(-1.0)))
    }));
    method(agent, &proto, "at", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let elems = elements_of(&obj);
        let len = elems.len() as i64;
        let idx = match arg(args, 0) {
            Value::Undefined => 0,
            v => {
                let n = interpreter::to_number(agent, &v).map_err(unwind_to_js_error)?;
                if n.is_nan() { 0 } else { n.trunc() as i64 }
            }
        };
        let idx = if idx < 0 { idx + len } else { idx };
        if idx < 0 || idx >= len {
            return Ok(Value::Undefined);
        }
        Ok(elems[idx as usize].clone())
    }));
    method(agent, &proto, "includes", 1, Arc::new(|_, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Boolean(false)) };
        let needle = arg(args, 0);
        Ok(Value::Boolean(elements_of(&obj).iter().any(|v| v.same_value_zero(&needle))))
    }));
    method(agent, &proto, "find", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let cb = arg(args, 0);
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            if interpreter::call_function(agent, &cb, arg(args, 1), &[v.clone(), Value::Number(i as f64), Value::Object(obj.clone())])?.to_boolean() {
                return Ok(v);
            }
        }
        Ok(Value::Undefined)
    }));
    method(agent, &proto, "findIndex", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Number(-1.0)) };
        let cb = arg(args, 0);
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            if interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?.to_boolean() {
                return Ok(Value::Number(i as f64));
            }
        }
        Ok(Value::Number(-1.0))
    }));
    method(agent, &proto, "forEach", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let cb = arg(args, 0);
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?;
        }
        Ok(Value::Undefined)
    }));
    method(agent, &proto, "map", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let cb = arg(args, 0);
        let mut out = Vec::new();
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            out.push(interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?);
        }
        Ok(interpreter::make_array(agent, out))
    }));
    method(agent, &proto, "filter", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let cb = arg(args, 0);
        let mut out = Vec::new();
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            if interpreter::call_function(agent, &cb, arg(args, 1), &[v.clone(), Value::Number(i as f64), Value::Object(obj.clone())])?.to_boolean() {
                out.push(v);
            }
        }
        Ok(interpreter::make_array(agent, out))
    }));
    method(agent, &proto, "some", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Boolean(false)) };
        let cb = arg(args, 0);
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            if interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?.to_boolean() {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }));
    method(agent, &proto, "every", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Boolean(true)) };
        let cb = arg(args, 0);
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            if !interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?.to_boolean() {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    }));
    method(agent, &proto, "reduce", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Err(type_error(agent, "Array.prototype.reduce called on non-array")) };
        let cb = arg(args, 0);
        let elems = elements_of(&obj);
        let mut iter = elems.into_iter().enumerate();
        let mut acc = if args.len() > 1 {
            arg(args, 1)
        } else {
            let (_, first) = iter.next().ok_or_else(|| type_error(agent, "Reduce of empty array with no initial value"))?;
            first
        };
        for (i, v) in iter {
            acc = interpreter::call_function(agent, &cb, Value::Undefined, &[acc, v, Value::Number(i as f64), Value::Object(obj.clone())])?;
        }
        Ok(acc)
    }));
    method(agent, &proto, "reverse", 0, Arc::new(|agent, this, _| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let mut elems = elements_of(&obj);
        elems.reverse();
        write_back(agent, &obj, elems);
        Ok(Value::Object(obj))
    }));
    method(agent, &proto, "sort", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let mut elems = elements_of(&obj);
        let cmp = arg(args, 0);
        let mut err = None;
        elems.sort_by(|a, b| {
            if err.is_some() {
                return std::cmp::Ordering::Equal;
            }
            if cmp.is_callable() {
                match interpreter::call_function(agent, &cmp, Value::Undefined, &[a.clone(), b.clone()]) {
                    Ok(v) => {
                        let n = match v { Value::Number(n) => n, _ => 0.0 };
                        n.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    Err(e) => {
                        err = Some(e);
                        std::cmp::Ordering::Equal
                    }
                }
            } else {
                a.to_display_string().cmp(&b.to_display_string())
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
        write_back(agent, &obj, elems);
        Ok(Value::Object(obj))
    }));
    method(agent, &proto, "flat", 0, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let depth = match arg(args, 0) { Value::Undefined => 1, v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? as i64 };
        fn flatten(elems: Vec<Value>, depth: i64) -> Vec<Value> {
            let mut out = Vec::new();
            for v in elems {
                match &v {
                    Value::Object(o) if depth > 0 && matches!(o.0.lock().unwrap().kind, ObjectKind::Array) => {
                        out.extend(flatten(elements_of(o), depth - 1));
                    }
                    _ => out.push(v),
                }
            }
            out
        }
        Ok(interpreter::make_array(agent, flatten(elements_of(&obj), depth)))
    }));
    method(agent, &proto, "flatMap", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(interpreter::make_array(agent, vec![])) };
        let cb = arg(args, 0);
        let mut out = Vec::new();
        for (i, v) in elements_of(&obj).into_iter().enumerate() {
            let mapped = interpreter::call_function(agent, &cb, arg(args, 1), &[v, Value::Number(i as f64), Value::Object(obj.clone())])?;
            match &mapped {
                Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::Array) => out.extend(elements_of(o)),
                _ => out.push(mapped),
            }
        }
        Ok(interpreter::make_array(agent, out))
    }));
    method(agent, &proto, "fill", 1, Arc::new(|agent, this, args| {
        let Value::Object(obj) = this else { return Ok(Value::Undefined) };
        let mut elems = elements_of(&obj);
        let len = elems.len() as i64;
        let start = norm_index(arg(args, 1), len, 0);
        let end = norm_index(arg(args, 2), len, len);
        let v = arg(args, 0);
        for e in elems.iter_mut().take(end as usize).skip(start as usize) {
            *e = v.clone();
        }
        write_back(agent, &obj, elems);
        Ok(Value::Object(obj))
    }));
    method(agent, &proto, "toString", 0, Arc::new(|agent, this, _| {
        let Value::Object(obj) = this else { return Ok(Value::string("")) };
        let parts: Result<Vec<String>, _> = elements_of(&obj)
            .into_iter()
            .map(|v| if v.is_nullish() { Ok(String::new()) } else { interpreter::to_js_string(agent, &v).map_err(unwind_to_js_error) })
            .collect();
        Ok(Value::string(parts?.join(",")))
    }));
    let values_fn = interpreter::make_native(agent, "values", 0, array_iterator_fn(ArrayIterMode::Values));
    proto.define_data_property(PropertyKey::from_str("values"), Value::Object(values_fn.clone()), true, false, true);
    let iter_key = PropertyKey::Symbol(agent.realm.well_known_symbols.iterator.clone());
    proto.define_data_property(iter_key, Value::Object(values_fn), true, false, true);
    let keys_fn = interpreter::make_native(agent, "keys", 0, array_iterator_fn(ArrayIterMode::Keys));
    proto.define_data_property(PropertyKey::from_str("keys"), Value::Object(keys_fn), true, false, true);
    let entries_fn = interpreter::make_native(agent, "entries", 0, array_iterator_fn(ArrayIterMode::Entries));
    proto.define_data_property(PropertyKey::from_str("entries"), Value::Object(entries_fn), true, false, true);

    let ctor = constructor(agent, "Array", 1, &proto, Arc::new(|agent, _, args| {
        if args.len() == 1 {
            if let Value::Number(n) = args[0] {
                return Ok(interpreter::make_array(agent, vec![Value::Undefined; n as usize]));
            }
        }
        Ok(interpreter::make_array(agent, args.to_vec()))
    }));
    method(agent, &ctor, "isArray", 1, Arc::new(|_, _, args| Ok(Value::Boolean(matches!(arg(args, 0), Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::Array))))));
    method(agent, &ctor, "from", 1, Arc::new(|agent, _, args| {
        let src = arg(args, 0);
        let map_fn = arg(args, 1);
        let handle = interpreter::get_iterator(agent, src).map_err(unwind_to_js_error)?;
        let mut out = Vec::new();
        let mut i = 0usize;
        while let Some(v) = interpreter::iterator_step(agent, &handle).map_err(unwind_to_js_error)? {
            let v = if map_fn.is_callable() { interpreter::call_function(agent, &map_fn, Value::Undefined, &[v, Value::Number(i as f64)])? } else { v };
            out.push(v);
            i += 1;
        }
        Ok(interpreter::make_array(agent, out))
    }));
    method(agent, &ctor, "of", 0, Arc::new(|agent, _, args| Ok(interpreter::make_array(agent, args.to_vec()))));
}

#[derive(Clone, Copy)]
enum ArrayIterMode {
    Keys,
    Values,
    Entries,
}

fn array_iterator_fn(mode: ArrayIterMode) -> crate::function::NativeFn {
    Arc::new(move |agent, this, _| {
        let Value::Object(obj) = this else { return Err(type_error(agent, "not an array")) };
        let elems = elements_of(&obj);
        let elems = match mode {
            ArrayIterMode::Values => elems,
            ArrayIterMode::Keys => (0..elems.len()).map(|i| Value::Number(i as f64)).collect(),
            ArrayIterMode::Entries => elems
                .into_iter()
                .enumerate()
                .map(|(i, v)| interpreter::make_array(agent, vec![Value::Number(i as f64), v]))
                .collect(),
        };
        let iter_proto = agent.realm.object_prototype.clone();
        let iter_obj = JsObject::new(ObjectKind::Ordinary, Some(iter_proto));
        let cursor = std::sync::Arc::new(std::sync::Mutex::new(elems.into_iter()));
        let next_cursor = cursor.clone();
        let next = crate::interpreter::make_native(agent, "next", 0, Arc::new(move |agent, _, _| {
            let result = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
            match next_cursor.lock().unwrap().next() {
                Some(v) => {
                    result.define_data_property(PropertyKey::from_str("value"), v, true, true, true);
                    result.define_data_property(PropertyKey::from_str("done"), Value::Boolean(false), true, true, true);
                }
                None => {
                    result.define_data_property(PropertyKey::from_str("value"), Value::Undefined, true, true, true);
                    result.define_data_property(PropertyKey::from_str("done"), Value::Boolean(true), true, true, true);
                }
            }
            Ok(Value::Object(result))
        }));
        iter_obj.define_data_property(PropertyKey::from_str("next"), Value::Object(next), true, false, true);
        Ok(Value::Object(iter_obj))
    })
}

fn write_back(agent: &Agent, obj: &JsObject, elems: Vec<Value>) {
    let _ = agent;
    for k in obj.own_keys() {
        if let PropertyKey::String(s) = &k {
            if s.parse::<usize>().is_ok() {
                obj.delete(&k);
            }
        }
    }
    for (i, v) in elems.iter().enumerate() {
        obj.define_data_property(PropertyKey::from_index(i), v.clone(), true, true, true);
    }
    set_length(obj, elems.len());
}

fn norm_index(v: Value, len: i64, default: i64) -> i64 {
    let n = match v {
        Value::Undefined => return default,
        Value::Number(n) => n as i64,
        _ => default,
    };
    if n < 0 { (len + n).max(0) } else { n.min(len) }
}
