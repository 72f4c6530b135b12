// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ArrayBuffer` and the `TypedArray` family.
//! One constructor per element kind, all sharing a single prototype and
//! the buffer-view storage in [`crate::object::ObjectKind::TypedArray`].

use super::{arg, constructor, method};
use crate::agent::Agent;
use crate::interpreter::{self, unwind_to_js_error};
use crate::object::{JsObject, ObjectKind, TypedArrayKind};
use crate::value::{PropertyKey, Value};
use std::sync::{Arc, Mutex};

fn type_error(agent: &Agent, msg: &str) -> crate::error::JsError {
    interpreter::make_error(agent, &agent.realm.type_error_prototype, msg.to_string())
}

pub(crate) fn read_element(buffer: &[u8], kind: TypedArrayKind, offset: usize, index: usize) -> f64 {
    let size = kind.element_size();
    let at = offset + index * size;
    if at + size > buffer.len() {
        return f64::NAN;
    }
    let bytes = &buffer[at..at + size];
    match kind {
        TypedArrayKind::Int8 => bytes[0] as i8 as f64,
        TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => bytes[0] as f64,
        TypedArrayKind::Int16 => i16::from_le_bytes(bytes.try_into().unwrap()) as f64,
        TypedArrayKind::Uint16 => u16::from_le_bytes(bytes.try_into().unwrap()) as f64,
        TypedArrayKind::Int32 => i32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        TypedArrayKind::Uint32 => u32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        TypedArrayKind::Float32 => f32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        TypedArrayKind::Float64 => f64::from_le_bytes(bytes.try_into().unwrap()),
    }
}

pub(crate) fn write_element(buffer: &mut [u8], kind: TypedArrayKind, offset: usize, index: usize, value: f64) {
    let size = kind.element_size();
    let at = offset + index * size;
    if at + size > buffer.len() {
        return;
    }
    let slot = &mut buffer[at..at + size];
    match kind {
        TypedArrayKind::Int8 => slot[0] = value as i64 as i8 as u8,
        TypedArrayKind::Uint8 => slot[0] = value as i64 as u8,
        TypedArrayKind::Uint8Clamped => slot[0] = value.clamp(0.0, 255.0).round() as u8,
        TypedArrayKind::Int16 => slot.copy_from_slice(&(value as i64 as i16).to_le_bytes()),
        TypedArrayKind::Uint16 => slot.copy_from_slice(&(value as i64 as u16).to_le_bytes()),
        TypedArrayKind::Int32 => slot.copy_from_slice(&(value as i64 as i32).to_le_bytes()),
        TypedArrayKind::Uint32 => slot.copy_from_slice(&(value as i64 as u32).to_le_bytes()),
        TypedArrayKind::Float32 => slot.copy_from_slice(&(value as f32).to_le_bytes()),
        TypedArrayKind::Float64 => slot.copy_from_slice(&value.to_le_bytes()),
    }
}

pub fn install(agent: &mut Agent) {
    let ab_proto = agent.realm.array_buffer_prototype.clone();
    method(agent, &ab_proto, "slice", 2, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Err(type_error(agent, "not an ArrayBuffer")) };
        let bytes = match &o.0.lock().unwrap().kind {
            ObjectKind::ArrayBuffer(buf) => buf.lock().unwrap().clone(),
            _ => return Err(type_error(agent, "not an ArrayBuffer")),
        };
        let len = bytes.len();
        let start = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?.max(0.0) as usize;
        let end = match arg(args, 1) {
            Value::Undefined => len,
            v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)?.max(0.0) as usize,
        };
        let slice = bytes[start.min(len)..end.min(len).max(start.min(len))].to_vec();
        Ok(Value::Object(JsObject::new(ObjectKind::ArrayBuffer(Arc::new(Mutex::new(slice))), Some(agent.realm.array_buffer_prototype.clone()))))
    }));
    method(agent, &ab_proto, "byteLength", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = &this else { return Ok(Value::Number(0.0)) };
        let len = match &o.0.lock().unwrap().kind {
            ObjectKind::ArrayBuffer(buf) => buf.lock().unwrap().len(),
            _ => 0,
        };
        Ok(Value::Number(len as f64))
    }));
    constructor(agent, "ArrayBuffer", 1, &ab_proto, Arc::new(|agent, _, args| {
        let len = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?.max(0.0) as usize;
        Ok(Value::Object(JsObject::new(ObjectKind::ArrayBuffer(Arc::new(Mutex::new(vec![0u8; len]))), Some(agent.realm.array_buffer_prototype.clone()))))
    }));

    let ta_proto = agent.realm.typed_array_prototype.clone();
    method(agent, &ta_proto, "length", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = &this else { return Ok(Value::Number(0.0)) };
        let len = match &o.0.lock().unwrap().kind {
            ObjectKind::TypedArray { length, .. } => *length,
            _ => 0,
        };
        Ok(Value::Number(len as f64))
    }));
    method(agent, &ta_proto, "set", 2, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Err(type_error(agent, "not a typed array")) };
        let Value::Object(src) = arg(args, 0) else { return Err(type_error(agent, "source must be an array-like")) };
        let src_vals = super::object_array::elements_of(&src);
        let offset = match arg(args, 1) { Value::Undefined => 0, v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? as usize };
        let data = o.0.lock().unwrap();
        if let ObjectKind::TypedArray { kind, buffer, byte_offset, .. } = &data.kind {
            let mut buf = buffer.lock().unwrap();
            for (i, v) in src_vals.iter().enumerate() {
                let n = match v { Value::Number(n) => *n, _ => 0.0 };
                write_element(&mut buf, *kind, *byte_offset, offset + i, n);
            }
        }
        Ok(Value::Undefined)
    }));
    method(agent, &ta_proto, "toString", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = &this else { return Ok(Value::string("")) };
        let data = o.0.lock().unwrap();
        match &data.kind {
            ObjectKind::TypedArray { kind, buffer, byte_offset, length } => {
                let buf = buffer.lock().unwrap();
                let parts: Vec<String> = (0..*length).map(|i| {
                    let n = read_element(&buf, *kind, *byte_offset, i);
                    crate::value::format_number(n)
                }).collect();
                Ok(Value::string(parts.join(",")))
            }
            _ => Ok(Value::string("")),
        }
    }));

    let kinds: [(&str, TypedArrayKind); 9] = [
        ("Int8Array", TypedArrayKind::Int8),
        ("Uint8Array", TypedArrayKind::Uint8),
        ("Uint8ClampedArray", TypedArrayKind::Uint8Clamped),
        ("Int16Array", TypedArrayKind::Int16),
        ("Uint16Array", TypedArrayKind::Uint16),
        ("Int32Array", TypedArrayKind::Int32),
        ("Uint32Array", TypedArrayKind::Uint32),
        ("Float32Array", TypedArrayKind::Float32),
        ("Float64Array", TypedArrayKind::Float64),
    ];
    for (name, kind) in kinds {
        constructor(agent, name, 1, &ta_proto, Arc::new(move |agent, _, args| {
            let size = kind.element_size();
            match arg(args, 0) {
                Value::Number(n) => {
                    let length = n.max(0.0) as usize;
                    let buffer = Arc::new(Mutex::new(vec![0u8; length * size]));
                    Ok(Value::Object(JsObject::new(ObjectKind::TypedArray { kind, buffer, byte_offset: 0, length }, Some(agent.realm.typed_array_prototype.clone()))))
                }
                Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::ArrayBuffer(_)) => {
                    let buffer = match &o.0.lock().unwrap().kind {
                        ObjectKind::ArrayBuffer(buf) => buf.clone(),
                        _ => unreachable!(),
                    };
                    let byte_offset = match arg(args, 1) { Value::Undefined => 0, v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? as usize };
                    let total_len = buffer.lock().unwrap().len();
                    let length = match arg(args, 2) {
                        Value::Undefined => (total_len - byte_offset) / size,
                        v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? as usize,
                    };
                    Ok(Value::Object(JsObject::new(ObjectKind::TypedArray { kind, buffer, byte_offset, length }, Some(agent.realm.typed_array_prototype.clone()))))
                }
                Value::Object(o) => {
                    let elems = super::object_array::elements_of(&o);
                    let buffer = Arc::new(Mutex::new(vec![0u8; elems.len() * size]));
                    {
                        let mut buf = buffer.lock().unwrap();
                        for (i, v) in elems.iter().enumerate() {
                            let n = match v { Value::Number(n) => *n, _ => 0.0 };
                            write_element(&mut buf, kind, 0, i, n);
                        }
                    }
                    Ok(Value::Object(JsObject::new(ObjectKind::TypedArray { kind, buffer, byte_offset: 0, length: elems.len() }, Some(agent.realm.typed_array_prototype.clone()))))
                }
                _ => Ok(Value::Object(JsObject::new(ObjectKind::TypedArray { kind, buffer: Arc::new(Mutex::new(Vec::new())), byte_offset: 0, length: 0 }, Some(agent.realm.typed_array_prototype.clone())))),
            }
        }));
    }
}
