// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `setTimeout`/`setInterval`/`clearTimeout`/`clearInterval` wired to
//! [`crate::event_loop::EventLoop`], plus the global `parseInt`,
//! `parseFloat`, `isNaN`, and `isFinite` functions every realm needs
//! regardless of which optional feature families are enabled.

use super::{arg, method};
use crate::agent::Agent;
use crate::event_loop::TimerId;
use crate::interpreter::{self, unwind_to_js_error};
use crate::value::{PropertyKey, Value};
use std::sync::Arc;

fn global_fn(agent: &mut Agent, name: &str, length: u32, f: crate::function::NativeFn) {
    let func = interpreter::make_native(agent, name, length, f);
    agent.realm.global_object.define_data_property(PropertyKey::from_str(name), Value::Object(func), true, false, true);
}

pub fn install(agent: &mut Agent) {
    global_fn(agent, "setTimeout", 1, Arc::new(|agent, _, args| {
        let callback = arg(args, 0);
        let delay = match arg(args, 1) { Value::Undefined => 0.0, v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? };
        let extra = if args.len() > 2 { args[2..].to_vec() } else { Vec::new() };
        let id = agent.event_loop.set_timeout(callback, extra, delay);
        Ok(Value::Number(id.as_u64() as f64))
    }));
    global_fn(agent, "setInterval", 1, Arc::new(|agent, _, args| {
        let callback = arg(args, 0);
        let delay = match arg(args, 1) { Value::Undefined => 0.0, v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? };
        let extra = if args.len() > 2 { args[2..].to_vec() } else { Vec::new() };
        let id = agent.event_loop.set_interval(callback, extra, delay);
        Ok(Value::Number(id.as_u64() as f64))
    }));
    global_fn(agent, "clearTimeout", 1, Arc::new(|agent, _, args| {
        if let Value::Number(n) = arg(args, 0) {
            agent.event_loop.clear(TimerId::from_u64(n as u64));
        }
        Ok(Value::Undefined)
    }));
    global_fn(agent, "clearInterval", 1, Arc::new(|agent, _, args| {
        if let Value::Number(n) = arg(args, 0) {
            agent.event_loop.clear(TimerId::from_u64(n as u64));
        }
        Ok(Value::Undefined)
    }));

    global_fn(agent, "parseInt", 2, Arc::new(|agent, _, args| {
        let s = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let radix = match arg(args, 1) {
            Value::Undefined => 0,
            v => interpreter::to_number(agent, &v).map_err(unwind_to_js_error)? as u32,
        };
        Ok(Value::Number(parse_int(s.trim(), radix)))
    }));
    global_fn(agent, "parseFloat", 1, Arc::new(|agent, _, args| {
        let s = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Number(parse_float(s.trim())))
    }));
    global_fn(agent, "isNaN", 1, Arc::new(|agent, _, args| {
        let n = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(n.is_nan()))
    }));
    global_fn(agent, "isFinite", 1, Arc::new(|agent, _, args| {
        let n = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(n.is_finite()))
    }));
    // Direct/indirect eval is out of scope; calling the global still has to
    // do *something* reasonable rather than silently succeed.
    global_fn(agent, "eval", 1, Arc::new(|agent, _, _args| {
        Err(interpreter::make_error(agent, &agent.realm.type_error_prototype, "eval is not supported".to_string()))
    }));
}

fn parse_int(s: &str, radix: u32) -> f64 {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, rest) = if radix == 16 || (radix == 0 && (rest.starts_with("0x") || rest.starts_with("0X"))) {
        (16, rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest))
    } else {
        (if radix == 0 { 10 } else { radix }, rest)
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: String = rest.chars().take_while(|c| c.to_digit(radix).is_some()).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix).unwrap() as f64;
    }
    if neg {
        -value
    } else {
        value
    }
}

fn parse_float(s: &str) -> f64 {
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i > digits_start {
        end = i;
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            let exp_start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                end = j;
            }
        }
    }
    if end == 0 {
        return f64::NAN;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}
