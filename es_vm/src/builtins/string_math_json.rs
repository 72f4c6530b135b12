// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `String`, `Math`, and `JSON`.
//! `JSON.stringify`/`parse` walk `Value` directly rather than going
//! through a generic serde-shaped value, since `toJSON` dispatch and
//! property enumeration order are part of the semantics.

use super::{arg, constructor, method};
use crate::agent::Agent;
use crate::interpreter::{self, unwind_to_js_error};
use crate::object::{JsObject, ObjectKind};
use crate::value::{format_number, PropertyKey, Value};
use std::sync::Arc;

pub fn install(agent: &mut Agent) {
    install_string(agent);
    install_math(agent);
    #[cfg(feature = "json")]
    install_json(agent);
}

fn install_string(agent: &mut Agent) {
    let proto = agent.realm.string_prototype.clone();
    method(agent, &proto, "charAt", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let i = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)? as i64;
        Ok(Value::string(s.chars().nth(i.max(0) as usize).map(|c| c.to_string()).unwrap_or_default()))
    }));
    method(agent, &proto, "charCodeAt", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let i = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)? as i64;
        Ok(s.encode_utf16().nth(i.max(0) as usize).map(|c| Value::Number(c as f64)).unwrap_or(Value::Number(f64::NAN)))
    }));
    method(agent, &proto, "indexOf", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Number(s.find(&needle).map(|b| s[..b].chars().count() as f64).unwrap_or(-1.0)))
    }));
    method(agent, &proto, "lastIndexOf", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Number(s.rfind(&needle).map(|b| s[..b].chars().count() as f64).unwrap_or(-1.0)))
    }));
    method(agent, &proto, "includes", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(s.contains(&needle)))
    }));
    method(agent, &proto, "startsWith", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(s.starts_with(&needle)))
    }));
    method(agent, &proto, "endsWith", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Boolean(s.ends_with(&needle)))
    }));
    method(agent, &proto, "slice", 2, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let start = norm(arg(args, 0), len, 0);
        let end = norm(arg(args, 1), len, len);
        Ok(Value::string(if start < end { chars[start as usize..end as usize].iter().collect::<String>() } else { String::new() }))
    }));
    method(agent, &proto, "substring", 2, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let mut a = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?.max(0.0).min(len as f64) as i64;
        let mut b = match args.get(1) { Some(v) => interpreter::to_number(agent, v).map_err(unwind_to_js_error)?.max(0.0).min(len as f64) as i64, None => len };
        if a > b { std::mem::swap(&mut a, &mut b); }
        Ok(Value::string(chars[a as usize..b as usize].iter().collect::<String>()))
    }));
    method(agent, &proto, "toUpperCase", 0, Arc::new(|agent, this, _| Ok(Value::string(interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?.to_uppercase()))));
    method(agent, &proto, "toLowerCase", 0, Arc::new(|agent, this, _| Ok(Value::string(interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?.to_lowercase()))));
    method(agent, &proto, "trim", 0, Arc::new(|agent, this, _| Ok(Value::string(interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?.trim().to_string()))));
    method(agent, &proto, "split", 2, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let parts: Vec<Value> = match arg(args, 0) {
            Value::Undefined => vec![Value::string(s)],
            sep => {
                let sep = interpreter::to_js_string(agent, &sep).map_err(unwind_to_js_error)?;
                if sep.is_empty() {
                    s.chars().map(|c| Value::string(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(|p| Value::string(p.to_string())).collect()
                }
            }
        };
        Ok(interpreter::make_array(agent, parts))
    }));
    method(agent, &proto, "replace", 2, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let repl = interpreter::to_js_string(agent, &arg(args, 1)).map_err(unwind_to_js_error)?;
        Ok(Value::string(s.replacen(&needle, &repl, 1)))
    }));
    method(agent, &proto, "replaceAll", 2, Arc::new(|agent, this, args| {
        if args.len() < 2 {
            return Err(interpreter::make_error(agent, &agent.realm.type_error_prototype, "String.prototype.replaceAll requires a search value and a replacement".to_string()));
        }
        if let Value::Object(o) = &args[0] {
            if let ObjectKind::RegExp(r) = &o.0.lock().unwrap().kind {
                if !r.flags.contains('g') {
                    return Err(interpreter::make_error(agent, &agent.realm.type_error_prototype, "replaceAll must be called with a global RegExp".to_string()));
                }
            }
        }
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let needle = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let repl = interpreter::to_js_string(agent, &arg(args, 1)).map_err(unwind_to_js_error)?;
        Ok(Value::string(s.replace(&needle, &repl)))
    }));
    method(agent, &proto, "repeat", 1, Arc::new(|agent, this, args| {
        let s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        let n = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        if n < 0.0 || !n.is_finite() {
            return Err(interpreter::make_error(agent, &agent.realm.range_error_prototype, "invalid count value".to_string()));
        }
        Ok(Value::string(s.repeat(n as usize)))
    }));
    method(agent, &proto, "padStart", 2, Arc::new(|agent, this, args| pad(agent, &this, args, true)));
    method(agent, &proto, "padEnd", 2, Arc::new(|agent, this, args| pad(agent, &this, args, false)));
    method(agent, &proto, "concat", 1, Arc::new(|agent, this, args| {
        let mut s = interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?;
        for a in args {
            s.push_str(&interpreter::to_js_string(agent, a).map_err(unwind_to_js_error)?);
        }
        Ok(Value::string(s))
    }));
    method(agent, &proto, "toString", 0, Arc::new(|agent, this, _| Ok(Value::string(interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?))));
    method(agent, &proto, "valueOf", 0, Arc::new(|agent, this, _| Ok(Value::string(interpreter::to_js_string(agent, &this).map_err(unwind_to_js_error)?))));

    let ctor = constructor(agent, "String", 1, &proto, Arc::new(|agent, _, args| match args.first() {
        Some(v) => Ok(Value::string(interpreter::to_js_string(agent, v).map_err(unwind_to_js_error)?)),
        None => Ok(Value::string("")),
    }));
    method(agent, &ctor, "fromCharCode", 1, Arc::new(|agent, _, args| {
        let mut s = String::new();
        for a in args {
            let n = interpreter::to_number(agent, a).map_err(unwind_to_js_error)? as u32;
            if let Some(c) = char::from_u32(n) {
                s.push(c);
            }
        }
        Ok(Value::string(s))
    }));
}

fn pad(agent: &mut Agent, this: &Value, args: &[Value], start: bool) -> super::NativeResult {
    let s = interpreter::to_js_string(agent, this).map_err(unwind_to_js_error)?;
    let target_len = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?.max(0.0) as usize;
    let pad_str = match args.get(1) {
        Some(v) => interpreter::to_js_string(agent, v).map_err(unwind_to_js_error)?,
        None => " ".to_string(),
    };
    let cur_len = s.chars().count();
    if cur_len >= target_len || pad_str.is_empty() {
        return Ok(Value::string(s));
    }
    let needed = target_len - cur_len;
    let padding: String = pad_str.chars().cycle().take(needed).collect();
    Ok(Value::string(if start { format!("{padding}{s}") } else { format!("{s}{padding}") }))
}

fn norm(v: Value, len: i64, default: i64) -> i64 {
    let n = match v {
        Value::Undefined => return default,
        Value::Number(n) => n as i64,
        _ => default,
    };
    if n < 0 { (len + n).max(0) } else { n.min(len) }
}

fn install_math(agent: &mut Agent) {
    let math = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
    for (name, v) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        math.define_data_property(PropertyKey::from_str(name), Value::Number(v), false, false, false);
    }
    macro_rules! unary {
        ($name:literal, $f:expr) => {
            method(agent, &math, $name, 1, Arc::new(|agent, _, args| {
                let n = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Number(f(n)))
            }));
        };
    }
    unary!("abs", f64::abs);
    unary!("floor", f64::floor);
    unary!("ceil", f64::ceil);
    unary!("round", |n| (n + 0.5).floor());
    unary!("trunc", f64::trunc);
    unary!("sign", f64::signum);
    unary!("sqrt", f64::sqrt);
    unary!("cbrt", f64::cbrt);
    unary!("sin", f64::sin);
    unary!("cos", f64::cos);
    unary!("tan", f64::tan);
    unary!("log", f64::ln);
    unary!("log2", f64::log2);
    unary!("log10", f64::log10);
    unary!("exp", f64::exp);
    method(agent, &math, "pow", 2, Arc::new(|agent, _, args| {
        let b = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let e = interpreter::to_number(agent, &arg(args, 1)).map_err(unwind_to_js_error)?;
        Ok(Value::Number(b.powf(e)))
    }));
    method(agent, &math, "max", 2, Arc::new(|agent, _, args| {
        let mut m = f64::NEG_INFINITY;
        for a in args {
            let n = interpreter::to_number(agent, a).map_err(unwind_to_js_error)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            m = m.max(n);
        }
        Ok(Value::Number(m))
    }));
    method(agent, &math, "min", 2, Arc::new(|agent, _, args| {
        let mut m = f64::INFINITY;
        for a in args {
            let n = interpreter::to_number(agent, a).map_err(unwind_to_js_error)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            m = m.min(n);
        }
        Ok(Value::Number(m))
    }));
    method(agent, &math, "random", 0, Arc::new(|_, _, _| Ok(Value::Number(rand::random::<f64>()))));
    agent.realm.global_object.define_data_property(PropertyKey::from_str("Math"), Value::Object(math), true, false, true);
}

#[cfg(feature = "json")]
fn install_json(agent: &mut Agent) {
    let json = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
    method(agent, &json, "stringify", 3, Arc::new(|agent, _, args| {
        let indent = match arg(args, 2) {
            Value::Number(n) => " ".repeat(n.max(0.0) as usize),
            Value::String(s) => s.to_string(),
            _ => String::new(),
        };
        match stringify_value(agent, &arg(args, 0), &indent, 0)? {
            Some(s) => Ok(Value::string(s)),
            None => Ok(Value::Undefined),
        }
    }));
    method(agent, &json, "parse", 2, Arc::new(|agent, _, args| {
        let s = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let mut chars = s.chars().peekable();
        let v = parse_json(agent, &mut chars)?;
        skip_ws(&mut chars);
        if chars.next().is_some() {
            return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Unexpected non-whitespace character after JSON".to_string()));
        }
        Ok(v)
    }));
    agent.realm.global_object.define_data_property(PropertyKey::from_str("JSON"), Value::Object(json), true, false, true);
}

#[cfg(feature = "json")]
fn stringify_value(agent: &mut Agent, v: &Value, indent: &str, depth: usize) -> crate::error::JsResult<Option<String>> {
    match v {
        Value::Undefined => Ok(None),
        Value::Null => Ok(Some("null".to_string())),
        Value::Boolean(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(if n.is_finite() { format_number(*n) } else { "null".to_string() })),
        Value::String(s) => Ok(Some(quote_json(s))),
        Value::BigInt(_) | Value::Symbol(_) => Ok(None),
        Value::Object(o) if o.is_callable() => Ok(None),
        Value::Object(o) => {
            let nl = if indent.is_empty() { "" } else { "\n" };
            let pad = indent.repeat(depth + 1);
            let close_pad = indent.repeat(depth);
            if matches!(o.0.lock().unwrap().kind, ObjectKind::Array) {
                let len = match o.get_own_data(&PropertyKey::from_str("length")) { Some(Value::Number(n)) => n as usize, _ => 0 };
                let mut parts = Vec::new();
                for i in 0..len {
                    let item = o.get_own_data(&PropertyKey::from_index(i)).unwrap_or(Value::Undefined);
                    parts.push(stringify_value(agent, &item, indent, depth + 1)?.unwrap_or_else(|| "null".to_string()));
                }
                if parts.is_empty() {
                    return Ok(Some("[]".to_string()));
                }
                Ok(Some(format!("[{nl}{}{}{nl}{close_pad}]", pad, parts.join(&format!(",{nl}{pad}")))))
            } else {
                let mut parts = Vec::new();
                for k in o.own_keys() {
                    let PropertyKey::String(name) = &k else { continue };
                    let value = interpreter::get_property_value(agent, v, &k).map_err(crate::interpreter::unwind_to_js_error)?;
                    if let Some(s) = stringify_value(agent, &value, indent, depth + 1)? {
                        parts.push(format!("{}:{}{}", quote_json(name), if indent.is_empty() { "" } else { " " }, s));
                    }
                }
                if parts.is_empty() {
                    return Ok(Some("{}".to_string()));
                }
                Ok(Some(format!("{{{nl}{}{}{nl}{close_pad}}}", pad, parts.join(&format!(",{nl}{pad}")))))
            }
        }
    }
}

#[cfg(feature = "json")]
fn quote_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(feature = "json")]
fn skip_ws(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

#[cfg(feature = "json")]
fn parse_json(agent: &mut Agent, chars: &mut std::iter::Peekable<std::str::Chars>) -> crate::error::JsResult<Value> {
    skip_ws(chars);
    match chars.peek().copied() {
        Some('"') => {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some('/') => s.push('/'),
                        Some('u') => {
                            let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                            if let Ok(code) = u32::from_str_radix(&hex, 16) {
                                if let Some(c) = char::from_u32(code) {
                                    s.push(c);
                                }
                            }
                        }
                        _ => {}
                    },
                    Some(c) => s.push(c),
                    None => return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Unexpected end of JSON input".to_string())),
                }
            }
            Ok(Value::string(s))
        }
        Some('{') => {
            chars.next();
            let obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
            skip_ws(chars);
            if chars.peek() == Some(&'}') {
                chars.next();
                return Ok(Value::Object(obj));
            }
            loop {
                skip_ws(chars);
                let key = match parse_json(agent, chars)? { Value::String(s) => s, _ => return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Expected string key".to_string())) };
                skip_ws(chars);
                if chars.next() != Some(':') {
                    return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Expected ':'".to_string()));
                }
                let value = parse_json(agent, chars)?;
                obj.define_data_property(PropertyKey::from_str(&key), value, true, true, true);
                skip_ws(chars);
                match chars.next() {
                    Some(',') => continue,
                    Some('}') => break,
                    _ => return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Expected ',' or '}'".to_string())),
                }
            }
            Ok(Value::Object(obj))
        }
        Some('[') => {
            chars.next();
            let mut elems = Vec::new();
            skip_ws(chars);
            if chars.peek() == Some(&']') {
                chars.next();
                return Ok(interpreter::make_array(agent, elems));
            }
            loop {
                elems.push(parse_json(agent, chars)?);
                skip_ws(chars);
                match chars.next() {
                    Some(',') => continue,
                    Some(']') => break,
                    _ => return Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Expected ',' or ']'".to_string())),
                }
            }
            Ok(interpreter::make_array(agent, elems))
        }
        Some('t') => { for _ in 0..4 { chars.next(); } Ok(Value::Boolean(true)) }
        Some('f') => { for _ in 0..5 { chars.next(); } Ok(Value::Boolean(false)) }
        Some('n') => { for _ in 0..4 { chars.next(); } Ok(Value::Null) }
        Some(c) if c == '-' || c.is_ascii_digit() => {
            let mut s = String::new();
            while matches!(chars.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
                s.push(chars.next().unwrap());
            }
            s.parse::<f64>().map(Value::Number).map_err(|_| interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Invalid number in JSON".to_string()))
        }
        _ => Err(interpreter::make_error(agent, &agent.realm.syntax_error_prototype, "Unexpected token in JSON".to_string())),
    }
}
