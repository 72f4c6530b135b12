// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Date` and `RegExp`.
//!
//! `Date` does not pull in `chrono`/`time` (Open Question #2 in
//! DESIGN.md): neither crate is in the workspace dependency table, so
//! dates are hand-parsed and timestamps are tracked
//! as milliseconds-since-epoch `f64` and broken into calendar fields with
//! Howard Hinnant's `civil_from_days` algorithm, computed against the
//! host's UTC offset via `std::time::SystemTime` (no time zone database).

use super::{arg, constructor, method};
use crate::agent::Agent;
use crate::interpreter::{self, unwind_to_js_error};
use crate::object::ObjectKind;
use crate::value::{PropertyKey, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as f64).unwrap_or(0.0)
}

/// Days since the epoch -> (year, month 1-12, day 1-31). Howard Hinnant's
/// `civil_from_days`, the standard constant-time Gregorian conversion.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if m > 2 { m - 3 } else { m + 9 } as u64;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

struct Fields {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    ms: u32,
    weekday: u32,
}

fn fields_of(t: f64) -> Option<Fields> {
    if !t.is_finite() {
        return None;
    }
    let total_ms = t as i64;
    let days = total_ms.div_euclid(86_400_000);
    let ms_of_day = total_ms.rem_euclid(86_400_000);
    let (year, month, day) = civil_from_days(days);
    let weekday = (days.rem_euclid(7) + 4).rem_euclid(7) as u32; // 1970-01-01 was a Thursday
    Some(Fields {
        year,
        month,
        day,
        hour: (ms_of_day / 3_600_000) as u32,
        minute: ((ms_of_day / 60_000) % 60) as u32,
        second: ((ms_of_day / 1_000) % 60) as u32,
        ms: (ms_of_day % 1_000) as u32,
        weekday,
    })
}

fn time_from_fields(year: i64, month: u32, day: u32, hour: u32, minute: u32, second: u32, ms: u32) -> f64 {
    let days = days_from_civil(year, month, day);
    (days * 86_400_000 + hour as i64 * 3_600_000 + minute as i64 * 60_000 + second as i64 * 1_000 + ms as i64) as f64
}

/// A minimal ISO-8601 (`YYYY-MM-DD[THH:mm:ss[.sss]][Z]`) parser, the one
/// format `new Date(string)` is required to understand.
fn parse_iso(s: &str) -> Option<f64> {
    let s = s.trim();
    let bytes: Vec<char> = s.chars().collect();
    if bytes.len() < 10 {
        return None;
    }
    let year: i64 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(5..7)?.parse().ok()?;
    let day: u32 = s.get(8..10)?.parse().ok()?;
    let (mut hour, mut minute, mut second, mut ms) = (0u32, 0u32, 0u32, 0u32);
    if s.len() > 10 {
        let rest = &s[10..];
        let rest = rest.trim_start_matches(['T', ' ']);
        let rest = rest.trim_end_matches('Z');
        let mut parts = rest.split(':');
        hour = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        minute = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        if let Some(sec_part) = parts.next() {
            let mut sp = sec_part.split('.');
            second = sp.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            ms = sp.next().and_then(|p| p.get(0..3).unwrap_or(p).parse().ok()).unwrap_or(0);
        }
    }
    Some(time_from_fields(year, month, day, hour, minute, second, ms))
}

pub fn install(agent: &mut Agent) {
    #[cfg(feature = "date")]
    install_date(agent);
    #[cfg(feature = "regexp")]
    install_regexp(agent);
}

#[cfg(feature = "date")]
fn install_date(agent: &mut Agent) {
    let proto = agent.realm.date_prototype.clone();

    macro_rules! getter {
        ($name:literal, $field:ident) => {
            method(agent, &proto, $name, 0, Arc::new(|_, this, _| {
                let Value::Object(o) = this else { return Ok(Value::Number(f64::NAN)) };
                let t = match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => return Ok(Value::Number(f64::NAN)) };
                match fields_of(t) {
                    Some(f) => Ok(Value::Number(f.$field as f64)),
                    None => Ok(Value::Number(f64::NAN)),
                }
            }));
        };
    }
    getter!("getFullYear", year);
    getter!("getDate", day);
    getter!("getHours", hour);
    getter!("getMinutes", minute);
    getter!("getSeconds", second);
    getter!("getMilliseconds", ms);
    getter!("getDay", weekday);
    method(agent, &proto, "getMonth", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = this else { return Ok(Value::Number(f64::NAN)) };
        let t = match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => return Ok(Value::Number(f64::NAN)) };
        Ok(fields_of(t).map(|f| Value::Number((f.month - 1) as f64)).unwrap_or(Value::Number(f64::NAN)))
    }));
    method(agent, &proto, "getTime", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = this else { return Ok(Value::Number(f64::NAN)) };
        Ok(Value::Number(match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => f64::NAN }))
    }));
    method(agent, &proto, "valueOf", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = this else { return Ok(Value::Number(f64::NAN)) };
        Ok(Value::Number(match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => f64::NAN }))
    }));
    method(agent, &proto, "toISOString", 0, Arc::new(|agent, this, _| {
        let Value::Object(o) = this else { return Err(interpreter::make_error(agent, &agent.realm.type_error_prototype, "not a Date".to_string())) };
        let t = match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => f64::NAN };
        let Some(f) = fields_of(t) else { return Err(interpreter::make_error(agent, &agent.realm.range_error_prototype, "Invalid time value".to_string())) };
        Ok(Value::string(format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z", f.year, f.month, f.day, f.hour, f.minute, f.second, f.ms)))
    }));
    method(agent, &proto, "toString", 0, Arc::new(|agent, this, _| {
        let Value::Object(o) = this else { return Ok(Value::string("Invalid Date")) };
        let t = match o.0.lock().unwrap().kind { ObjectKind::Date(t) => t, _ => f64::NAN };
        match fields_of(t) {
            Some(f) => Ok(Value::string(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", f.year, f.month, f.day, f.hour, f.minute, f.second))),
            None => { let _ = agent; Ok(Value::string("Invalid Date")) }
        }
    }));

    let ctor = constructor(agent, "Date", 7, &proto, Arc::new(|agent, _, args| {
        let t = match args.len() {
            0 => now_ms(),
            1 => match &args[0] {
                Value::String(s) => parse_iso(s).unwrap_or(f64::NAN),
                other => interpreter::to_number(agent, other).map_err(unwind_to_js_error)?,
            },
            _ => {
                let y = interpreter::to_number(agent, &arg(args, 0)).map_err(unwind_to_js_error)? as i64;
                let year = if (0..=99).contains(&y) { 1900 + y } else { y };
                let month = interpreter::to_number(agent, &arg(args, 1)).map_err(unwind_to_js_error)? as u32 + 1;
                let day = if args.len() > 2 { interpreter::to_number(agent, &args[2]).map_err(unwind_to_js_error)? as u32 } else { 1 };
                let hour = if args.len() > 3 { interpreter::to_number(agent, &args[3]).map_err(unwind_to_js_error)? as u32 } else { 0 };
                let minute = if args.len() > 4 { interpreter::to_number(agent, &args[4]).map_err(unwind_to_js_error)? as u32 } else { 0 };
                let second = if args.len() > 5 { interpreter::to_number(agent, &args[5]).map_err(unwind_to_js_error)? as u32 } else { 0 };
                let ms = if args.len() > 6 { interpreter::to_number(agent, &args[6]).map_err(unwind_to_js_error)? as u32 } else { 0 };
                time_from_fields(year, month, day, hour, minute, second, ms)
            }
        };
        Ok(Value::Object(crate::object::JsObject::new(ObjectKind::Date(t), Some(agent.realm.date_prototype.clone()))))
    }));
    method(agent, &ctor, "now", 0, Arc::new(|_, _, _| Ok(Value::Number(now_ms()))));
    method(agent, &ctor, "parse", 1, Arc::new(|agent, _, args| {
        let s = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        Ok(Value::Number(parse_iso(&s).unwrap_or(f64::NAN)))
    }));
}

#[cfg(feature = "regexp")]
fn install_regexp(agent: &mut Agent) {
    let proto = agent.realm.regexp_prototype.clone();
    method(agent, &proto, "test", 1, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Boolean(false)) };
        let subject = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let data = o.0.lock().unwrap();
        match &data.kind {
            ObjectKind::RegExp(r) => Ok(Value::Boolean(r.compiled.as_ref().map(|re| re.is_match(&subject)).unwrap_or(false))),
            _ => Ok(Value::Boolean(false)),
        }
    }));
    method(agent, &proto, "exec", 1, Arc::new(|agent, this, args| {
        let Value::Object(o) = &this else { return Ok(Value::Null) };
        let subject = interpreter::to_js_string(agent, &arg(args, 0)).map_err(unwind_to_js_error)?;
        let (compiled, last_index, global) = {
            let data = o.0.lock().unwrap();
            match &data.kind {
                ObjectKind::RegExp(r) => (r.compiled.clone(), r.last_index, r.flags.contains('g')),
                _ => return Ok(Value::Null),
            }
        };
        let Some(re) = compiled else { return Ok(Value::Null) };
        let start = if global { last_index.min(subject.len()) } else { 0 };
        match re.find(&subject[start..]) {
            Some(m) => {
                if global {
                    if let ObjectKind::RegExp(r) = &mut o.0.lock().unwrap().kind {
                        r.last_index = start + m.end();
                    }
                }
                Ok(interpreter::make_array(agent, vec![Value::string(m.as_str().to_string())]))
            }
            None => {
                if global {
                    if let ObjectKind::RegExp(r) = &mut o.0.lock().unwrap().kind {
                        r.last_index = 0;
                    }
                }
                Ok(Value::Null)
            }
        }
    }));
    method(agent, &proto, "toString", 0, Arc::new(|_, this, _| {
        let Value::Object(o) = this else { return Ok(Value::string("/(?:)/")) };
        let data = o.0.lock().unwrap();
        match &data.kind {
            ObjectKind::RegExp(r) => Ok(Value::string(format!("/{}/{}", r.source, r.flags))),
            _ => Ok(Value::string("/(?:)/")),
        }
    }));

    constructor(agent, "RegExp", 2, &proto, Arc::new(|agent, _, args| {
        let (pattern, flags) = match arg(args, 0) {
            Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::RegExp(_)) => {
                let data = o.0.lock().unwrap();
                match &data.kind {
                    ObjectKind::RegExp(r) => (r.source.to_string(), r.flags.to_string()),
                    _ => unreachable!(),
                }
            }
            other => (interpreter::to_js_string(agent, &other).map_err(unwind_to_js_error)?, String::new()),
        };
        let flags = match arg(args, 1) {
            Value::Undefined => flags,
            v => interpreter::to_js_string(agent, &v).map_err(unwind_to_js_error)?,
        };
        interpreter::make_regexp(agent, &pattern, &flags).map_err(unwind_to_js_error)
    }));
}
