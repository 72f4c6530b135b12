use es_vm::{Engine, Value};

pub fn eval(source: &str) -> Value {
    let mut engine = Engine::new();
    match engine.evaluate(source) {
        Ok(value) => value,
        Err(err) => panic!("unexpected evaluation error for `{source}`: {err}"),
    }
}

pub fn eval_async(source: &str) -> Value {
    let mut engine = Engine::new();
    match engine.evaluate_async(source) {
        Ok(value) => value,
        Err(err) => panic!("unexpected evaluation error for `{source}`: {err}"),
    }
}

pub fn eval_number(source: &str) -> f64 {
    match eval(source) {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?} for `{source}`"),
    }
}

pub fn eval_string(source: &str) -> String {
    match eval(source) {
        Value::String(s) => s.to_string(),
        other => panic!("expected a string, got {other:?} for `{source}`"),
    }
}

pub fn eval_bool(source: &str) -> bool {
    match eval(source) {
        Value::Boolean(b) => b,
        other => panic!("expected a boolean, got {other:?} for `{source}`"),
    }
}

pub fn eval_err(source: &str) -> String {
    let mut engine = Engine::new();
    match engine.evaluate(source) {
        Ok(value) => panic!("expected `{source}` to throw, got {value:?}"),
        Err(err) => err.to_string(),
    }
}
