// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed error surface (C12): distinguishes a parse failure from a thrown
//! script value from a host-facing wrapper around both.

use crate::value::Value;
use std::fmt;

/// A thrown ECMAScript value, carried out of the evaluator through `?`.
/// Most thrown values are `Error` instances, but `throw 1` is legal too,
/// so this wraps a bare [`Value`] rather than requiring an Error object.
#[derive(Debug, Clone)]
pub struct JsError(Value);

impl JsError {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::Object(obj) => {
                if let Some(message) = obj.get_own_string("message") {
                    let name = obj
                        .get_own_string("name")
                        .unwrap_or_else(|| "Error".to_string());
                    write!(f, "{name}: {message}")
                } else {
                    write!(f, "{}", self.0.to_display_string())
                }
            }
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl std::error::Error for JsError {}

pub type JsResult<T> = std::result::Result<T, JsError>;

/// Host-facing error: either the source never made it to an AST, or it
/// did and then threw. Kept as a plain enum with hand-written `Display`
/// rather than pulling in an error-derive crate for this one type.
#[derive(Debug)]
pub enum EngineError {
    Parse(es_parser::ParseError),
    Evaluation(JsError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Parse(e) => write!(f, "parse error: {e}"),
            EngineError::Evaluation(e) => write!(f, "uncaught exception: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<es_parser::ParseError> for EngineError {
    fn from(e: es_parser::ParseError) -> Self {
        EngineError::Parse(e)
    }
}

impl From<JsError> for EngineError {
    fn from(e: JsError) -> Self {
        EngineError::Evaluation(e)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
