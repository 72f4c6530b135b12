// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Function objects (C6 elaboration): native (Rust-backed) functions and
//! script closures over a parsed [`es_parser::ast::Params`] node plus the
//! environment they close over.

use crate::agent::Agent;
use crate::environment::Environment;
use crate::error::JsResult;
use crate::object::JsObject;
use crate::value::Value;
use es_parser::ast::{FunctionKind, Node, NodeRef};
use generational_arena::Arena;
use std::sync::Arc;

pub type NativeFn = Arc<dyn Fn(&mut Agent, Value, &[Value]) -> JsResult<Value> + Send + Sync>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: Arc<str>,
    pub length: u32,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

/// A class's instance-field initializers, run in declaration order at the
/// start of `[[Construct]]` (after `super()` returns, for derived classes).
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub key: NodeRef,
    pub computed: bool,
    pub value: NodeRef,
}

#[derive(Debug, Clone)]
pub struct ClosureData {
    pub name: Arc<str>,
    pub arena: Arc<Arena<Node>>,
    pub params: NodeRef,
    pub env: Environment,
    pub kind: FunctionKind,
    pub is_arrow: bool,
    /// `[[HomeObject]]`, used to resolve `super` member lookups.
    pub home_object: Option<JsObject>,
    /// Set on the function produced by a class declaration/expression;
    /// governs whether `f()` (without `new`) is a `TypeError`.
    pub is_class_constructor: bool,
    pub field_inits: Arc<[FieldInit]>,
    pub derived_from: Option<JsObject>,
}

#[derive(Debug, Clone)]
pub enum FunctionData {
    Native(NativeFunction),
    Closure(Box<ClosureData>),
}

impl FunctionData {
    pub fn name(&self) -> Arc<str> {
        match self {
            FunctionData::Native(n) => n.name.clone(),
            FunctionData::Closure(c) => c.name.clone(),
        }
    }

    pub fn length(&self) -> u32 {
        match self {
            FunctionData::Native(n) => n.length,
            FunctionData::Closure(c) => {
                let params = match &c.arena[c.params] {
                    Node::Function(p) | Node::Arrow(p) | Node::FunctionDecl(p) => p,
                    _ => return 0,
                };
                params
                    .params
                    .iter()
                    .take_while(|p| !matches!(c.arena.get(**p), Some(Node::PatternDefault(_)) | Some(Node::RestElement(_))))
                    .count() as u32
            }
        }
    }
}
