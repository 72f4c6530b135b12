// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Engine`: the host-facing entry point wrapping an [`Agent`] into a
//! single embeddable type.

use crate::agent::{Agent, ModuleLoader, ModuleResolver, Options};
use crate::error::{EngineError, EngineResult};
use crate::interpreter;
use crate::object::ObjectKind;
use crate::promise::PromiseStatus;
use crate::value::{PropertyKey, Value};
use es_parser::ast::Node;
use std::sync::Arc;

pub struct Engine {
    agent: Agent,
}

impl Engine {
    pub fn new() -> Self {
        Engine { agent: Agent::new(Options::default()) }
    }

    pub fn with_options(options: Options) -> Self {
        Engine { agent: Agent::new(options) }
    }

    /// Gives the host direct access to the underlying agent -- builtins
    /// that need to reach into realm internals (a test harness polyfill,
    /// a custom global) go through here rather than a bespoke method per
    /// use case.
    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub fn evaluate(&mut self, source: &str) -> EngineResult<Value> {
        let out = es_parser::parse(source, false)?;
        let arena = Arc::new(out.arena);
        let Node::Program(program) = &arena[out.program] else {
            unreachable!("parse() always roots a Program node")
        };
        let value = interpreter::run_program(&mut self.agent, arena.clone(), program)?;
        Ok(value)
    }

    /// Evaluates `source` as a module and returns its namespace object.
    pub fn evaluate_module(&mut self, source: &str) -> EngineResult<Value> {
        let out = es_parser::parse(source, true)?;
        let arena = Arc::new(out.arena);
        let Node::Program(program) = &arena[out.program] else {
            unreachable!("parse() always roots a Program node")
        };
        let ns = interpreter::run_module(&mut self.agent, arena.clone(), program)?;
        Ok(Value::Object(ns))
    }

    /// Evaluates `source`, then drains microtasks and due timers until any
    /// promise the top-level completion produced settles.
    ///
    /// The workspace carries no `tokio`/`futures` dependency, only a
    /// hand-rolled job queue, so this is a synchronous drain rather than a
    /// literal `impl Future` -- recorded
    /// as a deliberate simplification in DESIGN.md. A host embedding this
    /// in an async context should call `evaluate` and poll
    /// `run_pending_tasks` from its own reactor instead.
    pub fn evaluate_async(&mut self, source: &str) -> EngineResult<Value> {
        let value = self.evaluate(source)?;
        self.settle_if_promise(value)
    }

    fn settle_if_promise(&mut self, value: Value) -> EngineResult<Value> {
        let Value::Object(obj) = &value else { return Ok(value) };
        if !matches!(obj.0.lock().unwrap().kind, ObjectKind::Promise(_)) {
            return Ok(value);
        }
        let mut spins = 0usize;
        loop {
            match crate::promise::status(obj) {
                PromiseStatus::Pending => {
                    self.run_pending_tasks();
                    spins += 1;
                    if spins >= self.agent.options.max_microtask_drain {
                        return Err(EngineError::Evaluation(crate::error::JsError::new(Value::string(
                            "evaluate_async: promise never settled",
                        ))));
                    }
                }
                PromiseStatus::Fulfilled => {
                    let result = match &obj.0.lock().unwrap().kind {
                        ObjectKind::Promise(state) => state.result.clone().unwrap_or(Value::Undefined),
                        _ => Value::Undefined,
                    };
                    return Ok(result);
                }
                PromiseStatus::Rejected => {
                    let result = match &obj.0.lock().unwrap().kind {
                        ObjectKind::Promise(state) => state.result.clone().unwrap_or(Value::Undefined),
                        _ => Value::Undefined,
                    };
                    return Err(EngineError::Evaluation(crate::error::JsError::new(result)));
                }
            }
        }
    }

    /// Defines (or overwrites) a binding directly on `globalThis`.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.agent.realm.global_object.define_data_property(PropertyKey::from_str(name), value, true, false, true);
    }

    pub fn set_module_loader(&mut self, loader: impl FnMut(&mut Agent, &str) -> crate::error::JsResult<Value> + 'static) {
        self.agent.module_loader = Some(Box::new(loader) as ModuleLoader);
    }

    pub fn set_module_resolver(&mut self, resolver: impl FnMut(&str) -> String + 'static) {
        self.agent.module_resolver = Some(Box::new(resolver) as ModuleResolver);
    }

    /// Runs one pass of due timers, draining the microtask queue after
    /// each one fires (matching how a real event loop interleaves
    /// macrotasks and microtasks), then drains whatever is left.
    pub fn run_pending_tasks(&mut self) {
        self.agent.drain_microtasks();
        for due in self.agent.event_loop.pop_due() {
            if let Err(err) = interpreter::call_function(&mut self.agent, &due.callback, Value::Undefined, &due.args) {
                self.agent.report_uncaught("timer callback", &err);
            }
            self.agent.drain_microtasks();
        }
    }

    /// `true` once there is nothing left to drive: no pending microtasks
    /// and no outstanding timers.
    pub fn is_idle(&self) -> bool {
        self.agent.microtasks.is_empty() && self.agent.event_loop.is_empty()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
