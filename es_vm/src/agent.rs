// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `Agent` (C5/C9 glue): one interpreter instance's realm, execution
//! context stack, job queues, and host hooks. Named after the ECMA-262
//! "Agent" concept.

use crate::environment::Environment;
use crate::error::JsResult;
use crate::object::JsObject;
use crate::value::{Value, WellKnownSymbols};
use ahash::AHashMap;
use es_parser::ast::Node;
use generational_arena::Arena;
use std::collections::VecDeque;
use std::sync::Arc;

/// Host hook backing `import`/`import()`: given a module specifier,
/// resolves, parses, evaluates it (however the host sees fit) and returns
/// its namespace object. Installed via `Engine::set_module_loader`.
pub type ModuleLoader = Box<dyn FnMut(&mut Agent, &str) -> JsResult<Value>>;

/// Host hook backing specifier resolution: turns a raw `import`
/// specifier (possibly relative) into the canonical string the module
/// cache keys on, before a [`ModuleLoader`] ever sees it. Installed via
/// `Engine::set_module_resolver`; defaults to the identity function.
pub type ModuleResolver = Box<dyn FnMut(&str) -> String>;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Reject writes to undeclared globals instead of creating them, as
    /// non-strict top-level assignment would.
    pub strict_globals: bool,
    /// Safety valve for tests: how many microtasks `run_pending_tasks`
    /// will drain before giving up on a runaway `.then` chain.
    pub max_microtask_drain: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { strict_globals: false, max_microtask_drain: 100_000 }
    }
}

/// All the per-realm intrinsic prototypes and constructors the evaluator
/// and builtins need quick access to, without a separate indirection layer.
#[derive(Debug, Clone)]
pub struct Realm {
    pub global_env: Environment,
    pub global_object: JsObject,
    pub object_prototype: JsObject,
    pub function_prototype: JsObject,
    pub array_prototype: JsObject,
    pub string_prototype: JsObject,
    pub number_prototype: JsObject,
    pub boolean_prototype: JsObject,
    pub symbol_prototype: JsObject,
    pub bigint_prototype: JsObject,
    pub error_prototype: JsObject,
    pub type_error_prototype: JsObject,
    pub range_error_prototype: JsObject,
    pub reference_error_prototype: JsObject,
    pub syntax_error_prototype: JsObject,
    pub map_prototype: JsObject,
    pub set_prototype: JsObject,
    pub weak_map_prototype: JsObject,
    pub weak_set_prototype: JsObject,
    pub promise_prototype: JsObject,
    pub regexp_prototype: JsObject,
    pub date_prototype: JsObject,
    pub generator_prototype: JsObject,
    pub array_buffer_prototype: JsObject,
    pub typed_array_prototype: JsObject,
    pub well_known_symbols: WellKnownSymbols,
}

/// One frame of the execution-context stack: the running function (if
/// any), `this`, and the lexical/variable environment pair active while
/// it runs.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub function: Option<JsObject>,
    pub this_value: Value,
    pub lexical_env: Environment,
    pub variable_env: Environment,
    /// The arena backing whatever code is currently running, so the
    /// evaluator never has to thread it through every call -- a script's
    /// top-level context and every closure defined within it share one.
    pub arena: Arc<Arena<Node>>,
    pub in_generator: bool,
    pub in_async: bool,
    /// `new.target` inside this context: the constructor a `new`
    /// expression is building, or `Value::Undefined` for an ordinary call.
    pub new_target: Value,
    pub home_object: Option<JsObject>,
}

/// A queued microtask: promise reactions and the async-function resume
/// steps both enqueue one of these rather than running synchronously.
pub type Job = Box<dyn FnOnce(&mut Agent)>;

pub struct Agent {
    pub realm: Realm,
    pub execution_context_stack: Vec<ExecutionContext>,
    pub microtasks: VecDeque<Job>,
    pub event_loop: crate::event_loop::EventLoop,
    pub options: Options,
    pub module_loader: Option<ModuleLoader>,
    pub module_resolver: Option<ModuleResolver>,
    module_cache: AHashMap<Box<str>, Value>,
}

impl Agent {
    /// Builds a fresh agent: a new realm (global object plus every
    /// intrinsic prototype, populated by [`crate::builtins::create_realm`])
    /// and an empty job/timer/module state.
    pub fn new(options: Options) -> Self {
        let realm = crate::builtins::create_realm();
        let global_ctx = ExecutionContext {
            function: None,
            this_value: Value::Object(realm.global_object.clone()),
            lexical_env: realm.global_env.clone(),
            variable_env: realm.global_env.clone(),
            arena: Arc::new(Arena::new()),
            in_generator: false,
            in_async: false,
            new_target: Value::Undefined,
            home_object: None,
        };
        let mut agent = Agent {
            realm,
            execution_context_stack: vec![global_ctx],
            microtasks: VecDeque::new(),
            event_loop: crate::event_loop::EventLoop::new(),
            options,
            module_loader: None,
            module_resolver: None,
            module_cache: AHashMap::new(),
        };
        crate::builtins::install(&mut agent);
        agent
    }

    pub fn current_context(&self) -> &ExecutionContext {
        self.execution_context_stack.last().expect("execution context stack is never empty")
    }

    pub fn current_context_mut(&mut self) -> &mut ExecutionContext {
        self.execution_context_stack.last_mut().expect("execution context stack is never empty")
    }

    pub fn push_context(&mut self, ctx: ExecutionContext) {
        self.execution_context_stack.push(ctx);
    }

    pub fn pop_context(&mut self) {
        self.execution_context_stack.pop();
    }

    pub fn enqueue_microtask(&mut self, job: Job) {
        self.microtasks.push_back(job);
    }

    /// Drains the microtask queue to completion (jobs may enqueue more of
    /// themselves), bounded by `options.max_microtask_drain` so a buggy
    /// `.then` cycle can't hang the host forever.
    pub fn drain_microtasks(&mut self) {
        let mut drained = 0usize;
        while let Some(job) = self.microtasks.pop_front() {
            job(self);
            drained += 1;
            if drained >= self.options.max_microtask_drain {
                tracing::error!("microtask queue exceeded max_microtask_drain, aborting drain");
                break;
            }
        }
    }

    /// Reports an error that has nowhere else to go: an unhandled
    /// rejection, or an exception thrown from a timer callback.
    pub fn report_uncaught(&self, context: &str, error: &crate::error::JsError) {
        tracing::error!(%context, error = %error, "uncaught error");
    }

    /// `import`/`import()`: resolves `specifier` through the host-supplied
    /// [`ModuleLoader`], caching the resulting namespace so a module
    /// graph with diamond dependencies only evaluates each node once.
    pub fn load_module(&mut self, specifier: &str) -> JsResult<Value> {
        let mut resolver = self.module_resolver.take();
        let resolved = match &mut resolver {
            Some(f) => f(specifier),
            None => specifier.to_string(),
        };
        self.module_resolver = resolver;
        if let Some(v) = self.module_cache.get(resolved.as_str()) {
            return Ok(v.clone());
        }
        let mut loader = self.module_loader.take();
        let result = match &mut loader {
            Some(f) => f(self, &resolved),
            None => Err(crate::error::JsError::new(Value::string(format!("no module loader configured to resolve '{resolved}'")))),
        };
        self.module_loader = loader;
        if let Ok(v) = &result {
            self.module_cache.insert(Box::from(resolved.as_str()), v.clone());
        }
        result
    }
}
