// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tree-walking evaluator (C8): statement and expression execution
//! over the arena-backed AST, function calling, class instantiation, and
//! the abstract operations (`[[Get]]`/`[[Set]]`, `ToNumber`, the iterator
//! protocol, ...) everything else is built on.
//!
//! Generator and async function bodies run through exactly the same
//! `exec_stmt`/`eval_expr` as an ordinary function; the only special case
//! is `Yield`/`Await`, which hands control to whatever
//! [`crate::generator::GeneratorHandle`] is parked in [`CURRENT_COROUTINE`]
//! for the thread currently running.

use crate::agent::{Agent, ExecutionContext};
use crate::environment::Environment;
use crate::error::{JsError, JsResult};
use crate::function::{ClosureData, FieldInit, FunctionData, NativeFunction};
use crate::generator::{GeneratorHandle, GeneratorState, HostMessage, ResumeResult};
use crate::object::{JsObject, ObjectKind, PropertyDescriptor};
use crate::value::{format_number, PropertyKey, Symbol, Value};
use es_parser::ast::*;
use generational_arena::Arena;
use std::cell::Cell;
use std::sync::Arc;

thread_local! {
    /// The coroutine handle for the generator/async frame running on this
    /// OS thread, if any. Null on the driver thread and on plain (non-
    /// generator) function calls.
    static CURRENT_COROUTINE: Cell<*mut GeneratorHandle> = const { Cell::new(std::ptr::null_mut()) };

    /// Exported-name accumulator for the module currently being
    /// instantiated, pushed by `run_module` and popped when it returns;
    /// a stack rather than a single slot so a module's top level can
    /// itself trigger (synchronous) evaluation of another module.
    static MODULE_EXPORTS: std::cell::RefCell<Vec<ahash::AHashMap<Box<str>, Value>>> = const { std::cell::RefCell::new(Vec::new()) };
}

fn export_value(name: Box<str>, value: Value) {
    MODULE_EXPORTS.with(|stack| {
        if let Some(top) = stack.borrow_mut().last_mut() {
            top.insert(name, value);
        }
    });
}

/// Non-local exits from statement/expression evaluation. `Throw` is the
/// ordinary error path; the rest model `return`/`break`/`continue`
/// propagating out through arbitrarily nested blocks, and also the
/// completion a suspended `yield` resumes with when the generator's
/// `.return(value)` is called from outside.
pub enum Unwind {
    Throw(JsError),
    Return(Value),
    Break(Option<Box<str>>),
    Continue(Option<Box<str>>),
}

impl From<JsError> for Unwind {
    fn from(e: JsError) -> Self {
        Unwind::Throw(e)
    }
}

pub type EvalResult<T> = Result<T, Unwind>;

fn throw(agent: &Agent, message: impl Into<String>) -> Unwind {
    Unwind::Throw(make_error(agent, &agent.realm.type_error_prototype, message.into()))
}

fn reference_error(agent: &Agent, message: impl Into<String>) -> Unwind {
    Unwind::Throw(make_error(agent, &agent.realm.reference_error_prototype, message.into()))
}

pub fn make_error(agent: &Agent, proto: &JsObject, message: String) -> JsError {
    let obj = JsObject::new(ObjectKind::Error, Some(proto.clone()));
    obj.define_data_property(PropertyKey::from_str("message"), Value::string(message), true, false, true);
    JsError::new(Value::Object(obj))
}

// ---------------------------------------------------------------------
// Program / script entry
// ---------------------------------------------------------------------

/// Runs a parsed script's top-level statements and returns the completion
/// value of the last statement evaluated (used by `Engine::evaluate`,
/// mirroring the REPL's "last expression value" convention).
pub fn run_program(agent: &mut Agent, arena: Arc<Arena<Node>>, program: &Program) -> JsResult<Value> {
    let global_env = agent.realm.global_env.clone();
    agent.push_context(ExecutionContext {
        function: None,
        this_value: Value::Object(agent.realm.global_object.clone()),
        lexical_env: global_env.clone(),
        variable_env: global_env,
        arena,
        in_generator: false,
        in_async: false,
        new_target: Value::Undefined,
        home_object: None,
    });
    let result = (|| {
        hoist(agent, &program.body)?;
        let mut last = Value::Undefined;
        for stmt in program.body.iter() {
            match exec_stmt_value(agent, *stmt) {
                Ok(v) => last = v,
                Err(unwind) => return Err(unwind),
            }
        }
        Ok(last)
    })();
    agent.pop_context();
    result.map_err(unwind_to_js_error)
}

/// Runs a parsed module's top-level statements in their own module
/// environment (never the shared global one, so one module's top-level
/// `let`/`const` can't collide with another's) and returns its namespace
/// object: own properties named after every `export`ed binding.
///
/// Exported live bindings are approximated as a snapshot taken once the
/// module body finishes running; a binding mutated by the module after
/// that point will not be observed by importers. Real live-binding
/// re-export is future work (see DESIGN.md).
pub fn run_module(agent: &mut Agent, arena: Arc<Arena<Node>>, program: &Program) -> JsResult<JsObject> {
    let global_env = agent.realm.global_env.clone();
    let module_env = Environment::new_declarative(Some(global_env));
    agent.push_context(ExecutionContext {
        function: None,
        this_value: Value::Undefined,
        lexical_env: module_env.clone(),
        variable_env: module_env,
        arena,
        in_generator: false,
        in_async: false,
        new_target: Value::Undefined,
        home_object: None,
    });
    MODULE_EXPORTS.with(|stack| stack.borrow_mut().push(ahash::AHashMap::new()));
    let result = (|| {
        hoist(agent, &program.body)?;
        exec_stmt_list(agent, &program.body)
    })();
    agent.pop_context();
    let exports = MODULE_EXPORTS.with(|stack| stack.borrow_mut().pop()).unwrap_or_default();
    result.map_err(unwind_to_js_error)?;
    let namespace = JsObject::new(ObjectKind::Ordinary, None);
    for (name, value) in exports {
        namespace.define_data_property(PropertyKey::from_str(&name), value, false, true, false);
    }
    Ok(namespace)
}

pub fn unwind_to_js_error(u: Unwind) -> JsError {
    match u {
        Unwind::Throw(e) => e,
        Unwind::Return(_) => JsError::new(Value::string("illegal return at top level")),
        Unwind::Break(_) => JsError::new(Value::string("illegal break")),
        Unwind::Continue(_) => JsError::new(Value::string("illegal continue")),
    }
}

fn current_arena(agent: &Agent) -> Arc<Arena<Node>> {
    agent.current_context().arena.clone()
}

// ---------------------------------------------------------------------
// Hoisting
// ---------------------------------------------------------------------

/// A simplified hoisting pass: walks a statement list (not descending
/// into nested function bodies) collecting `var` and function
/// declarations, and declares/initializes them in the current variable
/// environment before the list runs. `let`/`const`/class bindings are
/// declared lazily by their own statement (in the temporal dead zone
/// until then) rather than in this pass.
fn hoist(agent: &mut Agent, body: &[NodeRef]) -> EvalResult<()> {
    let arena = current_arena(agent);
    for node_ref in body {
        hoist_one(agent, &arena, *node_ref)?;
    }
    Ok(())
}

fn hoist_one(agent: &mut Agent, arena: &Arena<Node>, node_ref: NodeRef) -> EvalResult<()> {
    match &arena[node_ref] {
        Node::VarDecl(decl) if matches!(decl.kind, VarKind::Var) => {
            for d in decl.declarators.iter() {
                hoist_pattern_names(agent, arena, d.binding)?;
            }
        }
        Node::FunctionDecl(params) => {
            let name = binding_name(arena, params.name).unwrap_or_default();
            let env = agent.current_context().variable_env.clone();
            let closure = make_closure(agent, node_ref, params.clone(), env, None, false);
            agent.current_context().variable_env.declare_var(Arc::from(name.as_ref()), Value::Object(closure));
        }
        Node::If(if_stmt) => {
            hoist_one(agent, arena, if_stmt.consequent)?;
            if !Node::is_empty_ref(if_stmt.alternate) {
                hoist_one(agent, arena, if_stmt.alternate)?;
            }
        }
        Node::Block(b) => {
            for s in b.body.iter() {
                hoist_var_only(agent, arena, *s)?;
            }
        }
        Node::ForClassic(f) => hoist_var_only(agent, arena, f.body)?,
        Node::ForIn(f) | Node::ForOf(f) => hoist_var_only(agent, arena, f.body)?,
        Node::While(w) | Node::DoWhile(w) => hoist_var_only(agent, arena, w.body)?,
        Node::Try(t) => {
            for s in t.block.iter() {
                hoist_var_only(agent, arena, *s)?;
            }
            if let Node::Catch(c) = &arena[t.handler] {
                for s in c.body.iter() {
                    hoist_var_only(agent, arena, *s)?;
                }
            }
            if let Some(fin) = &t.finalizer {
                for s in fin.iter() {
                    hoist_var_only(agent, arena, *s)?;
                }
            }
        }
        Node::Labeled(l) => hoist_one(agent, arena, l.body)?,
        _ => {}
    }
    Ok(())
}

/// Like `hoist_one`, but skips nested function declarations: a function
/// declared inside a block is scoped to that block, not hoisted to the
/// enclosing function/script the way `var` is.
fn hoist_var_only(agent: &mut Agent, arena: &Arena<Node>, node_ref: NodeRef) -> EvalResult<()> {
    if matches!(&arena[node_ref], Node::FunctionDecl(_)) {
        return Ok(());
    }
    hoist_one(agent, arena, node_ref)
}

fn hoist_pattern_names(agent: &mut Agent, arena: &Arena<Node>, pattern: NodeRef) -> EvalResult<()> {
    for name in pattern_names(arena, pattern) {
        let name: Arc<str> = Arc::from(name.as_ref());
        if !agent.current_context().variable_env.has_binding(&name) {
            agent.current_context().variable_env.declare_var(name, Value::Undefined);
        }
    }
    Ok(())
}

fn binding_name(arena: &Arena<Node>, node_ref: NodeRef) -> Option<Box<str>> {
    match &arena[node_ref] {
        Node::Ident(name) => Some(name.clone()),
        _ => None,
    }
}

fn pattern_names(arena: &Arena<Node>, node_ref: NodeRef) -> Vec<Box<str>> {
    let mut names = Vec::new();
    collect_pattern_names(arena, node_ref, &mut names);
    names
}

fn collect_pattern_names(arena: &Arena<Node>, node_ref: NodeRef, out: &mut Vec<Box<str>>) {
    match &arena[node_ref] {
        Node::Ident(name) => out.push(name.clone()),
        Node::PatternDefault(p) => collect_pattern_names(arena, p.target, out),
        Node::RestElement(inner) => collect_pattern_names(arena, *inner, out),
        Node::ArrayPattern(p) => {
            for el in p.elements.iter() {
                if !Node::is_empty_ref(*el) {
                    collect_pattern_names(arena, *el, out);
                }
            }
        }
        Node::ObjectPattern(p) => {
            for prop in p.props.iter() {
                collect_pattern_names(arena, prop.value, out);
            }
            if !Node::is_empty_ref(p.rest) {
                collect_pattern_names(arena, p.rest, out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

fn exec_stmt_value(agent: &mut Agent, node_ref: NodeRef) -> EvalResult<Value> {
    let arena = current_arena(agent);
    if let Node::ExpressionStmt(expr) = &arena[node_ref] {
        return eval_expr(agent, *expr);
    }
    exec_stmt(agent, node_ref)?;
    Ok(Value::Undefined)
}

fn exec_stmt(agent: &mut Agent, node_ref: NodeRef) -> EvalResult<()> {
    let arena = current_arena(agent);
    match arena[node_ref].clone() {
        Node::Empty | Node::Debugger | Node::FunctionDecl(_) => Ok(()),
        Node::ExpressionStmt(expr) => {
            eval_expr(agent, expr)?;
            Ok(())
        }
        Node::VarDecl(decl) => exec_var_decl(agent, &decl),
        Node::Block(b) => exec_block_new_scope(agent, &b.body),
        Node::If(stmt) => {
            if eval_expr(agent, stmt.test)?.to_boolean() {
                exec_stmt(agent, stmt.consequent)
            } else if !Node::is_empty_ref(stmt.alternate) {
                exec_stmt(agent, stmt.alternate)
            } else {
                Ok(())
            }
        }
        Node::While(w) => exec_loop(agent, None, |agent| Ok(eval_expr(agent, w.test)?.to_boolean()), |_| Ok(()), w.body),
        Node::DoWhile(w) => {
            let mut first = true;
            exec_loop(
                agent,
                None,
                |agent| {
                    if first {
                        first = false;
                        Ok(true)
                    } else {
                        Ok(eval_expr(agent, w.test)?.to_boolean())
                    }
                },
                |_| Ok(()),
                w.body,
            )
        }
        Node::ForClassic(f) => exec_for_classic(agent, &f),
        Node::ForIn(f) => exec_for_in(agent, &f),
        Node::ForOf(f) => exec_for_of(agent, &f),
        Node::Switch(s) => exec_switch(agent, &s),
        Node::Try(t) => exec_try(agent, &t),
        Node::Throw(expr) => Err(Unwind::Throw(JsError::new(eval_expr(agent, expr)?))),
        Node::Return(expr) => {
            let v = if Node::is_empty_ref(expr) { Value::Undefined } else { eval_expr(agent, expr)? };
            Err(Unwind::Return(v))
        }
        Node::Break(label) => Err(Unwind::Break(label)),
        Node::Continue(label) => Err(Unwind::Continue(label)),
        Node::Labeled(l) => exec_labeled(agent, &l),
        Node::ClassDecl(class) => {
            let ctor = eval_class(agent, &class)?;
            if let Some(name) = binding_name(&arena, class.name) {
                let env = agent.current_context().lexical_env.clone();
                env.declare_lexical(Arc::from(name.as_ref()), true, Some(Value::Object(ctor)));
            }
            Ok(())
        }
        Node::With(w) => {
            let obj = to_object(agent, eval_expr(agent, w.lhs)?)?;
            let outer = agent.current_context().lexical_env.clone();
            let with_env = Environment::new_object(obj, Some(outer.clone()));
            agent.current_context_mut().lexical_env = with_env;
            let result = exec_stmt(agent, w.rhs);
            agent.current_context_mut().lexical_env = outer;
            result
        }
        Node::ImportDecl(decl) => exec_import(agent, &decl),
        Node::ExportNamedDecl(decl) => exec_export_named(agent, &decl),
        Node::ExportDefaultDecl(expr_or_decl) => exec_export_default(agent, expr_or_decl),
        Node::ExportAllDecl { source, exported_as } => exec_export_all(agent, &source, exported_as.as_deref()),
        other => unreachable!("not a statement node: {other:?}"),
    }
}

fn exec_var_decl(agent: &mut Agent, decl: &VarDecl) -> EvalResult<()> {
    for d in decl.declarators.iter() {
        let value = if Node::is_empty_ref(d.init) { Value::Undefined } else { eval_expr(agent, d.init)? };
        match decl.kind {
            VarKind::Var => bind_pattern(agent, d.binding, value, BindMode::AssignVar)?,
            VarKind::Let => bind_pattern(agent, d.binding, value, BindMode::DeclareLexical { mutable: true })?,
            VarKind::Const => bind_pattern(agent, d.binding, value, BindMode::DeclareLexical { mutable: false })?,
        }
    }
    Ok(())
}

fn exec_block_new_scope(agent: &mut Agent, body: &[NodeRef]) -> EvalResult<()> {
    let outer = agent.current_context().lexical_env.clone();
    let block_env = Environment::new_declarative(Some(outer.clone()));
    agent.current_context_mut().lexical_env = block_env;
    let result = exec_stmt_list(agent, body);
    agent.current_context_mut().lexical_env = outer;
    result
}

fn exec_stmt_list(agent: &mut Agent, body: &[NodeRef]) -> EvalResult<()> {
    // Function declarations inside this block are bound before any
    // statement runs (block-scoped hoisting), matching top-level hoisting
    // but against the current lexical (not variable) environment.
    let arena = current_arena(agent);
    for node_ref in body {
        if let Node::FunctionDecl(params) = &arena[*node_ref] {
            let name = binding_name(&arena, params.name).unwrap_or_default();
            let env = agent.current_context().lexical_env.clone();
            let closure = make_closure(agent, *node_ref, params.clone(), env.clone(), None, false);
            env.declare_lexical(Arc::from(name.as_ref()), true, Some(Value::Object(closure)));
        }
    }
    for node_ref in body {
        exec_stmt(agent, *node_ref)?;
    }
    Ok(())
}

enum LoopSignal {
    Done,
    Continue,
}

fn run_loop_body(agent: &mut Agent, label: Option<&str>, body: NodeRef) -> EvalResult<LoopSignal> {
    match exec_stmt(agent, body) {
        Ok(()) => Ok(LoopSignal::Continue),
        Err(Unwind::Break(None)) => Ok(LoopSignal::Done),
        Err(Unwind::Break(Some(l))) if Some(l.as_ref()) == label => Ok(LoopSignal::Done),
        Err(Unwind::Continue(None)) => Ok(LoopSignal::Continue),
        Err(Unwind::Continue(Some(l))) if Some(l.as_ref()) == label => Ok(LoopSignal::Continue),
        Err(other) => Err(other),
    }
}

fn exec_loop(
    agent: &mut Agent,
    label: Option<&str>,
    mut test: impl FnMut(&mut Agent) -> EvalResult<bool>,
    mut update: impl FnMut(&mut Agent) -> EvalResult<()>,
    body: NodeRef,
) -> EvalResult<()> {
    loop {
        if !test(agent)? {
            return Ok(());
        }
        match run_loop_body(agent, label, body)? {
            LoopSignal::Done => return Ok(()),
            LoopSignal::Continue => {}
        }
        update(agent)?;
    }
}

fn exec_for_classic(agent: &mut Agent, f: &ForClassic) -> EvalResult<()> {
    let outer = agent.current_context().lexical_env.clone();
    let loop_env = Environment::new_declarative(Some(outer.clone()));
    agent.current_context_mut().lexical_env = loop_env;
    let arena = current_arena(agent);
    if !Node::is_empty_ref(f.init) {
        match &arena[f.init] {
            Node::VarDecl(_) => exec_stmt(agent, f.init)?,
            _ => {
                eval_expr(agent, f.init)?;
            }
        }
    }
    let result = exec_loop(
        agent,
        None,
        |agent| if Node::is_empty_ref(f.test) { Ok(true) } else { Ok(eval_expr(agent, f.test)?.to_boolean()) },
        |agent| {
            if !Node::is_empty_ref(f.update) {
                eval_expr(agent, f.update)?;
            }
            Ok(())
        },
        f.body,
    );
    agent.current_context_mut().lexical_env = outer;
    result
}

enum BindMode {
    AssignVar,
    DeclareLexical { mutable: bool },
}

fn exec_for_in(agent: &mut Agent, f: &ForInOf) -> EvalResult<()> {
    let right = eval_expr(agent, f.right)?;
    if right.is_nullish() {
        return Ok(());
    }
    let obj = to_object(agent, right)?;
    let mut keys = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current = Some(obj);
    while let Some(o) = current {
        for key in o.own_keys() {
            if let PropertyKey::String(s) = &key {
                if seen.insert(s.clone()) {
                    keys.push(s.clone());
                }
            }
        }
        current = o.prototype();
    }
    for key in keys {
        bind_for_target(agent, f.left, Value::string(key))?;
        match run_loop_body(agent, None, f.body)? {
            LoopSignal::Done => break,
            LoopSignal::Continue => {}
        }
    }
    Ok(())
}

fn exec_for_of(agent: &mut Agent, f: &ForInOf) -> EvalResult<()> {
    let right = eval_expr(agent, f.right)?;
    let iterator = if f.is_await { get_async_iterator(agent, right)? } else { get_iterator(agent, right)? };
    loop {
        let step = iterator_step(agent, &iterator)?;
        let Some(value) = step else { break };
        let value = if f.is_await { await_value(agent, value)? } else { value };
        bind_for_target(agent, f.left, value)?;
        match run_loop_body(agent, None, f.body) {
            Ok(LoopSignal::Continue) => {}
            Ok(LoopSignal::Done) => {
                iterator_close(agent, &iterator);
                break;
            }
            Err(unwind) => {
                iterator_close(agent, &iterator);
                return Err(unwind);
            }
        }
    }
    Ok(())
}

fn bind_for_target(agent: &mut Agent, left: NodeRef, value: Value) -> EvalResult<()> {
    let arena = current_arena(agent);
    match &arena[left] {
        Node::VarDecl(decl) => {
            let binding = decl.declarators[0].binding;
            match decl.kind {
                VarKind::Var => bind_pattern(agent, binding, value, BindMode::AssignVar),
                VarKind::Let => bind_pattern(agent, binding, value, BindMode::DeclareLexical { mutable: true }),
                VarKind::Const => bind_pattern(agent, binding, value, BindMode::DeclareLexical { mutable: false }),
            }
        }
        _ => assign_to_target(agent, left, value),
    }
}

fn exec_switch(agent: &mut Agent, s: &Switch) -> EvalResult<()> {
    let discriminant = eval_expr(agent, s.discriminant)?;
    let outer = agent.current_context().lexical_env.clone();
    let switch_env = Environment::new_declarative(Some(outer.clone()));
    agent.current_context_mut().lexical_env = switch_env;

    let mut matched = None;
    for (i, case) in s.cases.iter().enumerate() {
        if Node::is_empty_ref(case.test) {
            continue;
        }
        let test = eval_expr(agent, case.test);
        let test = match test {
            Ok(v) => v,
            Err(unwind) => {
                agent.current_context_mut().lexical_env = outer;
                return Err(unwind);
            }
        };
        if strict_equals(&discriminant, &test) {
            matched = Some(i);
            break;
        }
    }
    let start = matched.or_else(|| s.cases.iter().position(|c| Node::is_empty_ref(c.test)));
    let result = (|| {
        if let Some(start) = start {
            for case in &s.cases[start..] {
                for stmt in case.body.iter() {
                    exec_stmt(agent, *stmt)?;
                }
            }
        }
        Ok(())
    })();
    agent.current_context_mut().lexical_env = outer;
    match result {
        Err(Unwind::Break(None)) => Ok(()),
        other => other,
    }
}

fn exec_try(agent: &mut Agent, t: &Try) -> EvalResult<()> {
    let result = exec_block_new_scope(agent, &t.block);
    let result = match result {
        Err(Unwind::Throw(err)) if !Node::is_empty_ref(t.handler) => {
            let arena = current_arena(agent);
            let Node::Catch(catch) = arena[t.handler].clone() else { unreachable!() };
            let outer = agent.current_context().lexical_env.clone();
            let catch_env = Environment::new_declarative(Some(outer.clone()));
            agent.current_context_mut().lexical_env = catch_env;
            let bind_result = if Node::is_empty_ref(catch.param) {
                Ok(())
            } else {
                bind_pattern(agent, catch.param, err.into_value(), BindMode::DeclareLexical { mutable: true })
            };
            let body_result = bind_result.and_then(|()| exec_stmt_list(agent, &catch.body));
            agent.current_context_mut().lexical_env = outer;
            body_result
        }
        other => other,
    };
    if let Some(finalizer) = &t.finalizer {
        match exec_block_new_scope(agent, finalizer) {
            Ok(()) => result,
            abrupt => abrupt,
        }
    } else {
        result
    }
}

fn exec_labeled(agent: &mut Agent, l: &Labeled) -> EvalResult<()> {
    let arena = current_arena(agent);
    let label: &str = &l.label;
    let result = match &arena[l.body] {
        Node::While(w) => exec_loop(agent, Some(label), |agent| Ok(eval_expr(agent, w.test)?.to_boolean()), |_| Ok(()), w.body),
        Node::ForClassic(_) | Node::ForIn(_) | Node::ForOf(_) | Node::DoWhile(_) => exec_stmt(agent, l.body),
        _ => exec_stmt(agent, l.body),
    };
    match result {
        Err(Unwind::Break(Some(lbl))) if lbl.as_ref() == label => Ok(()),
        other => other,
    }
}

// ---------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------

fn declared_names_of(arena: &Arena<Node>, node_ref: NodeRef) -> Vec<Box<str>> {
    match &arena[node_ref] {
        Node::VarDecl(decl) => decl.declarators.iter().flat_map(|d| pattern_names(arena, d.binding)).collect(),
        Node::FunctionDecl(p) => binding_name(arena, p.name).into_iter().collect(),
        Node::ClassDecl(c) => binding_name(arena, c.name).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn exec_import(agent: &mut Agent, decl: &ImportDecl) -> EvalResult<()> {
    let ns = agent.load_module(&decl.source).map_err(Unwind::Throw)?;
    let env = agent.current_context().lexical_env.clone();
    for spec in decl.specifiers.iter() {
        let value = match spec.kind {
            ImportKind::Namespace => ns.clone(),
            ImportKind::Default => get_property_value(agent, &ns, &PropertyKey::from_str("default"))?,
            ImportKind::Named => get_property_value(agent, &ns, &PropertyKey::from_str(&spec.imported))?,
        };
        env.declare_lexical(Arc::from(spec.local.as_ref()), false, Some(value));
    }
    Ok(())
}

fn exec_export_named(agent: &mut Agent, decl: &ExportNamedDecl) -> EvalResult<()> {
    if !Node::is_empty_ref(decl.declaration) {
        exec_stmt(agent, decl.declaration)?;
        let arena = current_arena(agent);
        for name in declared_names_of(&arena, decl.declaration) {
            let value = eval_ident(agent, &name)?;
            export_value(name, value);
        }
    }
    for (local, exported) in decl.specifiers.iter() {
        let value = if let Some(source) = &decl.source {
            let ns = agent.load_module(source).map_err(Unwind::Throw)?;
            get_property_value(agent, &ns, &PropertyKey::from_str(local))?
        } else {
            eval_ident(agent, local)?
        };
        export_value(exported.clone(), value);
    }
    Ok(())
}

fn exec_export_default(agent: &mut Agent, node_ref: NodeRef) -> EvalResult<()> {
    let arena = current_arena(agent);
    let value = match arena[node_ref].clone() {
        Node::FunctionDecl(params) => Value::Object(make_closure(agent, node_ref, params, agent.current_context().lexical_env.clone(), None, false)),
        Node::ClassDecl(class) => Value::Object(eval_class(agent, &class)?),
        _ => eval_expr(agent, node_ref)?,
    };
    export_value(Box::from("default"), value);
    Ok(())
}

fn exec_export_all(agent: &mut Agent, source: &str, exported_as: Option<&str>) -> EvalResult<()> {
    let ns = agent.load_module(source).map_err(Unwind::Throw)?;
    let Value::Object(ns_obj) = ns else { return Ok(()) };
    if let Some(name) = exported_as {
        export_value(Box::from(name), Value::Object(ns_obj));
    } else {
        for key in ns_obj.own_keys() {
            if let PropertyKey::String(s) = &key {
                if s.as_ref() == "default" {
                    continue;
                }
                if let Some(v) = ns_obj.get_own_data(&key) {
                    export_value(Box::from(s.as_ref()), v);
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Pattern binding (destructuring) and assignment targets
// ---------------------------------------------------------------------

fn bind_pattern(agent: &mut Agent, pattern: NodeRef, value: Value, mode: BindMode) -> EvalResult<()> {
    let arena = current_arena(agent);
    match &arena[pattern] {
        Node::Ident(name) => {
            declare_name(agent, name, value, &mode);
            Ok(())
        }
        Node::PatternDefault(p) => {
            let (target, default) = (p.target, p.default);
            let value = if matches!(value, Value::Undefined) { eval_expr(agent, default)? } else { value };
            bind_pattern(agent, target, value, mode)
        }
        Node::ArrayPattern(p) => {
            let elements = p.elements.clone();
            let iterator = get_iterator(agent, value)?;
            for el in elements.iter() {
                if Node::is_empty_ref(*el) {
                    iterator_step(agent, &iterator)?;
                    continue;
                }
                if let Node::RestElement(inner) = &arena[*el] {
                    let mut rest = Vec::new();
                    while let Some(v) = iterator_step(agent, &iterator)? {
                        rest.push(v);
                    }
                    bind_pattern(agent, *inner, make_array(agent, rest), mode_clone(&mode))?;
                    break;
                }
                let item = iterator_step(agent, &iterator)?.unwrap_or(Value::Undefined);
                bind_pattern(agent, *el, item, mode_clone(&mode))?;
            }
            Ok(())
        }
        Node::ObjectPattern(p) => {
            let props = p.props.clone();
            let rest = p.rest;
            let mut taken = Vec::new();
            for prop in props.iter() {
                let key = property_key_of(agent, prop.key, prop.computed)?;
                taken.push(key.clone());
                let v = get_property_value(agent, &value, &key)?;
                bind_pattern(agent, prop.value, v, mode_clone(&mode))?;
            }
            if !Node::is_empty_ref(rest) {
                let obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
                if let Value::Object(source) = to_object_ref(agent, &value)? {
                    for key in source.own_keys() {
                        if !taken.contains(&key) {
                            if let Some(v) = source.get_own_data(&key) {
                                obj.define_data_property(key, v, true, true, true);
                            }
                        }
                    }
                }
                bind_pattern(agent, rest, Value::Object(obj), mode_clone(&mode))?;
            }
            Ok(())
        }
        Node::Member(_) | Node::OptionalMember(_) => assign_to_target(agent, pattern, value),
        other => unreachable!("not a binding pattern: {other:?}"),
    }
}

fn mode_clone(mode: &BindMode) -> BindMode {
    match mode {
        BindMode::AssignVar => BindMode::AssignVar,
        BindMode::DeclareLexical { mutable } => BindMode::DeclareLexical { mutable: *mutable },
    }
}

fn declare_name(agent: &mut Agent, name: &str, value: Value, mode: &BindMode) {
    let name: Arc<str> = Arc::from(name);
    match mode {
        BindMode::AssignVar => {
            let env = agent.current_context().variable_env.clone();
            if env.has_binding(&name) {
                let _ = env.set_mutable_binding(&name, value);
            } else {
                env.declare_var(name, value);
            }
        }
        BindMode::DeclareLexical { mutable } => {
            let env = agent.current_context().lexical_env.clone();
            env.declare_lexical(name, *mutable, Some(value));
        }
    }
}

fn assign_to_target(agent: &mut Agent, target: NodeRef, value: Value) -> EvalResult<()> {
    let arena = current_arena(agent);
    match &arena[target] {
        Node::Ident(name) => {
            let env = agent.current_context().lexical_env.clone();
            match env.resolve(name) {
                Some(found) => {
                    found.set_mutable_binding(name, value)?;
                }
                None => {
                    agent.realm.global_env.declare_var(Arc::from(name.as_ref()), value);
                }
            }
            Ok(())
        }
        Node::Member(m) => {
            let m = m.clone();
            let object = eval_expr(agent, m.object)?;
            let key = property_key_of(agent, m.property, m.computed)?;
            set_property(agent, &object, key, value)
        }
        Node::ArrayPattern(_) | Node::ObjectPattern(_) => {
            bind_pattern(agent, target, value, BindMode::AssignVar)
        }
        other => unreachable!("not an assignment target: {other:?}"),
    }
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

fn eval_expr(agent: &mut Agent, node_ref: NodeRef) -> EvalResult<Value> {
    let arena = current_arena(agent);
    match arena[node_ref].clone() {
        Node::NumberLit(n) => Ok(Value::Number(n)),
        Node::BigIntLit(digits) => {
            let s = digits.trim_end_matches('n');
            Ok(Value::BigInt(Arc::new(s.parse().unwrap_or_default())))
        }
        Node::StringLit(s) => Ok(Value::string(s.as_ref())),
        Node::RegexLit { pattern, flags } => make_regexp(agent, &pattern, &flags),
        Node::True => Ok(Value::Boolean(true)),
        Node::False => Ok(Value::Boolean(false)),
        Node::Null => Ok(Value::Null),
        Node::This => Ok(agent.current_context().this_value.clone()),
        Node::NewTarget => Ok(agent.current_context().new_target.clone()),
        Node::ImportMeta => {
            let obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
            Ok(Value::Object(obj))
        }
        Node::Ident(name) => eval_ident(agent, &name),
        Node::Array(arr) => eval_array_literal(agent, &arr.elements),
        Node::ObjectLit(obj) => eval_object_literal(agent, &obj.props),
        Node::Function(params) => Ok(Value::Object(make_closure(agent, node_ref, params, agent.current_context().lexical_env.clone(), None, false))),
        Node::Arrow(params) => Ok(Value::Object(make_closure(agent, node_ref, params, agent.current_context().lexical_env.clone(), None, true))),
        Node::Class(class) => Ok(Value::Object(eval_class(agent, &class)?)),
        Node::Member(m) => {
            let (object, _) = eval_member_base(agent, &m)?;
            let key = property_key_of(agent, m.property, m.computed)?;
            get_property_value(agent, &object, &key)
        }
        Node::OptionalMember(m) => {
            let object = eval_expr(agent, m.object)?;
            if object.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = property_key_of(agent, m.property, m.computed)?;
            get_property_value(agent, &object, &key)
        }
        Node::Call(call) => eval_call(agent, &call, false),
        Node::OptionalCall(call) => eval_call(agent, &call, true),
        Node::New(call) => eval_new(agent, &call),
        Node::Unary { op, argument } => eval_unary(agent, op, argument),
        Node::Update { op, argument, prefix } => eval_update(agent, op, argument, prefix),
        Node::Binary { op, data } => eval_binary(agent, op, data.lhs, data.rhs),
        Node::Logical { op, data } => eval_logical(agent, op, data.lhs, data.rhs),
        Node::Conditional(t) => {
            if eval_expr(agent, t.test)?.to_boolean() {
                eval_expr(agent, t.consequent)
            } else {
                eval_expr(agent, t.alternate)
            }
        }
        Node::Assignment { op, data } => eval_assignment(agent, op, data.lhs, data.rhs),
        Node::Sequence(exprs) => {
            let mut last = Value::Undefined;
            for e in exprs.iter() {
                last = eval_expr(agent, *e)?;
            }
            Ok(last)
        }
        Node::Template(t) => eval_template(agent, &t),
        Node::TaggedTemplate(t) => eval_tagged_template(agent, &t),
        Node::Spread(inner) => eval_expr(agent, inner),
        Node::Yield { argument, delegate } => eval_yield(agent, argument, delegate),
        Node::Await(argument) => eval_await(agent, argument),
        Node::ImportCall(argument) => eval_dynamic_import(agent, argument),
        Node::Super => Ok(Value::Undefined),
        other => unreachable!("not an expression node: {other:?}"),
    }
}

fn eval_ident(agent: &mut Agent, name: &str) -> EvalResult<Value> {
    let env = agent.current_context().lexical_env.clone();
    match env.resolve(name) {
        Some(found) => found.get_binding_value(name)?.ok_or_else(|| reference_error(agent, format!("{name} is not defined"))),
        None => Err(reference_error(agent, format!("{name} is not defined"))),
    }
}

/// Evaluates a member expression's object, special-casing `super.x` to
/// look the property up on the home object's prototype while keeping
/// `this` as the receiver.
fn eval_member_base(agent: &mut Agent, m: &Member) -> EvalResult<(Value, bool)> {
    let arena = current_arena(agent);
    if matches!(arena[m.object], Node::Super) {
        let home = agent.current_context().home_object.clone();
        let proto = home.and_then(|h| h.prototype());
        Ok((proto.map(Value::Object).unwrap_or(Value::Undefined), true))
    } else {
        Ok((eval_expr(agent, m.object)?, false))
    }
}

fn eval_array_literal(agent: &mut Agent, elements: &[NodeRef]) -> EvalResult<Value> {
    let arena = current_arena(agent);
    let mut out = Vec::new();
    for el in elements {
        if Node::is_empty_ref(*el) {
            out.push(Value::Undefined);
        } else if let Node::Spread(inner) = &arena[*el] {
            let iterable = eval_expr(agent, *inner)?;
            let iterator = get_iterator(agent, iterable)?;
            while let Some(v) = iterator_step(agent, &iterator)? {
                out.push(v);
            }
        } else {
            out.push(eval_expr(agent, *el)?);
        }
    }
    Ok(make_array(agent, out))
}

fn eval_object_literal(agent: &mut Agent, props: &[NodeRef]) -> EvalResult<Value> {
    let arena = current_arena(agent);
    let obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
    for prop_ref in props {
        match &arena[*prop_ref] {
            Node::Spread(inner) => {
                let source = eval_expr(agent, *inner)?;
                if let Value::Object(source) = to_object_ref(agent, &source)? {
                    for key in source.own_keys() {
                        if let Some(v) = source.get_own_data(&key) {
                            obj.define_data_property(key, v, true, true, true);
                        }
                    }
                }
            }
            Node::Property(p) => {
                let p = p.clone();
                let key = property_key_of(agent, p.key, p.computed)?;
                match p.kind {
                    PropKind::Init | PropKind::Method => {
                        let value = if p.shorthand {
                            eval_ident(agent, &key.to_string())?
                        } else if p.method {
                            Value::Object(make_closure(agent, p.value, expect_params(&arena, p.value), agent.current_context().lexical_env.clone(), Some(obj.clone()), false))
                        } else {
                            eval_expr(agent, p.value)?
                        };
                        obj.define_data_property(key, value, true, true, true);
                    }
                    PropKind::Get | PropKind::Set => {
                        let func = Value::Object(make_closure(agent, p.value, expect_params(&arena, p.value), agent.current_context().lexical_env.clone(), Some(obj.clone()), false));
                        let mut desc = obj.get_own_property(&key).unwrap_or(PropertyDescriptor { value: None, get: None, set: None, writable: true, enumerable: true, configurable: true });
                        if matches!(p.kind, PropKind::Get) {
                            desc.get = Some(func);
                        } else {
                            desc.set = Some(func);
                        }
                        desc.value = None;
                        obj.define_property(key, desc);
                    }
                }
            }
            _ => unreachable!("object literal member is not a Property/Spread node"),
        }
    }
    Ok(Value::Object(obj))
}

fn expect_params(arena: &Arena<Node>, node_ref: NodeRef) -> Params {
    match &arena[node_ref] {
        Node::Function(p) | Node::Arrow(p) => p.clone(),
        other => unreachable!("expected a function node: {other:?}"),
    }
}

fn eval_call(agent: &mut Agent, call: &Call, optional: bool) -> EvalResult<Value> {
    let arena = current_arena(agent);
    let (callee, this_value) = match &arena[call.callee] {
        Node::Member(m) | Node::OptionalMember(m) => {
            let m = m.clone();
            let (base, is_super) = eval_member_base(agent, &m)?;
            if optional_short_circuit(&arena, call.callee, &base) {
                return Ok(Value::Undefined);
            }
            let key = property_key_of(agent, m.property, m.computed)?;
            let func = get_property_value(agent, &base, &key)?;
            let receiver = if is_super { agent.current_context().this_value.clone() } else { base };
            (func, receiver)
        }
        Node::Super => {
            let callee_val = eval_super_constructor(agent)?;
            (callee_val, agent.current_context().this_value.clone())
        }
        _ => (eval_expr(agent, call.callee)?, Value::Undefined),
    };
    if optional && callee.is_nullish() {
        return Ok(Value::Undefined);
    }
    let args = eval_args(agent, &call.args)?;
    call_function(agent, &callee, this_value, &args).map_err(Unwind::Throw)
}

fn optional_short_circuit(arena: &Arena<Node>, callee: NodeRef, base: &Value) -> bool {
    matches!(arena[callee], Node::OptionalMember(_)) && base.is_nullish()
}

fn eval_args(agent: &mut Agent, args: &[NodeRef]) -> EvalResult<Vec<Value>> {
    let arena = current_arena(agent);
    let mut out = Vec::new();
    for a in args {
        if let Node::Spread(inner) = &arena[*a] {
            let iterable = eval_expr(agent, *inner)?;
            let iterator = get_iterator(agent, iterable)?;
            while let Some(v) = iterator_step(agent, &iterator)? {
                out.push(v);
            }
        } else {
            out.push(eval_expr(agent, *a)?);
        }
    }
    Ok(out)
}

fn eval_new(agent: &mut Agent, call: &Call) -> EvalResult<Value> {
    let callee = eval_expr(agent, call.callee)?;
    let args = eval_args(agent, &call.args)?;
    construct(agent, &callee, &args).map_err(Unwind::Throw)
}

fn eval_super_constructor(agent: &mut Agent) -> EvalResult<Value> {
    let function = agent.current_context().function.clone();
    let parent = function.and_then(|f| match &f.0.lock().unwrap().kind {
        ObjectKind::Function(FunctionData::Closure(c)) => c.derived_from.clone(),
        _ => None,
    });
    Ok(parent.map(Value::Object).unwrap_or(Value::Undefined))
}

fn eval_unary(agent: &mut Agent, op: UnaryOp, argument: NodeRef) -> EvalResult<Value> {
    if op == UnaryOp::TypeOf {
        let arena = current_arena(agent);
        if let Node::Ident(name) = &arena[argument] {
            let env = agent.current_context().lexical_env.clone();
            if env.resolve(name).is_none() {
                return Ok(Value::string("undefined"));
            }
        }
        let v = eval_expr(agent, argument)?;
        return Ok(Value::string(v.type_of()));
    }
    if op == UnaryOp::Delete {
        let arena = current_arena(agent);
        if let Node::Member(m) = arena[argument].clone() {
            let object = eval_expr(agent, m.object)?;
            let key = property_key_of(agent, m.property, m.computed)?;
            if let Value::Object(obj) = object {
                return Ok(Value::Boolean(obj.delete(&key)));
            }
            return Ok(Value::Boolean(true));
        }
        return Ok(Value::Boolean(true));
    }
    let v = eval_expr(agent, argument)?;
    Ok(match op {
        UnaryOp::Neg => Value::Number(-to_number(agent, &v)?),
        UnaryOp::Pos => Value::Number(to_number(agent, &v)?),
        UnaryOp::Not => Value::Boolean(!v.to_boolean()),
        UnaryOp::BNot => Value::Number(!(to_int32(agent, &v)?) as f64),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::TypeOf | UnaryOp::Delete => unreachable!(),
    })
}

fn eval_update(agent: &mut Agent, op: UpdateOp, argument: NodeRef, prefix: bool) -> EvalResult<Value> {
    let old = to_number(agent, &eval_expr(agent, argument)?)?;
    let new = match op {
        UpdateOp::Inc => old + 1.0,
        UpdateOp::Dec => old - 1.0,
    };
    assign_to_target(agent, argument, Value::Number(new))?;
    Ok(Value::Number(if prefix { new } else { old }))
}

fn eval_binary(agent: &mut Agent, op: BinaryKind, lhs: NodeRef, rhs: NodeRef) -> EvalResult<Value> {
    let l = eval_expr(agent, lhs)?;
    let r = eval_expr(agent, rhs)?;
    binary_op(agent, op, l, r)
}

pub fn binary_op(agent: &mut Agent, op: BinaryKind, l: Value, r: Value) -> EvalResult<Value> {
    use BinaryKind::*;
    Ok(match op {
        Add => add(agent, &l, &r)?,
        Sub => Value::Number(to_number(agent, &l)? - to_number(agent, &r)?),
        Mul => Value::Number(to_number(agent, &l)? * to_number(agent, &r)?),
        Div => Value::Number(to_number(agent, &l)? / to_number(agent, &r)?),
        Mod => Value::Number(to_number(agent, &l)? % to_number(agent, &r)?),
        Pow => Value::Number(to_number(agent, &l)?.powf(to_number(agent, &r)?)),
        ShiftLeft => Value::Number(((to_int32(agent, &l)?) << (to_int32(agent, &r)? & 31)) as f64),
        ShiftRight => Value::Number(((to_int32(agent, &l)?) >> (to_int32(agent, &r)? & 31)) as f64),
        UShiftRight => Value::Number(((to_int32(agent, &l)? as u32) >> (to_int32(agent, &r)? & 31)) as f64),
        Lt => compare(agent, &l, &r, |o| o == std::cmp::Ordering::Less)?,
        Gt => compare(agent, &l, &r, |o| o == std::cmp::Ordering::Greater)?,
        Lte => compare(agent, &l, &r, |o| o != std::cmp::Ordering::Greater)?,
        Gte => compare(agent, &l, &r, |o| o != std::cmp::Ordering::Less)?,
        Equality => Value::Boolean(loose_equals(agent, &l, &r)?),
        Inequality => Value::Boolean(!loose_equals(agent, &l, &r)?),
        StrictEquality => Value::Boolean(strict_equals(&l, &r)),
        StrictInequality => Value::Boolean(!strict_equals(&l, &r)),
        BAnd => Value::Number((to_int32(agent, &l)? & to_int32(agent, &r)?) as f64),
        BOr => Value::Number((to_int32(agent, &l)? | to_int32(agent, &r)?) as f64),
        Xor => Value::Number((to_int32(agent, &l)? ^ to_int32(agent, &r)?) as f64),
        In => {
            let key = to_property_key(agent, &r)?;
            match r {
                Value::Object(obj) => {
                    let proxy = match &obj.0.lock().unwrap().kind {
                        ObjectKind::Proxy { target, handler } => Some((target.clone(), handler.clone())),
                        _ => None,
                    };
                    if let Some((target, handler)) = proxy {
                        let trap = get_property(agent, &handler, &PropertyKey::from_str("has"), &Value::Object(handler.clone()))?;
                        if trap.is_callable() {
                            let result = call_function(agent, &trap, Value::Object(handler), &[Value::Object(target), key_to_value(&key)]).map_err(Unwind::Throw)?;
                            Value::Boolean(result.to_boolean())
                        } else {
                            Value::Boolean(has_property(&target, &key))
                        }
                    } else {
                        Value::Boolean(has_property(&obj, &key))
                    }
                }
                _ => return Err(throw(agent, "Cannot use 'in' operator on a non-object")),
            }
        }
        InstanceOf => Value::Boolean(instance_of(agent, &l, &r)?),
    })
}

fn has_property(obj: &JsObject, key: &PropertyKey) -> bool {
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        if o.has_own(key) {
            return true;
        }
        current = o.prototype();
    }
    false
}

fn compare(agent: &mut Agent, l: &Value, r: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> EvalResult<Value> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(Value::Boolean(accept(a.as_ref().cmp(b.as_ref()))));
    }
    let (a, b) = (to_number(agent, l)?, to_number(agent, r)?);
    if a.is_nan() || b.is_nan() {
        return Ok(Value::Boolean(false));
    }
    Ok(Value::Boolean(a.partial_cmp(&b).map(accept).unwrap_or(false)))
}

fn instance_of(agent: &mut Agent, l: &Value, r: &Value) -> EvalResult<bool> {
    let Value::Object(ctor) = r else { return Err(throw(agent, "Right-hand side of 'instanceof' is not callable")) };
    let proto_key = PropertyKey::from_str("prototype");
    let Some(Value::Object(proto)) = ctor.get_own_data(&proto_key) else { return Ok(false) };
    let Value::Object(mut obj) = l.clone() else { return Ok(false) };
    loop {
        match obj.prototype() {
            Some(p) => {
                if p.ptr_eq(&proto) {
                    return Ok(true);
                }
                obj = p;
            }
            None => return Ok(false),
        }
    }
}

fn add(agent: &mut Agent, l: &Value, r: &Value) -> EvalResult<Value> {
    let lp = to_primitive(agent, l)?;
    let rp = to_primitive(agent, r)?;
    if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
        return Ok(Value::string(format!("{}{}", to_js_string(agent, &lp)?, to_js_string(agent, &rp)?)));
    }
    Ok(Value::Number(to_number(agent, &lp)? + to_number(agent, &rp)?))
}

fn eval_logical(agent: &mut Agent, op: LogicalKind, lhs: NodeRef, rhs: NodeRef) -> EvalResult<Value> {
    let l = eval_expr(agent, lhs)?;
    match op {
        LogicalKind::And => {
            if l.to_boolean() {
                eval_expr(agent, rhs)
            } else {
                Ok(l)
            }
        }
        LogicalKind::Or => {
            if l.to_boolean() {
                Ok(l)
            } else {
                eval_expr(agent, rhs)
            }
        }
        LogicalKind::Nullish => {
            if l.is_nullish() {
                eval_expr(agent, rhs)
            } else {
                Ok(l)
            }
        }
    }
}

fn eval_assignment(agent: &mut Agent, op: AssignOp, lhs: NodeRef, rhs: NodeRef) -> EvalResult<Value> {
    if matches!(op, AssignOp::Assign) {
        let value = eval_expr(agent, rhs)?;
        bind_pattern_or_assign(agent, lhs, value.clone())?;
        return Ok(value);
    }
    if matches!(op, AssignOp::LogicalAnd | AssignOp::LogicalOr | AssignOp::Nullish) {
        let current = eval_expr(agent, lhs)?;
        let should_assign = match op {
            AssignOp::LogicalAnd => current.to_boolean(),
            AssignOp::LogicalOr => !current.to_boolean(),
            AssignOp::Nullish => current.is_nullish(),
            _ => unreachable!(),
        };
        if !should_assign {
            return Ok(current);
        }
        let value = eval_expr(agent, rhs)?;
        assign_to_target(agent, lhs, value.clone())?;
        return Ok(value);
    }
    let current = eval_expr(agent, lhs)?;
    let rhs_value = eval_expr(agent, rhs)?;
    let kind = match op {
        AssignOp::Add => BinaryKind::Add,
        AssignOp::Sub => BinaryKind::Sub,
        AssignOp::Mul => BinaryKind::Mul,
        AssignOp::Div => BinaryKind::Div,
        AssignOp::Mod => BinaryKind::Mod,
        AssignOp::Pow => BinaryKind::Pow,
        AssignOp::ShiftLeft => BinaryKind::ShiftLeft,
        AssignOp::ShiftRight => BinaryKind::ShiftRight,
        AssignOp::UShiftRight => BinaryKind::UShiftRight,
        AssignOp::BAnd => BinaryKind::BAnd,
        AssignOp::BOr => BinaryKind::BOr,
        AssignOp::Xor => BinaryKind::Xor,
        AssignOp::Assign | AssignOp::LogicalAnd | AssignOp::LogicalOr | AssignOp::Nullish => unreachable!(),
    };
    let value = binary_op(agent, kind, current, rhs_value)?;
    assign_to_target(agent, lhs, value.clone())?;
    Ok(value)
}

fn bind_pattern_or_assign(agent: &mut Agent, target: NodeRef, value: Value) -> EvalResult<()> {
    let arena = current_arena(agent);
    match &arena[target] {
        Node::ArrayPattern(_) | Node::ObjectPattern(_) => bind_pattern(agent, target, value, BindMode::AssignVar),
        _ => assign_to_target(agent, target, value),
    }
}

fn eval_template(agent: &mut Agent, t: &TemplateLiteral) -> EvalResult<Value> {
    let mut out = String::new();
    for (i, chunk) in t.quasis.iter().enumerate() {
        out.push_str(chunk);
        if let Some(expr) = t.expressions.get(i) {
            let v = eval_expr(agent, *expr)?;
            out.push_str(&to_js_string(agent, &v)?);
        }
    }
    Ok(Value::string(out))
}

fn eval_tagged_template(agent: &mut Agent, t: &TaggedTemplate) -> EvalResult<Value> {
    let arena = current_arena(agent);
    let Node::Template(template) = arena[t.quasi].clone() else { unreachable!() };
    let strings = make_array(agent, template.quasis.iter().map(|s| Value::string(s.as_ref())).collect());
    let raw = make_array(agent, template.raws.iter().map(|s| Value::string(s.as_ref())).collect());
    if let Value::Object(strings_obj) = &strings {
        strings_obj.define_data_property(PropertyKey::from_str("raw"), raw, false, false, false);
    }
    let mut args = vec![strings];
    for e in template.expressions.iter() {
        args.push(eval_expr(agent, *e)?);
    }
    let (callee, this_value) = match &arena[t.tag] {
        Node::Member(m) => {
            let m = m.clone();
            let base = eval_expr(agent, m.object)?;
            let key = property_key_of(agent, m.property, m.computed)?;
            let func = get_property_value(agent, &base, &key)?;
            (func, base)
        }
        _ => (eval_expr(agent, t.tag)?, Value::Undefined),
    };
    call_function(agent, &callee, this_value, &args).map_err(Unwind::Throw)
}

fn eval_dynamic_import(agent: &mut Agent, argument: NodeRef) -> EvalResult<Value> {
    let specifier = eval_expr(agent, argument)?;
    let specifier = to_js_string(agent, &specifier)?;
    let promise = crate::promise::new_promise(agent);
    match agent.load_module(&specifier) {
        Ok(ns) => crate::promise::resolve(agent, &promise, ns),
        Err(e) => crate::promise::reject(agent, &promise, e.into_value()),
    }
    Ok(Value::Object(promise))
}

// ---------------------------------------------------------------------
// Generators / async (Yield / Await)
// ---------------------------------------------------------------------

fn eval_yield(agent: &mut Agent, argument: NodeRef, delegate: bool) -> EvalResult<Value> {
    let value = if Node::is_empty_ref(argument) { Value::Undefined } else { eval_expr(agent, argument)? };
    if delegate {
        let iterator = get_iterator(agent, value)?;
        let mut last = Value::Undefined;
        while let Some(v) = iterator_step(agent, &iterator)? {
            last = suspend_yield(agent, v)?;
        }
        return Ok(last);
    }
    suspend_yield(agent, value)
}

fn suspend_yield(agent: &mut Agent, value: Value) -> EvalResult<Value> {
    let handle_ptr = CURRENT_COROUTINE.with(|c| c.get());
    if handle_ptr.is_null() {
        return Err(throw(agent, "yield used outside a generator function"));
    }
    let handle = unsafe { &mut *handle_ptr };
    match handle.yield_value(value) {
        HostMessage::Resume(v) => Ok(v),
        HostMessage::Throw(v) => Err(Unwind::Throw(JsError::new(v))),
        HostMessage::Return(v) => Err(Unwind::Return(v)),
    }
}

fn eval_await(agent: &mut Agent, argument: NodeRef) -> EvalResult<Value> {
    let value = eval_expr(agent, argument)?;
    await_value(agent, value)
}

/// Suspends the current coroutine at an `await` point (or, outside any
/// coroutine -- top-level `await` -- drains microtasks synchronously
/// until `value` settles). Shared by `Await` expressions and
/// `for await` loop iteration.
fn await_value(agent: &mut Agent, value: Value) -> EvalResult<Value> {
    let handle_ptr = CURRENT_COROUTINE.with(|c| c.get());
    if handle_ptr.is_null() {
        return await_synchronously(agent, value);
    }
    let handle = unsafe { &mut *handle_ptr };
    match handle.await_value(value) {
        HostMessage::Resume(v) => Ok(v),
        HostMessage::Throw(v) => Err(Unwind::Throw(JsError::new(v))),
        HostMessage::Return(v) => Err(Unwind::Return(v)),
    }
}

fn await_synchronously(agent: &mut Agent, value: Value) -> EvalResult<Value> {
    let Value::Object(obj) = &value else { return Ok(value) };
    if !matches!(obj.0.lock().unwrap().kind, ObjectKind::Promise(_)) {
        return Ok(value);
    }
    let mut guard = 0;
    loop {
        let status = crate::promise::status(obj);
        match status {
            crate::promise::PromiseStatus::Fulfilled => {
                return with_promise_result(obj, Ok);
            }
            crate::promise::PromiseStatus::Rejected => {
                return with_promise_result(obj, |v| Err(Unwind::Throw(JsError::new(v))));
            }
            crate::promise::PromiseStatus::Pending => {
                agent.drain_microtasks();
                guard += 1;
                if guard > agent.options.max_microtask_drain {
                    return Err(throw(agent, "top-level await never settled"));
                }
            }
        }
    }
}

fn with_promise_result<T>(obj: &JsObject, f: impl FnOnce(Value) -> T) -> T {
    let data = obj.0.lock().unwrap();
    match &data.kind {
        ObjectKind::Promise(state) => f(state.result.clone().unwrap_or(Value::Undefined)),
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------
// Functions: creation and calling
// ---------------------------------------------------------------------

pub fn make_closure(agent: &mut Agent, node_ref: NodeRef, params: Params, env: Environment, home_object: Option<JsObject>, is_arrow: bool) -> JsObject {
    let arena = current_arena(agent);
    let name = binding_name(&arena, params.name).unwrap_or_default();
    let data = ClosureData {
        name: Arc::from(name.as_ref()),
        arena: arena.clone(),
        params: node_ref,
        env,
        kind: params.kind,
        is_arrow,
        home_object,
        is_class_constructor: false,
        field_inits: Arc::from([]),
        derived_from: None,
    };
    let proto = match params.kind {
        FunctionKind::Generator | FunctionKind::AsyncGenerator => Some(agent.realm.generator_prototype.clone()),
        _ => Some(agent.realm.function_prototype.clone()),
    };
    let obj = JsObject::new(ObjectKind::Function(FunctionData::Closure(Box::new(data))), proto);
    if !is_arrow && !matches!(params.kind, FunctionKind::Generator | FunctionKind::AsyncGenerator | FunctionKind::Async) {
        let proto_obj = JsObject::new(ObjectKind::Ordinary, Some(agent.realm.object_prototype.clone()));
        proto_obj.define_data_property(PropertyKey::from_str("constructor"), Value::Object(obj.clone()), true, false, true);
        obj.define_data_property(PropertyKey::from_str("prototype"), Value::Object(proto_obj), true, false, false);
    }
    obj.define_data_property(PropertyKey::from_str("name"), Value::string(name), false, false, true);
    let length = params
        .params
        .iter()
        .take_while(|p| !matches!(arena.get(**p), Some(Node::PatternDefault(_)) | Some(Node::RestElement(_))))
        .count() as u32;
    obj.define_data_property(PropertyKey::from_str("length"), Value::Number(length as f64), false, false, true);
    obj
}

pub fn make_native(agent: &Agent, name: &str, length: u32, func: crate::function::NativeFn) -> JsObject {
    let data = FunctionData::Native(NativeFunction { name: Arc::from(name), length, func });
    let obj = JsObject::new(ObjectKind::Function(data), Some(agent.realm.function_prototype.clone()));
    obj.define_data_property(PropertyKey::from_str("name"), Value::string(name), false, false, true);
    obj.define_data_property(PropertyKey::from_str("length"), Value::Number(length as f64), false, false, true);
    obj
}

/// `Call` (abstract operation): invokes `callee` with `this_value` and
/// `args`. Generator/async-generator functions return their (not yet
/// started) generator object instead of running; ordinary and async
/// functions run to completion or, for `async`, to their first `await`
/// before this returns (the rest continues via the promise microtask
/// chain started in [`run_async_function`]).
pub fn call_function(agent: &mut Agent, callee: &Value, this_value: Value, args: &[Value]) -> JsResult<Value> {
    let Value::Object(func_obj) = callee else {
        return Err(throw_js(agent, "value is not a function"));
    };
    let data = match &func_obj.0.lock().unwrap().kind {
        ObjectKind::Function(f) => f.clone(),
        _ => return Err(throw_js(agent, "value is not a function")),
    };
    match data {
        FunctionData::Native(native) => (native.func)(agent, this_value, args),
        FunctionData::Closure(closure) => call_closure(agent, func_obj, &closure, this_value, args, Value::Undefined),
    }
}

fn throw_js(agent: &Agent, message: impl Into<String>) -> JsError {
    make_error(agent, &agent.realm.type_error_prototype, message.into())
}

fn call_closure(agent: &mut Agent, func_obj: &JsObject, closure: &ClosureData, this_value: Value, args: &[Value], new_target: Value) -> JsResult<Value> {
    match closure.kind {
        FunctionKind::Normal => run_function_body(agent, func_obj, closure, this_value, args, new_target),
        FunctionKind::Generator | FunctionKind::AsyncGenerator => Ok(Value::Object(make_generator_object(agent, func_obj, closure, this_value, args))),
        FunctionKind::Async => run_async_function(agent, func_obj, closure, this_value, args),
    }
}

fn bind_params(agent: &mut Agent, env: &Environment, arena: &Arena<Node>, params: &[NodeRef], args: &[Value]) -> EvalResult<()> {
    let saved = agent.current_context().lexical_env.clone();
    agent.current_context_mut().lexical_env = env.clone();
    for (i, p) in params.iter().enumerate() {
        if let Node::RestElement(inner) = &arena[*p] {
            let rest = args.get(i..).unwrap_or(&[]).to_vec();
            bind_pattern(agent, *inner, make_array(agent, rest), BindMode::DeclareLexical { mutable: true })?;
            break;
        }
        let value = args.get(i).cloned().unwrap_or(Value::Undefined);
        bind_pattern(agent, *p, value, BindMode::DeclareLexical { mutable: true })?;
    }
    agent.current_context_mut().lexical_env = saved;
    Ok(())
}

fn run_function_body(agent: &mut Agent, func_obj: &JsObject, closure: &ClosureData, this_value: Value, args: &[Value], new_target: Value) -> JsResult<Value> {
    let arena = closure.arena.clone();
    let params = match &arena[closure.params] {
        Node::Function(p) | Node::Arrow(p) | Node::FunctionDecl(p) => p.clone(),
        _ => unreachable!(),
    };
    let fn_env = Environment::new_declarative(Some(closure.env.clone()));
    let this_value = if closure.is_arrow { agent.current_context().this_value.clone() } else { this_value };
    let home_object = closure.home_object.clone().or_else(|| agent.current_context().home_object.clone());
    agent.push_context(ExecutionContext {
        function: Some(func_obj.clone()),
        this_value,
        lexical_env: fn_env.clone(),
        variable_env: fn_env.clone(),
        arena: arena.clone(),
        in_generator: false,
        in_async: false,
        new_target,
        home_object,
    });
    let result = (|| {
        bind_params(agent, &fn_env, &arena, &params.params, args)?;
        run_field_inits(agent, closure, &this_value_of(agent))?;
        hoist(agent, &params.body)?;
        exec_stmt_list(agent, &params.body)?;
        Ok(Value::Undefined)
    })();
    agent.pop_context();
    match result {
        Ok(v) => Ok(v),
        Err(Unwind::Return(v)) => Ok(v),
        Err(other) => Err(unwind_to_js_error(other)),
    }
}

fn this_value_of(agent: &Agent) -> Value {
    agent.current_context().this_value.clone()
}

fn run_field_inits(agent: &mut Agent, closure: &ClosureData, this_value: &Value) -> EvalResult<()> {
    if !closure.is_class_constructor || closure.field_inits.is_empty() {
        return Ok(());
    }
    let Value::Object(this_obj) = this_value else { return Ok(()) };
    for init in closure.field_inits.iter() {
        let key = property_key_of(agent, init.key, init.computed)?;
        let value = if Node::is_empty_ref(init.value) { Value::Undefined } else { eval_expr(agent, init.value)? };
        this_obj.define_data_property(key, value, true, true, true);
    }
    Ok(())
}

fn make_generator_object(agent: &mut Agent, func_obj: &JsObject, closure: &ClosureData, this_value: Value, args: &[Value]) -> JsObject {
    let arena = closure.arena.clone();
    let params = match &arena[closure.params] {
        Node::Function(p) | Node::FunctionDecl(p) => p.clone(),
        _ => unreachable!(),
    };
    let fn_env = Environment::new_declarative(Some(closure.env.clone()));
    let func_obj = func_obj.clone();
    let home_object = closure.home_object.clone();
    let args = args.to_vec();
    let body = params.body.clone();
    let context_this = this_value;

    let state = GeneratorState::spawn(agent, move |handle: &mut GeneratorHandle| {
        CURRENT_COROUTINE.with(|c| c.set(handle as *mut _));
        let agent = handle.agent();
        agent.push_context(ExecutionContext {
            function: Some(func_obj.clone()),
            this_value: context_this,
            lexical_env: fn_env.clone(),
            variable_env: fn_env.clone(),
            arena: arena.clone(),
            in_generator: true,
            in_async: matches!(params.kind, FunctionKind::AsyncGenerator),
            new_target: Value::Undefined,
            home_object,
        });
        let result = (|| {
            bind_params(agent, &fn_env, &arena, &params.params, &args)?;
            hoist(agent, &body)?;
            exec_stmt_list(agent, &body)?;
            Ok(Value::Undefined)
        })();
        agent.pop_context();
        CURRENT_COROUTINE.with(|c| c.set(std::ptr::null_mut()));
        match result {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(other) => Err(unwind_to_js_error(other)),
        }
    });

    JsObject::new(ObjectKind::Generator(state), Some(agent.realm.generator_prototype.clone()))
}

/// Drives an `async function` to completion by running its body on a
/// coroutine thread the same as a generator, resolving/rejecting a result
/// promise from the `Finished` message instead of yielding a value out to
/// user code at every `await`.
fn run_async_function(agent: &mut Agent, func_obj: &JsObject, closure: &ClosureData, this_value: Value, args: &[Value]) -> JsResult<Value> {
    let arena = closure.arena.clone();
    let params = match &arena[closure.params] {
        Node::Function(p) | Node::Arrow(p) | Node::FunctionDecl(p) => p.clone(),
        _ => unreachable!(),
    };
    let fn_env = Environment::new_declarative(Some(closure.env.clone()));
    let func_obj_clone = func_obj.clone();
    let home_object = closure.home_object.clone();
    let args = args.to_vec();
    let body = params.body.clone();
    let is_arrow = closure.is_arrow;
    let outer_this = agent.current_context().this_value.clone();
    let context_this = if is_arrow { outer_this } else { this_value };

    let mut state = GeneratorState::spawn(agent, move |handle: &mut GeneratorHandle| {
        CURRENT_COROUTINE.with(|c| c.set(handle as *mut _));
        let agent = handle.agent();
        agent.push_context(ExecutionContext {
            function: Some(func_obj_clone.clone()),
            this_value: context_this,
            lexical_env: fn_env.clone(),
            variable_env: fn_env.clone(),
            arena: arena.clone(),
            in_generator: false,
            in_async: true,
            new_target: Value::Undefined,
            home_object,
        });
        let result = (|| {
            bind_params(agent, &fn_env, &arena, &params.params, &args)?;
            hoist(agent, &body)?;
            exec_stmt_list(agent, &body)?;
            Ok(Value::Undefined)
        })();
        agent.pop_context();
        CURRENT_COROUTINE.with(|c| c.set(std::ptr::null_mut()));
        match result {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(other) => Err(unwind_to_js_error(other)),
        }
    });

    let promise = crate::promise::new_promise(agent);
    drive_async(agent, state, promise.clone(), Value::Undefined, false);
    Ok(Value::Object(promise))
}

/// Steps an async function's coroutine once, then either settles
/// `result_promise` (the body ran to completion) or arranges for this
/// function to be called again once whatever it awaited settles.
fn drive_async(agent: &mut Agent, mut state: GeneratorState, result_promise: JsObject, resume_with: Value, is_throw: bool) {
    let step = if is_throw { state.throw(resume_with) } else { state.resume(resume_with) };
    match step {
        ResumeResult::Awaited(awaited) => match &awaited {
            Value::Object(o) if matches!(o.0.lock().unwrap().kind, ObjectKind::Promise(_)) => {
                let obj = o.clone();
                let state_cell = std::rc::Rc::new(std::cell::RefCell::new(Some(state)));
                let fulfill_state = state_cell.clone();
                let reject_state = state_cell;
                let fulfill_promise = result_promise.clone();
                let reject_promise = result_promise;
                crate::promise::on_settled(
                    agent,
                    &obj,
                    Box::new(move |agent, v| {
                        if let Some(state) = fulfill_state.borrow_mut().take() {
                            drive_async(agent, state, fulfill_promise, v, false);
                        }
                    }),
                    Box::new(move |agent, v| {
                        if let Some(state) = reject_state.borrow_mut().take() {
                            drive_async(agent, state, reject_promise, v, true);
                        }
                    }),
                );
            }
            _ => {
                // Awaiting a non-thenable still takes one microtask tick
                // before resuming, matching `Await`'s `PromiseResolve` step.
                agent.enqueue_microtask(Box::new(move |agent| {
                    drive_async(agent, state, result_promise, awaited, false);
                }));
            }
        },
        ResumeResult::Yielded(_) => {
            // An async function body never contains a bare `yield`; treat
            // it like an immediate resume to avoid deadlocking the thread.
            drive_async(agent, state, result_promise, Value::Undefined, false);
        }
        ResumeResult::Returned(Ok(v)) => crate::promise::resolve(agent, &result_promise, v),
        ResumeResult::Returned(Err(e)) => crate::promise::reject(agent, &result_promise, e.into_value()),
    }
}

// ---------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------

fn eval_class(agent: &mut Agent, class: &Class) -> JsResult<JsObject> {
    let arena = current_arena(agent);
    let superclass = if Node::is_empty_ref(class.superclass) {
        None
    } else {
        match eval_expr(agent, class.superclass).map_err(unwind_to_js_error)? {
            Value::Object(o) => Some(o),
            _ => return Err(throw_js(agent, "Class extends value is not a constructor")),
        }
    };

    let proto_parent = superclass.as_ref().and_then(|s| match s.get_own_data(&PropertyKey::from_str("prototype")) {
        Some(Value::Object(p)) => Some(p),
        _ => Some(agent.realm.object_prototype.clone()),
    });
    let class_proto = JsObject::new(ObjectKind::Ordinary, proto_parent.or_else(|| Some(agent.realm.object_prototype.clone())));

    let ctor_idx = class.members.iter().position(|m| !m.is_static && matches!(&arena[m.key], Node::Ident(n) if n.as_ref() == "constructor"));
    let field_inits: Vec<FieldInit> = class
        .members
        .iter()
        .filter(|m| m.is_field && !m.is_static)
        .map(|m| FieldInit { key: m.key, computed: m.computed, value: m.value })
        .collect();

    let env = agent.current_context().lexical_env.clone();
    let ctor_obj = if let Some(idx) = ctor_idx {
        let ctor = &class.members[idx];
        let params = expect_params(&arena, ctor.value);
        make_closure(agent, ctor.value, params, env.clone(), Some(class_proto.clone()), false)
    } else {
        let name = binding_name(&arena, class.name).unwrap_or_default();
        let data = ClosureData {
            name: Arc::from(name.as_ref()),
            arena: arena.clone(),
            params: Node::empty(),
            env: env.clone(),
            kind: FunctionKind::Normal,
            is_arrow: false,
            home_object: Some(class_proto.clone()),
            is_class_constructor: true,
            field_inits: Arc::from([]),
            derived_from: superclass.clone(),
        };
        JsObject::new(ObjectKind::Function(FunctionData::Closure(Box::new(data))), Some(agent.realm.function_prototype.clone()))
    };

    if let ObjectKind::Function(FunctionData::Closure(c)) = &mut ctor_obj.0.lock().unwrap().kind {
        c.is_class_constructor = true;
        c.field_inits = Arc::from(field_inits);
        c.derived_from = superclass.clone();
    }
    ctor_obj.define_data_property(PropertyKey::from_str("prototype"), Value::Object(class_proto.clone()), false, false, false);
    class_proto.define_data_property(PropertyKey::from_str("constructor"), Value::Object(ctor_obj.clone()), true, false, true);
    if let Some(parent) = &superclass {
        ctor_obj.set_prototype(Some(parent.clone()));
    }

    for (idx, member) in class.members.iter().enumerate() {
        if Some(idx) == ctor_idx {
            continue;
        }
        let target = if member.is_static { &ctor_obj } else { &class_proto };
        let key = property_key_of(agent, member.key, member.computed).map_err(unwind_to_js_error)?;
        if member.is_field {
            if member.is_static {
                let value = if Node::is_empty_ref(member.value) { Value::Undefined } else { eval_expr(agent, member.value).map_err(unwind_to_js_error)? };
                target.define_data_property(key, value, true, true, true);
            }
            continue;
        }
        let params = expect_params(&arena, member.value);
        let func = make_closure(agent, member.value, params, env.clone(), Some(target.clone()), false);
        match member.kind {
            PropKind::Method => {
                target.define_data_property(key, Value::Object(func), true, false, true);
            }
            PropKind::Get | PropKind::Set => {
                let mut desc = target.get_own_property(&key).unwrap_or(PropertyDescriptor { value: None, get: None, set: None, writable: true, enumerable: false, configurable: true });
                desc.value = None;
                if matches!(member.kind, PropKind::Get) {
                    desc.get = Some(Value::Object(func));
                } else {
                    desc.set = Some(Value::Object(func));
                }
                target.define_property(key, desc);
            }
            PropKind::Init => {}
        }
    }

    for block in class.static_blocks.iter() {
        let outer = agent.current_context().this_value.clone();
        agent.current_context_mut().this_value = Value::Object(ctor_obj.clone());
        let result = exec_stmt_list(agent, block);
        agent.current_context_mut().this_value = outer;
        result.map_err(unwind_to_js_error)?;
    }

    Ok(ctor_obj)
}

/// `Construct` (abstract operation): allocates a fresh ordinary object
/// (unless the constructor is derived, in which case `super()` performs
/// the allocation against the parent constructor instead) and runs the
/// constructor body with `this` bound to it.
pub fn construct(agent: &mut Agent, callee: &Value, args: &[Value]) -> JsResult<Value> {
    let Value::Object(func_obj) = callee else { return Err(throw_js(agent, "not a constructor")) };
    let data = match &func_obj.0.lock().unwrap().kind {
        ObjectKind::Function(f) => f.clone(),
        _ => return Err(throw_js(agent, "not a constructor")),
    };
    match data {
        FunctionData::Native(native) => {
            let proto = agent.realm.object_prototype.clone();
            let this = Value::Object(JsObject::new(ObjectKind::Ordinary, Some(proto)));
            (native.func)(agent, this, args)
        }
        FunctionData::Closure(closure) => {
            if closure.is_class_constructor && closure.derived_from.is_some() {
                // `this` is created by `super()`; start uninitialized and
                // let the constructor body's first `super(...)` call
                // allocate it via `eval_super_constructor`/`construct`.
                let this = Value::Undefined;
                run_function_body(agent, func_obj, &closure, this, args, Value::Object(func_obj.clone()))
            } else {
                let proto = match func_obj.get_own_data(&PropertyKey::from_str("prototype")) {
                    Some(Value::Object(p)) => p,
                    _ => agent.realm.object_prototype.clone(),
                };
                let this = Value::Object(JsObject::new(ObjectKind::Ordinary, Some(proto)));
                run_function_body(agent, func_obj, &closure, this, args, Value::Object(func_obj.clone()))
            }
        }
    }
}

// ---------------------------------------------------------------------
// Property access abstract operations
// ---------------------------------------------------------------------

pub fn property_key_of(agent: &mut Agent, node_ref: NodeRef, computed: bool) -> EvalResult<PropertyKey> {
    let arena = current_arena(agent);
    if !computed {
        return Ok(match &arena[node_ref] {
            Node::Ident(name) | Node::PrivateName(name) => PropertyKey::from_str(name),
            Node::StringLit(s) => PropertyKey::from_str(s),
            Node::NumberLit(n) => PropertyKey::from_str(&format_number(*n)),
            other => unreachable!("not a property name: {other:?}"),
        });
    }
    let v = eval_expr(agent, node_ref)?;
    to_property_key(agent, &v)
}

pub fn to_property_key(agent: &mut Agent, v: &Value) -> EvalResult<PropertyKey> {
    match v {
        Value::Symbol(s) => Ok(PropertyKey::Symbol(s.clone())),
        other => Ok(PropertyKey::from_str(&to_js_string(agent, other)?)),
    }
}

/// `GetV`: reads `key` off `base`, boxing primitives to their wrapper
/// prototype (string/number/boolean) and reading `length`/index directly
/// off strings without allocating a `StringObject` for every char access.
pub fn get_property_value(agent: &mut Agent, base: &Value, key: &PropertyKey) -> EvalResult<Value> {
    match base {
        Value::Undefined | Value::Null => Err(reference_error(agent, format!("Cannot read properties of {} (reading '{key}')", base.to_display_string()))),
        Value::String(s) => {
            if let PropertyKey::String(k) = key {
                if k.as_ref() == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Ok(idx) = k.parse::<usize>() {
                    return Ok(s.chars().nth(idx).map(|c| Value::string(c.to_string())).unwrap_or(Value::Undefined));
                }
            }
            get_property(agent, &agent.realm.string_prototype.clone(), key, base)
        }
        Value::Number(_) => get_property(agent, &agent.realm.number_prototype.clone(), key, base),
        Value::Boolean(_) => get_property(agent, &agent.realm.boolean_prototype.clone(), key, base),
        Value::Symbol(_) => get_property(agent, &agent.realm.symbol_prototype.clone(), key, base),
        Value::BigInt(_) => get_property(agent, &agent.realm.bigint_prototype.clone(), key, base),
        Value::Object(obj) => {
            let proxy = match &obj.0.lock().unwrap().kind {
                ObjectKind::Proxy { target, handler } => Some((target.clone(), handler.clone())),
                _ => None,
            };
            if let Some((target, handler)) = proxy {
                let trap = get_property(agent, &handler, &PropertyKey::from_str("get"), &Value::Object(handler.clone()))?;
                if trap.is_callable() {
                    return call_function(agent, &trap, Value::Object(handler), &[Value::Object(target), key_to_value(key), base.clone()]).map_err(Unwind::Throw);
                }
                return get_property_value(agent, &Value::Object(target), key);
            }
            if let ObjectKind::Array = obj.0.lock().unwrap().kind {
                if let PropertyKey::String(k) = key {
                    if k.as_ref() == "length" {
                        let max = obj.own_keys().iter().filter_map(|k| k.as_index()).max().map(|i| i + 1).unwrap_or(0);
                        return Ok(obj.get_own_data(&PropertyKey::from_str("length")).unwrap_or(Value::Number(max as f64)));
                    }
                }
            }
            if let ObjectKind::TypedArray { length, .. } = obj.0.lock().unwrap().kind {
                if let PropertyKey::String(k) = key {
                    if k.as_ref() == "length" {
                        return Ok(Value::Number(length as f64));
                    }
                    if let Ok(idx) = k.parse::<usize>() {
                        if let ObjectKind::TypedArray { kind, buffer, byte_offset, length } = &obj.0.lock().unwrap().kind {
                            if idx >= *length {
                                return Ok(Value::Undefined);
                            }
                            let buf = buffer.lock().unwrap();
                            return Ok(Value::Number(crate::builtins::typed_array::read_element(&buf, *kind, *byte_offset, idx)));
                        }
                    }
                }
            }
            get_property(agent, obj, key, base)
        }
    }
}

fn key_to_value(key: &PropertyKey) -> Value {
    match key {
        PropertyKey::String(s) => Value::String(s.clone()),
        PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
    }
}

fn get_property(agent: &mut Agent, obj: &JsObject, key: &PropertyKey, receiver: &Value) -> EvalResult<Value> {
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        if let Some(desc) = o.get_own_property(key) {
            if desc.is_accessor() {
                return match &desc.get {
                    Some(getter) if getter.is_callable() => call_function(agent, getter, receiver.clone(), &[]).map_err(Unwind::Throw),
                    _ => Ok(Value::Undefined),
                };
            }
            return Ok(desc.value.unwrap_or(Value::Undefined));
        }
        current = o.prototype();
    }
    Ok(Value::Undefined)
}

pub fn set_property(agent: &mut Agent, base: &Value, key: PropertyKey, value: Value) -> EvalResult<()> {
    let Value::Object(obj) = base else {
        return Ok(()); // primitives silently discard writes outside strict mode
    };
    let proxy = match &obj.0.lock().unwrap().kind {
        ObjectKind::Proxy { target, handler } => Some((target.clone(), handler.clone())),
        _ => None,
    };
    if let Some((target, handler)) = proxy {
        let trap = get_property(agent, &handler, &PropertyKey::from_str("set"), &Value::Object(handler.clone()))?;
        if trap.is_callable() {
            call_function(agent, &trap, Value::Object(handler), &[Value::Object(target), key_to_value(&key), value, base.clone()])?;
            return Ok(());
        }
        return set_property(agent, &Value::Object(target), key, value);
    }
    if let PropertyKey::String(k) = &key {
        if let Ok(idx) = k.parse::<usize>() {
            let is_typed = matches!(obj.0.lock().unwrap().kind, ObjectKind::TypedArray { .. });
            if is_typed {
                let n = to_number(agent, &value)?;
                if let ObjectKind::TypedArray { kind, buffer, byte_offset, length } = &obj.0.lock().unwrap().kind {
                    if idx < *length {
                        crate::builtins::typed_array::write_element(&mut buffer.lock().unwrap(), *kind, *byte_offset, idx, n);
                    }
                }
                return Ok(());
            }
        }
    }
    // Walk the chain looking for an inherited setter before writing an
    // own data property, matching ordinary `[[Set]]`.
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        if let Some(desc) = o.get_own_property(&key) {
            if desc.is_accessor() {
                if let Some(setter) = &desc.set {
                    if setter.is_callable() {
                        call_function(agent, setter, base.clone(), &[value])?;
                    }
                }
                return Ok(());
            }
            break;
        }
        current = o.prototype();
    }
    if matches!(obj.0.lock().unwrap().kind, ObjectKind::Array) {
        if let Some(idx) = key.as_index() {
            let len_key = PropertyKey::from_str("length");
            let cur_len = obj.get_own_data(&len_key).map(|v| match v {
                Value::Number(n) => n as usize,
                _ => 0,
            }).unwrap_or(0);
            if idx + 1 > cur_len {
                obj.define_data_property(len_key, Value::Number((idx + 1) as f64), true, false, false);
            }
        }
    }
    obj.define_data_property(key, value, true, true, true);
    Ok(())
}

// ---------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------

pub fn to_object(agent: &mut Agent, v: Value) -> EvalResult<JsObject> {
    match to_object_ref(agent, &v)? {
        Value::Object(o) => Ok(o),
        _ => unreachable!(),
    }
}

fn to_object_ref(agent: &mut Agent, v: &Value) -> EvalResult<Value> {
    match v {
        Value::Undefined | Value::Null => Err(throw(agent, "Cannot convert undefined or null to object")),
        Value::Object(_) => Ok(v.clone()),
        Value::String(s) => {
            let obj = JsObject::new(ObjectKind::StringObject(s.clone()), Some(agent.realm.string_prototype.clone()));
            Ok(Value::Object(obj))
        }
        Value::Number(n) => Ok(Value::Object(JsObject::new(ObjectKind::Number(*n), Some(agent.realm.number_prototype.clone())))),
        Value::Boolean(b) => Ok(Value::Object(JsObject::new(ObjectKind::Boolean(*b), Some(agent.realm.boolean_prototype.clone())))),
        Value::Symbol(_) | Value::BigInt(_) => Ok(v.clone()),
    }
}

fn to_primitive(agent: &mut Agent, v: &Value) -> EvalResult<Value> {
    let Value::Object(obj) = v else { return Ok(v.clone()) };
    let to_primitive_key = PropertyKey::Symbol(agent.realm.well_known_symbols.to_primitive.clone());
    if let Some(f) = obj.get_own_data(&to_primitive_key) {
        if f.is_callable() {
            return call_function(agent, &f, v.clone(), &[Value::string("default")]).map_err(Unwind::Throw);
        }
    }
    for method in ["valueOf", "toString"] {
        let f = get_property(agent, obj, &PropertyKey::from_str(method), v)?;
        if f.is_callable() {
            let result = call_function(agent, &f, v.clone(), &[]).map_err(Unwind::Throw)?;
            if !matches!(result, Value::Object(_)) {
                return Ok(result);
            }
        }
    }
    Ok(Value::string(obj.debug_display()))
}

pub fn to_number(agent: &mut Agent, v: &Value) -> EvalResult<f64> {
    Ok(match v {
        Value::Number(n) => *n,
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::BigInt(_) => return Err(throw(agent, "Cannot convert a BigInt to a number")),
        Value::Symbol(_) => return Err(throw(agent, "Cannot convert a Symbol value to a number")),
        Value::Object(_) => {
            let prim = to_primitive(agent, v)?;
            if matches!(prim, Value::Object(_)) {
                f64::NAN
            } else {
                to_number(agent, &prim)?
            }
        }
    })
}

fn to_int32(agent: &mut Agent, v: &Value) -> EvalResult<i32> {
    let n = to_number(agent, v)?;
    if !n.is_finite() {
        return Ok(0);
    }
    Ok(n as i64 as i32)
}

pub fn to_js_string(agent: &mut Agent, v: &Value) -> EvalResult<String> {
    match v {
        Value::Symbol(_) => Err(throw(agent, "Cannot convert a Symbol value to a string")),
        Value::Object(_) => {
            let prim = to_primitive(agent, v)?;
            if matches!(prim, Value::Object(_)) {
                Ok(prim.to_display_string())
            } else {
                to_js_string(agent, &prim)
            }
        }
        other => Ok(other.to_display_string()),
    }
}

pub fn strict_equals(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => l.same_value_zero(r) && !matches!((l, r), (Value::Number(a), Value::Number(b)) if a.is_nan() || b.is_nan()),
    }
}

fn loose_equals(agent: &mut Agent, l: &Value, r: &Value) -> EvalResult<bool> {
    use Value::*;
    Ok(match (l, r) {
        (Null | Undefined, Null | Undefined) => true,
        (Null, _) | (Undefined, _) | (_, Null) | (_, Undefined) => false,
        (Number(_), Number(_)) | (String(_), String(_)) | (Boolean(_), Boolean(_)) | (Object(_), Object(_)) | (Symbol(_), Symbol(_)) | (BigInt(_), BigInt(_)) => strict_equals(l, r),
        (Number(_), String(_)) | (String(_), Number(_)) => to_number(agent, l)? == to_number(agent, r)?,
        (Boolean(_), _) => loose_equals(agent, &Number(to_number(agent, l)?), r)?,
        (_, Boolean(_)) => loose_equals(agent, l, &Number(to_number(agent, r)?))?,
        (Object(_), Number(_) | String(_) | BigInt(_) | Symbol(_)) => {
            let prim = to_primitive(agent, l)?;
            loose_equals(agent, &prim, r)?
        }
        (Number(_) | String(_) | BigInt(_) | Symbol(_), Object(_)) => {
            let prim = to_primitive(agent, r)?;
            loose_equals(agent, l, &prim)?
        }
        _ => false,
    })
}

// ---------------------------------------------------------------------
// Arrays, regexes, iterator protocol
// ---------------------------------------------------------------------

pub fn make_array(agent: &Agent, elements: Vec<Value>) -> Value {
    let obj = JsObject::new(ObjectKind::Array, Some(agent.realm.array_prototype.clone()));
    let len = elements.len();
    for (i, v) in elements.into_iter().enumerate() {
        obj.define_data_property(PropertyKey::from_index(i), v, true, true, true);
    }
    obj.define_data_property(PropertyKey::from_str("length"), Value::Number(len as f64), true, false, false);
    Value::Object(obj)
}

pub fn make_regexp(agent: &mut Agent, pattern: &str, flags: &str) -> EvalResult<Value> {
    let compiled = translate_regex(pattern, flags).ok();
    let data = crate::object::RegExpData { source: Arc::from(pattern), flags: Arc::from(flags), compiled: compiled.map(Arc::new), last_index: 0 };
    Ok(Value::Object(JsObject::new(ObjectKind::RegExp(data), Some(agent.realm.regexp_prototype.clone()))))
}

/// Best-effort translation of a handful of JS-only regex syntax bits (the
/// `regex` crate otherwise accepts ECMA-262 patterns directly); patterns
/// using features it truly cannot express fail to compile here and the
/// `RegExp` object carries `compiled: None`, matching how a real engine
/// would at least construct the object before a later `exec` call throws.
fn translate_regex(pattern: &str, flags: &str) -> Result<regex::Regex, regex::Error> {
    let mut builder = regex::RegexBuilder::new(pattern);
    builder.case_insensitive(flags.contains('i'));
    builder.multi_line(flags.contains('m'));
    builder.dot_matches_new_line(flags.contains('s'));
    builder.build()
}

/// An iterator handle: either a native Rust-side cursor over an array's
/// elements (the fast, common path, bypassing `Symbol.iterator` entirely)
/// or a user iterator object driven through the iterator protocol
/// (`next`/`return`).
pub enum IteratorHandle {
    Values(JsObject, std::cell::Cell<usize>),
    Protocol(Value),
}

/// `GetIterator` with hint `async`: prefers `Symbol.asyncIterator`, falling
/// back to the synchronous iterator protocol (whose yielded values
/// `for await` then awaits individually) when the value has none.
pub fn get_async_iterator(agent: &mut Agent, value: Value) -> EvalResult<IteratorHandle> {
    let async_key = PropertyKey::Symbol(agent.realm.well_known_symbols.async_iterator.clone());
    let method = get_property_value(agent, &value, &async_key)?;
    if method.is_callable() {
        let iterator = call_function(agent, &method, value, &[]).map_err(Unwind::Throw)?;
        return Ok(IteratorHandle::Protocol(iterator));
    }
    get_iterator(agent, value)
}

pub fn get_iterator(agent: &mut Agent, value: Value) -> EvalResult<IteratorHandle> {
    if let Value::Object(obj) = &value {
        if matches!(obj.0.lock().unwrap().kind, ObjectKind::Array) {
            return Ok(IteratorHandle::Values(obj.clone(), std::cell::Cell::new(0)));
        }
    }
    let iterator_key = PropertyKey::Symbol(agent.realm.well_known_symbols.iterator.clone());
    let method = get_property_value(agent, &value, &iterator_key)?;
    if !method.is_callable() {
        return Err(throw(agent, format!("{} is not iterable", value.to_display_string())));
    }
    let iterator = call_function(agent, &method, value, &[]).map_err(Unwind::Throw)?;
    Ok(IteratorHandle::Protocol(iterator))
}

pub fn iterator_step(agent: &mut Agent, handle: &IteratorHandle) -> EvalResult<Option<Value>> {
    match handle {
        IteratorHandle::Values(obj, cursor) => {
            let i = cursor.get();
            let len = match obj.get_own_data(&PropertyKey::from_str("length")) {
                Some(Value::Number(n)) => n as usize,
                _ => 0,
            };
            if i >= len {
                return Ok(None);
            }
            cursor.set(i + 1);
            Ok(Some(obj.get_own_data(&PropertyKey::from_index(i)).unwrap_or(Value::Undefined)))
        }
        IteratorHandle::Protocol(iterator) => {
            let next = get_property_value(agent, iterator, &PropertyKey::from_str("next"))?;
            let result = call_function(agent, &next, iterator.clone(), &[]).map_err(Unwind::Throw)?;
            let done = get_property_value(agent, &result, &PropertyKey::from_str("done"))?.to_boolean();
            if done {
                return Ok(None);
            }
            Ok(Some(get_property_value(agent, &result, &PropertyKey::from_str("value"))?))
        }
    }
}

pub fn iterator_close(agent: &mut Agent, handle: &IteratorHandle) {
    if let IteratorHandle::Protocol(iterator) = handle {
        if let Ok(ret) = get_property_value(agent, iterator, &PropertyKey::from_str("return")) {
            if ret.is_callable() {
                let _ = call_function(agent, &ret, iterator.clone(), &[]);
            }
        }
    }
}
