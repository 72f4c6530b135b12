// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Promises and the microtask queue (C9): `PromiseState` is the internal
//! slot bundle stored in a `Promise` object's [`crate::object::ObjectKind`];
//! reaction scheduling enqueues [`crate::agent::Job`] closures onto
//! `Agent::microtasks`, splitting "create the reaction job" from "run it
//! later" the way the spec's `PromiseReactionJob` abstract operation does.

use crate::agent::Agent;
use crate::error::JsResult;
use crate::object::{JsObject, ObjectKind};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct Reaction {
    pub handler: Option<Value>,
    pub result_capability: JsObject,
}

#[derive(Debug, Clone, Default)]
pub struct PromiseState {
    pub status: Option<PromiseStatus>,
    pub result: Option<Value>,
    pub fulfill_reactions: Vec<Reaction>,
    pub reject_reactions: Vec<Reaction>,
    pub is_handled: bool,
}

impl PromiseState {
    pub fn new() -> Self {
        PromiseState { status: Some(PromiseStatus::Pending), ..Default::default() }
    }
}

/// Creates a new, pending promise object.
pub fn new_promise(agent: &Agent) -> JsObject {
    JsObject::new(ObjectKind::Promise(PromiseState::new()), Some(agent.realm.promise_prototype.clone()))
}

fn with_state<T>(promise: &JsObject, f: impl FnOnce(&mut PromiseState) -> T) -> T {
    let mut data = promise.0.lock().unwrap();
    match &mut data.kind {
        ObjectKind::Promise(state) => f(state),
        _ => unreachable!("with_state called on a non-promise object"),
    }
}

pub fn status(promise: &JsObject) -> PromiseStatus {
    with_state(promise, |s| s.status.unwrap_or(PromiseStatus::Pending))
}

/// `FulfillPromise`/`RejectPromise`: settles the promise and schedules
/// its already-registered reactions as microtasks. A no-op if the
/// promise is already settled.
pub fn settle(agent: &mut Agent, promise: &JsObject, status: PromiseStatus, value: Value) {
    let reactions = with_state(promise, |s| {
        if s.status != Some(PromiseStatus::Pending) {
            return None;
        }
        s.status = Some(status);
        s.result = Some(value.clone());
        Some(if status == PromiseStatus::Fulfilled {
            std::mem::take(&mut s.fulfill_reactions)
        } else {
            std::mem::take(&mut s.reject_reactions)
        })
    });
    let Some(reactions) = reactions else { return };
    with_state(promise, |s| {
        s.fulfill_reactions.clear();
        s.reject_reactions.clear();
    });
    for reaction in reactions {
        schedule_reaction(agent, reaction, status, value.clone());
    }
}

pub fn resolve(agent: &mut Agent, promise: &JsObject, value: Value) {
    // Adopt the state of a thenable value rather than wrapping it,
    // matching `PromiseResolveThenableJob`: if `value` is itself a
    // pending/settled promise, chain onto it instead of nesting promises.
    if let Value::Object(obj) = &value {
        if matches!(obj.0.lock().unwrap().kind, ObjectKind::Promise(_)) {
            let inner = obj.clone();
            let target = promise.clone();
            on_settled(
                agent,
                &inner,
                Box::new(move |agent, v| settle(agent, &target, PromiseStatus::Fulfilled, v)),
                Box::new({
                    let target = promise.clone();
                    move |agent, v| settle(agent, &target, PromiseStatus::Rejected, v)
                }),
            );
            return;
        }
    }
    settle(agent, promise, PromiseStatus::Fulfilled, value);
}

pub fn reject(agent: &mut Agent, promise: &JsObject, value: Value) {
    settle(agent, promise, PromiseStatus::Rejected, value);
}

type Callback = Box<dyn FnOnce(&mut Agent, Value)>;

/// Internal hook used by `resolve`'s thenable-adoption and by `await`
/// (C9/C5 concurrency model): runs `on_fulfill`/`on_reject` as a
/// microtask once `promise` settles, without allocating a user-visible
/// result-capability promise the way `.then` does.
pub fn on_settled(agent: &mut Agent, promise: &JsObject, on_fulfill: Callback, on_reject: Callback) {
    let current = with_state(promise, |s| (s.status, s.result.clone()));
    match current {
        (Some(PromiseStatus::Fulfilled), Some(v)) => {
            agent.enqueue_microtask(Box::new(move |agent| on_fulfill(agent, v)));
        }
        (Some(PromiseStatus::Rejected), Some(v)) => {
            with_state(promise, |s| s.is_handled = true);
            agent.enqueue_microtask(Box::new(move |agent| on_reject(agent, v)));
        }
        _ => {
            let capability = new_promise(agent);
            with_state(promise, |s| {
                s.fulfill_reactions.push(Reaction { handler: None, result_capability: capability.clone() });
                s.reject_reactions.push(Reaction { handler: None, result_capability: capability.clone() });
            });
            on_settled(agent, &capability, on_fulfill, on_reject);
        }
    }
}

fn schedule_reaction(agent: &mut Agent, reaction: Reaction, status: PromiseStatus, value: Value) {
    agent.enqueue_microtask(Box::new(move |agent| {
        run_reaction(agent, &reaction, status, value);
    }));
}

fn run_reaction(agent: &mut Agent, reaction: &Reaction, status: PromiseStatus, value: Value) {
    let outcome: JsResult<Value> = match &reaction.handler {
        Some(handler) if handler.is_callable() => {
            crate::interpreter::call_function(agent, handler, Value::Undefined, &[value])
        }
        _ if status == PromiseStatus::Fulfilled => Ok(value),
        _ => Err(crate::error::JsError::new(value)),
    };
    match outcome {
        Ok(v) => resolve(agent, &reaction.result_capability, v),
        Err(e) => reject(agent, &reaction.result_capability, e.into_value()),
    }
}

/// `Promise.prototype.then`.
pub fn then(agent: &mut Agent, promise: &JsObject, on_fulfilled: Option<Value>, on_rejected: Option<Value>) -> JsObject {
    let capability = new_promise(agent);
    let fulfill = Reaction { handler: on_fulfilled, result_capability: capability.clone() };
    let reject_reaction = Reaction { handler: on_rejected, result_capability: capability.clone() };
    let current = with_state(promise, |s| (s.status, s.result.clone()));
    match current {
        (Some(PromiseStatus::Pending), _) => with_state(promise, |s| {
            s.fulfill_reactions.push(fulfill);
            s.reject_reactions.push(reject_reaction);
        }),
        (Some(st), Some(v)) => {
            with_state(promise, |s| s.is_handled = true);
            schedule_reaction(agent, if st == PromiseStatus::Fulfilled { fulfill } else { reject_reaction }, st, v);
        }
        _ => unreachable!("settled promise always carries a result"),
    }
    capability
}
