// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generators and async functions (C8) as OS-thread coroutines (C5
//! concurrency model): a generator body runs on its own thread, which
//! blocks on a rendezvous channel at every `yield`/`await` and hands
//! control straight back to the driver. Exactly one of the two threads
//! touches the `Agent` at any moment, so there is no real parallelism here
//! -- this buys cooperative suspension of a tree-walking evaluator without
//! a bytecode VM or a CPS rewrite of the interpreter.
//!
//! Async functions reuse the same machinery: an async body suspends at
//! `await` the same way a generator suspends at `yield`, tagging its
//! message [`CoroutineMessage::Awaited`] instead of `Yielded` so the
//! driver in `interpreter.rs` knows to resume it from a promise reaction
//! rather than handing the value back out to user code.

use crate::error::JsResult;
use crate::value::Value;
use std::fmt;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

/// What the driver sends into a parked coroutine to resume it.
pub enum HostMessage {
    /// `generator.next(value)` / the promise `await` was waiting on fulfilled.
    Resume(Value),
    /// `generator.throw(value)` / the awaited promise rejected.
    Throw(Value),
    /// `generator.return(value)`, or the generator is being discarded
    /// before it ran to completion and needs to unwind through `finally`.
    Return(Value),
}

/// What a coroutine sends back at each suspension point or on completion.
enum CoroutineMessage {
    Yielded(Value),
    Awaited(Value),
    Finished(JsResult<Value>),
}

/// Carries the driver's `&mut Agent` into the coroutine thread as a raw
/// pointer. Sound only under the handoff protocol this module enforces:
/// the driver thread is always blocked on `from_coroutine.recv()` for the
/// entire window between sending a `HostMessage` and receiving the
/// matching `CoroutineMessage`, so at most one thread ever dereferences it.
struct AgentPtr(*mut crate::agent::Agent);
unsafe impl Send for AgentPtr {}

/// Handed to the interpreter's statement/expression evaluator when it is
/// running a generator or async function body on a coroutine thread.
pub struct GeneratorHandle {
    agent: AgentPtr,
    to_driver: SyncSender<CoroutineMessage>,
    from_driver: Receiver<HostMessage>,
}

unsafe impl Send for GeneratorHandle {}

impl GeneratorHandle {
    /// Reborrows the agent lent by the driver for the current resumption.
    pub fn agent(&mut self) -> &mut crate::agent::Agent {
        unsafe { &mut *self.agent.0 }
    }

    /// Suspends at a `yield`, handing `value` back to the driver, and
    /// blocks until the driver resumes this coroutine.
    pub fn yield_value(&self, value: Value) -> HostMessage {
        self.to_driver.send(CoroutineMessage::Yielded(value)).expect("generator driver gone");
        self.from_driver.recv().expect("generator driver gone")
    }

    /// Suspends at an `await`, identical wire format to `yield_value` but
    /// tagged separately so the driver can tell an internal await apart
    /// from a user-visible yield.
    pub fn await_value(&self, value: Value) -> HostMessage {
        self.to_driver.send(CoroutineMessage::Awaited(value)).expect("generator driver gone");
        self.from_driver.recv().expect("generator driver gone")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStatus {
    SuspendedStart,
    SuspendedYield,
    Executing,
    Completed,
}

/// The outcome of resuming a generator/async coroutine for one step.
pub enum ResumeResult {
    Yielded(Value),
    Awaited(Value),
    Returned(JsResult<Value>),
}

/// The coroutine handle stored in a generator object's
/// [`crate::object::ObjectKind::Generator`] slot.
pub struct GeneratorState {
    status: GeneratorStatus,
    to_coroutine: SyncSender<HostMessage>,
    from_coroutine: Receiver<CoroutineMessage>,
    handle: Option<JoinHandle<()>>,
}

impl fmt::Debug for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorState").field("status", &self.status).finish()
    }
}

impl GeneratorState {
    /// Spawns the coroutine thread. `body` does not start running until
    /// the first `resume`/`throw`/`return_` call, matching
    /// `SuspendedStart` semantics: a generator that is dropped without
    /// ever being resumed never executes a single statement of its body.
    pub fn spawn(agent: &mut crate::agent::Agent, body: impl FnOnce(&mut GeneratorHandle) -> JsResult<Value> + Send + 'static) -> Self {
        let (to_coroutine_tx, to_coroutine_rx) = sync_channel::<HostMessage>(0);
        let (to_driver_tx, to_driver_rx) = sync_channel::<CoroutineMessage>(0);
        let agent_ptr = AgentPtr(agent as *mut crate::agent::Agent);

        let handle = std::thread::Builder::new()
            .name("es-coroutine".into())
            .spawn(move || {
                let mut handle = GeneratorHandle { agent: agent_ptr, to_driver: to_driver_tx.clone(), from_driver: to_coroutine_rx };
                match handle.from_driver.recv() {
                    Ok(HostMessage::Resume(_)) => {}
                    Ok(HostMessage::Return(v)) => {
                        let _ = to_driver_tx.send(CoroutineMessage::Finished(Ok(v)));
                        return;
                    }
                    Ok(HostMessage::Throw(v)) => {
                        let _ = to_driver_tx.send(CoroutineMessage::Finished(Err(crate::error::JsError::new(v))));
                        return;
                    }
                    Err(_) => return,
                }
                let result = body(&mut handle);
                let _ = to_driver_tx.send(CoroutineMessage::Finished(result));
            })
            .expect("failed to spawn coroutine thread");

        GeneratorState { status: GeneratorStatus::SuspendedStart, to_coroutine: to_coroutine_tx, from_coroutine: to_driver_rx, handle: Some(handle) }
    }

    pub fn status(&self) -> GeneratorStatus {
        self.status
    }

    fn send_and_wait(&mut self, msg: HostMessage) -> ResumeResult {
        self.status = GeneratorStatus::Executing;
        self.to_coroutine.send(msg).expect("coroutine thread gone");
        match self.from_coroutine.recv().expect("coroutine thread gone") {
            CoroutineMessage::Yielded(v) => {
                self.status = GeneratorStatus::SuspendedYield;
                ResumeResult::Yielded(v)
            }
            CoroutineMessage::Awaited(v) => {
                self.status = GeneratorStatus::SuspendedYield;
                ResumeResult::Awaited(v)
            }
            CoroutineMessage::Finished(result) => {
                self.status = GeneratorStatus::Completed;
                if let Some(h) = self.handle.take() {
                    let _ = h.join();
                }
                ResumeResult::Returned(result)
            }
        }
    }

    /// `GeneratorResume`/async-function resume-with-value. Caller is
    /// expected to have already rejected `status() == Executing` with a
    /// `TypeError` before calling this.
    pub fn resume(&mut self, value: Value) -> ResumeResult {
        if self.status == GeneratorStatus::Completed {
            return ResumeResult::Returned(Ok(Value::Undefined));
        }
        self.send_and_wait(HostMessage::Resume(value))
    }

    /// `GeneratorResumeAbrupt` with a throw completion.
    pub fn throw(&mut self, value: Value) -> ResumeResult {
        if self.status == GeneratorStatus::Completed {
            return ResumeResult::Returned(Err(crate::error::JsError::new(value)));
        }
        self.send_and_wait(HostMessage::Throw(value))
    }

    /// `GeneratorResumeAbrupt` with a return completion: unwinds the
    /// suspended body through any `finally` blocks before completing.
    pub fn return_(&mut self, value: Value) -> ResumeResult {
        if self.status == GeneratorStatus::Completed {
            return ResumeResult::Returned(Ok(value));
        }
        self.send_and_wait(HostMessage::Return(value))
    }
}

impl Drop for GeneratorState {
    fn drop(&mut self) {
        if matches!(self.status, GeneratorStatus::SuspendedStart | GeneratorStatus::SuspendedYield) {
            let _ = self.to_coroutine.send(HostMessage::Return(Value::Undefined));
            let _ = self.from_coroutine.recv();
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
