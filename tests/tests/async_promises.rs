// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;

#[test]
fn promise_then_chain_resolves_in_order() {
    let result = eval_async(
        "
        Promise.resolve(1)
            .then(v => v + 1)
            .then(v => v * 10)
        ",
    );
    assert!(matches!(result, es_vm::Value::Number(n) if n == 20.0));
}

#[test]
fn async_function_await_unwraps_resolved_value() {
    let result = eval_async(
        "
        async function compute() {
            const a = await Promise.resolve(3);
            const b = await 4;
            return a + b;
        }
        compute()
        ",
    );
    assert!(matches!(result, es_vm::Value::Number(n) if n == 7.0));
}

#[test]
fn promise_all_settles_after_every_input_settles() {
    let result = eval_async(
        "
        Promise.all([Promise.resolve(1), 2, Promise.resolve(3)])
            .then(values => values[0] + values[1] + values[2])
        ",
    );
    assert!(matches!(result, es_vm::Value::Number(n) if n == 6.0));
}

#[test]
fn rejected_promise_propagates_through_catch() {
    let result = eval_async(
        "
        Promise.reject(new Error('bad'))
            .catch(e => e.message)
        ",
    );
    match result {
        es_vm::Value::String(s) => assert_eq!(s.as_ref(), "bad"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn for_await_of_drains_an_async_generator() {
    let result = eval_async(
        "
        async function* ticks() {
            yield 1;
            yield await Promise.resolve(2);
            yield 3;
        }
        async function sum() {
            let total = 0;
            for await (const v of ticks()) total += v;
            return total;
        }
        sum()
        ",
    );
    assert!(matches!(result, es_vm::Value::Number(n) if n == 6.0));
}

#[test]
fn set_timeout_callback_runs_during_run_pending_tasks() {
    let mut engine = es_vm::Engine::new();
    engine.evaluate("globalThis.fired = false; setTimeout(() => { fired = true; }, 0);").unwrap();
    engine.run_pending_tasks();
    let fired = engine.evaluate("fired").unwrap();
    assert!(matches!(fired, es_vm::Value::Boolean(true)));
}
