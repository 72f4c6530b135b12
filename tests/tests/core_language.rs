// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;

#[test]
fn arithmetic_and_operator_precedence() {
    assert_eq!(eval_number("1 + 2 * 3"), 7.0);
    assert_eq!(eval_number("(1 + 2) * 3"), 9.0);
    assert_eq!(eval_number("10 % 3"), 1.0);
    assert_eq!(eval_number("2 ** 10"), 1024.0);
}

#[test]
fn closures_capture_by_reference() {
    let result = eval_number(
        "
        function makeCounter() {
            let count = 0;
            return function () { return ++count; };
        }
        const counter = makeCounter();
        counter(); counter(); counter()
        ",
    );
    assert_eq!(result, 3.0);
}

#[test]
fn prototype_chain_lookup() {
    let result = eval_number(
        "
        function Animal(name) { this.name = name; }
        Animal.prototype.speak = function () { return this.name.length; };
        const a = new Animal('fox');
        a.speak()
        ",
    );
    assert_eq!(result, 3.0);
}

#[test]
fn hoisting_of_function_declarations() {
    let result = eval_number(
        "
        function outer() { return inner(); }
        function inner() { return 42; }
        outer()
        ",
    );
    assert_eq!(result, 42.0);
}

#[test]
fn try_catch_finally_ordering() {
    let result = eval_string(
        "
        let log = '';
        try {
            log += 'a';
            throw new Error('boom');
        } catch (e) {
            log += 'b' + e.message;
        } finally {
            log += 'c';
        }
        log
        ",
    );
    assert_eq!(result, "abboomc");
}

#[test]
fn top_level_function_declaration_is_the_completion_value() {
    // Open Question #1 in the design notes: the last top-level statement
    // being a function declaration makes the program evaluate to it.
    let result = eval("function f() { return 1; }");
    assert!(matches!(result, es_vm::Value::Object(_)));
}

#[test]
fn with_statement_resolves_through_object_environment() {
    let result = eval_number(
        "
        const scope = { x: 5 };
        let y;
        with (scope) { y = x + 1; }
        y
        ",
    );
    assert_eq!(result, 6.0);
}

#[test]
fn uncaught_throw_surfaces_as_engine_error() {
    let message = eval_err("throw new TypeError('nope')");
    assert!(message.contains("nope"));
}

#[test]
fn eval_is_a_stub_that_throws() {
    // Non-goal: direct/indirect eval is not implemented.
    let message = eval_err("eval('1 + 1')");
    assert!(!message.is_empty());
}
