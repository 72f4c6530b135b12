// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;

#[test]
fn class_inheritance_and_super_calls() {
    let result = eval_number(
        "
        class Shape {
            constructor(sides) { this.sides = sides; }
            describe() { return this.sides; }
        }
        class Square extends Shape {
            constructor() { super(4); }
            describe() { return super.describe() * 10; }
        }
        new Square().describe()
        ",
    );
    assert_eq!(result, 40.0);
}

#[test]
fn static_blocks_and_private_fields() {
    let result = eval_number(
        "
        class Counter {
            static total = 0;
            #value = 0;
            static { Counter.total = 100; }
            increment() { this.#value += 1; return this.#value; }
        }
        const c = new Counter();
        c.increment(); c.increment();
        Counter.total + c.increment()
        ",
    );
    assert_eq!(result, 103.0);
}

#[test]
fn generator_yields_a_sequence() {
    let result = eval_string(
        "
        function* range(n) {
            for (let i = 0; i < n; i++) yield i;
        }
        let out = '';
        for (const v of range(4)) out += v;
        out
        ",
    );
    assert_eq!(result, "0123");
}

#[test]
fn generator_receives_values_sent_via_next() {
    let result = eval_number(
        "
        function* echo() {
            const a = yield 1;
            const b = yield a + 1;
            return a + b;
        }
        const g = echo();
        g.next();
        g.next(10);
        g.next(20).value
        ",
    );
    assert_eq!(result, 30.0);
}

#[test]
fn class_field_initializers_run_before_constructor_body() {
    let result = eval_number(
        "
        class Point {
            x = 1;
            y = this.x + 1;
            constructor(extra) { this.y += extra; }
        }
        new Point(5).y
        ",
    );
    assert_eq!(result, 7.0);
}
