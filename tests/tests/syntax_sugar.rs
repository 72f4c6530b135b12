// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;

#[test]
fn array_and_object_destructuring_with_defaults() {
    let result = eval_number(
        "
        const [a, , b = 10] = [1, 2];
        const { x, y: renamed = 5 } = { x: 1 };
        a + b + x + renamed
        ",
    );
    assert_eq!(result, 17.0);
}

#[test]
fn rest_and_spread_in_calls_and_literals() {
    let result = eval_number(
        "
        function sum(first, ...rest) {
            return first + rest.reduce((a, b) => a + b, 0);
        }
        const nums = [1, 2, 3];
        sum(...nums, ...[4, 5])
        ",
    );
    assert_eq!(result, 15.0);
}

#[test]
fn template_literals_interpolate_and_tag_functions_receive_raw_strings() {
    let result = eval_string(
        "
        function tag(strings, ...values) {
            return strings.raw.join('|') + ':' + values.join(',');
        }
        const name = 'world';
        tag`hi\\n${name}!${1 + 1}`
        ",
    );
    assert_eq!(result, "hi\\n|!|:world,2");
}

#[test]
fn optional_chaining_short_circuits_on_nullish() {
    let result = eval_number(
        "
        const obj = { a: { b: null } };
        (obj?.a?.b?.c ?? 99) + (obj?.missing?.deep ?? 1)
        ",
    );
    assert_eq!(result, 100.0);
}

#[test]
fn logical_assignment_operators() {
    let result = eval_number(
        "
        let a = null;
        a ??= 5;
        let b = 0;
        b ||= 10;
        let c = 1;
        c &&= 20;
        a + b + c
        ",
    );
    assert_eq!(result, 35.0);
}

#[test]
fn for_in_enumerates_own_and_inherited_keys() {
    let result = eval_string(
        "
        function Base() { this.a = 1; }
        Base.prototype.b = 2;
        const obj = new Base();
        obj.c = 3;
        let keys = [];
        for (const k in obj) keys.push(k);
        keys.sort().join(',')
        ",
    );
    assert_eq!(result, "a,b,c");
}

#[test]
fn nullish_coalescing_only_triggers_on_null_or_undefined() {
    let result = eval_number("0 ?? 5");
    assert_eq!(result, 0.0);
}
