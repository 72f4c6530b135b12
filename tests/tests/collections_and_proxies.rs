// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;

#[test]
fn map_preserves_insertion_order_and_identity_keys() {
    let result = eval_string(
        "
        const m = new Map();
        const key = {};
        m.set('a', 1).set(key, 2).set('a', 3);
        let out = '';
        m.forEach((v, k) => { out += (typeof k === 'string' ? k : 'obj') + v; });
        out + m.size
        ",
    );
    assert_eq!(result, "a3obj22");
}

#[test]
fn set_deduplicates_by_strict_equality() {
    let result = eval_number("new Set([1, 2, 2, 3, 1]).size");
    assert_eq!(result, 3.0);
}

#[test]
fn weakmap_keys_are_compared_by_identity_not_structural_equality() {
    let result = eval_bool(
        "
        const wm = new WeakMap();
        const k1 = {};
        const k2 = {};
        wm.set(k1, 'one');
        wm.has(k1) && !wm.has(k2)
        ",
    );
    assert!(result);
}

#[test]
fn proxy_get_and_set_traps_intercept_property_access() {
    let result = eval_number(
        "
        let log = [];
        const target = { value: 1 };
        const proxy = new Proxy(target, {
            get(t, key) { log.push('get:' + key); return t[key]; },
            set(t, key, v) { log.push('set:' + key); t[key] = v * 2; return true; },
        });
        proxy.value = 10;
        proxy.value + log.length
        ",
    );
    assert_eq!(result, 22.0);
}

#[test]
fn proxy_has_trap_intercepts_the_in_operator() {
    let result = eval_bool(
        "
        const proxy = new Proxy({}, { has(t, key) { return key === 'secret'; } });
        ('secret' in proxy) && !('other' in proxy)
        ",
    );
    assert!(result);
}

#[test]
fn reflect_get_and_apply_operate_on_the_target_directly() {
    let result = eval_number(
        "
        const obj = { value: 21 };
        function double() { return Reflect.get(this, 'value') * 2; }
        Reflect.apply(double, obj, [])
        ",
    );
    assert_eq!(result, 42.0);
}

#[test]
fn typed_array_reads_and_writes_through_the_backing_buffer() {
    let result = eval_number(
        "
        const buf = new ArrayBuffer(8);
        const view = new Int32Array(buf);
        view[0] = 100;
        view[1] = 23;
        view[0] + view[1] + view.length
        ",
    );
    assert_eq!(result, 125.0);
}

#[test]
fn symbol_iterator_drives_for_of_over_a_custom_object() {
    let result = eval_string(
        "
        const iterable = {
            [Symbol.iterator]() {
                let i = 0;
                return { next() { return i < 3 ? { value: i++, done: false } : { value: undefined, done: true }; } };
            }
        };
        let out = '';
        for (const v of iterable) out += v;
        out
        ",
    );
    assert_eq!(result, "012");
}
