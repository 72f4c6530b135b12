// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use es_parser::ast::Node;
use es_vm::{Agent, Engine, JsResult, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn in_memory_loader(modules: HashMap<&'static str, &'static str>) -> impl FnMut(&mut Agent, &str) -> JsResult<Value> {
    move |agent: &mut Agent, specifier: &str| {
        let source = *modules.get(specifier).unwrap_or_else(|| panic!("no module registered for '{specifier}'"));
        let out = es_parser::parse(source, true).map_err(|e| es_vm::JsError::new(Value::string(e.to_string())))?;
        let arena = Arc::new(out.arena);
        let Node::Program(program) = &arena[out.program] else {
            unreachable!("parse() always roots a Program node")
        };
        let ns = es_vm::interpreter::run_module(agent, arena.clone(), program)?;
        Ok(Value::Object(ns))
    }
}

#[test]
fn named_and_default_exports_are_visible_to_importers() {
    let mut engine = Engine::new();
    let mut modules = HashMap::new();
    modules.insert("math", "export const pi = 3; export default function add(a, b) { return a + b; }");
    engine.set_module_loader(in_memory_loader(modules));

    let result = engine
        .evaluate_module(
            "
            import add, { pi } from 'math';
            export const result = add(pi, 4);
            ",
        )
        .unwrap();

    let Value::Object(ns) = result else { panic!("expected a namespace object") };
    let value = ns.get_own_data(&es_vm::value::PropertyKey::from_str("result")).expect("result export");
    assert!(matches!(value, Value::Number(n) if n == 7.0));
}

#[test]
fn namespace_import_exposes_every_export_as_a_property() {
    let mut engine = Engine::new();
    let mut modules = HashMap::new();
    modules.insert("constants", "export const a = 1; export const b = 2;");
    engine.set_module_loader(in_memory_loader(modules));

    let result = engine
        .evaluate_module(
            "
            import * as constants from 'constants';
            export const total = constants.a + constants.b;
            ",
        )
        .unwrap();

    let Value::Object(ns) = result else { panic!("expected a namespace object") };
    let value = ns.get_own_data(&es_vm::value::PropertyKey::from_str("total")).expect("total export");
    assert!(matches!(value, Value::Number(n) if n == 3.0));
}

#[test]
fn module_specifiers_are_resolved_before_loading() {
    let mut engine = Engine::new();
    let mut modules = HashMap::new();
    modules.insert("/project/math.js", "export const doubled = 21 * 2;");
    engine.set_module_loader(in_memory_loader(modules));
    engine.set_module_resolver(|specifier: &str| format!("/project/{specifier}.js"));

    let result = engine.evaluate_module("import { doubled } from 'math'; export const out = doubled;").unwrap();

    let Value::Object(ns) = result else { panic!("expected a namespace object") };
    let value = ns.get_own_data(&es_vm::value::PropertyKey::from_str("out")).expect("out export");
    assert!(matches!(value, Value::Number(n) if n == 42.0));
}
