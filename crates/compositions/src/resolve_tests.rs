// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::CompositionType;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, contents: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn vars(json: Value) -> Map<String, Value> {
    as_object(json)
}

#[test]
fn extends_merges_parent_fields() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/base.yaml",
        "name: base\ntype: component\nversion: \"1\"\ncomponents:\n  - name: greeting\n    template: hello\n",
    );
    write(
        &dir,
        "components/child.yaml",
        "name: child\ntype: component\nversion: \"1\"\nextends: base\ncomponents:\n  - name: extra\n    template: world\n",
    );
    let loader = Loader::new(dir.path());
    let resolved = resolve(&loader, "child", CompositionType::Component, &Map::new()).unwrap();
    assert_eq!(resolved["greeting"], Value::String("hello".to_string()));
    assert_eq!(resolved["extra"], Value::String("world".to_string()));
}

#[test]
fn mixins_deep_merge_in_declaration_order_last_wins() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/base.yaml",
        "name: base\ntype: component\nversion: \"1\"\n",
    );
    write(
        &dir,
        "components/mix_a.yaml",
        "name: mix_a\ntype: component\nversion: \"1\"\ncomponents:\n  - name: tag\n    template: a\n",
    );
    write(
        &dir,
        "components/mix_b.yaml",
        "name: mix_b\ntype: component\nversion: \"1\"\ncomponents:\n  - name: tag\n    template: b\n",
    );
    write(
        &dir,
        "components/combined.yaml",
        "name: combined\ntype: component\nversion: \"1\"\nmixins: [mix_a, mix_b]\n",
    );
    let loader = Loader::new(dir.path());
    let resolved = resolve(&loader, "combined", CompositionType::Component, &Map::new()).unwrap();
    assert_eq!(resolved["tag"], Value::String("b".to_string()));
}

#[test]
fn variable_defaults_fill_in_when_caller_omits() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/greet.yaml",
        "name: greet\ntype: component\nversion: \"1\"\nvariables:\n  name:\n    default: world\ncomponents:\n  - name: text\n    template: \"hello {{name}}\"\n",
    );
    let loader = Loader::new(dir.path());
    let resolved = resolve(&loader, "greet", CompositionType::Component, &Map::new()).unwrap();
    assert_eq!(resolved["text"], Value::String("hello world".to_string()));
}

#[test]
fn caller_supplied_variable_overrides_default() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/greet.yaml",
        "name: greet\ntype: component\nversion: \"1\"\nvariables:\n  name:\n    default: world\ncomponents:\n  - name: text\n    template: \"hello {{name}}\"\n",
    );
    let loader = Loader::new(dir.path());
    let resolved =
        resolve(&loader, "greet", CompositionType::Component, &vars(serde_json::json!({"name": "rust"}))).unwrap();
    assert_eq!(resolved["text"], Value::String("hello rust".to_string()));
}

#[test]
fn condition_single_string_gates_component() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/gated.yaml",
        "name: gated\ntype: component\nversion: \"1\"\ncomponents:\n  - name: extra\n    template: shown\n    condition: enabled\n",
    );
    let loader = Loader::new(dir.path());
    let resolved_off = resolve(&loader, "gated", CompositionType::Component, &Map::new()).unwrap();
    assert!(resolved_off.get("extra").is_none());

    let resolved_on = resolve(
        &loader,
        "gated",
        CompositionType::Component,
        &vars(serde_json::json!({"enabled": true})),
    )
    .unwrap();
    assert_eq!(resolved_on["extra"], Value::String("shown".to_string()));
}

#[test]
fn condition_block_all_of_any_of_none_of() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/blocked.yaml",
        "name: blocked\ntype: component\nversion: \"1\"\ncomponents:\n  - name: extra\n    template: shown\n    condition:\n      all_of: [a]\n      none_of: [b]\n",
    );
    let loader = Loader::new(dir.path());
    let resolved = resolve(
        &loader,
        "blocked",
        CompositionType::Component,
        &vars(serde_json::json!({"a": true, "b": true})),
    )
    .unwrap();
    assert!(resolved.get("extra").is_none());

    let resolved = resolve(
        &loader,
        "blocked",
        CompositionType::Component,
        &vars(serde_json::json!({"a": true})),
    )
    .unwrap();
    assert_eq!(resolved["extra"], Value::String("shown".to_string()));
}

#[test]
fn extends_cycle_is_detected() {
    let dir = TempDir::new().unwrap();
    write(&dir, "components/a.yaml", "name: a\ntype: component\nversion: \"1\"\nextends: b\n");
    write(&dir, "components/b.yaml", "name: b\ntype: component\nversion: \"1\"\nextends: a\n");
    let loader = Loader::new(dir.path());
    let err = resolve(&loader, "a", CompositionType::Component, &Map::new()).unwrap_err();
    assert!(matches!(err, ResolveError::Cycle(_)));
}

#[test]
fn metadata_is_annotated_with_composition_identity() {
    let dir = TempDir::new().unwrap();
    write(&dir, "components/solo.yaml", "name: solo\ntype: component\nversion: \"3\"\n");
    let loader = Loader::new(dir.path());
    let resolved = resolve(&loader, "solo", CompositionType::Component, &Map::new()).unwrap();
    assert_eq!(resolved["_metadata"]["composition"], Value::String("solo".to_string()));
    assert_eq!(resolved["_metadata"]["version"], Value::String("3".to_string()));
}

#[test]
fn inline_component_with_single_token_preserves_native_type() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/typed.yaml",
        "name: typed\ntype: component\nversion: \"1\"\ncomponents:\n  - name: count\n    inline: \"{{n}}\"\n",
    );
    let loader = Loader::new(dir.path());
    let resolved =
        resolve(&loader, "typed", CompositionType::Component, &vars(serde_json::json!({"n": 5}))).unwrap();
    assert_eq!(resolved["count"], Value::Number(5.into()));
}
