// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn condition_single_deserializes_from_string() {
    let c: Condition = serde_json::from_str(r#""verbose""#).unwrap();
    matches!(c, Condition::Single(s) if s == "verbose");
}

#[test]
fn condition_block_deserializes_from_object() {
    let c: Condition =
        serde_json::from_str(r#"{"all_of": ["a", "b"], "any_of": [], "none_of": []}"#).unwrap();
    match c {
        Condition::Block { all_of, .. } => assert_eq!(all_of, vec!["a", "b"]),
        _ => panic!("expected block"),
    }
}

#[test]
fn component_source_template_round_trips() {
    let comp = Component {
        name: "greeting".into(),
        source: ComponentSource::Template { template: "hello {{name}}".into() },
        condition: None,
    };
    let json = serde_json::to_value(&comp).unwrap();
    assert_eq!(json["template"], "hello {{name}}");
}

#[test]
fn composition_type_maps_to_directory() {
    assert_eq!(CompositionType::Orchestration.dir_name(), "orchestrations");
    assert_eq!(CompositionType::Persona.dir_name(), "components");
}
