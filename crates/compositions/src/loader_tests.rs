// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::CompositionType;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn locate_prefers_yaml_over_md() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/foo.yaml",
        "name: foo\ntype: component\nversion: \"1\"\n",
    );
    write(&dir, "components/foo.md", "---\nname: foo\ntype: component\n---\nbody");
    let loader = Loader::new(dir.path());
    let found = loader.locate("foo", CompositionType::Component).unwrap();
    assert!(found.ends_with("foo.yaml"));
}

#[test]
fn locate_falls_back_through_extension_order() {
    let dir = TempDir::new().unwrap();
    write(&dir, "components/bar.json", "{\"name\":\"bar\",\"type\":\"component\"}");
    let loader = Loader::new(dir.path());
    let found = loader.locate("bar", CompositionType::Component).unwrap();
    assert!(found.ends_with("bar.json"));
}

#[test]
fn locate_missing_returns_none() {
    let dir = TempDir::new().unwrap();
    let loader = Loader::new(dir.path());
    assert!(loader.locate("missing", CompositionType::Component).is_none());
}

#[test]
fn load_yaml_roundtrips_fields() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "orchestrations/plan.yaml",
        "name: plan\ntype: orchestration\nversion: \"2\"\ndescription: Plan things\n",
    );
    let loader = Loader::new(dir.path());
    let composition = loader.load("plan", CompositionType::Orchestration).unwrap();
    assert_eq!(composition.name, "plan");
    assert_eq!(composition.description, "Plan things");
}

#[test]
fn load_markdown_splits_frontmatter_and_body_into_component() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "components/persona.md",
        "---\nname: persona\ntype: persona\nversion: \"1\"\n---\nYou are a helpful assistant.\n",
    );
    let loader = Loader::new(dir.path());
    let composition = loader.load("persona", CompositionType::Persona).unwrap();
    assert_eq!(composition.components.len(), 1);
    match &composition.components[0].source {
        ComponentSource::Template { template } => {
            assert_eq!(template, "You are a helpful assistant.");
        }
        other => panic!("expected template component, got {other:?}"),
    }
}

#[test]
fn load_markdown_without_frontmatter_fence_errors() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "components/broken.md", "just a body, no frontmatter");
    let err = Loader::load_path(&path).unwrap_err();
    assert!(matches!(err, LoaderError::MissingFrontmatter { .. }));
}

#[test]
fn save_then_load_roundtrips() {
    let dir = TempDir::new().unwrap();
    let loader = Loader::new(dir.path());
    let composition = Composition {
        name: "created".to_string(),
        r#type: CompositionType::Profile,
        version: "1".to_string(),
        description: "a profile".to_string(),
        extends: None,
        mixins: vec![],
        components: vec![],
        variables: Default::default(),
        metadata: Default::default(),
    };
    loader.save(&composition).unwrap();
    let loaded = loader.load("created", CompositionType::Profile).unwrap();
    assert_eq!(loaded.description, "a profile");
}
