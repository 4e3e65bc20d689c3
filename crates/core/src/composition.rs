// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition data model (spec.md §3, §4.5).
//!
//! A composition is a declarative YAML/Markdown-with-frontmatter fragment.
//! Resolution (inheritance, mixins, conditions, variable substitution)
//! lives in `ksi-compositions`; this module only holds the shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionType {
    Component,
    Persona,
    Behavior,
    Orchestration,
    Evaluation,
    Tool,
    Profile,
    Prompt,
}

impl CompositionType {
    /// Directory this composition type is loaded from under
    /// `lib/compositions/` (spec.md §6.3).
    pub fn dir_name(self) -> &'static str {
        match self {
            CompositionType::Component | CompositionType::Persona | CompositionType::Behavior => {
                "components"
            }
            CompositionType::Orchestration => "orchestrations",
            CompositionType::Evaluation => "evaluations",
            CompositionType::Tool | CompositionType::Profile | CompositionType::Prompt => {
                "components"
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A single condition on a component, or a boolean block of conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Single(String),
    Block {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        all_of: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        any_of: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        none_of: Vec<String>,
    },
}

/// What a component contributes: a fragment reference, a nested
/// composition, an inline object, or an inline template string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentSource {
    Fragment { source: String },
    Composition { composition: String },
    Inline { inline: Value },
    Template { template: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(flatten)]
    pub source: ComponentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    pub name: String,
    pub r#type: CompositionType,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, VariableSpec>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// `(name PRIMARY KEY, type, ...)` row of the composition index
/// (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionIndexRow {
    pub name: String,
    pub r#type: CompositionType,
    pub file_path: String,
    pub file_hash: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub loading_strategy: String,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub ephemeral: bool,
    pub full_metadata: Value,
    pub indexed_at: f64,
    pub last_modified: f64,
}

#[cfg(test)]
#[path = "composition_tests.rs"]
mod tests;
