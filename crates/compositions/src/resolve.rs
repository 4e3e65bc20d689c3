// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition resolution (spec.md §4.5): `extends` -> mixins -> variable
//! defaults -> components (with conditions) -> `_metadata` annotation.

use crate::loader::{Loader, LoaderError};
use ksi_core::{Component, ComponentSource, Composition, Condition, CompositionType};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("cycle detected resolving composition {0:?}")]
    Cycle(String),
}

/// Resolve `(name, type)` against `vars`, recursively loading `extends`,
/// mixins, and nested compositions via `loader`.
pub fn resolve(
    loader: &Loader,
    name: &str,
    type_: CompositionType,
    vars: &Map<String, Value>,
) -> Result<Value, ResolveError> {
    let mut visited = HashSet::new();
    let composition = loader.load(name, type_)?;
    resolve_inner(loader, &composition, vars, &mut visited)
}

fn visit_key(name: &str, type_: CompositionType) -> String {
    format!("{type_:?}:{name}")
}

fn resolve_inner(
    loader: &Loader,
    composition: &Composition,
    vars: &Map<String, Value>,
    visited: &mut HashSet<String>,
) -> Result<Value, ResolveError> {
    let key = visit_key(&composition.name, composition.r#type);
    if !visited.insert(key.clone()) {
        return Err(ResolveError::Cycle(key));
    }

    // Step 1: extends.
    let mut result = match &composition.extends {
        Some(parent_name) => {
            let parent = loader.load(parent_name, composition.r#type)?;
            let resolved = resolve_inner(loader, &parent, vars, visited)?;
            as_object(resolved)
        }
        None => Map::new(),
    };

    // Step 2: mixins, deep-merged in order.
    for mixin_name in &composition.mixins {
        let mixin = loader.load(mixin_name, composition.r#type)?;
        let resolved = resolve_inner(loader, &mixin, vars, visited)?;
        deep_merge(&mut result, as_object(resolved));
    }

    // Step 3: variable defaults, overridden by caller-supplied vars.
    let mut effective_vars = vars.clone();
    for (name, spec) in &composition.variables {
        if !effective_vars.contains_key(name) {
            if let Some(default) = &spec.default {
                effective_vars.insert(name.clone(), default.clone());
            }
        }
    }

    // Step 4: components in declaration order.
    for component in &composition.components {
        if !evaluate_condition(component, &effective_vars) {
            continue;
        }
        let value = render_component(loader, component, &effective_vars, visited)?;
        result.insert(component.name.clone(), value);
    }

    visited.remove(&key);

    // Step 5: metadata annotation.
    let mut metadata = Map::new();
    metadata.insert("composition".to_string(), Value::String(composition.name.clone()));
    metadata.insert("type".to_string(), serde_json::to_value(composition.r#type).unwrap_or(Value::Null));
    metadata.insert("version".to_string(), Value::String(composition.version.clone()));
    metadata.insert("resolved_at".to_string(), Value::String("0".to_string()));
    result.insert("_metadata".to_string(), Value::Object(metadata));

    Ok(Value::Object(result))
}

fn render_component(
    loader: &Loader,
    component: &Component,
    vars: &Map<String, Value>,
    visited: &mut HashSet<String>,
) -> Result<Value, ResolveError> {
    match &component.source {
        ComponentSource::Fragment { source } => {
            let contents = std::fs::read_to_string(loader.root().join(source))
                .map_err(|e| ResolveError::Loader(LoaderError::Io { path: loader.root().join(source), source: e }))?;
            Ok(Value::String(substitute(&contents, vars)))
        }
        ComponentSource::Composition { composition: nested_name } => {
            let nested = loader.load(nested_name, CompositionType::Component)
                .or_else(|_| loader.load(nested_name, CompositionType::Orchestration))?;
            resolve_inner(loader, &nested, vars, visited)
        }
        ComponentSource::Inline { inline } => Ok(substitute_value(inline, vars)),
        ComponentSource::Template { template } => Ok(Value::String(substitute(template, vars))),
    }
}

/// `condition` (single string) or `conditions` block. Undefined
/// variables evaluate to false.
fn evaluate_condition(component: &Component, vars: &Map<String, Value>) -> bool {
    match &component.condition {
        None => true,
        Some(Condition::Single(expr)) => is_truthy(expr, vars),
        Some(Condition::Block { all_of, any_of, none_of }) => {
            let all_ok = all_of.iter().all(|e| is_truthy(e, vars));
            let any_ok = any_of.is_empty() || any_of.iter().any(|e| is_truthy(e, vars));
            let none_ok = !none_of.iter().any(|e| is_truthy(e, vars));
            all_ok && any_ok && none_ok
        }
    }
}

/// A condition expression is a bare variable name (possibly negated with
/// a leading `!`). Missing variables are false.
fn is_truthy(expr: &str, vars: &Map<String, Value>) -> bool {
    let (negate, name) = match expr.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, expr.trim()),
    };
    let value = vars.get(name);
    let truthy = match value {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    };
    if negate {
        !truthy
    } else {
        truthy
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Recursive merge where mixin (`incoming`) wins on scalar/overlapping
/// keys and maps merge key-by-key.
fn deep_merge(base: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(base_obj)), Value::Object(incoming_obj)) => {
                deep_merge(base_obj, incoming_obj);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Pure string substitution of `{{var}}` tokens. Non-scalar values are
/// JSON-encoded; an undefined variable is left as-is.
fn substitute(template: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                match vars.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after_open;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn substitute_value(value: &Value, vars: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            let rendered = substitute(s, vars);
            // If the whole string was a single `{{var}}` token, prefer the
            // variable's native type instead of its string rendering.
            let trimmed = s.trim();
            if let Some(name) = trimmed.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
                if let Some(v) = vars.get(name.trim()) {
                    return v.clone();
                }
            }
            Value::String(rendered)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, vars)).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), substitute_value(v, vars));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
