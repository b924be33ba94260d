//! Configuration form for a calculation plugin.
//!
//! The JSON schema has a `default_ttl` number, one boolean per ungrouped
//! calculation at the top level, and one object per group holding the
//! group's calculation flags and extra properties. The UI schema only fixes
//! field order.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::calculation::Calculation;

/// JSON schema and UI schema for the plugin configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSchema {
    pub schema: Value,
    pub ui_schema: Value,
}

impl PluginSchema {
    pub fn build(title: &str, calculations: &[Arc<dyn Calculation>]) -> Self {
        let mut properties = Map::new();
        properties.insert(
            "default_ttl".to_string(),
            json!({
                "title": "Default TTL",
                "type": "number",
                "description": "The plugin won't send out duplicate calculation values for this time period (s) (0=no ttl check)",
                "default": 0
            }),
        );
        let mut order = vec![Value::from("default_ttl")];
        let mut ui_schema = Map::new();

        for calc in calculations.iter().filter(|c| c.group().is_none()) {
            order.push(Value::from(calc.option_key()));
            properties.insert(calc.option_key().to_string(), flag(calc.as_ref()));
            if let Some(extra) = calc.properties() {
                properties.extend(extra);
            }
        }

        for group in group_names(calculations) {
            let mut group_order = Vec::new();
            let mut group_properties = Map::new();

            for calc in calculations.iter().filter(|c| c.group() == Some(group)) {
                group_order.push(Value::from(calc.option_key()));
                group_properties.insert(calc.option_key().to_string(), flag(calc.as_ref()));
                if let Some(extra) = calc.properties() {
                    group_order.extend(extra.keys().map(|k| Value::from(k.as_str())));
                    group_properties.extend(extra);
                }
            }

            order.push(Value::from(group));
            ui_schema.insert(group.to_string(), json!({ "ui:order": group_order }));
            properties.insert(
                group.to_string(),
                json!({
                    "title": capitalize(group),
                    "type": "object",
                    "properties": group_properties
                }),
            );
        }

        ui_schema.insert("ui:order".to_string(), Value::Array(order));

        Self {
            schema: json!({
                "title": title,
                "type": "object",
                "properties": properties
            }),
            ui_schema: Value::Object(ui_schema),
        }
    }
}

fn flag(calc: &dyn Calculation) -> Value {
    json!({
        "title": calc.title(),
        "type": "boolean",
        "default": false
    })
}

/// Distinct group names in first-seen order.
fn group_names(calculations: &[Arc<dyn Calculation>]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for group in calculations.iter().filter_map(|c| c.group()) {
        if !names.contains(&group) {
            names.push(group);
        }
    }
    names
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
