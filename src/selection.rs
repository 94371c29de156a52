//! Field-selection tree handed to the compiler.
//!
//! Child selections are keyed by the concrete type they apply to, so one node
//! can carry different sub-selections for each member of a union or interface.
//! Aliases and variables are already resolved by whoever built the tree.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionNode {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default, rename = "fields")]
    pub fields_by_type: BTreeMap<String, Vec<SelectionNode>>,
}

impl SelectionNode {
    pub fn new(name: impl Into<String>) -> Self {
        SelectionNode {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    /// Add sub-selections that apply when the value has type `type_name`
    pub fn fields(mut self, type_name: impl Into<String>, fields: Vec<SelectionNode>) -> Self {
        self.fields_by_type
            .entry(type_name.into())
            .or_default()
            .extend(fields);
        self
    }

    /// Key this field takes in the result map
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn get_argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }

    pub fn fields_for(&self, type_name: &str) -> &[SelectionNode] {
        self.fields_by_type
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sub-selections for the first type, extended with those of the following
    /// types. The first occurrence of a response key wins.
    pub fn merged_fields(&self, type_names: &[&str]) -> Vec<&SelectionNode> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for type_name in type_names {
            for field in self.fields_for(type_name) {
                if seen.insert(field.response_key()) {
                    merged.push(field);
                }
            }
        }
        merged
    }

    /// Sub-selections of every type, for objects that have only one shape
    /// (connections, edges, aggregation results)
    pub fn children(&self) -> Vec<&SelectionNode> {
        let type_names: Vec<&str> = self.fields_by_type.keys().map(String::as_str).collect();
        self.merged_fields(&type_names)
    }
}
