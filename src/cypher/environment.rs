//! Identifier allocation for one compiled query.
//!
//! Compiler stages never invent textual names. They ask the [`Environment`] for
//! a [`Variable`] or [`Param`], which is only an id plus a naming hint. Final
//! names (`this0`, `var3`, `$param1`) are assigned when the clause tree is
//! rendered, in order of first appearance, so two sibling subtrees can never
//! alias each other and the same input always renders the same text.

use super::value::ParamValue;

/// How a variable is named at render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Fixed name, used as-is (`this`)
    Named(String),
    /// Node or relationship variable, rendered `this<n>`
    Graph,
    /// Any other value, rendered `var<n>`
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    id: usize,
    kind: VariableKind,
}

impl Variable {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    id: usize,
    name: Option<String>,
    value: ParamValue,
}

impl Param {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Fixed placeholder name, if this parameter has one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }
}

/// Monotonic id source. One per compilation, never shared.
#[derive(Debug, Default)]
pub struct Environment {
    next_id: usize,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn named(&mut self, name: &str) -> Variable {
        Variable {
            id: self.next(),
            kind: VariableKind::Named(name.to_string()),
        }
    }

    pub fn graph_variable(&mut self) -> Variable {
        Variable {
            id: self.next(),
            kind: VariableKind::Graph,
        }
    }

    pub fn value_variable(&mut self) -> Variable {
        Variable {
            id: self.next(),
            kind: VariableKind::Value,
        }
    }

    pub fn param(&mut self, value: ParamValue) -> Param {
        Param {
            id: self.next(),
            name: None,
            value,
        }
    }

    pub fn named_param(&mut self, name: &str, value: ParamValue) -> Param {
        Param {
            id: self.next(),
            name: Some(name.to_string()),
            value,
        }
    }
}
