use super::environment::Variable;

/// Arrow direction of a relationship pattern, read left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    /// `(a)<-[]-(b)`
    Left,
    /// `(a)-[]->(b)`
    Right,
    /// `(a)-[]-(b)`
    Undirected,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<Variable>,
    pub labels: Vec<String>,
}

impl NodePattern {
    pub fn new(variable: &Variable) -> Self {
        NodePattern {
            variable: Some(variable.clone()),
            labels: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        NodePattern::default()
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<Variable>,
    pub types: Vec<String>,
    pub direction: PatternDirection,
}

impl RelationshipPattern {
    pub fn new(rel_type: impl Into<String>, direction: PatternDirection) -> Self {
        RelationshipPattern {
            variable: None,
            types: vec![rel_type.into()],
            direction,
        }
    }

    pub fn variable(mut self, variable: &Variable) -> Self {
        self.variable = Some(variable.clone());
        self
    }
}

/// A linear path pattern: a start node followed by relationship/node hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Pattern {
            start,
            hops: Vec::new(),
        }
    }

    pub fn related(mut self, relationship: RelationshipPattern, node: NodePattern) -> Self {
        self.hops.push((relationship, node));
        self
    }

    /// Last node of the path, which is where hop patterns get extended from
    pub fn end(&self) -> &NodePattern {
        self.hops.last().map(|(_, n)| n).unwrap_or(&self.start)
    }
}
