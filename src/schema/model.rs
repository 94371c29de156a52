//! Immutable schema model consumed by the compiler.
//!
//! A [`Schema`] is built once (usually from a YAML definition, see
//! [`super::config`]) and then shared read-only by every compilation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Id,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    Enum,
    DateTime,
    LocalDateTime,
    Date,
    Time,
    LocalTime,
    Duration,
    Point,
    CartesianPoint,
}

impl FieldKind {
    /// Parse a declared type name (`ID`, `String`, `DateTime`, ...)
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ID" => FieldKind::Id,
            "String" => FieldKind::String,
            "Int" => FieldKind::Int,
            "BigInt" => FieldKind::BigInt,
            "Float" => FieldKind::Float,
            "Boolean" => FieldKind::Boolean,
            "Enum" => FieldKind::Enum,
            "DateTime" => FieldKind::DateTime,
            "LocalDateTime" => FieldKind::LocalDateTime,
            "Date" => FieldKind::Date,
            "Time" => FieldKind::Time,
            "LocalTime" => FieldKind::LocalTime,
            "Duration" => FieldKind::Duration,
            "Point" => FieldKind::Point,
            "CartesianPoint" => FieldKind::CartesianPoint,
            _ => return None,
        })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Int | FieldKind::BigInt | FieldKind::Float)
    }

    pub fn is_string_like(&self) -> bool {
        matches!(self, FieldKind::Id | FieldKind::String | FieldKind::Enum)
    }

    pub fn is_temporal(&self) -> bool {
        self.temporal_constructor().is_some()
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, FieldKind::Point | FieldKind::CartesianPoint)
    }

    /// Fields that support `<`, `<=`, `>`, `>=`
    pub fn is_ordered(&self) -> bool {
        self.is_numeric() || self.is_temporal() || self.is_string_like()
    }

    /// Cypher function that turns a parameter into a value of this kind
    pub fn temporal_constructor(&self) -> Option<&'static str> {
        match self {
            FieldKind::DateTime => Some("datetime"),
            FieldKind::LocalDateTime => Some("localdatetime"),
            FieldKind::Date => Some("date"),
            FieldKind::Time => Some("time"),
            FieldKind::LocalTime => Some("localtime"),
            FieldKind::Duration => Some("duration"),
            _ => None,
        }
    }
}

/// Operations an authorization rule can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

/// Predicate shape of an `allow`/`where`/`bind` rule: either a field map or `"*"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleShape(pub Value);

impl RuleShape {
    pub fn is_wildcard(&self) -> bool {
        self.0.as_str() == Some("*")
    }

    pub fn as_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.as_object()
    }
}

/// Declarative authorization rule attached to an entity or field.
///
/// All present parts of one rule must hold together. `AND`/`OR` nest further
/// rules with the same grammar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthorizationRule {
    /// Operations this rule applies to. Absent means every operation.
    #[serde(default)]
    pub operations: Option<Vec<Operation>>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_authenticated: Option<bool>,
    #[serde(default)]
    pub allow: Option<RuleShape>,
    #[serde(default, rename = "where")]
    pub where_: Option<RuleShape>,
    #[serde(default)]
    pub bind: Option<RuleShape>,
    #[serde(default, rename = "AND")]
    pub and: Vec<AuthorizationRule>,
    #[serde(default, rename = "OR")]
    pub or: Vec<AuthorizationRule>,
}

impl AuthorizationRule {
    pub fn applies_to(&self, operation: Operation) -> bool {
        self.operations
            .as_ref()
            .map_or(true, |ops| ops.contains(&operation))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub name: String,
    /// Graph property name when it differs from `name`
    pub alias: Option<String>,
    pub kind: FieldKind,
    pub list: bool,
    pub auth: Vec<AuthorizationRule>,
}

impl ScalarField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        ScalarField {
            name: name.into(),
            alias: None,
            kind,
            list: false,
            auth: Vec::new(),
        }
    }

    /// Property key in the graph
    pub fn db_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Declared direction of a relationship, seen from the owning entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipDirection {
    In,
    Out,
}

/// Whether callers may (or must) traverse a relationship without direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryDirection {
    #[default]
    DefaultDirected,
    DefaultUndirected,
    DirectedOnly,
    UndirectedOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipField {
    pub name: String,
    pub rel_type: String,
    /// Entity, union or interface name
    pub target: String,
    pub direction: RelationshipDirection,
    pub list: bool,
    pub query_direction: QueryDirection,
    /// Name of the relationship-properties type, if the edge carries properties
    pub properties: Option<String>,
}

/// Relationship-properties type: the fields stored on the edge itself
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub fields: Vec<ScalarField>,
}

impl RelationshipDescriptor {
    pub fn field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomArgument {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CustomReturn {
    Scalar(FieldKind),
    /// Entity, union or interface name
    Target(String),
}

/// Field computed by a user-supplied Cypher statement
#[derive(Debug, Clone, PartialEq)]
pub struct CustomField {
    pub name: String,
    pub statement: String,
    pub arguments: Vec<CustomArgument>,
    pub returns: CustomReturn,
    pub list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub default_limit: Option<u32>,
    pub max_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: String,
    /// Node labels; the first one is the entity's main label
    pub labels: Vec<String>,
    pub fields: Vec<ScalarField>,
    pub relationships: Vec<RelationshipField>,
    pub custom_fields: Vec<CustomField>,
    pub auth: Vec<AuthorizationRule>,
    pub query_options: QueryOptions,
    pub implements: Vec<String>,
}

/// Resolved kind of a named field on an entity
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Scalar(&'a ScalarField),
    Relationship(&'a RelationshipField),
    Custom(&'a CustomField),
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        EntityDescriptor {
            labels: vec![name.clone()],
            name,
            fields: Vec::new(),
            relationships: Vec::new(),
            custom_fields: Vec::new(),
            auth: Vec::new(),
            query_options: QueryOptions::default(),
            implements: Vec::new(),
        }
    }

    pub fn main_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or(&self.name)
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn custom(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|c| c.name == name)
    }

    pub fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        self.scalar(name)
            .map(FieldRef::Scalar)
            .or_else(|| self.relationship(name).map(FieldRef::Relationship))
            .or_else(|| self.custom(name).map(FieldRef::Custom))
    }

    /// Rules that apply to `operation`, in declared order
    pub fn rules_for(&self, operation: Operation) -> Vec<&AuthorizationRule> {
        self.auth.iter().filter(|r| r.applies_to(operation)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDescriptor {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub fields: Vec<ScalarField>,
}

impl InterfaceDescriptor {
    pub fn scalar(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// What a relationship or custom field points at
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Entity(&'a EntityDescriptor),
    Union(&'a UnionDescriptor),
    Interface(&'a InterfaceDescriptor),
}

impl<'a> Target<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Target::Entity(e) => &e.name,
            Target::Union(u) => &u.name,
            Target::Interface(i) => &i.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entities: HashMap<String, EntityDescriptor>,
    unions: HashMap<String, UnionDescriptor>,
    interfaces: HashMap<String, InterfaceDescriptor>,
    relationship_properties: HashMap<String, RelationshipDescriptor>,
}

impl Schema {
    pub fn new(
        entities: Vec<EntityDescriptor>,
        unions: Vec<UnionDescriptor>,
        interfaces: Vec<InterfaceDescriptor>,
        relationship_properties: Vec<RelationshipDescriptor>,
    ) -> Self {
        Schema {
            entities: entities.into_iter().map(|e| (e.name.clone(), e)).collect(),
            unions: unions.into_iter().map(|u| (u.name.clone(), u)).collect(),
            interfaces: interfaces.into_iter().map(|i| (i.name.clone(), i)).collect(),
            relationship_properties: relationship_properties
                .into_iter()
                .map(|r| (r.name.clone(), r))
                .collect(),
        }
    }

    pub fn entity(&self, name: &str) -> Result<&EntityDescriptor, SchemaError> {
        self.entities.get(name).ok_or_else(|| SchemaError::UnknownEntity {
            name: name.to_string(),
        })
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.entities.contains_key(name)
            || self.unions.contains_key(name)
            || self.interfaces.contains_key(name)
    }

    pub fn target(&self, name: &str) -> Result<Target<'_>, SchemaError> {
        if let Some(entity) = self.entities.get(name) {
            return Ok(Target::Entity(entity));
        }
        if let Some(union) = self.unions.get(name) {
            return Ok(Target::Union(union));
        }
        if let Some(interface) = self.interfaces.get(name) {
            return Ok(Target::Interface(interface));
        }
        Err(SchemaError::UnknownEntity {
            name: name.to_string(),
        })
    }

    pub fn relationship_properties(&self, name: &str) -> Result<&RelationshipDescriptor, SchemaError> {
        self.relationship_properties
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Union members in declared order
    pub fn union_members(&self, union: &UnionDescriptor) -> Result<Vec<&EntityDescriptor>, SchemaError> {
        union.members.iter().map(|m| self.entity(m)).collect()
    }

    /// Entities implementing an interface, sorted by name
    pub fn implementations(&self, interface: &str) -> Vec<&EntityDescriptor> {
        let mut found: Vec<&EntityDescriptor> = self
            .entities
            .values()
            .filter(|e| e.implements.iter().any(|i| i == interface))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Concrete entities behind a target, in a stable order
    pub fn concrete_entities<'a>(&'a self, target: &Target<'a>) -> Result<Vec<&'a EntityDescriptor>, SchemaError> {
        match target {
            Target::Entity(e) => Ok(vec![*e]),
            Target::Union(u) => self.union_members(u),
            Target::Interface(i) => Ok(self.implementations(&i.name)),
        }
    }
}
