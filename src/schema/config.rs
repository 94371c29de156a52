//! YAML schema definitions.
//!
//! # Example
//!
//! ```yaml
//! entities:
//!   - name: Movie
//!     fields:
//!       - { name: id, type: ID }
//!       - { name: title, type: String }
//!     relationships:
//!       - { name: actors, type: ACTED_IN, target: Person, direction: IN, list: true, properties: ActedIn }
//!     query_options: { default_limit: 10, max_limit: 100 }
//!   - name: Person
//!     fields:
//!       - { name: name, type: String }
//! relationship_properties:
//!   - name: ActedIn
//!     fields:
//!       - { name: roles, type: String, list: true }
//! ```
//!
//! Definitions are plain serde structs; [`SchemaDefinition::into_schema`]
//! validates them and produces the immutable [`Schema`].

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::SchemaError;
use super::model::{
    AuthorizationRule, CustomArgument, CustomField, CustomReturn, EntityDescriptor, FieldKind,
    InterfaceDescriptor, QueryDirection, QueryOptions, RelationshipDescriptor,
    RelationshipDirection, RelationshipField, RuleShape, ScalarField, Schema, UnionDescriptor,
};

/// Bindings every custom statement receives; arguments may not reuse them
const RESERVED_ARGUMENTS: [&str; 2] = ["this", "auth"];

/// Top-level schema definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub unions: Vec<UnionDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub relationship_properties: Vec<PropertiesDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Node labels, main label first. Defaults to `[name]`.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipFieldDefinition>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDefinition>,
    #[serde(default)]
    pub auth: Vec<AuthorizationRule>,
    #[serde(default)]
    pub query_options: Option<QueryOptionsDefinition>,
    #[serde(default)]
    pub implements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub auth: Vec<AuthorizationRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipFieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub target: String,
    /// `IN` or `OUT`
    pub direction: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub query_direction: Option<String>,
    #[serde(default)]
    pub properties: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub name: String,
    pub statement: String,
    /// Scalar type name or entity/union/interface name
    pub returns: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub arguments: Vec<CustomArgumentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomArgumentDefinition {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOptionsDefinition {
    #[serde(default)]
    pub default_limit: Option<u32>,
    #[serde(default)]
    pub max_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertiesDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl SchemaDefinition {
    /// Load a schema definition from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path).map_err(|e| SchemaError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a schema definition from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| SchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Validate and convert into the immutable schema model
    pub fn into_schema(self) -> Result<Schema, SchemaError> {
        self.check_unique_names()?;

        let type_names: HashSet<&str> = self
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.unions.iter().map(|u| u.name.as_str()))
            .chain(self.interfaces.iter().map(|i| i.name.as_str()))
            .collect();
        let interface_names: HashSet<&str> = self.interfaces.iter().map(|i| i.name.as_str()).collect();
        let entity_names: HashSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        let properties_names: HashSet<&str> = self
            .relationship_properties
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        let mut entities = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            entities.push(convert_entity(
                entity,
                &type_names,
                &interface_names,
                &properties_names,
            )?);
        }

        let mut unions = Vec::with_capacity(self.unions.len());
        for union in &self.unions {
            if union.members.is_empty() {
                return Err(SchemaError::InvalidConfig {
                    message: format!("Union {} has no members", union.name),
                });
            }
            for member in &union.members {
                if !entity_names.contains(member.as_str()) {
                    return Err(SchemaError::UnknownTarget {
                        entity: union.name.clone(),
                        field: "members".to_string(),
                        target: member.clone(),
                    });
                }
            }
            unions.push(UnionDescriptor {
                name: union.name.clone(),
                members: union.members.clone(),
            });
        }

        let mut interfaces = Vec::with_capacity(self.interfaces.len());
        for interface in &self.interfaces {
            interfaces.push(InterfaceDescriptor {
                name: interface.name.clone(),
                fields: convert_fields(&interface.name, &interface.fields)?,
            });
        }

        let mut relationship_properties = Vec::with_capacity(self.relationship_properties.len());
        for properties in &self.relationship_properties {
            relationship_properties.push(RelationshipDescriptor {
                name: properties.name.clone(),
                fields: convert_fields(&properties.name, &properties.fields)?,
            });
        }

        log::debug!(
            "Loaded schema: {} entities, {} unions, {} interfaces",
            entities.len(),
            unions.len(),
            interfaces.len()
        );

        Ok(Schema::new(entities, unions, interfaces, relationship_properties))
    }

    fn check_unique_names(&self) -> Result<(), SchemaError> {
        if self.entities.is_empty() {
            return Err(SchemaError::InvalidConfig {
                message: "Schema must contain at least one entity definition".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let names = self
            .entities
            .iter()
            .map(|e| &e.name)
            .chain(self.unions.iter().map(|u| &u.name))
            .chain(self.interfaces.iter().map(|i| &i.name))
            .chain(self.relationship_properties.iter().map(|p| &p.name));
        for name in names {
            if !seen.insert(name) {
                return Err(SchemaError::InvalidConfig {
                    message: format!("Duplicate type name: {}", name),
                });
            }
        }
        Ok(())
    }
}

impl Schema {
    /// Parse and validate a YAML schema definition
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        SchemaDefinition::from_yaml_str(yaml)?.into_schema()
    }

    /// Load and validate a YAML schema definition file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        SchemaDefinition::from_yaml_file(path)?.into_schema()
    }
}

fn convert_entity(
    entity: &EntityDefinition,
    type_names: &HashSet<&str>,
    interface_names: &HashSet<&str>,
    properties_names: &HashSet<&str>,
) -> Result<EntityDescriptor, SchemaError> {
    let mut descriptor = EntityDescriptor::new(entity.name.clone());
    if !entity.labels.is_empty() {
        descriptor.labels = entity.labels.clone();
    }
    descriptor.fields = convert_fields(&entity.name, &entity.fields)?;

    let mut field_names = HashSet::new();
    let all_names = entity
        .fields
        .iter()
        .map(|f| &f.name)
        .chain(entity.relationships.iter().map(|r| &r.name))
        .chain(entity.custom_fields.iter().map(|c| &c.name));
    for name in all_names {
        if !field_names.insert(name) {
            return Err(SchemaError::config_error_with_context(
                format!("Duplicate field name: {}", name),
                format!("In entity {}", entity.name),
            ));
        }
    }

    for rel in &entity.relationships {
        if !type_names.contains(rel.target.as_str()) {
            return Err(SchemaError::UnknownTarget {
                entity: entity.name.clone(),
                field: rel.name.clone(),
                target: rel.target.clone(),
            });
        }
        if let Some(properties) = &rel.properties {
            if !properties_names.contains(properties.as_str()) {
                return Err(SchemaError::UnknownTarget {
                    entity: entity.name.clone(),
                    field: rel.name.clone(),
                    target: properties.clone(),
                });
            }
        }
        descriptor.relationships.push(RelationshipField {
            name: rel.name.clone(),
            rel_type: rel.rel_type.clone(),
            target: rel.target.clone(),
            direction: parse_direction(&entity.name, rel)?,
            list: rel.list,
            query_direction: parse_query_direction(&entity.name, rel)?,
            properties: rel.properties.clone(),
        });
    }

    for custom in &entity.custom_fields {
        descriptor
            .custom_fields
            .push(convert_custom_field(&entity.name, custom, type_names)?);
    }

    for rule in &entity.auth {
        validate_rule(&entity.name, rule)?;
    }
    descriptor.auth = entity.auth.clone();

    if let Some(options) = &entity.query_options {
        if let (Some(default), Some(max)) = (options.default_limit, options.max_limit) {
            if default > max {
                return Err(SchemaError::config_error_with_context(
                    "default_limit must not exceed max_limit",
                    format!("In query_options of {}", entity.name),
                ));
            }
        }
        if options.default_limit == Some(0) || options.max_limit == Some(0) {
            return Err(SchemaError::config_error_with_context(
                "query limits must be at least 1",
                format!("In query_options of {}", entity.name),
            ));
        }
        descriptor.query_options = QueryOptions {
            default_limit: options.default_limit,
            max_limit: options.max_limit,
        };
    }

    for interface in &entity.implements {
        if !interface_names.contains(interface.as_str()) {
            return Err(SchemaError::UnknownTarget {
                entity: entity.name.clone(),
                field: "implements".to_string(),
                target: interface.clone(),
            });
        }
    }
    descriptor.implements = entity.implements.clone();

    Ok(descriptor)
}

fn convert_fields(owner: &str, fields: &[FieldDefinition]) -> Result<Vec<ScalarField>, SchemaError> {
    let mut converted = Vec::with_capacity(fields.len());
    for field in fields {
        let kind = FieldKind::parse(&field.type_name).ok_or_else(|| SchemaError::InvalidFieldType {
            entity: owner.to_string(),
            field: field.name.clone(),
            value: field.type_name.clone(),
        })?;
        for rule in &field.auth {
            validate_rule(&format!("{}.{}", owner, field.name), rule)?;
        }
        converted.push(ScalarField {
            name: field.name.clone(),
            alias: field.alias.clone(),
            kind,
            list: field.list,
            auth: field.auth.clone(),
        });
    }
    Ok(converted)
}

fn parse_direction(
    entity: &str,
    rel: &RelationshipFieldDefinition,
) -> Result<RelationshipDirection, SchemaError> {
    match rel.direction.as_str() {
        "IN" => Ok(RelationshipDirection::In),
        "OUT" => Ok(RelationshipDirection::Out),
        other => Err(SchemaError::InvalidDirection {
            entity: entity.to_string(),
            field: rel.name.clone(),
            value: other.to_string(),
        }),
    }
}

fn parse_query_direction(
    entity: &str,
    rel: &RelationshipFieldDefinition,
) -> Result<QueryDirection, SchemaError> {
    match rel.query_direction.as_deref() {
        None | Some("DEFAULT_DIRECTED") => Ok(QueryDirection::DefaultDirected),
        Some("DEFAULT_UNDIRECTED") => Ok(QueryDirection::DefaultUndirected),
        Some("DIRECTED_ONLY") => Ok(QueryDirection::DirectedOnly),
        Some("UNDIRECTED_ONLY") => Ok(QueryDirection::UndirectedOnly),
        Some(other) => Err(SchemaError::InvalidQueryDirection {
            entity: entity.to_string(),
            field: rel.name.clone(),
            value: other.to_string(),
        }),
    }
}

fn convert_custom_field(
    entity: &str,
    custom: &CustomFieldDefinition,
    type_names: &HashSet<&str>,
) -> Result<CustomField, SchemaError> {
    let mut seen = HashSet::new();
    let mut arguments = Vec::with_capacity(custom.arguments.len());
    for argument in &custom.arguments {
        let invalid = |reason: &str| SchemaError::InvalidCustomArgument {
            entity: entity.to_string(),
            field: custom.name.clone(),
            argument: argument.name.clone(),
            reason: reason.to_string(),
        };
        if argument.name.is_empty() {
            return Err(invalid("argument name cannot be empty"));
        }
        if RESERVED_ARGUMENTS.contains(&argument.name.as_str()) {
            return Err(invalid("name is reserved for the statement bindings"));
        }
        if !seen.insert(argument.name.as_str()) {
            return Err(invalid("declared more than once"));
        }
        arguments.push(CustomArgument {
            name: argument.name.clone(),
            default: argument.default.clone(),
        });
    }

    let returns = if type_names.contains(custom.returns.as_str()) {
        CustomReturn::Target(custom.returns.clone())
    } else if let Some(kind) = FieldKind::parse(&custom.returns) {
        CustomReturn::Scalar(kind)
    } else {
        return Err(SchemaError::UnknownTarget {
            entity: entity.to_string(),
            field: custom.name.clone(),
            target: custom.returns.clone(),
        });
    };

    Ok(CustomField {
        name: custom.name.clone(),
        statement: custom.statement.clone(),
        arguments,
        returns,
        list: custom.list,
    })
}

fn validate_rule(owner: &str, rule: &AuthorizationRule) -> Result<(), SchemaError> {
    for shape in [&rule.allow, &rule.where_, &rule.bind].into_iter().flatten() {
        validate_shape(owner, shape)?;
    }
    for nested in rule.and.iter().chain(rule.or.iter()) {
        validate_rule(owner, nested)?;
    }
    Ok(())
}

fn validate_shape(owner: &str, shape: &RuleShape) -> Result<(), SchemaError> {
    if shape.is_wildcard() || shape.as_object().is_some() {
        Ok(())
    } else {
        Err(SchemaError::InvalidAuthRule {
            owner: owner.to_string(),
            reason: format!("rule predicate must be an object or \"*\", got {}", shape.0),
        })
    }
}
