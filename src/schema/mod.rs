//! Schema model: entities, relationships, unions, interfaces and the
//! authorization rules attached to them.

pub mod config;
mod errors;
mod model;

pub use config::SchemaDefinition;
pub use errors::SchemaError;
pub use model::{
    AuthorizationRule, CustomArgument, CustomField, CustomReturn, EntityDescriptor, FieldKind,
    FieldRef, InterfaceDescriptor, Operation, QueryDirection, QueryOptions,
    RelationshipDescriptor, RelationshipDirection, RelationshipField, RuleShape, ScalarField,
    Schema, Target, UnionDescriptor,
};
