//! Per-request compilation state.
//!
//! A [`CompileContext`] is created by an orchestrator for one request and
//! dropped when the query is built. It owns the identifier [`Environment`], so
//! nothing is shared between concurrent compilations; the schema and config are
//! only borrowed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::TranslateError;
use crate::config::CompilerConfig;
use crate::cypher::{Environment, Expr, Param, ParamValue, Variable};
use crate::schema::Schema;

/// Caller identity as seen by authorization rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Decoded token claims, reachable from rules as `$jwt.<path>`
    #[serde(default)]
    pub jwt: Map<String, Value>,
    /// Request context, reachable from rules as `$context.<path>`
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthContext {
            is_authenticated: true,
            roles: roles.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.jwt.insert(key.into(), value);
        self
    }

    /// Resolve a `$jwt.a.b` or `$context.a.b` reference. Returns `None` when
    /// `value` is not a reference at all; a missing path resolves to `null`.
    pub fn resolve_reference(&self, value: &str) -> Option<Value> {
        let (root, path) = if let Some(path) = value.strip_prefix("$jwt.") {
            (&self.jwt, path)
        } else if let Some(path) = value.strip_prefix("$context.") {
            (&self.context, path)
        } else {
            return None;
        };
        let mut segments = path.split('.');
        let first = segments.next().and_then(|s| root.get(s));
        let resolved = segments.fold(first, |current, segment| {
            current.and_then(|v| v.get(segment))
        });
        Some(resolved.cloned().unwrap_or(Value::Null))
    }

    fn as_param_value(&self) -> ParamValue {
        ParamValue::map([
            ("isAuthenticated", ParamValue::Boolean(self.is_authenticated)),
            (
                "roles",
                ParamValue::List(self.roles.iter().map(|r| ParamValue::from(r.as_str())).collect()),
            ),
            ("jwt", ParamValue::from(&Value::Object(self.jwt.clone()))),
        ])
    }
}

pub struct CompileContext<'a> {
    schema: &'a Schema,
    config: &'a CompilerConfig,
    auth: &'a AuthContext,
    env: Environment,
    auth_param: Option<Param>,
    depth: u32,
}

impl<'a> CompileContext<'a> {
    pub fn new(schema: &'a Schema, config: &'a CompilerConfig, auth: &'a AuthContext) -> Self {
        CompileContext {
            schema,
            config,
            auth,
            env: Environment::new(),
            auth_param: None,
            depth: 0,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    pub fn auth(&self) -> &'a AuthContext {
        self.auth
    }

    pub fn named(&mut self, name: &str) -> Variable {
        self.env.named(name)
    }

    pub fn graph_variable(&mut self) -> Variable {
        self.env.graph_variable()
    }

    pub fn value_variable(&mut self) -> Variable {
        self.env.value_variable()
    }

    pub fn param(&mut self, value: impl Into<ParamValue>) -> Expr {
        Expr::param(self.env.param(value.into()))
    }

    /// `$auth`, shared by every rule in the query
    pub fn auth_param(&mut self) -> Expr {
        if self.auth_param.is_none() {
            let value = self.auth.as_param_value();
            self.auth_param = Some(self.env.named_param("auth", value));
        }
        match &self.auth_param {
            Some(param) => Expr::param(param.clone()),
            None => Expr::null(),
        }
    }

    /// Run `f` one selection level deeper, failing once the configured depth is exceeded
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TranslateError>,
    ) -> Result<T, TranslateError> {
        let max = self.config.max_selection_depth;
        if self.depth >= max {
            return Err(TranslateError::DepthExceeded { max });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
