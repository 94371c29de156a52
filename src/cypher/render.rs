//! Cypher text generation for the query AST.
//!
//! [`RenderEnv`] is the naming pass: the first time a variable or parameter is
//! rendered it gets its final name, and parameter values are collected into the
//! output map at the same moment. Only compiler constants are ever written into
//! the text; request values reach the output exclusively as `$placeholders`.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;

use super::clause::{Call, CallImport, Clause, Match, OrderItem, Projection, SortDirection};
use super::environment::{Param, Variable, VariableKind};
use super::errors::CypherBuildError;
use super::expr::{Expr, Literal, MapEntry};
use super::pattern::{NodePattern, Pattern, PatternDirection, RelationshipPattern};
use super::value::ParamValue;

lazy_static! {
    static ref PLAIN_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

const INDENT: &str = "    ";

/// Quote a label, relationship type or property key unless it is a plain identifier.
pub fn escape_name(name: &str) -> String {
    if PLAIN_NAME.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Double-quoted string literal with backslash escapes.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", INDENT, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
pub struct RenderEnv {
    variable_names: HashMap<usize, String>,
    param_names: HashMap<usize, String>,
    parameters: BTreeMap<String, ParamValue>,
    next_variable: usize,
    next_param: usize,
}

impl RenderEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable_name(&mut self, variable: &Variable) -> String {
        if let Some(name) = self.variable_names.get(&variable.id()) {
            return name.clone();
        }
        let name = match variable.kind() {
            VariableKind::Named(name) => name.clone(),
            VariableKind::Graph => {
                let name = format!("this{}", self.next_variable);
                self.next_variable += 1;
                name
            }
            VariableKind::Value => {
                let name = format!("var{}", self.next_variable);
                self.next_variable += 1;
                name
            }
        };
        self.variable_names.insert(variable.id(), name.clone());
        name
    }

    pub fn param_placeholder(&mut self, param: &Param) -> String {
        if let Some(name) = self.param_names.get(&param.id()) {
            return format!("${}", name);
        }
        let name = match param.name() {
            Some(name) => name.to_string(),
            None => {
                let name = format!("param{}", self.next_param);
                self.next_param += 1;
                name
            }
        };
        self.parameters.insert(name.clone(), param.value().clone());
        self.param_names.insert(param.id(), name.clone());
        format!("${}", name)
    }

    pub fn into_parameters(self) -> BTreeMap<String, ParamValue> {
        self.parameters
    }
}

/// Convert an AST node to Cypher text
pub trait ToCypher {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError>;
}

fn join_rendered<T: ToCypher>(
    items: &[T],
    separator: &str,
    env: &mut RenderEnv,
) -> Result<String, CypherBuildError> {
    let rendered = items
        .iter()
        .map(|item| item.to_cypher(env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(separator))
}

/// Render a predicate in a position that is already delimited (WHERE, function
/// argument), so a top-level AND/OR doesn't need its own parentheses.
pub fn render_predicate(expr: &Expr, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
    match expr {
        Expr::And(items) => join_rendered(items, " AND ", env),
        Expr::Or(items) => join_rendered(items, " OR ", env),
        other => other.to_cypher(env),
    }
}

fn render_operand(expr: &Expr, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
    let rendered = expr.to_cypher(env)?;
    if matches!(expr, Expr::Binary { .. }) {
        Ok(format!("({})", rendered))
    } else {
        Ok(rendered)
    }
}

impl ToCypher for Literal {
    fn to_cypher(&self, _env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        Ok(match self {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::String(s) => escape_string(s),
        })
    }
}

impl ToCypher for Expr {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        match self {
            Expr::Variable(v) => Ok(env.variable_name(v)),
            Expr::Param(p) => Ok(env.param_placeholder(p)),
            Expr::Literal(lit) => lit.to_cypher(env),
            Expr::Property { subject, key } => {
                let subject_sql = render_operand(subject, env)?;
                Ok(format!("{}.{}", subject_sql, escape_name(key)))
            }
            Expr::Function { name, args } => {
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    rendered.push(render_predicate(arg, env)?);
                }
                Ok(format!("{}({})", name, rendered.join(", ")))
            }
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return Ok("{}".to_string());
                }
                let mut rendered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    rendered.push(format!("{}: {}", escape_name(key), value.to_cypher(env)?));
                }
                Ok(format!("{{ {} }}", rendered.join(", ")))
            }
            Expr::MapProjection { variable, entries } => {
                let name = env.variable_name(variable);
                if entries.is_empty() {
                    return Ok(format!("{} {{}}", name));
                }
                let mut rendered = Vec::with_capacity(entries.len());
                for entry in entries {
                    rendered.push(match entry {
                        MapEntry::Property(key) => format!(".{}", escape_name(key)),
                        MapEntry::Keyed(key, value) => {
                            format!("{}: {}", escape_name(key), value.to_cypher(env)?)
                        }
                    });
                }
                Ok(format!("{} {{ {} }}", name, rendered.join(", ")))
            }
            Expr::List(items) => Ok(format!("[{}]", join_rendered(items, ", ", env)?)),
            Expr::Case {
                branches,
                otherwise,
            } => {
                let mut out = String::from("CASE");
                for (condition, value) in branches {
                    out.push_str(&format!(
                        " WHEN {} THEN {}",
                        render_predicate(condition, env)?,
                        value.to_cypher(env)?
                    ));
                }
                if let Some(otherwise) = otherwise {
                    out.push_str(&format!(" ELSE {}", otherwise.to_cypher(env)?));
                }
                out.push_str(" END");
                Ok(out)
            }
            Expr::ListComprehension {
                variable,
                list,
                filter,
                map,
            } => {
                let mut out = format!("[{} IN {}", env.variable_name(variable), list.to_cypher(env)?);
                if let Some(filter) = filter {
                    out.push_str(&format!(" WHERE {}", render_predicate(filter, env)?));
                }
                if let Some(map) = map {
                    out.push_str(&format!(" | {}", map.to_cypher(env)?));
                }
                out.push(']');
                Ok(out)
            }
            Expr::PatternComprehension {
                pattern,
                filter,
                map,
            } => {
                let mut out = format!("[{}", pattern.to_cypher(env)?);
                if let Some(filter) = filter {
                    out.push_str(&format!(" WHERE {}", render_predicate(filter, env)?));
                }
                out.push_str(&format!(" | {}]", map.to_cypher(env)?));
                Ok(out)
            }
            Expr::Quantified {
                quantifier,
                variable,
                list,
                predicate,
            } => Ok(format!(
                "{}({} IN {} WHERE {})",
                quantifier.function_name(),
                env.variable_name(variable),
                list.to_cypher(env)?,
                render_predicate(predicate, env)?
            )),
            Expr::Reduce {
                accumulator,
                init,
                variable,
                list,
                expr,
            } => Ok(format!(
                "reduce({} = {}, {} IN {} | {})",
                env.variable_name(accumulator),
                init.to_cypher(env)?,
                env.variable_name(variable),
                list.to_cypher(env)?,
                expr.to_cypher(env)?
            )),
            Expr::Exists(body) => Ok(format!("EXISTS {{\n{}\n}}", indent(&body.to_cypher(env)?))),
            Expr::Count(body) => Ok(format!("COUNT {{\n{}\n}}", indent(&body.to_cypher(env)?))),
            Expr::Binary {
                operator,
                left,
                right,
            } => Ok(format!(
                "{} {} {}",
                render_operand(left, env)?,
                operator.symbol(),
                render_operand(right, env)?
            )),
            Expr::Not(inner) => Ok(format!("NOT ({})", render_predicate(inner, env)?)),
            Expr::IsNull(inner) => Ok(format!("{} IS NULL", render_operand(inner, env)?)),
            Expr::IsNotNull(inner) => Ok(format!("{} IS NOT NULL", render_operand(inner, env)?)),
            Expr::HasLabel { variable, label } => Ok(format!(
                "{}:{}",
                env.variable_name(variable),
                escape_name(label)
            )),
            Expr::And(items) => Ok(format!("({})", join_rendered(items, " AND ", env)?)),
            Expr::Or(items) => Ok(format!("({})", join_rendered(items, " OR ", env)?)),
        }
    }
}

impl ToCypher for NodePattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        let mut out = String::from("(");
        if let Some(variable) = &self.variable {
            out.push_str(&env.variable_name(variable));
        }
        for label in &self.labels {
            out.push(':');
            out.push_str(&escape_name(label));
        }
        out.push(')');
        Ok(out)
    }
}

impl ToCypher for RelationshipPattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        let mut inner = String::new();
        if let Some(variable) = &self.variable {
            inner.push_str(&env.variable_name(variable));
        }
        if !self.types.is_empty() {
            let types: Vec<String> = self.types.iter().map(|t| escape_name(t)).collect();
            inner.push(':');
            inner.push_str(&types.join("|"));
        }
        Ok(match self.direction {
            PatternDirection::Left => format!("<-[{}]-", inner),
            PatternDirection::Right => format!("-[{}]->", inner),
            PatternDirection::Undirected => format!("-[{}]-", inner),
        })
    }
}

impl ToCypher for Pattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        let mut out = self.start.to_cypher(env)?;
        for (relationship, node) in &self.hops {
            out.push_str(&relationship.to_cypher(env)?);
            out.push_str(&node.to_cypher(env)?);
        }
        Ok(out)
    }
}

impl ToCypher for OrderItem {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        Ok(format!("{} {}", self.expr.to_cypher(env)?, direction))
    }
}

fn render_projection(
    keyword: &'static str,
    projection: &Projection,
    predicate: Option<&Expr>,
    env: &mut RenderEnv,
) -> Result<String, CypherBuildError> {
    if projection.is_empty() {
        return Err(CypherBuildError::EmptyProjection { clause: keyword });
    }
    let mut items = Vec::new();
    if projection.star {
        items.push("*".to_string());
    }
    for item in &projection.items {
        let expr = item.expr.to_cypher(env)?;
        match &item.alias {
            Some(alias) => {
                let alias = env.variable_name(alias);
                if alias == expr {
                    items.push(expr);
                } else {
                    items.push(format!("{} AS {}", expr, alias));
                }
            }
            None => items.push(expr),
        }
    }
    let distinct = if projection.distinct { "DISTINCT " } else { "" };
    let mut out = format!("{} {}{}", keyword, distinct, items.join(", "));
    if let Some(predicate) = predicate {
        out.push_str(&format!("\nWHERE {}", render_predicate(predicate, env)?));
    }
    if !projection.order_by.is_empty() {
        out.push_str(&format!("\nORDER BY {}", join_rendered(&projection.order_by, ", ", env)?));
    }
    if let Some(skip) = &projection.skip {
        out.push_str(&format!("\nSKIP {}", skip.to_cypher(env)?));
    }
    if let Some(limit) = &projection.limit {
        out.push_str(&format!("\nLIMIT {}", limit.to_cypher(env)?));
    }
    Ok(out)
}

impl ToCypher for Match {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        let keyword = if self.optional { "OPTIONAL MATCH" } else { "MATCH" };
        let mut out = format!("{} {}", keyword, self.pattern.to_cypher(env)?);
        if let Some(predicate) = &self.predicate {
            out.push_str(&format!("\nWHERE {}", render_predicate(predicate, env)?));
        }
        Ok(out)
    }
}

impl ToCypher for Call {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        if !self.body.ends_with_return() {
            return Err(CypherBuildError::missing_return("CALL subquery"));
        }
        let import = match &self.import {
            CallImport::Star => "WITH *".to_string(),
            CallImport::Variables(vars) if vars.is_empty() => String::new(),
            CallImport::Variables(vars) => {
                let names: Vec<String> = vars.iter().map(|v| env.variable_name(v)).collect();
                format!("WITH {}", names.join(", "))
            }
        };
        let with_import = |body: String| {
            if import.is_empty() {
                body
            } else {
                format!("{}\n{}", import, body)
            }
        };
        let body = match self.body.as_ref() {
            Clause::Union(branches) => {
                if branches.is_empty() {
                    return Err(CypherBuildError::EmptyUnion);
                }
                let mut rendered = Vec::with_capacity(branches.len());
                for branch in branches {
                    rendered.push(with_import(branch.to_cypher(env)?));
                }
                rendered.join("\nUNION\n")
            }
            other => with_import(other.to_cypher(env)?),
        };
        Ok(format!("CALL {{\n{}\n}}", indent(&body)))
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self, env: &mut RenderEnv) -> Result<String, CypherBuildError> {
        match self {
            Clause::Match(m) => m.to_cypher(env),
            Clause::With(with) => {
                render_projection("WITH", &with.projection, with.predicate.as_ref(), env)
            }
            Clause::Unwind(unwind) => Ok(format!(
                "UNWIND {} AS {}",
                unwind.expr.to_cypher(env)?,
                env.variable_name(&unwind.alias)
            )),
            Clause::Call(call) => call.to_cypher(env),
            Clause::Union(branches) => {
                if branches.is_empty() {
                    return Err(CypherBuildError::EmptyUnion);
                }
                join_rendered(branches, "\nUNION\n", env)
            }
            Clause::Return(projection) => render_projection("RETURN", projection, None, env),
            Clause::Validate(validate) => Ok(format!(
                "CALL apoc.util.validate({}, {}, [0])",
                render_predicate(&validate.predicate, env)?,
                escape_string(validate.message)
            )),
            Clause::Sequence(items) => {
                if items.is_empty() {
                    return Err(CypherBuildError::EmptySequence);
                }
                join_rendered(items, "\n", env)
            }
        }
    }
}
