//! Expression and predicate nodes of the query AST.
//!
//! Predicates are ordinary [`Expr`] values. Optional predicates are passed
//! around as `Option<Expr>` so that "no condition" stays distinct from a literal
//! `true`; [`and_all`] and [`or_all`] drop the `None`s, which makes an empty
//! filter the identity of any enclosing conjunction.

use super::clause::Clause;
use super::environment::{Param, Variable};
use super::pattern::Pattern;

/// Constants that come from the schema or the compiler itself. Request input
/// is never turned into a literal; it always goes through a [`Param`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    In,
    Contains,
    StartsWith,
    EndsWith,
    RegexMatch,
    Addition,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::In => "IN",
            BinaryOperator::Contains => "CONTAINS",
            BinaryOperator::StartsWith => "STARTS WITH",
            BinaryOperator::EndsWith => "ENDS WITH",
            BinaryOperator::RegexMatch => "=~",
            BinaryOperator::Addition => "+",
        }
    }
}

/// List predicate functions: `all(x IN list WHERE p)` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Single,
}

impl Quantifier {
    pub fn function_name(&self) -> &'static str {
        match self {
            Quantifier::All => "all",
            Quantifier::Any => "any",
            Quantifier::None => "none",
            Quantifier::Single => "single",
        }
    }
}

/// Entry of a map projection `n { .title, year: n.released }`.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    /// `.key`
    Property(String),
    /// `key: expr`
    Keyed(String, Expr),
}

impl MapEntry {
    pub fn key(&self) -> &str {
        match self {
            MapEntry::Property(key) | MapEntry::Keyed(key, _) => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(Variable),
    Param(Param),
    Literal(Literal),

    /// Property access, e.g. `this.title`
    Property {
        subject: Box<Expr>,
        key: String,
    },

    /// Function call. The name is a compiler constant (`datetime`, `apoc.util.validatePredicate`).
    Function {
        name: &'static str,
        args: Vec<Expr>,
    },

    /// Map literal `{ key: expr }`
    Map(Vec<(String, Expr)>),

    /// Map projection `this { .title, key: expr }`
    MapProjection {
        variable: Variable,
        entries: Vec<MapEntry>,
    },

    List(Vec<Expr>),

    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },

    /// `[x IN list WHERE filter | map]`
    ListComprehension {
        variable: Variable,
        list: Box<Expr>,
        filter: Option<Box<Expr>>,
        map: Option<Box<Expr>>,
    },

    /// `[(a)-[:R]->(b) WHERE filter | map]`
    PatternComprehension {
        pattern: Pattern,
        filter: Option<Box<Expr>>,
        map: Box<Expr>,
    },

    /// `all(x IN list WHERE predicate)`
    Quantified {
        quantifier: Quantifier,
        variable: Variable,
        list: Box<Expr>,
        predicate: Box<Expr>,
    },

    /// `reduce(acc = init, x IN list | expr)`
    Reduce {
        accumulator: Variable,
        init: Box<Expr>,
        variable: Variable,
        list: Box<Expr>,
        expr: Box<Expr>,
    },

    /// `EXISTS { <clauses> }`
    Exists(Box<Clause>),

    /// `COUNT { <clauses> }`
    Count(Box<Clause>),

    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),

    /// Label test, e.g. `this:Movie`
    HasLabel {
        variable: Variable,
        label: String,
    },

    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn variable(variable: &Variable) -> Self {
        Expr::Variable(variable.clone())
    }

    pub fn param(param: Param) -> Self {
        Expr::Param(param)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    /// `variable.key`
    pub fn property(variable: &Variable, key: impl Into<String>) -> Self {
        Expr::variable(variable).dot(key)
    }

    /// `<self>.key`
    pub fn dot(self, key: impl Into<String>) -> Self {
        Expr::Property {
            subject: Box::new(self),
            key: key.into(),
        }
    }

    pub fn function(name: &'static str, args: Vec<Expr>) -> Self {
        Expr::Function { name, args }
    }

    pub fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOperator::Equal, left, right)
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn is_null(expr: Expr) -> Self {
        Expr::IsNull(Box::new(expr))
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Expr::IsNotNull(Box::new(expr))
    }

    pub fn exists(clause: Clause) -> Self {
        Expr::Exists(Box::new(clause))
    }

    pub fn count(clause: Clause) -> Self {
        Expr::Count(Box::new(clause))
    }

    pub fn has_label(variable: &Variable, label: impl Into<String>) -> Self {
        Expr::HasLabel {
            variable: variable.clone(),
            label: label.into(),
        }
    }

    pub fn quantified(quantifier: Quantifier, variable: &Variable, list: Expr, predicate: Expr) -> Self {
        Expr::Quantified {
            quantifier,
            variable: variable.clone(),
            list: Box::new(list),
            predicate: Box::new(predicate),
        }
    }

    /// `[variable IN list | map]`
    pub fn list_map(variable: &Variable, list: Expr, map: Expr) -> Self {
        Expr::ListComprehension {
            variable: variable.clone(),
            list: Box::new(list),
            filter: None,
            map: Some(Box::new(map)),
        }
    }

    /// `CASE WHEN condition THEN then ELSE otherwise END`
    pub fn case_when(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Case {
            branches: vec![(condition, then)],
            otherwise: Some(Box::new(otherwise)),
        }
    }

    pub fn map_projection(variable: &Variable, entries: Vec<MapEntry>) -> Self {
        Expr::MapProjection {
            variable: variable.clone(),
            entries,
        }
    }

    /// Logical AND of two predicates
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut items) => {
                items.push(other);
                Expr::And(items)
            }
            first => Expr::And(vec![first, other]),
        }
    }
}

/// Conjunction of the present predicates, flattening nested conjunctions.
/// `None` when none are present.
pub fn and_all<I>(predicates: I) -> Option<Expr>
where
    I: IntoIterator<Item = Option<Expr>>,
{
    let mut items = Vec::new();
    for predicate in predicates.into_iter().flatten() {
        match predicate {
            Expr::And(nested) => items.extend(nested),
            other => items.push(other),
        }
    }
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Expr::And(items)),
    }
}

/// Disjunction of the present predicates. `None` when none are present.
pub fn or_all<I>(predicates: I) -> Option<Expr>
where
    I: IntoIterator<Item = Option<Expr>>,
{
    let mut items = Vec::new();
    for predicate in predicates.into_iter().flatten() {
        match predicate {
            Expr::Or(nested) => items.extend(nested),
            other => items.push(other),
        }
    }
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Expr::Or(items)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_all_is_identity_for_missing_predicates() {
        assert_eq!(and_all(vec![None, None]), None);
        assert_eq!(
            and_all(vec![None, Some(Expr::boolean(true)), None]),
            Some(Expr::boolean(true))
        );
        assert!(matches!(
            and_all(vec![Some(Expr::boolean(true)), Some(Expr::boolean(false))]),
            Some(Expr::And(items)) if items.len() == 2
        ));
    }

    #[test]
    fn test_and_all_flattens() {
        let inner = and_all(vec![Some(Expr::integer(1)), Some(Expr::integer(2))]);
        assert!(matches!(
            and_all(vec![inner, Some(Expr::integer(3))]),
            Some(Expr::And(items)) if items.len() == 3
        ));
    }

    #[test]
    fn test_or_all_single_item_is_unwrapped() {
        assert_eq!(or_all(vec![Some(Expr::integer(1))]), Some(Expr::integer(1)));
        assert_eq!(or_all(Vec::new()), None);
    }
}
