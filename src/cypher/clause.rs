//! Clause nodes of the query AST.
//!
//! A query is a [`Clause`] tree. [`Clause::Sequence`] concatenates siblings in
//! declared order; `WITH` is the scope boundary and only carries forward what it
//! lists (or everything, for `WITH *`).

use super::environment::Variable;
use super::expr::Expr;
use super::pattern::Pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<Variable>,
}

impl ProjectionItem {
    pub fn aliased(expr: Expr, alias: &Variable) -> Self {
        ProjectionItem {
            expr,
            alias: Some(alias.clone()),
        }
    }

    pub fn bare(variable: &Variable) -> Self {
        ProjectionItem {
            expr: Expr::variable(variable),
            alias: None,
        }
    }
}

/// Shared body of `WITH` and `RETURN`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub star: bool,
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Projection {
    pub fn star() -> Self {
        Projection {
            star: true,
            ..Projection::default()
        }
    }

    pub fn items(items: Vec<ProjectionItem>) -> Self {
        Projection {
            items,
            ..Projection::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.star && self.items.is_empty()
    }

    pub fn order_by(mut self, order_by: Vec<OrderItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn skip(mut self, skip: Option<Expr>) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<Expr>) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub optional: bool,
    pub pattern: Pattern,
    pub predicate: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub projection: Projection,
    pub predicate: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unwind {
    pub expr: Expr,
    pub alias: Variable,
}

/// Variables a `CALL { }` subquery imports from the enclosing scope.
#[derive(Debug, Clone, PartialEq)]
pub enum CallImport {
    Star,
    Variables(Vec<Variable>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub import: CallImport,
    pub body: Box<Clause>,
}

/// `CALL apoc.util.validate(predicate, message, [0])`: aborts the whole query
/// when `predicate` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Validate {
    pub predicate: Expr,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(Match),
    With(With),
    Unwind(Unwind),
    Call(Call),
    Union(Vec<Clause>),
    Return(Projection),
    Validate(Validate),
    Sequence(Vec<Clause>),
}

impl Clause {
    pub fn match_pattern(pattern: Pattern, predicate: Option<Expr>) -> Self {
        Clause::Match(Match {
            optional: false,
            pattern,
            predicate,
        })
    }

    pub fn with(projection: Projection, predicate: Option<Expr>) -> Self {
        Clause::With(With {
            projection,
            predicate,
        })
    }

    /// `WITH * WHERE predicate`
    pub fn with_star_where(predicate: Expr) -> Self {
        Clause::with(Projection::star(), Some(predicate))
    }

    pub fn unwind(expr: Expr, alias: &Variable) -> Self {
        Clause::Unwind(Unwind {
            expr,
            alias: alias.clone(),
        })
    }

    pub fn call(imports: &[&Variable], body: Clause) -> Self {
        Clause::Call(Call {
            import: CallImport::Variables(imports.iter().map(|v| (*v).clone()).collect()),
            body: Box::new(body),
        })
    }

    pub fn call_star(body: Clause) -> Self {
        Clause::Call(Call {
            import: CallImport::Star,
            body: Box::new(body),
        })
    }

    pub fn returning(projection: Projection) -> Self {
        Clause::Return(projection)
    }

    /// `RETURN expr AS alias`
    pub fn return_as(expr: Expr, alias: &Variable) -> Self {
        Clause::Return(Projection::items(vec![ProjectionItem::aliased(expr, alias)]))
    }

    pub fn validate(predicate: Expr, message: &'static str) -> Self {
        Clause::Validate(Validate { predicate, message })
    }

    /// Join clauses in order, flattening nested sequences.
    pub fn concat<I>(clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        let mut flat = Vec::new();
        for clause in clauses {
            match clause {
                Clause::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Clause::Sequence(Vec::new()))
        } else {
            Clause::Sequence(flat)
        }
    }

    /// Last clause in declared order, looking through sequences
    pub fn last(&self) -> Option<&Clause> {
        match self {
            Clause::Sequence(items) => items.last().and_then(Clause::last),
            other => Some(other),
        }
    }

    /// Top-level clauses in declared order
    pub fn flattened(&self) -> Vec<&Clause> {
        match self {
            Clause::Sequence(items) => items.iter().flat_map(Clause::flattened).collect(),
            other => vec![other],
        }
    }

    pub fn ends_with_return(&self) -> bool {
        match self.last() {
            Some(Clause::Return(_)) => true,
            Some(Clause::Union(branches)) => {
                !branches.is_empty() && branches.iter().all(Clause::ends_with_return)
            }
            _ => false,
        }
    }
}
