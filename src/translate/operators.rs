/// Filter key suffix tables
///
/// A filter key is `<field>[_<SUFFIX>]`. Field names may themselves contain
/// underscores, so suffixes are only split off when the remaining prefix names
/// a known field, and longer suffixes are tried first (`_NOT_IN` before `_IN`).
use std::collections::HashMap;

use crate::cypher::BinaryOperator;
use crate::schema::{FieldKind, ScalarField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equal,
    Not,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Includes,
    NotIncludes,
    Distance,
}

impl FilterOperator {
    /// The positive form of a negated operator
    pub fn negated_base(&self) -> Option<FilterOperator> {
        match self {
            FilterOperator::Not => Some(FilterOperator::Equal),
            FilterOperator::NotIn => Some(FilterOperator::In),
            FilterOperator::NotContains => Some(FilterOperator::Contains),
            FilterOperator::NotStartsWith => Some(FilterOperator::StartsWith),
            FilterOperator::NotEndsWith => Some(FilterOperator::EndsWith),
            FilterOperator::NotIncludes => Some(FilterOperator::Includes),
            _ => None,
        }
    }

    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            FilterOperator::Equal | FilterOperator::Distance => Some(BinaryOperator::Equal),
            FilterOperator::In => Some(BinaryOperator::In),
            FilterOperator::Contains => Some(BinaryOperator::Contains),
            FilterOperator::StartsWith => Some(BinaryOperator::StartsWith),
            FilterOperator::EndsWith => Some(BinaryOperator::EndsWith),
            FilterOperator::Matches => Some(BinaryOperator::RegexMatch),
            FilterOperator::LessThan => Some(BinaryOperator::LessThan),
            FilterOperator::LessThanEqual => Some(BinaryOperator::LessThanEqual),
            FilterOperator::GreaterThan => Some(BinaryOperator::GreaterThan),
            FilterOperator::GreaterThanEqual => Some(BinaryOperator::GreaterThanEqual),
            _ => None,
        }
    }

    /// Whether this operator can be applied to `field`
    pub fn applies_to(&self, field: &ScalarField) -> bool {
        let kind = field.kind;
        match self.negated_base().unwrap_or(*self) {
            FilterOperator::Equal => true,
            FilterOperator::In => !field.list,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                !field.list && kind.is_string_like()
            }
            FilterOperator::Matches => {
                !field.list && matches!(kind, FieldKind::String | FieldKind::Id)
            }
            FilterOperator::LessThan
            | FilterOperator::LessThanEqual
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanEqual => !field.list && (kind.is_ordered() || kind.is_spatial()),
            FilterOperator::Includes => field.list,
            FilterOperator::Distance => !field.list && kind.is_spatial(),
            _ => false,
        }
    }
}

/// Relationship quantifier suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipQuantifier {
    Some,
    None,
    All,
    Single,
}

impl RelationshipQuantifier {
    pub fn suffix(&self) -> &'static str {
        match self {
            RelationshipQuantifier::Some => "_SOME",
            RelationshipQuantifier::None => "_NONE",
            RelationshipQuantifier::All => "_ALL",
            RelationshipQuantifier::Single => "_SINGLE",
        }
    }
}

const QUANTIFIERS: [RelationshipQuantifier; 4] = [
    RelationshipQuantifier::Some,
    RelationshipQuantifier::None,
    RelationshipQuantifier::All,
    RelationshipQuantifier::Single,
];

/// Aggregation applied to a neighbor or edge field inside an aggregate filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Min,
    Max,
    Average,
    Sum,
    ShortestLength,
    LongestLength,
    AverageLength,
}

impl AggregateFunction {
    pub fn applies_to(&self, field: &ScalarField) -> bool {
        if field.list {
            return false;
        }
        let kind = field.kind;
        match self {
            AggregateFunction::Min | AggregateFunction::Max => kind.is_numeric() || kind.is_temporal(),
            AggregateFunction::Average | AggregateFunction::Sum => kind.is_numeric(),
            AggregateFunction::ShortestLength
            | AggregateFunction::LongestLength
            | AggregateFunction::AverageLength => kind.is_string_like(),
        }
    }
}

/// Comparison suffixes of aggregate filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationComparison {
    Equal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl AggregationComparison {
    pub fn binary_operator(&self) -> BinaryOperator {
        match self {
            AggregationComparison::Equal => BinaryOperator::Equal,
            AggregationComparison::LessThan => BinaryOperator::LessThan,
            AggregationComparison::LessThanEqual => BinaryOperator::LessThanEqual,
            AggregationComparison::GreaterThan => BinaryOperator::GreaterThan,
            AggregationComparison::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
        }
    }
}

// Static suffix tables
lazy_static::lazy_static! {
    /// Scalar operator suffixes, longest first
    static ref FILTER_SUFFIXES: Vec<(&'static str, FilterOperator)> = {
        let mut v = vec![
            ("_NOT", FilterOperator::Not),
            ("_IN", FilterOperator::In),
            ("_NOT_IN", FilterOperator::NotIn),
            ("_CONTAINS", FilterOperator::Contains),
            ("_NOT_CONTAINS", FilterOperator::NotContains),
            ("_STARTS_WITH", FilterOperator::StartsWith),
            ("_NOT_STARTS_WITH", FilterOperator::NotStartsWith),
            ("_ENDS_WITH", FilterOperator::EndsWith),
            ("_NOT_ENDS_WITH", FilterOperator::NotEndsWith),
            ("_MATCHES", FilterOperator::Matches),
            ("_LT", FilterOperator::LessThan),
            ("_LTE", FilterOperator::LessThanEqual),
            ("_GT", FilterOperator::GreaterThan),
            ("_GTE", FilterOperator::GreaterThanEqual),
            ("_INCLUDES", FilterOperator::Includes),
            ("_NOT_INCLUDES", FilterOperator::NotIncludes),
            ("_DISTANCE", FilterOperator::Distance),
        ];
        v.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        v
    };

    static ref AGGREGATE_FUNCTIONS: HashMap<&'static str, AggregateFunction> = {
        let mut m = HashMap::new();
        m.insert("_MIN", AggregateFunction::Min);
        m.insert("_MAX", AggregateFunction::Max);
        m.insert("_AVERAGE", AggregateFunction::Average);
        m.insert("_SUM", AggregateFunction::Sum);
        m.insert("_SHORTEST_LENGTH", AggregateFunction::ShortestLength);
        m.insert("_LONGEST_LENGTH", AggregateFunction::LongestLength);
        m.insert("_AVERAGE_LENGTH", AggregateFunction::AverageLength);
        m
    };

    /// Aggregate comparison suffixes, longest first
    static ref AGGREGATION_COMPARISONS: Vec<(&'static str, AggregationComparison)> = vec![
        ("_EQUAL", AggregationComparison::Equal),
        ("_LTE", AggregationComparison::LessThanEqual),
        ("_GTE", AggregationComparison::GreaterThanEqual),
        ("_LT", AggregationComparison::LessThan),
        ("_GT", AggregationComparison::GreaterThan),
    ];
}

/// Split `key` into a field name and operator suffix. `is_field` decides
/// whether a candidate prefix names a field.
pub fn split_operator<'k>(
    key: &'k str,
    is_field: impl Fn(&str) -> bool,
) -> Option<(&'k str, FilterOperator)> {
    FILTER_SUFFIXES.iter().find_map(|(suffix, op)| {
        key.strip_suffix(suffix)
            .filter(|prefix| is_field(prefix))
            .map(|prefix| (prefix, *op))
    })
}

/// Split off a relationship quantifier suffix (`_SOME`, `_NONE`, `_ALL`, `_SINGLE`)
pub fn split_quantifier<'k>(
    key: &'k str,
    is_field: impl Fn(&str) -> bool,
) -> Option<(&'k str, RelationshipQuantifier)> {
    QUANTIFIERS.iter().find_map(|q| {
        key.strip_suffix(q.suffix())
            .filter(|prefix| is_field(prefix))
            .map(|prefix| (prefix, *q))
    })
}

/// Split a comparison suffix off `key`. The full key is `Equal` when it has no suffix.
pub fn split_comparison(key: &str) -> (&str, Option<AggregationComparison>) {
    for (suffix, comparison) in AGGREGATION_COMPARISONS.iter() {
        if let Some(prefix) = key.strip_suffix(suffix) {
            return (prefix, Some(*comparison));
        }
    }
    (key, None)
}

/// Parse `<field>_<FUNCTION>_<COMPARISON>` from an aggregate filter key
pub fn split_aggregate_key<'k>(
    key: &'k str,
    is_field: impl Fn(&str) -> bool,
) -> Option<(&'k str, AggregateFunction, AggregationComparison)> {
    let (rest, comparison) = split_comparison(key);
    let comparison = comparison?;
    AGGREGATE_FUNCTIONS.iter().find_map(|(suffix, function)| {
        rest.strip_suffix(suffix)
            .filter(|prefix| is_field(prefix))
            .map(|prefix| (prefix, *function, comparison))
    })
}
