//! Tag-filter expressions.
//!
//! A tag filter scopes alerts, maintenance windows and SLO entities with a
//! boolean expression over `tag OPERATOR value` comparisons:
//!
//! ```text
//! entity.type EQUALS 'host' AND (service.name STARTS_WITH 'db' OR agent.tag:stage NOT_EMPTY)
//! ```
//!
//! - `AND` binds tighter than `OR`; parentheses group explicitly.
//! - A tag name may carry an entity suffix (`@src`, `@dest`, `@na`) and a
//!   tag key (`agent.tag:stage`).
//! - Values are single-quoted strings, integers or `true`/`false`.
//!
//! User text is parsed into an [`Expression`], rendered back in canonical
//! form, and converted to and from the nested JSON form the API uses. State
//! always stores the canonical text; two filters are equal when their
//! canonical texts are equal.

mod format;
mod lexer;
mod mapper;
mod parser;

use std::fmt;

pub use mapper::{from_wire, to_wire};
pub use parser::{parse, ParseError};

use crate::error::ProviderError;

/// Which side of a call a tag is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityOrigin {
    /// The tag is not tied to a call side.
    #[default]
    NotApplicable,
    /// The calling side.
    Source,
    /// The called side.
    Destination,
}

impl EntityOrigin {
    /// Suffix used in the text form (without the `@`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::NotApplicable => "na",
            Self::Source => "src",
            Self::Destination => "dest",
        }
    }

    /// Value of the `entity` field in the wire form.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::Source => "SOURCE",
            Self::Destination => "DESTINATION",
        }
    }

    /// Parse the text-form suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "na" => Some(Self::NotApplicable),
            "src" => Some(Self::Source),
            "dest" => Some(Self::Destination),
            _ => None,
        }
    }

    /// Parse the wire-form entity name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "NOT_APPLICABLE" => Some(Self::NotApplicable),
            "SOURCE" => Some(Self::Source),
            "DESTINATION" => Some(Self::Destination),
            _ => None,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operator {
    Equals,
    NotEqual,
    Contains,
    NotContain,
    StartsWith,
    EndsWith,
    NotStartsWith,
    NotEndsWith,
    GreaterOrEqualThan,
    GreaterThan,
    LessOrEqualThan,
    LessThan,
    IsEmpty,
    NotEmpty,
    IsBlank,
    NotBlank,
}

impl Operator {
    /// Every operator, binary ones first.
    pub const ALL: [Operator; 16] = [
        Operator::Equals,
        Operator::NotEqual,
        Operator::Contains,
        Operator::NotContain,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::NotStartsWith,
        Operator::NotEndsWith,
        Operator::GreaterOrEqualThan,
        Operator::GreaterThan,
        Operator::LessOrEqualThan,
        Operator::LessThan,
        Operator::IsEmpty,
        Operator::NotEmpty,
        Operator::IsBlank,
        Operator::NotBlank,
    ];

    /// Name in both the text and the wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEqual => "NOT_EQUAL",
            Self::Contains => "CONTAINS",
            Self::NotContain => "NOT_CONTAIN",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::NotStartsWith => "NOT_STARTS_WITH",
            Self::NotEndsWith => "NOT_ENDS_WITH",
            Self::GreaterOrEqualThan => "GREATER_OR_EQUAL_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessOrEqualThan => "LESS_OR_EQUAL_THAN",
            Self::LessThan => "LESS_THAN",
            Self::IsEmpty => "IS_EMPTY",
            Self::NotEmpty => "NOT_EMPTY",
            Self::IsBlank => "IS_BLANK",
            Self::NotBlank => "NOT_BLANK",
        }
    }

    /// Look an operator up by name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
    }

    /// Unary operators take no value.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Self::IsEmpty | Self::NotEmpty | Self::IsBlank | Self::NotBlank
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a binary comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagValue {
    /// A string literal.
    String(String),
    /// An integer literal.
    Number(i64),
    /// A boolean literal.
    Bool(bool),
}

/// A single `tag OPERATOR value?` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    /// Tag name, e.g. `entity.type`.
    pub name: String,
    /// Key of a key/value tag, e.g. `stage` in `agent.tag:stage`.
    pub key: Option<String>,
    /// Call side the tag is evaluated on.
    pub entity: EntityOrigin,
    /// Comparison operator.
    pub operator: Operator,
    /// Value for binary operators; `None` for unary ones.
    pub value: Option<TagValue>,
}

impl Comparison {
    /// Comparison against a string value.
    pub fn string(name: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            entity: EntityOrigin::NotApplicable,
            operator,
            value: Some(TagValue::String(value.into())),
        }
    }

    /// Comparison with a unary operator.
    pub fn unary(name: impl Into<String>, operator: Operator) -> Self {
        Self {
            name: name.into(),
            key: None,
            entity: EntityOrigin::NotApplicable,
            operator,
            value: None,
        }
    }

    /// Set the call side.
    pub fn with_entity(mut self, entity: EntityOrigin) -> Self {
        self.entity = entity;
        self
    }

    /// Set the tag key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A tag-filter expression tree.
///
/// `And` and `Or` always hold at least two operands after parsing; operands
/// of the same kind are flattened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// A single comparison.
    Comparison(Comparison),
    /// Conjunction of the operands.
    And(Vec<Expression>),
    /// Disjunction of the operands.
    Or(Vec<Expression>),
}

impl Expression {
    /// Conjunction, flattening nested conjunctions and collapsing a single operand.
    pub fn and(operands: Vec<Expression>) -> Self {
        Self::combine(operands, true)
    }

    /// Disjunction, flattening nested disjunctions and collapsing a single operand.
    pub fn or(operands: Vec<Expression>) -> Self {
        Self::combine(operands, false)
    }

    fn combine(operands: Vec<Expression>, conjunction: bool) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Self::And(inner) if conjunction => flat.extend(inner),
                Self::Or(inner) if !conjunction => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        if conjunction {
            Self::And(flat)
        } else {
            Self::Or(flat)
        }
    }
}

/// Parse and re-render a filter in canonical form.
///
/// Blank input normalizes to `None`.
pub fn normalize(text: &str) -> Result<Option<String>, ProviderError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let expression = parse(text).map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
    Ok(Some(expression.to_string()))
}

/// Whether two filter texts are the same filter.
///
/// Texts that do not parse are compared verbatim.
pub fn equivalent(left: &str, right: &str) -> bool {
    match (normalize(left), normalize(right)) {
        (Ok(l), Ok(r)) => l == r,
        _ => left == right,
    }
}

/// Convert filter text into the wire form (`None` for blank text).
pub fn text_to_wire(text: &str) -> Result<Option<serde_json::Value>, ProviderError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let expression = parse(text).map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
    Ok(Some(to_wire(&expression)))
}

/// Convert a wire filter into canonical text (`None` for an empty expression).
pub fn wire_to_text(wire: &serde_json::Value) -> Result<Option<String>, ProviderError> {
    Ok(from_wire(wire)?.map(|expression| expression.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_lookup() {
        assert_eq!(Operator::parse("EQUALS"), Some(Operator::Equals));
        assert_eq!(Operator::parse("not_empty"), Some(Operator::NotEmpty));
        assert_eq!(Operator::parse("MATCHES"), None);
        assert!(Operator::IsBlank.is_unary());
        assert!(!Operator::LessThan.is_unary());
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_entity_origin_names() {
        assert_eq!(EntityOrigin::from_suffix("dest"), Some(EntityOrigin::Destination));
        assert_eq!(EntityOrigin::from_wire_name("SOURCE"), Some(EntityOrigin::Source));
        assert_eq!(EntityOrigin::from_suffix("both"), None);
        assert_eq!(EntityOrigin::default().wire_name(), "NOT_APPLICABLE");
    }

    #[test]
    fn test_expression_flattening() {
        let a = Expression::Comparison(Comparison::unary("a", Operator::NotEmpty));
        let b = Expression::Comparison(Comparison::unary("b", Operator::NotEmpty));
        let c = Expression::Comparison(Comparison::unary("c", Operator::NotEmpty));

        let nested = Expression::and(vec![Expression::and(vec![a.clone(), b.clone()]), c.clone()]);
        assert_eq!(nested, Expression::And(vec![a.clone(), b.clone(), c.clone()]));

        assert_eq!(Expression::or(vec![a.clone()]), a);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("   ").unwrap(), None);
        assert_eq!(
            normalize("entity.type   equals 'host'").unwrap(),
            Some("entity.type EQUALS 'host'".to_string())
        );
        assert!(matches!(
            normalize("entity.type EQUALS"),
            Err(ProviderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_equivalent() {
        assert!(equivalent(
            "a EQUALS 'x' and (b NOT_EMPTY)",
            "a EQUALS 'x' AND b NOT_EMPTY"
        ));
        assert!(!equivalent("a EQUALS 'x'", "a EQUALS 'y'"));
        assert!(equivalent("not parseable (", "not parseable ("));
    }

    #[test]
    fn test_round_trip_scenario() {
        let text =
            "entity.type EQUALS 'host' AND (service.name STARTS_WITH 'db' OR service.name EQUALS 'cache')";

        let expression = parse(text).unwrap();
        assert_eq!(expression.to_string(), text);

        let wire = to_wire(&expression);
        assert_eq!(wire["type"], "EXPRESSION");
        assert_eq!(wire["logicalOperator"], "AND");
        assert_eq!(wire["elements"][0]["type"], "TAG_FILTER");
        assert_eq!(wire["elements"][1]["type"], "EXPRESSION");
        assert_eq!(wire["elements"][1]["logicalOperator"], "OR");
        assert_eq!(wire["elements"][1]["elements"][0]["type"], "TAG_FILTER");

        assert_eq!(wire_to_text(&wire).unwrap(), Some(text.to_string()));
    }

    #[test]
    fn test_text_to_wire_blank() {
        assert_eq!(text_to_wire("").unwrap(), None);
        assert_eq!(
            wire_to_text(&json!({"type": "EXPRESSION", "logicalOperator": "AND", "elements": []}))
                .unwrap(),
            None
        );
    }
}
