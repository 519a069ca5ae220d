//! Canonical text rendering.
//!
//! Keywords and operators are upper case, tokens are separated by single
//! spaces, string values are single-quoted, and parentheses appear only
//! where `OR` is nested below `AND`. An entity suffix is written for the
//! source and destination sides only.

use std::fmt;

use super::{Comparison, EntityOrigin, Expression, TagValue};

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Comparison(comparison) => comparison.fmt(f),
            Expression::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    match operand {
                        Expression::Or(_) => write!(f, "({})", operand)?,
                        _ => operand.fmt(f)?,
                    }
                }
                Ok(())
            },
            Expression::Or(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    operand.fmt(f)?;
                }
                Ok(())
            },
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(key) = &self.key {
            write!(f, ":{}", key)?;
        }
        if self.entity != EntityOrigin::NotApplicable {
            write!(f, "@{}", self.entity.suffix())?;
        }
        write!(f, " {}", self.operator)?;
        if let Some(value) = &self.value {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(text) => {
                f.write_str("'")?;
                for c in text.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("'")
            },
            TagValue::Number(number) => write!(f, "{}", number),
            TagValue::Bool(flag) => write!(f, "{}", flag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse, Operator};
    use super::*;

    fn canonical(text: &str) -> String {
        parse(text).unwrap().to_string()
    }

    #[test]
    fn test_format_comparisons() {
        assert_eq!(canonical("entity.type   equals   'host'"), "entity.type EQUALS 'host'");
        assert_eq!(canonical("host.fqdn@na EQUALS 'fooBar'"), "host.fqdn EQUALS 'fooBar'");
        assert_eq!(canonical("name@dest EQUALS 1234"), "name@dest EQUALS 1234");
        assert_eq!(canonical("request.path@dest is_empty"), "request.path@dest IS_EMPTY");
        assert_eq!(
            canonical("agent.tag:stage@src EQUALS \"prod\""),
            "agent.tag:stage@src EQUALS 'prod'"
        );
    }

    #[test]
    fn test_format_escapes_quotes() {
        let comparison = Comparison::string("service.name", Operator::Equals, "it's a\\b");
        let text = comparison.to_string();
        assert_eq!(text, "service.name EQUALS 'it\\'s a\\\\b'");
        assert_eq!(canonical(&text), text);
    }

    #[test]
    fn test_format_parentheses() {
        assert_eq!(
            canonical("(a NOT_EMPTY OR b NOT_EMPTY) AND c NOT_EMPTY"),
            "(a NOT_EMPTY OR b NOT_EMPTY) AND c NOT_EMPTY"
        );
        assert_eq!(
            canonical("(a NOT_EMPTY AND b NOT_EMPTY) OR c NOT_EMPTY"),
            "a NOT_EMPTY AND b NOT_EMPTY OR c NOT_EMPTY"
        );
        assert_eq!(canonical("((a NOT_EMPTY))"), "a NOT_EMPTY");
    }

    #[test]
    fn test_format_is_idempotent() {
        let inputs = [
            "entity.type EQUALS 'host' AND (service.name STARTS_WITH 'db' OR service.name EQUALS 'cache')",
            "a@src EQUALS 1 or (b@dest NOT_BLANK and (c EQUALS false or d:k CONTAINS 'x'))",
            "  x   LESS_THAN   -5  ",
        ];
        for input in inputs {
            let once = canonical(input);
            assert_eq!(canonical(&once), once, "input: {}", input);
        }
    }
}
