//! Recursive-descent parser for tag-filter text.

use std::fmt;

use super::lexer::{Lexer, SpannedToken, Token};
use super::{Comparison, EntityOrigin, Expression, Operator, TagValue};

/// Maximum nesting depth of parenthesized groups.
pub const MAX_NESTING: usize = 32;

const SNIPPET_CHARS: usize = 24;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A syntax error located in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// Source text starting at the offending token, clipped.
    pub snippet: String,
}

impl ParseError {
    pub(super) fn new(input: &str, position: usize, message: impl Into<String>) -> Self {
        let position = position.min(input.len());
        let before = &input[..position];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = input[line_start..position].chars().count() + 1;

        let rest = input[position..].lines().next().unwrap_or_default();
        let mut snippet: String = rest.chars().take(SNIPPET_CHARS).collect();
        if rest.chars().count() > SNIPPET_CHARS {
            snippet.push_str("...");
        }

        Self {
            message: message.into(),
            line,
            column,
            snippet,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid tag filter at line {}, column {}: {}",
            self.line, self.column, self.message
        )?;
        if !self.snippet.is_empty() {
            write!(f, " near '{}'", self.snippet)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// SECTION: Entry point
// ============================================================================

/// Parse tag-filter text into an expression tree.
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser {
        input,
        tokens,
        index: 0,
        depth: 0,
    };
    let expression = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expression)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<SpannedToken<'a>>,
    index: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut operands = vec![self.parse_and()?];
        while self.keyword("OR") {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(Expression::or(operands))
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut operands = vec![self.parse_primary()?];
        while self.keyword("AND") {
            self.advance();
            operands.push(self.parse_primary()?);
        }
        Ok(Expression::and(operands))
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.current().token {
            Token::LParen => {
                self.advance();
                let inner = self.with_nesting(Self::parse_or)?;
                self.expect_rparen()?;
                Ok(inner)
            },
            Token::Word(_) if self.keyword("AND") || self.keyword("OR") => {
                Err(self.error(format!("expected a tag name, found {}", self.describe_current())))
            },
            Token::Word(word) => {
                let position = self.current().position;
                self.advance();
                self.parse_comparison(word, position).map(Expression::Comparison)
            },
            _ => Err(self.error(format!("expected a tag name, found {}", self.describe_current()))),
        }
    }

    fn parse_comparison(&mut self, tag: &'a str, position: usize) -> Result<Comparison, ParseError> {
        let (rest, entity) = match tag.rsplit_once('@') {
            Some((rest, suffix)) => match EntityOrigin::from_suffix(suffix) {
                Some(entity) => (rest, entity),
                None => {
                    return Err(ParseError::new(
                        self.input,
                        position,
                        format!("unknown entity origin '@{}', expected @src, @dest or @na", suffix),
                    ))
                },
            },
            None => (tag, EntityOrigin::NotApplicable),
        };
        let (name, key) = match rest.split_once(':') {
            Some((name, key)) if !key.is_empty() => (name, Some(key.to_string())),
            Some(_) => {
                return Err(ParseError::new(self.input, position, "tag key must not be empty"))
            },
            None => (rest, None),
        };
        if name.is_empty() {
            return Err(ParseError::new(self.input, position, "tag name must not be empty"));
        }

        let operator = match self.current().token {
            Token::Word(word) => Operator::parse(word).ok_or_else(|| {
                self.error(format!("unknown operator '{}'", word))
            })?,
            _ => {
                return Err(self.error(format!(
                    "expected an operator after '{}', found {}",
                    tag,
                    self.describe_current()
                )))
            },
        };
        self.advance();

        let value = if operator.is_unary() {
            None
        } else {
            Some(self.parse_value(operator)?)
        };

        Ok(Comparison {
            name: name.to_string(),
            key,
            entity,
            operator,
            value,
        })
    }

    fn parse_value(&mut self, operator: Operator) -> Result<TagValue, ParseError> {
        let value = match &self.current().token {
            Token::Quoted(text) => TagValue::String(text.clone()),
            Token::Word(word) if !self.keyword("AND") && !self.keyword("OR") => {
                if word.eq_ignore_ascii_case("true") {
                    TagValue::Bool(true)
                } else if word.eq_ignore_ascii_case("false") {
                    TagValue::Bool(false)
                } else if let Ok(number) = word.parse::<i64>() {
                    TagValue::Number(number)
                } else {
                    return Err(self.error(format!(
                        "expected a quoted string, number or boolean, found '{}'",
                        word
                    )));
                }
            },
            _ => {
                return Err(self.error(format!(
                    "operator {} requires a value, found {}",
                    operator,
                    self.describe_current()
                )))
            },
        };
        self.advance();
        Ok(value)
    }

    fn with_nesting<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "expression nesting exceeds {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if self.current().token == Token::RParen {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected ')', found {}", self.describe_current())))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.current().token {
            Token::Eof => Ok(()),
            _ => Err(self.error(format!(
                "unexpected {} after expression",
                self.describe_current()
            ))),
        }
    }

    fn keyword(&self, keyword: &str) -> bool {
        matches!(self.current().token, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn current(&self) -> &SpannedToken<'a> {
        // The lexer always terminates the stream with Eof and advance never
        // moves past it.
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Word(word) => format!("'{}'", word),
            Token::Quoted(text) => format!("string '{}'", text),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.input, self.current().position, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(expression: &Expression) -> &Comparison {
        match expression {
            Expression::Comparison(c) => c,
            other => panic!("expected a comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_string_comparison() {
        let expression = parse("entity.type EQUALS 'host'").unwrap();
        assert_eq!(
            leaf(&expression),
            &Comparison::string("entity.type", Operator::Equals, "host")
        );
    }

    #[test]
    fn test_parse_entity_and_key() {
        let expression = parse("agent.tag:stage@src NOT_EQUAL 'prod'").unwrap();
        let comparison = leaf(&expression);
        assert_eq!(comparison.name, "agent.tag");
        assert_eq!(comparison.key.as_deref(), Some("stage"));
        assert_eq!(comparison.entity, EntityOrigin::Source);

        let na = parse("host.fqdn@na STARTS_WITH 'fooBar'").unwrap();
        assert_eq!(leaf(&na).entity, EntityOrigin::NotApplicable);
    }

    #[test]
    fn test_parse_number_boolean_and_unary() {
        let number = parse("name@dest EQUALS 1234").unwrap();
        assert_eq!(leaf(&number).value, Some(TagValue::Number(1234)));
        assert_eq!(leaf(&number).entity, EntityOrigin::Destination);

        let boolean = parse("call.erroneous EQUALS true").unwrap();
        assert_eq!(leaf(&boolean).value, Some(TagValue::Bool(true)));

        let unary = parse("request.path@dest IS_EMPTY").unwrap();
        assert_eq!(leaf(&unary).value, None);
        assert_eq!(leaf(&unary).operator, Operator::IsEmpty);
    }

    #[test]
    fn test_parse_precedence() {
        let expression = parse("a NOT_EMPTY OR b NOT_EMPTY AND c NOT_EMPTY").unwrap();
        match expression {
            Expression::Or(operands) => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1], Expression::And(_)));
            },
            other => panic!("expected OR at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parentheses_and_flattening() {
        let expression = parse("(a NOT_EMPTY AND b NOT_EMPTY) AND c NOT_EMPTY").unwrap();
        match expression {
            Expression::And(operands) => assert_eq!(operands.len(), 3),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_keywords_case_insensitive() {
        let expression = parse("a NOT_EMPTY and b NOT_EMPTY or c NOT_EMPTY").unwrap();
        assert!(matches!(expression, Expression::Or(_)));
    }

    #[test]
    fn test_missing_value_reports_position() {
        let err = parse("entity.type EQUALS").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 19);
        assert!(err.message.contains("requires a value"));
    }

    #[test]
    fn test_error_on_second_line() {
        let err = parse("a EQUALS 'x' AND\n  b BOGUS 'y'").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
        assert_eq!(err.snippet, "BOGUS 'y'");
        assert!(err.to_string().contains("unknown operator 'BOGUS'"));
    }

    #[test]
    fn test_snippet_is_clipped() {
        let err = parse("a EQUALS 'x' zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").unwrap_err();
        assert!(err.snippet.ends_with("..."));
        assert_eq!(err.snippet.chars().count(), SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("(a NOT_EMPTY").is_err());
        assert!(parse("a NOT_EMPTY)").is_err());
        assert!(parse("AND a NOT_EMPTY").is_err());
        assert!(parse("a@both EQUALS 'x'").is_err());
        assert!(parse("a: EQUALS 'x'").is_err());
        assert!(parse("a EQUALS bare").is_err());
        assert!(parse("a EQUALS 'x' b NOT_EMPTY").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}a NOT_EMPTY{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse(&ok).is_ok());

        let deep = format!(
            "{}a NOT_EMPTY{}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        let err = parse(&deep).unwrap_err();
        assert!(err.message.contains("nesting"));
    }
}
