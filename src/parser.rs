// ABOUTME: Recursive-descent parser building expression trees from the token stream

use regex::Regex;
use std::str::FromStr;

use crate::error::ParseError;
use crate::expr::{CmpOp, Expr};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Parse a condition into an expression tree.
///
/// Precedence, loosest to tightest: `OR`/`NAND`, `XOR`, `AND`, a single
/// comparison or containment operator, then terms. All logical operators
/// are left-associative; comparisons do not chain.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    Parser::new(input).parse()
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Short-lived parser over a lexer plus a one-token lookahead buffer.
/// `parse` consumes it; the returned tree owns no part of the input.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input),
            lookahead: None,
        }
    }

    pub fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        let tok = self.advance()?;
        if tok.kind != TokenKind::Eof {
            return Err(unexpected(tok, "end of input"));
        }
        Ok(expr)
    }

    fn peek_kind(&mut self) -> Result<TokenKind, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self
            .lookahead
            .as_ref()
            .map(|tok| tok.kind)
            .unwrap_or(TokenKind::Eof))
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        match self.lookahead.take() {
            Some(tok) => Ok(tok),
            None => self.lexer.next_token(),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_xor()?;
        loop {
            match self.peek_kind()? {
                TokenKind::Or => {
                    let op = self.advance()?;
                    let rhs = self.parse_xor()?;
                    expr = logical(Expr::Or, expr, rhs, &op)?;
                }
                TokenKind::Nand => {
                    let op = self.advance()?;
                    let rhs = self.parse_xor()?;
                    expr = logical(Expr::Nand, expr, rhs, &op)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while self.peek_kind()? == TokenKind::Xor {
            let op = self.advance()?;
            let rhs = self.parse_and()?;
            expr = logical(Expr::Xor, expr, rhs, &op)?;
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_cmp()?;
        while self.peek_kind()? == TokenKind::And {
            let op = self.advance()?;
            let rhs = self.parse_cmp()?;
            expr = logical(Expr::And, expr, rhs, &op)?;
        }
        Ok(expr)
    }

    /// One optional comparison/containment operator between two terms
    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_term()?;

        let expr = match self.peek_kind()? {
            TokenKind::Eq => self.finish_cmp(CmpOp::Eq, lhs)?,
            TokenKind::Neq => self.finish_cmp(CmpOp::Neq, lhs)?,
            TokenKind::Lt => self.finish_cmp(CmpOp::Lt, lhs)?,
            TokenKind::Lte => self.finish_cmp(CmpOp::Lte, lhs)?,
            TokenKind::Gt => self.finish_cmp(CmpOp::Gt, lhs)?,
            TokenKind::Gte => self.finish_cmp(CmpOp::Gte, lhs)?,
            TokenKind::In => self.finish_containment(Expr::In, lhs)?,
            TokenKind::NotIn => self.finish_containment(Expr::NotIn, lhs)?,
            TokenKind::Has => self.finish_containment(Expr::Has, lhs)?,
            TokenKind::Intersects => self.finish_containment(Expr::Intersects, lhs)?,
            TokenKind::Match => self.finish_match(Expr::Match, lhs)?,
            TokenKind::NotMatch => self.finish_match(Expr::NotMatch, lhs)?,
            _ => return Ok(lhs),
        };

        if is_comparison(self.peek_kind()?) {
            let tok = self.advance()?;
            return Err(ParseError::ChainedComparison { pos: tok.pos });
        }
        Ok(expr)
    }

    fn finish_cmp(&mut self, op: CmpOp, lhs: Expr) -> Result<Expr, ParseError> {
        self.advance()?;
        let rhs = self.parse_term()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn finish_containment(
        &mut self,
        node: fn(Box<Expr>, Box<Expr>) -> Expr,
        lhs: Expr,
    ) -> Result<Expr, ParseError> {
        self.advance()?;
        let rhs = self.parse_term()?;
        Ok(node(Box::new(lhs), Box::new(rhs)))
    }

    /// `=~` / `!~`: the right operand must be a regex literal, compiled here
    fn finish_match(
        &mut self,
        node: fn(Box<Expr>, Box<Expr>) -> Expr,
        lhs: Expr,
    ) -> Result<Expr, ParseError> {
        self.advance()?;
        let tok = self.advance()?;
        if tok.kind != TokenKind::Regex {
            return Err(unexpected(tok, "a regex literal"));
        }
        let re = Regex::new(&tok.lexeme).map_err(|source| ParseError::InvalidRegex {
            pos: tok.pos,
            source,
        })?;
        Ok(node(Box::new(lhs), Box::new(Expr::Regex(re))))
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind()? {
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                let tok = self.advance()?;
                if tok.kind != TokenKind::RParen {
                    return Err(unexpected(tok, "')'"));
                }
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::Number => {
                let tok = self.advance()?;
                number_literal(tok)
            }
            TokenKind::Str => {
                let tok = self.advance()?;
                Ok(Expr::Str(tok.lexeme))
            }
            TokenKind::True => {
                self.advance()?;
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance()?;
                Ok(Expr::Bool(false))
            }
            TokenKind::Ident => {
                let tok = self.advance()?;
                Ok(Expr::Var(tok.lexeme))
            }
            TokenKind::Regex => {
                let tok = self.advance()?;
                Err(ParseError::MisplacedRegex { pos: tok.pos })
            }
            _ => {
                let tok = self.advance()?;
                Err(unexpected(tok, "an expression term"))
            }
        }
    }

    /// `[` already seen and known not to open a variable reference
    fn parse_list(&mut self) -> Result<Expr, ParseError> {
        self.advance()?;
        let mut items = Vec::new();

        if self.peek_kind()? == TokenKind::RBracket {
            self.advance()?;
            return Ok(Expr::List(items));
        }

        loop {
            let tok = self.advance()?;
            let item = match tok.kind {
                TokenKind::Number => number_literal(tok)?,
                TokenKind::Str => Expr::Str(tok.lexeme),
                _ => return Err(unexpected(tok, "a number or string literal")),
            };
            items.push(item);

            let tok = self.advance()?;
            match tok.kind {
                TokenKind::Comma => {}
                TokenKind::RBracket => return Ok(Expr::List(items)),
                _ => return Err(unexpected(tok, "',' or ']'")),
            }
        }
    }
}

fn number_literal(tok: Token) -> Result<Expr, ParseError> {
    let n: f64 = tok.lexeme.parse().map_err(|_| ParseError::InvalidNumber {
        lexeme: tok.lexeme.clone(),
        pos: tok.pos,
    })?;
    Ok(Expr::Number(n))
}

/// Build a logical node, rejecting operands that cannot produce a boolean.
/// Bare variables pass; their type is checked at evaluation.
fn logical(
    node: fn(Box<Expr>, Box<Expr>) -> Expr,
    lhs: Expr,
    rhs: Expr,
    op: &Token,
) -> Result<Expr, ParseError> {
    for side in [&lhs, &rhs] {
        if !side.is_boolean() {
            return Err(ParseError::NonBooleanOperand {
                op: op.lexeme.to_ascii_uppercase(),
                pos: op.pos,
            });
        }
    }
    Ok(node(Box::new(lhs), Box::new(rhs)))
}

fn is_comparison(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq
            | TokenKind::Neq
            | TokenKind::Lt
            | TokenKind::Lte
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::In
            | TokenKind::NotIn
            | TokenKind::Has
            | TokenKind::Intersects
            | TokenKind::Match
            | TokenKind::NotMatch
    )
}

fn unexpected(tok: Token, expected: &str) -> ParseError {
    match tok.kind {
        TokenKind::Illegal => ParseError::IllegalToken {
            lexeme: tok.lexeme,
            pos: tok.pos,
        },
        _ => ParseError::UnexpectedToken {
            found: tok.describe(),
            expected: expected.to_string(),
            pos: tok.pos,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_display(input: &str) -> String {
        parse(input)
            .unwrap_or_else(|e| panic!("parse error for {:?}: {}", input, e))
            .to_string()
    }

    #[test]
    fn test_precedence_and_is_tighter_than_or() {
        assert_eq!(
            parse_display("true OR false AND true"),
            "(true OR (false AND true))"
        );
        assert_eq!(
            parse_display("true AND false OR true"),
            "((true AND false) OR true)"
        );
    }

    #[test]
    fn test_xor_sits_between_or_and_and() {
        assert_eq!(
            parse_display("true OR false XOR true AND false"),
            "(true OR (false XOR (true AND false)))"
        );
    }

    #[test]
    fn test_nand_shares_or_precedence() {
        assert_eq!(
            parse_display("true NAND false OR true"),
            "((true NAND false) OR true)"
        );
    }

    #[test]
    fn test_logical_operators_left_associative() {
        assert_eq!(
            parse_display("true AND false AND true"),
            "((true AND false) AND true)"
        );
        assert_eq!(
            parse_display("false OR true OR false"),
            "((false OR true) OR false)"
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            parse_display("(true OR false) AND true"),
            "((true OR false) AND true)"
        );
    }

    #[test]
    fn test_comparison_with_variable_paths() {
        assert_eq!(
            parse_display("[foo][dfs] == true and [bar] == true"),
            "(([foo][dfs] == true) AND ([bar] == true))"
        );
    }

    #[test]
    fn test_containment_forms() {
        assert_eq!(
            parse_display("[foo] in [\"a\", \"b\"]"),
            "([foo] IN [\"a\", \"b\"])"
        );
        assert_eq!(
            parse_display("[foo] not in [2, 3]"),
            "([foo] NOT IN [2, 3])"
        );
        assert_eq!(parse_display("[foo] HAS \"5\""), "([foo] HAS \"5\")");
        assert_eq!(
            parse_display("[foo] INTERSECTS [\"5\"]"),
            "([foo] INTERSECTS [\"5\"])"
        );
    }

    #[test]
    fn test_regex_literal_compiles_at_parse_time() {
        let expr = parse(r"[status] =~ /^5\d\d/").expect("parse failed");
        match expr {
            Expr::Match(_, rhs) => match *rhs {
                Expr::Regex(re) => assert_eq!(re.as_str(), r"^5\d\d"),
                other => panic!("expected regex literal, got {}", other),
            },
            other => panic!("expected match node, got {}", other),
        }
    }

    #[test]
    fn test_invalid_regex_rejected_at_parse_time() {
        assert!(matches!(
            parse("[a] =~ /(/"),
            Err(ParseError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_regex_only_on_match_rhs() {
        assert!(matches!(
            parse("/foo/ == \"x\""),
            Err(ParseError::MisplacedRegex { .. })
        ));
        assert!(matches!(
            parse("[a] == /foo/"),
            Err(ParseError::MisplacedRegex { .. })
        ));
        assert!(matches!(
            parse("[a] =~ \"foo\""),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_comparisons_do_not_chain() {
        assert!(matches!(
            parse("[a] == [b] == [c]"),
            Err(ParseError::ChainedComparison { .. })
        ));
        assert!(matches!(
            parse("1 < 2 < 3"),
            Err(ParseError::ChainedComparison { .. })
        ));
    }

    #[test]
    fn test_logical_operands_must_be_boolean_shaped() {
        assert!(matches!(
            parse("5 AND true"),
            Err(ParseError::NonBooleanOperand { .. })
        ));
        assert!(matches!(
            parse("true OR \"x\""),
            Err(ParseError::NonBooleanOperand { .. })
        ));
        assert!(matches!(
            parse("(5) AND true"),
            Err(ParseError::NonBooleanOperand { .. })
        ));
        // Bare variables are late-typed and pass
        assert!(parse("[a] AND [b]").is_ok());
    }

    #[test]
    fn test_bare_literal_root_parses() {
        // Shape-checked at evaluation, not parse (late rejection keeps the
        // root symmetric with bare variables)
        assert!(parse("56.43").is_ok());
        assert!(parse("\"OFF\"").is_ok());
        assert!(parse("[a]").is_ok());
    }

    #[test]
    fn test_rejects_surface_garbage() {
        for input in [
            "",
            "A",
            "[var0] == DEMO",
            "[var0] == 'DEMO'",
            "![var0]",
            "[var0] <> `DEMO`",
            "true true",
            "(true",
            "true)",
            "[foo] in [\"a\",]",
        ] {
            assert!(parse(input).is_err(), "expected parse error for {:?}", input);
        }
    }

    #[test]
    fn test_list_elements_are_literals_only() {
        assert!(parse("[1, 2, 3]").is_ok());
        assert!(parse("[]").is_ok());
        // Mixed kinds are tolerated here and policed at evaluation
        assert!(parse("[1, \"a\"]").is_ok());
        assert!(matches!(
            parse("[true]"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(parse("[[a]]").is_err());
    }

    #[test]
    fn test_from_str() {
        let expr: Expr = "[var0] > 10".parse().expect("parse failed");
        assert_eq!(expr.to_string(), "([var0] > 10)");
    }
}
