// ABOUTME: Single-pass lexer turning condition text into tokens using nom scanners

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{opt, recognize},
    IResult, Parser,
};

use crate::error::ParseError;
use crate::token::{Token, TokenKind};

const IDENT_START: &str = "@_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn is_ident_start(c: char) -> bool {
    c == '@' || c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Scan one variable path segment: `[@A-Za-z_][A-Za-z0-9_]*`
fn ident_segment(input: &str) -> IResult<&str, &str> {
    recognize((
        one_of(IDENT_START),
        take_while(is_ident_char),
    ))
    .parse(input)
}

/// Scan a number: optional leading minus, digits, optional fraction
fn number(input: &str) -> IResult<&str, &str> {
    recognize((opt(char('-')), digit1, opt((char('.'), digit1)))).parse(input)
}

/// Scan a run of ASCII letters (keyword candidate)
fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphabetic())(input)
}

/// Streaming tokenizer over condition text.
///
/// Consumes the input left to right, one token per `next_token` call, so the
/// parser on top only ever needs a single token of lookahead. Offsets
/// reported in errors and tokens are byte offsets into the original input.
pub struct Lexer<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, rest: input }
    }

    fn pos(&self) -> usize {
        self.input.len() - self.rest.len()
    }

    fn take(&mut self, len: usize) -> &'a str {
        let (taken, rest) = self.rest.split_at(len);
        self.rest = rest;
        taken
    }

    /// Produce the next token. Returns `Eof` forever once the input is
    /// exhausted; characters that begin no valid token come back as
    /// `Illegal` for the parser to report.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.rest = self
            .rest
            .trim_start_matches(|c: char| c.is_ascii_whitespace());
        let pos = self.pos();

        let Some(c) = self.rest.chars().next() else {
            return Ok(Token::new(TokenKind::Eof, "", pos));
        };

        match c {
            '(' => Ok(Token::new(TokenKind::LParen, self.take(1), pos)),
            ')' => Ok(Token::new(TokenKind::RParen, self.take(1), pos)),
            ',' => Ok(Token::new(TokenKind::Comma, self.take(1), pos)),
            ']' => Ok(Token::new(TokenKind::RBracket, self.take(1), pos)),
            '[' => self.scan_bracket(pos),
            '"' => self.scan_string(pos),
            '/' => self.scan_regex(pos),
            '=' => Ok(self.scan_operator(pos, TokenKind::Eq, TokenKind::Match)),
            '!' => Ok(self.scan_operator(pos, TokenKind::Neq, TokenKind::NotMatch)),
            '<' => {
                if self.rest.starts_with("<=") {
                    Ok(Token::new(TokenKind::Lte, self.take(2), pos))
                } else {
                    Ok(Token::new(TokenKind::Lt, self.take(1), pos))
                }
            }
            '>' => {
                if self.rest.starts_with(">=") {
                    Ok(Token::new(TokenKind::Gte, self.take(2), pos))
                } else {
                    Ok(Token::new(TokenKind::Gt, self.take(1), pos))
                }
            }
            _ if c.is_ascii_digit() || c == '-' => Ok(self.scan_number(pos)),
            _ if c.is_ascii_alphabetic() => Ok(self.scan_word(pos)),
            _ => Ok(Token::new(
                TokenKind::Illegal,
                self.take(c.len_utf8()),
                pos,
            )),
        }
    }

    /// `=`/`!` followed by `=` or `~`; anything else is illegal on its own
    fn scan_operator(&mut self, pos: usize, eq_kind: TokenKind, tilde_kind: TokenKind) -> Token {
        match self.rest.as_bytes().get(1) {
            Some(b'=') => Token::new(eq_kind, self.take(2), pos),
            Some(b'~') => Token::new(tilde_kind, self.take(2), pos),
            _ => Token::new(TokenKind::Illegal, self.take(1), pos),
        }
    }

    fn scan_number(&mut self, pos: usize) -> Token {
        let result: IResult<&str, &str> = number(self.rest);
        match result {
            Ok((rest, lexeme)) => {
                self.rest = rest;
                Token::new(TokenKind::Number, lexeme, pos)
            }
            // A lone '-' with no digits behind it
            Err(_) => Token::new(TokenKind::Illegal, self.take(1), pos),
        }
    }

    /// Alphabetic run: a case-insensitive keyword, or illegal. `NOT`
    /// immediately followed by `IN` fuses into a single `NotIn` token.
    fn scan_word(&mut self, pos: usize) -> Token {
        let Ok((rest, lexeme)) = word(self.rest) else {
            return Token::new(TokenKind::Illegal, self.take(1), pos);
        };
        self.rest = rest;

        match TokenKind::keyword(&lexeme.to_ascii_uppercase()) {
            Some(TokenKind::Not) => {
                let skipped = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
                if let Ok((after, next)) = word(skipped) {
                    if next.eq_ignore_ascii_case("IN") {
                        self.rest = after;
                        return Token::new(TokenKind::NotIn, "NOT IN", pos);
                    }
                }
                Token::new(TokenKind::Not, lexeme, pos)
            }
            Some(kind) => Token::new(kind, lexeme, pos),
            None => Token::new(TokenKind::Illegal, lexeme, pos),
        }
    }

    /// `[` starting either a variable reference or a list literal.
    ///
    /// Consecutive `[seg]` groups with no separating characters join into a
    /// single dot-joined `Ident` token; a `[` not followed by an identifier
    /// start character opens a list instead.
    fn scan_bracket(&mut self, pos: usize) -> Result<Token, ParseError> {
        if !self.rest[1..].starts_with(is_ident_start) {
            return Ok(Token::new(TokenKind::LBracket, self.take(1), pos));
        }

        let mut path = String::new();
        loop {
            let body = &self.rest[1..];
            let (after_seg, segment) =
                ident_segment(body).map_err(|_| ParseError::MalformedVariable { pos })?;
            let rest = after_seg
                .strip_prefix(']')
                .ok_or(ParseError::MalformedVariable { pos })?;

            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
            self.rest = rest;

            if !(self.rest.starts_with('[') && self.rest[1..].starts_with(is_ident_start)) {
                return Ok(Token::new(TokenKind::Ident, path, pos));
            }
        }
    }

    /// Double-quoted string; backslashes pass through untouched
    fn scan_string(&mut self, pos: usize) -> Result<Token, ParseError> {
        let body = &self.rest[1..];
        let result: IResult<&str, &str> = take_while(|c| c != '"')(body);
        let (rest, content) = result.map_err(|_| ParseError::UnterminatedString { pos })?;
        let rest = rest
            .strip_prefix('"')
            .ok_or(ParseError::UnterminatedString { pos })?;
        self.rest = rest;
        Ok(Token::new(TokenKind::Str, content, pos))
    }

    /// Slash-delimited regex; a backslash escapes the next character during
    /// scanning only, so `\/` does not terminate and both characters stay in
    /// the pattern.
    fn scan_regex(&mut self, pos: usize) -> Result<Token, ParseError> {
        let body = &self.rest[1..];
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '/' => {
                    let pattern = &body[..i];
                    self.rest = &body[i + 1..];
                    return Ok(Token::new(TokenKind::Regex, pattern, pos));
                }
                _ => {}
            }
        }
        Err(ParseError::UnterminatedRegex { pos })
    }
}
