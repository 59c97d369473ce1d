//! Recursive descent parser for stage expressions.
//!
//! Supports:
//! - Literals: numbers, strings, template strings, `true`, `false`, `null`
//! - Arrays and object literals (identifier, string or number keys; shorthand)
//! - Arrow functions: `x => x * 2`, `(acc, x) => acc + x`
//! - Member access, indexing and calls: `x.name`, `x[0]`, `x.split(',')`
//! - Conditional: `a ? b : c`
//! - Operators, lowest precedence first:
//!   `??`, `||`, `&&`, equality, relational, `+ -`, `* / %`, `**`, unary `! - +`
//!
//! Does NOT support:
//! - Statements, assignment, `let`/`const`, block-bodied arrows
//! - Optional chaining, spread, regular expression literals

use std::sync::Arc;

use flowsh_types::Value;
use thiserror::Error;

use crate::ast::{BinaryOp, Expr, Lambda, LogicalOp, TemplatePart, UnaryOp};
use crate::lexer::{tokenize, unescape, Number, Spanned, Token};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Parse a complete expression. Trailing tokens are an error.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source).map_err(|e| ParseError::new(e.token.to_string(), e.span.start))?;
    if tokens.is_empty() {
        return Err(ParseError::new("empty expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let expr = parser.expression()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(ParseError::new(
            format!("unexpected '{}'", extra.token),
            extra.span.start,
        )),
    }
}

/// Parse the body of a template string: literal text with `${expr}` holes.
pub fn parse_template(text: &str) -> Result<Vec<TemplatePart>, ParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        if c == '$' && text[pos + 1..].starts_with('{') {
            let start = pos + 2;
            let end = closing_brace(text, start)
                .ok_or_else(|| ParseError::new("unterminated '${' in template", pos))?;
            if !literal.is_empty() {
                parts.push(TemplatePart::Text(flush(&mut literal, pos)?));
            }
            let inner = parse_expression(&text[start..end])
                .map_err(|e| ParseError::new(e.message, start + e.offset))?;
            parts.push(TemplatePart::Expr(inner));
            pos = end + 1;
            continue;
        }
        if c == '\\' {
            // keep the escape pair together so `\${` stays literal
            literal.push(c);
            pos += 1;
            if let Some(next) = text[pos..].chars().next() {
                literal.push(next);
                pos += next.len_utf8();
            }
            continue;
        }
        literal.push(c);
        pos += c.len_utf8();
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Text(flush(&mut literal, pos)?));
    }
    Ok(parts)
}

fn flush(literal: &mut String, offset: usize) -> Result<String, ParseError> {
    let text = unescape(literal).map_err(|e| ParseError::new(e.to_string(), offset))?;
    literal.clear();
    Ok(text)
}

/// Byte offset of the `}` closing a hole opened just before `start`.
fn closing_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Binding power for infix tokens, higher binds tighter.
fn infix(token: &Token) -> Option<(u8, Infix)> {
    use BinaryOp::*;
    Some(match token {
        Token::Nullish => (1, Infix::Logical(LogicalOp::Nullish)),
        Token::Or => (2, Infix::Logical(LogicalOp::Or)),
        Token::And => (3, Infix::Logical(LogicalOp::And)),
        Token::EqEq => (4, Infix::Binary(Eq)),
        Token::NotEq => (4, Infix::Binary(NotEq)),
        Token::StrictEq => (4, Infix::Binary(StrictEq)),
        Token::StrictNotEq => (4, Infix::Binary(StrictNotEq)),
        Token::Lt => (5, Infix::Binary(Lt)),
        Token::LtEq => (5, Infix::Binary(LtEq)),
        Token::Gt => (5, Infix::Binary(Gt)),
        Token::GtEq => (5, Infix::Binary(GtEq)),
        Token::Plus => (6, Infix::Binary(Add)),
        Token::Minus => (6, Infix::Binary(Sub)),
        Token::Star => (7, Infix::Binary(Mul)),
        Token::Slash => (7, Infix::Binary(Div)),
        Token::Percent => (7, Infix::Binary(Rem)),
        Token::StarStar => (8, Infix::Binary(Pow)),
        _ => return None,
    })
}

struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.span.start)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{token}'")))
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(format!("{context}, found '{token}'"), self.offset()),
            None => ParseError::new(format!("{context}, found end of input"), self.offset()),
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.at_arrow() {
            return self.arrow();
        }
        self.conditional()
    }

    /// Lookahead for `ident =>` or `( ident, ... ) =>`.
    fn at_arrow(&self) -> bool {
        match self.peek() {
            Some(Token::Ident(_)) => self.peek_at(1) == Some(&Token::Arrow),
            Some(Token::LParen) => {
                let mut i = 1;
                loop {
                    match self.peek_at(i) {
                        Some(Token::RParen) => return self.peek_at(i + 1) == Some(&Token::Arrow),
                        Some(Token::Ident(_)) => match self.peek_at(i + 1) {
                            Some(Token::Comma) => i += 2,
                            Some(Token::RParen) => i += 1,
                            _ => return false,
                        },
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr, ParseError> {
        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            while let Some(Token::Ident(name)) = self.peek().cloned() {
                self.pos += 1;
                params.push(name);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        } else if let Some(Token::Ident(name)) = self.advance() {
            params.push(name);
        }
        self.expect(Token::Arrow)?;
        let body = self.expression()?;
        Ok(Expr::Arrow(Arc::new(Lambda { params, body })))
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(Token::Colon)?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_power: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while let Some((power, op)) = self.peek().and_then(infix) {
            if power < min_power {
                break;
            }
            self.pos += 1;
            // `**` is right associative
            let next = if matches!(op, Infix::Binary(BinaryOp::Pow)) {
                power
            } else {
                power + 1
            };
            let right = Box::new(self.binary(next)?);
            let lhs = Box::new(left);
            left = match op {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: lhs,
                    right,
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: lhs,
                    right,
                },
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let property = match self.peek() {
                        Some(Token::Ident(name)) => name.clone(),
                        Some(
                            keyword @ (Token::True | Token::False | Token::Null | Token::Undefined),
                        ) => keyword.to_string(),
                        _ => return Err(self.unexpected("expected property name")),
                    };
                    self.pos += 1;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.list(Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed.
    fn list(&mut self, close: Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(ParseError::new("unexpected end of expression", offset));
        };
        match token {
            Token::Number(Number::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Token::Number(Number::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null | Token::Undefined => Ok(Expr::Literal(Value::Null)),
            Token::Template(raw) => parse_template(&raw)
                .map(Expr::Template)
                .map_err(|e| ParseError::new(e.message, offset + 1 + e.offset)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.list(Token::RBracket).map(Expr::Array),
            Token::LBrace => self.object(),
            other => Err(ParseError::new(format!("unexpected '{other}'"), offset)),
        }
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key_offset = self.offset();
            let (key, shorthand) = match self.advance() {
                Some(Token::Ident(name)) => (name, true),
                Some(Token::Str(s)) => (s, false),
                Some(Token::Number(Number::Int(i))) => (i.to_string(), false),
                Some(Token::Number(Number::Float(f))) => (flowsh_types::format_number(f), false),
                Some(other) => {
                    return Err(ParseError::new(
                        format!("unexpected '{other}' in object literal"),
                        key_offset,
                    ))
                }
                None => return Err(ParseError::new("unterminated object literal", key_offset)),
            };
            let value = if self.eat(&Token::Colon) {
                self.expression()?
            } else if shorthand {
                Expr::Ident(key.clone())
            } else {
                return Err(self.unexpected("expected ':'"));
            };
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}
