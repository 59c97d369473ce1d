//! Lexer for the expression language.
//!
//! Converts source text into tokens using the logos lexer generator.
//! Template literals are kept as raw text here; the parser splits them into
//! literal runs and `${}` holes.

use std::fmt;
use std::ops::Range;

use logos::Logos;

/// A token with its byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Range<usize>,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Range<usize>) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    InvalidEscape,
    InvalidNumber,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::InvalidEscape => write!(f, "invalid escape sequence"),
            LexerError::InvalidNumber => write!(f, "invalid number"),
        }
    }
}

/// Numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Expression tokens.
///
/// Multi-character operators are listed before their prefixes; logos picks
/// the longest match either way.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════
    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[token("undefined")]
    Undefined,

    // ═══════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════
    #[token("=>")]
    Arrow,

    #[token("===")]
    StrictEq,

    #[token("!==")]
    StrictNotEq,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LtEq,

    #[token(">=")]
    GtEq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("??")]
    Nullish,

    #[token("**")]
    StarStar,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("?")]
    Question,

    #[token(":")]
    Colon,

    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", lex_number)]
    Number(Number),

    #[regex(r#""([^"\\]|\\.)*""#, lex_string)]
    #[regex(r"'([^'\\]|\\.)*'", lex_string)]
    Str(String),

    /// Raw text between backticks, escapes untouched.
    #[regex(r"`([^`\\]|\\.)*`", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Template(String),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(Number::Int(i)) => write!(f, "{i}"),
            Token::Number(Number::Float(n)) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Template(s) => write!(f, "`{s}`"),
            Token::Ident(s) => write!(f, "{s}"),
            other => write!(f, "{}", punctuation(other)),
        }
    }
}

fn punctuation(token: &Token) -> &'static str {
    match token {
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::Undefined => "undefined",
        Token::Arrow => "=>",
        Token::StrictEq => "===",
        Token::StrictNotEq => "!==",
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::LtEq => "<=",
        Token::GtEq => ">=",
        Token::Lt => "<",
        Token::Gt => ">",
        Token::And => "&&",
        Token::Or => "||",
        Token::Nullish => "??",
        Token::StarStar => "**",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::Question => "?",
        Token::Colon => ":",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Number(_) | Token::Str(_) | Token::Template(_) | Token::Ident(_) => "literal",
    }
}

fn lex_number(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let s = lex.slice();
    if !s.contains(['.', 'e', 'E']) {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
    }
    s.parse::<f64>()
        .map(Number::Float)
        .map_err(|_| LexerError::InvalidNumber)
}

fn lex_string(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

/// Process backslash escapes.
pub(crate) fn unescape(raw: &str) -> Result<String, LexerError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err(LexerError::InvalidEscape);
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).map_err(|_| LexerError::InvalidEscape)?;
                out.push(char::from_u32(code).ok_or(LexerError::InvalidEscape)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Tokenize `source`, stopping at the first error.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Spanned<LexerError>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(err) => return Err(Spanned::new(err, span)),
        }
    }
    Ok(tokens)
}
