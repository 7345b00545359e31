//! Boolean filter language for selecting documents.
//!
//! Feeds, queries and plugins select documents with short expressions:
//!
//! ```text
//! published == true and 'rust' in tags
//! draft != true and (date >= 2024-01-01 or series == "notes")
//! not private
//! ```
//!
//! # Grammar
//!
//! Lowest to highest precedence:
//!
//! ```text
//! expr      := and_expr ( "or" and_expr )*
//! and_expr  := not_expr ( "and" not_expr )*
//! not_expr  := "not" not_expr | predicate
//! predicate := "(" expr ")"
//!            | operand ( cmp_op operand | "in" operand | "not" "in" operand )?
//! cmp_op    := "==" | "!=" | "<" | "<=" | ">" | ">="
//! operand   := field | 'string' | "string" | integer | YYYY-MM-DD | true | false | today
//! ```
//!
//! `and` binds tighter than `or`, so `a or b and c` reads as `a or (b and c)`.
//! Keywords are case-insensitive (`True`, `AND` work). A bare operand is a
//! truthiness test. An empty expression matches every document.
//!
//! # Field resolution
//!
//! A name resolves to a built-in document field or, failing that, to a key of
//! the document's extension map. A name found in neither is *unknown*, and so
//! is any comparison it appears in, whatever the operator (`!=` and `not in`
//! included). Unknown stays unknown through `not`; `and`/`or` follow
//! three-valued logic (`false and unknown` is false, `true or unknown` is
//! true, anything else involving unknown is unknown). A document whose whole
//! expression is unknown does not match, so `not missing == 'x'` selects
//! nothing. [`Filter::matches_strict`] turns unknown names into
//! [`FilterError::UnknownField`] instead.
//!
//! `today` is resolved once, when the expression is parsed.

use crate::document::{Document, Value, parse_date};
use chrono::NaiveDate;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("Invalid date literal '{0}'")]
    InvalidDate(String),
    #[error("Expected {expected} at position {pos}, found '{found}'")]
    UnexpectedToken {
        pos: usize,
        found: String,
        expected: &'static str,
    },
    #[error("Unexpected end of expression, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Literal(value) => value.to_string(),
            Token::Cmp(op) => op.as_str().to_string(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Not => "not".into(),
            Token::In => "in".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn tokenize(src: &str, today: NaiveDate) -> Result<Vec<(usize, Token)>, FilterError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '=' | '!' | '<' | '>' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, next_is_eq) {
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', true) => CmpOp::Le,
                    ('>', true) => CmpOp::Ge,
                    ('<', false) => CmpOp::Lt,
                    ('>', false) => CmpOp::Gt,
                    _ => return Err(FilterError::UnexpectedChar { pos: i, ch: c }),
                };
                i += if next_is_eq { 2 } else { 1 };
                Token::Cmp(op)
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(FilterError::UnterminatedString(start)),
                        Some('\\') if chars.get(i + 1).is_some() => {
                            text.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                Token::Literal(Value::Str(text))
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '-') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text[1..].contains('-') {
                    let date = parse_date(&text)
                        .filter(|_| text.len() == 10)
                        .ok_or_else(|| FilterError::InvalidDate(text.clone()))?;
                    Token::Literal(Value::Date(date))
                } else {
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| FilterError::UnexpectedChar { pos: start, ch: c })?;
                    Token::Literal(Value::Int(n))
                }
            }
            c if is_ident_start(c) => {
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "today" => Token::Literal(Value::Date(today)),
                    _ => Token::Ident(word),
                }
            }
            _ => return Err(FilterError::UnexpectedChar { pos: i, ch: c }),
        };
        tokens.push((start, token));
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CmpOp, Operand),
    In {
        needle: Operand,
        haystack: Operand,
        negated: bool,
    },
    Truthy(Operand),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, FilterError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, FilterError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect_rparen()?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.parse_operand()?;
                Ok(Expr::Compare(left, op, right))
            }
            Some(Token::In) => {
                self.pos += 1;
                let haystack = self.parse_operand()?;
                Ok(Expr::In {
                    needle: left,
                    haystack,
                    negated: false,
                })
            }
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.pos += 2;
                let haystack = self.parse_operand()?;
                Ok(Expr::In {
                    needle: left,
                    haystack,
                    negated: true,
                })
            }
            _ => Ok(Expr::Truthy(left)),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        match self.advance() {
            Some((_, Token::Ident(name))) => Ok(Operand::Field(name)),
            Some((_, Token::Literal(value))) => Ok(Operand::Literal(value)),
            Some((pos, other)) => Err(FilterError::UnexpectedToken {
                pos,
                found: other.describe(),
                expected: "a field or literal",
            }),
            None => Err(FilterError::UnexpectedEnd("a field or literal")),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), FilterError> {
        match self.advance() {
            Some((_, Token::RParen)) => Ok(()),
            Some((pos, other)) => Err(FilterError::UnexpectedToken {
                pos,
                found: other.describe(),
                expected: "')'",
            }),
            None => Err(FilterError::UnexpectedEnd("')'")),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    expr: Option<Expr>,
}

impl Filter {
    /// Parse an expression, resolving `today` against the local clock.
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        Self::parse_with_today(source, chrono::Local::now().date_naive())
    }

    /// Parse with an explicit value for `today`.
    pub fn parse_with_today(source: &str, today: NaiveDate) -> Result<Self, FilterError> {
        let tokens = tokenize(source, today)?;
        if tokens.is_empty() {
            return Ok(Self {
                source: source.to_string(),
                expr: None,
            });
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some((pos, tok)) = parser.advance() {
            return Err(FilterError::UnexpectedToken {
                pos,
                found: tok.describe(),
                expected: "'and', 'or' or end of expression",
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr: Some(expr),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the document matches. Unknown fields are non-matches.
    pub fn matches(&self, doc: &Document) -> bool {
        match &self.expr {
            None => true,
            Some(expr) => eval(expr, doc, false).ok().flatten().unwrap_or(false),
        }
    }

    /// Like [`Filter::matches`] but unknown fields are an error.
    pub fn matches_strict(&self, doc: &Document) -> Result<bool, FilterError> {
        match &self.expr {
            None => Ok(true),
            Some(expr) => Ok(eval(expr, doc, true)?.unwrap_or(false)),
        }
    }
}

/// `Ok(None)` stands for an unknown field in lenient mode.
fn resolve(operand: &Operand, doc: &Document, strict: bool) -> Result<Option<Value>, FilterError> {
    match operand {
        Operand::Literal(value) => Ok(Some(value.clone())),
        Operand::Field(name) => match doc.field(name) {
            Some(value) => Ok(Some(value)),
            None if strict => Err(FilterError::UnknownField(name.clone())),
            None => Ok(None),
        },
    }
}

/// `Ok(None)` is an unknown result: some field it depends on is unknown.
fn eval(expr: &Expr, doc: &Document, strict: bool) -> Result<Option<bool>, FilterError> {
    Ok(Some(match expr {
        Expr::Or(a, b) => {
            let left = eval(a, doc, strict)?;
            if left == Some(true) {
                return Ok(left);
            }
            return Ok(match (left, eval(b, doc, strict)?) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            });
        }
        Expr::And(a, b) => {
            let left = eval(a, doc, strict)?;
            if left == Some(false) {
                return Ok(left);
            }
            return Ok(match (left, eval(b, doc, strict)?) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            });
        }
        Expr::Not(inner) => return Ok(eval(inner, doc, strict)?.map(|b| !b)),
        Expr::Truthy(operand) => match resolve(operand, doc, strict)? {
            Some(v) => truthy(&v),
            None => return Ok(None),
        },
        Expr::Compare(left, op, right) => {
            let (Some(l), Some(r)) = (resolve(left, doc, strict)?, resolve(right, doc, strict)?)
            else {
                return Ok(None);
            };
            match op {
                CmpOp::Eq => values_equal(&l, &r),
                CmpOp::Ne => !values_equal(&l, &r),
                CmpOp::Lt => compare(&l, &r) == Some(Ordering::Less),
                CmpOp::Le => matches!(compare(&l, &r), Some(Ordering::Less | Ordering::Equal)),
                CmpOp::Gt => compare(&l, &r) == Some(Ordering::Greater),
                CmpOp::Ge => matches!(compare(&l, &r), Some(Ordering::Greater | Ordering::Equal)),
            }
        }
        Expr::In {
            needle,
            haystack,
            negated,
        } => {
            let (Some(n), Some(h)) = (resolve(needle, doc, strict)?, resolve(haystack, doc, strict)?)
            else {
                return Ok(None);
            };
            contains(&h, &n) != *negated
        }
    }))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Date(_) => true,
        Value::List(items) => !items.is_empty(),
    }
}

/// Equality with the coercions the language promises: dates compare with
/// date-shaped strings, integers with floats.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Date(d), Value::Str(s)) | (Value::Str(s), Value::Date(d)) => {
            parse_date(s).is_some_and(|parsed| parsed == *d)
        }
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q))
        }
        _ => compare(a, b) == Some(Ordering::Equal) || a == b,
    }
}

/// Ordering between comparable values; `None` when the kinds don't mix.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Str(s)) => parse_date(s).map(|y| x.cmp(&y)),
        (Value::Str(s), Value::Date(y)) => parse_date(s).map(|x| x.cmp(y)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::List(items), needle) => items.iter().any(|item| values_equal(item, needle)),
        (Value::Str(text), Value::Str(part)) => text.contains(part.as_str()),
        _ => false,
    }
}

// ============================================================================
// Filter / sort / map over document slices
// ============================================================================

/// Documents matching `expression`, in their original order.
///
/// A syntax error is returned before any document is evaluated, so no
/// partial result ever escapes.
pub fn filter_documents(docs: &[Document], expression: &str) -> Result<Vec<Document>, FilterError> {
    let filter = Filter::parse(expression)?;
    Ok(docs.iter().filter(|d| filter.matches(d)).cloned().collect())
}

/// Strict-mode variant of [`filter_documents`].
pub fn filter_documents_strict(
    docs: &[Document],
    expression: &str,
) -> Result<Vec<Document>, FilterError> {
    let filter = Filter::parse(expression)?;
    let mut matched = Vec::new();
    for doc in docs {
        if filter.matches_strict(doc)? {
            matched.push(doc.clone());
        }
    }
    Ok(matched)
}

/// Stable sort on a field; ties keep their current relative order in both
/// directions. An empty field name leaves the order untouched. Documents
/// lacking the field sort as null (first ascending, last descending).
pub fn sort_documents(docs: &mut Vec<Document>, field: &str, reverse: bool) {
    if field.trim().is_empty() {
        return;
    }
    let mut keyed: Vec<(Value, Document)> = docs
        .drain(..)
        .map(|d| (d.field(field).unwrap_or(Value::Null), d))
        .collect();
    if reverse {
        keyed.sort_by(|a, b| b.0.sort_cmp(&a.0));
    } else {
        keyed.sort_by(|a, b| a.0.sort_cmp(&b.0));
    }
    docs.extend(keyed.into_iter().map(|(_, d)| d));
}

/// Filter, stable-sort, then project every match onto `field`.
///
/// Missing values project to [`Value::Null`] so the output lines up with the
/// selected documents one-to-one.
pub fn map_documents(
    docs: &[Document],
    field: &str,
    filter: &str,
    sort: &str,
    reverse: bool,
) -> Result<Vec<Value>, FilterError> {
    let mut selected = filter_documents(docs, filter)?;
    sort_documents(&mut selected, sort, reverse);
    Ok(selected
        .iter()
        .map(|d| d.field(field).unwrap_or(Value::Null))
        .collect())
}
