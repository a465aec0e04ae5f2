//! Branch condition language.
//!
//! Conditions are small boolean expressions over the execution context:
//!
//! ```text
//! steps.check.status == 'ok' && !(input.retries >= 3)
//! variables.item.kind != null || input['force-run']
//! ```
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := unary ( "&&" unary )*
//! unary      := "!" unary | comparison
//! comparison := operand ( op operand )?        op: == != === !== < <= > >=
//! operand    := literal | path | "(" or ")"
//! path       := ("input" | "steps" | "variables") ( "." ident | "[" string|int "]" )*
//! ```
//!
//! Anything else (function calls, arithmetic, other identifiers) is a parse
//! error. Definitions compile their conditions at load time so such errors
//! surface before a run starts; at run time a condition that fails to parse
//! evaluates to `false` with a warning.

use std::cmp::Ordering;

use serde_json::Value;

use super::context::{ExecutionContext, CONTEXT_ROOTS};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while compiling a condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unknown identifier '{0}' (expected input, steps or variables)")]
    UnknownIdentifier(String),

    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("unexpected end of expression, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("condition nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("condition is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Cmp(CompareOp),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Dot => "'.'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Not => "'!'".into(),
            Token::And => "'&&'".into(),
            Token::Or => "'||'".into(),
            Token::Cmp(op) => format!("'{}'", op.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::StrictEq => "===",
            CompareOp::StrictNe => "!==",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' | '!' => {
                let strict = chars.get(i + 2) == Some(&'=');
                let op = match (c, next, strict) {
                    ('=', Some('='), true) => Some((CompareOp::StrictEq, 3)),
                    ('=', Some('='), false) => Some((CompareOp::Eq, 2)),
                    ('!', Some('='), true) => Some((CompareOp::StrictNe, 3)),
                    ('!', Some('='), false) => Some((CompareOp::Ne, 2)),
                    _ => None,
                };
                match op {
                    Some((op, width)) => {
                        tokens.push(Token::Cmp(op));
                        i += width;
                    }
                    None if c == '!' => {
                        tokens.push(Token::Not);
                        i += 1;
                    }
                    None => return Err(ExpressionError::UnexpectedChar { ch: c, offset: i }),
                }
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                };
                tokens.push(Token::Cmp(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let start = i;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExpressionError::UnterminatedString(start)),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                value.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == c => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                // After a dot only an integer segment is meaningful (`items.0.name`).
                let after_dot = matches!(tokens.last(), Some(Token::Dot));
                while let Some(&ch) = chars.get(i) {
                    let fractional = !after_dot
                        && ch == '.'
                        && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                    if ch.is_ascii_digit() || fractional {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if is_ident_start(c) => {
                let start = i;
                while chars.get(i).is_some_and(|&ch| is_ident_char(ch)) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExpressionError::UnexpectedChar { ch: other, offset: i }),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST + parser
// ---------------------------------------------------------------------------

/// Compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Segments including the root (`["steps", "fetch", "status"]`).
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Maximum nesting of `(` and `!` in one condition.
pub const MAX_DEPTH: usize = 64;

/// Maximum condition source length in bytes.
pub const MAX_SOURCE_LEN: usize = 4096;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn enter(&mut self) -> Result<(), ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, wanted: Token, expected: &'static str) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(token) if token == wanted => Ok(()),
            Some(token) => Err(ExpressionError::UnexpectedToken {
                found: token.describe(),
                expected,
            }),
            None => Err(ExpressionError::UnexpectedEnd(expected)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_operand()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Expr, ExpressionError> {
        const EXPECTED: &str = "a literal, path or '('";
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or();
                self.depth -= 1;
                let inner = inner?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                root if CONTEXT_ROOTS.contains(&root) => self.parse_path(name),
                _ => Err(ExpressionError::UnknownIdentifier(name)),
            },
            Some(token) => Err(ExpressionError::UnexpectedToken {
                found: token.describe(),
                expected: EXPECTED,
            }),
            None => Err(ExpressionError::UnexpectedEnd(EXPECTED)),
        }
    }

    fn parse_path(&mut self, root: String) -> Result<Expr, ExpressionError> {
        let mut segments = vec![root];
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => segments.push(name),
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                            segments.push((n as u64).to_string())
                        }
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken {
                                found: token.describe(),
                                expected: "a property name",
                            });
                        }
                        None => return Err(ExpressionError::UnexpectedEnd("a property name")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Str(key)) => segments.push(key),
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                            segments.push((n as u64).to_string())
                        }
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken {
                                found: token.describe(),
                                expected: "a string key or array index",
                            });
                        }
                        None => {
                            return Err(ExpressionError::UnexpectedEnd(
                                "a string key or array index",
                            ));
                        }
                    }
                    self.expect(Token::RBracket, "']'")?;
                }
                _ => return Ok(Expr::Path(segments)),
            }
        }
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Compile a condition, rejecting anything outside the grammar.
pub fn compile(source: &str) -> Result<Expr, ExpressionError> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(ExpressionError::TooLong {
            len: source.len(),
            max: MAX_SOURCE_LEN,
        });
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    match parser.advance() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::UnexpectedToken {
            found: token.describe(),
            expected: "end of expression",
        }),
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a compiled expression. Missing paths evaluate to `null`.
pub fn evaluate(expr: &Expr, ctx: &ExecutionContext) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(segments) => ctx.lookup_segments(segments).unwrap_or(Value::Null),
        Expr::Not(inner) => Value::Bool(!truthy(&evaluate(inner, ctx))),
        Expr::And(left, right) => {
            Value::Bool(truthy(&evaluate(left, ctx)) && truthy(&evaluate(right, ctx)))
        }
        Expr::Or(left, right) => {
            Value::Bool(truthy(&evaluate(left, ctx)) || truthy(&evaluate(right, ctx)))
        }
        Expr::Compare { op, left, right } => {
            Value::Bool(compare(*op, &evaluate(left, ctx), &evaluate(right, ctx)))
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Eq | CompareOp::StrictEq => values_equal(left, right),
        CompareOp::Ne | CompareOp::StrictNe => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => {
            matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// JavaScript-style truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// ConditionEvaluator
// ---------------------------------------------------------------------------

/// Evaluates branch conditions, treating compile errors as `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `source` as a boolean. Never fails: a condition that does
    /// not compile logs a warning and yields `false`.
    pub fn evaluate_bool(&self, source: &str, ctx: &ExecutionContext) -> bool {
        match compile(source) {
            Ok(expr) => truthy(&evaluate(&expr, ctx)),
            Err(e) => {
                tracing::warn!(condition = source, error = %e, "condition evaluation failed, treating as false");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({
            "count": 5,
            "name": "ada",
            "flags": { "beta": true },
            "items": [10, 20],
            "force-run": false
        }));
        ctx.set_step_output("fetch-data", json!({ "status": 200, "body": "ok" }));
        ctx.set_variable("item", json!({ "kind": "pdf" }));
        ctx
    }

    fn eval(source: &str) -> bool {
        ConditionEvaluator::new().evaluate_bool(source, &test_context())
    }

    #[test]
    fn comparisons() {
        assert!(eval("input.count == 5"));
        assert!(eval("input.count === 5.0"));
        assert!(eval("input.count > 4 && input.count <= 5"));
        assert!(eval("input.name != 'bob'"));
        assert!(eval("input.name !== \"bob\""));
        assert!(eval("input.name < 'b'"));
        assert!(!eval("input.count > 'a'"));
    }

    #[test]
    fn paths_with_hyphens_brackets_and_indices() {
        assert!(eval("steps.fetch-data.status == 200"));
        assert!(eval("steps['fetch-data'].body == 'ok'"));
        assert!(eval("input.items[1] == 20"));
        assert!(eval("input.items.0 == 10"));
        assert!(eval("variables.item.kind == 'pdf'"));
    }

    #[test]
    fn logic_and_precedence() {
        assert!(eval("false || input.flags.beta && true"));
        assert!(!eval("!(input.count == 5)"));
        assert!(eval("!input['force-run']"));
        assert!(eval("(input.count == 1 || input.count == 5) && !false"));
    }

    #[test]
    fn missing_paths_are_null() {
        assert!(eval("input.missing == null"));
        assert!(!eval("steps.never.ran"));
        assert!(eval("variables.index === undefined"));
    }

    #[test]
    fn bare_operands_use_truthiness() {
        assert!(eval("input.name"));
        assert!(eval("input.items"));
        assert!(!eval("0"));
        assert!(!eval("''"));
    }

    #[test]
    fn rejects_code_outside_grammar() {
        for source in [
            "process.exit()",
            "input.count + 1 > 2",
            "input.count = 5",
            "env.HOME == 'x'",
            "input.count ==",
            "(input.count == 5",
            "input.name == 'unterminated",
            "input.count == 5 5",
            "",
        ] {
            assert!(compile(source).is_err(), "expected '{source}' to be rejected");
        }
    }

    #[test]
    fn compile_errors_evaluate_false() {
        assert!(!eval("require('fs')"));
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(
            compile("env.HOME").unwrap_err(),
            ExpressionError::UnknownIdentifier("env".into())
        );
        assert!(matches!(
            compile("input.a # 1").unwrap_err(),
            ExpressionError::UnexpectedChar { ch: '#', .. }
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |depth: usize| format!("{}true{}", "(".repeat(depth), ")".repeat(depth));
        assert!(compile(&nested(MAX_DEPTH)).is_ok());
        assert_eq!(
            compile(&nested(MAX_DEPTH + 1)).unwrap_err(),
            ExpressionError::TooDeep(MAX_DEPTH)
        );
        assert_eq!(
            compile(&format!("{}true", "!".repeat(MAX_DEPTH + 1))).unwrap_err(),
            ExpressionError::TooDeep(MAX_DEPTH)
        );
        assert!(compile(&format!("{}input.count", "!(".repeat(40))).is_err());
    }

    #[test]
    fn oversized_conditions_are_rejected_without_recursing() {
        let deep = format!("{}true{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            compile(&deep).unwrap_err(),
            ExpressionError::TooLong { len: 20_004, .. }
        ));
        assert!(!eval(&deep));
        assert!(!eval(&"!".repeat(200_000)));
    }
}
