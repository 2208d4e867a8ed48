//! Calculator Tool
//!
//! Evaluates arithmetic expressions with a small recursive-descent parser.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom ('^' unary)?
//! atom   := number | constant | function '(' expr ')' | '(' expr ')'
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use crate::error::{Result, ToolkitError};

/// Longest expression accepted, in characters
const MAX_EXPRESSION_CHARS: usize = 1024;

/// Deepest nesting of parentheses, unary signs and exponents
const MAX_DEPTH: usize = 64;

/// Tool for evaluating math expressions
#[derive(Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "Evaluate a math expression. Supports + - * / % ^, parentheses, \
                          sqrt, abs, ln, log10, exp, sin, cos, tan and the constants pi and e."
                .into(),
            parameters: vec![ParameterSchema::required(
                "expression",
                "string",
                "Expression to evaluate, e.g. 'sqrt(102001)' or '(3 + 4) * 2^3'",
            )],
            category: Some("math".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let expression = args
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let result = evaluate(expression)?;
        tracing::debug!(expression, result, "Evaluated expression");
        Ok(json!(result))
    }
}

/// Evaluate an expression to a finite number
pub fn evaluate(expression: &str) -> Result<f64> {
    if expression.chars().count() > MAX_EXPRESSION_CHARS {
        return Err(ToolkitError::Expression(format!(
            "expression is longer than {} characters",
            MAX_EXPRESSION_CHARS
        )));
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolkitError::Expression("expression is empty".into()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(ToolkitError::Expression(format!("unexpected {}", token)));
    }
    if !value.is_finite() {
        return Err(ToolkitError::Expression(format!(
            "'{}' does not evaluate to a finite number",
            expression.trim()
        )));
    }
    Ok(value)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {}", n),
            Self::Ident(name) => write!(f, "'{}'", name),
            Self::Op(op) => write!(f, "'{}'", op),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation: 1e6, 2.5E-3
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse()
                    .map_err(|_| ToolkitError::Expression(format!("bad number '{}'", literal)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect::<String>().to_lowercase()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                // accept Python-style ** as power
                if c == '*' && chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Op('^'));
                    i += 2;
                } else {
                    tokens.push(Token::Op(c));
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => {
                return Err(ToolkitError::Expression(format!(
                    "invalid character '{}'",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            Some(other) => Err(ToolkitError::Expression(format!("expected ')', found {}", other))),
            None => Err(ToolkitError::Expression("missing ')'".into())),
        }
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(ToolkitError::DivisionByZero),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    /// Every recursive path passes through here, so this bounds the stack
    fn unary(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolkitError::Expression(format!(
                "expression nests deeper than {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let value = match self.eat_op(&['-', '+']) {
            Some('-') => self.unary().map(|v| -v),
            Some(_) => self.unary(),
            None => self.power(),
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.atom()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if let Some(value) = constant(&name) {
                    return Ok(value);
                }
                match self.next() {
                    Some(Token::LParen) => {}
                    _ => return Err(ToolkitError::Expression(format!("unknown name '{}'", name))),
                }
                let arg = self.expr()?;
                self.expect_rparen()?;
                apply(&name, arg)
            }
            Some(other) => Err(ToolkitError::Expression(format!("unexpected {}", other))),
            None => Err(ToolkitError::Expression("unexpected end of expression".into())),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

fn apply(function: &str, arg: f64) -> Result<f64> {
    let value = match function {
        "sqrt" => {
            if arg < 0.0 {
                return Err(ToolkitError::Expression(
                    "square root of a negative number".into(),
                ));
            }
            arg.sqrt()
        }
        "abs" => arg.abs(),
        "ln" => arg.ln(),
        "log" | "log10" => arg.log10(),
        "exp" => arg.exp(),
        "sin" => arg.sin(),
        "cos" => arg.cos(),
        "tan" => arg.tan(),
        other => {
            return Err(ToolkitError::Expression(format!(
                "unknown function '{}'",
                other
            )))
        }
    };
    Ok(value)
}
