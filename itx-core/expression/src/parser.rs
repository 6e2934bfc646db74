//! 语法分析与求值
//!
//! 文法 (优先级由低到高):
//!
//! ```text
//! or_expr  := and_expr ("or" and_expr)*
//! and_expr := compare ("and" compare)*
//! compare  := primary (op primary)?
//! primary  := "(" or_expr ")" | operand
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{ExpressionError, Result};
use crate::lexer::{tokenize, CompareOp, Spanned, Token};

/// 括号最大嵌套层数
pub const MAX_NESTING_DEPTH: usize = 64;

/// 变量查找
///
/// 操作数若能查到同名变量则使用变量值, 否则按字面量处理。
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

impl<F> VariableLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, name: &str) -> Option<String> {
        self(name)
    }
}

impl VariableLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// 不提供任何变量的查找器
pub struct NoVariables;

impl VariableLookup for NoVariables {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

/// 语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Operand(String),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// 求值过程中的值
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    fn parse(raw: &str) -> Self {
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw
                .parse::<f64>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// 已解析的布尔表达式, 可针对不同变量集合重复求值
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// 解析表达式
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;

        if let Some(extra) = parser.peek() {
            return Err(match extra.token {
                Token::RightParen => ExpressionError::UnbalancedParenthesis(extra.position),
                _ => ExpressionError::UnexpectedToken {
                    token: extra.token.to_string(),
                    position: extra.position,
                },
            });
        }

        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// 原始表达式文本
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 语法树
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// 求值
    pub fn evaluate(&self, lookup: &dyn VariableLookup) -> Result<bool> {
        let result = as_bool(eval(&self.root, lookup)?)?;
        debug!("表达式 '{}' 求值结果: {}", self.source, result);
        Ok(result)
    }
}

/// 解析并求值表达式
pub fn evaluate(expression: &str, lookup: &dyn VariableLookup) -> Result<bool> {
    Expression::parse(expression)?.evaluate(lookup)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek().map(|s| &s.token), Some(Token::Or)) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_compare()?;
        while matches!(self.peek().map(|s| &s.token), Some(Token::And)) {
            self.pos += 1;
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;
        if let Some(Token::Compare(op)) = self.peek().map(|s| s.token.clone()) {
            self.pos += 1;
            let right = self.parse_primary()?;
            return Ok(Expr::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let spanned = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match spanned.token {
            Token::LeftParen => {
                if self.depth >= MAX_NESTING_DEPTH {
                    return Err(ExpressionError::NestingTooDeep(MAX_NESTING_DEPTH));
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Spanned {
                        token: Token::RightParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(ExpressionError::UnbalancedParenthesis(spanned.position)),
                }
            }
            Token::Operand(word) => Ok(Expr::Operand(word)),
            other => Err(ExpressionError::UnexpectedToken {
                token: other.to_string(),
                position: spanned.position,
            }),
        }
    }
}

fn eval(expr: &Expr, lookup: &dyn VariableLookup) -> Result<Value> {
    match expr {
        Expr::Operand(word) => Ok(match lookup.lookup(word) {
            Some(value) => Value::parse(&value),
            None => Value::parse(word),
        }),
        Expr::And(left, right) => {
            // 短路求值
            if !as_bool(eval(left, lookup)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(eval(right, lookup)?)?))
        }
        Expr::Or(left, right) => {
            if as_bool(eval(left, lookup)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(eval(right, lookup)?)?))
        }
        Expr::Compare { left, op, right } => {
            let left = eval(left, lookup)?;
            let right = eval(right, lookup)?;
            compare(&left, *op, &right).map(Value::Bool)
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(match op {
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
            CompareOp::Eq => l == r,
        }),
        _ if op == CompareOp::Eq => Ok(left.to_string() == right.to_string()),
        _ => Err(ExpressionError::TypeMismatch {
            left: left.to_string(),
            operator: op.to_string(),
            right: right.to_string(),
        }),
    }
}

fn as_bool(value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExpressionError::NotBoolean(other.to_string())),
    }
}
