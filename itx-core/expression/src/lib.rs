//! ITX 条件表达式
//!
//! 为重试容器等组件提供布尔条件求值, 例如 `i gt 5`、`k gt= 5`。
//!
//! 支持:
//! - 比较运算: `lt` `lt=` `gt` `gt=` `=`
//! - 逻辑运算: `and` `or` (and 优先)
//! - 括号分组
//! - 操作数: 数字、`true`/`false`、变量名或普通单词

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{ExpressionError, Result};
pub use lexer::{CompareOp, Token};
pub use parser::{evaluate, Expr, Expression, NoVariables, VariableLookup, MAX_NESTING_DEPTH};
