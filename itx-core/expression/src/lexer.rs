//! 词法分析
//!
//! 操作符必须以空白或括号分隔, 例如 `i gt 5`、`(k gt= 2) and (k lt 10)`。
//! `=` 可以紧贴操作数书写 (`a=5`)。

use std::fmt;

use crate::error::{ExpressionError, Result};

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `lt`
    Lt,
    /// `lt=`
    Le,
    /// `gt`
    Gt,
    /// `gt=`
    Ge,
    /// `=`
    Eq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Lt => "lt",
            CompareOp::Le => "lt=",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "gt=",
            CompareOp::Eq => "=",
        };
        f.write_str(symbol)
    }
}

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    And,
    Or,
    Compare(CompareOp),
    /// 操作数 (数字、布尔值、变量名或普通单词)
    Operand(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Compare(op) => write!(f, "{}", op),
            Token::Operand(word) => f.write_str(word),
        }
    }
}

/// 带位置信息的词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// 将表达式切分为词法单元
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Spanned {
                    token: Token::LeftParen,
                    position: pos,
                });
                pos += 1;
            }
            ')' => {
                tokens.push(Spanned {
                    token: Token::RightParen,
                    position: pos,
                });
                pos += 1;
            }
            '=' => {
                tokens.push(Spanned {
                    token: Token::Compare(CompareOp::Eq),
                    position: pos,
                });
                pos += 1;
            }
            _ => {
                let start = pos;
                while pos < chars.len()
                    && !chars[pos].is_whitespace()
                    && !matches!(chars[pos], '(' | ')' | '=')
                {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();

                // lt= / gt= 中的 '=' 属于操作符本身
                let has_eq_suffix = pos < chars.len() && chars[pos] == '=';
                let token = match (word.as_str(), has_eq_suffix) {
                    ("lt", true) => {
                        pos += 1;
                        Token::Compare(CompareOp::Le)
                    }
                    ("gt", true) => {
                        pos += 1;
                        Token::Compare(CompareOp::Ge)
                    }
                    ("lt", false) => Token::Compare(CompareOp::Lt),
                    ("gt", false) => Token::Compare(CompareOp::Gt),
                    ("and", _) => Token::And,
                    ("or", _) => Token::Or,
                    _ => Token::Operand(word),
                };

                tokens.push(Spanned {
                    token,
                    position: start,
                });
            }
        }
    }

    if tokens.is_empty() {
        return Err(ExpressionError::EmptyExpression);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple_comparison() {
        assert_eq!(
            kinds("i gt 5"),
            vec![
                Token::Operand("i".to_string()),
                Token::Compare(CompareOp::Gt),
                Token::Operand("5".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_inclusive_operators() {
        assert_eq!(
            kinds("k gt= 5"),
            vec![
                Token::Operand("k".to_string()),
                Token::Compare(CompareOp::Ge),
                Token::Operand("5".to_string()),
            ]
        );
        assert_eq!(kinds("k lt= 5")[1], Token::Compare(CompareOp::Le));
    }

    #[test]
    fn test_tokenize_attached_equals() {
        assert_eq!(
            kinds("a=5"),
            vec![
                Token::Operand("a".to_string()),
                Token::Compare(CompareOp::Eq),
                Token::Operand("5".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_parentheses_and_logic() {
        let tokens = kinds("(i gt 1) and (i lt 4)");
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens[0], Token::LeftParen);
        assert_eq!(tokens[5], Token::And);
        assert_eq!(tokens[10], Token::RightParen);
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = tokenize("i  gt 5").unwrap();
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 3);
        assert_eq!(tokens[2].position, 6);
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(tokenize("   "), Err(ExpressionError::EmptyExpression));
    }
}
