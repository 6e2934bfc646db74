//! Expression 模块测试

use std::collections::HashMap;

use itx_expression::*;

#[test]
fn test_repeat_condition_with_index_variable() {
    let expression = Expression::parse("i gt 5").unwrap();

    let mut vars = HashMap::new();
    for index in 1..=5 {
        vars.insert("i".to_string(), index.to_string());
        assert!(!expression.evaluate(&vars).unwrap());
    }

    vars.insert("i".to_string(), "6".to_string());
    assert!(expression.evaluate(&vars).unwrap());
}

#[test]
fn test_custom_index_name() {
    let mut vars = HashMap::new();
    vars.insert("k".to_string(), "5".to_string());
    assert!(evaluate("k gt= 5", &vars).unwrap());
    assert!(!evaluate("k gt 5", &vars).unwrap());
}

#[test]
fn test_nested_groups() {
    let mut vars = HashMap::new();
    vars.insert("a".to_string(), "1".to_string());
    vars.insert("b".to_string(), "10".to_string());

    assert!(evaluate("((a lt 2) and (b gt 5)) or false", &vars).unwrap());
    assert!(!evaluate("(a gt 2) or ((b lt 5) and true)", &vars).unwrap());
}

#[test]
fn test_unknown_words_are_literals() {
    assert!(evaluate("foo = foo", &NoVariables).unwrap());
    assert!(!evaluate("foo = bar", &NoVariables).unwrap());
}

#[test]
fn test_error_display() {
    let err = evaluate("", &NoVariables).unwrap_err();
    assert_eq!(err, ExpressionError::EmptyExpression);
    assert!(err.to_string().contains("表达式为空"));

    let err = evaluate("x lt y", &NoVariables).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("x"));
    assert!(message.contains("lt"));
}

#[test]
fn test_expression_tree_shape() {
    let expression = Expression::parse("a = 1 or b = 2").unwrap();
    assert!(matches!(expression.root(), Expr::Or(_, _)));
}
