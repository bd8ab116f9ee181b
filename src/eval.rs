// ABOUTME: Evaluator walking expression trees against a variable environment

use crate::env::Environment;
use crate::error::EvalError;
use crate::expr::{CmpOp, Expr};
use crate::value::Value;

/// Evaluate a parsed condition against an environment.
///
/// Pure given the environment snapshot: the same tree and bindings always
/// produce the same result or the same error kind. AND/OR short-circuit, so
/// errors in a skipped branch are never constructed.
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<bool, EvalError> {
    match eval_expr(expr, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NonBooleanCondition {
            actual: other.type_name().to_string(),
        }),
    }
}

fn eval_expr(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Var(path) => env
            .get(path)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(path.clone())),
        Expr::Regex(_) => Err(EvalError::invalid_operand(
            "regex",
            "a regex literal is not a value",
        )),
        Expr::List(items) => eval_list_literal(items, env),

        Expr::And(l, r) => {
            if !eval_bool(l, env, "AND", "left")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_bool(r, env, "AND", "right")?))
        }
        Expr::Or(l, r) => {
            if eval_bool(l, env, "OR", "left")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_bool(r, env, "OR", "right")?))
        }
        Expr::Xor(l, r) => {
            let a = eval_bool(l, env, "XOR", "left")?;
            let b = eval_bool(r, env, "XOR", "right")?;
            Ok(Value::Bool(a != b))
        }
        Expr::Nand(l, r) => {
            let a = eval_bool(l, env, "NAND", "left")?;
            let b = eval_bool(r, env, "NAND", "right")?;
            Ok(Value::Bool(!(a && b)))
        }

        Expr::Cmp(op, l, r) => {
            let lhs = eval_expr(l, env)?;
            let rhs = eval_expr(r, env)?;
            eval_cmp(*op, &lhs, &rhs).map(Value::Bool)
        }
        Expr::In(l, r) => eval_in(l, r, env, "IN").map(Value::Bool),
        Expr::NotIn(l, r) => eval_in(l, r, env, "NOT IN").map(|found| Value::Bool(!found)),
        Expr::Has(l, r) => eval_has(l, r, env).map(Value::Bool),
        Expr::Intersects(l, r) => eval_intersects(l, r, env).map(Value::Bool),
        Expr::Match(l, r) => eval_match(l, r, env, "=~").map(Value::Bool),
        Expr::NotMatch(l, r) => eval_match(l, r, env, "!~").map(|m| Value::Bool(!m)),
    }
}

/// Evaluate an operand that must produce a boolean (logical operators)
fn eval_bool(
    expr: &Expr,
    env: &Environment,
    op: &str,
    side: &str,
) -> Result<bool, EvalError> {
    match eval_expr(expr, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::invalid_operand(
            op,
            format!(
                "{} side evaluates to {}, expected a boolean",
                side,
                other.type_name()
            ),
        )),
    }
}

/// A list literal collapses to a homogeneous list value; mixed element
/// kinds only surface when the list is used as a value in its own right
fn eval_list_literal(items: &[Expr], env: &Environment) -> Result<Value, EvalError> {
    let values = eval_elements(items, env)?;
    if values.iter().all(|v| matches!(v, Value::String(_))) {
        Ok(Value::StringList(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ))
    } else if values.iter().all(|v| matches!(v, Value::Number(_))) {
        Ok(Value::NumberList(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Number(n) => Some(n),
                    _ => None,
                })
                .collect(),
        ))
    } else {
        Err(EvalError::invalid_operand(
            "list",
            "elements must be all strings or all numbers",
        ))
    }
}

fn eval_elements(items: &[Expr], env: &Environment) -> Result<Vec<Value>, EvalError> {
    items.iter().map(|item| eval_expr(item, env)).collect()
}

fn eval_cmp(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => scalar_equal(op, lhs, rhs),
        CmpOp::Neq => scalar_equal(op, lhs, rhs).map(|equal| !equal),
        CmpOp::Lt => numeric(op, lhs, rhs, |a, b| a < b),
        CmpOp::Lte => numeric(op, lhs, rhs, |a, b| a <= b),
        CmpOp::Gt => numeric(op, lhs, rhs, |a, b| a > b),
        CmpOp::Gte => numeric(op, lhs, rhs, |a, b| a >= b),
    }
}

/// Equality is defined between same-kind scalars only
fn scalar_equal(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        _ => Err(EvalError::type_mismatch(op.symbol(), lhs, rhs)),
    }
}

/// Ordering is defined for numbers only
fn numeric(
    op: CmpOp,
    lhs: &Value,
    rhs: &Value,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(cmp(*a, *b)),
        _ => Err(EvalError::type_mismatch(op.symbol(), lhs, rhs)),
    }
}

/// Membership for IN / NOT IN: a scalar needle against a list operand whose
/// elements must all share the needle's kind
fn eval_in(
    needle_expr: &Expr,
    list_expr: &Expr,
    env: &Environment,
    op: &str,
) -> Result<bool, EvalError> {
    let needle = eval_expr(needle_expr, env)?;
    if needle.is_list() {
        return Err(EvalError::invalid_operand(
            op,
            format!(
                "left side evaluates to {}, expected a scalar",
                needle.type_name()
            ),
        ));
    }

    let elements = eval_list_operand(list_expr, env, op)?;
    let mut found = false;
    for element in &elements {
        if element.type_name() != needle.type_name() {
            return Err(EvalError::type_mismatch(op, &needle, element));
        }
        if *element == needle {
            found = true;
        }
    }
    Ok(found)
}

/// HAS: a list of strings on the left, a single string on the right
fn eval_has(list_expr: &Expr, needle_expr: &Expr, env: &Environment) -> Result<bool, EvalError> {
    let list = eval_string_list_operand(list_expr, env, "HAS", "left")?;
    let needle = eval_expr(needle_expr, env)?;
    match needle {
        Value::String(s) => Ok(list.contains(&s)),
        Value::StringList(_) | Value::NumberList(_) => Err(EvalError::invalid_operand(
            "HAS",
            "right side must be a single string, not a list",
        )),
        other => Err(EvalError::TypeMismatch {
            op: "HAS".to_string(),
            lhs: "list of strings".to_string(),
            rhs: other.type_name().to_string(),
        }),
    }
}

/// INTERSECTS: both sides lists of strings, true when they share an element
fn eval_intersects(l: &Expr, r: &Expr, env: &Environment) -> Result<bool, EvalError> {
    let lhs = eval_string_list_operand(l, env, "INTERSECTS", "left")?;
    let rhs = eval_string_list_operand(r, env, "INTERSECTS", "right")?;
    Ok(lhs.iter().any(|item| rhs.contains(item)))
}

/// Substring regex match; the subject must evaluate to a string
fn eval_match(
    subject_expr: &Expr,
    pattern_expr: &Expr,
    env: &Environment,
    op: &str,
) -> Result<bool, EvalError> {
    let Expr::Regex(re) = pattern_expr else {
        return Err(EvalError::invalid_operand(
            op,
            "right side must be a regex literal",
        ));
    };
    match eval_expr(subject_expr, env)? {
        Value::String(s) => Ok(re.is_match(&s)),
        other => Err(EvalError::regex_operand(op, &other)),
    }
}

/// Resolve an operand that must be a list, expanding environment lists into
/// their scalar elements. List literals keep their element values as-is so
/// kind checks happen element by element.
fn eval_list_operand(
    expr: &Expr,
    env: &Environment,
    op: &str,
) -> Result<Vec<Value>, EvalError> {
    match expr {
        Expr::List(items) => eval_elements(items, env),
        other => match eval_expr(other, env)? {
            Value::StringList(items) => Ok(items.into_iter().map(Value::String).collect()),
            Value::NumberList(items) => Ok(items.into_iter().map(Value::Number).collect()),
            scalar => Err(EvalError::invalid_operand(
                op,
                format!(
                    "right side evaluates to {}, expected a list",
                    scalar.type_name()
                ),
            )),
        },
    }
}

/// Like `eval_list_operand` but every element must be a string
fn eval_string_list_operand(
    expr: &Expr,
    env: &Environment,
    op: &str,
    side: &str,
) -> Result<Vec<String>, EvalError> {
    let elements = match expr {
        Expr::List(items) => eval_elements(items, env)?,
        other => match eval_expr(other, env)? {
            Value::StringList(items) => return Ok(items),
            Value::NumberList(_) => {
                return Err(EvalError::invalid_operand(
                    op,
                    format!("{} side is a list of numbers, expected strings", side),
                ))
            }
            scalar => {
                return Err(EvalError::invalid_operand(
                    op,
                    format!(
                        "{} side evaluates to {}, expected a list of strings",
                        side,
                        scalar.type_name()
                    ),
                ))
            }
        },
    };

    elements
        .into_iter()
        .map(|value| match value {
            Value::String(s) => Ok(s),
            other => Err(EvalError::invalid_operand(
                op,
                format!(
                    "{} side holds a {}, expected strings",
                    side,
                    other.type_name()
                ),
            )),
        })
        .collect()
}
