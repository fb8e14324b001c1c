//! Tree walking evaluation of checked expressions.
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::value::{Value, format_duration, format_timestamp, parse_duration};
use chrono::{DateTime, Utc};
use prost_reflect::ReflectMessage;
use std::cmp::Ordering;

use Value as V;

/// Errors that can occur when evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("no such attribute '{0}'")]
    NoSuchAttribute(String),
    #[error("no such field '{field}' in message '{message}'")]
    NoSuchField { field: String, message: String },
    #[error("no such key: '{0}'")]
    NoSuchKey(String),
    #[error("index '{index}' out of range in list of size {size}")]
    IndexOutOfRange { index: i64, size: usize },
    #[error("no matching overload for '{function}' applied to '({args})'")]
    NoMatchingOverload { function: String, args: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulus by zero")]
    ModulusByZero,
    #[error("{0} overflow")]
    Overflow(&'static str),
    #[error("invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },
    #[error("expected a message of type '{expected}' but got '{actual}'")]
    TypeMismatch { expected: String, actual: String },
}

fn no_overload(function: impl ToString, args: &[&Value]) -> EvalError {
    let args = args
        .iter()
        .map(|arg| arg.type_name())
        .collect::<Vec<_>>()
        .join(", ");
    EvalError::NoMatchingOverload {
        function: function.to_string(),
        args,
    }
}

fn invalid_argument(function: &str, message: impl ToString) -> EvalError {
    EvalError::InvalidArgument {
        function: function.to_string(),
        message: message.to_string(),
    }
}

/// The binding of the single variable visible to an expression.
pub(crate) struct Activation<'a> {
    variable: &'a str,
    value: Value,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(variable: &'a str, value: Value) -> Self {
        Self { variable, value }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) if name == self.variable => Ok(self.value.clone()),
            Expr::Ident(name) => Err(EvalError::NoSuchAttribute(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(V::List),
            Expr::Select { operand, field } => select(self.eval(operand)?, field),
            Expr::Has { operand, field } => has(&self.eval(operand)?, field),
            Expr::Index { operand, index } => index_of(self.eval(operand)?, &self.eval(index)?),
            Expr::Call {
                target,
                function,
                args,
            } => {
                let target = target.as_deref().map(|t| self.eval(t)).transpose()?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match target {
                    None => global_function(function, args),
                    Some(target) => method(target, function, args),
                }
            }
            Expr::Unary { op, operand } => unary(*op, self.eval(operand)?),
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => self.logical(false, lhs, rhs),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => self.logical(true, lhs, rhs),
            Expr::Binary { op, lhs, rhs } => binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => match self.eval(condition)? {
                V::Bool(true) => self.eval(then),
                V::Bool(false) => self.eval(otherwise),
                other => Err(no_overload("_?_:_", &[&other])),
            },
        }
    }

    /// Evaluates `&&` (when `absorbing` is `false`) or `||` (when it is `true`). The absorbing
    /// value wins over errors on either side, so `error && false` is `false`.
    fn logical(&self, absorbing: bool, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        let operator = if absorbing { "||" } else { "&&" };
        let lhs = self.eval(lhs);
        if matches!(lhs, Ok(V::Bool(b)) if b == absorbing) {
            return Ok(V::Bool(absorbing));
        }
        let rhs = self.eval(rhs);
        match (lhs, rhs) {
            (_, Ok(V::Bool(b))) if b == absorbing => Ok(V::Bool(absorbing)),
            (Ok(V::Bool(_)), Ok(V::Bool(_))) => Ok(V::Bool(!absorbing)),
            (Err(e), _) | (_, Err(e)) => Err(e),
            (Ok(lhs), Ok(rhs)) => Err(no_overload(operator, &[&lhs, &rhs])),
        }
    }
}

fn select(operand: Value, field: &str) -> Result<Value, EvalError> {
    match operand {
        V::Message(message) => {
            let descriptor = message.descriptor();
            let Some(field_descriptor) = descriptor.get_field_by_name(field) else {
                return Err(EvalError::NoSuchField {
                    field: field.to_string(),
                    message: descriptor.full_name().to_string(),
                });
            };
            Ok(Value::from(&*message.get_field(&field_descriptor)))
        }
        V::Map(mut entries) => entries
            .remove(&super::value::Key::String(field.to_string()))
            .ok_or_else(|| EvalError::NoSuchKey(field.to_string())),
        other => Err(no_overload(format!("_.{field}"), &[&other])),
    }
}

fn has(operand: &Value, field: &str) -> Result<Value, EvalError> {
    match operand {
        V::Message(message) => {
            let descriptor = message.descriptor();
            let Some(field_descriptor) = descriptor.get_field_by_name(field) else {
                return Err(EvalError::NoSuchField {
                    field: field.to_string(),
                    message: descriptor.full_name().to_string(),
                });
            };
            Ok(V::Bool(message.has_field(&field_descriptor)))
        }
        V::Map(entries) => Ok(V::Bool(
            entries.contains_key(&super::value::Key::String(field.to_string())),
        )),
        other => Err(no_overload(format!("has(_.{field})"), &[other])),
    }
}

fn index_of(operand: Value, index: &Value) -> Result<Value, EvalError> {
    match (operand, index) {
        (V::List(mut items), V::Int(_) | V::Uint(_)) => {
            let position = match index {
                V::Int(i) => *i,
                V::Uint(u) => i64::try_from(*u).unwrap_or(i64::MAX),
                _ => -1,
            };
            let size = items.len();
            usize::try_from(position)
                .ok()
                .filter(|p| *p < size)
                .map(|p| items.swap_remove(p))
                .ok_or(EvalError::IndexOutOfRange {
                    index: position,
                    size,
                })
        }
        (V::Map(mut entries), index) => {
            let key = index.to_key().ok_or_else(|| no_overload("_[_]", &[index]))?;
            entries
                .remove(&key)
                .ok_or_else(|| EvalError::NoSuchKey(key.to_string()))
        }
        (operand, index) => Err(no_overload("_[_]", &[&operand, index])),
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, V::Bool(b)) => Ok(V::Bool(!b)),
        (UnaryOp::Neg, V::Int(i)) => i.checked_neg().map(V::Int).ok_or(EvalError::Overflow("int")),
        (UnaryOp::Neg, V::Double(d)) => Ok(V::Double(-d)),
        (op, operand) => Err(no_overload(op, &[&operand])),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => Ok(V::Bool(equals(&lhs, &rhs))),
        BinaryOp::Ne => Ok(V::Bool(!equals(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let Some(ordering) = compare(&lhs, &rhs) else {
                return Err(no_overload(op, &[&lhs, &rhs]));
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(V::Bool(result))
        }
        BinaryOp::In => match &rhs {
            V::List(items) => Ok(V::Bool(items.iter().any(|item| equals(&lhs, item)))),
            V::Map(entries) => Ok(V::Bool(
                lhs.to_key().is_some_and(|key| entries.contains_key(&key)),
            )),
            _ => Err(no_overload(op, &[&lhs, &rhs])),
        },
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => subtract(lhs, rhs),
        BinaryOp::Mul => multiply(lhs, rhs),
        BinaryOp::Div => divide(lhs, rhs),
        BinaryOp::Rem => remainder(lhs, rhs),
        // Evaluated by `Activation::logical`.
        BinaryOp::And | BinaryOp::Or => Err(no_overload(op, &[&lhs, &rhs])),
    }
}

/// Equality across numeric types compares the numeric values.
pub(crate) fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (V::Int(a), V::Uint(b)) | (V::Uint(b), V::Int(a)) => {
            u64::try_from(*a).is_ok_and(|a| a == *b)
        }
        (V::Int(a), V::Double(b)) | (V::Double(b), V::Int(a)) => *a as f64 == *b,
        (V::Uint(a), V::Double(b)) | (V::Double(b), V::Uint(a)) => *a as f64 == *b,
        (V::List(a), V::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equals(a, b))
        }
        (V::Map(a), V::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| equals(a, b)))
        }
        (a, b) => a == b,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (V::Int(a), V::Int(b)) => Some(a.cmp(b)),
        (V::Uint(a), V::Uint(b)) => Some(a.cmp(b)),
        (V::Double(a), V::Double(b)) => a.partial_cmp(b),
        (V::Int(a), V::Uint(b)) => Some(match u64::try_from(*a) {
            Ok(a) => a.cmp(b),
            Err(_) => Ordering::Less,
        }),
        (V::Uint(_), V::Int(_)) => compare(rhs, lhs).map(Ordering::reverse),
        (V::Int(a), V::Double(b)) => (*a as f64).partial_cmp(b),
        (V::Uint(a), V::Double(b)) => (*a as f64).partial_cmp(b),
        (V::Double(_), V::Int(_) | V::Uint(_)) => compare(rhs, lhs).map(Ordering::reverse),
        (V::String(a), V::String(b)) => Some(a.cmp(b)),
        (V::Bytes(a), V::Bytes(b)) => Some(a.cmp(b)),
        (V::Bool(a), V::Bool(b)) => Some(a.cmp(b)),
        (V::Timestamp(a), V::Timestamp(b)) => Some(a.cmp(b)),
        (V::Duration(a), V::Duration(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (V::Int(a), V::Int(b)) => a.checked_add(b).map(V::Int).ok_or(EvalError::Overflow("int")),
        (V::Uint(a), V::Uint(b)) => a
            .checked_add(b)
            .map(V::Uint)
            .ok_or(EvalError::Overflow("uint")),
        (V::Double(a), V::Double(b)) => Ok(V::Double(a + b)),
        (V::String(a), V::String(b)) => Ok(V::String(a + &b)),
        (V::Bytes(mut a), V::Bytes(b)) => {
            a.extend(b);
            Ok(V::Bytes(a))
        }
        (V::List(mut a), V::List(b)) => {
            a.extend(b);
            Ok(V::List(a))
        }
        (V::Timestamp(t), V::Duration(d)) | (V::Duration(d), V::Timestamp(t)) => t
            .checked_add_signed(d)
            .map(V::Timestamp)
            .ok_or(EvalError::Overflow("timestamp")),
        (V::Duration(a), V::Duration(b)) => a
            .checked_add(&b)
            .map(V::Duration)
            .ok_or(EvalError::Overflow("duration")),
        (lhs, rhs) => Err(no_overload(BinaryOp::Add, &[&lhs, &rhs])),
    }
}

fn subtract(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (V::Int(a), V::Int(b)) => a.checked_sub(b).map(V::Int).ok_or(EvalError::Overflow("int")),
        (V::Uint(a), V::Uint(b)) => a
            .checked_sub(b)
            .map(V::Uint)
            .ok_or(EvalError::Overflow("uint")),
        (V::Double(a), V::Double(b)) => Ok(V::Double(a - b)),
        (V::Timestamp(a), V::Timestamp(b)) => Ok(V::Duration(a.signed_duration_since(b))),
        (V::Timestamp(t), V::Duration(d)) => t
            .checked_sub_signed(d)
            .map(V::Timestamp)
            .ok_or(EvalError::Overflow("timestamp")),
        (V::Duration(a), V::Duration(b)) => a
            .checked_sub(&b)
            .map(V::Duration)
            .ok_or(EvalError::Overflow("duration")),
        (lhs, rhs) => Err(no_overload(BinaryOp::Sub, &[&lhs, &rhs])),
    }
}

fn multiply(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (V::Int(a), V::Int(b)) => a.checked_mul(b).map(V::Int).ok_or(EvalError::Overflow("int")),
        (V::Uint(a), V::Uint(b)) => a
            .checked_mul(b)
            .map(V::Uint)
            .ok_or(EvalError::Overflow("uint")),
        (V::Double(a), V::Double(b)) => Ok(V::Double(a * b)),
        (lhs, rhs) => Err(no_overload(BinaryOp::Mul, &[&lhs, &rhs])),
    }
}

fn divide(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (V::Int(_), V::Int(0)) | (V::Uint(_), V::Uint(0)) => Err(EvalError::DivisionByZero),
        (V::Int(a), V::Int(b)) => a.checked_div(b).map(V::Int).ok_or(EvalError::Overflow("int")),
        (V::Uint(a), V::Uint(b)) => Ok(V::Uint(a / b)),
        (V::Double(a), V::Double(b)) => Ok(V::Double(a / b)),
        (lhs, rhs) => Err(no_overload(BinaryOp::Div, &[&lhs, &rhs])),
    }
}

fn remainder(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (V::Int(_), V::Int(0)) | (V::Uint(_), V::Uint(0)) => Err(EvalError::ModulusByZero),
        (V::Int(a), V::Int(b)) => a.checked_rem(b).map(V::Int).ok_or(EvalError::Overflow("int")),
        (V::Uint(a), V::Uint(b)) => Ok(V::Uint(a % b)),
        (lhs, rhs) => Err(no_overload(BinaryOp::Rem, &[&lhs, &rhs])),
    }
}

fn global_function(function: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    let [arg] = <[Value; 1]>::try_from(args).map_err(|args| {
        let refs: Vec<&Value> = args.iter().collect();
        no_overload(function, &refs)
    })?;
    match (function, arg) {
        ("dyn", arg) => Ok(arg),
        ("string", arg) => to_string(arg),
        ("int", arg) => to_int(arg),
        ("uint", arg) => to_uint(arg),
        ("double", arg) => to_double(arg),
        ("size", arg) => size(&arg),
        ("timestamp", V::String(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|t| V::Timestamp(t.with_timezone(&Utc)))
            .map_err(|e| invalid_argument(function, e)),
        ("timestamp", V::Timestamp(t)) => Ok(V::Timestamp(t)),
        ("duration", V::String(text)) => parse_duration(&text)
            .map(V::Duration)
            .ok_or_else(|| invalid_argument(function, format!("invalid duration '{text}'"))),
        ("duration", V::Duration(d)) => Ok(V::Duration(d)),
        (function, arg) => Err(no_overload(function, &[&arg])),
    }
}

fn to_string(value: Value) -> Result<Value, EvalError> {
    let text = match value {
        V::String(s) => s,
        V::Int(i) => i.to_string(),
        V::Uint(u) => u.to_string(),
        V::Double(d) => d.to_string(),
        V::Bool(b) => b.to_string(),
        V::Bytes(b) => String::from_utf8(b).map_err(|e| invalid_argument("string", e))?,
        V::Timestamp(t) => format_timestamp(&t),
        V::Duration(d) => format_duration(&d),
        other => return Err(no_overload("string", &[&other])),
    };
    Ok(V::String(text))
}

fn to_int(value: Value) -> Result<Value, EvalError> {
    let result = match value {
        V::Int(i) => Some(i),
        V::Uint(u) => i64::try_from(u).ok(),
        V::Double(d) => (d.is_finite() && d >= i64::MIN as f64 && d < i64::MAX as f64)
            .then_some(d.trunc() as i64),
        V::String(s) => {
            return s
                .parse()
                .map(V::Int)
                .map_err(|e| invalid_argument("int", e));
        }
        V::Timestamp(t) => Some(t.timestamp()),
        other => return Err(no_overload("int", &[&other])),
    };
    result.map(V::Int).ok_or(EvalError::Overflow("int"))
}

fn to_uint(value: Value) -> Result<Value, EvalError> {
    let result = match value {
        V::Uint(u) => Some(u),
        V::Int(i) => u64::try_from(i).ok(),
        V::Double(d) => {
            (d.is_finite() && d >= 0.0 && d < u64::MAX as f64).then_some(d.trunc() as u64)
        }
        V::String(s) => {
            return s
                .parse()
                .map(V::Uint)
                .map_err(|e| invalid_argument("uint", e));
        }
        other => return Err(no_overload("uint", &[&other])),
    };
    result.map(V::Uint).ok_or(EvalError::Overflow("uint"))
}

fn to_double(value: Value) -> Result<Value, EvalError> {
    match value {
        V::Double(d) => Ok(V::Double(d)),
        V::Int(i) => Ok(V::Double(i as f64)),
        V::Uint(u) => Ok(V::Double(u as f64)),
        V::String(s) => s
            .parse()
            .map(V::Double)
            .map_err(|e| invalid_argument("double", e)),
        other => Err(no_overload("double", &[&other])),
    }
}

fn size(value: &Value) -> Result<Value, EvalError> {
    let size = match value {
        V::String(s) => s.chars().count(),
        V::Bytes(b) => b.len(),
        V::List(items) => items.len(),
        V::Map(entries) => entries.len(),
        other => return Err(no_overload("size", &[other])),
    };
    i64::try_from(size)
        .map(V::Int)
        .map_err(|_| EvalError::Overflow("int"))
}

fn method(target: Value, function: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match (function, &target, args.as_slice()) {
        ("contains", V::String(s), [V::String(arg)]) => Ok(V::Bool(s.contains(arg.as_str()))),
        ("startsWith", V::String(s), [V::String(arg)]) => {
            Ok(V::Bool(s.starts_with(arg.as_str())))
        }
        ("endsWith", V::String(s), [V::String(arg)]) => Ok(V::Bool(s.ends_with(arg.as_str()))),
        ("lowerAscii", V::String(s), []) => Ok(V::String(s.to_ascii_lowercase())),
        ("upperAscii", V::String(s), []) => Ok(V::String(s.to_ascii_uppercase())),
        ("trim", V::String(s), []) => Ok(V::String(s.trim().to_string())),
        ("size", target, []) => size(target),
        ("split", V::String(s), [V::String(separator)]) => {
            let parts = if separator.is_empty() {
                s.chars().map(|c| V::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str())
                    .map(|part| V::String(part.to_string()))
                    .collect()
            };
            Ok(V::List(parts))
        }
        ("replace", V::String(s), [V::String(from), V::String(to)]) => {
            Ok(V::String(s.replace(from.as_str(), to)))
        }
        ("join", V::List(items), []) => join(items, ""),
        ("join", V::List(items), [V::String(separator)]) => join(items, separator),
        _ => {
            let refs: Vec<&Value> = std::iter::once(&target).chain(args.iter()).collect();
            Err(no_overload(function, &refs))
        }
    }
}

fn join(items: &[Value], separator: &str) -> Result<Value, EvalError> {
    let parts = items
        .iter()
        .map(|item| match item {
            V::String(s) => Ok(s.as_str()),
            other => Err(no_overload("join", &[other])),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(V::String(parts.join(separator)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    fn eval(source: &str) -> Result<Value, EvalError> {
        Activation::new("x", V::Int(7)).eval(&parse(source).unwrap())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("x * 2 + 1").unwrap(), V::Int(15));
        assert_eq!(eval("x / 2").unwrap(), V::Int(3));
        assert_eq!(eval("x % 4").unwrap(), V::Int(3));
        assert_eq!(eval("-x").unwrap(), V::Int(-7));
        assert_eq!(eval("3u + 4u").unwrap(), V::Uint(7));
        assert_eq!(eval("1.5 * 2.0").unwrap(), V::Double(3.0));
        assert_eq!(eval("'a' + 'b'").unwrap(), V::from("ab"));
        assert_eq!(eval("[1] + [2]").unwrap(), V::List(vec![V::Int(1), V::Int(2)]));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(eval("x / 0").unwrap_err(), EvalError::DivisionByZero);
        assert_eq!(eval("x % 0").unwrap_err(), EvalError::ModulusByZero);
        assert_eq!(
            eval("9223372036854775807 + x").unwrap_err(),
            EvalError::Overflow("int")
        );
        assert!(matches!(
            eval("x + 'a'").unwrap_err(),
            EvalError::NoMatchingOverload { .. }
        ));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("x == 7").unwrap(), V::Bool(true));
        assert_eq!(eval("x == 7.0").unwrap(), V::Bool(true));
        assert_eq!(eval("x != 7u").unwrap(), V::Bool(false));
        assert_eq!(eval("x < 10u").unwrap(), V::Bool(true));
        assert_eq!(eval("-1 < 0u").unwrap(), V::Bool(true));
        assert_eq!(eval("'abc' < 'abd'").unwrap(), V::Bool(true));
        assert_eq!(eval("x in [1, 7]").unwrap(), V::Bool(true));
        assert_eq!(eval("'z' in ['a', 'b']").unwrap(), V::Bool(false));
    }

    #[test]
    fn test_logical_operators_absorb_errors() {
        assert_eq!(eval("x / 0 == 1 || true").unwrap(), V::Bool(true));
        assert_eq!(eval("true || x / 0 == 1").unwrap(), V::Bool(true));
        assert_eq!(eval("x / 0 == 1 && false").unwrap(), V::Bool(false));
        assert_eq!(eval("false && x / 0 == 1").unwrap(), V::Bool(false));
        assert_eq!(eval("x / 0 == 1 && true").unwrap_err(), EvalError::DivisionByZero);
        assert_eq!(eval("true && false").unwrap(), V::Bool(false));
        assert_eq!(eval("false || false").unwrap(), V::Bool(false));
    }

    #[test]
    fn test_conditional() {
        assert_eq!(eval("x > 5 ? 'big' : 'small'").unwrap(), V::from("big"));
        assert_eq!(eval("x > 50 ? 'big' : 'small'").unwrap(), V::from("small"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("string(x)").unwrap(), V::from("7"));
        assert_eq!(eval("int('42')").unwrap(), V::Int(42));
        assert_eq!(eval("int(2.9)").unwrap(), V::Int(2));
        assert_eq!(eval("uint(x)").unwrap(), V::Uint(7));
        assert_eq!(eval("double(x)").unwrap(), V::Double(7.0));
        assert!(matches!(
            eval("uint(-1)").unwrap_err(),
            EvalError::Overflow("uint")
        ));
        assert_eq!(
            eval("string(timestamp('2024-05-01T10:00:00Z'))").unwrap(),
            V::from("2024-05-01T10:00:00Z")
        );
        assert_eq!(eval("string(duration('1m30s'))").unwrap(), V::from("90s"));
        assert_eq!(
            eval("timestamp('2024-05-01T10:00:00Z') - timestamp('2024-05-01T09:00:00Z') == duration('1h')")
                .unwrap(),
            V::Bool(true)
        );
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval("'Hello'.lowerAscii()").unwrap(), V::from("hello"));
        assert_eq!(eval("'Hello'.upperAscii()").unwrap(), V::from("HELLO"));
        assert_eq!(eval("'  a '.trim()").unwrap(), V::from("a"));
        assert_eq!(eval("'abc'.contains('b')").unwrap(), V::Bool(true));
        assert_eq!(eval("'abc'.startsWith('ab')").unwrap(), V::Bool(true));
        assert_eq!(eval("'abc'.endsWith('ab')").unwrap(), V::Bool(false));
        assert_eq!(eval("'héllo'.size()").unwrap(), V::Int(5));
        assert_eq!(eval("size([1, 2])").unwrap(), V::Int(2));
        assert_eq!(eval("'a-b'.replace('-', '+')").unwrap(), V::from("a+b"));
        assert_eq!(eval("'a,b,c'.split(',').join('|')").unwrap(), V::from("a|b|c"));
        assert_eq!(eval("['a', 'b'].join()").unwrap(), V::from("ab"));
    }

    #[test]
    fn test_index() {
        assert_eq!(eval("[1, 2, 3][1]").unwrap(), V::Int(2));
        assert_eq!(
            eval("[1][3]").unwrap_err(),
            EvalError::IndexOutOfRange { index: 3, size: 1 }
        );
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval("y").unwrap_err(),
            EvalError::NoSuchAttribute("y".to_string())
        );
    }
}
