//! Static checking of expressions against the schema of the bound variable.
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::value::Value;
use crate::wkt;
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use std::fmt;

/// The static type of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Only known at evaluation time.
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Message(MessageDescriptor),
}

use Type as T;

impl Type {
    /// Type of the values of a message field. Enums are integers.
    pub(crate) fn of_field(field: &FieldDescriptor) -> Type {
        if field.is_map() {
            if let Kind::Message(entry) = field.kind() {
                let key = Type::of_kind(entry.map_entry_key_field().kind());
                let value = Type::of_kind(entry.map_entry_value_field().kind());
                return T::Map(Box::new(key), Box::new(value));
            }
        }
        let kind = Type::of_kind(field.kind());
        if field.is_list() {
            return T::List(Box::new(kind));
        }
        kind
    }

    fn of_kind(kind: Kind) -> Type {
        match kind {
            Kind::Double | Kind::Float => T::Double,
            Kind::Int32
            | Kind::Int64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Sfixed32
            | Kind::Sfixed64
            | Kind::Enum(_) => T::Int,
            Kind::Uint32 | Kind::Uint64 | Kind::Fixed32 | Kind::Fixed64 => T::Uint,
            Kind::Bool => T::Bool,
            Kind::String => T::String,
            Kind::Bytes => T::Bytes,
            Kind::Message(message) => match message.full_name() {
                wkt::TIMESTAMP => T::Timestamp,
                wkt::DURATION => T::Duration,
                name if wkt::WRAPPERS.contains(&name) => message
                    .get_field_by_name("value")
                    .map(|field| Type::of_kind(field.kind()))
                    .unwrap_or(T::Dyn),
                _ => T::Message(message),
            },
        }
    }

    fn of_literal(value: &Value) -> Type {
        match value {
            Value::Null => T::Null,
            Value::Bool(_) => T::Bool,
            Value::Int(_) => T::Int,
            Value::Uint(_) => T::Uint,
            Value::Double(_) => T::Double,
            Value::String(_) => T::String,
            Value::Bytes(_) => T::Bytes,
            _ => T::Dyn,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, T::Int | T::Uint | T::Double)
    }

    /// Checks if values of the two types can be compared for equality.
    fn is_comparable_with(&self, other: &Type) -> bool {
        match (self, other) {
            (T::Dyn | T::Null, _) | (_, T::Dyn | T::Null) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (T::List(a), T::List(b)) => a.is_comparable_with(b),
            (T::Map(ak, av), T::Map(bk, bv)) => {
                ak.is_comparable_with(bk) && av.is_comparable_with(bv)
            }
            (a, b) => a == b,
        }
    }

    /// Checks if values of the two types can be compared with `<`, `<=`, `>` and `>=`.
    fn is_orderable_with(&self, other: &Type) -> bool {
        match (self, other) {
            (T::Dyn, _) | (_, T::Dyn) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) => {
                a == b
                    && matches!(
                        a,
                        T::String | T::Bytes | T::Bool | T::Timestamp | T::Duration
                    )
            }
        }
    }

    /// The most specific type that covers both types.
    fn join(&self, other: &Type) -> Type {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (T::Null, other) | (other, T::Null) => other.clone(),
            _ => T::Dyn,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            T::Dyn => f.write_str("dyn"),
            T::Null => f.write_str("null_type"),
            T::Bool => f.write_str("bool"),
            T::Int => f.write_str("int"),
            T::Uint => f.write_str("uint"),
            T::Double => f.write_str("double"),
            T::String => f.write_str("string"),
            T::Bytes => f.write_str("bytes"),
            T::Timestamp => f.write_str(wkt::TIMESTAMP),
            T::Duration => f.write_str(wkt::DURATION),
            T::List(element) => write!(f, "list({element})"),
            T::Map(key, value) => write!(f, "map({key}, {value})"),
            T::Message(message) => f.write_str(message.full_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum CheckError {
    #[error("undeclared reference to '{0}'")]
    UndeclaredReference(String),
    #[error("undeclared reference to function '{0}'")]
    UndeclaredFunction(String),
    #[error("undefined field '{field}' in message '{message}'")]
    UndefinedField { field: String, message: String },
    #[error("type '{type_name}' does not support field selection of '{field}'")]
    NoFieldSelection { field: String, type_name: String },
    #[error("found no matching overload for '{function}' applied to '({args})'")]
    NoMatchingOverload { function: String, args: String },
}

fn no_overload(function: impl fmt::Display, args: &[&Type]) -> CheckError {
    let args = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    CheckError::NoMatchingOverload {
        function: function.to_string(),
        args,
    }
}

const GLOBAL_FUNCTIONS: &[&str] = &[
    "string",
    "int",
    "uint",
    "double",
    "size",
    "timestamp",
    "duration",
    "dyn",
];

const METHODS: &[&str] = &[
    "contains",
    "startsWith",
    "endsWith",
    "lowerAscii",
    "upperAscii",
    "trim",
    "size",
    "split",
    "join",
    "replace",
];

/// Computes the type of expressions where one variable of message type is declared.
pub(crate) struct Checker<'a> {
    variable: &'a str,
    descriptor: &'a MessageDescriptor,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(variable: &'a str, descriptor: &'a MessageDescriptor) -> Self {
        Self {
            variable,
            descriptor,
        }
    }

    pub(crate) fn check(&self, expr: &Expr) -> Result<Type, CheckError> {
        match expr {
            Expr::Literal(value) => Ok(Type::of_literal(value)),
            Expr::Ident(name) if name == self.variable => Ok(T::Message(self.descriptor.clone())),
            Expr::Ident(name) => Err(CheckError::UndeclaredReference(name.clone())),
            Expr::List(items) => {
                let mut element: Option<Type> = None;
                for item in items {
                    let item = self.check(item)?;
                    element = Some(match element {
                        Some(element) => element.join(&item),
                        None => item,
                    });
                }
                Ok(T::List(Box::new(element.unwrap_or(T::Dyn))))
            }
            Expr::Select { operand, field } => self.select(&self.check(operand)?, field),
            Expr::Has { operand, field } => {
                self.select(&self.check(operand)?, field)?;
                Ok(T::Bool)
            }
            Expr::Index { operand, index } => {
                let operand = self.check(operand)?;
                let index = self.check(index)?;
                match (&operand, &index) {
                    (T::List(element), T::Int | T::Uint | T::Dyn) => Ok((**element).clone()),
                    (T::Map(key, value), index) if key.is_comparable_with(index) => {
                        Ok((**value).clone())
                    }
                    (T::Dyn, _) => Ok(T::Dyn),
                    _ => Err(no_overload("_[_]", &[&operand, &index])),
                }
            }
            Expr::Call {
                target,
                function,
                args,
            } => self.call(target.as_deref(), function, args),
            Expr::Unary { op, operand } => {
                let operand = self.check(operand)?;
                match (op, &operand) {
                    (UnaryOp::Not, T::Bool | T::Dyn) => Ok(T::Bool),
                    (UnaryOp::Neg, T::Int | T::Double | T::Dyn) => Ok(operand),
                    _ => Err(no_overload(op, &[&operand])),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.check(lhs)?;
                let rhs = self.check(rhs)?;
                binary(*op, &lhs, &rhs).ok_or_else(|| no_overload(op, &[&lhs, &rhs]))
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.check(condition)?;
                if !matches!(condition, T::Bool | T::Dyn) {
                    return Err(no_overload("_?_:_", &[&condition]));
                }
                Ok(self.check(then)?.join(&self.check(otherwise)?))
            }
        }
    }

    fn select(&self, operand: &Type, field: &str) -> Result<Type, CheckError> {
        match operand {
            T::Message(message) => message
                .get_field_by_name(field)
                .map(|field| Type::of_field(&field))
                .ok_or_else(|| CheckError::UndefinedField {
                    field: field.to_string(),
                    message: message.full_name().to_string(),
                }),
            T::Map(key, value) if matches!(**key, T::String | T::Dyn) => Ok((**value).clone()),
            T::Dyn => Ok(T::Dyn),
            other => Err(CheckError::NoFieldSelection {
                field: field.to_string(),
                type_name: other.to_string(),
            }),
        }
    }

    fn call(&self, target: Option<&Expr>, function: &str, args: &[Expr]) -> Result<Type, CheckError> {
        let target = target.map(|target| self.check(target)).transpose()?;
        let args = args
            .iter()
            .map(|arg| self.check(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let arg_refs: Vec<&Type> = target.iter().chain(args.iter()).collect();

        let result = match &target {
            None if GLOBAL_FUNCTIONS.contains(&function) => global_function(function, &args),
            Some(target) if METHODS.contains(&function) => method(target, function, &args),
            _ => return Err(CheckError::UndeclaredFunction(function.to_string())),
        };
        result.ok_or_else(|| no_overload(function, &arg_refs))
    }
}

fn global_function(function: &str, args: &[Type]) -> Option<Type> {
    let result = match (function, args) {
        (
            "string",
            [
                T::Dyn
                | T::Int
                | T::Uint
                | T::Double
                | T::String
                | T::Bytes
                | T::Bool
                | T::Timestamp
                | T::Duration,
            ],
        ) => T::String,
        ("int", [T::Dyn | T::Int | T::Uint | T::Double | T::String | T::Timestamp]) => T::Int,
        ("uint", [T::Dyn | T::Int | T::Uint | T::Double | T::String]) => T::Uint,
        ("double", [T::Dyn | T::Int | T::Uint | T::Double | T::String]) => T::Double,
        ("size", [T::Dyn | T::String | T::Bytes | T::List(_) | T::Map(..)]) => T::Int,
        ("timestamp", [T::Dyn | T::String | T::Timestamp]) => T::Timestamp,
        ("duration", [T::Dyn | T::String | T::Duration]) => T::Duration,
        ("dyn", [_]) => T::Dyn,
        _ => return None,
    };
    Some(result)
}

fn method(target: &Type, function: &str, args: &[Type]) -> Option<Type> {
    let result = match (function, target, args) {
        ("contains" | "startsWith" | "endsWith", T::String | T::Dyn, [T::String | T::Dyn]) => {
            T::Bool
        }
        ("lowerAscii" | "upperAscii" | "trim", T::String | T::Dyn, []) => T::String,
        ("size", T::Dyn | T::String | T::Bytes | T::List(_) | T::Map(..), []) => T::Int,
        ("split", T::String | T::Dyn, [T::String | T::Dyn]) => T::List(Box::new(T::String)),
        (
            "replace",
            T::String | T::Dyn,
            [T::String | T::Dyn, T::String | T::Dyn],
        ) => T::String,
        ("join", T::List(element), [] | [T::String | T::Dyn])
            if matches!(**element, T::String | T::Dyn) =>
        {
            T::String
        }
        ("join", T::Dyn, [] | [T::String | T::Dyn]) => T::String,
        _ => return None,
    };
    Some(result)
}

fn binary(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    let result = match op {
        BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
            (T::Bool | T::Dyn, T::Bool | T::Dyn) => T::Bool,
            _ => return None,
        },
        BinaryOp::Eq | BinaryOp::Ne => {
            if !lhs.is_comparable_with(rhs) {
                return None;
            }
            T::Bool
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if !lhs.is_orderable_with(rhs) {
                return None;
            }
            T::Bool
        }
        BinaryOp::In => match rhs {
            T::List(element) if lhs.is_comparable_with(element) => T::Bool,
            T::Map(key, _) if lhs.is_comparable_with(key) => T::Bool,
            T::Dyn => T::Bool,
            _ => return None,
        },
        BinaryOp::Add => match (lhs, rhs) {
            (T::Dyn, _) | (_, T::Dyn) => T::Dyn,
            (T::Int, T::Int) => T::Int,
            (T::Uint, T::Uint) => T::Uint,
            (T::Double, T::Double) => T::Double,
            (T::String, T::String) => T::String,
            (T::Bytes, T::Bytes) => T::Bytes,
            (T::List(a), T::List(b)) => T::List(Box::new(a.join(b))),
            (T::Timestamp, T::Duration) | (T::Duration, T::Timestamp) => T::Timestamp,
            (T::Duration, T::Duration) => T::Duration,
            _ => return None,
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (T::Dyn, _) | (_, T::Dyn) => T::Dyn,
            (T::Int, T::Int) => T::Int,
            (T::Uint, T::Uint) => T::Uint,
            (T::Double, T::Double) => T::Double,
            (T::Timestamp, T::Timestamp) => T::Duration,
            (T::Timestamp, T::Duration) => T::Timestamp,
            (T::Duration, T::Duration) => T::Duration,
            _ => return None,
        },
        BinaryOp::Mul | BinaryOp::Div => match (lhs, rhs) {
            (T::Dyn, _) | (_, T::Dyn) => T::Dyn,
            (T::Int, T::Int) => T::Int,
            (T::Uint, T::Uint) => T::Uint,
            (T::Double, T::Double) => T::Double,
            _ => return None,
        },
        BinaryOp::Rem => match (lhs, rhs) {
            (T::Dyn, _) | (_, T::Dyn) => T::Dyn,
            (T::Int, T::Int) => T::Int,
            (T::Uint, T::Uint) => T::Uint,
            _ => return None,
        },
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use prost_reflect::DescriptorPool;
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
        field_descriptor_proto::{Label, Type as FieldType},
    };

    fn field(name: &str, number: i32, r#type: FieldType, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(r#type as i32),
            label: Some(label as i32),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn descriptor() -> MessageDescriptor {
        let file = FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Thing".to_string()),
                    field: vec![
                        field("id", 1, FieldType::String, Label::Optional),
                        field("count", 2, FieldType::Int32, Label::Optional),
                        field("tags", 3, FieldType::String, Label::Repeated),
                        FieldDescriptorProto {
                            type_name: Some(".test.Part".to_string()),
                            ..field("part", 4, FieldType::Message, Label::Optional)
                        },
                    ],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Part".to_string()),
                    field: vec![field("name", 1, FieldType::String, Label::Optional)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
            .unwrap()
            .get_message_by_name("test.Thing")
            .unwrap()
    }

    fn check(source: &str) -> Result<Type, CheckError> {
        let descriptor = descriptor();
        Checker::new("this", &descriptor).check(&parse(source).unwrap())
    }

    #[test]
    fn test_field_types() {
        assert_eq!(check("this.id").unwrap(), T::String);
        assert_eq!(check("this.count").unwrap(), T::Int);
        assert_eq!(check("this.tags").unwrap(), T::List(Box::new(T::String)));
        assert_eq!(check("this.part.name").unwrap(), T::String);
        assert_eq!(check("has(this.part)").unwrap(), T::Bool);
    }

    #[test]
    fn test_undeclared_variable() {
        assert_eq!(
            check("that.id").unwrap_err(),
            CheckError::UndeclaredReference("that".to_string())
        );
    }

    #[test]
    fn test_undefined_field() {
        assert_eq!(
            check("this.part.title == 'x'").unwrap_err(),
            CheckError::UndefinedField {
                field: "title".to_string(),
                message: "test.Part".to_string(),
            }
        );
    }

    #[test]
    fn test_selection_on_scalar() {
        assert!(matches!(
            check("this.id.length").unwrap_err(),
            CheckError::NoFieldSelection { .. }
        ));
    }

    #[test]
    fn test_mismatched_operands() {
        assert!(matches!(
            check("this.id == 1").unwrap_err(),
            CheckError::NoMatchingOverload { .. }
        ));
        assert!(matches!(
            check("this.id && true").unwrap_err(),
            CheckError::NoMatchingOverload { .. }
        ));
        assert_eq!(check("this.count == 1.0").unwrap(), T::Bool);
    }

    #[test]
    fn test_functions() {
        assert_eq!(check("string(this.count)").unwrap(), T::String);
        assert_eq!(check("this.tags.join(',')").unwrap(), T::String);
        assert_eq!(check("this.id.split('-')").unwrap(), T::List(Box::new(T::String)));
        assert!(matches!(
            check("this.id.startsWith()").unwrap_err(),
            CheckError::NoMatchingOverload { .. }
        ));
        assert_eq!(
            check("frobnicate(this.id)").unwrap_err(),
            CheckError::UndeclaredFunction("frobnicate".to_string())
        );
    }

    #[test]
    fn test_conditional_joins_branches() {
        assert_eq!(check("has(this.part) ? this.part.name : '-'").unwrap(), T::String);
        assert!(matches!(
            check("true ? this.part : null").unwrap(),
            T::Message(message) if message.full_name() == "test.Part"
        ));
        assert_eq!(check("true ? 1 : 'a'").unwrap(), T::Dyn);
    }
}
