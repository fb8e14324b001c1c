//! # Expressions
//!
//! A small expression language, compatible with the Common Expression Language (CEL), used for
//! list filters and for the values of table columns.
//!
//! Expressions see a single variable, bound to a message type: `this` for objects and `event`
//! for event payloads. Compilation parses the text and checks it against the message
//! descriptor, so references to fields that don't exist are rejected before anything is sent
//! to the server:
//!
//! ```no_run
//! # use objectl_core::expr::{CompileError, Environment};
//! # use objectl_core::prost_reflect::{DynamicMessage, MessageDescriptor};
//! # fn example(descriptor: MessageDescriptor, object: &DynamicMessage) -> Result<(), CompileError> {
//! let env = Environment::for_object(descriptor);
//! let program = env.compile("has(this.metadata.name) ? this.metadata.name : '-'")?;
//! let name = program.eval(object);
//! # Ok(())
//! # }
//! ```
//!
//! Supported syntax:
//!
//! * Literals: `1`, `1u`, `1.5`, `'text'`, `"text"`, `true`, `false`, `null`, `[1, 2]`.
//! * Operators: `?:`, `||`, `&&`, `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `+`, `-`, `*`, `/`,
//!   `%`, `!`, field selection and indexing.
//! * The `has(x.f)` macro, which tests field presence.
//! * Functions `string`, `int`, `uint`, `double`, `size`, `timestamp`, `duration` and `dyn`.
//! * String methods `contains`, `startsWith`, `endsWith`, `lowerAscii`, `upperAscii`, `trim`,
//!   `size`, `split` and `replace`, and the list method `join`.
mod ast;
mod checker;
mod eval;
mod parser;
mod value;

pub use checker::Type;
pub use eval::EvalError;
pub use value::{Key, Value};

use checker::Checker;
use eval::Activation;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};

/// Name of the variable that holds the object in object expressions.
pub const OBJECT_VARIABLE: &str = "this";

/// Name of the variable that holds the payload in event expressions.
pub const EVENT_VARIABLE: &str = "event";

/// Error returned when an expression can't be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to compile expression '{expression}': {reason}")]
pub struct CompileError {
    expression: String,
    reason: String,
}

impl CompileError {
    /// The text of the expression that failed to compile.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Writes the text as a double quoted string literal, escaping what is needed so that it is
/// parsed back unchanged. Used to embed user input, like identifiers, in expressions.
pub fn quote(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    result.push('"');
    for c in text.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

/// Declares the variable visible to expressions and its message type.
#[derive(Debug, Clone)]
pub struct Environment {
    variable: String,
    descriptor: MessageDescriptor,
}

impl Environment {
    pub fn new(variable: impl Into<String>, descriptor: MessageDescriptor) -> Self {
        Self {
            variable: variable.into(),
            descriptor,
        }
    }

    /// An environment where the object is the `this` variable.
    pub fn for_object(descriptor: MessageDescriptor) -> Self {
        Self::new(OBJECT_VARIABLE, descriptor)
    }

    /// An environment where the event payload is the `event` variable.
    pub fn for_event(descriptor: MessageDescriptor) -> Self {
        Self::new(EVENT_VARIABLE, descriptor)
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Parses and checks the expression.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        let error = |reason: String| CompileError {
            expression: source.to_string(),
            reason,
        };
        let ast = parser::parse(source).map_err(|e| error(e.to_string()))?;
        let output = Checker::new(&self.variable, &self.descriptor)
            .check(&ast)
            .map_err(|e| error(e.to_string()))?;
        Ok(Program {
            source: source.to_string(),
            variable: self.variable.clone(),
            descriptor: self.descriptor.clone(),
            ast,
            output,
        })
    }
}

/// A compiled expression, ready to be evaluated against messages of the environment type.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    variable: String,
    descriptor: MessageDescriptor,
    ast: ast::Expr,
    output: Type,
}

impl Program {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The type of the values produced by the program, [`Type::Dyn`] when it is only known at
    /// evaluation time.
    pub fn output_type(&self) -> &Type {
        &self.output
    }

    /// Evaluates the program with the given message bound to the variable.
    pub fn eval(&self, message: &DynamicMessage) -> Result<Value, EvalError> {
        let actual = message.descriptor();
        if actual.full_name() != self.descriptor.full_name() {
            return Err(EvalError::TypeMismatch {
                expected: self.descriptor.full_name().to_string(),
                actual: actual.full_name().to_string(),
            });
        }
        Activation::new(&self.variable, Value::Message(message.clone())).eval(&self.ast)
    }
}
