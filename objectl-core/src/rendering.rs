//! # Table Rendering
//!
//! Renders lists of objects as aligned text tables. The columns of each type come from a
//! [`TableLayout`], either loaded from a directory given by the user or built into the library,
//! and the values of the cells are calculated with [expressions](crate::expr).
//!
//! Cells can carry a type hint: integers hinted with an enum type are shown as the short name of
//! the enum value, and strings hinted as lookups are shown as the name of the referenced object,
//! fetched from the server once per renderer.
mod cell;
mod layout;
mod table;

pub use layout::{ColumnLayout, TableLayout};
pub use table::{TableRenderer, TableRendererBuilder};

use crate::expr::{CompileError, EvalError};
use std::io;
use std::path::PathBuf;

/// Errors that can occur when rendering tables.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Can't render objects of different types in one table: '{first}' and '{other}'")]
    MixedTypes { first: String, other: String },

    #[error("failed to find object descriptor for type '{0}'")]
    UnknownType(String),

    #[error("Failed to read table layout from '{path}': {source}", path = path.display())]
    ReadLayout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode table layout for type '{type_name}': {source}")]
    DecodeLayout {
        type_name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(
        "Failed to compile expression '{expression}' of column '{column}' for type '{type_name}': {reason}",
        expression = source.expression(),
        reason = source.reason()
    )]
    Compile {
        column: String,
        type_name: String,
        #[source]
        source: CompileError,
    },

    #[error(
        "Failed to evaluate expression '{expression}' of column '{column}' for type '{type_name}': {source}"
    )]
    Eval {
        expression: String,
        column: String,
        type_name: String,
        #[source]
        source: EvalError,
    },

    #[error("Failed to write table: {0}")]
    Io(#[from] io::Error),
}
