use super::layout::ColumnLayout;
use super::RenderError;
use crate::expr::{Environment, Program};
use prost_reflect::{DescriptorPool, EnumDescriptor};

/// How the values of a column are translated for display.
#[derive(Debug, Clone)]
pub(crate) enum CellHint {
    Plain,
    /// Integers are numbers of this enum.
    Enum(EnumDescriptor),
    /// Strings are identifiers of objects of this type.
    Lookup(String),
}

/// A column with its expression compiled.
#[derive(Debug)]
pub(crate) struct Column {
    pub header: String,
    pub program: Program,
    pub hint: CellHint,
}

impl Column {
    pub(crate) fn compile(
        env: &Environment,
        layout: &ColumnLayout,
        pool: &DescriptorPool,
    ) -> Result<Self, RenderError> {
        let program = env
            .compile(&layout.value)
            .map_err(|source| RenderError::Compile {
                column: layout.header.clone(),
                type_name: env.descriptor().full_name().to_string(),
                source,
            })?;
        Ok(Self {
            header: layout.header.clone(),
            program,
            hint: hint(layout, pool),
        })
    }
}

fn hint(layout: &ColumnLayout, pool: &DescriptorPool) -> CellHint {
    let Some(type_name) = layout.type_name.as_deref().filter(|t| !t.is_empty()) else {
        return CellHint::Plain;
    };
    if layout.lookup {
        return CellHint::Lookup(type_name.to_string());
    }
    match pool.get_enum_by_name(type_name) {
        Some(descriptor) => CellHint::Enum(descriptor),
        None => {
            tracing::error!(
                column = layout.header,
                type_name,
                "Failed to find enum type"
            );
            CellHint::Plain
        }
    }
}

/// The name of the enum value, without the prefix shared by all the values of the enum.
///
/// The prefix is taken from the value with number zero, which by convention is named like
/// `CLUSTER_STATE_UNSPECIFIED`: everything before the last underscore. So `CLUSTER_STATE_READY`
/// is rendered as `READY`. Numbers that aren't part of the enum are rendered as `UNKNOWN:<n>`.
pub(crate) fn enum_text(descriptor: &EnumDescriptor, number: i64) -> String {
    let Some(value) = i32::try_from(number)
        .ok()
        .and_then(|number| descriptor.get_value(number))
    else {
        return format!("UNKNOWN:{number}");
    };
    let name = value.name();

    let prefix = descriptor.get_value(0).and_then(|zero| {
        let zero = zero.name();
        zero.rfind('_').map(|index| zero[..=index].to_string())
    });
    match prefix {
        Some(prefix) => match name.strip_prefix(prefix.as_str()) {
            Some(short) if !short.is_empty() => short.to_string(),
            _ => name.to_string(),
        },
        None => name.to_string(),
    }
}
