use super::RenderError;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Layouts distributed with the library, keyed by the full name of the object type.
const BUILTIN_LAYOUTS: &[(&str, &str)] = &[
    (
        "fulfillment.v1.Cluster",
        include_str!("../../tables/fulfillment.v1.Cluster.yaml"),
    ),
    (
        "fulfillment.v1.ClusterTemplate",
        include_str!("../../tables/fulfillment.v1.ClusterTemplate.yaml"),
    ),
    (
        "fulfillment.v1.Host",
        include_str!("../../tables/fulfillment.v1.Host.yaml"),
    ),
    (
        "fulfillment.v1.HostClass",
        include_str!("../../tables/fulfillment.v1.HostClass.yaml"),
    ),
    (
        "fulfillment.v1.HostPool",
        include_str!("../../tables/fulfillment.v1.HostPool.yaml"),
    ),
];

/// How to render the objects of a type as a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TableLayout {
    #[serde(default)]
    pub columns: Vec<ColumnLayout>,
}

/// One column of a [`TableLayout`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnLayout {
    #[serde(default)]
    pub header: String,

    /// Expression that calculates the value of the cell. The object is the `this` variable.
    #[serde(default)]
    pub value: String,

    /// Full name of the type of the value, only needed when the value is an enum number or the
    /// identifier of another object.
    ///
    /// For enums the number is replaced by the name of the enum value, without the prefix that
    /// all the values of the enum share. For identifiers, see [`ColumnLayout::lookup`].
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,

    /// Indicates that the value is the identifier of an object of the type given in
    /// [`ColumnLayout::type_name`], and that it should be replaced by the name of that object.
    #[serde(default)]
    pub lookup: bool,
}

impl ColumnLayout {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

impl TableLayout {
    /// Decodes a layout from its YAML representation.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// The layout used for types that don't have one: the identifier and the name.
    pub fn default_layout() -> Self {
        Self {
            columns: vec![
                ColumnLayout::new("ID", "this.id"),
                ColumnLayout::new("NAME", "has(this.metadata.name)? this.metadata.name: '-'"),
            ],
        }
    }

    /// Inserts the `DELETED` column, with the deletion timestamp, after the first column.
    pub(crate) fn insert_deleted_column(&mut self) {
        let column = ColumnLayout::new(
            "DELETED",
            "has(this.metadata.deletion_timestamp)? string(this.metadata.deletion_timestamp): '-'",
        );
        let index = self.columns.len().min(1);
        self.columns.insert(index, column);
    }
}

/// Finds the layout of a type: first in the optional directory, as `<full.name>.yaml`, then in
/// the layouts built into the library.
#[derive(Debug, Clone, Default)]
pub(crate) struct LayoutLoader {
    directory: Option<PathBuf>,
}

impl LayoutLoader {
    pub(crate) fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    /// Returns `None` when there is no layout for the type, that isn't an error.
    pub(crate) fn load(&self, full_name: &str) -> Result<Option<TableLayout>, RenderError> {
        let decode = |text: &str| {
            TableLayout::from_yaml(text).map_err(|source| RenderError::DecodeLayout {
                type_name: full_name.to_string(),
                source,
            })
        };

        if let Some(directory) = &self.directory {
            let path = directory.join(format!("{full_name}.yaml"));
            match fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), "Loaded table layout");
                    return decode(&text).map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(RenderError::ReadLayout { path, source }),
            }
        }

        BUILTIN_LAYOUTS
            .iter()
            .find(|(name, _)| *name == full_name)
            .map(|(_, text)| decode(*text))
            .transpose()
    }
}
