use super::cell::{CellHint, Column, enum_text};
use super::layout::{LayoutLoader, TableLayout};
use super::RenderError;
use crate::expr::{self, Environment, Value};
use crate::reflection::{ListOptions, Registry};
use crate::transport::Transport;
use crate::BuildError;
use prost_reflect::{DynamicMessage, ReflectMessage};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tabwriter::TabWriter;

/// Builder for [`TableRenderer`]. The registry and the writer are mandatory.
pub struct TableRendererBuilder<'r, T, W> {
    registry: Option<&'r Registry<T>>,
    writer: Option<W>,
    include_deleted: bool,
    tables_dir: Option<PathBuf>,
}

impl<'r, T, W: Write> TableRendererBuilder<'r, T, W> {
    /// Sets the registry used to find the object types and to look up references.
    pub fn registry(mut self, registry: &'r Registry<T>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the writer where the tables will be written.
    pub fn writer(mut self, writer: W) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Adds a `DELETED` column with the deletion timestamp of the objects.
    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    /// Sets a directory containing `<full.name>.yaml` layouts that take precedence over the
    /// built in ones.
    pub fn tables_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.tables_dir = Some(directory.into());
        self
    }

    pub fn build(self) -> Result<TableRenderer<'r, T, W>, BuildError> {
        let registry = self.registry.ok_or(BuildError::Missing("registry"))?;
        let writer = self.writer.ok_or(BuildError::Missing("writer"))?;
        Ok(TableRenderer {
            registry,
            writer: TabWriter::new(writer).minwidth(0).padding(2),
            layouts: LayoutLoader::new(self.tables_dir),
            include_deleted: self.include_deleted,
            cache: HashMap::new(),
        })
    }
}

/// Writes lists of objects as aligned tables.
///
/// Names of referenced objects are cached for the lifetime of the renderer, so each distinct
/// reference costs at most one call to the server. The cache is never invalidated, create a new
/// renderer to start from scratch.
pub struct TableRenderer<'r, T, W: Write> {
    registry: &'r Registry<T>,
    writer: TabWriter<W>,
    layouts: LayoutLoader,
    include_deleted: bool,
    cache: HashMap<String, HashMap<String, String>>,
}

impl<'r, T, W: Write> TableRenderer<'r, T, W> {
    pub fn builder() -> TableRendererBuilder<'r, T, W> {
        TableRendererBuilder {
            registry: None,
            writer: None,
            include_deleted: false,
            tables_dir: None,
        }
    }
}

impl<T: Transport, W: Write> TableRenderer<'_, T, W> {
    /// Renders the objects, which must all be of the same type, as one table with a header.
    /// Nothing is written if the list is empty.
    pub async fn render(&mut self, objects: &[DynamicMessage]) -> Result<(), RenderError> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let descriptor = first.descriptor();
        if let Some(other) = objects
            .iter()
            .map(DynamicMessage::descriptor)
            .find(|other| other.full_name() != descriptor.full_name())
        {
            return Err(RenderError::MixedTypes {
                first: descriptor.full_name().to_string(),
                other: other.full_name().to_string(),
            });
        }

        let columns = self.columns(descriptor.full_name())?;
        let result = self.write_table(&columns, objects).await;
        self.writer.flush()?;
        result
    }

    /// Renders one object as a list of `HEADER:` and value lines, using the same columns as
    /// [`TableRenderer::render`].
    pub async fn describe(&mut self, object: &DynamicMessage) -> Result<(), RenderError> {
        let columns = self.columns(object.descriptor().full_name())?;
        let result = self.write_details(&columns, object).await;
        self.writer.flush()?;
        result
    }

    /// The compiled columns of the layout of the type.
    fn columns(&self, type_name: &str) -> Result<Vec<Column>, RenderError> {
        let object = self
            .registry
            .lookup(type_name)
            .filter(|object| object.full_name() == type_name)
            .ok_or_else(|| RenderError::UnknownType(type_name.to_string()))?;

        let mut layout = match self.layouts.load(type_name)? {
            Some(layout) => layout,
            None => {
                tracing::debug!(type_name, "Using default table layout");
                TableLayout::default_layout()
            }
        };
        if self.include_deleted {
            if object.descriptor().get_field_by_name("metadata").is_some() {
                layout.insert_deleted_column();
            } else {
                tracing::debug!(type_name, "Type has no metadata, ignoring deleted column");
            }
        }

        let env = Environment::for_object(object.descriptor().clone());
        layout
            .columns
            .iter()
            .map(|column| Column::compile(&env, column, self.registry.pool()))
            .collect()
    }

    async fn write_table(
        &mut self,
        columns: &[Column],
        objects: &[DynamicMessage],
    ) -> Result<(), RenderError> {
        let headers: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
        writeln!(self.writer, "{}", headers.join("\t"))?;

        for object in objects {
            let mut cells = Vec::with_capacity(columns.len());
            for column in columns {
                cells.push(self.cell(column, object).await?);
            }
            writeln!(self.writer, "{}", cells.join("\t"))?;
        }
        Ok(())
    }

    async fn write_details(
        &mut self,
        columns: &[Column],
        object: &DynamicMessage,
    ) -> Result<(), RenderError> {
        for column in columns {
            let text = self.cell(column, object).await?;
            writeln!(self.writer, "{}:\t{text}", column.header)?;
        }
        Ok(())
    }

    async fn cell(&mut self, column: &Column, object: &DynamicMessage) -> Result<String, RenderError> {
        let value = column
            .program
            .eval(object)
            .map_err(|source| RenderError::Eval {
                expression: column.program.source().to_string(),
                column: column.header.clone(),
                type_name: object.descriptor().full_name().to_string(),
                source,
            })?;
        Ok(self.cell_text(&column.hint, value).await)
    }

    async fn cell_text(&mut self, hint: &CellHint, value: Value) -> String {
        match (hint, value) {
            (CellHint::Enum(descriptor), Value::Int(number)) => enum_text(descriptor, number),
            (CellHint::Lookup(type_name), Value::String(id)) => {
                self.lookup_text(type_name, &id).await
            }
            (_, value) => value.to_string(),
        }
    }

    /// Replaces the identifier with the name of the object, or returns it unchanged when the
    /// object can't be found.
    async fn lookup_text(&mut self, type_name: &str, id: &str) -> String {
        if id.is_empty() {
            return "-".to_string();
        }
        if let Some(text) = self.cache.get(type_name).and_then(|names| names.get(id)) {
            return text.clone();
        }
        let text = self
            .lookup_name(type_name, id)
            .await
            .unwrap_or_else(|| id.to_string());
        self.cache
            .entry(type_name.to_string())
            .or_default()
            .insert(id.to_string(), text.clone());
        text
    }

    async fn lookup_name(&self, type_name: &str, id: &str) -> Option<String> {
        let Some(object) = self.registry.lookup(type_name) else {
            tracing::error!(type_name, id, "Failed to find object type for lookup");
            return None;
        };
        let quoted = expr::quote(id);
        let options = ListOptions {
            filter: Some(format!(
                "this.id == {quoted} || this.metadata.name == {quoted}"
            )),
            limit: None,
        };
        let result = match object.list(options).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(type_name, id, %error, "Failed to look up object");
                return None;
            }
        };
        match result.items.as_slice() {
            [item] => {
                let name = object.name(item);
                Some(if name.is_empty() { id.to_string() } else { name })
            }
            items => {
                tracing::warn!(
                    type_name,
                    id,
                    matches = items.len(),
                    "Expected exactly one object for lookup"
                );
                None
            }
        }
    }
}
