//! Changes to the labels and annotations of objects, written as `key=value` to set a value and
//! `key-` to remove it.
use objectl_core::{Metadata, ObjectError};
use std::collections::BTreeMap;
use std::fmt;

/// The maps of the metadata that can be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMap {
    Labels,
    Annotations,
}

impl MetadataMap {
    pub fn apply(
        self,
        metadata: &mut Metadata,
        operations: &[MapOperation],
    ) -> Result<(), ObjectError> {
        match self {
            MetadataMap::Labels => {
                let mut labels = metadata.labels();
                MapOperation::apply_all(operations, &mut labels);
                metadata.set_labels(labels)
            }
            MetadataMap::Annotations => {
                let mut annotations = metadata.annotations();
                MapOperation::apply_all(operations, &mut annotations);
                metadata.set_annotations(annotations)
            }
        }
    }
}

impl fmt::Display for MetadataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataMap::Labels => f.write_str("labels"),
            MetadataMap::Annotations => f.write_str("annotations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOperation {
    Set { key: String, value: String },
    Remove { key: String },
}

impl MapOperation {
    /// Applies the operations in order, so later operations on the same key win.
    pub fn apply_all(operations: &[MapOperation], map: &mut BTreeMap<String, String>) {
        for operation in operations {
            match operation {
                MapOperation::Set { key, value } => {
                    map.insert(key.clone(), value.clone());
                }
                MapOperation::Remove { key } => {
                    map.remove(key);
                }
            }
        }
    }
}

pub fn parse_operation(text: &str) -> Result<MapOperation, String> {
    if let Some((key, value)) = text.split_once('=') {
        if key.is_empty() {
            return Err(format!("The key can't be empty in '{text}'"));
        }
        return Ok(MapOperation::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    if let Some(key) = text.strip_suffix('-') {
        if key.is_empty() {
            return Err(format!("The key can't be empty in '{text}'"));
        }
        return Ok(MapOperation::Remove {
            key: key.to_string(),
        });
    }
    Err(format!(
        "Invalid operation '{text}', expected 'key=value' or 'key-'"
    ))
}
