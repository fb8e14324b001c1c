use crate::wkt;
use chrono::{DateTime, Utc};
use super::object::ObjectError;
use prost_reflect::{DynamicMessage, Kind, MapKey, ReflectMessage, Value};
use std::collections::{BTreeMap, HashMap};

/// View of the `metadata` sub-message that every object carries.
///
/// The view works by field name, so any message with `name`, `labels`, `annotations`,
/// `creation_timestamp` and `deletion_timestamp` fields is supported. Missing fields read as
/// empty values. Labels and annotations can be replaced, the result is stored back in the object
/// with [`ObjectDescriptor::set_metadata`](super::ObjectDescriptor::set_metadata).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    message: Option<DynamicMessage>,
}

impl Metadata {
    pub(crate) fn new(message: DynamicMessage) -> Self {
        Self {
            message: Some(message),
        }
    }

    pub(crate) fn into_message(self) -> Option<DynamicMessage> {
        self.message
    }

    /// The name of the object, empty if it has none.
    pub fn name(&self) -> String {
        self.message
            .as_ref()
            .and_then(|m| m.get_field_by_name("name"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    /// Replaces all the labels.
    pub fn set_labels(&mut self, labels: BTreeMap<String, String>) -> Result<(), ObjectError> {
        self.set_string_map("labels", labels)
    }

    /// Replaces all the annotations.
    pub fn set_annotations(
        &mut self,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), ObjectError> {
        self.set_string_map("annotations", annotations)
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp("creation_timestamp")
    }

    /// The time when the object was marked for deletion, `None` while the object is active.
    pub fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp("deletion_timestamp")
    }

    pub fn is_deleted(&self) -> bool {
        self.has("deletion_timestamp")
    }

    fn has(&self, name: &str) -> bool {
        let Some(message) = &self.message else {
            return false;
        };
        message
            .descriptor()
            .get_field_by_name(name)
            .is_some_and(|field| message.has_field(&field))
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        if !self.has(name) {
            return None;
        }
        let value = self.message.as_ref()?.get_field_by_name(name)?;
        wkt::timestamp(value.as_message()?)
    }

    fn set_string_map(
        &mut self,
        name: &str,
        entries: BTreeMap<String, String>,
    ) -> Result<(), ObjectError> {
        let Some(message) = &mut self.message else {
            return Err(ObjectError::MissingField {
                type_name: "object".to_string(),
                field: "metadata".to_string(),
            });
        };
        let descriptor = message.descriptor();
        let field = descriptor
            .get_field_by_name(name)
            .filter(|field| is_string_map(field.kind()))
            .ok_or_else(|| ObjectError::MissingField {
                type_name: descriptor.full_name().to_string(),
                field: name.to_string(),
            })?;
        let map: HashMap<MapKey, Value> = entries
            .into_iter()
            .map(|(k, v)| (MapKey::String(k), Value::String(v)))
            .collect();
        message.set_field(&field, Value::Map(map));
        Ok(())
    }

    fn string_map(&self, name: &str) -> BTreeMap<String, String> {
        let Some(value) = self.message.as_ref().and_then(|m| m.get_field_by_name(name)) else {
            return BTreeMap::new();
        };
        let Some(map) = value.as_map() else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
            .collect()
    }
}

/// Whether the field kind is the entry of a `map<string, string>`.
fn is_string_map(kind: Kind) -> bool {
    kind.as_message().is_some_and(|entry| {
        entry.is_map_entry()
            && entry.map_entry_key_field().kind() == Kind::String
            && entry.map_entry_value_field().kind() == Kind::String
    })
}
