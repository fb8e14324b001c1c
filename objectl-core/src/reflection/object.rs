//! # Object Descriptor
//!
//! Generic CRUD dispatch for one managed type. Every operation builds a fresh request from the
//! templates computed at scan time, sets the relevant fields by descriptor and performs exactly
//! one call on the transport.
use super::metadata::Metadata;
use super::scanner::{
    DeleteBinding, GetBinding, ListBinding, METADATA_FIELD_NAME, MethodBinding, ObjectIoBinding,
    ServiceShape,
};
use crate::transport::{InvokeError, Transport};
use prost_reflect::{DynamicMessage, FieldDescriptor, MessageDescriptor, ReflectMessage, Value};
use std::fmt;
use std::sync::Arc;

/// The kind of operation that failed, used to give context to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Errors that can occur when operating on objects.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("{type_name} '{id}' doesn't exist")]
    NotFound { type_name: String, id: String },
    #[error("Failed to {operation} object of type '{type_name}': {source}")]
    Invoke {
        operation: Operation,
        type_name: String,
        #[source]
        source: InvokeError,
    },
    #[error("Expected an object of type '{expected}' but got '{actual}'")]
    TypeMismatch { expected: String, actual: String },
    #[error("Type '{type_name}' doesn't have a '{field}' field")]
    MissingField { type_name: String, field: String },
}

impl ObjectError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectError::NotFound { .. })
    }
}

/// Options for the [`ObjectDescriptor::list`] operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Filter expression evaluated by the server, for example `this.metadata.name == "my"`.
    pub filter: Option<String>,
    /// Maximum number of items to return. Ignored if the type doesn't support limits.
    pub limit: Option<i32>,
}

/// The result of the [`ObjectDescriptor::list`] operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    pub items: Vec<DynamicMessage>,
    /// Total reported by the server, or the number of items if the type has no `total` field.
    pub total: i32,
}

/// Information about a message type whose service satisfies the object convention, and the
/// methods to get, list, create, update and delete instances of it.
pub struct ObjectDescriptor<T> {
    transport: Arc<T>,
    descriptor: MessageDescriptor,
    singular: String,
    plural: String,
    template: DynamicMessage,
    id_field: Option<FieldDescriptor>,
    metadata_field: Option<FieldDescriptor>,
    get: GetBinding,
    list: ListBinding,
    create: ObjectIoBinding,
    update: ObjectIoBinding,
    delete: DeleteBinding,
}

impl<T> ObjectDescriptor<T> {
    pub(crate) fn new(transport: Arc<T>, shape: ServiceShape) -> Self {
        let ServiceShape {
            object,
            get,
            list,
            create,
            update,
            delete,
        } = shape;

        let singular = object.name().to_lowercase();
        let plural = super::plural::plural(&singular);
        let id_field = super::scanner::id_field(&object);
        let metadata_field = object
            .get_field_by_name(METADATA_FIELD_NAME)
            .filter(|field| field.kind().as_message().is_some() && !field.is_list());

        Self {
            transport,
            template: DynamicMessage::new(object.clone()),
            descriptor: object,
            singular,
            plural,
            id_field,
            metadata_field,
            get,
            list,
            create,
            update,
            delete,
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// The fully qualified name of the type, for example `fulfillment.v1.Cluster`.
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    pub fn package_name(&self) -> &str {
        self.descriptor.package_name()
    }

    /// The lower case singular alias, for example `hostclass`.
    pub fn singular(&self) -> &str {
        &self.singular
    }

    /// The lower case plural alias, for example `hostclasses`.
    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Returns a new empty instance of the type.
    pub fn instance(&self) -> DynamicMessage {
        self.template.clone()
    }

    pub fn get_method(&self) -> &MethodBinding {
        &self.get.method
    }

    pub fn list_method(&self) -> &MethodBinding {
        &self.list.method
    }

    pub fn create_method(&self) -> &MethodBinding {
        &self.create.method
    }

    pub fn update_method(&self) -> &MethodBinding {
        &self.update.method
    }

    pub fn delete_method(&self) -> &MethodBinding {
        &self.delete.method
    }

    /// Returns the identifier of the object, empty if the object isn't of this type.
    pub fn id(&self, object: &DynamicMessage) -> String {
        let Some(field) = self.id_field.as_ref().filter(|_| self.owns(object)) else {
            return String::new();
        };
        object
            .get_field(field)
            .as_str()
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Returns the name of the object, taken from the metadata.
    pub fn name(&self, object: &DynamicMessage) -> String {
        self.metadata(object).name()
    }

    /// Returns the metadata of the object. If it isn't set yet the result is empty but can still
    /// be edited and stored with [`ObjectDescriptor::set_metadata`].
    pub fn metadata(&self, object: &DynamicMessage) -> Metadata {
        let Some(field) = self.metadata_field.as_ref().filter(|_| self.owns(object)) else {
            return Metadata::default();
        };
        object
            .get_field(field)
            .as_message()
            .map(|m| Metadata::new(m.clone()))
            .unwrap_or_default()
    }

    /// Stores the metadata in the object, replacing the previous one. Nothing is sent to the
    /// server, use [`ObjectDescriptor::update`] for that.
    pub fn set_metadata(
        &self,
        object: &mut DynamicMessage,
        metadata: Metadata,
    ) -> Result<(), ObjectError> {
        self.check_type(object)?;
        let missing = || ObjectError::MissingField {
            type_name: self.full_name().to_string(),
            field: METADATA_FIELD_NAME.to_string(),
        };
        let field = self.metadata_field.as_ref().ok_or_else(missing)?;
        let message = metadata.into_message().ok_or_else(missing)?;
        let expected = field.kind().as_message().cloned().ok_or_else(missing)?;
        if message.descriptor() != expected {
            return Err(ObjectError::TypeMismatch {
                expected: expected.full_name().to_string(),
                actual: message.descriptor().full_name().to_string(),
            });
        }
        object.set_field(field, Value::Message(message));
        Ok(())
    }

    fn owns(&self, object: &DynamicMessage) -> bool {
        object.descriptor() == self.descriptor
    }

    fn check_type(&self, object: &DynamicMessage) -> Result<(), ObjectError> {
        if self.owns(object) {
            return Ok(());
        }
        Err(ObjectError::TypeMismatch {
            expected: self.full_name().to_string(),
            actual: object.descriptor().full_name().to_string(),
        })
    }

    fn not_found_or(&self, operation: Operation, id: &str, source: InvokeError) -> ObjectError {
        if source.is_not_found() {
            return ObjectError::NotFound {
                type_name: self.full_name().to_string(),
                id: id.to_string(),
            };
        }
        self.wrap(operation, source)
    }

    fn wrap(&self, operation: Operation, source: InvokeError) -> ObjectError {
        ObjectError::Invoke {
            operation,
            type_name: self.full_name().to_string(),
            source,
        }
    }
}

impl<T: Transport> ObjectDescriptor<T> {
    /// Retrieves the object with the given identifier.
    pub async fn get(&self, id: &str) -> Result<DynamicMessage, ObjectError> {
        let mut request = self.get.method.request();
        request.set_field(&self.get.id, Value::String(id.to_string()));
        let response = self
            .invoke(&self.get.method, request)
            .await
            .map_err(|e| self.not_found_or(Operation::Get, id, e))?;
        Ok(self.object_from(&response, &self.get.object))
    }

    /// Lists objects. Only one request is sent, there is no pagination.
    pub async fn list(&self, options: ListOptions) -> Result<ListResult, ObjectError> {
        let mut request = self.list.method.request();
        if let Some(filter) = options.filter.filter(|f| !f.is_empty()) {
            request.set_field(&self.list.filter, Value::String(filter));
        }
        if let (Some(limit), Some(field)) = (options.limit.filter(|l| *l > 0), &self.list.limit) {
            request.set_field(field, Value::I32(limit));
        }
        let response = self
            .invoke(&self.list.method, request)
            .await
            .map_err(|e| self.wrap(Operation::List, e))?;

        let items: Vec<DynamicMessage> = response
            .get_field(&self.list.items)
            .as_list()
            .map(|list| list.iter().filter_map(|v| v.as_message().cloned()).collect())
            .unwrap_or_default();
        let total = match &self.list.total {
            Some(field) => response.get_field(field).as_i32().unwrap_or_default(),
            None => i32::try_from(items.len()).unwrap_or(i32::MAX),
        };
        Ok(ListResult { items, total })
    }

    /// Creates the object and returns it as stored by the server.
    pub async fn create(&self, object: DynamicMessage) -> Result<DynamicMessage, ObjectError> {
        self.send_object(Operation::Create, &self.create, object)
            .await
    }

    /// Replaces the object and returns it as stored by the server.
    pub async fn update(&self, object: DynamicMessage) -> Result<DynamicMessage, ObjectError> {
        self.send_object(Operation::Update, &self.update, object)
            .await
    }

    /// Deletes the object with the given identifier. The server may only mark it as deleted.
    pub async fn delete(&self, id: &str) -> Result<(), ObjectError> {
        let mut request = self.delete.method.request();
        request.set_field(&self.delete.id, Value::String(id.to_string()));
        self.invoke(&self.delete.method, request)
            .await
            .map_err(|e| self.not_found_or(Operation::Delete, id, e))?;
        Ok(())
    }

    async fn send_object(
        &self,
        operation: Operation,
        binding: &ObjectIoBinding,
        object: DynamicMessage,
    ) -> Result<DynamicMessage, ObjectError> {
        self.check_type(&object)?;
        let mut request = binding.method.request();
        request.set_field(&binding.input, Value::Message(object));
        let response = self
            .invoke(&binding.method, request)
            .await
            .map_err(|e| self.wrap(operation, e))?;
        Ok(self.object_from(&response, &binding.output))
    }

    async fn invoke(
        &self,
        method: &MethodBinding,
        request: DynamicMessage,
    ) -> Result<DynamicMessage, InvokeError> {
        tracing::debug!(path = method.path(), "Invoking method");
        self.transport
            .invoke(method.path(), request, method.response_descriptor())
            .await
    }

    fn object_from(&self, response: &DynamicMessage, field: &FieldDescriptor) -> DynamicMessage {
        response
            .get_field(field)
            .as_message()
            .cloned()
            .unwrap_or_else(|| self.instance())
    }
}

impl<T> fmt::Display for ObjectDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

impl<T> fmt::Debug for ObjectDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDescriptor")
            .field("full_name", &self.full_name())
            .field("singular", &self.singular)
            .field("plural", &self.plural)
            .finish_non_exhaustive()
    }
}
