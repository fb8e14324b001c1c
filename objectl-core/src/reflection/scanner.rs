//! # Service shape matching
//!
//! A service manages an object type when it has the five methods `Get`, `List`, `Create`,
//! `Update` and `Delete`, and their requests and responses have the expected fields:
//!
//! | method   | request                                   | response                                |
//! |----------|-------------------------------------------|-----------------------------------------|
//! | `Get`    | `string id`                               | `T object`                              |
//! | `List`   | `string filter`, optional `int32 limit`   | `repeated T items`, optional `int32 total` |
//! | `Create` | `T object`                                | `T object`                              |
//! | `Update` | `T object`                                | `T object`                              |
//! | `Delete` | `string id`                               | anything                                |
//!
//! Everything here is a pure function of the descriptors. A service that doesn't match is
//! simply not an object service, that isn't an error.
use prost_reflect::{
    Cardinality, DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, MethodDescriptor,
    ReflectMessage, ServiceDescriptor,
};

// Methods:
const CREATE_METHOD_NAME: &str = "Create";
const DELETE_METHOD_NAME: &str = "Delete";
const GET_METHOD_NAME: &str = "Get";
const LIST_METHOD_NAME: &str = "List";
const UPDATE_METHOD_NAME: &str = "Update";

// Fields:
const FILTER_FIELD_NAME: &str = "filter";
const ID_FIELD_NAME: &str = "id";
const ITEMS_FIELD_NAME: &str = "items";
const LIMIT_FIELD_NAME: &str = "limit";
pub(crate) const METADATA_FIELD_NAME: &str = "metadata";
const OBJECT_FIELD_NAME: &str = "object";
const TOTAL_FIELD_NAME: &str = "total";

/// Dispatch information for one RPC method: its path and zero value request/response.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    path: String,
    request: DynamicMessage,
    response: DynamicMessage,
}

impl MethodBinding {
    fn new(method: &MethodDescriptor) -> Self {
        Self {
            path: format!("/{}/{}", method.parent_service().full_name(), method.name()),
            request: DynamicMessage::new(method.input()),
            response: DynamicMessage::new(method.output()),
        }
    }

    /// The HTTP/2 path of the method, for example `/fulfillment.v1.Clusters/Get`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A fresh, empty request message.
    pub(crate) fn request(&self) -> DynamicMessage {
        self.request.clone()
    }

    pub(crate) fn response_descriptor(&self) -> MessageDescriptor {
        self.response.descriptor()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GetBinding {
    pub method: MethodBinding,
    pub id: FieldDescriptor,
    pub object: FieldDescriptor,
}

#[derive(Debug, Clone)]
pub(crate) struct ListBinding {
    pub method: MethodBinding,
    pub filter: FieldDescriptor,
    pub limit: Option<FieldDescriptor>,
    pub items: FieldDescriptor,
    pub total: Option<FieldDescriptor>,
}

/// Binding of the `Create` and `Update` methods, both send and receive one object.
#[derive(Debug, Clone)]
pub(crate) struct ObjectIoBinding {
    pub method: MethodBinding,
    pub input: FieldDescriptor,
    pub output: FieldDescriptor,
}

#[derive(Debug, Clone)]
pub(crate) struct DeleteBinding {
    pub method: MethodBinding,
    pub id: FieldDescriptor,
}

/// The result of matching a service against the object convention.
#[derive(Debug, Clone)]
pub(crate) struct ServiceShape {
    pub object: MessageDescriptor,
    pub get: GetBinding,
    pub list: ListBinding,
    pub create: ObjectIoBinding,
    pub update: ObjectIoBinding,
    pub delete: DeleteBinding,
}

/// Checks if the service follows the object convention, and returns the bindings if it does.
pub(crate) fn match_service(service: &ServiceDescriptor) -> Option<ServiceShape> {
    let method = |name: &str| service.methods().find(|m| m.name() == name);
    let get = method(GET_METHOD_NAME)?;
    let list = method(LIST_METHOD_NAME)?;
    let create = method(CREATE_METHOD_NAME)?;
    let update = method(UPDATE_METHOD_NAME)?;
    let delete = method(DELETE_METHOD_NAME)?;

    // The `Get` method decides which is the managed type:
    let get_id = id_field(&get.input())?;
    let get_object = object_field(&get.output())?;
    let object = message_type(&get_object)?;

    let list_filter = filter_field(&list.input())?;
    let list_limit = int32_field(&list.input(), LIMIT_FIELD_NAME);
    let list_items = items_field(&list.output())?;
    if message_type(&list_items)? != object {
        return None;
    }
    let list_total = int32_field(&list.output(), TOTAL_FIELD_NAME);

    let create_in = object_field_of(&create.input(), &object)?;
    let create_out = object_field_of(&create.output(), &object)?;
    let update_in = object_field_of(&update.input(), &object)?;
    let update_out = object_field_of(&update.output(), &object)?;

    let delete_id = id_field(&delete.input())?;

    Some(ServiceShape {
        object,
        get: GetBinding {
            method: MethodBinding::new(&get),
            id: get_id,
            object: get_object,
        },
        list: ListBinding {
            method: MethodBinding::new(&list),
            filter: list_filter,
            limit: list_limit,
            items: list_items,
            total: list_total,
        },
        create: ObjectIoBinding {
            method: MethodBinding::new(&create),
            input: create_in,
            output: create_out,
        },
        update: ObjectIoBinding {
            method: MethodBinding::new(&update),
            input: update_in,
            output: update_out,
        },
        delete: DeleteBinding {
            method: MethodBinding::new(&delete),
            id: delete_id,
        },
    })
}

fn singular_field(message: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    message
        .get_field_by_name(name)
        .filter(|field| field.cardinality() != Cardinality::Repeated)
}

fn message_type(field: &FieldDescriptor) -> Option<MessageDescriptor> {
    match field.kind() {
        Kind::Message(message) => Some(message),
        _ => None,
    }
}

/// A non repeated `string id` field.
pub(crate) fn id_field(message: &MessageDescriptor) -> Option<FieldDescriptor> {
    singular_field(message, ID_FIELD_NAME).filter(|field| field.kind() == Kind::String)
}

/// A non repeated `string filter` field.
fn filter_field(message: &MessageDescriptor) -> Option<FieldDescriptor> {
    singular_field(message, FILTER_FIELD_NAME).filter(|field| field.kind() == Kind::String)
}

/// A non repeated `int32` field, used for `limit` and `total`.
fn int32_field(message: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    singular_field(message, name).filter(|field| field.kind() == Kind::Int32)
}

/// A non repeated message field named `object`.
fn object_field(message: &MessageDescriptor) -> Option<FieldDescriptor> {
    singular_field(message, OBJECT_FIELD_NAME).filter(|field| message_type(field).is_some())
}

/// A non repeated `object` field of exactly the given type.
fn object_field_of(
    message: &MessageDescriptor,
    object: &MessageDescriptor,
) -> Option<FieldDescriptor> {
    object_field(message).filter(|field| message_type(field).as_ref() == Some(object))
}

/// A repeated message field named `items`. Maps are repeated too, but they don't qualify.
fn items_field(message: &MessageDescriptor) -> Option<FieldDescriptor> {
    message
        .get_field_by_name(ITEMS_FIELD_NAME)
        .filter(|field| field.is_list() && message_type(field).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MethodDescriptorProto,
        ServiceDescriptorProto,
        field_descriptor_proto::{Label, Type},
    };

    fn field(name: &str, number: i32, r#type: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(r#type as i32),
            label: Some(label as i32),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn object(name: &str, number: i32, type_name: &str, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(format!(".test.{type_name}")),
            ..field(name, number, Type::Message, label)
        }
    }

    fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    fn method(name: &str) -> MethodDescriptorProto {
        MethodDescriptorProto {
            name: Some(name.to_string()),
            input_type: Some(format!(".test.{name}Request")),
            output_type: Some(format!(".test.{name}Response")),
            ..Default::default()
        }
    }

    /// Builds a `test.Things` service where the `Get` request `id` field has the given type.
    fn pool(id_type: Type, items_label: Label) -> DescriptorPool {
        let file = FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![
                message("Thing", vec![field("id", 1, Type::String, Label::Optional)]),
                message("GetRequest", vec![field("id", 1, id_type, Label::Optional)]),
                message(
                    "GetResponse",
                    vec![object("object", 1, "Thing", Label::Optional)],
                ),
                message(
                    "ListRequest",
                    vec![field("filter", 1, Type::String, Label::Optional)],
                ),
                message("ListResponse", vec![object("items", 1, "Thing", items_label)]),
                message(
                    "CreateRequest",
                    vec![object("object", 1, "Thing", Label::Optional)],
                ),
                message(
                    "CreateResponse",
                    vec![object("object", 1, "Thing", Label::Optional)],
                ),
                message(
                    "UpdateRequest",
                    vec![object("object", 1, "Thing", Label::Optional)],
                ),
                message(
                    "UpdateResponse",
                    vec![object("object", 1, "Thing", Label::Optional)],
                ),
                message(
                    "DeleteRequest",
                    vec![field("id", 1, Type::String, Label::Optional)],
                ),
                message("DeleteResponse", vec![]),
            ],
            service: vec![ServiceDescriptorProto {
                name: Some("Things".to_string()),
                method: ["Get", "List", "Create", "Update", "Delete"]
                    .into_iter()
                    .map(method)
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        DescriptorPool::from_file_descriptor_set(prost_types::FileDescriptorSet { file: vec![file] })
            .expect("valid descriptor set")
    }

    fn service(pool: &DescriptorPool) -> ServiceDescriptor {
        pool.get_service_by_name("test.Things").unwrap()
    }

    #[test]
    fn test_matching_service() {
        let pool = pool(Type::String, Label::Repeated);
        let shape = match_service(&service(&pool)).expect("service should match");

        assert_eq!(shape.object.full_name(), "test.Thing");
        assert_eq!(shape.get.method.path(), "/test.Things/Get");
        assert_eq!(shape.delete.method.path(), "/test.Things/Delete");
        assert!(shape.list.limit.is_none());
        assert!(shape.list.total.is_none());
    }

    #[test]
    fn test_id_must_be_a_string() {
        let pool = pool(Type::Int32, Label::Repeated);
        assert!(match_service(&service(&pool)).is_none());
    }

    #[test]
    fn test_items_must_be_repeated() {
        let pool = pool(Type::String, Label::Optional);
        assert!(match_service(&service(&pool)).is_none());
    }
}
